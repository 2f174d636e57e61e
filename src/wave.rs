//! Concentric circle and sphere waves.
//!
//! In GPU mode the vertex stream holds parametric coordinates and the shader
//! displaces them; in CPU mode every vertex is recomputed each frame.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::color::{Color, WaveColorSlot, WaveColors};
use crate::config::WaveConfig;
use crate::error::GeneratorError;
use crate::flags::StateFlags;
use crate::geometry::{GeometryBuffers, Vec3};
use crate::shaders::{WAVE_CPU_VERT, WAVE_FRAG, WAVE_GPU_VERT};

/// Every wave visible.
pub const ALL_WAVES: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveState {
    Empty,
    Created,
    Updated,
    IndexReselected,
}

#[derive(Debug, Clone)]
pub struct WaveGenerator {
    config: Option<WaveConfig>,
    buffers: GeometryBuffers,
    rendered_waves: u8,
    colors: WaveColors,
    time: f64,
    state: WaveState,
    updates: StateFlags,
    vert: String,
    frag: String,
}

impl Default for WaveGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Angular sample of one wave vertex.
#[derive(Debug, Clone, Copy)]
struct Sample {
    wave: usize,
    theta: f64,
    phi: f64,
}

fn radius(wave: usize) -> f64 {
    (wave + 1) as f64
}

fn phase(wave: usize) -> f64 {
    wave as f64 * FRAC_PI_2
}

fn samples(config: &WaveConfig) -> impl Iterator<Item = Sample> + '_ {
    let res = config.common.resolution as usize;
    let d_theta = TAU / res as f64;
    let d_phi = PI / res as f64;
    let rows = if config.sphere { res } else { 1 };

    (0..config.waves as usize).flat_map(move |wave| {
        (0..res).flat_map(move |k| {
            (0..rows).map(move |j| Sample {
                wave,
                theta: k as f64 * d_theta,
                phi: if config.sphere { j as f64 * d_phi } else { 0.0 },
            })
        })
    })
}

/// cos(kL r theta - kT t + phase)
fn wave_value(config: &WaveConfig, r: f64, theta: f64, t: f64, phase: f64) -> f64 {
    let k_length = TAU / config.wavelength;
    let k_time = TAU / config.period;
    (k_length * r * theta - k_time * t + phase).cos()
}

fn place(config: &WaveConfig, r: f64, d: f64, theta: f64, phi: f64) -> Vec3 {
    let (x, y, z) = if config.sphere {
        (
            (r + d) * phi.sin() * theta.sin(),
            phi.cos(),
            (r + d) * phi.sin() * theta.cos(),
        )
    } else if config.parallel {
        ((r + d) * theta.cos(), 0.0, (r + d) * theta.sin())
    } else {
        (r * theta.cos(), d, r * theta.sin())
    };
    [x as f32, y as f32, z as f32]
}

fn length(v: Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

impl WaveGenerator {
    pub fn new() -> Self {
        WaveGenerator {
            config: None,
            buffers: GeometryBuffers::new(),
            rendered_waves: ALL_WAVES,
            colors: WaveColors::default(),
            time: 0.0,
            state: WaveState::Empty,
            updates: StateFlags::empty(),
            vert: String::new(),
            frag: String::new(),
        }
    }

    /// Regenerates every wave from `config` at t = 0.
    ///
    /// The new geometry is validated before it replaces the current buffers;
    /// on error the previous geometry stays in place.
    pub fn new_waves(&mut self, config: WaveConfig) -> Result<(), GeneratorError> {
        let mut buffers = GeometryBuffers::with_capacity(config.waves as usize * config.vertices_per_wave());

        if config.common.cpu {
            for _ in 0..config.waves as usize * config.vertices_per_wave() {
                buffers.push_vertex([0.0; 3]);
                buffers.push_attribute([0.0; 3]);
            }
            let (vertices, attributes) = buffers.streams_mut();
            Self::evaluate(&config, &self.colors, 0.0, vertices, attributes);
        } else {
            for s in samples(&config) {
                let r = radius(s.wave);
                buffers.push_vertex([s.theta as f32, s.phi as f32, r as f32]);
                buffers.push_attribute([phase(s.wave) as f32, 0.0, r as f32]);
            }
        }

        buffers.replace_indices(Self::indices_for(&config, self.rendered_waves));
        buffers.validate_points()?;

        let (vert, frag) = Self::shader_names(&config);
        let mut updates = StateFlags::BUFFERS | StateFlags::UNIFORMS;
        if vert != self.vert {
            updates |= StateFlags::UPD_VERT_SHADER;
        }
        if frag != self.frag {
            updates |= StateFlags::UPD_FRAG_SHADER;
        }

        log::debug!(
            "created {} waves: {} vertices, {} indices",
            config.waves,
            buffers.vertex_count(),
            buffers.index_count()
        );

        self.buffers = buffers;
        self.config = Some(config);
        self.vert = vert;
        self.frag = frag;
        self.time = 0.0;
        self.state = WaveState::Created;
        self.updates |= updates;
        Ok(())
    }

    /// Recomputes positions and colors at time `t`. Only runs in CPU mode.
    pub fn update(&mut self, t: f64) {
        let Some(config) = self.config.as_ref().filter(|c| c.common.cpu) else {
            return;
        };

        let (vertices, attributes) = self.buffers.streams_mut();
        Self::evaluate(config, &self.colors, t, vertices, attributes);

        self.time = t;
        self.state = WaveState::Updated;
        self.updates |= StateFlags::UPD_VBO | StateFlags::UPD_DATA;
    }

    /// Overwrites every sample's position and color at time `t`.
    fn evaluate(config: &WaveConfig, colors: &WaveColors, t: f64, vertices: &mut [Vec3], attributes: &mut [Vec3]) {
        for ((s, vertex), attribute) in samples(config).zip(vertices.iter_mut()).zip(attributes.iter_mut()) {
            let r = radius(s.wave);
            let psi = wave_value(config, r, s.theta, t, phase(s.wave));
            let d = config.amplitude * psi;
            *vertex = place(config, r, d, s.theta, s.phi);
            *attribute = colors.blend(psi as f32).to_rgb();
        }

        if config.superposition && config.waves > 1 {
            Self::superpose(config, vertices, attributes);
        }
    }

    /// Where the outer of two neighbouring waves reaches further, both
    /// collapse to their midpoint and turn red.
    fn superpose(config: &WaveConfig, vertices: &mut [Vec3], attributes: &mut [Vec3]) {
        let per_wave = config.vertices_per_wave();
        let red = Color::RED.to_rgb();

        for wave in 1..config.waves as usize {
            for k in 0..per_wave {
                let outer = wave * per_wave + k;
                let inner = outer - per_wave;
                let (a, b) = (vertices[outer], vertices[inner]);
                if length(a) > length(b) {
                    let mid = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0, (a[2] + b[2]) / 2.0];
                    vertices[outer] = mid;
                    vertices[inner] = mid;
                    attributes[outer] = red;
                    attributes[inner] = red;
                }
            }
        }
    }

    fn indices_for(config: &WaveConfig, rendered: u8) -> Vec<u32> {
        let per_wave = config.vertices_per_wave() as u32;
        (0..config.waves)
            .filter(|&wave| rendered & (1 << wave) != 0)
            .flat_map(|wave| wave * per_wave..(wave + 1) * per_wave)
            .collect()
    }

    fn shader_names(config: &WaveConfig) -> (String, String) {
        let default_vert = if config.common.cpu { WAVE_CPU_VERT } else { WAVE_GPU_VERT };
        let pick = |name: &str, default: &str| {
            if name.is_empty() {
                default.to_owned()
            } else {
                name.to_owned()
            }
        };
        (pick(&config.common.vert, default_vert), pick(&config.common.frag, WAVE_FRAG))
    }

    /// Shows or hides wave `index`. Only the index stream changes.
    pub fn select_waves(&mut self, index: u8, on: bool) {
        if index >= 8 {
            return;
        }
        let bits = if on {
            self.rendered_waves | (1 << index)
        } else {
            self.rendered_waves & !(1 << index)
        };
        self.set_rendered_waves(bits);
    }

    pub fn set_rendered_waves(&mut self, bits: u8) {
        self.rendered_waves = bits;
        if let Some(config) = &self.config {
            self.buffers.replace_indices(Self::indices_for(config, bits));
            self.state = WaveState::IndexReselected;
            self.updates |= StateFlags::UPD_EBO;
        }
    }

    pub fn rendered_waves(&self) -> u8 {
        self.rendered_waves
    }

    pub fn set_color(&mut self, slot: WaveColorSlot, word: u32) {
        self.colors.set(slot, word);
        self.updates |= StateFlags::UPD_COLOR_UNIFORMS;
    }

    pub fn colors(&self) -> &WaveColors {
        &self.colors
    }

    pub fn buffers(&self) -> &GeometryBuffers {
        &self.buffers
    }

    pub fn config(&self) -> Option<&WaveConfig> {
        self.config.as_ref()
    }

    pub fn state(&self) -> WaveState {
        self.state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// True when vertices are rewritten every frame.
    pub fn is_dynamic(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.common.cpu)
    }

    pub fn shader_vert(&self) -> &str {
        &self.vert
    }

    pub fn shader_frag(&self) -> &str {
        &self.frag
    }

    /// (amplitude, 2pi/wavelength, 2pi/period, time) for the maths uniform.
    pub fn maths(&self, t: f64) -> [f32; 4] {
        match &self.config {
            Some(c) => [
                c.amplitude as f32,
                (TAU / c.wavelength) as f32,
                (TAU / c.period) as f32,
                t as f32,
            ],
            None => [0.0; 4],
        }
    }

    /// (parallel, sphere) switches for the shader.
    pub fn mode_bits(&self) -> [u32; 4] {
        match &self.config {
            Some(c) => [c.parallel as u32, c.sphere as u32, c.common.cpu as u32, 0],
            None => [0; 4],
        }
    }

    /// Upload work accumulated since the last call.
    pub fn take_updates(&mut self) -> StateFlags {
        std::mem::replace(&mut self.updates, StateFlags::empty())
    }
}
