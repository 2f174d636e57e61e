//! Hydrogen orbital probability clouds sampled on concentric layers.
//!
//! Every layer is a (theta, phi) grid whose resolution grows with its radius.
//! Each orbital of a recipe adds its weighted |psi|^2 r^2 to a per-point
//! density; culling only ever rewrites the index stream so the sliders can
//! move without rebuilding the lattice.

use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::config::{CloudConfig, OrbitalTerm, RecipeMap};
use crate::error::{GeneratorError, PhysicsError};
use crate::flags::StateFlags;
use crate::geometry::GeometryBuffers;
use crate::physics::{
    angular_norm, associated_legendre, complex_mul, radial_extent, radial_from_norm, radial_norm,
    radial_probability,
};
use crate::shaders::{CLOUD_CPU_VERT, CLOUD_FRAG, CLOUD_GPU_VERT};

/// Share of each orbital's radial probability the lattice must enclose.
pub const RADIAL_COVERAGE: f64 = 0.99;

/// Layers whose one-dimensional density falls below this are skipped.
pub const LAYER_CULL_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudState {
    Empty,
    Skeleton,
    PerOrbital,
    Baked,
    SliderUpdated,
}

/// Which precomputed index subset is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSet {
    Tolerance,
    Slider,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Layer {
    radius: f64,
    steps: usize,
    offset: usize,
}

impl Layer {
    fn points(&self) -> usize {
        self.steps * self.steps
    }

    fn angle(&self, step: usize) -> f64 {
        step as f64 * TAU / self.steps as f64
    }
}

/// Inputs that determine the lattice; a change forces a new skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SkeletonKey {
    cloud_resolution: u32,
    divisor: u32,
    layer_count: u32,
    cpu: bool,
}

#[derive(Debug, Clone)]
struct Skeleton {
    key: SkeletonKey,
    layers: Vec<Layer>,
    vertices: Vec<[f32; 3]>,
}

impl Skeleton {
    fn build(key: SkeletonKey) -> Skeleton {
        let delta = 1.0 / key.divisor as f64;
        let mut layers = Vec::with_capacity(key.layer_count as usize);
        let mut offset = 0;
        for k in 1..=key.layer_count {
            let radius = k as f64 * delta;
            let steps = (radius * key.cloud_resolution as f64).ceil() as usize;
            let layer = Layer { radius, steps, offset };
            offset += layer.points();
            layers.push(layer);
        }

        let mut vertices = Vec::with_capacity(offset);
        for layer in &layers {
            let r = layer.radius;
            for i in 0..layer.steps {
                let theta = layer.angle(i);
                for j in 0..layer.steps {
                    let phi = layer.angle(j);
                    let v = if key.cpu {
                        [
                            r * phi.sin() * theta.sin(),
                            r * phi.cos(),
                            r * phi.sin() * theta.cos(),
                        ]
                    } else {
                        [theta, phi, r]
                    };
                    vertices.push([v[0] as f32, v[1] as f32, v[2] as f32]);
                }
            }
        }

        Skeleton { key, layers, vertices }
    }

    fn point_count(&self) -> usize {
        self.vertices.len()
    }

    fn max_radius(&self) -> f64 {
        self.layers.last().map_or(0.0, |l| l.radius)
    }

    /// Layer containing point `index`.
    fn layer_of(&self, index: usize) -> &Layer {
        let pos = self.layers.partition_point(|l| l.offset <= index);
        &self.layers[pos.saturating_sub(1)]
    }

    /// (theta / 2pi, r / r_max) of point `index`.
    fn normalized(&self, index: usize) -> (f64, f64) {
        let layer = self.layer_of(index);
        let theta_step = (index - layer.offset) / layer.steps;
        (
            theta_step as f64 / layer.steps as f64,
            layer.radius / self.max_radius(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct CloudGenerator {
    config: Option<CloudConfig>,
    recipe: RecipeMap,
    skeleton: Option<Skeleton>,
    buffers: GeometryBuffers,
    idx_tolerance: Vec<u32>,
    idx_slider: Vec<u32>,
    active: IndexSet,
    max_rdp: f64,
    radial_norms: HashMap<(u32, u32), f64>,
    angular_norms: HashMap<(u32, i32), f64>,
    state: CloudState,
    updates: StateFlags,
    vert: String,
    frag: String,
}

impl Default for CloudGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudGenerator {
    pub fn new() -> Self {
        CloudGenerator {
            config: None,
            recipe: RecipeMap::new(),
            skeleton: None,
            buffers: GeometryBuffers::new(),
            idx_tolerance: Vec::new(),
            idx_slider: Vec::new(),
            active: IndexSet::Tolerance,
            max_rdp: 0.0,
            radial_norms: HashMap::new(),
            angular_norms: HashMap::new(),
            state: CloudState::Empty,
            updates: StateFlags::empty(),
            vert: String::new(),
            frag: String::new(),
        }
    }

    /// Lattice radius in units of the largest n: the smallest whole multiple
    /// of `max_n` that encloses [`RADIAL_COVERAGE`] of every recipe orbital.
    pub fn orbit_count(recipe: &RecipeMap) -> Result<u32, PhysicsError> {
        let max_n = recipe.max_n().max(1) as f64;
        let mut count = 1;
        for (n, term) in recipe.orbitals() {
            let extent = radial_extent(n, term.l, RADIAL_COVERAGE)?;
            count = count.max((extent / max_n).ceil() as u32);
        }
        Ok(count)
    }

    pub fn layer_count(config: &CloudConfig, recipe: &RecipeMap) -> Result<u32, PhysicsError> {
        Ok(recipe.max_n() * Self::orbit_count(recipe)? * config.cloud_lay_divisor)
    }

    /// Builds (or reuses) the lattice and bakes `recipe` into it.
    ///
    /// Nothing is committed until the result validates; on error the previous
    /// cloud stays intact.
    pub fn new_cloud(&mut self, config: CloudConfig, recipe: RecipeMap) -> Result<(), GeneratorError> {
        let key = SkeletonKey {
            cloud_resolution: config.cloud_resolution,
            divisor: config.cloud_lay_divisor,
            layer_count: Self::layer_count(&config, &recipe)?,
            cpu: config.common.cpu,
        };

        let rebuilt = match self.skeleton.take() {
            Some(skeleton) if skeleton.key == key => (skeleton, false),
            previous => {
                self.skeleton = previous;
                (Skeleton::build(key), true)
            }
        };
        let (skeleton, fresh_skeleton) = rebuilt;
        if fresh_skeleton {
            log::debug!(
                "cloud skeleton: {} layers, {} points",
                skeleton.layers.len(),
                skeleton.point_count()
            );
            self.state = CloudState::Skeleton;
        }

        let rdp = self.accumulate(&skeleton, &recipe);
        let max_rdp = rdp.iter().copied().fold(0.0, f64::max);
        let idx_tolerance = tolerance_indices(&rdp, max_rdp, config.cloud_tolerance);
        let idx_slider = slider_indices(&skeleton, &idx_tolerance, config.cloud_cull_x, config.cloud_cull_y);
        let active = if config.cloud_cull_x > 0.0 || config.cloud_cull_y > 0.0 {
            IndexSet::Slider
        } else {
            IndexSet::Tolerance
        };

        let mut buffers = GeometryBuffers::with_capacity(skeleton.point_count());
        for (v, density) in skeleton.vertices.iter().zip(&rdp) {
            buffers.push_vertex(*v);
            buffers.push_data(*density as f32);
        }
        buffers.replace_indices(match active {
            IndexSet::Tolerance => idx_tolerance.clone(),
            IndexSet::Slider => idx_slider.clone(),
        });

        if let Err(err) = buffers.validate_points() {
            if !fresh_skeleton {
                self.skeleton = Some(skeleton);
            }
            return Err(err);
        }

        let vert = if config.common.vert.is_empty() {
            if config.common.cpu { CLOUD_CPU_VERT } else { CLOUD_GPU_VERT }.to_owned()
        } else {
            config.common.vert.clone()
        };
        let frag = if config.common.frag.is_empty() {
            CLOUD_FRAG.to_owned()
        } else {
            config.common.frag.clone()
        };
        let mut updates = StateFlags::BUFFERS | StateFlags::UNIFORMS;
        if vert != self.vert {
            updates |= StateFlags::UPD_VERT_SHADER;
        }
        if frag != self.frag {
            updates |= StateFlags::UPD_FRAG_SHADER;
        }

        log::info!(
            "baked {} orbitals into {} points, {} drawn",
            recipe.orbital_count(),
            buffers.vertex_count(),
            buffers.index_count()
        );

        self.skeleton = Some(skeleton);
        self.buffers = buffers;
        self.idx_tolerance = idx_tolerance;
        self.idx_slider = idx_slider;
        self.active = active;
        self.max_rdp = max_rdp;
        self.config = Some(config);
        self.recipe = recipe;
        self.vert = vert;
        self.frag = frag;
        self.state = CloudState::Baked;
        self.updates |= updates;
        Ok(())
    }

    fn accumulate(&mut self, skeleton: &Skeleton, recipe: &RecipeMap) -> Vec<f64> {
        let mut rdp = vec![0.0; skeleton.point_count()];
        let mut scratch = vec![0.0; skeleton.point_count()];

        for (n, term) in recipe.orbitals() {
            self.state = CloudState::PerOrbital;
            scratch.iter_mut().for_each(|v| *v = 0.0);
            match self.orbital_density(skeleton, n, term, &mut scratch) {
                Ok(()) => {
                    let weight = term.weight as f64;
                    for (total, value) in rdp.iter_mut().zip(&scratch) {
                        *total += weight * value;
                    }
                }
                Err(err) => {
                    log::warn!("discarding orbital ({n}, {}, {}): {err}", term.l, term.m);
                }
            }
        }

        rdp
    }

    /// |psi|^2 r^2 of one orbital at every lattice point.
    fn orbital_density(
        &mut self,
        skeleton: &Skeleton,
        n: u32,
        term: OrbitalTerm,
        out: &mut [f64],
    ) -> Result<(), PhysicsError> {
        let (l, m) = (term.l, term.m);
        let n_r = *self.radial_norms.entry((n, l)).or_insert_with(|| radial_norm(n, l));
        let n_y = *self.angular_norms.entry((l, m)).or_insert_with(|| angular_norm(l, m));

        for layer in &skeleton.layers {
            let r = layer.radius;
            let rho = 2.0 * r / n as f64;
            let radial = radial_from_norm(n_r, n, l, rho)?;
            if !radial.is_finite() {
                return Err(PhysicsError::Domain { function: "radial_wavefunction" });
            }
            if radial_probability(radial, r, l) < LAYER_CULL_THRESHOLD {
                continue;
            }

            let legendre = (0..layer.steps)
                .map(|j| associated_legendre(l, m.unsigned_abs(), layer.angle(j).cos()))
                .collect::<Result<Vec<f64>, _>>()?;

            for i in 0..layer.steps {
                // e^{i m theta}; the Legendre factor carries the phi dependence
                let (sin, cos) = (m as f64 * layer.angle(i)).sin_cos();
                let phase = (cos, sin);
                for (j, p) in legendre.iter().enumerate() {
                    let y = (n_y * p * phase.0, n_y * p * phase.1);
                    let psi = complex_mul((radial, 0.0), y);
                    let density = complex_mul(psi, (psi.0, -psi.1)).0 * r * r;
                    if !density.is_finite() {
                        return Err(PhysicsError::Domain { function: "spherical_harmonic" });
                    }
                    out[layer.offset + i * layer.steps + j] = density;
                }
            }
        }

        Ok(())
    }

    /// Recomputes the slider subset for new cull fractions and draws it.
    pub fn set_slider_culling(&mut self, cull_x: f64, cull_y: f64) {
        let cull_x = cull_x.clamp(0.0, 1.0);
        let cull_y = cull_y.clamp(0.0, 1.0);
        let (Some(config), Some(skeleton)) = (self.config.as_mut(), self.skeleton.as_ref()) else {
            return;
        };
        config.cloud_cull_x = cull_x;
        config.cloud_cull_y = cull_y;
        self.idx_slider = slider_indices(skeleton, &self.idx_tolerance, cull_x, cull_y);
        self.activate(IndexSet::Slider);
    }

    /// Switches between the tolerance and slider subsets.
    pub fn use_slider_indices(&mut self, on: bool) {
        if self.config.is_none() {
            return;
        }
        self.activate(if on { IndexSet::Slider } else { IndexSet::Tolerance });
    }

    fn activate(&mut self, set: IndexSet) {
        let indices = match set {
            IndexSet::Tolerance => self.idx_tolerance.clone(),
            IndexSet::Slider => self.idx_slider.clone(),
        };
        self.buffers.replace_indices(indices);
        self.active = set;
        self.state = CloudState::SliderUpdated;
        self.updates |= StateFlags::UPD_EBO;
    }

    pub fn active_indices(&self) -> IndexSet {
        self.active
    }

    pub fn tolerance_indices(&self) -> &[u32] {
        &self.idx_tolerance
    }

    pub fn slider_indices(&self) -> &[u32] {
        &self.idx_slider
    }

    pub fn buffers(&self) -> &GeometryBuffers {
        &self.buffers
    }

    pub fn config(&self) -> Option<&CloudConfig> {
        self.config.as_ref()
    }

    pub fn recipe(&self) -> &RecipeMap {
        &self.recipe
    }

    pub fn state(&self) -> CloudState {
        self.state
    }

    pub fn max_rdp(&self) -> f64 {
        self.max_rdp
    }

    pub fn max_radius(&self) -> f64 {
        self.skeleton.as_ref().map_or(0.0, Skeleton::max_radius)
    }

    /// Radius and angular steps of every layer, innermost first.
    pub fn layers(&self) -> Vec<(f64, usize)> {
        self.skeleton
            .as_ref()
            .map(|s| s.layers.iter().map(|l| (l.radius, l.steps)).collect())
            .unwrap_or_default()
    }

    /// Lattice coordinates (radius, theta, phi) of point `index`.
    pub fn point_coordinates(&self, index: usize) -> Option<(f64, f64, f64)> {
        let skeleton = self.skeleton.as_ref()?;
        if index >= skeleton.point_count() {
            return None;
        }
        let layer = skeleton.layer_of(index);
        let local = index - layer.offset;
        Some((layer.radius, layer.angle(local / layer.steps), layer.angle(local % layer.steps)))
    }

    pub fn shader_vert(&self) -> &str {
        &self.vert
    }

    pub fn shader_frag(&self) -> &str {
        &self.frag
    }

    /// (max density, max radius) for the extent uniform.
    pub fn extent(&self) -> [f32; 4] {
        [self.max_rdp as f32, self.max_radius() as f32, 0.0, 0.0]
    }

    pub fn take_updates(&mut self) -> StateFlags {
        std::mem::replace(&mut self.updates, StateFlags::empty())
    }
}

/// Points at or above `tolerance * max`. A tolerance of one keeps only the
/// first point that attains the maximum.
fn tolerance_indices(rdp: &[f64], max: f64, tolerance: f64) -> Vec<u32> {
    if max <= 0.0 {
        return Vec::new();
    }
    if tolerance >= 1.0 {
        return rdp.iter().position(|&v| v == max).map(|i| vec![i as u32]).unwrap_or_default();
    }
    let cutoff = tolerance * max;
    rdp.iter()
        .enumerate()
        .filter(|&(_, &v)| v > 0.0 && v >= cutoff)
        .map(|(i, _)| i as u32)
        .collect()
}

fn slider_indices(skeleton: &Skeleton, tolerance: &[u32], cull_x: f64, cull_y: f64) -> Vec<u32> {
    tolerance
        .iter()
        .copied()
        .filter(|&i| {
            let (theta, radius) = skeleton.normalized(i as usize);
            theta >= cull_x && radius >= cull_y
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommonConfig;

    fn config(resolution: u32, divisor: u32, tolerance: f64) -> CloudConfig {
        CloudConfig {
            common: CommonConfig {
                cpu: true,
                ..CommonConfig::default()
            },
            cloud_resolution: resolution,
            cloud_lay_divisor: divisor,
            cloud_tolerance: tolerance,
            cloud_cull_x: 0.0,
            cloud_cull_y: 0.0,
        }
    }

    #[test]
    fn test_lattice_counts() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(4, 1, 0.05), RecipeMap::single(1, 0, 0)).unwrap();
        let layers = generator.layers();
        // 99% of the 1s density lies inside r = 4.2
        let orbits = CloudGenerator::orbit_count(generator.recipe()).unwrap();
        assert_eq!(orbits, 5);
        assert_eq!(layers.len(), orbits as usize);
        let expected: usize = (1..=orbits as usize).map(|k| (4 * k) * (4 * k)).sum();
        assert_eq!(generator.buffers().vertex_count(), expected);
        assert_eq!(generator.buffers().data_count(), expected);
        assert_eq!(layers[0], (1.0, 4));
    }

    #[test]
    fn test_lattice_encloses_radial_mass() {
        let dr = 1e-3;
        for n in 1..=8u32 {
            for l in [0, n - 1] {
                let recipe = RecipeMap::single(n, l, 0);
                let cfg = config(1, 2, 0.05);
                let layers = CloudGenerator::layer_count(&cfg, &recipe).unwrap();
                let r_max = layers as f64 / cfg.cloud_lay_divisor as f64;
                let steps = (r_max / dr) as usize;
                let enclosed: f64 = (1..=steps)
                    .map(|k| {
                        let r = k as f64 * dr;
                        let radial = crate::physics::radial_wavefunction(r, n, l).unwrap();
                        radial * radial * r * r * dr
                    })
                    .sum();
                assert!(enclosed >= RADIAL_COVERAGE, "n={n} l={l} r_max={r_max} enclosed={enclosed}");
            }
        }
    }

    #[test]
    fn test_steps_round_up() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(3, 2, 0.05), RecipeMap::single(1, 0, 0)).unwrap();
        // r = 0.5 -> ceil(1.5) = 2
        assert_eq!(generator.layers()[0], (0.5, 2));
    }

    #[test]
    fn test_ground_state_peaks_at_bohr_radius() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(30, 2, 0.05), RecipeMap::single(1, 0, 0)).unwrap();
        let buffers = generator.buffers();

        assert!(buffers.index_count() > 0);
        assert!(buffers.data().iter().all(|v| v.is_finite()));

        let data = buffers.data();
        let argmax = (0..data.len()).fold(0, |best, i| if data[i] > data[best] { i } else { best });
        let (r, _, _) = generator.point_coordinates(argmax).unwrap();
        assert_eq!(r, 1.0);

        // spherically symmetric: one layer carries a single value
        let (radius, steps) = generator.layers()[1];
        assert_eq!(radius, 1.0);
        let offset = generator.layers()[0].1.pow(2);
        let layer = &data[offset..offset + steps * steps];
        assert!(layer.iter().all(|v| (v - layer[0]).abs() <= 1e-6 * layer[0]));
    }

    #[test]
    fn test_2pz_lobes() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(8, 1, 0.05), RecipeMap::single(2, 1, 0)).unwrap();
        let data = generator.buffers().data();

        // layer r = 4 has 32 steps, so phi = pi/2 sits at j = 8
        let layers = generator.layers();
        let (radius, steps) = layers[3];
        assert_eq!((radius, steps), (4.0, 32));
        let offset: usize = layers[..3].iter().map(|(_, s)| s * s).sum();
        let layer_max = data[offset..offset + steps * steps].iter().cloned().fold(0.0, f32::max);
        for i in 0..steps {
            let row = offset + i * steps;
            assert!(data[row + 8] < 1e-6 * layer_max);
            assert!(data[row + 24] < 1e-6 * layer_max);
            assert!((data[row] - layer_max).abs() <= 1e-5 * layer_max);
            assert!((data[row + 16] - layer_max).abs() <= 1e-5 * layer_max);
        }
    }

    #[test]
    fn test_layer_cull_skips_low_density() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(4, 4, 0.05), RecipeMap::single(1, 0, 0)).unwrap();
        // a layer is either skipped entirely or filled everywhere
        let data = generator.buffers().data();
        let layers = generator.layers();
        let last = layers.last().unwrap();
        let offset = data.len() - last.1 * last.1;
        let radial = crate::physics::radial_wavefunction(last.0, 1, 0).unwrap();
        let kept = radial_probability(radial, last.0, 0) >= LAYER_CULL_THRESHOLD;
        assert_eq!(data[offset..].iter().any(|&v| v > 0.0), kept);
        assert!(data[..layers[0].1.pow(2)].iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_tolerance_one_selects_single_point() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(8, 2, 1.0), RecipeMap::single(2, 1, 1)).unwrap();
        let indices = generator.buffers().indices();
        assert_eq!(indices.len(), 1);
        let data = generator.buffers().data();
        let max = data.iter().cloned().fold(0.0, f32::max);
        assert_eq!(data[indices[0] as usize], max);
    }

    #[test]
    fn test_tiny_tolerance_selects_positive_points() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(6, 2, 1e-300), RecipeMap::single(2, 1, 0)).unwrap();
        let data = generator.buffers().data();
        let positive = generator.tolerance_indices().len();
        let expected = generator.buffers().data().len()
            - data.iter().filter(|&&v| v <= 0.0).count();
        // f32 storage can flush the smallest doubles to zero, the selection works on the doubles
        assert!(positive >= expected);
        for &i in generator.tolerance_indices() {
            assert!(data[i as usize] >= 0.0);
        }
    }

    #[test]
    fn test_slider_switch_preserves_counts() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(8, 2, 0.05), RecipeMap::single(2, 1, 0)).unwrap();
        generator.take_updates();
        let vertices = generator.buffers().vertex_count();
        let data = generator.buffers().data_count();
        let baseline = generator.buffers().index_count();

        generator.set_slider_culling(0.5, 0.25);
        assert_eq!(generator.active_indices(), IndexSet::Slider);
        assert!(generator.buffers().index_count() < baseline);
        assert_eq!(generator.buffers().vertex_count(), vertices);
        assert_eq!(generator.buffers().data_count(), data);
        assert_eq!(generator.take_updates(), StateFlags::UPD_EBO);
        assert_eq!(generator.state(), CloudState::SliderUpdated);

        for &i in generator.buffers().indices() {
            let (r, theta, _) = generator.point_coordinates(i as usize).unwrap();
            assert!(theta / TAU >= 0.5 - 1e-12);
            assert!(r / generator.max_radius() >= 0.25);
        }

        generator.use_slider_indices(false);
        assert_eq!(generator.buffers().index_count(), baseline);
        assert_eq!(generator.buffers().vertex_count(), vertices);
    }

    #[test]
    fn test_rebake_is_bit_identical() {
        let recipe = RecipeMap::from_json(r#"{"2": [{"l": 1, "m": 1}], "3": [{"l": 2, "m": -1, "weight": 2}]}"#).unwrap();
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(5, 1, 0.05), recipe.clone()).unwrap();
        let first = generator.buffers().clone();
        generator.new_cloud(config(5, 1, 0.05), recipe.clone()).unwrap();
        assert_eq!(generator.buffers().vertex_bytes(), first.vertex_bytes());
        assert_eq!(generator.buffers().data_bytes(), first.data_bytes());

        let mut other = CloudGenerator::new();
        other.new_cloud(config(5, 1, 0.05), recipe).unwrap();
        assert_eq!(other.buffers().data_bytes(), first.data_bytes());
    }

    #[test]
    fn test_weights_scale_density() {
        let mut single = CloudGenerator::new();
        single.new_cloud(config(4, 1, 0.05), RecipeMap::single(2, 0, 0)).unwrap();
        let mut weighted_recipe = RecipeMap::new();
        weighted_recipe.add(2, OrbitalTerm::weighted(0, 0, 3));
        let mut weighted = CloudGenerator::new();
        weighted.new_cloud(config(4, 1, 0.05), weighted_recipe).unwrap();

        for (a, b) in single.buffers().data().iter().zip(weighted.buffers().data()) {
            assert!((3.0 * a - b).abs() <= 1e-6 * b.abs().max(1e-30));
        }
    }

    #[test]
    fn test_gpu_skeleton_packs_spherical_coordinates() {
        let mut cfg = config(4, 1, 0.05);
        cfg.common.cpu = false;
        let mut generator = CloudGenerator::new();
        generator.new_cloud(cfg, RecipeMap::single(1, 0, 0)).unwrap();
        let v = generator.buffers().vertices()[5];
        let (r, theta, phi) = generator.point_coordinates(5).unwrap();
        assert_eq!(v, [theta as f32, phi as f32, r as f32]);
        assert_eq!(generator.shader_vert(), CLOUD_GPU_VERT);
    }

    #[test]
    fn test_indices_in_range() {
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config(6, 2, 0.01), RecipeMap::single(3, 2, 1)).unwrap();
        let count = generator.buffers().vertex_count() as u32;
        assert!(generator.buffers().indices().iter().all(|&i| i < count));
        assert!(generator.slider_indices().iter().all(|&i| i < count));
    }
}
