//! Binds generator output to device buffers and drives each frame.
//!
//! The controller owns the named model buffers, the active program and the
//! crystal. Generation happens on the worker; every frame polls it, pushes
//! whatever the flags say is stale and then draws the crystal followed by
//! the model.

use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Vec3};
use parking_lot::Mutex;

use super::registry::BufferRegistry;
use super::worker::{Generator, Job, Outcome, Poll, Worker};
use super::{
    BufferName, BufferRole, DrawCall, GraphicsDevice, ProgramDesc, SceneUniforms, Topology, UploadUsage,
    VertexLayout,
};
use crate::cloud::CloudGenerator;
use crate::color::{WaveColorSlot, WaveColors};
use crate::config::{CloudConfig, RecipeMap, WaveConfig};
use crate::crystal::crystal;
use crate::error::{AtomixError, ConfigError, RenderError};
use crate::flags::{Mode, StateFlags};
use crate::shaders::{ShaderRegistry, ShaderStage, CRYSTAL_FRAG, CRYSTAL_VERT};
use crate::telemetry::{AtomixInfo, TelemetrySink};
use crate::wave::{WaveGenerator, ALL_WAVES};

/// Consecutive failed frames before a mode is torn down.
pub const MAX_ALLOCATION_FAILURES: u32 = 3;

pub const CRYSTAL_PROGRAM: &str = "crystal";

/// Green / red / amber indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    /// The last config was rejected.
    Invalid,
    /// The model could not be kept on the device.
    Degraded,
}

impl Status {
    pub fn indicator(self) -> &'static str {
        match self {
            Status::Ready => "green",
            Status::Invalid => "red",
            Status::Degraded => "amber",
        }
    }
}

/// Edits made while the generator is out on the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
enum GeneratorEdit {
    RenderedWaves(u8),
    Color(WaveColorSlot, u32),
    Culling(f64, f64),
    SliderIndices(bool),
}

struct Crystal<D: GraphicsDevice> {
    program: D::Program,
    vertices: D::Buffer,
    indices: D::Buffer,
    index_count: u32,
}

pub struct RenderController<D: GraphicsDevice> {
    device: D,
    shaders: ShaderRegistry,
    flags: Arc<Mutex<StateFlags>>,
    worker: Worker,
    wave: Option<Box<WaveGenerator>>,
    cloud: Option<Box<CloudGenerator>>,
    pending: Option<Job>,
    edits: Vec<GeneratorEdit>,
    /// Last wave selection, kept across regeneration.
    rendered_waves: u8,
    registry: BufferRegistry<D::Buffer>,
    program: Option<D::Program>,
    crystal: Option<Crystal<D>>,
    uniforms: SceneUniforms,
    status: Status,
    allocation_failures: u32,
    telemetry: Box<dyn TelemetrySink>,
    info: AtomixInfo,
    created: Instant,
    time: f64,
}

/// Bytes and role of one model stream.
fn model_stream<'a>(
    wave: Option<&'a WaveGenerator>,
    cloud: Option<&'a CloudGenerator>,
    mode: Mode,
    name: BufferName,
) -> Option<(BufferRole, &'a [u8])> {
    let buffers = match mode {
        Mode::Wave => wave?.buffers(),
        Mode::Cloud => cloud?.buffers(),
    };
    Some(match (name, mode) {
        (BufferName::Vertices, _) => (BufferRole::Position, buffers.vertex_bytes()),
        (BufferName::Data, Mode::Wave) => (BufferRole::Attribute, buffers.attribute_bytes()),
        (BufferName::Data, Mode::Cloud) => (BufferRole::Scalar, buffers.data_bytes()),
        (BufferName::Indices, _) => (BufferRole::Index, buffers.index_bytes()),
    })
}

fn upload_bit(name: BufferName) -> StateFlags {
    match name {
        BufferName::Vertices => StateFlags::UPD_VBO,
        BufferName::Data => StateFlags::UPD_DATA,
        BufferName::Indices => StateFlags::UPD_EBO,
    }
}

impl<D: GraphicsDevice> RenderController<D> {
    /// Starts the worker and puts the crystal on the device.
    pub fn new(mut device: D, shaders: ShaderRegistry, telemetry: Box<dyn TelemetrySink>) -> Result<Self, AtomixError> {
        let flags = Arc::new(Mutex::new(StateFlags::empty()));
        let worker = Worker::new(Arc::clone(&flags)).map_err(RenderError::from)?;
        let crystal = Self::create_crystal(&mut device, &shaders)?;

        Ok(RenderController {
            device,
            shaders,
            flags,
            worker,
            wave: None,
            cloud: None,
            pending: None,
            edits: Vec::new(),
            rendered_waves: ALL_WAVES,
            registry: BufferRegistry::new(),
            program: None,
            crystal: Some(crystal),
            uniforms: SceneUniforms::default(),
            status: Status::Ready,
            allocation_failures: 0,
            telemetry,
            info: AtomixInfo::default(),
            created: Instant::now(),
            time: 0.0,
        })
    }

    fn create_crystal(device: &mut D, shaders: &ShaderRegistry) -> Result<Crystal<D>, RenderError> {
        let geometry = crystal();
        let vert = shaders.source(ShaderStage::Vertex, CRYSTAL_VERT)?;
        let frag = shaders.source(ShaderStage::Fragment, CRYSTAL_FRAG)?;
        let program = device.create_program(&ProgramDesc {
            label: CRYSTAL_PROGRAM,
            vert_name: CRYSTAL_VERT,
            vert_source: &vert,
            frag_name: CRYSTAL_FRAG,
            frag_source: &frag,
            layout: VertexLayout::PositionOnly,
            topology: Topology::LineList,
        })?;
        let vertices = device.create_buffer(
            BufferName::Vertices,
            BufferRole::Position,
            UploadUsage::Static,
            geometry.vertex_bytes(),
        )?;
        let indices = device.create_buffer(
            BufferName::Indices,
            BufferRole::Index,
            UploadUsage::Static,
            geometry.index_bytes(),
        )?;

        Ok(Crystal {
            program,
            vertices,
            indices,
            index_count: geometry.index_count() as u32,
        })
    }

    /// Validates `config` and queues wave generation.
    pub fn on_new_wave_config(&mut self, config: WaveConfig) -> Result<(), AtomixError> {
        if let Err(err) = config.validate() {
            log::warn!("rejected wave config: {err}");
            self.status = Status::Invalid;
            return Err(err.into());
        }
        self.submit(Job::Wave(config));
        Ok(())
    }

    /// Validates `config` and `recipe` and queues cloud generation.
    pub fn on_new_cloud_config(&mut self, config: CloudConfig, recipe: RecipeMap) -> Result<(), AtomixError> {
        if let Err(err) = config.validate().and_then(|()| recipe.validate()) {
            log::warn!("rejected cloud config: {err}");
            self.status = Status::Invalid;
            return Err(err.into());
        }
        self.submit(Job::Cloud(config, recipe));
        Ok(())
    }

    fn submit(&mut self, job: Job) {
        let mode = job.mode();
        self.status = Status::Ready;
        self.allocation_failures = 0;

        let current = self.flags.lock().mode();
        if current != Some(mode) {
            self.flags.lock().enter_mode(mode);
            self.change_modes(false);
        }

        if self.worker.is_busy() {
            if self.pending.replace(job).is_some() {
                log::debug!("replaced queued {} request", mode.name());
            }
            return;
        }

        let generator = self.take_generator(mode);
        self.worker.spawn(generator, job);
    }

    fn take_generator(&mut self, mode: Mode) -> Generator {
        match mode {
            Mode::Wave => Generator::Wave(self.wave.take().unwrap_or_default()),
            Mode::Cloud => Generator::Cloud(self.cloud.take().unwrap_or_default()),
        }
    }

    fn store_generator(&mut self, generator: Generator) {
        match generator {
            Generator::Wave(g) => self.wave = Some(g),
            Generator::Cloud(g) => self.cloud = Some(g),
        }
    }

    fn spawn_pending(&mut self) {
        if let Some(job) = self.pending.take() {
            let generator = self.take_generator(job.mode());
            self.worker.spawn(generator, job);
        }
    }

    /// Releases the generator, buffers and program of every mode except the
    /// current one; with `force`, of every mode.
    pub fn change_modes(&mut self, force: bool) {
        let keep = if force { None } else { self.flags.lock().mode() };

        if keep != Some(Mode::Wave) {
            self.rendered_waves = ALL_WAVES;
            if self.wave.take().is_some() {
                log::debug!("released wave generator");
            }
        }
        if keep != Some(Mode::Cloud) && self.cloud.take().is_some() {
            log::debug!("released cloud generator");
        }
        if self.program.take().is_some() {
            log::debug!("released model program");
        }
        self.registry.clear();
        self.edits.clear();
        self.allocation_failures = 0;

        let mut flags = self.flags.lock();
        flags.remove(StateFlags::UPDATES);
        if force {
            flags.clear_mode();
        }
    }

    pub fn select_rendered_waves(&mut self, bits: u8) -> Result<(), AtomixError> {
        self.edit_wave(GeneratorEdit::RenderedWaves(bits))?;
        self.rendered_waves = bits;
        self.request(StateFlags::UPD_EBO);
        Ok(())
    }

    pub fn select_wave(&mut self, index: u8, on: bool) -> Result<(), AtomixError> {
        if index >= 8 {
            return Err(ConfigError::invalid(format!("wave index {index} out of range")).into());
        }
        let bits = self.rendered_waves;
        let bits = if on { bits | (1 << index) } else { bits & !(1 << index) };
        self.select_rendered_waves(bits)
    }

    /// Selected waves, bit `i` for wave `i`; valid while a regeneration is
    /// still out on the worker.
    pub fn rendered_waves(&self) -> u8 {
        self.rendered_waves
    }

    pub fn set_wave_color(&mut self, slot: WaveColorSlot, word: u32) -> Result<(), AtomixError> {
        self.edit_wave(GeneratorEdit::Color(slot, word))?;
        self.request(StateFlags::UPD_COLOR_UNIFORMS);
        Ok(())
    }

    pub fn set_cloud_culling(&mut self, cull_x: f64, cull_y: f64) -> Result<(), AtomixError> {
        self.edit_cloud(GeneratorEdit::Culling(cull_x, cull_y))?;
        self.request(StateFlags::UPD_EBO);
        Ok(())
    }

    pub fn use_slider_indices(&mut self, on: bool) -> Result<(), AtomixError> {
        self.edit_cloud(GeneratorEdit::SliderIndices(on))?;
        self.request(StateFlags::UPD_EBO);
        Ok(())
    }

    fn edit_wave(&mut self, edit: GeneratorEdit) -> Result<(), AtomixError> {
        if self.mode() != Some(Mode::Wave) {
            return Err(AtomixError::ModeInactive(Mode::Wave.name()));
        }
        match self.wave.as_deref_mut() {
            Some(generator) => apply_wave_edit(generator, edit),
            None => self.edits.push(edit),
        }
        Ok(())
    }

    fn edit_cloud(&mut self, edit: GeneratorEdit) -> Result<(), AtomixError> {
        if self.mode() != Some(Mode::Cloud) {
            return Err(AtomixError::ModeInactive(Mode::Cloud.name()));
        }
        match self.cloud.as_deref_mut() {
            Some(generator) => apply_cloud_edit(generator, edit),
            None => self.edits.push(edit),
        }
        Ok(())
    }

    fn apply_edits(&mut self) {
        for edit in std::mem::take(&mut self.edits) {
            if let Some(generator) = self.wave.as_deref_mut() {
                apply_wave_edit(generator, edit);
            }
            if let Some(generator) = self.cloud.as_deref_mut() {
                apply_cloud_edit(generator, edit);
            }
        }
    }

    fn request(&mut self, bits: StateFlags) {
        self.flags.lock().insert(bits | StateFlags::UPDATE_REQUIRED);
    }

    pub fn set_matrices(&mut self, model: Mat4, view: Mat4, projection: Mat4) {
        self.uniforms.set_matrices(model, view, projection);
        self.request(StateFlags::UPD_MATRICES);
    }

    /// Records the camera for telemetry.
    pub fn set_camera(&mut self, position: Vec3, near: f32, far: f32) {
        self.info.camera_pos = position.to_array();
        self.info.near = near;
        self.info.far = far;
        self.report();
    }

    /// One tick: poll the worker, push stale state, draw.
    pub fn frame(&mut self, t: f64) {
        self.time = t;
        self.poll_worker();
        self.advance(t);
        if self.flags.lock().contains(StateFlags::UPDATE_REQUIRED) {
            self.update_buffers_and_shaders();
        }
        self.draw();
    }

    fn poll_worker(&mut self) {
        match self.worker.poll() {
            Poll::Finished(outcome) => self.handle_outcome(outcome),
            Poll::Lost => self.handle_lost(),
            Poll::Idle | Poll::Busy => {}
        }
    }

    /// Blocks until the worker and any queued request have finished.
    pub fn finish_pending_work(&mut self) {
        loop {
            match self.worker.wait() {
                Poll::Finished(outcome) => self.handle_outcome(outcome),
                Poll::Lost => self.handle_lost(),
                Poll::Idle | Poll::Busy => break,
            }
        }
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        self.flags.lock().remove(StateFlags::THREAD_FINISHED);
        let Outcome {
            generator,
            result,
            elapsed,
        } = outcome;
        let mode = generator.mode();

        if self.mode() != Some(mode) {
            log::debug!("dropping {} result after a mode change", mode.name());
            self.discard();
            self.spawn_pending();
            return;
        }

        self.store_generator(generator);

        if self.pending.is_some() {
            log::warn!("discarding stale {} result", mode.name());
            self.discard();
            self.spawn_pending();
            return;
        }

        match result {
            Ok(()) => {
                log::info!("generated {} model in {:.1?}", mode.name(), elapsed);
                self.apply_edits();
                let mut flags = self.flags.lock();
                flags.insert(StateFlags::UPDATE_REQUIRED);
                flags.enable_render();
            }
            Err(err) => {
                log::warn!("discarding {} result: {err}", mode.name());
                self.discard();
            }
        }
    }

    fn handle_lost(&mut self) {
        log::error!("worker task ended without a result");
        self.flags.lock().remove(StateFlags::THREAD_FINISHED);
        self.discard();
        self.spawn_pending();
    }

    fn discard(&mut self) {
        self.info.discarded_results += 1;
        self.report();
    }

    /// Per-frame animation: CPU waves are recomputed, GPU waves only need
    /// the new time.
    fn advance(&mut self, t: f64) {
        if !self.flags.lock().contains(StateFlags::WAVE_RENDER) {
            return;
        }
        let Some(generator) = self.wave.as_deref_mut() else {
            return;
        };
        if generator.is_dynamic() {
            generator.update(t);
            self.request(StateFlags::empty());
        } else {
            self.request(StateFlags::UPD_MATHS_UNIFORMS);
        }
    }

    fn update_buffers_and_shaders(&mut self) {
        let Some(mode) = self.mode() else {
            self.flags.lock().remove(StateFlags::UPDATES);
            return;
        };

        let delta = match mode {
            Mode::Wave => self.wave.as_deref_mut().map(WaveGenerator::take_updates),
            Mode::Cloud => self.cloud.as_deref_mut().map(CloudGenerator::take_updates),
        };
        let has_generator = delta.is_some();
        let mut pending = {
            let mut flags = self.flags.lock();
            flags.insert(delta.unwrap_or(StateFlags::empty()));
            *flags & StateFlags::UPDATES
        };

        if has_generator {
            if self.program.is_none() || pending.intersects(StateFlags::SHADERS) {
                match self.build_program(mode) {
                    Ok(program) => {
                        self.program = Some(program);
                        pending.remove(StateFlags::SHADERS);
                    }
                    Err(err) => {
                        log::error!("{err}");
                        self.tear_down();
                        return;
                    }
                }
            }

            let usage = if self.wave.as_deref().is_some_and(WaveGenerator::is_dynamic) {
                UploadUsage::Dynamic
            } else {
                UploadUsage::Static
            };
            let mut resized = false;
            let mut failed = false;

            for name in [BufferName::Vertices, BufferName::Data, BufferName::Indices] {
                let bit = upload_bit(name);
                if !pending.contains(bit) {
                    continue;
                }
                let Some((role, bytes)) = model_stream(self.wave.as_deref(), self.cloud.as_deref(), mode, name)
                else {
                    continue;
                };
                match self.registry.upload(&mut self.device, name, role, usage, bytes) {
                    Ok(op) => {
                        pending.remove(bit);
                        resized |= op.allocated();
                    }
                    Err(err) => {
                        log::error!("{err}");
                        failed = true;
                        break;
                    }
                }
            }

            if failed {
                self.allocation_failures += 1;
                self.status = Status::Degraded;
                if self.allocation_failures >= MAX_ALLOCATION_FAILURES {
                    log::error!(
                        "giving up on {} mode after {} failed frames",
                        mode.name(),
                        self.allocation_failures
                    );
                    self.tear_down();
                    return;
                }
            } else if self.allocation_failures > 0 {
                log::info!("{} buffers recovered after {} failed frames", mode.name(), self.allocation_failures);
                self.allocation_failures = 0;
                if self.status == Status::Degraded {
                    self.status = Status::Ready;
                }
            }

            if resized {
                self.report();
            }
        }

        if pending.intersects(StateFlags::UNIFORMS) {
            self.refresh_uniforms(mode);
            pending.remove(StateFlags::UNIFORMS);
        }

        let mut flags = self.flags.lock();
        flags.remove(StateFlags::UPDATES);
        let remaining = pending & (StateFlags::BUFFERS | StateFlags::SHADERS | StateFlags::UNIFORMS);
        flags.insert(remaining);
        if !remaining.is_empty() {
            flags.insert(StateFlags::UPDATE_REQUIRED);
        }
    }

    fn build_program(&mut self, mode: Mode) -> Result<D::Program, RenderError> {
        let (vert, frag, layout) = match mode {
            Mode::Wave => self.wave.as_deref().map(|g| {
                (g.shader_vert().to_owned(), g.shader_frag().to_owned(), VertexLayout::WithAttribute)
            }),
            Mode::Cloud => self.cloud.as_deref().map(|g| {
                (g.shader_vert().to_owned(), g.shader_frag().to_owned(), VertexLayout::WithScalar)
            }),
        }
        .ok_or(RenderError::NoGenerator(mode.name()))?;
        let vert_source = self.shaders.source(ShaderStage::Vertex, &vert)?;
        let frag_source = self.shaders.source(ShaderStage::Fragment, &frag)?;

        // the old pipeline goes before the new one is built
        self.program = None;
        log::info!("building {} program from {vert} + {frag}", mode.name());
        self.device.create_program(&ProgramDesc {
            label: mode.name(),
            vert_name: &vert,
            vert_source: &vert_source,
            frag_name: &frag,
            frag_source: &frag_source,
            layout,
            topology: Topology::PointList,
        })
    }

    fn refresh_uniforms(&mut self, mode: Mode) {
        match mode {
            Mode::Wave => {
                if let Some(g) = self.wave.as_deref() {
                    let [peak, base, trough] = g.colors().as_words();
                    self.uniforms.maths = g.maths(self.time);
                    self.uniforms.colors = [peak, base, trough, 0];
                    self.uniforms.mode = g.mode_bits();
                    self.uniforms.extent = [0.0; 4];
                }
            }
            Mode::Cloud => {
                if let Some(g) = self.cloud.as_deref() {
                    let cpu = g.config().is_some_and(|c| c.common.cpu);
                    let [peak, base, trough] = WaveColors::cloud().as_words();
                    self.uniforms.maths = [0.0; 4];
                    self.uniforms.colors = [peak, base, trough, 0];
                    self.uniforms.extent = g.extent();
                    self.uniforms.mode = [0, 0, cpu as u32, 0];
                }
            }
        }
        self.device.write_uniforms(&self.uniforms);
    }

    /// Drops the active model after unrecoverable device errors.
    fn tear_down(&mut self) {
        self.change_modes(true);
        self.pending = None;
        self.status = Status::Degraded;
    }

    fn draw(&mut self) {
        if let Err(err) = self.device.begin_frame() {
            log::warn!("skipping frame: {err}");
            return;
        }

        if let Some(crystal) = &self.crystal {
            self.device.draw(&DrawCall {
                program: &crystal.program,
                vertices: &crystal.vertices,
                data: None,
                indices: &crystal.indices,
                index_count: crystal.index_count,
            });
        }

        let rendering = self.flags.lock().is_rendering();
        if rendering && self.allocation_failures == 0 {
            let vertices = self.registry.get(BufferName::Vertices);
            let indices = self.registry.get(BufferName::Indices);
            if let (Some(program), Some(vertices), Some(indices)) = (&self.program, vertices, indices) {
                if indices.count > 0 {
                    self.device.draw(&DrawCall {
                        program,
                        vertices: &vertices.buffer,
                        data: self.registry.get(BufferName::Data).map(|r| &r.buffer),
                        indices: &indices.buffer,
                        index_count: indices.count as u32,
                    });
                }
            }
        }

        self.device.end_frame();
    }

    fn report(&mut self) {
        self.info.start = self.created.elapsed();
        self.info.vertex_bytes = self.registry.size(BufferName::Vertices);
        self.info.data_bytes = self.registry.size(BufferName::Data);
        self.info.index_bytes = self.registry.size(BufferName::Indices);
        self.telemetry.report(&self.info);
    }

    /// Waits for the worker, then releases every device resource.
    pub fn cleanup(&mut self) {
        if self.worker.is_busy() {
            log::info!("waiting for the worker to finish");
            // result is dropped with its generator
            let _ = self.worker.wait();
        }
        self.pending = None;
        self.change_modes(true);
        self.crystal = None;
        self.flags.lock().remove(StateFlags::THREAD_FINISHED);
    }

    pub fn mode(&self) -> Option<Mode> {
        self.flags.lock().mode()
    }

    pub fn flags(&self) -> StateFlags {
        *self.flags.lock()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// False while the last config was rejected.
    pub fn can_generate(&self) -> bool {
        self.status != Status::Invalid
    }

    pub fn is_busy(&self) -> bool {
        self.worker.is_busy()
    }

    pub fn info(&self) -> AtomixInfo {
        self.info
    }

    pub fn wave_generator(&self) -> Option<&WaveGenerator> {
        self.wave.as_deref()
    }

    pub fn cloud_generator(&self) -> Option<&CloudGenerator> {
        self.cloud.as_deref()
    }

    pub fn registry(&self) -> &BufferRegistry<D::Buffer> {
        &self.registry
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    pub fn uniforms(&self) -> &SceneUniforms {
        &self.uniforms
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: GraphicsDevice> Drop for RenderController<D> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn apply_wave_edit(generator: &mut WaveGenerator, edit: GeneratorEdit) {
    match edit {
        GeneratorEdit::RenderedWaves(bits) => generator.set_rendered_waves(bits),
        GeneratorEdit::Color(slot, word) => generator.set_color(slot, word),
        GeneratorEdit::Culling(..) | GeneratorEdit::SliderIndices(_) => {}
    }
}

fn apply_cloud_edit(generator: &mut CloudGenerator, edit: GeneratorEdit) {
    match edit {
        GeneratorEdit::Culling(x, y) => generator.set_slider_culling(x, y),
        GeneratorEdit::SliderIndices(on) => generator.use_slider_indices(on),
        GeneratorEdit::RenderedWaves(_) | GeneratorEdit::Color(..) => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::GeneratorError;
    use crate::render::recording::{DeviceEvent, RecordingDevice};
    use crate::telemetry::LogSink;

    fn controller() -> (RenderController<RecordingDevice>, RecordingDevice) {
        let device = RecordingDevice::new();
        let controller =
            RenderController::new(device.clone(), ShaderRegistry::builtin(), Box::new(LogSink)).unwrap();
        (controller, device)
    }

    fn waves(count: u32, cpu: bool) -> WaveConfig {
        let mut config = WaveConfig {
            waves: count,
            ..WaveConfig::default()
        };
        config.common.resolution = 16;
        config.common.cpu = cpu;
        config
    }

    fn small_cloud() -> CloudConfig {
        CloudConfig {
            cloud_resolution: 4,
            cloud_lay_divisor: 1,
            ..CloudConfig::default()
        }
    }

    #[test]
    fn test_crystal_drawn_every_frame() {
        let (mut controller, device) = controller();
        controller.frame(0.0);
        controller.frame(0.1);
        assert_eq!(device.draws(CRYSTAL_PROGRAM), 2);
        assert_eq!(device.created(BufferName::Vertices), 1);
        assert_eq!(device.frames(), 2);
    }

    #[test]
    fn test_invalid_config_turns_status_red() {
        let (mut controller, _device) = controller();
        let err = controller.on_new_wave_config(waves(9, false)).unwrap_err();
        assert!(matches!(err, AtomixError::Config(ConfigError::InvalidConfig(_))));
        assert_eq!(controller.status(), Status::Invalid);
        assert!(!controller.can_generate());
        assert!(!controller.is_busy());

        controller.on_new_wave_config(waves(2, false)).unwrap();
        assert_eq!(controller.status(), Status::Ready);
        assert!(controller.can_generate());
    }

    #[test]
    fn test_invalid_recipe_is_rejected() {
        let (mut controller, _device) = controller();
        let err = controller
            .on_new_cloud_config(small_cloud(), RecipeMap::single(2, 2, 0))
            .unwrap_err();
        assert!(matches!(err, AtomixError::Config(_)));
        assert_eq!(controller.status().indicator(), "red");
        assert_eq!(controller.mode(), None);
    }

    #[test]
    fn test_first_frame_uploads_and_draws() {
        let (mut controller, device) = controller();
        controller.on_new_wave_config(waves(2, false)).unwrap();
        controller.finish_pending_work();
        assert!(controller.flags().contains(StateFlags::UPDATE_REQUIRED | StateFlags::WAVE_RENDER));

        controller.frame(0.0);
        assert!(controller.has_program());
        assert_eq!(controller.registry().get(BufferName::Indices).unwrap().count, 32);
        assert_eq!(device.draws("wave"), 1);
        assert!(!controller.flags().intersects(StateFlags::BUFFERS | StateFlags::SHADERS));
        let data = controller.registry().get(BufferName::Data).unwrap();
        assert_eq!(data.role, BufferRole::Attribute);
        assert_eq!(data.usage, UploadUsage::Static);
    }

    #[test]
    fn test_select_wave_is_index_only() {
        let (mut controller, device) = controller();
        controller.on_new_wave_config(waves(3, false)).unwrap();
        controller.finish_pending_work();
        controller.frame(0.0);
        device.clear_events();

        controller.select_wave(1, false).unwrap();
        controller.frame(0.1);
        let writes: Vec<BufferName> = device
            .events()
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::WriteBuffer { name, .. } => Some(*name),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![BufferName::Indices]);
        assert_eq!(controller.registry().get(BufferName::Indices).unwrap().count, 32);
        assert_eq!(controller.registry().get(BufferName::Vertices).unwrap().count, 48);
        assert!(controller.select_wave(8, true).is_err());
    }

    #[test]
    fn test_wave_operations_need_wave_mode() {
        let (mut controller, _device) = controller();
        controller.on_new_cloud_config(small_cloud(), RecipeMap::single(1, 0, 0)).unwrap();
        assert!(matches!(
            controller.select_rendered_waves(1),
            Err(AtomixError::ModeInactive("wave"))
        ));
        assert!(matches!(
            controller.set_wave_color(WaveColorSlot::Peak, 0),
            Err(AtomixError::ModeInactive("wave"))
        ));
        controller.finish_pending_work();
        assert!(controller.set_cloud_culling(0.5, 0.0).is_ok());
    }

    #[test]
    fn test_edits_while_busy_are_applied_on_return() {
        let (mut controller, _device) = controller();
        controller.on_new_wave_config(waves(3, false)).unwrap();
        controller.select_wave(0, false).unwrap();
        controller.set_wave_color(WaveColorSlot::Base, 0x1122_33FF).unwrap();
        controller.finish_pending_work();

        let generator = controller.wave_generator().unwrap();
        assert_eq!(generator.rendered_waves(), 0b1111_1110);
        assert_eq!(generator.colors().base, 0x1122_33FF);
        assert_eq!(generator.buffers().index_count(), 32);
    }

    #[test]
    fn test_color_reaches_uniforms() {
        let (mut controller, device) = controller();
        controller.on_new_wave_config(waves(1, false)).unwrap();
        controller.finish_pending_work();
        controller.frame(0.0);
        controller.set_wave_color(WaveColorSlot::Trough, 0xABCD_EF01).unwrap();
        controller.frame(0.1);
        assert_eq!(device.uniforms().unwrap().colors[2], 0xABCD_EF01);
    }

    #[test]
    fn test_gpu_waves_push_time_every_frame() {
        let (mut controller, device) = controller();
        controller.on_new_wave_config(waves(1, false)).unwrap();
        controller.finish_pending_work();
        controller.frame(0.0);
        controller.frame(1.5);
        assert_eq!(device.uniforms().unwrap().maths[3], 1.5);
    }

    #[test]
    fn test_cpu_waves_rewrite_in_place() {
        let (mut controller, device) = controller();
        controller.on_new_wave_config(waves(2, true)).unwrap();
        controller.finish_pending_work();
        controller.frame(0.0);
        let first = device.contents(BufferName::Vertices).unwrap();
        controller.frame(0.75);
        let second = device.contents(BufferName::Vertices).unwrap();

        assert_ne!(first, second);
        assert_eq!(device.created(BufferName::Vertices), 2);
        assert_eq!(controller.registry().get(BufferName::Data).unwrap().usage, UploadUsage::Dynamic);
        assert_eq!(second, controller.wave_generator().unwrap().buffers().vertex_bytes());
    }

    #[test]
    fn test_matrices_upload() {
        let (mut controller, device) = controller();
        controller.on_new_wave_config(waves(1, false)).unwrap();
        controller.finish_pending_work();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        controller.set_matrices(Mat4::IDENTITY, view, Mat4::IDENTITY);
        controller.frame(0.0);
        assert_eq!(device.uniforms().unwrap().view, view.to_cols_array_2d());
    }

    #[test]
    fn test_program_without_generator_is_an_error() {
        let (mut controller, device) = controller();
        assert!(matches!(
            controller.build_program(Mode::Cloud),
            Err(RenderError::NoGenerator("cloud"))
        ));
        assert!(matches!(
            controller.build_program(Mode::Wave),
            Err(RenderError::NoGenerator("wave"))
        ));
        assert!(!device
            .events()
            .iter()
            .any(|e| matches!(e, DeviceEvent::CreateProgram { label, .. } if label != CRYSTAL_PROGRAM)));
    }

    #[test]
    fn test_cloud_frame_writes_palette() {
        let (mut controller, device) = controller();
        controller.on_new_cloud_config(small_cloud(), RecipeMap::single(2, 1, 0)).unwrap();
        controller.finish_pending_work();
        controller.frame(0.0);

        let [peak, base, trough] = WaveColors::cloud().as_words();
        let colors = device.uniforms().unwrap().colors;
        assert_eq!(colors, [peak, base, trough, 0]);
        assert!(colors[..3].iter().all(|&word| word != 0));
    }

    #[test]
    fn test_wave_selection_survives_regeneration() {
        let (mut controller, _device) = controller();
        controller.on_new_wave_config(waves(3, false)).unwrap();
        controller.finish_pending_work();
        controller.select_wave(0, false).unwrap();
        assert_eq!(controller.rendered_waves(), 0b1111_1110);

        controller.on_new_wave_config(waves(3, false)).unwrap();
        assert!(controller.wave_generator().is_none());
        controller.select_wave(1, false).unwrap();
        assert_eq!(controller.rendered_waves(), 0b1111_1100);
        controller.finish_pending_work();

        let generator = controller.wave_generator().unwrap();
        assert_eq!(generator.rendered_waves(), 0b1111_1100);
        assert_eq!(generator.buffers().index_count(), 16);

        controller.on_new_cloud_config(small_cloud(), RecipeMap::single(1, 0, 0)).unwrap();
        assert_eq!(controller.rendered_waves(), ALL_WAVES);
    }

    #[test]
    fn test_failed_generation_keeps_device_buffers() {
        let reports: Arc<Mutex<Vec<AtomixInfo>>> = Arc::default();
        let sink = {
            let reports = Arc::clone(&reports);
            move |info: &AtomixInfo| reports.lock().push(*info)
        };
        let device = RecordingDevice::new();
        let mut controller = RenderController::new(device.clone(), ShaderRegistry::builtin(), Box::new(sink)).unwrap();
        controller.on_new_wave_config(waves(2, false)).unwrap();
        controller.finish_pending_work();
        controller.frame(0.0);
        let vertices = device.contents(BufferName::Vertices).unwrap();
        let indices = device.contents(BufferName::Indices).unwrap();
        device.clear_events();

        let generator = controller.take_generator(Mode::Wave);
        controller.handle_outcome(Outcome {
            generator,
            result: Err(GeneratorError::NonFinite { position: 3 }),
            elapsed: Duration::ZERO,
        });
        assert_eq!(controller.info().discarded_results, 1);
        assert_eq!(reports.lock().last().map(|info| info.discarded_results), Some(1));
        assert!(controller.wave_generator().is_some());

        controller.frame(0.1);
        assert_eq!(device.contents(BufferName::Vertices).unwrap(), vertices);
        assert_eq!(device.contents(BufferName::Indices).unwrap(), indices);
        assert!(!device
            .events()
            .iter()
            .any(|e| matches!(e, DeviceEvent::CreateBuffer { .. } | DeviceEvent::WriteBuffer { .. })));
        assert_eq!(device.draws("wave"), 1);
        assert_eq!(controller.status(), Status::Ready);
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let (mut controller, device) = controller();
        controller.on_new_wave_config(waves(2, false)).unwrap();
        controller.finish_pending_work();
        controller.frame(0.0);
        assert!(device.live_buffers() > 2);

        controller.cleanup();
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(controller.mode(), None);
        assert!(controller.wave_generator().is_none());
        controller.cleanup();
    }
}
