//! Randomized and failure-path checks through the public API.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use atomix::cloud::{CloudGenerator, IndexSet};
use atomix::color::{color_to_word, word_to_color};
use atomix::render::controller::CRYSTAL_PROGRAM;
use atomix::render::{BufferName, RecordingDevice};
use atomix::shaders::ShaderRegistry;
use atomix::wave::WaveGenerator;
use atomix::{
    AtomixError, AtomixInfo, CloudConfig, Config, ConfigError, FileLayout, LogSink, OrbitalTerm, RecipeMap,
    RenderController, Status, WaveConfig,
};

fn random_wave(rng: &mut StdRng) -> WaveConfig {
    let mut config = WaveConfig {
        waves: rng.gen_range(1..=8),
        amplitude: rng.gen_range(0.1..2.0),
        period: rng.gen_range(0.5..10.0),
        wavelength: rng.gen_range(0.5..10.0),
        parallel: rng.gen(),
        sphere: rng.gen(),
        ..WaveConfig::default()
    };
    config.common.resolution = rng.gen_range(1..=24);
    config.common.cpu = rng.gen();
    config.superposition = config.common.cpu && rng.gen();
    config
}

fn random_recipe(rng: &mut StdRng) -> RecipeMap {
    let mut recipe = RecipeMap::new();
    for _ in 0..rng.gen_range(1..=3) {
        let n = rng.gen_range(1..=3u32);
        let l = rng.gen_range(0..n);
        let m = rng.gen_range(-(l as i32)..=l as i32);
        recipe.add(n, OrbitalTerm::weighted(l, m, rng.gen_range(1..=3)));
    }
    recipe
}

fn random_cloud(rng: &mut StdRng) -> CloudConfig {
    let mut config = CloudConfig {
        cloud_resolution: rng.gen_range(2..=6),
        cloud_lay_divisor: rng.gen_range(1..=2),
        cloud_tolerance: rng.gen_range(0.01..=1.0),
        ..CloudConfig::default()
    };
    config.common.cpu = rng.gen();
    config
}

#[test]
fn generated_indices_stay_in_bounds() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..16 {
        let config = random_wave(&mut rng);
        let mut generator = WaveGenerator::new();
        generator.new_waves(config.clone()).unwrap();
        let buffers = generator.buffers();
        assert_eq!(buffers.vertex_count(), config.waves as usize * config.vertices_per_wave());
        assert!(buffers.indices().iter().all(|&i| (i as usize) < buffers.vertex_count()));
    }

    for _ in 0..8 {
        let config = random_cloud(&mut rng);
        let recipe = random_recipe(&mut rng);
        let mut generator = CloudGenerator::new();
        generator.new_cloud(config, recipe).unwrap();
        generator.set_slider_culling(rng.gen_range(0.0..=1.0), rng.gen_range(0.0..=1.0));

        let count = generator.buffers().vertex_count();
        assert!(count > 0);
        assert!(generator.tolerance_indices().iter().all(|&i| (i as usize) < count));
        assert!(generator.slider_indices().iter().all(|&i| (i as usize) < count));
    }
}

#[test]
fn toggling_waves_changes_only_indices() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..8 {
        let mut config = random_wave(&mut rng);
        config.waves = rng.gen_range(2..=8);
        let mut generator = WaveGenerator::new();
        generator.new_waves(config.clone()).unwrap();

        let vertices = generator.buffers().vertex_count();
        let before = generator.buffers().indices().to_vec();
        let index = rng.gen_range(0..config.waves) as u8;

        generator.select_waves(index, false);
        assert_eq!(generator.buffers().vertex_count(), vertices);
        assert_eq!(
            generator.buffers().index_count(),
            before.len() - config.vertices_per_wave()
        );

        generator.select_waves(index, true);
        assert_eq!(generator.buffers().indices(), &before[..]);
    }
}

#[test]
fn switching_index_sets_keeps_counts() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut generator = CloudGenerator::new();
    generator.new_cloud(random_cloud(&mut rng), RecipeMap::single(2, 1, 1)).unwrap();
    let vertices = generator.buffers().vertex_count();
    let data = generator.buffers().data_count();

    generator.set_slider_culling(0.3, 0.6);
    assert_eq!(generator.active_indices(), IndexSet::Slider);
    generator.use_slider_indices(false);
    assert_eq!(generator.active_indices(), IndexSet::Tolerance);
    assert_eq!(generator.buffers().vertex_count(), vertices);
    assert_eq!(generator.buffers().data_count(), data);
}

#[test]
fn color_words_survive_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1000 {
        let word: u32 = rng.gen();
        let back = color_to_word(word_to_color(word));
        assert_eq!(back & 0xFFFF_FF00, word & 0xFFFF_FF00);
    }
}

fn ready_wave_controller(device: &RecordingDevice) -> RenderController<RecordingDevice> {
    let mut controller = RenderController::new(device.clone(), ShaderRegistry::builtin(), Box::new(LogSink)).unwrap();
    let mut config = WaveConfig::default();
    config.common.resolution = 16;
    controller.on_new_wave_config(config).unwrap();
    controller.finish_pending_work();
    controller
}

#[test]
fn repeated_allocation_failures_degrade() {
    let device = RecordingDevice::new();
    let mut controller = ready_wave_controller(&device);
    device.fail_next_allocations(3);

    controller.frame(0.0);
    assert_eq!(controller.status(), Status::Degraded);
    assert_eq!(controller.status().indicator(), "amber");
    assert_eq!(controller.mode(), Some(atomix::Mode::Wave));
    controller.frame(0.1);
    assert_eq!(controller.status(), Status::Degraded);
    assert_eq!(device.draws("wave"), 0);
    controller.frame(0.2);

    assert_eq!(controller.status(), Status::Degraded);
    assert_eq!(controller.status().indicator(), "amber");
    assert_eq!(controller.mode(), None);
    assert!(controller.wave_generator().is_none());
    assert_eq!(device.draws(CRYSTAL_PROGRAM), 3);
    assert_eq!(device.draws("wave"), 0);

    controller.frame(0.3);
    assert_eq!(device.draws(CRYSTAL_PROGRAM), 4);
    assert_eq!(device.live_buffers(), 2);
}

#[test]
fn transient_allocation_failure_recovers() {
    let device = RecordingDevice::new();
    let mut controller = ready_wave_controller(&device);
    device.fail_next_allocations(2);

    controller.frame(0.0);
    controller.frame(0.1);
    assert_eq!(device.draws("wave"), 0);
    assert_eq!(controller.status().indicator(), "amber");
    controller.frame(0.2);

    assert_eq!(controller.status(), Status::Ready);
    assert_eq!(controller.status().indicator(), "green");
    assert_eq!(device.draws("wave"), 1);
    assert_eq!(device.draws(CRYSTAL_PROGRAM), 3);
    assert!(controller.registry().contains(BufferName::Data));
}

#[test]
fn stale_result_is_discarded_and_reported() {
    let reports: Arc<Mutex<Vec<AtomixInfo>>> = Arc::default();
    let sink = {
        let reports = Arc::clone(&reports);
        move |info: &AtomixInfo| reports.lock().push(*info)
    };
    let device = RecordingDevice::new();
    let mut controller = RenderController::new(device.clone(), ShaderRegistry::builtin(), Box::new(sink)).unwrap();

    let first = WaveConfig {
        waves: 1,
        ..WaveConfig::default()
    };
    let second = WaveConfig {
        waves: 3,
        ..WaveConfig::default()
    };
    controller.on_new_wave_config(first).unwrap();
    controller.on_new_wave_config(second).unwrap();
    controller.finish_pending_work();

    assert_eq!(controller.info().discarded_results, 1);
    assert!(reports.lock().iter().any(|info| info.discarded_results == 1));
    assert_eq!(controller.wave_generator().and_then(|g| g.config()).map(|c| c.waves), Some(3));

    controller.frame(0.0);
    let last = *reports.lock().last().unwrap();
    assert!(last.vertex_bytes > 0);
    assert_eq!(last.vertex_bytes, controller.registry().size(BufferName::Vertices));
}

#[test]
fn camera_changes_are_reported() {
    let reports: Arc<Mutex<Vec<AtomixInfo>>> = Arc::default();
    let sink = {
        let reports = Arc::clone(&reports);
        move |info: &AtomixInfo| reports.lock().push(*info)
    };
    let mut controller =
        RenderController::new(RecordingDevice::new(), ShaderRegistry::builtin(), Box::new(sink)).unwrap();

    controller.set_camera(glam::Vec3::new(0.0, 2.0, 10.0), 0.1, 500.0);
    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].camera_pos, [0.0, 2.0, 10.0]);
    assert_eq!(reports[0].far, 500.0);
}

#[test]
fn configs_load_from_layout() {
    let dir = tempfile::tempdir().unwrap();
    let layout = FileLayout::new(dir.path());
    fs::create_dir_all(&layout.configs_dir).unwrap();
    fs::write(
        layout.configs_dir.join("rings.json"),
        r#"{"waves": 2, "amplitude": 0.3, "resolution": 32, "cpu": true, "theme": "dark"}"#,
    )
    .unwrap();
    fs::write(
        layout.configs_dir.join("cloud.json"),
        r#"{"cloudResolution": 12, "cloudTolerance": 0.1}"#,
    )
    .unwrap();
    fs::write(dir.path().join("recipe.json"), r#"{"3": [{"l": 2, "m": -1}, {"l": 0, "m": 0, "weight": 2}]}"#).unwrap();

    let files = layout.config_files();
    assert_eq!(files.len(), 2);

    let Config::Cloud(cloud) = Config::load(&files[0]).unwrap() else {
        panic!("cloud.json should load as a cloud config");
    };
    assert_eq!(cloud.cloud_resolution, 12);
    assert_eq!(cloud.cloud_lay_divisor, CloudConfig::default().cloud_lay_divisor);

    let Config::Wave(wave) = Config::load(&files[1]).unwrap() else {
        panic!("rings.json should load as a wave config");
    };
    assert_eq!(wave.waves, 2);
    assert!(wave.common.cpu);

    let recipe = RecipeMap::load(&dir.path().join("recipe.json")).unwrap();
    assert_eq!(recipe.max_n(), 3);
    assert_eq!(recipe.orbital_count(), 2);
    assert!(recipe.validate().is_ok());
}

#[test]
fn bad_files_report_their_path() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ waves: ").unwrap();

    assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { path, .. }) if path == broken));
    assert!(matches!(
        Config::load(&dir.path().join("missing.json")),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn invalid_recipe_blocks_generation() {
    let mut controller =
        RenderController::new(RecordingDevice::new(), ShaderRegistry::builtin(), Box::new(LogSink)).unwrap();
    let err = controller
        .on_new_cloud_config(CloudConfig::default(), RecipeMap::single(1, 0, 1))
        .unwrap_err();
    assert!(matches!(err, AtomixError::Config(ConfigError::InvalidConfig(_))));
    assert!(!controller.can_generate());
    assert!(!controller.is_busy());
}
