use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use atomix::render::WgpuDevice;
use atomix::shaders::ShaderRegistry;
use atomix::{Config, FileLayout, LogSink, Mode, RecipeMap, RenderController};
use clap::Parser;
use glam::{Mat4, Vec3};
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const NEAR: f32 = 0.1;
const FAR: f32 = 1000.0;
const SLIDER_STEP: f64 = 0.05;

#[derive(Parser, Debug)]
#[command(version, about = "Wave and hydrogen orbital visualizer")]
struct Args {
    /// Directory holding `shaders/` and `configs/`.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config to open first; defaults to the first file under `configs/`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Orbital recipe for cloud configs; defaults to 2p_z.
    #[arg(long)]
    recipe: Option<PathBuf>,
}

struct AppState {
    configs: Vec<PathBuf>,
    current: usize,
    recipe: Option<PathBuf>,
    rotation_x: f32,
    rotation_y: f32,
    distance: f32,
    cull_x: f64,
    cull_y: f64,
    slider: bool,
    started: Instant,
}

impl AppState {
    fn new(args: &Args, layout: &FileLayout) -> Self {
        let mut configs = layout.config_files();
        let current = match &args.config {
            Some(path) => match configs.iter().position(|p| p == path) {
                Some(index) => index,
                None => {
                    configs.insert(0, path.clone());
                    0
                }
            },
            None => 0,
        };

        AppState {
            configs,
            current,
            recipe: args.recipe.clone(),
            rotation_x: 0.3,
            rotation_y: 0.0,
            distance: 20.0,
            cull_x: 0.0,
            cull_y: 0.0,
            slider: false,
            started: Instant::now(),
        }
    }

    fn eye(&self) -> Vec3 {
        let (sx, cx) = self.rotation_x.sin_cos();
        let (sy, cy) = self.rotation_y.sin_cos();
        Vec3::new(cx * sy, sx, cx * cy) * self.distance
    }

    /// Loads the current config and hands it to the controller.
    fn submit(&self, controller: &mut RenderController<WgpuDevice>) -> anyhow::Result<()> {
        let path = self
            .configs
            .get(self.current)
            .context("no config files found; pass --config")?;
        let config = Config::load(path).with_context(|| format!("failed to load {}", path.display()))?;
        log::info!("opening {}", path.display());

        match config {
            Config::Wave(wave) => controller.on_new_wave_config(wave)?,
            Config::Cloud(cloud) => {
                let recipe = match &self.recipe {
                    Some(path) => RecipeMap::load(path).with_context(|| format!("failed to load {}", path.display()))?,
                    None => RecipeMap::single(2, 1, 0),
                };
                controller.on_new_cloud_config(cloud, recipe)?;
            }
        }
        Ok(())
    }

    fn update_camera(&self, controller: &mut RenderController<WgpuDevice>) {
        let eye = self.eye();
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let aspect = controller.device().aspect();
        let projection = Mat4::perspective_rh(45f32.to_radians(), aspect, NEAR, FAR);
        controller.set_matrices(Mat4::IDENTITY, view, projection);
        controller.set_camera(eye, NEAR, FAR);
    }

    fn nudge_slider(&mut self, controller: &mut RenderController<WgpuDevice>, dx: f64, dy: f64) {
        self.cull_x = (self.cull_x + dx).clamp(0.0, 1.0);
        self.cull_y = (self.cull_y + dy).clamp(0.0, 1.0);
        if let Err(err) = controller.set_cloud_culling(self.cull_x, self.cull_y) {
            log::warn!("{err}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let layout = FileLayout::new(&args.root);

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title("Atomix")
        .with_inner_size(winit::dpi::LogicalSize::new(1200.0, 800.0))
        .build(&event_loop)
        .context("failed to create window")?;
    let window = Arc::new(window);

    let device = pollster::block_on(WgpuDevice::new(Arc::clone(&window)))?;
    let mut controller = RenderController::new(device, ShaderRegistry::discover(&layout), Box::new(LogSink))?;
    let mut app_state = AppState::new(&args, &layout);

    app_state.submit(&mut controller)?;
    app_state.update_camera(&mut controller);

    let mut last_render = Instant::now();

    event_loop.run(move |event, target| match event {
        Event::WindowEvent { ref event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => {
                controller.cleanup();
                target.exit();
            }
            WindowEvent::Resized(physical_size) => {
                controller.device_mut().resize(*physical_size);
                app_state.update_camera(&mut controller);
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.logical_key.as_ref() {
                    Key::Character(c) => match c {
                        "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" => {
                            let index = c.as_bytes()[0] - b'1';
                            let on = controller.rendered_waves() & (1 << index) == 0;
                            if let Err(err) = controller.select_wave(index, on) {
                                log::warn!("{err}");
                            }
                        }
                        "t" => {
                            app_state.slider = !app_state.slider;
                            if let Err(err) = controller.use_slider_indices(app_state.slider) {
                                log::warn!("{err}");
                            }
                        }
                        "r" => {
                            if let Err(err) = app_state.submit(&mut controller) {
                                log::error!("{err:#}");
                            }
                        }
                        "c" if !app_state.configs.is_empty() => {
                            app_state.current = (app_state.current + 1) % app_state.configs.len();
                            if let Err(err) = app_state.submit(&mut controller) {
                                log::error!("{err:#}");
                            }
                        }
                        "w" | "a" | "s" | "d" => {
                            match c {
                                "w" => app_state.rotation_x = (app_state.rotation_x - 0.1).max(-1.5),
                                "s" => app_state.rotation_x = (app_state.rotation_x + 0.1).min(1.5),
                                "a" => app_state.rotation_y -= 0.1,
                                _ => app_state.rotation_y += 0.1,
                            }
                            app_state.update_camera(&mut controller);
                        }
                        "+" | "=" => {
                            app_state.distance = (app_state.distance * 0.9).max(1.0);
                            app_state.update_camera(&mut controller);
                        }
                        "-" => {
                            app_state.distance = (app_state.distance * 1.1).min(FAR / 2.0);
                            app_state.update_camera(&mut controller);
                        }
                        _ => {}
                    },
                    Key::Named(named_key) => {
                        let cloud = controller.mode() == Some(Mode::Cloud);
                        match named_key {
                            NamedKey::Escape => {
                                controller.cleanup();
                                target.exit();
                            }
                            NamedKey::ArrowLeft if cloud => app_state.nudge_slider(&mut controller, -SLIDER_STEP, 0.0),
                            NamedKey::ArrowRight if cloud => app_state.nudge_slider(&mut controller, SLIDER_STEP, 0.0),
                            NamedKey::ArrowUp if cloud => app_state.nudge_slider(&mut controller, 0.0, SLIDER_STEP),
                            NamedKey::ArrowDown if cloud => app_state.nudge_slider(&mut controller, 0.0, -SLIDER_STEP),
                            NamedKey::ArrowLeft => app_state.rotation_y -= 0.1,
                            NamedKey::ArrowRight => app_state.rotation_y += 0.1,
                            NamedKey::ArrowUp => app_state.rotation_x = (app_state.rotation_x - 0.1).max(-1.5),
                            NamedKey::ArrowDown => app_state.rotation_x = (app_state.rotation_x + 0.1).min(1.5),
                            _ => {}
                        }
                        if !cloud {
                            app_state.update_camera(&mut controller);
                        }
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                controller.frame(app_state.started.elapsed().as_secs_f64());
                window.set_title(&format!("Atomix [{}]", controller.status().indicator()));
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if now.duration_since(last_render) >= FRAME_INTERVAL {
                window.request_redraw();
                last_render = now;
            }
        }
        _ => {}
    })?;

    Ok(())
}
