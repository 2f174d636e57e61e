//! Wave and hydrogen-orbital visualizer core.
//!
//! Generators turn a [`config::Config`] into vertex, attribute, data and
//! index streams; [`render::RenderController`] pushes those to a
//! [`render::GraphicsDevice`] and keeps them current.

pub mod cloud;
pub mod color;
pub mod config;
pub mod crystal;
pub mod error;
pub mod flags;
pub mod geometry;
pub mod physics;
pub mod render;
pub mod shaders;
pub mod telemetry;
pub mod wave;

pub use config::{CloudConfig, CommonConfig, Config, FileLayout, OrbitalTerm, RecipeMap, WaveConfig};
pub use error::{AtomixError, ConfigError, GeneratorError, PhysicsError, RenderError};
pub use flags::{Mode, StateFlags};
pub use render::{RenderController, Status};
pub use telemetry::{AtomixInfo, LogSink, TelemetrySink};
