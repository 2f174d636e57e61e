use std::path::PathBuf;

use thiserror::Error;

use crate::render::BufferName;

/// Failures of the special-function evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// An argument was NaN.
    #[error("{function}: argument is not a number")]
    Domain { function: &'static str },
}

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Out-of-range values or an inconsistent recipe.
    ///
    /// The controller rejects the request before spawning any work.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Neither the shaders directory nor the built-in set has this basename.
    #[error("no shader named '{0}'")]
    MissingShader(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ConfigError::InvalidConfig(message.into())
    }
}

/// Internally inconsistent generator output.
///
/// Produced on the worker and parked in its outcome; the controller discards
/// the result and keeps the buffers it already has.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeneratorError {
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("{stream} holds {count} elements but there are {vertex_count} vertices")]
    CountMismatch {
        stream: &'static str,
        count: usize,
        vertex_count: usize,
    },

    #[error("more indices ({index_count}) than vertices ({vertex_count})")]
    TooManyIndices {
        index_count: usize,
        vertex_count: usize,
    },

    #[error("vertex {position} is not finite")]
    NonFinite { position: usize },

    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

/// Errors from the graphics device.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The device could not allocate a buffer.
    ///
    /// Raised on create and resize. The controller leaves the update flag set
    /// and retries on the next frame.
    #[error("out of device memory allocating {bytes} bytes for {name:?}")]
    ResourceExhausted { name: BufferName, bytes: u64 },

    /// Shader module or pipeline creation failed.
    #[error("failed to build program '{vert}' + '{frag}': {reason}")]
    Program {
        vert: String,
        frag: String,
        reason: String,
    },

    /// No adapter or device could be obtained.
    #[error("graphics device unavailable: {0}")]
    Device(String),

    /// The presentation surface could not be acquired this frame.
    #[error("surface unavailable: {0}")]
    Surface(String),

    /// A program was requested for a mode whose generator is missing.
    #[error("no {0} generator to build a program from")]
    NoGenerator(&'static str),

    #[error(transparent)]
    Shader(#[from] ConfigError),

    /// The background runtime could not be started.
    #[error("failed to start worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Umbrella error for the crate's public operations.
#[derive(Debug, Error)]
pub enum AtomixError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// The operation needs a generator that is not active.
    #[error("{0} mode is not active")]
    ModeInactive(&'static str),
}
