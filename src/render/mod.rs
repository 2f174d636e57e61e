//! Device-facing half of the crate: named GPU buffers, the background worker
//! and the controller that ties generators to draw calls.

pub mod controller;
pub mod recording;
pub mod registry;
pub mod wgpu_device;
pub mod worker;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::error::RenderError;

pub use controller::{RenderController, Status};
pub use recording::{DeviceEvent, RecordingDevice};
pub use registry::{BufferOp, BufferRegistry};
pub use wgpu_device::WgpuDevice;

/// The three model buffers the controller keeps per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferName {
    Vertices,
    Data,
    Indices,
}

/// What a buffer holds, which fixes its element stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Position,
    /// Per-vertex vec3: wave phase/radius or RGB.
    Attribute,
    /// Per-vertex f32 density.
    Scalar,
    Index,
}

impl BufferRole {
    pub fn stride(self) -> usize {
        match self {
            BufferRole::Position | BufferRole::Attribute => 12,
            BufferRole::Scalar | BufferRole::Index => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadUsage {
    /// Written once per generation.
    Static,
    /// Rewritten every frame.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    PointList,
    LineList,
}

/// Vertex streams a program consumes. Positions are always at location 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    PositionOnly,
    /// vec3 attribute at location 1.
    WithAttribute,
    /// f32 scalar at location 1.
    WithScalar,
}

/// Shader pair plus the fixed-function state to build a program from.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub vert_name: &'a str,
    pub vert_source: &'a str,
    pub frag_name: &'a str,
    pub frag_source: &'a str,
    pub layout: VertexLayout,
    pub topology: Topology,
}

/// One indexed draw.
#[derive(Debug)]
pub struct DrawCall<'a, B, P> {
    pub program: &'a P,
    pub vertices: &'a B,
    pub data: Option<&'a B>,
    pub indices: &'a B,
    pub index_count: u32,
}

/// Everything the shaders read, in one uniform block at group 0, binding 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// amplitude, 2pi/wavelength, 2pi/period, time
    pub maths: [f32; 4],
    /// max density, max radius
    pub extent: [f32; 4],
    /// peak, base, trough color words
    pub colors: [u32; 4],
    /// parallel, sphere, cpu
    pub mode: [u32; 4],
}

impl Default for SceneUniforms {
    fn default() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        SceneUniforms {
            model: identity,
            view: identity,
            projection: identity,
            maths: [0.0; 4],
            extent: [0.0; 4],
            colors: [0; 4],
            mode: [0; 4],
        }
    }
}

impl SceneUniforms {
    pub fn set_matrices(&mut self, model: Mat4, view: Mat4, projection: Mat4) {
        self.model = model.to_cols_array_2d();
        self.view = view.to_cols_array_2d();
        self.projection = projection.to_cols_array_2d();
    }
}

/// What the controller needs from a graphics backend.
///
/// Buffers and programs are owned handles; dropping one releases the
/// underlying allocation.
pub trait GraphicsDevice {
    type Buffer;
    type Program;

    /// Allocates a buffer holding exactly `contents`.
    fn create_buffer(
        &mut self,
        name: BufferName,
        role: BufferRole,
        usage: UploadUsage,
        contents: &[u8],
    ) -> Result<Self::Buffer, RenderError>;

    /// Overwrites `contents.len()` bytes of `buffer` starting at `offset`.
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, contents: &[u8]);

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<Self::Program, RenderError>;

    fn write_uniforms(&mut self, uniforms: &SceneUniforms);

    /// Starts a frame. An error means nothing can be drawn this frame.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    fn draw(&mut self, call: &DrawCall<'_, Self::Buffer, Self::Program>);

    fn end_frame(&mut self);
}
