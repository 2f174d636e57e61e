//! [`GraphicsDevice`] backed by wgpu and a winit window surface.

use std::borrow::Cow;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::{
    BufferName, BufferRole, DrawCall, GraphicsDevice, ProgramDesc, SceneUniforms, Topology, UploadUsage,
    VertexLayout,
};
use crate::error::RenderError;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.04,
    a: 1.0,
};

// zero-sized vertex buffers cannot be bound
static EMPTY_CONTENTS: [u8; 4] = [0; 4];

static POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
static VEC3_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
static SCALAR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32];

/// Vertex or index buffer. Dropping the last handle frees the allocation.
#[derive(Debug)]
pub struct WgpuBuffer {
    buffer: Arc<wgpu::Buffer>,
}

#[derive(Debug)]
pub struct WgpuProgram {
    pipeline: Arc<wgpu::RenderPipeline>,
}

struct PendingDraw {
    pipeline: Arc<wgpu::RenderPipeline>,
    vertices: Arc<wgpu::Buffer>,
    data: Option<Arc<wgpu::Buffer>>,
    indices: Arc<wgpu::Buffer>,
    index_count: u32,
}

struct Frame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    draws: Vec<PendingDraw>,
}

pub struct WgpuDevice {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: wgpu::TextureView,
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    frame: Option<Frame>,
}

impl WgpuDevice {
    /// Opens a device that presents to `window`.
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .map_err(|err| RenderError::Device(err.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::Device("no suitable adapter".to_owned()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("atomix device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|err| RenderError::Device(err.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Device("surface reports no formats".to_owned()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth = create_depth(&device, &config);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&SceneUniforms::default()));

        log::info!("surface {}x{} {:?}", config.width, config.height, config.format);

        Ok(WgpuDevice {
            surface,
            device,
            queue,
            config,
            depth,
            uniform_buffer,
            bind_group_layout,
            bind_group,
            frame: None,
        })
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width > 0 && size.height > 0 {
            self.config.width = size.width;
            self.config.height = size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth = create_depth(&self.device, &self.config);
        }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }
}

fn create_depth(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("depth"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn vertex_buffers(layout: VertexLayout) -> Vec<wgpu::VertexBufferLayout<'static>> {
    let position = wgpu::VertexBufferLayout {
        array_stride: BufferRole::Position.stride() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &POSITION_ATTRIBUTES,
    };
    let second = match layout {
        VertexLayout::PositionOnly => None,
        VertexLayout::WithAttribute => Some(wgpu::VertexBufferLayout {
            array_stride: BufferRole::Attribute.stride() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VEC3_ATTRIBUTES,
        }),
        VertexLayout::WithScalar => Some(wgpu::VertexBufferLayout {
            array_stride: BufferRole::Scalar.stride() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &SCALAR_ATTRIBUTES,
        }),
    };
    std::iter::once(position).chain(second).collect()
}

impl GraphicsDevice for WgpuDevice {
    type Buffer = WgpuBuffer;
    type Program = WgpuProgram;

    fn create_buffer(
        &mut self,
        name: BufferName,
        role: BufferRole,
        usage: UploadUsage,
        contents: &[u8],
    ) -> Result<WgpuBuffer, RenderError> {
        let buffer_usage = match role {
            BufferRole::Index => wgpu::BufferUsages::INDEX,
            BufferRole::Position | BufferRole::Attribute | BufferRole::Scalar => wgpu::BufferUsages::VERTEX,
        } | wgpu::BufferUsages::COPY_DST;
        let contents = if contents.is_empty() { &EMPTY_CONTENTS[..] } else { contents };
        let label = format!("{name:?} ({usage:?})");

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents,
            usage: buffer_usage,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("{label}: {err}");
            return Err(RenderError::ResourceExhausted {
                name,
                bytes: contents.len() as u64,
            });
        }

        Ok(WgpuBuffer {
            buffer: Arc::new(buffer),
        })
    }

    fn write_buffer(&mut self, buffer: &WgpuBuffer, offset: u64, contents: &[u8]) {
        self.queue.write_buffer(&buffer.buffer, offset, contents);
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<WgpuProgram, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vert = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.vert_name),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.vert_source)),
        });
        let frag = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.frag_name),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.frag_source)),
        });
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&self.bind_group_layout],
            push_constant_ranges: &[],
        });
        let buffers = vertex_buffers(desc.layout);
        let topology = match desc.topology {
            Topology::PointList => wgpu::PrimitiveTopology::PointList,
            Topology::LineList => wgpu::PrimitiveTopology::LineList,
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &vert,
                entry_point: "vs_main",
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &frag,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Program {
                vert: desc.vert_name.to_owned(),
                frag: desc.frag_name.to_owned(),
                reason: err.to_string(),
            });
        }

        Ok(WgpuProgram {
            pipeline: Arc::new(pipeline),
        })
    }

    fn write_uniforms(&mut self, uniforms: &SceneUniforms) {
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::Surface("surface lost, reconfigured".to_owned()));
            }
            Err(err) => return Err(RenderError::Surface(err.to_string())),
        };
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.frame = Some(Frame {
            texture,
            view,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_, WgpuBuffer, WgpuProgram>) {
        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(PendingDraw {
                pipeline: Arc::clone(&call.program.pipeline),
                vertices: Arc::clone(&call.vertices.buffer),
                data: call.data.map(|d| Arc::clone(&d.buffer)),
                indices: Arc::clone(&call.indices.buffer),
                index_count: call.index_count,
            });
        }
    }

    fn end_frame(&mut self) {
        let Some(Frame { texture, view, draws }) = self.frame.take() else {
            return;
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.bind_group, &[]);
            for draw in &draws {
                pass.set_pipeline(&draw.pipeline);
                pass.set_vertex_buffer(0, draw.vertices.slice(..));
                if let Some(data) = &draw.data {
                    pass.set_vertex_buffer(1, data.slice(..));
                }
                pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        texture.present();
    }
}
