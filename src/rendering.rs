//! Rendering system: wgpu point-cloud and axis pipelines.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use std::sync::Arc;
use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::params::RenderConfig;

/// Anything that can draw a coloured point cloud
pub trait SceneRenderer {
    /// `positions` holds xyz triples, `colors` the parallel rgba quadruples
    fn draw(&mut self, positions: &[f32], colors: &[f32], view: Mat4, projection: Mat4);
}

/// Errors raised while setting up the GPU
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to find suitable GPU adapter")]
    NoAdapter,

    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// Uniform buffer for the scene shader
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
}

impl Uniforms {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view_proj: (projection * view).to_cols_array_2d(),
        }
    }
}

const POSITION_STRIDE: wgpu::BufferAddress = std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress;
const COLOR_STRIDE: wgpu::BufferAddress = std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress;

/// Positions and colours live in separate vertex buffers
const VERTEX_LAYOUTS: [wgpu::VertexBufferLayout<'static>; 2] = [
    wgpu::VertexBufferLayout {
        array_stride: POSITION_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: COLOR_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x4,
        }],
    },
];

/// Smallest initial vertex buffer (bytes)
const MIN_BUFFER_BYTES: u64 = 64 * 1024;

/// X red, Y green, Z blue, each from -1 to 1
pub fn axis_vertices() -> (Vec<f32>, Vec<f32>) {
    let positions = vec![
        -1.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, -1.0, 0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, -1.0, 0.0, 0.0, 1.0,
    ];
    let colors = vec![
        1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, //
        0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, //
        0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0,
    ];
    (positions, colors)
}

/// Capacity for a buffer that must hold `needed` bytes
fn grown_capacity(current: u64, needed: u64) -> u64 {
    if needed <= current {
        current
    } else {
        needed.next_power_of_two().max(MIN_BUFFER_BYTES)
    }
}

/// Vertex buffer that is recreated larger when a write would overflow it
struct GrowableBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
}

impl GrowableBuffer {
    fn new(device: &wgpu::Device, label: &'static str) -> Self {
        Self {
            buffer: Self::allocate(device, label, MIN_BUFFER_BYTES),
            label,
        }
    }

    fn allocate(device: &wgpu::Device, label: &'static str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[f32]) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let needed = bytes.len() as u64;
        let capacity = grown_capacity(self.buffer.size(), needed);
        if capacity != self.buffer.size() {
            log::debug!("Growing {} to {} bytes", self.label, capacity);
            self.buffer = Self::allocate(device, self.label, capacity);
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
    }
}

/// Rendering system managing wgpu device, pipelines, and buffers
pub struct RenderSystem {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    point_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    positions: GrowableBuffer,
    colors: GrowableBuffer,
    point_count: u32,
    axis_positions: wgpu::Buffer,
    axis_colors: wgpu::Buffer,
    axis_vertex_count: u32,
    show_axes: bool,
    background: wgpu::Color,
}

impl RenderSystem {
    /// Create new rendering system
    pub async fn new(
        window: Arc<winit::window::Window>,
        render_config: &RenderConfig,
    ) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Window has 'static lifetime via Arc
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        log::info!("GPU: {}", adapter.get_info().name);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });

        let uniforms = Uniforms::new(Mat4::IDENTITY, Mat4::IDENTITY);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let point_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            wgpu::PrimitiveTopology::PointList,
            "Point Pipeline",
        );
        let line_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            wgpu::PrimitiveTopology::LineList,
            "Axis Pipeline",
        );

        let (axis_position_data, axis_color_data) = axis_vertices();
        let axis_positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Axis Positions"),
            contents: bytemuck::cast_slice(&axis_position_data),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let axis_colors = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Axis Colors"),
            contents: bytemuck::cast_slice(&axis_color_data),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let positions = GrowableBuffer::new(&device, "Point Positions");
        let colors = GrowableBuffer::new(&device, "Point Colors");

        let [r, g, b, a] = render_config.background;

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            point_pipeline,
            line_pipeline,
            uniform_buffer,
            uniform_bind_group,
            positions,
            colors,
            point_count: 0,
            axis_positions,
            axis_colors,
            axis_vertex_count: (axis_position_data.len() / 3) as u32,
            show_axes: render_config.show_axes,
            background: wgpu::Color { r, g, b, a },
        })
    }

    /// Reconfigure the surface for a new window size
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height.max(1) as f32
    }

    /// Upload geometry and uniforms for the next frame
    fn upload(&mut self, positions: &[f32], colors: &[f32], view: Mat4, projection: Mat4) {
        let uniforms = Uniforms::new(view, projection);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        // Draw only complete points that have a colour
        let count = (positions.len() / 3).min(colors.len() / 4);
        self.positions
            .write(&self.device, &self.queue, &positions[..3 * count]);
        self.colors
            .write(&self.device, &self.queue, &colors[..4 * count]);
        self.point_count = count as u32;
    }

    /// Render a frame
    fn render(&self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            if self.show_axes {
                render_pass.set_pipeline(&self.line_pipeline);
                render_pass.set_vertex_buffer(0, self.axis_positions.slice(..));
                render_pass.set_vertex_buffer(1, self.axis_colors.slice(..));
                render_pass.draw(0..self.axis_vertex_count, 0..1);
            }

            if self.point_count > 0 {
                render_pass.set_pipeline(&self.point_pipeline);
                render_pass.set_vertex_buffer(0, self.positions.buffer.slice(..));
                render_pass.set_vertex_buffer(1, self.colors.buffer.slice(..));
                render_pass.draw(0..self.point_count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl SceneRenderer for RenderSystem {
    fn draw(&mut self, positions: &[f32], colors: &[f32], view: Mat4, projection: Mat4) {
        self.upload(positions, colors, view, projection);

        match self.render() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Render error: GPU out of memory");
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &VERTEX_LAYOUTS,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
