use bytemuck::{Pod, Zeroable};
use image::RgbaImage;

use super::canvas::{Canvas, CanvasSize, CANVAS_FORMAT, DEPTH_FORMAT};
use super::data_url::png_data_url;
use super::present::Presenter;
use super::readback;
use super::shader::{ShaderProgram, StageSource};
use super::{RenderCtx, RenderTarget};
use crate::{Error, ShaderStage};

pub(crate) const TRIANGLE_VS: StageSource = StageSource {
    stage: ShaderStage::Vertex,
    label: "pixelpipe triangle vs",
    source: include_str!("shaders/triangle_vs.wgsl"),
    entry_point: "vs_main",
};

pub(crate) const TRIANGLE_FS: StageSource = StageSource {
    stage: ShaderStage::Fragment,
    label: "pixelpipe triangle fs",
    source: include_str!("shaders/triangle_fs.wgsl"),
    entry_point: "fs_main",
};

/// Floats per vertex: x, y in canvas pixels and z (depth + color driver).
pub const FLOATS_PER_VERTEX: usize = 3;

/// Smallest vertex buffer allocation, in floats.
const MIN_BUFFER_FLOATS: usize = 64;

/// Number of whole vertices in a flat float list.
///
/// A trailing partial triple is not counted.
#[inline]
pub fn vertex_count(len: usize) -> u32 {
    u32::try_from(len / FLOATS_PER_VERTEX).unwrap_or(u32::MAX)
}

/// Fixed render state applied at construction.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub clear_color: wgpu::Color,
    pub clear_depth: f32,
    /// Incoming fragments pass when `incoming <op> stored`.
    pub depth_compare: wgpu::CompareFunction,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: wgpu::Color::BLACK,
            clear_depth: 1.0,
            depth_compare: wgpu::CompareFunction::LessEqual,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ResolutionUniform {
    size: [f32; 2],
    _pad: [f32; 2], // 16-byte alignment
}

/// Draws one flat list of triangles into a persistent canvas.
///
/// Lifecycle:
/// - [`Renderer::new`] compiles the program, uploads an empty list and draws once
/// - [`Renderer::set_vertices`] replaces the vertex data
/// - [`Renderer::draw_scene`] clears the canvas and issues one draw call
///
/// GPU handles stay private; callers only see the operations.
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RendererConfig,

    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    resolution_ubo: wgpu::Buffer,

    vertex_buffer: wgpu::Buffer,
    /// Allocated size of `vertex_buffer`, in floats.
    vertex_capacity: usize,
    vertex_count: u32,

    canvas: Canvas,
    presenter: Presenter,
}

impl Renderer {
    /// Builds the pipeline and canvas, then draws the (empty) initial scene.
    ///
    /// Fails with [`Error::ShaderCompile`] / [`Error::ProgramLink`] if the fixed
    /// shaders are rejected, or [`Error::ContextUnavailable`] for an empty canvas.
    pub fn new(ctx: &RenderCtx<'_>, size: CanvasSize, config: RendererConfig) -> Result<Self, Error> {
        if size.is_empty() {
            return Err(Error::ContextUnavailable(format!(
                "canvas has zero size ({}x{})",
                size.width, size.height
            )));
        }

        let device = ctx.device;
        let program = ShaderProgram::new(device, TRIANGLE_VS, TRIANGLE_FS)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pixelpipe triangle bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ResolutionUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pixelpipe triangle pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pixelpipe triangle pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some(program.vertex_entry),
                compilation_options: Default::default(),
                buffers: &[vertex_layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some(program.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: CANVAS_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: config.depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        let resolution_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixelpipe resolution ubo"),
            size: std::mem::size_of::<ResolutionUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pixelpipe triangle bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: resolution_ubo.as_entire_binding(),
            }],
        });

        let canvas = Canvas::new(device, size);
        let presenter = Presenter::new(device, ctx.surface_format, &canvas)?;

        let mut renderer = Self {
            device: device.clone(),
            queue: ctx.queue.clone(),
            config,
            pipeline,
            bind_group,
            resolution_ubo,
            vertex_buffer: create_vertex_buffer(device, MIN_BUFFER_FLOATS),
            vertex_capacity: MIN_BUFFER_FLOATS,
            vertex_count: 0,
            canvas,
            presenter,
        };

        log::info!("renderer ready, canvas {}x{}", size.width, size.height);

        renderer.set_vertices(&[]);
        renderer.draw_scene();

        Ok(renderer)
    }

    /// Replaces the vertex data used by the next [`draw_scene`](Self::draw_scene).
    ///
    /// `vertices` is a flat list of `(x, y, z)` triples. Lengths that are not a
    /// multiple of 3 are accepted; the trailing partial vertex is never drawn.
    ///
    /// The list is cut to the whole vertices that fit in the device's
    /// `max_buffer_size`; anything past that is dropped with a warning.
    pub fn set_vertices(&mut self, vertices: &[f32]) {
        let max_floats = max_vertex_floats(self.device.limits().max_buffer_size);
        let vertices = if vertices.len() > max_floats {
            log::warn!(
                "vertex list of {} floats exceeds the device buffer limit, keeping {max_floats}",
                vertices.len()
            );
            &vertices[..max_floats]
        } else {
            vertices
        };

        self.vertex_count = vertex_count(vertices.len());

        if vertices.len() > self.vertex_capacity {
            let capacity = grown_capacity(vertices.len(), max_floats);
            self.vertex_buffer = create_vertex_buffer(&self.device, capacity);
            self.vertex_capacity = capacity;
            log::debug!("vertex buffer grown to {capacity} floats");
        }

        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }

        log::debug!(
            "uploaded {} floats ({} vertices)",
            vertices.len(),
            self.vertex_count
        );
    }

    /// Clears the canvas and draws the current vertex list.
    ///
    /// The resolution uniform is re-read from the canvas size on every call.
    pub fn draw_scene(&self) {
        let size = self.canvas.size();
        let u = ResolutionUniform {
            size: [size.width as f32, size.height as f32],
            _pad: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.resolution_ubo, 0, bytemuck::bytes_of(&u));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pixelpipe draw encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pixelpipe triangle pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.canvas.color_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.config.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.canvas.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.config.clear_depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if self.vertex_count > 0 {
                let bytes = self.vertex_count as u64 * VERTEX_STRIDE;
                rpass.set_pipeline(&self.pipeline);
                rpass.set_bind_group(0, &self.bind_group, &[]);
                rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..bytes));
                rpass.draw(0..self.vertex_count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        log::trace!("drew {} vertices at {}x{}", self.vertex_count, size.width, size.height);
    }

    /// Changes the canvas pixel size.
    ///
    /// The canvas is recreated and holds undefined contents until the next
    /// [`draw_scene`](Self::draw_scene). Zero sizes are ignored.
    pub fn resize(&mut self, size: CanvasSize) {
        if size.is_empty() {
            log::warn!("ignoring canvas resize to {}x{}", size.width, size.height);
            return;
        }
        if size == self.canvas.size() {
            return;
        }

        self.canvas = Canvas::new(&self.device, size);
        self.presenter.rebind(&self.device, &self.canvas);
        log::debug!("canvas resized to {}x{}", size.width, size.height);
    }

    /// Current canvas size in pixels.
    #[inline]
    pub fn size(&self) -> CanvasSize {
        self.canvas.size()
    }

    /// Vertex count recorded by the last [`set_vertices`](Self::set_vertices).
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Encodes a pass that stretches the canvas over `target`.
    pub fn present(&self, target: &mut RenderTarget<'_>) {
        self.presenter.encode(target);
    }

    /// Reads the canvas back as tightly packed RGBA rows, top row first.
    pub fn read_pixels(&self) -> Result<Vec<u8>, Error> {
        readback::read_texture(
            &self.device,
            &self.queue,
            self.canvas.color_texture(),
            self.canvas.size(),
        )
    }

    /// Copies the canvas into `destination` and returns it as a PNG data URL.
    ///
    /// `destination` is resized to the canvas dimensions. Rendering state is
    /// left untouched.
    pub fn image_as_data_url(&self, destination: &mut RgbaImage) -> Result<String, Error> {
        let size = self.canvas.size();
        let pixels = self.read_pixels()?;

        *destination = RgbaImage::from_raw(size.width, size.height, pixels).ok_or_else(|| {
            Error::Readback("pixel data does not match canvas size".into())
        })?;

        let url = png_data_url(destination)?;
        log::info!("exported {}x{} canvas ({} byte data url)", size.width, size.height, url.len());
        Ok(url)
    }
}

const VERTEX_STRIDE: u64 = (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as u64;

const VERTEX_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

/// Largest float count a single vertex buffer may hold, in whole vertices.
fn max_vertex_floats(max_buffer_size: u64) -> usize {
    let floats = max_buffer_size / std::mem::size_of::<f32>() as u64;
    let floats = usize::try_from(floats).unwrap_or(usize::MAX);
    floats - floats % FLOATS_PER_VERTEX
}

/// Next allocation for `len` floats: a power of two, never below
/// `MIN_BUFFER_FLOATS` and never above `max_floats`.
fn grown_capacity(len: usize, max_floats: usize) -> usize {
    len.checked_next_power_of_two()
        .unwrap_or(usize::MAX)
        .max(MIN_BUFFER_FLOATS)
        .min(max_floats)
        .max(len)
}

fn create_vertex_buffer(device: &wgpu::Device, floats: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("pixelpipe vertex buffer"),
        size: (floats * std::mem::size_of::<f32>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
