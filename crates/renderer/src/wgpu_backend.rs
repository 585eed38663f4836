//! wgpu backend: surface + depth buffer + one textured pipeline.
//! wgpu = 26.x, winit = 0.30.x
//!
//! Draws are collected during the frame and recorded into a single render
//! pass in `end_frame`. Each draw gets its own slot in a dynamic-offset
//! uniform buffer holding its MVP matrix.

use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use asset::shader::ShaderSources;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompareFunction, DepthBiasState, DepthStencilState, Device,
    DeviceDescriptor, ErrorFilter, Extent3d, Features, FragmentState, Instance,
    InstanceDescriptor, Limits, LoadOp, Operations, PipelineLayoutDescriptor, PowerPreference,
    PresentMode, Queue, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, SamplerBindingType, ShaderModuleDescriptor, ShaderSource,
    ShaderStages, StoreOp, Surface, SurfaceConfiguration, TextureDescriptor, TextureDimension,
    TextureFormat, TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor,
    TextureViewDimension, VertexState, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::Vertex;
use crate::backend::{
    AddressMode, BufferDesc, BufferKind, DrawIndexed, FilterMode, RenderBackend, TextureDesc,
};
use crate::error::{RenderError, RenderResult};

/// MVP UBO slot (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MvpUniform {
    mvp: [[f32; 4]; 4],
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;
const INITIAL_MVP_SLOTS: u64 = 16;

pub struct WgpuBuffer {
    buffer: Arc<Buffer>,
    kind: BufferKind,
}

pub struct WgpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    bind_group: Arc<BindGroup>,
}

pub struct WgpuProgram {
    pipeline: Arc<RenderPipeline>,
}

struct PendingDraw {
    pipeline: Arc<RenderPipeline>,
    texture: Arc<BindGroup>,
    vertices: Arc<Buffer>,
    indices: Arc<Buffer>,
    index_count: u32,
    mvp: Mat4,
}

pub struct WgpuBackend {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Layouts shared by every program/texture
    mvp_bgl: BindGroupLayout,
    texture_bgl: BindGroupLayout,

    // Per-draw MVP slots
    mvp_buf: Buffer,
    mvp_bg: BindGroup,
    mvp_stride: u64,
    mvp_slots: u64,

    // Depth
    depth_view: TextureView,

    // Frame
    pending: Vec<PendingDraw>,
    in_frame: bool,
    errors: Arc<AtomicUsize>,

    // Size cache
    width: u32,
    height: u32,
}

impl WgpuBackend {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> RenderResult<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Adapter(e.to_string()))?;
        let info = adapter.get_info();
        log::info!("Using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Cottage Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| RenderError::Device(e.to_string()))?;

        let errors = Arc::new(AtomicUsize::new(0));
        {
            let errors = errors.clone();
            device.on_uncaptured_error(Box::new(move |err| {
                log::error!("wgpu error: {err}");
                errors.fetch_add(1, Ordering::Relaxed);
            }));
        }

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        // Configure surface
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        // Depth texture
        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Bind group layouts ====
        let mvp_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("MVP BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<MvpUniform>() as u64),
                },
                count: None,
            }],
        });
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Texture BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let mvp_stride = align_to(
            std::mem::size_of::<MvpUniform>() as u64,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );
        let (mvp_buf, mvp_bg) = create_mvp_slots(&device, &mvp_bgl, mvp_stride, INITIAL_MVP_SLOTS);

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            mvp_bgl,
            texture_bgl,
            mvp_buf,
            mvp_bg,
            mvp_stride,
            mvp_slots: INITIAL_MVP_SLOTS,
            depth_view,
            pending: Vec::new(),
            in_frame: false,
            errors,
            width,
            height,
        })
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }

    /// Run `f` inside a validation error scope.
    fn validated<T>(&self, f: impl FnOnce(&Device, &Queue) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(ErrorFilter::Validation);
        let value = f(&self.device, &self.queue);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    fn ensure_mvp_slots(&mut self, needed: u64) {
        if needed <= self.mvp_slots {
            return;
        }
        let slots = needed.next_power_of_two();
        log::debug!("Growing MVP uniform slots {} -> {}", self.mvp_slots, slots);
        let (buf, bg) = create_mvp_slots(&self.device, &self.mvp_bgl, self.mvp_stride, slots);
        self.mvp_buf = buf;
        self.mvp_bg = bg;
        self.mvp_slots = slots;
    }
}

impl RenderBackend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Program = WgpuProgram;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_program(&mut self, label: &str, sources: &ShaderSources) -> RenderResult<WgpuProgram> {
        let color_format = self.surface_config.format;
        let bind_group_layouts = [&self.mvp_bgl, &self.texture_bgl];
        let (pipeline, error) = self.validated(|device, _| {
            let vertex = device.create_shader_module(ShaderModuleDescriptor {
                label: Some("Scene vertex WGSL"),
                source: ShaderSource::Wgsl(sources.vertex.as_str().into()),
            });
            let fragment = device.create_shader_module(ShaderModuleDescriptor {
                label: Some("Scene fragment WGSL"),
                source: ShaderSource::Wgsl(sources.fragment.as_str().into()),
            });
            let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some("Scene PipelineLayout"),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: VertexState {
                    module: &vertex,
                    entry_point: Some("vs_main"),
                    buffers: &[Vertex::LAYOUT],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(FragmentState {
                    module: &fragment,
                    entry_point: Some("fs_main"),
                    targets: &[Some(ColorTargetState {
                        format: color_format,
                        blend: Some(BlendState::REPLACE),
                        write_mask: ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        });
        if let Some(err) = error {
            return Err(RenderError::Shader {
                label: label.to_owned(),
                message: err.to_string(),
            });
        }
        log::info!("Built shader program '{}'", label);
        Ok(WgpuProgram {
            pipeline: Arc::new(pipeline),
        })
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> RenderResult<WgpuBuffer> {
        let usage = match desc.kind {
            BufferKind::Vertex => BufferUsages::VERTEX,
            BufferKind::Index => BufferUsages::INDEX,
        };
        let (buffer, error) = self.validated(|device, _| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents: desc.contents,
                usage,
            })
        });
        if let Some(err) = error {
            return Err(RenderError::resource("buffer", desc.label, err));
        }
        log::trace!("Created {:?} buffer '{}' ({} bytes)", desc.kind, desc.label, desc.contents.len());
        Ok(WgpuBuffer {
            buffer: Arc::new(buffer),
            kind: desc.kind,
        })
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> RenderResult<WgpuTexture> {
        let base = desc
            .levels
            .first()
            .ok_or_else(|| RenderError::resource("texture", desc.label, "no mip levels"))?;
        let mip_levels = desc.levels.len() as u32;
        let texture_bgl = &self.texture_bgl;

        let (texture, error) = self.validated(|device, queue| {
            let texture = device.create_texture(&TextureDescriptor {
                label: Some(desc.label),
                size: Extent3d {
                    width: base.width,
                    height: base.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: mip_levels,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                view_formats: &[],
            });

            for (level, data) in desc.levels.iter().enumerate() {
                queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: level as u32,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    &data.data,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(data.bytes_per_row()),
                        rows_per_image: Some(data.height),
                    },
                    Extent3d {
                        width: data.width,
                        height: data.height,
                        depth_or_array_layers: 1,
                    },
                );
            }

            let view = texture.create_view(&TextureViewDescriptor::default());
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(desc.label),
                address_mode_u: address_mode(desc.sampler.address_u),
                address_mode_v: address_mode(desc.sampler.address_v),
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter_mode(desc.sampler.mag_filter),
                min_filter: filter_mode(desc.sampler.min_filter),
                mipmap_filter: filter_mode(desc.sampler.mipmap_filter),
                ..Default::default()
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(desc.label),
                layout: texture_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            });
            WgpuTexture {
                texture,
                bind_group: Arc::new(bind_group),
            }
        });
        if let Some(err) = error {
            return Err(RenderError::resource("texture", desc.label, err));
        }
        log::debug!(
            "Uploaded texture '{}' {}x{} with {} mip levels",
            desc.label,
            base.width,
            base.height,
            mip_levels
        );
        Ok(texture)
    }

    fn begin_frame(&mut self) {
        if self.in_frame {
            log::warn!("begin_frame called twice; dropping {} draws", self.pending.len());
        }
        self.pending.clear();
        self.in_frame = true;
    }

    fn draw_indexed(&mut self, draw: DrawIndexed<'_, Self>) {
        if !self.in_frame {
            log::warn!("draw_indexed outside of a frame ignored");
            self.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if draw.vertices.kind != BufferKind::Vertex || draw.indices.kind != BufferKind::Index {
            log::warn!("draw_indexed with mismatched buffer bindings ignored");
            self.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.pending.push(PendingDraw {
            pipeline: draw.program.pipeline.clone(),
            texture: draw.texture.bind_group.clone(),
            vertices: draw.vertices.buffer.clone(),
            indices: draw.indices.buffer.clone(),
            index_count: draw.index_count,
            mvp: *draw.mvp,
        });
    }

    /// Upload MVPs + clear + draw everything + present.
    fn end_frame(&mut self) -> RenderResult<()> {
        self.in_frame = false;
        let draws = std::mem::take(&mut self.pending);

        // --- MVP slots
        self.ensure_mvp_slots(draws.len() as u64);
        for (slot, draw) in draws.iter().enumerate() {
            let uniform = MvpUniform {
                mvp: draw.mvp.to_cols_array_2d(),
            };
            self.queue.write_buffer(
                &self.mvp_buf,
                slot as u64 * self.mvp_stride,
                bytemuck::bytes_of(&uniform),
            );
        }

        // --- frame & pass
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (slot, draw) in draws.iter().enumerate() {
                let offset = (slot as u64 * self.mvp_stride) as u32;
                rpass.set_pipeline(&draw.pipeline);
                rpass.set_bind_group(0, &self.mvp_bg, &[offset]);
                rpass.set_bind_group(1, draw.texture.as_ref(), &[]);
                rpass.set_vertex_buffer(0, draw.vertices.slice(..));
                rpass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }
}

fn align_to(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

fn address_mode(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn create_mvp_slots(
    device: &Device,
    layout: &BindGroupLayout,
    stride: u64,
    slots: u64,
) -> (Buffer, BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("MVP UBO"),
        size: stride * slots,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("MVP BG"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<MvpUniform>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mvp_slots_respect_offset_alignment() {
        assert_eq!(align_to(64, 256), 256);
        assert_eq!(align_to(64, 64), 64);
        assert_eq!(align_to(300, 256), 512);
        assert_eq!(align_to(64, 0), 64);
    }

    #[test]
    fn sampler_modes_map_one_to_one() {
        assert_eq!(address_mode(AddressMode::Repeat), wgpu::AddressMode::Repeat);
        assert_eq!(filter_mode(FilterMode::Linear), wgpu::FilterMode::Linear);
        assert_eq!(filter_mode(FilterMode::Nearest), wgpu::FilterMode::Nearest);
    }
}
