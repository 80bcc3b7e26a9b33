use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use pollster::block_on;

use crate::draw_data::DrawVert;
use crate::error::{BackendError, Result};
use crate::gpu::{BufferKind, GraphicsBackend, PassResources, RenderDevice, TextureDesc};
use crate::render_plan::{DrawOp, PassPlan};
use crate::texture::{MipChain, ScalingMode};
use crate::utils::{ProjectionUniform, Size};
use crate::window::NativeWindow;
use crate::winit_platform::WinitWindow;

fn to_wgpu_backends(backend: GraphicsBackend) -> wgpu::Backends {
    match backend {
        GraphicsBackend::Vulkan => wgpu::Backends::VULKAN,
        GraphicsBackend::Metal => wgpu::Backends::METAL,
        GraphicsBackend::OpenGl => wgpu::Backends::GL,
        GraphicsBackend::Direct3D12 => wgpu::Backends::DX12,
    }
}

pub struct WgpuSwapchain {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    frame: Option<AcquiredFrame>,
}

struct AcquiredFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct WgpuDevice {
    backend: GraphicsBackend,
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    present_mode: wgpu::PresentMode,
    pipeline: wgpu::RenderPipeline,
    projection_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    point_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    encoder: Option<wgpu::CommandEncoder>,
    submitted: u64,
    completed: Arc<AtomicU64>,
}

impl WgpuDevice {
    /// Whether any adapter is available for `backend` on this system.
    pub fn is_backend_supported(backend: GraphicsBackend) -> bool {
        let backends = to_wgpu_backends(backend);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        !instance.enumerate_adapters(backends).is_empty()
    }

    /// Creates the device together with the main window's swapchain.
    pub fn new(
        window: &WinitWindow,
        backend: GraphicsBackend,
        vsync: bool,
    ) -> Result<(Self, WgpuSwapchain)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: to_wgpu_backends(backend),
            ..Default::default()
        });
        let handle = window
            .handle()
            .ok_or_else(|| BackendError::Surface("main window is closed".to_string()))?;
        let surface = instance
            .create_surface(handle)
            .map_err(|e| BackendError::Surface(e.to_string()))?;

        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        }))
        .ok_or(BackendError::AdapterUnavailable)?;
        info!("using adapter {} on {backend}", adapter.get_info().name);

        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("plutonium_imgui device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| BackendError::DeviceRequest(e.to_string()))?;

        // Vertex colors are already in display space, so keep the target linear.
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(BackendError::AdapterUnavailable)?;
        let present_mode = if vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let projection_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("projection_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ProjectionUniform>() as _,
                    ),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("imgui shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shaders/imgui.wgsl"))),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("imgui pipeline layout"),
            bind_group_layouts: &[&projection_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("imgui pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<DrawVert>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Unorm8x4],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("point sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut this = Self {
            backend,
            instance,
            adapter,
            device,
            queue,
            surface_format,
            present_mode,
            pipeline,
            projection_layout,
            texture_layout,
            point_sampler,
            linear_sampler,
            encoder: None,
            submitted: 0,
            completed: Arc::new(AtomicU64::new(0)),
        };
        let swapchain = this.configure_surface(surface, window.size())?;
        Ok((this, swapchain))
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    fn configure_surface(
        &mut self,
        surface: wgpu::Surface<'static>,
        size: Size,
    ) -> Result<WgpuSwapchain> {
        let caps = surface.get_capabilities(&self.adapter);
        if !caps.formats.contains(&self.surface_format) {
            return Err(BackendError::Surface(format!(
                "surface does not support {:?}",
                self.surface_format
            )));
        }
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: self.surface_format,
            width: (size.width as u32).max(1),
            height: (size.height as u32).max(1),
            present_mode: self.present_mode,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&self.device, &config);
        Ok(WgpuSwapchain {
            surface,
            config,
            frame: None,
        })
    }

    fn sampler(&self, scaling: ScalingMode) -> &wgpu::Sampler {
        match scaling {
            ScalingMode::Point => &self.point_sampler,
            ScalingMode::Linear => &self.linear_sampler,
        }
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("imgui frame encoder"),
            })
        })
    }
}

impl RenderDevice for WgpuDevice {
    type Window = WinitWindow;
    type Buffer = wgpu::Buffer;
    type Texture = WgpuTexture;
    type BindGroup = wgpu::BindGroup;
    type Swapchain = WgpuSwapchain;

    fn backend(&self) -> GraphicsBackend {
        self.backend
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<wgpu::Buffer> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;
        if size > self.device.limits().max_buffer_size {
            return Err(BackendError::Allocation {
                label: kind.label(),
                size,
            });
        }
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(kind.label()),
            size,
            usage,
            mapped_at_creation: false,
        }))
    }

    fn write_buffer(&mut self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    fn destroy_buffer(&mut self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<WgpuTexture> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(BackendError::InvalidTexture(format!(
                "{}x{} exceeds the {max} pixel limit",
                desc.width, desc.height
            )));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuTexture { texture, view })
    }

    fn write_texture(&mut self, texture: &WgpuTexture, mips: &MipChain) {
        for (level, mip) in mips.levels.iter().enumerate() {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture.texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &mip.pixels,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * mip.width),
                    rows_per_image: Some(mip.height),
                },
                wgpu::Extent3d {
                    width: mip.width,
                    height: mip.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    // Dropping defers the release until in-flight submissions finish.
    fn destroy_texture(&mut self, texture: WgpuTexture) {
        drop(texture);
    }

    fn create_texture_bind_group(
        &mut self,
        texture: &WgpuTexture,
        scaling: ScalingMode,
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler(scaling)),
                },
            ],
        })
    }

    fn create_projection_bind_group(&mut self, uniform: &wgpu::Buffer) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("projection_bind_group"),
            layout: &self.projection_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: uniform,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ProjectionUniform>() as _),
                }),
            }],
        })
    }

    fn destroy_bind_group(&mut self, bind_group: wgpu::BindGroup) {
        drop(bind_group);
    }

    fn create_swapchain(&mut self, window: &WinitWindow) -> Result<WgpuSwapchain> {
        let handle = window
            .handle()
            .ok_or_else(|| BackendError::Surface("window is closed".to_string()))?;
        let surface = self
            .instance
            .create_surface(handle)
            .map_err(|e| BackendError::Surface(e.to_string()))?;
        self.configure_surface(surface, window.size())
    }

    fn resize_swapchain(&mut self, swapchain: &mut WgpuSwapchain, size: Size) {
        let width = size.width as u32;
        let height = size.height as u32;
        if width == 0 || height == 0 {
            // minimized; keep the old configuration until it comes back
            return;
        }
        swapchain.frame = None;
        swapchain.config.width = width;
        swapchain.config.height = height;
        swapchain.surface.configure(&self.device, &swapchain.config);
    }

    fn swapchain_size(&self, swapchain: &WgpuSwapchain) -> Size {
        Size::new(swapchain.config.width as f32, swapchain.config.height as f32)
    }

    fn destroy_swapchain(&mut self, mut swapchain: WgpuSwapchain) {
        swapchain.frame = None;
        drop(swapchain);
    }

    fn begin_commands(&mut self) {
        self.encoder();
    }

    fn acquire(&mut self, swapchain: &mut WgpuSwapchain) -> Result<bool> {
        if swapchain.frame.is_some() {
            return Ok(true);
        }
        match swapchain.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                swapchain.frame = Some(AcquiredFrame { texture, view });
                Ok(true)
            }
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                debug!("surface outdated, reconfiguring");
                swapchain.surface.configure(&self.device, &swapchain.config);
                Ok(false)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("timed out acquiring a swapchain image");
                Ok(false)
            }
            Err(e) => Err(BackendError::Surface(e.to_string())),
        }
    }

    fn clear(&mut self, swapchain: &WgpuSwapchain, color: [f32; 4]) {
        let Some(frame) = swapchain.frame.as_ref() else {
            return;
        };
        let encoder = self.encoder();
        let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("imgui clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(to_wgpu_color(color)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    fn draw_pass(
        &mut self,
        swapchain: &WgpuSwapchain,
        pass: &PassPlan,
        resources: &PassResources<'_, Self>,
    ) -> Result<()> {
        let Some(frame) = swapchain.frame.as_ref() else {
            return Ok(());
        };
        let load = match pass.clear {
            Some(color) => wgpu::LoadOp::Clear(to_wgpu_color(color)),
            None => wgpu::LoadOp::Load,
        };
        self.encoder();
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("imgui pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        rpass.set_pipeline(&self.pipeline);
        rpass.set_vertex_buffer(0, resources.vertex_buffer.slice(..));
        rpass.set_index_buffer(resources.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        rpass.set_bind_group(0, resources.projection, &[pass.uniform_offset]);
        rpass.set_viewport(
            0.0,
            0.0,
            pass.framebuffer_size.width,
            pass.framebuffer_size.height,
            0.0,
            1.0,
        );

        for op in &pass.ops {
            match op {
                DrawOp::SetTexture(id) => {
                    rpass.set_bind_group(1, resources.textures.resource_set(*id)?, &[]);
                }
                DrawOp::SetScissor {
                    x,
                    y,
                    width,
                    height,
                } => rpass.set_scissor_rect(*x, *y, *width, *height),
                DrawOp::DrawIndexed {
                    indices,
                    base_vertex,
                } => rpass.draw_indexed(indices.clone(), *base_vertex, 0..1),
            }
        }
        Ok(())
    }

    fn submit(&mut self) -> u64 {
        let encoder = self.encoder.take();
        self.queue.submit(encoder.map(|e| e.finish()));
        self.submitted += 1;
        let index = self.submitted;
        let completed = Arc::clone(&self.completed);
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(index, Ordering::AcqRel);
        });
        index
    }

    fn present(&mut self, swapchain: &mut WgpuSwapchain) {
        if let Some(AcquiredFrame { texture, view }) = swapchain.frame.take() {
            drop(view);
            texture.present();
        }
    }

    fn last_submission(&self) -> u64 {
        self.submitted
    }

    fn completed_submission(&self) -> u64 {
        let _ = self.device.poll(wgpu::Maintain::Poll);
        self.completed.load(Ordering::Acquire)
    }

    fn wait_idle(&mut self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }
}

fn to_wgpu_color([r, g, b, a]: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}
