//! Graphics device abstraction.
//!
//! The renderer, texture table and viewport registry only talk to the GPU
//! through [`RenderDevice`]. `WgpuDevice` is the production implementation;
//! tests drive the same code with a recording fake.

use std::fmt;

use crate::error::{BackendError, Result};
use crate::render_plan::PassPlan;
use crate::texture::{MipChain, ScalingMode};
use crate::texture_table::TextureTable;
use crate::utils::Size;
use crate::window::NativeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

impl BufferKind {
    pub fn label(self) -> &'static str {
        match self {
            BufferKind::Vertex => "imgui vertex buffer",
            BufferKind::Index => "imgui index buffer",
            BufferKind::Uniform => "imgui projection buffer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicsBackend {
    Vulkan,
    Metal,
    OpenGl,
    Direct3D12,
}

impl GraphicsBackend {
    /// Preference order used when no backend was requested.
    pub const PRIORITY: [GraphicsBackend; 4] = [
        GraphicsBackend::Vulkan,
        GraphicsBackend::Metal,
        GraphicsBackend::OpenGl,
        GraphicsBackend::Direct3D12,
    ];

    /// Maps a configured backend index. Index 3 historically selected
    /// Direct3D 11 and now selects Direct3D 12.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(GraphicsBackend::Vulkan),
            1 => Some(GraphicsBackend::Metal),
            2 => Some(GraphicsBackend::OpenGl),
            3 => Some(GraphicsBackend::Direct3D12),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GraphicsBackend::Vulkan => "Vulkan",
            GraphicsBackend::Metal => "Metal",
            GraphicsBackend::OpenGl => "OpenGL",
            GraphicsBackend::Direct3D12 => "Direct3D 12",
        }
    }
}

impl fmt::Display for GraphicsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves the configured backend index against what the system supports.
/// A negative index picks the first supported backend in [`GraphicsBackend::PRIORITY`].
pub fn select_backend(
    requested: i32,
    is_supported: impl Fn(GraphicsBackend) -> bool,
) -> Result<GraphicsBackend> {
    if requested < 0 {
        return GraphicsBackend::PRIORITY
            .into_iter()
            .find(|backend| is_supported(*backend))
            .ok_or(BackendError::NoSupportedBackend);
    }
    match GraphicsBackend::from_index(requested) {
        Some(backend) if is_supported(backend) => Ok(backend),
        _ => Err(BackendError::UnsupportedBackend(requested)),
    }
}

/// Buffers and bindings shared by every pass of a frame.
pub struct PassResources<'a, D: RenderDevice> {
    pub vertex_buffer: &'a D::Buffer,
    pub index_buffer: &'a D::Buffer,
    pub projection: &'a D::BindGroup,
    pub textures: &'a TextureTable<D>,
}

pub trait RenderDevice: Sized {
    type Window: NativeWindow;
    type Buffer;
    type Texture;
    type BindGroup;
    type Swapchain;

    fn backend(&self) -> GraphicsBackend;

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<Self::Buffer>;
    /// `data.len()` and `offset` must be multiples of 4.
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture>;
    fn write_texture(&mut self, texture: &Self::Texture, mips: &MipChain);
    fn destroy_texture(&mut self, texture: Self::Texture);

    fn create_texture_bind_group(
        &mut self,
        texture: &Self::Texture,
        scaling: ScalingMode,
    ) -> Self::BindGroup;
    fn create_projection_bind_group(&mut self, uniform: &Self::Buffer) -> Self::BindGroup;
    fn destroy_bind_group(&mut self, bind_group: Self::BindGroup);

    fn create_swapchain(&mut self, window: &Self::Window) -> Result<Self::Swapchain>;
    fn resize_swapchain(&mut self, swapchain: &mut Self::Swapchain, size: Size);
    fn swapchain_size(&self, swapchain: &Self::Swapchain) -> Size;
    fn destroy_swapchain(&mut self, swapchain: Self::Swapchain);

    /// Starts recording the frame's command list.
    fn begin_commands(&mut self);
    /// Acquires the next image of `swapchain`. `Ok(false)` means skip it this frame.
    fn acquire(&mut self, swapchain: &mut Self::Swapchain) -> Result<bool>;
    fn clear(&mut self, swapchain: &Self::Swapchain, color: [f32; 4]);
    fn draw_pass(
        &mut self,
        swapchain: &Self::Swapchain,
        pass: &PassPlan,
        resources: &PassResources<'_, Self>,
    ) -> Result<()>;
    /// Submits the recorded commands and returns the submission index.
    fn submit(&mut self) -> u64;
    fn present(&mut self, swapchain: &mut Self::Swapchain);

    /// Index of the last submission handed to the GPU.
    fn last_submission(&self) -> u64;
    /// Index of the last submission the GPU finished executing.
    fn completed_submission(&self) -> u64;
    fn wait_idle(&mut self);
}
