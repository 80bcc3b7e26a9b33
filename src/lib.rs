//! Platform and renderer backend for immediate-mode GUI libraries.
//!
//! The GUI library is plugged in through [`gui::GuiContext`]. This crate
//! supplies windows, input, GPU resources and the frame loop, including
//! extra native windows for multi-viewport setups.

pub mod arena;
pub mod buffers;
pub mod config;
pub mod draw_data;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod gui;
pub mod input;
pub mod render_plan;
pub mod renderer;
pub mod texture;
pub mod texture_table;
pub mod utils;
pub mod viewport;
pub mod window;

#[cfg(all(feature = "clipboard", not(target_arch = "wasm32")))]
pub mod clipboard;

#[cfg(feature = "backend-wgpu")]
pub mod app;
#[cfg(feature = "backend-wgpu")]
pub mod wgpu_device;
#[cfg(feature = "backend-wgpu")]
pub mod winit_platform;

pub use config::{BackendConfig, RendererConfig, WindowConfig};
pub use draw_data::{DrawCmd, DrawData, DrawIdx, DrawList, DrawVert, TextureId, FONT_TEXTURE_ID};
pub use error::{BackendError, Result};
pub use frame::{Backend, FrameHooks, LoopState};
pub use gpu::{select_backend, GraphicsBackend, RenderDevice};
pub use gui::{GuiContext, GuiIo, PlatformCallbacks, Viewport, ViewportFlags, ViewportId};
pub use input::{InputSnapshot, Key, MouseButton};
pub use texture::{ScalingMode, Texture};
pub use texture_table::{TextureTable, Textures};
pub use viewport::{ViewportRegistry, ViewportState, WindowKey};

#[cfg(feature = "backend-wgpu")]
pub use app::{init_logging, run, ImGuiApp};
#[cfg(feature = "backend-wgpu")]
pub use wgpu_device::WgpuDevice;
