//! Contract with the immediate-mode GUI library.
//!
//! The library owns its viewports and decides when platform windows are
//! created, moved or destroyed. It calls back into the host through
//! [`PlatformCallbacks`], the way the C API exposes function-pointer
//! slots on its platform IO structure.

use std::fmt;

use crate::draw_data::{DrawData, TextureId};
use crate::error::Result;
use crate::input::Key;
use crate::utils::{Position, Size};
use crate::viewport::WindowKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub u32);

impl ViewportId {
    pub const MAIN: ViewportId = ViewportId(0);
}

impl fmt::Display for ViewportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewportFlags {
    pub no_decoration: bool,
    pub no_task_bar_icon: bool,
    pub top_most: bool,
}

/// Library-side view of one rendering surface.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub id: ViewportId,
    pub flags: ViewportFlags,
    pub pos: Position,
    pub size: Size,
    /// Set by the host when it attaches a native window.
    pub platform_user_data: Option<WindowKey>,
    pub platform_request_move: bool,
    pub platform_request_resize: bool,
    pub platform_request_close: bool,
    /// Filled by [`GuiContext::render`].
    pub draw_data: Option<DrawData>,
}

impl Viewport {
    pub fn new(id: ViewportId, pos: Position, size: Size) -> Self {
        Self {
            id,
            flags: ViewportFlags::default(),
            pos,
            size,
            platform_user_data: None,
            platform_request_move: false,
            platform_request_resize: false,
            platform_request_close: false,
            draw_data: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigFlags {
    pub docking_enable: bool,
    pub viewports_enable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendFlags {
    pub has_mouse_cursors: bool,
    pub has_set_mouse_pos: bool,
    pub platform_has_viewports: bool,
    pub renderer_has_viewports: bool,
    pub renderer_has_vtx_offset: bool,
}

/// Per-frame input and display state read by the GUI library.
#[derive(Debug, Clone)]
pub struct GuiIo {
    pub display_size: Size,
    pub display_framebuffer_scale: [f32; 2],
    pub delta_time: f32,
    pub mouse_pos: Position,
    /// Left, right, middle.
    pub mouse_down: [bool; 3],
    pub mouse_wheel: f32,
    pub keys_down: Vec<bool>,
    pub key_ctrl: bool,
    pub key_shift: bool,
    pub key_alt: bool,
    pub key_super: bool,
    pub input_queue_characters: Vec<char>,
    pub config_flags: ConfigFlags,
    pub backend_flags: BackendFlags,
    pub backend_platform_name: Option<String>,
    pub backend_renderer_name: Option<String>,
}

impl Default for GuiIo {
    fn default() -> Self {
        Self {
            display_size: Size::default(),
            display_framebuffer_scale: [1.0, 1.0],
            delta_time: 1.0 / 60.0,
            mouse_pos: Position::default(),
            mouse_down: [false; 3],
            mouse_wheel: 0.0,
            keys_down: vec![false; Key::COUNT],
            key_ctrl: false,
            key_shift: false,
            key_alt: false,
            key_super: false,
            input_queue_characters: Vec::new(),
            config_flags: ConfigFlags::default(),
            backend_flags: BackendFlags::default(),
            backend_platform_name: None,
            backend_renderer_name: None,
        }
    }
}

impl GuiIo {
    pub fn add_input_character(&mut self, c: char) {
        self.input_queue_characters.push(c);
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_down.get(key.index()).copied().unwrap_or(false)
    }
}

/// RGBA32 pixels of the font atlas.
#[derive(Debug, Clone, PartialEq)]
pub struct FontAtlasData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformMonitor {
    pub main_pos: Position,
    pub main_size: Size,
    pub work_pos: Position,
    pub work_size: Size,
    pub dpi_scale: f32,
}

pub trait ClipboardBackend {
    fn get(&mut self) -> Option<String>;
    fn set(&mut self, text: &str);
}

/// Platform slots the GUI library invokes while it updates its windows.
pub trait PlatformCallbacks {
    fn create_window(&mut self, viewport: &mut Viewport) -> Result<()>;
    fn destroy_window(&mut self, viewport: &mut Viewport);
    fn show_window(&mut self, viewport: &mut Viewport) -> Result<()>;
    fn set_window_pos(&mut self, viewport: &mut Viewport, pos: Position) -> Result<()>;
    fn get_window_pos(&self, viewport: &Viewport) -> Result<Position>;
    fn set_window_size(&mut self, viewport: &mut Viewport, size: Size) -> Result<()>;
    fn get_window_size(&self, viewport: &Viewport) -> Result<Size>;
    fn set_window_focus(&mut self, viewport: &mut Viewport) -> Result<()>;
    fn get_window_focus(&self, viewport: &Viewport) -> Result<bool>;
    fn get_window_minimized(&self, viewport: &Viewport) -> Result<bool>;
    fn set_window_title(&mut self, viewport: &mut Viewport, title: &str) -> Result<()>;
}

pub trait GuiContext {
    fn io(&self) -> &GuiIo;
    fn io_mut(&mut self) -> &mut GuiIo;

    fn new_frame(&mut self);

    /// Ends the frame. Afterwards every live viewport carries fresh draw data.
    fn render(&mut self);

    /// Index 0 is the main viewport; the rest follow in creation order.
    fn viewports(&self) -> &[Viewport];
    fn viewports_mut(&mut self) -> &mut [Viewport];

    /// Creates, updates and destroys platform windows through `platform`.
    fn update_platform_windows(&mut self, platform: &mut dyn PlatformCallbacks) -> Result<()>;

    /// Atlas pixels when a (re)build is pending, `None` otherwise.
    fn take_font_atlas(&mut self) -> Option<FontAtlasData>;
    fn set_font_texture_id(&mut self, id: TextureId);

    fn set_monitors(&mut self, monitors: Vec<PlatformMonitor>);

    fn set_clipboard_backend(&mut self, _clipboard: Box<dyn ClipboardBackend>) {}
}
