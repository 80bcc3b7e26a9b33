//! Native windowing contract: what the synchronizer needs from an OS window.

use crate::config::WindowConfig;
use crate::error::Result;
use crate::gui::{PlatformMonitor, Viewport};
use crate::utils::{Position, Size};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowDesc {
    pub title: String,
    pub position: Position,
    pub size: Size,
    pub visible: bool,
    pub decorations: bool,
    pub resizable: bool,
    pub always_on_top: bool,
    pub skip_taskbar: bool,
}

impl WindowDesc {
    pub fn main(config: &WindowConfig) -> Self {
        Self {
            title: config.title.clone(),
            position: Position::new(config.x as f32, config.y as f32),
            size: Size::new(config.width as f32, config.height as f32),
            visible: true,
            decorations: true,
            resizable: true,
            always_on_top: false,
            skip_taskbar: false,
        }
    }

    /// Secondary windows start hidden until the library shows them.
    pub fn for_viewport(viewport: &Viewport) -> Self {
        let flags = viewport.flags;
        Self {
            title: "No Title Yet".to_string(),
            position: viewport.pos,
            size: viewport.size,
            visible: false,
            decorations: !flags.no_decoration,
            resizable: !flags.no_decoration,
            always_on_top: flags.top_most,
            skip_taskbar: flags.no_task_bar_icon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    Resized(Size),
    Moved(Position),
    CloseRequested,
    Focused(bool),
}

/// Cursor state in desktop coordinates, independent of the focused window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlobalMouseState {
    pub position: Position,
    pub buttons: [bool; 3],
}

pub trait NativeWindow {
    fn position(&self) -> Position;
    fn size(&self) -> Size;
    fn set_position(&mut self, position: Position);
    fn set_size(&mut self, size: Size);
    fn set_title(&mut self, title: &str);
    fn show(&mut self);
    fn focus(&mut self);
    fn is_focused(&self) -> bool;
    fn is_minimized(&self) -> bool;
    /// False once the window was closed or the user asked to close it.
    fn exists(&self) -> bool;
    /// Drains the events queued for this window since the last pump.
    fn pump_events(&mut self) -> Vec<WindowEvent>;
    fn close(&mut self);
}

pub trait WindowSystem {
    type Window: NativeWindow;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<Self::Window>;
    fn global_mouse_state(&self) -> Option<GlobalMouseState>;
    fn monitors(&self) -> Vec<PlatformMonitor>;
}
