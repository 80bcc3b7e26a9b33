//! winit implementation of the windowing contract.
//!
//! winit delivers every window's events to one application handler, so a
//! shared [`EventRouter`] sorts them into per-window queues that
//! [`WinitWindow::pump_events`] drains. There is no global cursor query
//! either; [`InputCollector`] reconstructs desktop coordinates from the
//! hovered window's position.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Weak};

use log::{debug, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseScrollDelta};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Icon, Window, WindowId, WindowLevel};

use crate::error::{BackendError, Result};
use crate::gui::PlatformMonitor;
use crate::input::{InputSnapshot, Key, KeyEvent, MouseButton, MouseEvent};
use crate::utils::{Position, Size};
use crate::window::{GlobalMouseState, NativeWindow, WindowDesc, WindowEvent, WindowSystem};

/// Pixels per wheel line for touchpads reporting pixel deltas.
const PIXELS_PER_LINE: f32 = 20.0;

#[derive(Default)]
struct RouterState {
    queues: HashMap<WindowId, VecDeque<WindowEvent>>,
    windows: HashMap<WindowId, Weak<Window>>,
}

#[derive(Clone, Default)]
pub struct EventRouter {
    state: Rc<RefCell<RouterState>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, window: &Arc<Window>) {
        self.open_queue(window.id());
        self.state
            .borrow_mut()
            .windows
            .insert(window.id(), Arc::downgrade(window));
    }

    fn open_queue(&self, id: WindowId) {
        self.state.borrow_mut().queues.insert(id, VecDeque::new());
    }

    pub fn unregister(&self, id: WindowId) {
        let mut state = self.state.borrow_mut();
        state.queues.remove(&id);
        state.windows.remove(&id);
    }

    /// Queues `event` for `id`; events for unknown windows are dropped.
    pub fn route(&self, id: WindowId, event: WindowEvent) {
        if let Some(queue) = self.state.borrow_mut().queues.get_mut(&id) {
            queue.push_back(event);
        }
    }

    /// Some platforms apply a size request synchronously and report it only
    /// through the return value of `request_inner_size`.
    pub fn route_applied_size(&self, id: WindowId, applied: Option<PhysicalSize<u32>>) {
        if let Some(size) = applied {
            self.route(
                id,
                WindowEvent::Resized(Size::new(size.width as f32, size.height as f32)),
            );
        }
    }

    pub fn drain(&self, id: WindowId) -> Vec<WindowEvent> {
        self.state
            .borrow_mut()
            .queues
            .get_mut(&id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn window(&self, id: WindowId) -> Option<Arc<Window>> {
        self.state.borrow().windows.get(&id).and_then(Weak::upgrade)
    }
}

/// Maps a winit window event to the platform-independent form, if it is one
/// the viewport layer cares about.
pub fn translate_window_event(event: &winit::event::WindowEvent) -> Option<WindowEvent> {
    match event {
        winit::event::WindowEvent::Resized(size) => Some(WindowEvent::Resized(Size::new(
            size.width as f32,
            size.height as f32,
        ))),
        winit::event::WindowEvent::Moved(pos) => {
            Some(WindowEvent::Moved(Position::new(pos.x as f32, pos.y as f32)))
        }
        winit::event::WindowEvent::CloseRequested => Some(WindowEvent::CloseRequested),
        winit::event::WindowEvent::Focused(focused) => Some(WindowEvent::Focused(*focused)),
        _ => None,
    }
}

pub struct WinitWindow {
    window: Option<Arc<Window>>,
    id: WindowId,
    router: EventRouter,
    close_requested: bool,
}

impl WinitWindow {
    pub fn new(window: Arc<Window>, router: EventRouter) -> Self {
        router.register(&window);
        Self {
            id: window.id(),
            window: Some(window),
            router,
            close_requested: false,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn handle(&self) -> Option<Arc<Window>> {
        self.window.clone()
    }
}

impl NativeWindow for WinitWindow {
    fn position(&self) -> Position {
        self.window
            .as_ref()
            .and_then(|w| w.inner_position().ok())
            .map(|p| Position::new(p.x as f32, p.y as f32))
            .unwrap_or_default()
    }

    fn size(&self) -> Size {
        self.window
            .as_ref()
            .map(|w| {
                let size = w.inner_size();
                Size::new(size.width as f32, size.height as f32)
            })
            .unwrap_or_default()
    }

    fn set_position(&mut self, position: Position) {
        if let Some(window) = &self.window {
            window.set_outer_position(PhysicalPosition::new(position.x as i32, position.y as i32));
        }
    }

    fn set_size(&mut self, size: Size) {
        if let Some(window) = &self.window {
            let applied = window.request_inner_size(PhysicalSize::new(
                size.width.max(1.0) as u32,
                size.height.max(1.0) as u32,
            ));
            self.router.route_applied_size(self.id, applied);
        }
    }

    fn set_title(&mut self, title: &str) {
        if let Some(window) = &self.window {
            window.set_title(title);
        }
    }

    fn show(&mut self) {
        if let Some(window) = &self.window {
            window.set_visible(true);
        }
    }

    fn focus(&mut self) {
        if let Some(window) = &self.window {
            window.focus_window();
        }
    }

    fn is_focused(&self) -> bool {
        self.window.as_ref().is_some_and(|w| w.has_focus())
    }

    fn is_minimized(&self) -> bool {
        self.window
            .as_ref()
            .and_then(|w| w.is_minimized())
            .unwrap_or(false)
    }

    fn exists(&self) -> bool {
        self.window.is_some() && !self.close_requested
    }

    fn pump_events(&mut self) -> Vec<WindowEvent> {
        let events = self.router.drain(self.id);
        if events.contains(&WindowEvent::CloseRequested) {
            self.close_requested = true;
        }
        events
    }

    fn close(&mut self) {
        self.router.unregister(self.id);
        self.window = None;
    }
}

impl Drop for WinitWindow {
    fn drop(&mut self) {
        self.router.unregister(self.id);
    }
}

/// Window factory for one turn of the event loop.
pub struct WinitWindowSystem<'a> {
    event_loop: &'a ActiveEventLoop,
    router: &'a EventRouter,
    icon: Option<&'a Icon>,
    cursor: Option<GlobalMouseState>,
}

impl<'a> WinitWindowSystem<'a> {
    pub fn new(
        event_loop: &'a ActiveEventLoop,
        router: &'a EventRouter,
        icon: Option<&'a Icon>,
        cursor: Option<GlobalMouseState>,
    ) -> Self {
        Self {
            event_loop,
            router,
            icon,
            cursor,
        }
    }
}

impl WindowSystem for WinitWindowSystem<'_> {
    type Window = WinitWindow;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<WinitWindow> {
        let mut attributes = Window::default_attributes()
            .with_title(desc.title.clone())
            .with_position(PhysicalPosition::new(
                desc.position.x as i32,
                desc.position.y as i32,
            ))
            .with_inner_size(PhysicalSize::new(
                desc.size.width.max(1.0) as u32,
                desc.size.height.max(1.0) as u32,
            ))
            .with_visible(desc.visible)
            .with_decorations(desc.decorations)
            .with_resizable(desc.resizable)
            .with_window_icon(self.icon.cloned());
        if desc.always_on_top {
            attributes = attributes.with_window_level(WindowLevel::AlwaysOnTop);
        }
        #[cfg(target_os = "windows")]
        {
            use winit::platform::windows::WindowAttributesExtWindows;
            attributes = attributes.with_skip_taskbar(desc.skip_taskbar);
        }

        let window = self
            .event_loop
            .create_window(attributes)
            .map_err(|e| BackendError::WindowCreation(e.to_string()))?;
        debug!("created native window {:?} \"{}\"", window.id(), desc.title);
        Ok(WinitWindow::new(Arc::new(window), self.router.clone()))
    }

    fn global_mouse_state(&self) -> Option<GlobalMouseState> {
        self.cursor
    }

    fn monitors(&self) -> Vec<PlatformMonitor> {
        self.event_loop
            .available_monitors()
            .map(|monitor| {
                let pos = monitor.position();
                let size = monitor.size();
                let pos = Position::new(pos.x as f32, pos.y as f32);
                let size = Size::new(size.width as f32, size.height as f32);
                PlatformMonitor {
                    main_pos: pos,
                    main_size: size,
                    work_pos: pos,
                    work_size: size,
                    dpi_scale: monitor.scale_factor() as f32,
                }
            })
            .collect()
    }
}

/// Accumulates winit input between frames.
#[derive(Debug, Default)]
pub struct InputCollector {
    pending: InputSnapshot,
    main_window: Option<WindowId>,
    global_cursor: Option<Position>,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the main window's cursor feeds the per-window mouse position.
    pub fn set_main_window(&mut self, id: WindowId) {
        self.main_window = Some(id);
    }

    /// `window_origin` is the client-area position of the window that
    /// produced the event, used to derive desktop coordinates.
    pub fn handle_event(
        &mut self,
        id: WindowId,
        window_origin: Option<Position>,
        event: &winit::event::WindowEvent,
    ) {
        match event {
            winit::event::WindowEvent::CursorMoved { position, .. } => {
                let local = Position::new(position.x as f32, position.y as f32);
                if Some(id) == self.main_window {
                    self.pending.mouse_position = local;
                }
                if let Some(origin) = window_origin {
                    self.global_cursor = Some(origin + local);
                }
            }
            winit::event::WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = map_mouse_button(*button) else {
                    return;
                };
                let down = *state == ElementState::Pressed;
                self.pending.mouse_events.push(MouseEvent { button, down });
                self.pending.mouse_held[button.index()] = down;
            }
            winit::event::WindowEvent::MouseWheel { delta, .. } => {
                self.pending.wheel_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
            }
            winit::event::WindowEvent::KeyboardInput { event, .. } => {
                let down = event.state.is_pressed();
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(key) = map_key_code(code) {
                        self.pending.key_events.push(KeyEvent { key, down });
                    }
                }
                if down {
                    if let Some(text) = &event.text {
                        self.pending
                            .key_char_presses
                            .extend(text.chars().filter(|c| !c.is_control()));
                    }
                }
            }
            winit::event::WindowEvent::Focused(false) => {
                // a release may never arrive once focus is gone
                self.pending.mouse_held = [false; 3];
            }
            _ => {}
        }
    }

    /// Hands out what was collected since the last call. Cursor position and
    /// held buttons carry over.
    pub fn take_snapshot(&mut self) -> InputSnapshot {
        let snapshot = self.pending.clone();
        self.pending.wheel_delta = 0.0;
        self.pending.mouse_events.clear();
        self.pending.key_events.clear();
        self.pending.key_char_presses.clear();
        snapshot
    }

    pub fn global_mouse_state(&self) -> Option<GlobalMouseState> {
        self.global_cursor.map(|position| GlobalMouseState {
            position,
            buttons: self.pending.mouse_held,
        })
    }
}

/// Loads a window icon. A missing or unreadable file yields `None`.
pub fn load_window_icon(path: &Path) -> Option<Icon> {
    if !path.exists() {
        return None;
    }
    let image = match image::open(path) {
        Ok(image) => image.to_rgba8(),
        Err(e) => {
            warn!("failed to read icon {}: {e}", path.display());
            return None;
        }
    };
    let (width, height) = image.dimensions();
    match Icon::from_rgba(image.into_raw(), width, height) {
        Ok(icon) => Some(icon),
        Err(e) => {
            warn!("invalid icon {}: {e}", path.display());
            None
        }
    }
}

fn map_mouse_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

pub fn map_key_code(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::Tab => Key::Tab,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Insert => Key::Insert,
        KeyCode::Delete => Key::Delete,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter | KeyCode::NumpadEnter => Key::Enter,
        KeyCode::Escape => Key::Escape,
        KeyCode::Space => Key::Space,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,
        KeyCode::Digit0 => Key::Num0,
        KeyCode::Digit1 => Key::Num1,
        KeyCode::Digit2 => Key::Num2,
        KeyCode::Digit3 => Key::Num3,
        KeyCode::Digit4 => Key::Num4,
        KeyCode::Digit5 => Key::Num5,
        KeyCode::Digit6 => Key::Num6,
        KeyCode::Digit7 => Key::Num7,
        KeyCode::Digit8 => Key::Num8,
        KeyCode::Digit9 => Key::Num9,
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::F6 => Key::F6,
        KeyCode::F7 => Key::F7,
        KeyCode::F8 => Key::F8,
        KeyCode::F9 => Key::F9,
        KeyCode::F10 => Key::F10,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,
        KeyCode::Minus => Key::Minus,
        KeyCode::Equal => Key::Equal,
        KeyCode::BracketLeft => Key::BracketLeft,
        KeyCode::BracketRight => Key::BracketRight,
        KeyCode::Backslash => Key::Backslash,
        KeyCode::Semicolon => Key::Semicolon,
        KeyCode::Quote => Key::Quote,
        KeyCode::Comma => Key::Comma,
        KeyCode::Period => Key::Period,
        KeyCode::Slash => Key::Slash,
        KeyCode::Backquote => Key::Backquote,
        KeyCode::ControlLeft => Key::ControlLeft,
        KeyCode::ControlRight => Key::ControlRight,
        KeyCode::ShiftLeft => Key::ShiftLeft,
        KeyCode::ShiftRight => Key::ShiftRight,
        KeyCode::AltLeft => Key::AltLeft,
        KeyCode::AltRight => Key::AltRight,
        KeyCode::SuperLeft => Key::SuperLeft,
        KeyCode::SuperRight => Key::SuperRight,
        _ => return None,
    };
    Some(key)
}
