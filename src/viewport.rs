//! Native windows and swapchains behind the GUI library's viewports.
//!
//! Each entry moves through `Hidden -> Visible -> Closed`. The main window
//! is registered once at startup and is only torn down at shutdown; the
//! library's destroy callback never reaches it.

use std::collections::HashSet;

use log::{debug, warn};

use crate::arena::{Arena, ArenaKey};
use crate::error::{BackendError, Result};
use crate::gpu::RenderDevice;
use crate::gui::{PlatformCallbacks, Viewport, ViewportId};
use crate::utils::{Position, Size};
use crate::window::{NativeWindow, WindowDesc, WindowEvent, WindowSystem};

pub type WindowKey = ArenaKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportState {
    /// No native window is attached.
    Unmanaged,
    Hidden,
    Visible,
    Closed,
}

pub struct ViewportWindow<D: RenderDevice> {
    pub window: D::Window,
    pub swapchain: Option<D::Swapchain>,
    pub is_main: bool,
    pub state: ViewportState,
}

pub struct ViewportRegistry<D: RenderDevice> {
    windows: Arena<ViewportWindow<D>>,
    main: Option<WindowKey>,
    /// Viewports whose window was torn down and not recreated since.
    closed: HashSet<ViewportId>,
}

impl<D: RenderDevice> Default for ViewportRegistry<D> {
    fn default() -> Self {
        Self {
            windows: Arena::new(),
            main: None,
            closed: HashSet::new(),
        }
    }
}

impl<D: RenderDevice> ViewportRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_main(
        &mut self,
        viewport: &mut Viewport,
        window: D::Window,
        swapchain: D::Swapchain,
    ) -> WindowKey {
        let key = self.windows.insert(ViewportWindow {
            window,
            swapchain: Some(swapchain),
            is_main: true,
            state: ViewportState::Visible,
        });
        viewport.platform_user_data = Some(key);
        self.main = Some(key);
        key
    }

    pub fn main_key(&self) -> Option<WindowKey> {
        self.main
    }

    pub fn main(&self) -> Option<&ViewportWindow<D>> {
        self.main.and_then(|key| self.windows.get(key))
    }

    pub fn get(&self, key: WindowKey) -> Option<&ViewportWindow<D>> {
        self.windows.get(key)
    }

    pub fn get_mut(&mut self, key: WindowKey) -> Option<&mut ViewportWindow<D>> {
        self.windows.get_mut(key)
    }

    pub fn window_for(&self, viewport: &Viewport) -> Result<&ViewportWindow<D>> {
        viewport
            .platform_user_data
            .and_then(|key| self.windows.get(key))
            .ok_or(BackendError::UnknownViewport(viewport.id))
    }

    fn window_for_mut(&mut self, viewport: &Viewport) -> Result<&mut ViewportWindow<D>> {
        viewport
            .platform_user_data
            .and_then(|key| self.windows.get_mut(key))
            .ok_or(BackendError::UnknownViewport(viewport.id))
    }

    pub fn state_of(&self, viewport: &Viewport) -> ViewportState {
        match self.window_for(viewport) {
            Ok(entry) => entry.state,
            Err(_) if self.closed.contains(&viewport.id) => ViewportState::Closed,
            Err(_) => ViewportState::Unmanaged,
        }
    }

    /// Number of native windows alive, the main window included.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn swapchain(&self, key: WindowKey) -> Option<&D::Swapchain> {
        self.windows.get(key).and_then(|entry| entry.swapchain.as_ref())
    }

    pub fn framebuffer_size(&self, device: &D, key: WindowKey) -> Option<Size> {
        self.swapchain(key).map(|swapchain| device.swapchain_size(swapchain))
    }

    pub fn acquire(&mut self, device: &mut D, key: WindowKey) -> Result<bool> {
        match self.windows.get_mut(key).and_then(|e| e.swapchain.as_mut()) {
            Some(swapchain) => device.acquire(swapchain),
            None => Ok(false),
        }
    }

    /// Drains main window events, resizing its swapchain on `Resized`.
    /// Returns false once the main window is gone.
    pub fn pump_main(&mut self, device: &mut D) -> bool {
        let Some(entry) = self.main.and_then(|key| self.windows.get_mut(key)) else {
            return false;
        };
        for event in entry.window.pump_events() {
            if let WindowEvent::Resized(size) = event {
                if let Some(swapchain) = entry.swapchain.as_mut() {
                    debug!("main swapchain resized to {}x{}", size.width, size.height);
                    device.resize_swapchain(swapchain, size);
                }
            }
        }
        entry.window.exists()
    }

    /// Drains secondary window events and raises the library's platform
    /// request flags.
    pub fn pump_secondary(&mut self, device: &mut D, viewports: &mut [Viewport]) {
        for viewport in viewports.iter_mut() {
            let Some(key) = viewport.platform_user_data else {
                continue;
            };
            if Some(key) == self.main {
                continue;
            }
            let Some(entry) = self.windows.get_mut(key) else {
                continue;
            };
            for event in entry.window.pump_events() {
                match event {
                    WindowEvent::Resized(size) => {
                        viewport.platform_request_resize = true;
                        if let Some(swapchain) = entry.swapchain.as_mut() {
                            device.resize_swapchain(swapchain, size);
                        }
                    }
                    WindowEvent::Moved(_) => viewport.platform_request_move = true,
                    WindowEvent::CloseRequested => viewport.platform_request_close = true,
                    WindowEvent::Focused(_) => {}
                }
            }
        }
    }

    pub fn present_main(&mut self, device: &mut D) {
        if let Some(swapchain) = self
            .main
            .and_then(|key| self.windows.get_mut(key))
            .and_then(|entry| entry.swapchain.as_mut())
        {
            device.present(swapchain);
        }
    }

    /// Presents every secondary window, in the library's viewport order.
    pub fn present_secondary(&mut self, device: &mut D, viewports: &[Viewport]) {
        for viewport in viewports {
            let Some(key) = viewport.platform_user_data else {
                continue;
            };
            if Some(key) == self.main {
                continue;
            }
            if let Some(swapchain) = self
                .windows
                .get_mut(key)
                .and_then(|entry| entry.swapchain.as_mut())
            {
                device.present(swapchain);
            }
        }
    }

    /// Tears down every window, secondaries first. Each swapchain goes
    /// before its window.
    pub fn destroy_all(&mut self, device: &mut D, viewports: &mut [Viewport]) {
        for viewport in viewports.iter_mut() {
            if viewport.platform_user_data.take().is_some() {
                self.closed.insert(viewport.id);
            }
        }
        let main = self.main.take();
        for key in self.windows.keys() {
            if Some(key) == main {
                continue;
            }
            if let Some(entry) = self.windows.remove(key) {
                teardown(device, entry);
            }
        }
        if let Some(entry) = main.and_then(|key| self.windows.remove(key)) {
            teardown(device, entry);
        }
    }
}

fn teardown<D: RenderDevice>(device: &mut D, mut entry: ViewportWindow<D>) {
    device.wait_idle();
    if let Some(swapchain) = entry.swapchain.take() {
        device.destroy_swapchain(swapchain);
    }
    entry.window.close();
}

/// [`PlatformCallbacks`] backed by a registry, a device and a window system.
/// Built for the duration of one `update_platform_windows` call.
pub struct PlatformBridge<'a, D: RenderDevice, W: WindowSystem<Window = D::Window>> {
    pub registry: &'a mut ViewportRegistry<D>,
    pub device: &'a mut D,
    pub windows: &'a mut W,
}

impl<D, W> PlatformCallbacks for PlatformBridge<'_, D, W>
where
    D: RenderDevice,
    W: WindowSystem<Window = D::Window>,
{
    fn create_window(&mut self, viewport: &mut Viewport) -> Result<()> {
        if self.registry.window_for(viewport).is_ok() {
            warn!("{} already has a platform window", viewport.id);
            return Ok(());
        }
        let desc = WindowDesc::for_viewport(viewport);
        let window = self.windows.create_window(&desc)?;
        let swapchain = self.device.create_swapchain(&window)?;
        let key = self.registry.windows.insert(ViewportWindow {
            window,
            swapchain: Some(swapchain),
            is_main: false,
            state: ViewportState::Hidden,
        });
        viewport.platform_user_data = Some(key);
        self.registry.closed.remove(&viewport.id);
        debug!(
            "created window for {} at ({}, {}) {}x{}",
            viewport.id, desc.position.x, desc.position.y, desc.size.width, desc.size.height
        );
        Ok(())
    }

    fn destroy_window(&mut self, viewport: &mut Viewport) {
        let Some(key) = viewport.platform_user_data else {
            debug!("{} has no platform window to destroy", viewport.id);
            return;
        };
        if Some(key) == self.registry.main {
            return;
        }
        viewport.platform_user_data = None;
        self.registry.closed.insert(viewport.id);
        match self.registry.windows.remove(key) {
            Some(entry) => {
                teardown(self.device, entry);
                debug!("destroyed window for {}", viewport.id);
            }
            None => debug!("{} pointed at a window that is already gone", viewport.id),
        }
    }

    fn show_window(&mut self, viewport: &mut Viewport) -> Result<()> {
        let entry = self.registry.window_for_mut(viewport)?;
        entry.window.show();
        entry.state = ViewportState::Visible;
        Ok(())
    }

    fn set_window_pos(&mut self, viewport: &mut Viewport, pos: Position) -> Result<()> {
        self.registry.window_for_mut(viewport)?.window.set_position(pos);
        Ok(())
    }

    fn get_window_pos(&self, viewport: &Viewport) -> Result<Position> {
        Ok(self.registry.window_for(viewport)?.window.position())
    }

    fn set_window_size(&mut self, viewport: &mut Viewport, size: Size) -> Result<()> {
        self.registry.window_for_mut(viewport)?.window.set_size(size);
        Ok(())
    }

    fn get_window_size(&self, viewport: &Viewport) -> Result<Size> {
        Ok(self.registry.window_for(viewport)?.window.size())
    }

    fn set_window_focus(&mut self, viewport: &mut Viewport) -> Result<()> {
        self.registry.window_for_mut(viewport)?.window.focus();
        Ok(())
    }

    fn get_window_focus(&self, viewport: &Viewport) -> Result<bool> {
        Ok(self.registry.window_for(viewport)?.window.is_focused())
    }

    fn get_window_minimized(&self, viewport: &Viewport) -> Result<bool> {
        Ok(self.registry.window_for(viewport)?.window.is_minimized())
    }

    fn set_window_title(&mut self, viewport: &mut Viewport, title: &str) -> Result<()> {
        self.registry.window_for_mut(viewport)?.window.set_title(title);
        Ok(())
    }
}
