use std::time::Instant;

use anyhow::Context;
use log::{error, info};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Icon, WindowId},
};

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::frame::{Backend, FrameHooks};
use crate::gpu::select_backend;
use crate::gui::GuiContext;
use crate::wgpu_device::WgpuDevice;
use crate::utils::Position;
use crate::window::{WindowDesc, WindowSystem};
use crate::winit_platform::{
    load_window_icon, translate_window_event, EventRouter, InputCollector, WinitWindowSystem,
};

/// Installs the `env_logger` backend, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

pub struct ImGuiApp<G: GuiContext> {
    config: BackendConfig,
    gui: Option<G>,
    hooks: FrameHooks<G, WgpuDevice>,
    backend: Option<Backend<G, WgpuDevice>>,
    router: EventRouter,
    input: InputCollector,
    icon: Option<Icon>,
    last_frame: Instant,
    error: Option<BackendError>,
}

impl<G: GuiContext> ImGuiApp<G> {
    pub fn new(config: BackendConfig, gui: G, hooks: FrameHooks<G, WgpuDevice>) -> Self {
        let icon = config
            .resolved_icon_path()
            .and_then(|path| load_window_icon(&path));
        Self {
            config,
            gui: Some(gui),
            hooks,
            backend: None,
            router: EventRouter::new(),
            input: InputCollector::new(),
            icon,
            last_frame: Instant::now(),
            error: None,
        }
    }

    pub fn backend(&mut self) -> Option<&mut Backend<G, WgpuDevice>> {
        self.backend.as_mut()
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let Some(gui) = self.gui.take() else {
            return Ok(());
        };
        let backend = select_backend(self.config.renderer.backend, WgpuDevice::is_backend_supported)?;
        info!("selected graphics backend {backend}");

        let mut windows = WinitWindowSystem::new(event_loop, &self.router, self.icon.as_ref(), None);
        let main_window = windows.create_window(&WindowDesc::main(&self.config.window))?;
        self.input.set_main_window(main_window.id());
        let (device, swapchain) =
            WgpuDevice::new(&main_window, backend, self.config.renderer.vsync)?;

        #[allow(unused_mut)]
        let mut backend = Backend::new(gui, device, main_window, swapchain, &self.config)?;
        #[cfg(all(feature = "clipboard", not(target_arch = "wasm32")))]
        if let Some(clipboard) = crate::clipboard::SystemClipboard::new() {
            backend.gui_mut().set_clipboard_backend(Box::new(clipboard));
        }
        self.backend = Some(backend);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn step(&mut self, event_loop: &ActiveEventLoop) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let now = Instant::now();
        let delta = (now - self.last_frame).as_secs_f32().max(f32::EPSILON);
        self.last_frame = now;

        let snapshot = self.input.take_snapshot();
        let mut windows = WinitWindowSystem::new(
            event_loop,
            &self.router,
            self.icon.as_ref(),
            self.input.global_mouse_state(),
        );
        match backend.frame(&mut windows, &snapshot, delta, &mut self.hooks) {
            Ok(true) => {}
            Ok(false) => event_loop.exit(),
            Err(e) => {
                error!("frame failed: {e}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }
}

impl<G: GuiContext> ApplicationHandler<()> for ImGuiApp<G> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.backend.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            error!("failed to start: {e}");
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let origin = self.router.window(window_id).and_then(|window| {
            window
                .inner_position()
                .ok()
                .map(|p| Position::new(p.x as f32, p.y as f32))
        });
        self.input.handle_event(window_id, origin, &event);
        if let Some(event) = translate_window_event(&event) {
            self.router.route(window_id, event);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.step(event_loop);
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut backend) = self.backend.take() {
            backend.shutdown();
        }
    }
}

/// Opens the main window and drives `gui` until the window closes.
pub fn run<G: GuiContext + 'static>(
    config: BackendConfig,
    gui: G,
    hooks: FrameHooks<G, WgpuDevice>,
) -> anyhow::Result<()> {
    init_logging();
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ImGuiApp::new(config, gui, hooks);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(mut backend) = app.backend.take() {
        backend.shutdown();
    }
    match app.error.take() {
        Some(e) => Err(e).context("imgui backend failed"),
        None => Ok(()),
    }
}
