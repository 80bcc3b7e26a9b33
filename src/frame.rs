//! Per-frame orchestration of input, GUI, platform windows and rendering.

use log::{debug, info};

use crate::config::BackendConfig;
use crate::draw_data::{TextureId, FONT_TEXTURE_ID};
use crate::error::{BackendError, Result};
use crate::gpu::{GraphicsBackend, RenderDevice};
use crate::gui::{GuiContext, GuiIo, ViewportId};
use crate::input::{InputSnapshot, InputTranslator};
use crate::render_plan::{plan_frame, RenderTarget};
use crate::renderer::ImRenderer;
use crate::texture::ScalingMode;
use crate::texture_table::{TextureTable, Textures};
use crate::viewport::{PlatformBridge, ViewportRegistry};
use crate::window::{NativeWindow, WindowSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

pub type Hook<G, D> = Box<dyn FnMut(&mut G, &mut Textures<'_, D>)>;
pub type UpdateHook<G, D> = Box<dyn FnMut(&mut G, &mut Textures<'_, D>, f32)>;

/// User code run at fixed points of every frame.
pub struct FrameHooks<G, D: RenderDevice> {
    pub early_update: Option<Hook<G, D>>,
    pub update: Option<UpdateHook<G, D>>,
    pub draw_ui: Hook<G, D>,
    pub early_render: Option<Hook<G, D>>,
    pub render: Option<Hook<G, D>>,
}

impl<G, D: RenderDevice> FrameHooks<G, D> {
    pub fn new(draw_ui: impl FnMut(&mut G, &mut Textures<'_, D>) + 'static) -> Self {
        Self {
            early_update: None,
            update: None,
            draw_ui: Box::new(draw_ui),
            early_render: None,
            render: None,
        }
    }

    pub fn with_early_update(
        mut self,
        hook: impl FnMut(&mut G, &mut Textures<'_, D>) + 'static,
    ) -> Self {
        self.early_update = Some(Box::new(hook));
        self
    }

    pub fn with_update(
        mut self,
        hook: impl FnMut(&mut G, &mut Textures<'_, D>, f32) + 'static,
    ) -> Self {
        self.update = Some(Box::new(hook));
        self
    }

    pub fn with_early_render(
        mut self,
        hook: impl FnMut(&mut G, &mut Textures<'_, D>) + 'static,
    ) -> Self {
        self.early_render = Some(Box::new(hook));
        self
    }

    pub fn with_render(mut self, hook: impl FnMut(&mut G, &mut Textures<'_, D>) + 'static) -> Self {
        self.render = Some(Box::new(hook));
        self
    }
}

fn run_hook<G, D: RenderDevice>(
    hook: &mut Option<Hook<G, D>>,
    gui: &mut G,
    table: &mut TextureTable<D>,
    device: &mut D,
) {
    if let Some(hook) = hook.as_mut() {
        hook(gui, &mut Textures::new(table, device));
    }
}

/// Advertises backend capabilities and enables docking or viewports.
pub fn configure_io(io: &mut GuiIo, backend: GraphicsBackend, docking: bool, viewports: bool) {
    io.config_flags.docking_enable = docking;
    io.config_flags.viewports_enable = viewports;
    io.backend_flags.has_mouse_cursors = true;
    io.backend_flags.has_set_mouse_pos = true;
    io.backend_flags.renderer_has_vtx_offset = true;
    io.backend_flags.platform_has_viewports = viewports;
    io.backend_flags.renderer_has_viewports = viewports;
    io.backend_platform_name = Some("plutonium_imgui_winit".to_string());
    io.backend_renderer_name = Some(format!("plutonium_imgui_{}", backend.name()));
}

/// Owns the GUI context, the device and every window for the lifetime of
/// the application. Drive it with [`Backend::frame`] until it returns
/// `Ok(false)`, then call [`Backend::shutdown`].
pub struct Backend<G: GuiContext, D: RenderDevice> {
    gui: G,
    device: D,
    renderer: ImRenderer<D>,
    viewports: ViewportRegistry<D>,
    input: InputTranslator,
    state: LoopState,
    frame_begun: bool,
    main_acquired: bool,
    viewports_enabled: bool,
    clear_color: [f32; 4],
}

impl<G: GuiContext, D: RenderDevice> Backend<G, D> {
    pub fn new(
        mut gui: G,
        mut device: D,
        main_window: D::Window,
        main_swapchain: D::Swapchain,
        config: &BackendConfig,
    ) -> Result<Self> {
        let backend = device.backend();
        let viewports_enabled = config
            .renderer
            .viewports
            .unwrap_or(backend == GraphicsBackend::Vulkan);
        configure_io(gui.io_mut(), backend, config.renderer.docking, viewports_enabled);

        let mut viewports = ViewportRegistry::new();
        let main = gui
            .viewports_mut()
            .first_mut()
            .ok_or(BackendError::UnknownViewport(ViewportId::MAIN))?;
        viewports.register_main(main, main_window, main_swapchain);

        let renderer = ImRenderer::new(&mut device)?;
        let mut this = Self {
            gui,
            device,
            renderer,
            viewports,
            input: InputTranslator::new(),
            state: LoopState::NotStarted,
            frame_begun: false,
            main_acquired: false,
            viewports_enabled,
            clear_color: config.renderer.clear_rgba(),
        };
        this.rebuild_font_atlas()?;
        this.set_per_frame_data(1.0 / 60.0);
        info!(
            "backend ready on {backend} (viewports {}, docking {})",
            if viewports_enabled { "on" } else { "off" },
            if config.renderer.docking { "on" } else { "off" }
        );
        Ok(this)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn viewports_enabled(&self) -> bool {
        self.viewports_enabled
    }

    pub fn gui(&self) -> &G {
        &self.gui
    }

    pub fn gui_mut(&mut self) -> &mut G {
        &mut self.gui
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn registry(&self) -> &ViewportRegistry<D> {
        &self.viewports
    }

    pub fn renderer(&self) -> &ImRenderer<D> {
        &self.renderer
    }

    pub fn textures(&mut self) -> Textures<'_, D> {
        Textures::new(self.renderer.textures_mut(), &mut self.device)
    }

    pub fn bind_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        scaling: ScalingMode,
    ) -> Result<TextureId> {
        self.textures().bind(pixels, width, height, scaling)
    }

    pub fn free_texture(&mut self, id: TextureId) -> Result<()> {
        self.textures().free(id)
    }

    /// Runs one frame. Returns `Ok(false)` once the main window is gone or
    /// the backend was shut down.
    pub fn frame<W>(
        &mut self,
        windows: &mut W,
        snapshot: &InputSnapshot,
        delta: f32,
        hooks: &mut FrameHooks<G, D>,
    ) -> Result<bool>
    where
        W: WindowSystem<Window = D::Window>,
    {
        match self.state {
            LoopState::NotStarted => self.state = LoopState::Running,
            LoopState::Running => {}
            LoopState::ShuttingDown | LoopState::Stopped => return Ok(false),
        }

        if !self.viewports.pump_main(&mut self.device) {
            info!("main window closed");
            return Ok(false);
        }

        run_hook(
            &mut hooks.early_update,
            &mut self.gui,
            self.renderer.textures_mut(),
            &mut self.device,
        );
        self.update(windows, snapshot, delta)?;
        if let Some(update) = hooks.update.as_mut() {
            update(
                &mut self.gui,
                &mut Textures::new(self.renderer.textures_mut(), &mut self.device),
                delta,
            );
        }
        (hooks.draw_ui)(
            &mut self.gui,
            &mut Textures::new(self.renderer.textures_mut(), &mut self.device),
        );

        self.device.begin_commands();
        self.main_acquired = match self.viewports.main_key() {
            Some(key) => self.viewports.acquire(&mut self.device, key)?,
            None => false,
        };
        if self.main_acquired {
            if let Some(swapchain) = self.viewports.main_key().and_then(|k| self.viewports.swapchain(k)) {
                self.device.clear(swapchain, self.clear_color);
            }
        }

        run_hook(
            &mut hooks.early_render,
            &mut self.gui,
            self.renderer.textures_mut(),
            &mut self.device,
        );
        self.render(windows)?;
        run_hook(
            &mut hooks.render,
            &mut self.gui,
            self.renderer.textures_mut(),
            &mut self.device,
        );

        self.device.submit();
        self.viewports.present_main(&mut self.device);
        if self.viewports_enabled {
            self.viewports
                .present_secondary(&mut self.device, self.gui.viewports());
        }
        self.renderer.collect_retired(&mut self.device);
        Ok(true)
    }

    fn update<W>(&mut self, windows: &mut W, snapshot: &InputSnapshot, delta: f32) -> Result<()>
    where
        W: WindowSystem<Window = D::Window>,
    {
        // Close out a frame that was begun but never rendered.
        if self.frame_begun {
            self.gui.render();
            if self.viewports_enabled {
                self.update_platform_windows(windows)?;
            }
        }

        self.set_per_frame_data(delta);
        self.input
            .translate(self.gui.io_mut(), snapshot, windows.global_mouse_state());
        self.viewports
            .pump_secondary(&mut self.device, self.gui.viewports_mut());
        self.gui.set_monitors(windows.monitors());
        self.rebuild_font_atlas()?;

        self.frame_begun = true;
        self.gui.new_frame();
        Ok(())
    }

    fn render<W>(&mut self, windows: &mut W) -> Result<()>
    where
        W: WindowSystem<Window = D::Window>,
    {
        if !self.frame_begun {
            return Ok(());
        }
        self.frame_begun = false;
        self.gui.render();
        if self.viewports_enabled {
            self.update_platform_windows(windows)?;
        }

        let main_key = self.viewports.main_key();
        let mut targets = Vec::new();
        for (index, viewport) in self.gui.viewports().iter().enumerate() {
            if index > 0 && !self.viewports_enabled {
                break;
            }
            let (Some(draw_data), Some(key)) =
                (viewport.draw_data.as_ref(), viewport.platform_user_data)
            else {
                continue;
            };
            let is_main = Some(key) == main_key;
            let acquired = if is_main {
                self.main_acquired
            } else {
                self.viewports.acquire(&mut self.device, key)?
            };
            if !acquired {
                continue;
            }
            let Some(framebuffer_size) = self.viewports.framebuffer_size(&self.device, key) else {
                continue;
            };
            targets.push(RenderTarget {
                window: key,
                viewport: viewport.id,
                draw_data,
                framebuffer_size,
                clear: (!is_main).then_some(self.clear_color),
            });
        }

        let plan = plan_frame(&targets, self.renderer.textures())?;
        self.renderer.render(&mut self.device, &self.viewports, &plan)
    }

    fn update_platform_windows<W>(&mut self, windows: &mut W) -> Result<()>
    where
        W: WindowSystem<Window = D::Window>,
    {
        let mut bridge = PlatformBridge {
            registry: &mut self.viewports,
            device: &mut self.device,
            windows,
        };
        self.gui.update_platform_windows(&mut bridge)
    }

    fn set_per_frame_data(&mut self, delta: f32) {
        let Some(main) = self.viewports.main() else {
            return;
        };
        let pos = main.window.position();
        let size = main.window.size();
        let io = self.gui.io_mut();
        io.display_size = size;
        io.display_framebuffer_scale = [1.0, 1.0];
        io.delta_time = delta;
        if let Some(viewport) = self.gui.viewports_mut().first_mut() {
            viewport.pos = pos;
            viewport.size = size;
        }
    }

    fn rebuild_font_atlas(&mut self) -> Result<()> {
        if let Some(atlas) = self.gui.take_font_atlas() {
            self.renderer
                .textures_mut()
                .rebuild_font(&mut self.device, &atlas)?;
            self.gui.set_font_texture_id(FONT_TEXTURE_ID);
        }
        Ok(())
    }

    /// Releases everything in dependency order: pending GPU work, renderer
    /// buffers and textures, secondary windows, then the main window.
    /// The device itself drops last, with the backend.
    pub fn shutdown(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::ShuttingDown;
        info!("shutting down");
        self.device.wait_idle();
        self.renderer.destroy(&mut self.device);
        self.viewports
            .destroy_all(&mut self.device, self.gui.viewports_mut());
        self.state = LoopState::Stopped;
        debug!("all GPU resources released");
    }
}
