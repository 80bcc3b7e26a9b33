//! Recording fakes for the device, window and GUI seams.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use plutonium_imgui::config::BackendConfig;
use plutonium_imgui::draw_data::{DrawCmd, DrawData, DrawList, DrawVert, TextureId};
use plutonium_imgui::error::{BackendError, Result};
use plutonium_imgui::frame::{Backend, FrameHooks};
use plutonium_imgui::gpu::{BufferKind, GraphicsBackend, PassResources, RenderDevice, TextureDesc};
use plutonium_imgui::gui::{
    FontAtlasData, GuiContext, GuiIo, PlatformCallbacks, PlatformMonitor, Viewport,
    ViewportFlags, ViewportId,
};
use plutonium_imgui::input::InputSnapshot;
use plutonium_imgui::render_plan::{DrawOp, PassPlan};
use plutonium_imgui::texture::{MipChain, ScalingMode};
use plutonium_imgui::utils::{Position, Size};
use plutonium_imgui::window::{
    GlobalMouseState, NativeWindow, WindowDesc, WindowEvent, WindowSystem,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateBuffer { id: u32, kind: BufferKind, size: u64 },
    WriteBuffer { id: u32, len: usize },
    DestroyBuffer { id: u32 },
    CreateTexture { id: u32, width: u32, height: u32, mips: u32 },
    WriteTexture { id: u32, levels: usize },
    DestroyTexture { id: u32 },
    CreateBindGroup { id: u32, texture: Option<u32>, scaling: Option<ScalingMode> },
    DestroyBindGroup { id: u32 },
    CreateSwapchain { id: u32, window: u32 },
    ResizeSwapchain { id: u32, width: u32, height: u32 },
    DestroySwapchain { id: u32 },
    BeginCommands,
    Clear { swapchain: u32 },
    Pass {
        swapchain: u32,
        width: u32,
        height: u32,
        clear: bool,
        projection: [[f32; 4]; 4],
        ops: Vec<DrawOp>,
    },
    Submit(u64),
    Present { swapchain: u32 },
    WaitIdle,
    CreateWindow { window: u32, desc: WindowDesc },
    ShowWindow { window: u32 },
    SetWindowTitle { window: u32, title: String },
    CloseWindow { window: u32 },
    GuiNewFrame,
    GuiRender,
    GuiUpdatePlatformWindows,
}

pub type Log = Rc<RefCell<Vec<Op>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

// ---------------------------------------------------------------- device

#[derive(Debug)]
pub struct FakeBuffer {
    pub id: u32,
    pub kind: BufferKind,
    pub size: u64,
}

#[derive(Debug)]
pub struct FakeTexture {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct FakeBindGroup {
    pub id: u32,
}

#[derive(Debug)]
pub struct FakeSwapchain {
    pub id: u32,
    pub window: u32,
    pub size: Size,
    pub acquired: bool,
}

pub struct FakeDevice {
    pub log: Log,
    pub backend: GraphicsBackend,
    next_id: u32,
    submitted: u64,
    /// Shared so tests can retire GPU work after the device moved into a backend.
    pub completed: Rc<Cell<u64>>,
    pub max_buffer_size: u64,
}

impl FakeDevice {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            backend: GraphicsBackend::Vulkan,
            next_id: 1,
            submitted: 0,
            completed: Rc::new(Cell::new(0)),
            max_buffer_size: u64::MAX,
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&self, op: Op) {
        self.log.borrow_mut().push(op);
    }
}

impl RenderDevice for FakeDevice {
    type Window = FakeWindow;
    type Buffer = FakeBuffer;
    type Texture = FakeTexture;
    type BindGroup = FakeBindGroup;
    type Swapchain = FakeSwapchain;

    fn backend(&self) -> GraphicsBackend {
        self.backend
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<FakeBuffer> {
        if size > self.max_buffer_size {
            return Err(BackendError::Allocation {
                label: kind.label(),
                size,
            });
        }
        let id = self.next();
        self.record(Op::CreateBuffer { id, kind, size });
        Ok(FakeBuffer { id, kind, size })
    }

    fn write_buffer(&mut self, buffer: &FakeBuffer, offset: u64, data: &[u8]) {
        assert_eq!(data.len() % 4, 0, "unaligned write to buffer {}", buffer.id);
        assert!(
            offset + data.len() as u64 <= buffer.size,
            "write of {} bytes overflows buffer {} ({} bytes)",
            data.len(),
            buffer.id,
            buffer.size
        );
        self.record(Op::WriteBuffer {
            id: buffer.id,
            len: data.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: FakeBuffer) {
        self.record(Op::DestroyBuffer { id: buffer.id });
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<FakeTexture> {
        let id = self.next();
        self.record(Op::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
            mips: desc.mip_levels,
        });
        Ok(FakeTexture {
            id,
            width: desc.width,
            height: desc.height,
        })
    }

    fn write_texture(&mut self, texture: &FakeTexture, mips: &MipChain) {
        self.record(Op::WriteTexture {
            id: texture.id,
            levels: mips.levels.len(),
        });
    }

    fn destroy_texture(&mut self, texture: FakeTexture) {
        self.record(Op::DestroyTexture { id: texture.id });
    }

    fn create_texture_bind_group(
        &mut self,
        texture: &FakeTexture,
        scaling: ScalingMode,
    ) -> FakeBindGroup {
        let id = self.next();
        self.record(Op::CreateBindGroup {
            id,
            texture: Some(texture.id),
            scaling: Some(scaling),
        });
        FakeBindGroup { id }
    }

    fn create_projection_bind_group(&mut self, _uniform: &FakeBuffer) -> FakeBindGroup {
        let id = self.next();
        self.record(Op::CreateBindGroup {
            id,
            texture: None,
            scaling: None,
        });
        FakeBindGroup { id }
    }

    fn destroy_bind_group(&mut self, bind_group: FakeBindGroup) {
        self.record(Op::DestroyBindGroup { id: bind_group.id });
    }

    fn create_swapchain(&mut self, window: &FakeWindow) -> Result<FakeSwapchain> {
        let id = self.next();
        self.record(Op::CreateSwapchain {
            id,
            window: window.id,
        });
        Ok(FakeSwapchain {
            id,
            window: window.id,
            size: window.size(),
            acquired: false,
        })
    }

    fn resize_swapchain(&mut self, swapchain: &mut FakeSwapchain, size: Size) {
        swapchain.size = size;
        self.record(Op::ResizeSwapchain {
            id: swapchain.id,
            width: size.width as u32,
            height: size.height as u32,
        });
    }

    fn swapchain_size(&self, swapchain: &FakeSwapchain) -> Size {
        swapchain.size
    }

    fn destroy_swapchain(&mut self, swapchain: FakeSwapchain) {
        self.record(Op::DestroySwapchain { id: swapchain.id });
    }

    fn begin_commands(&mut self) {
        self.record(Op::BeginCommands);
    }

    fn acquire(&mut self, swapchain: &mut FakeSwapchain) -> Result<bool> {
        if swapchain.size.is_empty() {
            return Ok(false);
        }
        swapchain.acquired = true;
        Ok(true)
    }

    fn clear(&mut self, swapchain: &FakeSwapchain, _color: [f32; 4]) {
        self.record(Op::Clear {
            swapchain: swapchain.id,
        });
    }

    fn draw_pass(
        &mut self,
        swapchain: &FakeSwapchain,
        pass: &PassPlan,
        resources: &PassResources<'_, Self>,
    ) -> Result<()> {
        assert!(swapchain.acquired, "drawing into an unacquired swapchain");
        for op in &pass.ops {
            if let DrawOp::SetTexture(id) = op {
                resources.textures.resource_set(*id)?;
            }
        }
        self.record(Op::Pass {
            swapchain: swapchain.id,
            width: swapchain.size.width as u32,
            height: swapchain.size.height as u32,
            clear: pass.clear.is_some(),
            projection: pass.projection,
            ops: pass.ops.clone(),
        });
        Ok(())
    }

    fn submit(&mut self) -> u64 {
        self.submitted += 1;
        self.record(Op::Submit(self.submitted));
        self.submitted
    }

    fn present(&mut self, swapchain: &mut FakeSwapchain) {
        if swapchain.acquired {
            swapchain.acquired = false;
            self.record(Op::Present {
                swapchain: swapchain.id,
            });
        }
    }

    fn last_submission(&self) -> u64 {
        self.submitted
    }

    fn completed_submission(&self) -> u64 {
        self.completed.get()
    }

    fn wait_idle(&mut self) {
        self.completed.set(self.submitted);
        self.record(Op::WaitIdle);
    }
}

// ---------------------------------------------------------------- windows

#[derive(Debug, Default)]
pub struct WindowShared {
    pub pos: Position,
    pub size: Size,
    pub title: String,
    pub visible: bool,
    pub focused: bool,
    pub minimized: bool,
    pub closed: bool,
    pub close_requested: bool,
    pub events: VecDeque<WindowEvent>,
}

pub type WindowHandle = Rc<RefCell<WindowShared>>;

pub struct FakeWindow {
    pub id: u32,
    pub state: WindowHandle,
    log: Log,
}

impl NativeWindow for FakeWindow {
    fn position(&self) -> Position {
        self.state.borrow().pos
    }

    fn size(&self) -> Size {
        self.state.borrow().size
    }

    fn set_position(&mut self, position: Position) {
        let mut state = self.state.borrow_mut();
        state.pos = position;
        state.events.push_back(WindowEvent::Moved(position));
    }

    fn set_size(&mut self, size: Size) {
        let mut state = self.state.borrow_mut();
        state.size = size;
        state.events.push_back(WindowEvent::Resized(size));
    }

    fn set_title(&mut self, title: &str) {
        self.state.borrow_mut().title = title.to_string();
        self.log.borrow_mut().push(Op::SetWindowTitle {
            window: self.id,
            title: title.to_string(),
        });
    }

    fn show(&mut self) {
        self.state.borrow_mut().visible = true;
        self.log.borrow_mut().push(Op::ShowWindow { window: self.id });
    }

    fn focus(&mut self) {
        self.state.borrow_mut().focused = true;
    }

    fn is_focused(&self) -> bool {
        self.state.borrow().focused
    }

    fn is_minimized(&self) -> bool {
        self.state.borrow().minimized
    }

    fn exists(&self) -> bool {
        let state = self.state.borrow();
        !state.closed && !state.close_requested
    }

    fn pump_events(&mut self) -> Vec<WindowEvent> {
        let mut state = self.state.borrow_mut();
        let events: Vec<_> = state.events.drain(..).collect();
        if events.contains(&WindowEvent::CloseRequested) {
            state.close_requested = true;
        }
        events
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed = true;
        self.log.borrow_mut().push(Op::CloseWindow { window: self.id });
    }
}

pub struct FakeWindowSystem {
    log: Log,
    next_id: u32,
    pub windows: Rc<RefCell<Vec<(u32, WindowHandle)>>>,
    pub global_mouse: Option<GlobalMouseState>,
    pub monitors: Vec<PlatformMonitor>,
    pub fail_creation: bool,
}

impl FakeWindowSystem {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            next_id: 1,
            windows: Rc::new(RefCell::new(Vec::new())),
            global_mouse: None,
            monitors: vec![PlatformMonitor {
                main_pos: Position::new(0.0, 0.0),
                main_size: Size::new(2560.0, 1440.0),
                work_pos: Position::new(0.0, 0.0),
                work_size: Size::new(2560.0, 1440.0),
                dpi_scale: 1.0,
            }],
            fail_creation: false,
        }
    }

    pub fn window(&self, id: u32) -> Option<WindowHandle> {
        self.windows
            .borrow()
            .iter()
            .find(|(wid, _)| *wid == id)
            .map(|(_, handle)| handle.clone())
    }

    pub fn live_windows(&self) -> usize {
        self.windows
            .borrow()
            .iter()
            .filter(|(_, handle)| !handle.borrow().closed)
            .count()
    }
}

impl WindowSystem for FakeWindowSystem {
    type Window = FakeWindow;

    fn create_window(&mut self, desc: &WindowDesc) -> Result<FakeWindow> {
        if self.fail_creation {
            return Err(BackendError::WindowCreation("refused by test".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        let state = Rc::new(RefCell::new(WindowShared {
            pos: desc.position,
            size: desc.size,
            title: desc.title.clone(),
            visible: desc.visible,
            ..Default::default()
        }));
        self.windows.borrow_mut().push((id, state.clone()));
        self.log.borrow_mut().push(Op::CreateWindow {
            window: id,
            desc: desc.clone(),
        });
        Ok(FakeWindow {
            id,
            state,
            log: self.log.clone(),
        })
    }

    fn global_mouse_state(&self) -> Option<GlobalMouseState> {
        self.global_mouse
    }

    fn monitors(&self) -> Vec<PlatformMonitor> {
        self.monitors.clone()
    }
}

// ---------------------------------------------------------------- gui

#[derive(Debug, Clone)]
pub enum PlatformAction {
    Spawn {
        id: ViewportId,
        pos: Position,
        size: Size,
        flags: ViewportFlags,
    },
    Close(ViewportId),
    Resize(ViewportId, Size),
    Title(ViewportId, String),
}

/// GUI library stand-in that replays scripted geometry and platform actions.
pub struct ScriptedGui {
    pub io: GuiIo,
    pub viewports: Vec<Viewport>,
    pub log: Log,
    pub font_atlas: Option<FontAtlasData>,
    pub font_texture: Option<TextureId>,
    pub monitors: Vec<PlatformMonitor>,
    pub geometry: HashMap<ViewportId, Vec<DrawList>>,
    pub pending: Vec<PlatformAction>,
    /// IO as seen by each `new_frame`.
    pub frames: Vec<GuiIo>,
    pub callback_errors: Vec<String>,
}

impl ScriptedGui {
    pub fn new(log: Log) -> Self {
        Self {
            io: GuiIo::default(),
            viewports: vec![Viewport::new(
                ViewportId::MAIN,
                Position::default(),
                Size::default(),
            )],
            log,
            font_atlas: Some(FontAtlasData {
                width: 16,
                height: 16,
                pixels: vec![255; 16 * 16 * 4],
            }),
            font_texture: None,
            monitors: Vec::new(),
            geometry: HashMap::new(),
            pending: Vec::new(),
            frames: Vec::new(),
            callback_errors: Vec::new(),
        }
    }

    pub fn viewport(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.iter().find(|v| v.id == id)
    }

    fn position_of(&self, id: ViewportId) -> Option<usize> {
        self.viewports.iter().position(|v| v.id == id)
    }

    fn run_action(
        &mut self,
        action: PlatformAction,
        platform: &mut dyn PlatformCallbacks,
    ) -> Result<()> {
        match action {
            PlatformAction::Spawn {
                id,
                pos,
                size,
                flags,
            } => {
                let mut viewport = Viewport::new(id, pos, size);
                viewport.flags = flags;
                platform.create_window(&mut viewport)?;
                platform.set_window_pos(&mut viewport, pos)?;
                platform.set_window_size(&mut viewport, size)?;
                platform.show_window(&mut viewport)?;
                self.viewports.push(viewport);
            }
            PlatformAction::Close(id) => {
                if let Some(index) = self.position_of(id) {
                    let mut viewport = self.viewports.remove(index);
                    platform.destroy_window(&mut viewport);
                }
            }
            PlatformAction::Resize(id, size) => {
                if let Some(index) = self.position_of(id) {
                    let viewport = &mut self.viewports[index];
                    platform.set_window_size(viewport, size)?;
                    viewport.size = size;
                }
            }
            PlatformAction::Title(id, title) => {
                if let Some(index) = self.position_of(id) {
                    platform.set_window_title(&mut self.viewports[index], &title)?;
                }
            }
        }
        Ok(())
    }
}

impl GuiContext for ScriptedGui {
    fn io(&self) -> &GuiIo {
        &self.io
    }

    fn io_mut(&mut self) -> &mut GuiIo {
        &mut self.io
    }

    fn new_frame(&mut self) {
        self.log.borrow_mut().push(Op::GuiNewFrame);
        self.frames.push(self.io.clone());
        self.io.input_queue_characters.clear();
    }

    fn render(&mut self) {
        self.log.borrow_mut().push(Op::GuiRender);
        for viewport in &mut self.viewports {
            viewport.draw_data = Some(DrawData {
                display_pos: viewport.pos,
                display_size: viewport.size,
                framebuffer_scale: [1.0, 1.0],
                draw_lists: self.geometry.get(&viewport.id).cloned().unwrap_or_default(),
            });
        }
    }

    fn viewports(&self) -> &[Viewport] {
        &self.viewports
    }

    fn viewports_mut(&mut self) -> &mut [Viewport] {
        &mut self.viewports
    }

    fn update_platform_windows(&mut self, platform: &mut dyn PlatformCallbacks) -> Result<()> {
        self.log.borrow_mut().push(Op::GuiUpdatePlatformWindows);

        // the library closes viewports whose window asked to close
        let closing: Vec<ViewportId> = self
            .viewports
            .iter()
            .skip(1)
            .filter(|v| v.platform_request_close)
            .map(|v| v.id)
            .collect();
        for id in closing {
            self.run_action(PlatformAction::Close(id), platform)?;
        }

        for action in std::mem::take(&mut self.pending) {
            self.run_action(action, platform)?;
        }

        for viewport in self.viewports.iter_mut().skip(1) {
            if viewport.platform_request_resize {
                match platform.get_window_size(viewport) {
                    Ok(size) => viewport.size = size,
                    Err(e) => self.callback_errors.push(e.to_string()),
                }
            }
            if viewport.platform_request_move {
                match platform.get_window_pos(viewport) {
                    Ok(pos) => viewport.pos = pos,
                    Err(e) => self.callback_errors.push(e.to_string()),
                }
            }
            viewport.platform_request_resize = false;
            viewport.platform_request_move = false;
            viewport.platform_request_close = false;
        }
        Ok(())
    }

    fn take_font_atlas(&mut self) -> Option<FontAtlasData> {
        self.font_atlas.take()
    }

    fn set_font_texture_id(&mut self, id: TextureId) {
        self.font_texture = Some(id);
    }

    fn set_monitors(&mut self, monitors: Vec<PlatformMonitor>) {
        self.monitors = monitors;
    }
}

// ---------------------------------------------------------------- geometry

/// One textured quad covering `rect` (x, y, w, h), clipped to `clip`.
pub fn quad(texture: TextureId, rect: [f32; 4], clip: [f32; 4]) -> DrawList {
    let [x, y, w, h] = rect;
    let white = [255, 255, 255, 255];
    DrawList {
        vtx_buffer: vec![
            DrawVert::new([x, y], [0.0, 0.0], white),
            DrawVert::new([x + w, y], [1.0, 0.0], white),
            DrawVert::new([x + w, y + h], [1.0, 1.0], white),
            DrawVert::new([x, y + h], [0.0, 1.0], white),
        ],
        idx_buffer: vec![0, 1, 2, 0, 2, 3],
        commands: vec![DrawCmd {
            clip_rect: clip,
            texture_id: texture,
            vtx_offset: 0,
            idx_offset: 0,
            elem_count: 6,
            user_callback: None,
        }],
    }
}

/// `count` quads in one list, all sampling `texture`.
pub fn quads(texture: TextureId, count: usize) -> DrawList {
    let mut list = DrawList::default();
    for i in 0..count {
        let base = list.vtx_buffer.len() as u16;
        let q = quad(texture, [i as f32, 0.0, 1.0, 1.0], [0.0, 0.0, 4096.0, 4096.0]);
        list.vtx_buffer.extend(q.vtx_buffer);
        list.idx_buffer
            .extend(q.idx_buffer.iter().map(|idx| idx + base));
    }
    list.commands.push(DrawCmd {
        clip_rect: [0.0, 0.0, 4096.0, 4096.0],
        texture_id: texture,
        vtx_offset: 0,
        idx_offset: 0,
        elem_count: list.idx_buffer.len() as u32,
        user_callback: None,
    });
    list
}

// ---------------------------------------------------------------- harness

pub struct Harness {
    pub backend: Backend<ScriptedGui, FakeDevice>,
    pub windows: FakeWindowSystem,
    pub hooks: FrameHooks<ScriptedGui, FakeDevice>,
    pub log: Log,
    pub completed: Rc<Cell<u64>>,
    pub main_window: WindowHandle,
}

impl Harness {
    pub fn new(config: BackendConfig) -> Self {
        Self::with_backend(config, GraphicsBackend::Vulkan)
    }

    pub fn with_backend(config: BackendConfig, backend: GraphicsBackend) -> Self {
        Self::try_with_backend(config, backend).expect("backend starts")
    }

    pub fn try_with_backend(config: BackendConfig, backend: GraphicsBackend) -> Result<Self> {
        let log = new_log();
        let mut windows = FakeWindowSystem::new(log.clone());
        let mut device = FakeDevice::new(log.clone());
        device.backend = backend;
        let completed = device.completed.clone();

        let main = windows.create_window(&WindowDesc::main(&config.window))?;
        let main_window = main.state.clone();
        let swapchain = device.create_swapchain(&main)?;
        let gui = ScriptedGui::new(log.clone());
        let backend = Backend::new(gui, device, main, swapchain, &config)?;
        Ok(Self {
            backend,
            windows,
            hooks: FrameHooks::new(|_, _| {}),
            log,
            completed,
            main_window,
        })
    }

    pub fn frame(&mut self) -> Result<bool> {
        self.frame_with(&InputSnapshot::default())
    }

    pub fn frame_with(&mut self, snapshot: &InputSnapshot) -> Result<bool> {
        self.backend
            .frame(&mut self.windows, snapshot, 1.0 / 60.0, &mut self.hooks)
    }

    pub fn gui(&mut self) -> &mut ScriptedGui {
        self.backend.gui_mut()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn passes(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, Op::Pass { .. }))
            .collect()
    }

    /// Lets the fake GPU finish everything submitted so far.
    pub fn complete_gpu_work(&self) {
        let submitted = self.backend.device().last_submission();
        self.completed.set(submitted);
    }
}

pub fn viewports_config() -> BackendConfig {
    let mut config = BackendConfig::default();
    config.renderer.viewports = Some(true);
    config
}
