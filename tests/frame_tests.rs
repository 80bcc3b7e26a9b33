mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{quads, viewports_config, FakeDevice, Harness, Op, PlatformAction, ScriptedGui};
use plutonium_imgui::config::BackendConfig;
use plutonium_imgui::draw_data::{TextureId, FONT_TEXTURE_ID};
use plutonium_imgui::frame::{FrameHooks, LoopState};
use plutonium_imgui::gpu::GraphicsBackend;
use plutonium_imgui::gui::{FontAtlasData, GuiContext, ViewportFlags, ViewportId};
use plutonium_imgui::texture::ScalingMode;
use plutonium_imgui::utils::{ortho_projection, Position, Size};
use plutonium_imgui::window::WindowEvent;

fn spawn(h: &mut Harness, id: u32, x: f32) {
    h.gui().pending.push(PlatformAction::Spawn {
        id: ViewportId(id),
        pos: Position::new(x, 0.0),
        size: Size::new(200.0, 100.0),
        flags: ViewportFlags::default(),
    });
}

fn swapchain_of(ops: &[Op], window_id: u32) -> u32 {
    ops.iter()
        .find_map(|op| match op {
            Op::CreateSwapchain { id, window } if *window == window_id => Some(*id),
            _ => None,
        })
        .unwrap()
}

#[test]
fn one_pass_per_visible_viewport() {
    let mut h = Harness::new(viewports_config());
    spawn(&mut h, 1, 1300.0);
    spawn(&mut h, 2, 1600.0);
    h.frame().unwrap();

    for id in [ViewportId::MAIN, ViewportId(1), ViewportId(2)] {
        h.gui().geometry.insert(id, vec![quads(FONT_TEXTURE_ID, 1)]);
    }
    h.clear_log();
    h.frame().unwrap();

    assert_eq!(h.passes().len(), 3);
    let submits = h
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::Submit(_)))
        .count();
    assert_eq!(submits, 1);
}

#[test]
fn frame_stages_run_in_order() {
    let mut h = Harness::new(BackendConfig::default());
    h.gui()
        .geometry
        .insert(ViewportId::MAIN, vec![quads(FONT_TEXTURE_ID, 1)]);
    h.clear_log();
    h.frame().unwrap();

    let ops = h.ops();
    let at = |wanted: &Op| ops.iter().position(|op| op == wanted).unwrap();
    let new_frame = at(&Op::GuiNewFrame);
    let begin = at(&Op::BeginCommands);
    let render = at(&Op::GuiRender);
    let platform = at(&Op::GuiUpdatePlatformWindows);
    let pass = ops
        .iter()
        .position(|op| matches!(op, Op::Pass { .. }))
        .unwrap();
    let submit = ops
        .iter()
        .position(|op| matches!(op, Op::Submit(_)))
        .unwrap();
    let present = ops
        .iter()
        .position(|op| matches!(op, Op::Present { .. }))
        .unwrap();
    assert!(new_frame < begin);
    assert!(begin < render && render < platform && platform < pass);
    assert!(pass < submit && submit < present);
}

#[test]
fn hooks_run_around_the_gui_stages() {
    let mut h = Harness::new(BackendConfig::default());
    let trace: Rc<RefCell<Vec<(&'static str, usize)>>> = Rc::new(RefCell::new(Vec::new()));
    let record = |name: &'static str| {
        let trace = trace.clone();
        move |gui: &mut ScriptedGui| {
            let ops = gui.log.borrow().len();
            trace.borrow_mut().push((name, ops));
        }
    };

    let early_update = record("early_update");
    let update = record("update");
    let draw_ui = record("draw_ui");
    let early_render = record("early_render");
    let render = record("render");
    h.hooks = FrameHooks::<ScriptedGui, FakeDevice>::new(move |gui, _| draw_ui(gui))
        .with_early_update(move |gui, _| early_update(gui))
        .with_update(move |gui, _, delta| {
            assert!(delta > 0.0);
            update(gui)
        })
        .with_early_render(move |gui, _| early_render(gui))
        .with_render(move |gui, _| render(gui));
    h.clear_log();
    h.frame().unwrap();

    let names: Vec<&str> = trace.borrow().iter().map(|(name, _)| *name).collect();
    assert_eq!(
        names,
        vec!["early_update", "update", "draw_ui", "early_render", "render"]
    );

    let ops = h.ops();
    let new_frame = ops.iter().position(|op| *op == Op::GuiNewFrame).unwrap();
    let gui_render = ops.iter().position(|op| *op == Op::GuiRender).unwrap();
    let seen = trace.borrow().clone();
    // each entry holds the log length when the hook ran
    assert!(seen[0].1 <= new_frame);
    assert!(seen[1].1 > new_frame);
    assert!(seen[3].1 <= gui_render);
    assert!(seen[4].1 > gui_render);
}

#[test]
fn hooks_can_bind_textures_for_the_same_frame() {
    let mut h = Harness::new(BackendConfig::default());
    let bound = Rc::new(Cell::new(None));
    let slot = bound.clone();
    h.hooks = FrameHooks::<ScriptedGui, FakeDevice>::new(|_, _| {}).with_early_update(move |_, textures| {
        if slot.get().is_none() {
            let id = textures
                .bind(&[255; 16], 2, 2, ScalingMode::Point)
                .unwrap();
            slot.set(Some(id));
        }
    });
    h.gui()
        .geometry
        .insert(ViewportId::MAIN, vec![quads(TextureId(101), 1)]);
    h.frame().unwrap();

    assert_eq!(bound.get(), Some(TextureId(101)));
    assert_eq!(h.passes().len(), 1);
}

#[test]
fn drawing_with_an_unbound_texture_fails_the_frame() {
    let mut h = Harness::new(BackendConfig::default());
    h.gui()
        .geometry
        .insert(ViewportId::MAIN, vec![quads(TextureId(999), 1)]);
    assert!(h.frame().is_err());
}

#[test]
fn main_window_resize_reaches_swapchain_io_and_pass() {
    let mut h = Harness::new(BackendConfig::default());
    h.gui()
        .geometry
        .insert(ViewportId::MAIN, vec![quads(FONT_TEXTURE_ID, 1)]);
    h.frame().unwrap();
    assert_eq!(h.gui().frames.last().unwrap().display_size, Size::new(1280.0, 720.0));

    let resized = Size::new(1920.0, 1080.0);
    {
        let mut main = h.main_window.borrow_mut();
        main.size = resized;
        main.events.push_back(WindowEvent::Resized(resized));
    }
    h.clear_log();
    h.frame().unwrap();

    assert!(h.ops().iter().any(|op| matches!(
        op,
        Op::ResizeSwapchain {
            width: 1920,
            height: 1080,
            ..
        }
    )));
    assert_eq!(h.gui().frames.last().unwrap().display_size, resized);
    assert_eq!(h.gui().viewports()[0].size, resized);
    assert!(matches!(
        h.passes().as_slice(),
        [Op::Pass {
            width: 1920,
            height: 1080,
            clear: false,
            ..
        }]
    ));
}

#[test]
fn platform_resize_of_the_main_viewport_sets_the_projection() {
    let mut h = Harness::new(viewports_config());
    h.gui()
        .geometry
        .insert(ViewportId::MAIN, vec![quads(FONT_TEXTURE_ID, 1)]);
    let resized = Size::new(1920.0, 1080.0);
    h.gui()
        .pending
        .push(PlatformAction::Resize(ViewportId::MAIN, resized));
    h.frame().unwrap();
    assert_eq!(h.main_window.borrow().size, resized);

    h.clear_log();
    h.frame().unwrap();

    let pos = h.main_window.borrow().pos;
    let expected = ortho_projection(pos, resized);
    match h.passes().as_slice() {
        [Op::Pass {
            width,
            height,
            projection,
            ..
        }] => {
            assert_eq!((*width, *height), (1920, 1080));
            assert_eq!(*projection, expected);
        }
        other => panic!("expected one main pass, got {other:?}"),
    }
    assert_eq!(h.gui().frames.last().unwrap().display_size, resized);
}

#[test]
fn minimized_main_window_skips_drawing() {
    let mut h = Harness::new(BackendConfig::default());
    h.gui()
        .geometry
        .insert(ViewportId::MAIN, vec![quads(FONT_TEXTURE_ID, 1)]);
    {
        let mut main = h.main_window.borrow_mut();
        main.size = Size::new(0.0, 0.0);
        main.events.push_back(WindowEvent::Resized(Size::new(0.0, 0.0)));
    }
    h.clear_log();
    assert!(h.frame().unwrap());

    let ops = h.ops();
    assert!(h.passes().is_empty());
    assert!(!ops.iter().any(|op| matches!(op, Op::Clear { .. } | Op::Present { .. })));
    assert!(ops.iter().any(|op| matches!(op, Op::Submit(_))));
}

#[test]
fn closing_the_main_window_ends_the_loop() {
    let mut h = Harness::new(BackendConfig::default());
    assert!(h.frame().unwrap());
    h.main_window
        .borrow_mut()
        .events
        .push_back(WindowEvent::CloseRequested);
    h.clear_log();
    assert!(!h.frame().unwrap());
    assert!(!h.ops().contains(&Op::GuiNewFrame));
}

#[test]
fn shutdown_releases_in_dependency_order() {
    let mut h = Harness::new(viewports_config());
    spawn(&mut h, 5, 1500.0);
    h.frame().unwrap();
    let main_swapchain = swapchain_of(&h.ops(), 1);
    let tool_swapchain = swapchain_of(&h.ops(), 2);
    h.clear_log();

    h.backend.shutdown();
    assert_eq!(h.backend.state(), LoopState::Stopped);

    let ops = h.ops();
    let at = |wanted: Op| ops.iter().position(|op| *op == wanted).unwrap();
    let last_resource = ops
        .iter()
        .rposition(|op| {
            matches!(
                op,
                Op::DestroyBuffer { .. } | Op::DestroyTexture { .. } | Op::DestroyBindGroup { .. }
            )
        })
        .unwrap();
    assert_eq!(ops[0], Op::WaitIdle);
    assert!(last_resource < at(Op::DestroySwapchain { id: tool_swapchain }));
    assert!(at(Op::DestroySwapchain { id: tool_swapchain }) < at(Op::CloseWindow { window: 2 }));
    assert!(at(Op::CloseWindow { window: 2 }) < at(Op::DestroySwapchain { id: main_swapchain }));
    assert!(at(Op::DestroySwapchain { id: main_swapchain }) < at(Op::CloseWindow { window: 1 }));
    assert_eq!(h.windows.live_windows(), 0);
    assert!(h.backend.gui().viewports().iter().all(|v| v.platform_user_data.is_none()));
}

#[test]
fn shutdown_is_idempotent_and_stops_frames() {
    let mut h = Harness::new(BackendConfig::default());
    h.frame().unwrap();
    h.backend.shutdown();
    h.clear_log();

    h.backend.shutdown();
    assert!(h.ops().is_empty());
    assert!(!h.frame().unwrap());
    assert!(h.ops().is_empty());
}

#[test]
fn viewports_default_to_vulkan_only() {
    let vulkan = Harness::with_backend(BackendConfig::default(), GraphicsBackend::Vulkan);
    assert!(vulkan.backend.viewports_enabled());
    assert!(vulkan.backend.gui().io().config_flags.viewports_enable);

    let gl = Harness::with_backend(BackendConfig::default(), GraphicsBackend::OpenGl);
    assert!(!gl.backend.viewports_enabled());
    assert!(!gl.backend.gui().io().backend_flags.platform_has_viewports);

    let forced = Harness::with_backend(viewports_config(), GraphicsBackend::Metal);
    assert!(forced.backend.viewports_enabled());

    let mut off = BackendConfig::default();
    off.renderer.viewports = Some(false);
    let off = Harness::with_backend(off, GraphicsBackend::Vulkan);
    assert!(!off.backend.viewports_enabled());
}

#[test]
fn io_advertises_backend_capabilities() {
    let h = Harness::with_backend(BackendConfig::default(), GraphicsBackend::Direct3D12);
    let io = h.backend.gui().io();
    assert!(io.config_flags.docking_enable);
    assert!(io.backend_flags.renderer_has_vtx_offset);
    assert!(io.backend_flags.has_mouse_cursors);
    assert!(io
        .backend_renderer_name
        .as_deref()
        .is_some_and(|name| name.ends_with(GraphicsBackend::Direct3D12.name())));
}

#[test]
fn font_atlas_is_uploaded_at_startup_and_on_request() {
    let mut h = Harness::new(BackendConfig::default());
    assert_eq!(h.backend.gui().font_texture, Some(FONT_TEXTURE_ID));
    assert!(h.backend.renderer().textures().has_font());

    h.gui().font_atlas = Some(FontAtlasData {
        width: 64,
        height: 64,
        pixels: vec![255; 64 * 64 * 4],
    });
    h.clear_log();
    h.frame().unwrap();

    let ops = h.ops();
    assert!(ops.iter().any(|op| matches!(
        op,
        Op::CreateTexture {
            width: 64,
            height: 64,
            ..
        }
    )));
    assert_eq!(
        ops.iter()
            .filter(|op| matches!(op, Op::DestroyTexture { .. }))
            .count(),
        1
    );
    let upload = ops
        .iter()
        .position(|op| matches!(op, Op::CreateTexture { .. }))
        .unwrap();
    let new_frame = ops.iter().position(|op| *op == Op::GuiNewFrame).unwrap();
    assert!(upload < new_frame);
}

#[test]
fn monitors_are_published_every_frame() {
    let mut h = Harness::new(BackendConfig::default());
    h.frame().unwrap();
    assert_eq!(h.gui().monitors.len(), 1);
    assert_eq!(h.gui().monitors[0].work_size, Size::new(2560.0, 1440.0));
}
