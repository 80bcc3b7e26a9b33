use crate::gui::GuiIo;
use crate::utils::Position;
use crate::window::GlobalMouseState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub const ALL: [MouseButton; 3] = [MouseButton::Left, MouseButton::Right, MouseButton::Middle];

    /// Slot in [`GuiIo::mouse_down`].
    pub fn index(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Tab,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Insert,
    Delete,
    Backspace,
    Enter,
    Escape,
    Space,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Minus,
    Equal,
    BracketLeft,
    BracketRight,
    Backslash,
    Semicolon,
    Quote,
    Comma,
    Period,
    Slash,
    Backquote,
    ControlLeft,
    ControlRight,
    ShiftLeft,
    ShiftRight,
    AltLeft,
    AltRight,
    SuperLeft,
    SuperRight,
}

impl Key {
    pub const COUNT: usize = Key::SuperRight as usize + 1;

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub button: MouseButton,
    pub down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub down: bool,
}

/// Input gathered from the main window since the previous frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub mouse_position: Position,
    pub wheel_delta: f32,
    pub mouse_events: Vec<MouseEvent>,
    pub key_events: Vec<KeyEvent>,
    pub key_char_presses: Vec<char>,
    /// Buttons still held at snapshot time, indexed like [`MouseButton::index`].
    pub mouse_held: [bool; 3],
}

impl InputSnapshot {
    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_held[button.index()]
    }

    pub fn was_pressed(&self, button: MouseButton) -> bool {
        self.mouse_events
            .iter()
            .any(|e| e.button == button && e.down)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub control: bool,
    pub shift: bool,
    pub alt: bool,
    pub super_key: bool,
}

/// Feeds an [`InputSnapshot`] into the GUI library's IO.
///
/// Modifier state only follows the left-hand keys and persists across
/// frames until the matching release arrives.
#[derive(Debug, Default)]
pub struct InputTranslator {
    modifiers: Modifiers,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn translate(
        &mut self,
        io: &mut GuiIo,
        snapshot: &InputSnapshot,
        global: Option<GlobalMouseState>,
    ) {
        io.mouse_pos = snapshot.mouse_position;
        io.mouse_wheel = snapshot.wheel_delta;

        // A click that went down and up between two frames still counts.
        for button in MouseButton::ALL {
            io.mouse_down[button.index()] =
                snapshot.was_pressed(button) || snapshot.is_mouse_down(button);
        }

        if io.config_flags.viewports_enable {
            if let Some(global) = global {
                io.mouse_pos = global.position;
                io.mouse_down = global.buttons;
            }
        }

        for c in &snapshot.key_char_presses {
            io.add_input_character(*c);
        }

        for event in &snapshot.key_events {
            if let Some(slot) = io.keys_down.get_mut(event.key.index()) {
                *slot = event.down;
            }
            match event.key {
                Key::ControlLeft => self.modifiers.control = event.down,
                Key::ShiftLeft => self.modifiers.shift = event.down,
                Key::AltLeft => self.modifiers.alt = event.down,
                Key::SuperLeft => self.modifiers.super_key = event.down,
                _ => {}
            }
        }

        io.key_ctrl = self.modifiers.control;
        io.key_shift = self.modifiers.shift;
        io.key_alt = self.modifiers.alt;
        io.key_super = self.modifiers.super_key;
    }
}
