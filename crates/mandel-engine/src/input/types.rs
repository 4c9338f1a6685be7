use std::fmt;

/// Keyboard key identifier.
///
/// Only the keys the viewer binds are named. The runtime maps everything
/// else to `Key::Unknown` with the platform key code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    /// Either shift key.
    Shift,

    // Pan
    W,
    A,
    S,
    D,

    // Zoom / reset / vsync
    Q,
    E,
    R,
    V,

    // Exponent
    BracketLeft,
    BracketRight,

    // Threshold
    Minus,
    Equal,

    F11,
    F12,

    /// Platform-dependent key not represented here.
    Unknown(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Platform-agnostic input events emitted by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        key: Key,
        state: KeyState,
        /// True when event is a key-repeat.
        repeat: bool,
    },

    /// Window focus change.
    Focused(bool),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::BracketLeft => f.write_str("["),
            Key::BracketRight => f.write_str("]"),
            Key::Minus => f.write_str("-"),
            Key::Equal => f.write_str("="),
            Key::Unknown(code) => write!(f, "Unknown({code})"),
            other => write!(f, "{other:?}"),
        }
    }
}
