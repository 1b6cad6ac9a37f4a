//! The closed key enumeration.
//!
//! Recordings never contain platform-native virtual key codes; capture and
//! inject both go through this dense, stable identifier so that a test file
//! recorded on one platform replays correctly on another.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// A normalized keyboard key identifier.
///
/// The discriminant values are part of the wire format (`InputSnapshot`'s
/// key state array is indexed by `Key as usize`) and must never be
/// reordered; new keys are appended before [`Key::COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum Key {
    A = 0,
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

    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,

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
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,

    LeftShift,
    RightShift,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
    LeftSuper,
    RightSuper,

    Numpad0,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad5,
    Numpad6,
    Numpad7,
    Numpad8,
    Numpad9,
    NumpadAdd,
    NumpadSubtract,
    NumpadMultiply,
    NumpadDivide,
    NumpadDecimal,
    NumpadEnter,
    NumLock,

    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,

    Backtick,
    Minus,
    Equals,
    LeftBracket,
    RightBracket,
    Backslash,
    Semicolon,
    Apostrophe,
    Comma,
    Period,
    Slash,

    Escape,
    Tab,
    CapsLock,
    Backspace,
    Enter,
    Space,
    PrintScreen,
    ScrollLock,
    Pause,

    VolumeUp,
    VolumeDown,
    Mute,
    MediaPlayPause,
    MediaNext,
    MediaPrevious,
    MediaStop,
    BrowserBack,
    BrowserForward,
    BrowserRefresh,
}

impl Key {
    /// The number of entries in the enumeration; also the length of the
    /// per-frame key state array in `InputSnapshot`.
    pub const COUNT: usize = 125;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_dense_and_in_range() {
        for i in 0..Key::COUNT as u16 {
            Key::try_from(i).unwrap_or_else(|_| panic!("missing discriminant {i}"));
        }
        assert!(Key::try_from(Key::COUNT as u16).is_err());
    }

    #[test]
    fn round_trips_through_primitive() {
        let k = Key::Enter;
        let raw: u16 = k.into();
        assert_eq!(Key::try_from(raw).unwrap(), Key::Enter);
    }
}
