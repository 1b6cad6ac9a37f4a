//! `InputSnapshot`: the per-frame captured/injected input state.
//!
//! Fixed width, like `ReplayHeaderRaw` in the teacher crate this was grown
//! from: capture and inject both read and write the same byte layout, so
//! there is no instruction-list framing here, just a flat buffer.

use crate::key::Key;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// Up to four gamepads may be captured alongside keyboard/mouse state.
pub const MAX_GAMEPADS: usize = 4;

/// `LEFT` mouse button bit.
pub const MOUSE_BUTTON_LEFT: u8 = 0x01;
/// `RIGHT` mouse button bit.
pub const MOUSE_BUTTON_RIGHT: u8 = 0x02;
/// `MIDDLE` mouse button bit.
pub const MOUSE_BUTTON_MIDDLE: u8 = 0x04;
/// `X1` mouse button bit.
pub const MOUSE_BUTTON_X1: u8 = 0x08;
/// `X2` mouse button bit.
pub const MOUSE_BUTTON_X2: u8 = 0x10;

/// Per-key capture state: whether the key is currently pressed, and how
/// many synthetic auto-repeat key-downs accumulated since the last capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    /// Key is currently held down.
    pub pressed: bool,
    /// Auto-repeat key-down events accumulated since the last capture.
    pub repeat_count: u8,
}

/// One gamepad's captured state.
///
/// `connected == false` means the remaining fields are meaningless and must
/// be ignored (and are written zeroed so the record stays fixed-width
/// whether or not any gamepad is actually plugged in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadSlot {
    /// Whether a gamepad is plugged into this slot.
    pub connected: bool,
    /// Button bitmask, platform-agnostic ordering.
    pub buttons: u16,
    /// Left analog trigger, 0..=255.
    pub trigger_left: u8,
    /// Right analog trigger, 0..=255.
    pub trigger_right: u8,
    /// Left stick X axis.
    pub axis_lx: i16,
    /// Left stick Y axis.
    pub axis_ly: i16,
    /// Right stick X axis.
    pub axis_rx: i16,
    /// Right stick Y axis.
    pub axis_ry: i16,
}

const GAMEPAD_SLOT_BYTES: usize = 1 + 2 + 1 + 1 + 2 + 2 + 2 + 2;

impl GamepadSlot {
    fn write_bytes(&self, into: &mut Vec<u8>) {
        into.push(self.connected as u8);
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, self.buttons);
        into.extend_from_slice(&buf);
        into.push(self.trigger_left);
        into.push(self.trigger_right);
        for axis in [self.axis_lx, self.axis_ly, self.axis_rx, self.axis_ry] {
            let mut buf = [0u8; 2];
            LittleEndian::write_i16(&mut buf, axis);
            into.extend_from_slice(&buf);
        }
    }

    fn read_bytes(bytes: &[u8]) -> GamepadSlot {
        debug_assert_eq!(bytes.len(), GAMEPAD_SLOT_BYTES);
        GamepadSlot {
            connected: bytes[0] != 0,
            buttons: LittleEndian::read_u16(&bytes[1..3]),
            trigger_left: bytes[3],
            trigger_right: bytes[4],
            axis_lx: LittleEndian::read_i16(&bytes[5..7]),
            axis_ly: LittleEndian::read_i16(&bytes[7..9]),
            axis_rx: LittleEndian::read_i16(&bytes[9..11]),
            axis_ry: LittleEndian::read_i16(&bytes[11..13]),
        }
    }
}

/// A single frame's worth of captured (or to-be-injected) input.
///
/// Wheel deltas are fixed-point, `value_over_256`, the same convention the
/// upstream `Speed` type uses for its multiplier; this avoids putting
/// floats that aren't `timestamp_seconds` into the wire format (see
/// SPEC_FULL.md's Open Question on wheel delta representation).
#[derive(Debug, Clone, PartialEq)]
pub struct InputSnapshot {
    /// Per-key state, indexed by `Key as usize`.
    pub keys: [KeyState; Key::COUNT],
    /// Absolute mouse X, screen pixels.
    pub mouse_x: i32,
    /// Absolute mouse Y, screen pixels.
    pub mouse_y: i32,
    /// Accumulated horizontal wheel delta since the last capture, ×256.
    pub wheel_x_over_256: i32,
    /// Accumulated vertical wheel delta since the last capture, ×256.
    pub wheel_y_over_256: i32,
    /// Mouse button bitmask (`MOUSE_BUTTON_*`).
    pub mouse_buttons: u8,
    /// Up to `MAX_GAMEPADS` gamepad slots; disconnected slots are zeroed.
    pub gamepads: [GamepadSlot; MAX_GAMEPADS],
}

/// Byte width of an encoded `InputSnapshot`: fixed regardless of how many
/// gamepads are actually connected.
pub const INPUT_SNAPSHOT_BYTES: usize =
    Key::COUNT * 2 + 4 * 4 + 1 + MAX_GAMEPADS * GAMEPAD_SLOT_BYTES;

impl Default for InputSnapshot {
    fn default() -> Self {
        InputSnapshot {
            keys: [KeyState::default(); Key::COUNT],
            mouse_x: 0,
            mouse_y: 0,
            wheel_x_over_256: 0,
            wheel_y_over_256: 0,
            mouse_buttons: 0,
            gamepads: [GamepadSlot::default(); MAX_GAMEPADS],
        }
    }
}

impl InputSnapshot {
    /// Encode this snapshot into its fixed-width wire representation.
    pub fn write_bytes(&self, into: &mut Vec<u8>) {
        into.reserve(INPUT_SNAPSHOT_BYTES);
        for key in &self.keys {
            into.push(key.pressed as u8);
            into.push(key.repeat_count);
        }
        for value in [
            self.mouse_x,
            self.mouse_y,
            self.wheel_x_over_256,
            self.wheel_y_over_256,
        ] {
            let mut buf = [0u8; 4];
            LittleEndian::write_i32(&mut buf, value);
            into.extend_from_slice(&buf);
        }
        into.push(self.mouse_buttons);
        for slot in &self.gamepads {
            slot.write_bytes(into);
        }
    }

    /// Decode a fixed-width `InputSnapshot` from the front of `bytes`,
    /// advancing it past the consumed bytes.
    ///
    /// Returns `None` if fewer than [`INPUT_SNAPSHOT_BYTES`] remain.
    pub fn read_bytes(bytes: &mut &[u8]) -> Option<InputSnapshot> {
        if bytes.len() < INPUT_SNAPSHOT_BYTES {
            return None;
        }
        let (body, rest) = bytes.split_at(INPUT_SNAPSHOT_BYTES);
        let mut offset = 0usize;

        let mut keys = [KeyState::default(); Key::COUNT];
        for key in &mut keys {
            key.pressed = body[offset] != 0;
            key.repeat_count = body[offset + 1];
            offset += 2;
        }

        let mouse_x = LittleEndian::read_i32(&body[offset..offset + 4]);
        offset += 4;
        let mouse_y = LittleEndian::read_i32(&body[offset..offset + 4]);
        offset += 4;
        let wheel_x_over_256 = LittleEndian::read_i32(&body[offset..offset + 4]);
        offset += 4;
        let wheel_y_over_256 = LittleEndian::read_i32(&body[offset..offset + 4]);
        offset += 4;

        let mouse_buttons = body[offset];
        offset += 1;

        let mut gamepads = [GamepadSlot::default(); MAX_GAMEPADS];
        for slot in &mut gamepads {
            *slot = GamepadSlot::read_bytes(&body[offset..offset + GAMEPAD_SLOT_BYTES]);
            offset += GAMEPAD_SLOT_BYTES;
        }
        debug_assert_eq!(offset, INPUT_SNAPSHOT_BYTES);

        *bytes = rest;
        Some(InputSnapshot {
            keys,
            mouse_x,
            mouse_y,
            wheel_x_over_256,
            wheel_y_over_256,
            mouse_buttons,
            gamepads,
        })
    }

    /// Whether `key` is pressed in this snapshot.
    pub fn is_pressed(&self, key: Key) -> bool {
        self.keys[key as usize].pressed
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_gamepad() -> impl Strategy<Value = GamepadSlot> {
        (
            any::<bool>(),
            any::<u16>(),
            any::<u8>(),
            any::<u8>(),
            any::<i16>(),
            any::<i16>(),
            any::<i16>(),
            any::<i16>(),
        )
            .prop_map(
                |(connected, buttons, trigger_left, trigger_right, axis_lx, axis_ly, axis_rx, axis_ry)| {
                    GamepadSlot {
                        connected,
                        buttons,
                        trigger_left,
                        trigger_right,
                        axis_lx,
                        axis_ly,
                        axis_rx,
                        axis_ry,
                    }
                },
            )
    }

    fn arb_snapshot() -> impl Strategy<Value = InputSnapshot> {
        (
            proptest::collection::vec((any::<bool>(), any::<u8>()), Key::COUNT),
            any::<i32>(),
            any::<i32>(),
            any::<i32>(),
            any::<i32>(),
            any::<u8>(),
            proptest::collection::vec(arb_gamepad(), MAX_GAMEPADS),
        )
            .prop_map(
                |(keys, mouse_x, mouse_y, wheel_x, wheel_y, mouse_buttons, gamepads)| {
                    let mut snapshot = InputSnapshot::default();
                    for (i, (pressed, repeat_count)) in keys.into_iter().enumerate() {
                        snapshot.keys[i] = KeyState { pressed, repeat_count };
                    }
                    snapshot.mouse_x = mouse_x;
                    snapshot.mouse_y = mouse_y;
                    snapshot.wheel_x_over_256 = wheel_x;
                    snapshot.wheel_y_over_256 = wheel_y;
                    snapshot.mouse_buttons = mouse_buttons;
                    for (i, gamepad) in gamepads.into_iter().enumerate() {
                        snapshot.gamepads[i] = gamepad;
                    }
                    snapshot
                },
            )
    }

    proptest! {
        #[test]
        fn any_snapshot_round_trips_through_bytes(snapshot in arb_snapshot()) {
            let mut bytes = Vec::new();
            snapshot.write_bytes(&mut bytes);
            prop_assert_eq!(bytes.len(), INPUT_SNAPSHOT_BYTES);
            let mut slice = bytes.as_slice();
            let decoded = InputSnapshot::read_bytes(&mut slice).expect("decode");
            prop_assert!(slice.is_empty());
            prop_assert_eq!(decoded, snapshot);
        }
    }
}
