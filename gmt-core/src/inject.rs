//! The per-frame inject engine: delta injection driven by decoded FRAME
//! timestamps.

use crate::platform::Platform;
use alloc::vec::Vec;
use gmt_format::input::{Key, InputSnapshot};

/// Maximum number of key/button state transitions injected per `Update`
/// call; the remainder defer to the next call.
pub const MAX_INJECT_BATCH: usize = 64;

/// Result of one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectOutcome {
    /// Every due frame was injected.
    Pending,
    /// The replay has injected every recorded frame.
    Complete,
    /// `MAX_INJECT_BATCH` was reached; remaining frames were deferred.
    Deferred,
}

/// Drives frame injection from a decoded FRAME list.
pub struct InjectEngine {
    frames: Vec<(f64, InputSnapshot)>,
    cursor: usize,
    prev_input: InputSnapshot,
}

impl InjectEngine {
    /// Build an inject engine from the decoded FRAME records of a test
    /// file.
    pub fn new(frames: Vec<(f64, InputSnapshot)>) -> InjectEngine {
        InjectEngine {
            frames,
            cursor: 0,
            prev_input: InputSnapshot::default(),
        }
    }

    /// Rewind to the first frame, as `Reset` requires.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.prev_input = InputSnapshot::default();
    }

    /// Whether every recorded frame has already been injected.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.frames.len()
    }

    /// Inject every frame due by `replay_time`, in order, up to
    /// `MAX_INJECT_BATCH` state transitions.
    pub fn advance<P: Platform>(&mut self, replay_time: f64, platform: &mut P) -> InjectOutcome {
        if self.is_complete() {
            return InjectOutcome::Complete;
        }

        let mut transitions_used = 0usize;
        while let Some((timestamp, input)) = self.frames.get(self.cursor) {
            if *timestamp > replay_time {
                break;
            }
            let transitions = count_transitions(&self.prev_input, input);
            if transitions_used + transitions > MAX_INJECT_BATCH {
                log::warn!("inject batch deferred: MAX_INJECT_BATCH reached");
                return InjectOutcome::Deferred;
            }
            platform.inject_input(input, &self.prev_input);
            platform.set_replayed_input(input);
            transitions_used += transitions;
            self.prev_input = input.clone();
            self.cursor += 1;
        }

        if self.is_complete() {
            InjectOutcome::Complete
        } else {
            InjectOutcome::Pending
        }
    }
}

/// Counts the state transitions one inject of `new` over `prev` would cost
/// against `MAX_INJECT_BATCH`: key/button bits that changed, plus one
/// extra key-down per accumulated auto-repeat, plus the always-written
/// mouse position and any nonzero wheel delta.
fn count_transitions(prev: &InputSnapshot, new: &InputSnapshot) -> usize {
    let mut transitions = 0usize;
    for i in 0..Key::COUNT {
        if prev.keys[i].pressed != new.keys[i].pressed {
            transitions += 1;
        }
        transitions += new.keys[i].repeat_count as usize;
    }
    transitions += (prev.mouse_buttons ^ new.mouse_buttons).count_ones() as usize;
    transitions += 1; // mouse position is always written
    if new.wheel_x_over_256 != 0 {
        transitions += 1;
    }
    if new.wheel_y_over_256 != 0 {
        transitions += 1;
    }
    transitions
}
