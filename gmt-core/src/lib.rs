//! Lifecycle, clock/signal, pin/track and assertion engine.
//!
//! `gmt-format` owns "what a byte sequence means"; this crate owns "what
//! the engine does with it": the replay clock and sync signal gate, the
//! per-frame inject engine, the Pin and Track stores, the bounded
//! assertion accumulator, and the `Engine` that orchestrates all of them
//! under a single recursive mutex (Init/Update/Reset/Fail/Quit).
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;
extern crate alloc;

pub mod assertion;
pub mod clock;
pub mod counters;
pub mod inject;
pub mod pin;
pub mod platform;
pub mod track;

#[cfg(feature = "std")]
pub mod cli;
#[cfg(feature = "std")]
pub mod engine;
#[cfg(feature = "std")]
pub mod settings;

pub use assertion::*;
pub use clock::*;
pub use inject::*;
pub use pin::*;
pub use platform::*;
pub use track::*;

#[cfg(feature = "std")]
pub use engine::*;

/// Execution mode of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No recording or replay; the engine is a no-op.
    #[default]
    Disabled,
    /// Capture input and write a test file.
    Record,
    /// Load a test file and inject recorded input.
    Replay,
}

impl Mode {
    /// The integer value per SPEC_FULL.md's mode enumeration.
    pub fn as_u8(self) -> u8 {
        match self {
            Mode::Disabled => 0,
            Mode::Record => 1,
            Mode::Replay => 2,
        }
    }

    /// Parse `record`/`replay`/`disabled`, as accepted by `--test-mode=`.
    pub fn parse(value: &str) -> Option<Mode> {
        match value {
            "record" => Some(Mode::Record),
            "replay" => Some(Mode::Replay),
            "disabled" => Some(Mode::Disabled),
            _ => None,
        }
    }
}
