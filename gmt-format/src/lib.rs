//! Tagged binary record/replay stream format.
//!
//! This crate owns the wire-level pieces of the testing engine: the
//! `InputSnapshot` data model, the `Record` enum and its tag discriminants,
//! the fixed test file header, a streaming writer and a two-pass decoder.
//! Everything above "what does a byte sequence mean" (clocks, signals,
//! pins/tracks, assertions, lifecycle) lives in `gmt-core`.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;
extern crate alloc;

pub mod input;
pub mod key;
pub mod record;
pub mod test_file;
mod wire;

pub use input::*;
pub use key::*;
pub use record::*;
pub use wire::*;
