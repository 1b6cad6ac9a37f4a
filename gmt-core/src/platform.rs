//! The `Platform` collaborator: everything the engine needs from the host
//! OS, and nothing else.
//!
//! Grounded in `EmulatorCore`: a single trait the engine is generic over,
//! so the core stays testable behind a null implementation and the real
//! hook/file/clock plumbing lives entirely outside this crate.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use gmt_format::input::InputSnapshot;
use gmt_format::test_file::TestFileSink;

/// Everything the engine asks of the host platform.
///
/// `mutex_lock`/`mutex_unlock` from SPEC_FULL.md §6 are deliberately not
/// part of this trait: the engine's recursive mutex is modeled internally
/// (see `gmt_core::engine`) rather than delegated to the platform, since
/// every target this crate runs on provides a native thread-safe mutex.
pub trait Platform {
    /// The writable file handle type this platform opens for RECORD mode.
    type File: TestFileSink;

    /// Sample keyboard, mouse, wheel (accumulated since the last call,
    /// reset to zero on sample) and button state into `out`. Gamepad slots
    /// are populated only if gamepad capture is enabled.
    fn capture_input(&mut self, out: &mut InputSnapshot);

    /// Emit OS input events for every bit that changed between `prev` and
    /// `new`, write the mouse position unconditionally, and emit
    /// `repeat_count` extra key-downs for keys with nonzero repeat.
    fn inject_input(&mut self, new: &InputSnapshot, prev: &InputSnapshot);

    /// Push the most recently injected input into the platform so its own
    /// "poll input" interception can answer consistently between Updates.
    fn set_replayed_input(&mut self, _input: &InputSnapshot) {}

    /// Enable or disable interception of the host's input-polling APIs.
    fn set_replay_hooks_active(&mut self, active: bool);

    /// Seconds since an arbitrary epoch, strictly non-decreasing.
    fn monotonic_now(&self) -> f64;

    /// Open `path` for writing, truncating any existing file.
    fn file_open_write(&mut self, path: &str) -> Result<Self::File, Cow<'static, str>>;

    /// Read the entirety of `path`.
    fn file_read_all(&mut self, path: &str) -> Result<Vec<u8>, Cow<'static, str>>;

    /// Whether `path` exists.
    fn file_exists(&self, path: &str) -> bool;

    /// Create `path` and any missing parent directories.
    fn create_dir_recursive(&mut self, path: &str) -> Result<(), Cow<'static, str>>;

    /// Change the process working directory, as requested by `--work-dir=`.
    fn set_working_dir(&mut self, path: &str) -> Result<(), Cow<'static, str>>;
}

#[cfg(any(test, feature = "std"))]
mod null {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// An in-memory file shared (via `Arc<Mutex<_>>`) between the handle
    /// `file_open_write` hands the writer and the map `NullPlatform` reads
    /// back from, so bytes written during a RECORD run are visible to a
    /// REPLAY run against the same `NullPlatform` without a separate
    /// "deposit on close" step.
    #[derive(Clone, Default)]
    pub struct SharedFile(Arc<Mutex<Vec<u8>>>);

    impl TestFileSink for SharedFile {
        fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Cow<'static, str>> {
            self.0
                .lock()
                .map_err(|_| Cow::Borrowed("shared file lock poisoned"))?
                .extend_from_slice(bytes);
            Ok(())
        }

        fn truncate(&mut self) -> Result<(), Cow<'static, str>> {
            self.0
                .lock()
                .map_err(|_| Cow::Borrowed("shared file lock poisoned"))?
                .clear();
            Ok(())
        }
    }

    impl SharedFile {
        /// Snapshot the bytes written so far.
        pub fn bytes(&self) -> Vec<u8> {
            self.0.lock().map(|bytes| bytes.clone()).unwrap_or_default()
        }
    }

    /// A platform that captures nothing and injects nothing, for tests and
    /// as a reference implementation.
    ///
    /// Grounded in `NullEmulatorCore`: files are backed by an in-memory
    /// map so this works without touching a real filesystem.
    #[derive(Default)]
    pub struct NullPlatform {
        now: f64,
        replay_hooks_active: bool,
        working_dir: alloc::string::String,
        files: alloc::collections::BTreeMap<alloc::string::String, SharedFile>,
        /// Scripted captures, consumed front-first by `capture_input`; once
        /// empty, captures default to all-zero.
        scripted_captures: alloc::collections::VecDeque<InputSnapshot>,
        /// Every snapshot `inject_input` was asked to deliver, oldest first.
        injected: Vec<InputSnapshot>,
    }

    impl NullPlatform {
        /// Construct a platform whose clock starts at `0.0`.
        pub fn new() -> NullPlatform {
            NullPlatform::default()
        }

        /// Advance the simulated monotonic clock.
        pub fn advance_clock(&mut self, seconds: f64) {
            self.now += seconds;
        }

        /// Seed an in-memory file, as if it had been written by a prior
        /// RECORD run.
        pub fn seed_file(&mut self, path: &str, bytes: Vec<u8>) {
            self.files
                .insert(path.into(), SharedFile(Arc::new(Mutex::new(bytes))));
        }

        /// Pre-register `path` and return a handle that stays readable
        /// after the platform has been moved into an [`crate::engine::Engine`],
        /// so a test can inspect what a RECORD run wrote.
        pub fn register_file(&mut self, path: &str) -> SharedFile {
            let file = SharedFile::default();
            self.files.insert(path.into(), file.clone());
            file
        }

        /// Queue the next `capture_input` results, in order.
        pub fn queue_captures(&mut self, snapshots: impl IntoIterator<Item = InputSnapshot>) {
            self.scripted_captures.extend(snapshots);
        }

        /// Every snapshot delivered to `inject_input` so far.
        pub fn injected(&self) -> &[InputSnapshot] {
            &self.injected
        }
    }

    impl Platform for NullPlatform {
        type File = SharedFile;

        fn capture_input(&mut self, out: &mut InputSnapshot) {
            *out = self.scripted_captures.pop_front().unwrap_or_default();
        }

        fn inject_input(&mut self, new: &InputSnapshot, _prev: &InputSnapshot) {
            self.injected.push(new.clone());
        }

        fn set_replay_hooks_active(&mut self, active: bool) {
            self.replay_hooks_active = active;
        }

        fn monotonic_now(&self) -> f64 {
            self.now
        }

        fn file_open_write(&mut self, path: &str) -> Result<Self::File, Cow<'static, str>> {
            let file = self
                .files
                .entry(path.into())
                .or_insert_with(SharedFile::default)
                .clone();
            file.clone().truncate()?;
            Ok(file)
        }

        fn file_read_all(&mut self, path: &str) -> Result<Vec<u8>, Cow<'static, str>> {
            let file = self.files.get(path).ok_or(Cow::Borrowed("no such file"))?;
            file.0
                .lock()
                .map(|bytes| bytes.clone())
                .map_err(|_| Cow::Borrowed("shared file lock poisoned"))
        }

        fn file_exists(&self, path: &str) -> bool {
            self.files.contains_key(path)
        }

        fn create_dir_recursive(&mut self, _path: &str) -> Result<(), Cow<'static, str>> {
            Ok(())
        }

        fn set_working_dir(&mut self, path: &str) -> Result<(), Cow<'static, str>> {
            self.working_dir = path.into();
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "std"))]
pub use null::NullPlatform;
