//! The Lifecycle: `Init` / `Update` / `Reset` / `Fail` / `Quit`, orchestrating
//! every other module under a single recursive mutex.
//!
//! Grounded in the overall shape of `supershuckie-core`'s single-instance
//! emulator core, generalized to a generic `Engine<P: Platform>` per
//! SPEC_FULL.md §9's "global singleton" design note: this crate exposes an
//! owned value rather than hiding a `static` behind it.

use crate::assertion::{AssertionAccumulator, FailedAssertion, SourceLocation};
use crate::clock::{ReplayClock, SignalGate};
use crate::inject::InjectEngine;
use crate::pin::{PinRecorder, PinReplayer};
use crate::platform::Platform;
use crate::settings::{self, EngineSettings};
use crate::track::{TrackRecorder, TrackReplayer};
use crate::Mode;
use gmt_format::input::InputSnapshot;
use gmt_format::record::Record;
use gmt_format::test_file::thread::NonBlockingStreamWriter;
use gmt_format::test_file::{DecodedTestFile, StreamWriter, TestFileSink};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::path::Path;

/// Optional callbacks invoked outside the engine's mutex. Immutable once
/// stored, so reading them never needs the lock (SPEC_FULL.md §9).
#[derive(Default)]
pub struct Hooks {
    /// Invoked once, after bookkeeping, when `Fail` runs. The default
    /// behavior (no hook registered) logs a report and aborts the process.
    pub on_fail: Option<Box<dyn Fn(&[FailedAssertion]) + Send + Sync>>,
    /// Invoked after every `SyncSignal` call, whatever the outcome.
    pub on_signal: Option<Box<dyn Fn(i32) + Send + Sync>>,
    /// Invoked once per failed `Assert`/`Track` call, before the
    /// trigger-count check.
    pub on_assertion_trigger: Option<Box<dyn Fn(&FailedAssertion) + Send + Sync>>,
}

/// Parameters passed to [`Engine::init`].
pub struct Setup {
    /// Path to the test file, relative to `work_dir`.
    pub test_path: String,
    /// Working directory the engine changes into and loads settings from.
    pub work_dir: String,
    /// RECORD, REPLAY, or DISABLED.
    pub mode: Mode,
    /// User-supplied callbacks.
    pub hooks: Hooks,
}

/// The subset of [`Setup`] the engine keeps alongside its mutable state.
struct EngineSetup {
    test_path: String,
    work_dir: String,
}

/// Errors that can fail [`Engine::init`].
#[derive(Debug)]
pub enum InitError {
    /// Changing the working directory failed.
    WorkDir(String),
    /// Opening the test file for writing failed (RECORD).
    Open(String),
    /// Reading the test file failed (REPLAY).
    Read(String),
    /// The test file failed to decode (REPLAY).
    Decode(String),
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::WorkDir(e) => write!(f, "failed to set working directory: {e}"),
            InitError::Open(e) => write!(f, "failed to open test file: {e}"),
            InitError::Read(e) => write!(f, "failed to read test file: {e}"),
            InitError::Decode(e) => write!(f, "failed to decode test file: {e}"),
        }
    }
}

enum RecordSink<F: TestFileSink + Send + 'static> {
    Blocking(StreamWriter<F>),
    NonBlocking(NonBlockingStreamWriter<F>),
}

impl<F: TestFileSink + Send + 'static> RecordSink<F> {
    fn write_record(&mut self, record: Record) {
        let result = match self {
            RecordSink::Blocking(writer) => writer.write_record(&record),
            RecordSink::NonBlocking(writer) => {
                writer.write_record(record);
                Ok(())
            }
        };
        if let Err(error) = result {
            log::error!("dropping record: {error}");
        }
    }

    fn close(self) {
        let result = match self {
            RecordSink::Blocking(writer) => writer.close().map(|_| ()).map_err(|(_, e)| e),
            RecordSink::NonBlocking(mut writer) => writer.close().map(|_| ()).map_err(|(_, e)| e),
        };
        if let Err(error) = result {
            log::error!("failed to finalize test file: {error}");
        }
    }
}

enum ReplayState {
    Inject(InjectEngine),
    SignalGate(SignalGate),
}

struct EngineInner<P: Platform> {
    platform: P,
    mode: Mode,
    settings: EngineSettings,
    setup: EngineSetup,
    clock: ReplayClock,
    gate: SignalGate,
    inject: InjectEngine,
    pin_recorder: PinRecorder,
    pin_replayer: PinReplayer,
    track_recorder: TrackRecorder,
    track_replayer: TrackReplayer,
    assertions: AssertionAccumulator,
    writer: Option<RecordSink<P::File>>,
    frame_index: u64,
    test_failed: bool,
}

/// A single engine instance, generic over the host `Platform`
/// implementation.
///
/// `Init`/`Update`/`Reset`/`Fail`/`Quit` all acquire the internal recursive
/// mutex; every public entry point is safe to call reentrantly from a hook
/// invoked by another entry point, since hooks always run after the guard
/// for the call that triggered them has been dropped.
pub struct Engine<P: Platform> {
    hooks: Hooks,
    inner: ReentrantMutex<RefCell<EngineInner<P>>>,
}

impl<P: Platform> Engine<P> {
    /// Initialize the engine: load settings, ask the platform to install
    /// hooks, and open (RECORD) or fully decode (REPLAY) the test file.
    ///
    /// Fails without partially initializing: on any error the platform has
    /// already had `set_working_dir` applied, but no file handle or
    /// decoded state is retained.
    pub fn init(mut platform: P, setup: Setup) -> Result<Engine<P>, InitError> {
        platform
            .set_working_dir(&setup.work_dir)
            .map_err(|e| InitError::WorkDir(e.into_owned()))?;

        let settings = settings::load_or_default(Path::new(&setup.work_dir));

        let now = platform.monotonic_now();
        let clock = ReplayClock::new(now);

        let (writer, gate, inject, pin_replayer, track_replayer) = match setup.mode {
            Mode::Record => {
                let file = platform
                    .file_open_write(&setup.test_path)
                    .map_err(|e| InitError::Open(e.into_owned()))?;
                let writer = StreamWriter::new(file).map_err(|(_, e)| InitError::Open(e.to_string()))?;
                let sink = if settings.background_writer_thread {
                    RecordSink::NonBlocking(NonBlockingStreamWriter::new(writer))
                } else {
                    RecordSink::Blocking(writer)
                };
                (
                    Some(sink),
                    SignalGate::default(),
                    InjectEngine::new(Vec::new()),
                    PinReplayer::default(),
                    TrackReplayer::new(Vec::new(), settings.float_eps, settings.double_eps),
                )
            }
            Mode::Replay => {
                let bytes = platform
                    .file_read_all(&setup.test_path)
                    .map_err(|e| InitError::Read(e.into_owned()))?;
                let decoded =
                    DecodedTestFile::decode(&bytes).map_err(|e| InitError::Decode(e.to_string()))?;
                (
                    None,
                    SignalGate::new(decoded.signals),
                    InjectEngine::new(decoded.frames),
                    PinReplayer::new(decoded.pins),
                    TrackReplayer::new(decoded.tracks, settings.float_eps, settings.double_eps),
                )
            }
            Mode::Disabled => (
                None,
                SignalGate::default(),
                InjectEngine::new(Vec::new()),
                PinReplayer::default(),
                TrackReplayer::new(Vec::new(), settings.float_eps, settings.double_eps),
            ),
        };

        platform.set_replay_hooks_active(setup.mode == Mode::Replay);

        let Setup {
            test_path,
            work_dir,
            mode,
            hooks,
        } = setup;

        let inner = EngineInner {
            platform,
            mode,
            settings,
            setup: EngineSetup { test_path, work_dir },
            clock,
            gate,
            inject,
            pin_recorder: PinRecorder::new(),
            pin_replayer,
            track_recorder: TrackRecorder::new(),
            track_replayer,
            assertions: AssertionAccumulator::new(),
            writer,
            frame_index: 0,
            test_failed: false,
        };

        Ok(Engine {
            hooks,
            inner: ReentrantMutex::new(RefCell::new(inner)),
        })
    }

    /// Run one frame's worth of work: capture (RECORD) or inject (REPLAY),
    /// then reset the Pin/Track per-key counters.
    pub fn update(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let now = inner.platform.monotonic_now();

        match inner.mode {
            Mode::Record => {
                let mut input = InputSnapshot::default();
                inner.platform.capture_input(&mut input);
                let timestamp_seconds = inner.clock.replay_time(now);
                if let Some(writer) = inner.writer.as_mut() {
                    writer.write_record(Record::Frame {
                        timestamp_seconds,
                        input,
                    });
                }
            }
            Mode::Replay => {
                let gated = {
                    let now = inner.platform.monotonic_now();
                    let clock = &mut inner.clock;
                    inner.gate.update_gate(clock, now)
                };
                if !gated {
                    let replay_time = inner.clock.replay_time(now);
                    let EngineInner { inject, platform, .. } = &mut *inner;
                    inject.advance(replay_time, platform);
                }
            }
            Mode::Disabled => {}
        }

        inner.frame_index += 1;
        inner.pin_recorder.reset();
        inner.pin_replayer.reset_counters();
        inner.track_recorder.reset();
        inner.track_replayer.reset_counters();
    }

    /// Deliver `SyncSignal(id)` from the host.
    pub fn sync_signal(&self, id: i32) {
        let mode = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if inner.mode == Mode::Record {
                let now = inner.platform.monotonic_now();
                let timestamp_seconds = inner.clock.replay_time(now);
                if let Some(writer) = inner.writer.as_mut() {
                    writer.write_record(Record::Signal {
                        timestamp_seconds,
                        signal_id: id,
                    });
                }
            } else if inner.mode == Mode::Replay {
                let now = inner.platform.monotonic_now();
                let clock = &mut inner.clock;
                inner.gate.sync_signal(id, clock, now);
            }
            inner.mode
        };
        let _ = mode;
        if let Some(callback) = &self.hooks.on_signal {
            callback(id);
        }
    }

    /// Overwrite `*value` with the next recorded PIN entry for `key`
    /// (REPLAY), or record the live value (RECORD).
    #[track_caller]
    pub fn pin_i32(&self, key: u32, value: &mut i32) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.mode {
            Mode::Record => {
                let record = crate::pin::record_pin(&mut inner.pin_recorder, key, &value.to_le_bytes());
                if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                    writer.write_record(record);
                }
            }
            Mode::Replay => inner.pin_replayer.pin_i32(key, value),
            Mode::Disabled => {}
        }
    }

    /// Overwrite `*value` with the next recorded PIN entry for `key`
    /// (REPLAY), or record the live value (RECORD).
    #[track_caller]
    pub fn pin_u32(&self, key: u32, value: &mut u32) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.mode {
            Mode::Record => {
                let record = crate::pin::record_pin(&mut inner.pin_recorder, key, &value.to_le_bytes());
                if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                    writer.write_record(record);
                }
            }
            Mode::Replay => inner.pin_replayer.pin_u32(key, value),
            Mode::Disabled => {}
        }
    }

    /// Overwrite `*value` with the next recorded PIN entry for `key`
    /// (REPLAY), or record the live value (RECORD).
    #[track_caller]
    pub fn pin_f32(&self, key: u32, value: &mut f32) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.mode {
            Mode::Record => {
                let record = crate::pin::record_pin(&mut inner.pin_recorder, key, &value.to_le_bytes());
                if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                    writer.write_record(record);
                }
            }
            Mode::Replay => inner.pin_replayer.pin_f32(key, value),
            Mode::Disabled => {}
        }
    }

    /// Overwrite `*value` with the next recorded PIN entry for `key`
    /// (REPLAY), or record the live value (RECORD).
    #[track_caller]
    pub fn pin_f64(&self, key: u32, value: &mut f64) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.mode {
            Mode::Record => {
                let record = crate::pin::record_pin(&mut inner.pin_recorder, key, &value.to_le_bytes());
                if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                    writer.write_record(record);
                }
            }
            Mode::Replay => inner.pin_replayer.pin_f64(key, value),
            Mode::Disabled => {}
        }
    }

    /// Overwrite `*value` with the next recorded PIN entry for `key`
    /// (REPLAY), or record the live value (RECORD).
    #[track_caller]
    pub fn pin_bool(&self, key: u32, value: &mut bool) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.mode {
            Mode::Record => {
                let byte = [*value as u8];
                let record = crate::pin::record_pin(&mut inner.pin_recorder, key, &byte);
                if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                    writer.write_record(record);
                }
            }
            Mode::Replay => inner.pin_replayer.pin_bool(key, value),
            Mode::Disabled => {}
        }
    }

    /// Assert the live `i32` equals the next recorded TRACK entry for
    /// `key` (REPLAY); record it (RECORD).
    #[track_caller]
    pub fn track_i32(&self, key: u32, value: i32) {
        let location = caller_location();
        let failure = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            match inner.mode {
                Mode::Record => {
                    let record =
                        crate::track::record_track(&mut inner.track_recorder, key, &value.to_le_bytes());
                    if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                        writer.write_record(record);
                    }
                    None
                }
                Mode::Replay => {
                    let before = inner.assertions.get_failed().len();
                    inner
                        .track_replayer
                        .track_i32(key, value, location.clone(), &mut inner.assertions);
                    if inner.assertions.get_failed().len() > before {
                        inner.assertions.get_failed().last().cloned()
                    } else {
                        None
                    }
                }
                Mode::Disabled => None,
            }
        };
        if let Some(failure) = failure {
            self.dispatch_assertion_trigger(&failure, location);
        }
    }

    /// Assert the live `u32` equals the next recorded TRACK entry for
    /// `key` (REPLAY); record it (RECORD).
    #[track_caller]
    pub fn track_u32(&self, key: u32, value: u32) {
        let location = caller_location();
        let failure = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            match inner.mode {
                Mode::Record => {
                    let record =
                        crate::track::record_track(&mut inner.track_recorder, key, &value.to_le_bytes());
                    if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                        writer.write_record(record);
                    }
                    None
                }
                Mode::Replay => {
                    let before = inner.assertions.get_failed().len();
                    inner
                        .track_replayer
                        .track_u32(key, value, location.clone(), &mut inner.assertions);
                    if inner.assertions.get_failed().len() > before {
                        inner.assertions.get_failed().last().cloned()
                    } else {
                        None
                    }
                }
                Mode::Disabled => None,
            }
        };
        if let Some(failure) = failure {
            self.dispatch_assertion_trigger(&failure, location);
        }
    }

    /// Assert the live `f32` equals the next recorded TRACK entry for
    /// `key`, within `float_eps` (REPLAY); record it (RECORD).
    #[track_caller]
    pub fn track_f32(&self, key: u32, value: f32) {
        let location = caller_location();
        let failure = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            match inner.mode {
                Mode::Record => {
                    let record =
                        crate::track::record_track(&mut inner.track_recorder, key, &value.to_le_bytes());
                    if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                        writer.write_record(record);
                    }
                    None
                }
                Mode::Replay => {
                    let before = inner.assertions.get_failed().len();
                    inner
                        .track_replayer
                        .track_f32(key, value, location.clone(), &mut inner.assertions);
                    if inner.assertions.get_failed().len() > before {
                        inner.assertions.get_failed().last().cloned()
                    } else {
                        None
                    }
                }
                Mode::Disabled => None,
            }
        };
        if let Some(failure) = failure {
            self.dispatch_assertion_trigger(&failure, location);
        }
    }

    /// Assert the live `f64` equals the next recorded TRACK entry for
    /// `key`, within `double_eps` (REPLAY); record it (RECORD).
    #[track_caller]
    pub fn track_f64(&self, key: u32, value: f64) {
        let location = caller_location();
        let failure = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            match inner.mode {
                Mode::Record => {
                    let record =
                        crate::track::record_track(&mut inner.track_recorder, key, &value.to_le_bytes());
                    if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                        writer.write_record(record);
                    }
                    None
                }
                Mode::Replay => {
                    let before = inner.assertions.get_failed().len();
                    inner
                        .track_replayer
                        .track_f64(key, value, location.clone(), &mut inner.assertions);
                    if inner.assertions.get_failed().len() > before {
                        inner.assertions.get_failed().last().cloned()
                    } else {
                        None
                    }
                }
                Mode::Disabled => None,
            }
        };
        if let Some(failure) = failure {
            self.dispatch_assertion_trigger(&failure, location);
        }
    }

    /// Assert the live `bool` equals the next recorded TRACK entry for
    /// `key` (REPLAY); record it (RECORD).
    #[track_caller]
    pub fn track_bool(&self, key: u32, value: bool) {
        let location = caller_location();
        let failure = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            match inner.mode {
                Mode::Record => {
                    let byte = [value as u8];
                    let record = crate::track::record_track(&mut inner.track_recorder, key, &byte);
                    if let (Some(record), Some(writer)) = (record, inner.writer.as_mut()) {
                        writer.write_record(record);
                    }
                    None
                }
                Mode::Replay => {
                    let before = inner.assertions.get_failed().len();
                    inner
                        .track_replayer
                        .track_bool(key, value, location.clone(), &mut inner.assertions);
                    if inner.assertions.get_failed().len() > before {
                        inner.assertions.get_failed().last().cloned()
                    } else {
                        None
                    }
                }
                Mode::Disabled => None,
            }
        };
        if let Some(failure) = failure {
            self.dispatch_assertion_trigger(&failure, location);
        }
    }

    /// Evaluate a boolean assertion directly, outside the Pin/Track
    /// protocol.
    #[track_caller]
    pub fn assert(&self, cond: bool, message: impl Into<String>) {
        let location = caller_location();
        if cond {
            let guard = self.inner.lock();
            guard.borrow_mut().assertions.record_pass();
            return;
        }
        let failure = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.assertions.push_at(message.into(), location.clone());
            inner.assertions.get_failed().last().cloned()
        };
        if let Some(failure) = failure {
            self.dispatch_assertion_trigger(&failure, location);
        }
    }

    fn dispatch_assertion_trigger(&self, failure: &FailedAssertion, location: SourceLocation) {
        log::error!("{}:{}: {}", location.file, location.line, failure.message);

        let was_replay = {
            let guard = self.inner.lock();
            guard.borrow().mode == Mode::Replay
        };
        if was_replay {
            let guard = self.inner.lock();
            guard.borrow_mut().platform.set_replay_hooks_active(false);
        }
        if let Some(callback) = &self.hooks.on_assertion_trigger {
            callback(failure);
        }
        if was_replay {
            let guard = self.inner.lock();
            guard.borrow_mut().platform.set_replay_hooks_active(true);
        }

        let (fire_count, trigger_count) = {
            let guard = self.inner.lock();
            let inner = guard.borrow();
            (inner.assertions.total_count(), inner.settings.fail_assertion_trigger_count)
        };
        if fire_count >= u64::from(trigger_count).max(1) {
            self.fail();
        }
    }

    /// Mark the test failed, then invoke the fail callback (or, absent
    /// one, log a report and abort the process). Idempotent: safe to call
    /// again before the process actually terminates.
    pub fn fail(&self) {
        let failed = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.test_failed = true;
            inner.assertions.get_failed().to_vec()
        };

        if let Some(callback) = &self.hooks.on_fail {
            callback(&failed);
            return;
        }

        log::error!("test failed with {} assertion(s)", failed.len());
        for failure in &failed {
            log::error!(
                "{}:{}: {}",
                failure.location.file,
                failure.location.line,
                failure.message
            );
        }
        std::process::abort();
    }

    /// Return the engine to the "just after Init" state: RECORD
    /// close+reopens the file, REPLAY re-reads and re-decodes it; cursors,
    /// counters, the failure log, and both clocks restart.
    pub fn reset(&self) -> Result<(), InitError> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        match inner.mode {
            Mode::Record => {
                if let Some(sink) = inner.writer.take() {
                    sink.close();
                }
                let file = inner
                    .platform
                    .file_open_write(&inner.setup.test_path)
                    .map_err(|e| InitError::Open(e.into_owned()))?;
                let writer = StreamWriter::new(file).map_err(|(_, e)| InitError::Open(e.to_string()))?;
                inner.writer = Some(if inner.settings.background_writer_thread {
                    RecordSink::NonBlocking(NonBlockingStreamWriter::new(writer))
                } else {
                    RecordSink::Blocking(writer)
                });
            }
            Mode::Replay => {
                let bytes = inner
                    .platform
                    .file_read_all(&inner.setup.test_path)
                    .map_err(|e| InitError::Read(e.into_owned()))?;
                let decoded =
                    DecodedTestFile::decode(&bytes).map_err(|e| InitError::Decode(e.to_string()))?;
                inner.gate = SignalGate::new(decoded.signals);
                inner.inject = InjectEngine::new(decoded.frames);
                inner.pin_replayer = PinReplayer::new(decoded.pins);
                inner.track_replayer =
                    TrackReplayer::new(decoded.tracks, inner.settings.float_eps, inner.settings.double_eps);
            }
            Mode::Disabled => {}
        }

        inner.pin_recorder.reset();
        inner.track_recorder.reset();
        inner.assertions.clear();
        inner.frame_index = 0;
        inner.test_failed = false;
        let now = inner.platform.monotonic_now();
        inner.clock.reset(now);
        inner.inject.reset();
        inner.gate.reset();

        Ok(())
    }

    /// Finalize the test file (RECORD writes `END` and closes) or free the
    /// decoded REPLAY state, and remove platform hooks.
    pub fn quit(self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Some(sink) = inner.writer.take() {
            sink.close();
        }
        inner.platform.set_replay_hooks_active(false);
    }

    /// Whether `Fail` has run.
    pub fn test_failed(&self) -> bool {
        let guard = self.inner.lock();
        guard.borrow().test_failed
    }

    /// How many assertions have failed so far.
    pub fn failed_assertion_count(&self) -> u64 {
        let guard = self.inner.lock();
        guard.borrow().assertions.total_count()
    }

    /// A copy of every buffered failure since construction or the last
    /// [`Engine::clear_failed_assertions`]/[`Engine::reset`].
    pub fn get_failed_assertions(&self) -> Vec<FailedAssertion> {
        let guard = self.inner.lock();
        guard.borrow().assertions.get_failed().to_vec()
    }

    /// Drop all buffered failures and reset the fire and pass counters,
    /// without otherwise disturbing the engine's state.
    pub fn clear_failed_assertions(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().assertions.clear();
    }
}

fn caller_location() -> SourceLocation {
    let location = core::panic::Location::caller();
    SourceLocation {
        file: location.file(),
        line: location.line(),
        function: module_path!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NullPlatform;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn setup(mode: Mode) -> Setup {
        Setup {
            test_path: "t.gmt".into(),
            work_dir: std::env::temp_dir()
                .join("gmt-engine-test")
                .to_string_lossy()
                .into_owned(),
            mode,
            hooks: Hooks::default(),
        }
    }

    #[test]
    fn record_then_replay_round_trips_frames() {
        use gmt_format::input::{InputSnapshot, Key};

        let mut a_down = InputSnapshot::default();
        a_down.keys[Key::A as usize].pressed = true;
        let a_up = InputSnapshot::default();

        let mut record_platform = NullPlatform::new();
        let file = record_platform.register_file("t.gmt");
        record_platform.queue_captures([a_down.clone(), a_up.clone(), a_up.clone()]);

        let engine = Engine::init(record_platform, setup(Mode::Record)).expect("init record");
        let advance = |engine: &Engine<NullPlatform>| {
            engine.update();
            engine.inner.lock().borrow_mut().platform.advance_clock(0.016);
        };
        advance(&engine);
        advance(&engine);
        advance(&engine);
        engine.quit();

        let bytes = file.bytes();

        let mut replay_platform = NullPlatform::new();
        replay_platform.seed_file("t.gmt", bytes);
        let engine = Engine::init(replay_platform, setup(Mode::Replay)).expect("init replay");
        advance(&engine);
        advance(&engine);
        advance(&engine);

        let injected = {
            let guard = engine.inner.lock();
            guard.borrow().platform.injected().to_vec()
        };
        assert_eq!(injected.len(), 3);
        assert!(injected[0].keys[Key::A as usize].pressed);
        assert!(!injected[1].keys[Key::A as usize].pressed);
        assert!(!injected[2].keys[Key::A as usize].pressed);
        engine.quit();
    }

    #[test]
    fn signal_blocks_injection_until_the_host_catches_up() {
        use gmt_format::input::{InputSnapshot, Key};

        let mut a_down = InputSnapshot::default();
        a_down.keys[Key::A as usize].pressed = true;
        let a_up = InputSnapshot::default();

        let mut record_platform = NullPlatform::new();
        let file = record_platform.register_file("t.gmt");
        record_platform.queue_captures([a_down.clone(), a_up.clone()]);

        let engine = Engine::init(record_platform, setup(Mode::Record)).expect("init record");
        engine.update(); // FRAME@t=0: a_down
        engine.inner.lock().borrow_mut().platform.advance_clock(0.016);
        engine.sync_signal(7); // SIGNAL@t=0.016
        engine.inner.lock().borrow_mut().platform.advance_clock(0.016);
        engine.update(); // FRAME@t=0.032: a_up
        engine.quit();

        let bytes = file.bytes();

        let mut replay_platform = NullPlatform::new();
        replay_platform.seed_file("t.gmt", bytes);
        let engine = Engine::init(replay_platform, setup(Mode::Replay)).expect("init replay");

        engine.update(); // now=0: FRAME@t=0 is due, injects a_down
        engine.inner.lock().borrow_mut().platform.advance_clock(0.016);
        engine.update(); // now=0.016: SIGNAL@t=0.016 is due, gate blocks, nothing injected
        assert_eq!(
            engine.inner.lock().borrow().platform.injected().len(),
            1,
            "second frame must not inject before the signal unblocks the gate"
        );

        engine.sync_signal(7); // host catches up, gate unblocks
        engine.inner.lock().borrow_mut().platform.advance_clock(0.016);
        engine.update(); // now=0.032: FRAME@t=0.032 is now due, injects a_up

        let injected = {
            let guard = engine.inner.lock();
            guard.borrow().platform.injected().to_vec()
        };
        assert_eq!(injected.len(), 2);
        assert!(injected[0].keys[Key::A as usize].pressed);
        assert!(!injected[1].keys[Key::A as usize].pressed);
        engine.quit();
    }

    #[test]
    fn disabled_mode_is_a_no_op() {
        let platform = NullPlatform::new();
        let engine = Engine::init(platform, setup(Mode::Disabled)).expect("init disabled");
        engine.update();
        engine.sync_signal(1);
        engine.quit();
    }

    #[test]
    fn fail_without_a_hook_aborts_so_only_exercise_the_hook_path() {
        let called = Arc::new(AtomicUsize::new(0));
        let called_clone = called.clone();
        let mut hooks = Hooks::default();
        hooks.on_fail = Some(Box::new(move |_failures| {
            called_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let mut setup = setup(Mode::Disabled);
        setup.hooks = hooks;
        let platform = NullPlatform::new();
        let engine = Engine::init(platform, setup).expect("init");
        engine.assert(false, "forced failure");
        assert_eq!(called.load(Ordering::SeqCst), 1);
        assert!(engine.test_failed());
    }

    #[test]
    fn passing_assertions_do_not_trigger_fail() {
        let platform = NullPlatform::new();
        let engine = Engine::init(platform, setup(Mode::Disabled)).expect("init");
        engine.assert(true, "never seen");
        assert!(!engine.test_failed());
    }

    #[test]
    fn trigger_count_defers_fail_until_reached() {
        let called = Arc::new(AtomicUsize::new(0));
        let called_clone = called.clone();
        let mut hooks = Hooks::default();
        hooks.on_fail = Some(Box::new(move |_| {
            called_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let mut setup = setup(Mode::Disabled);
        setup.hooks = hooks;
        let platform = NullPlatform::new();
        let engine = Engine::init(platform, setup).expect("init");
        {
            let guard = engine.inner.lock();
            guard.borrow_mut().settings.fail_assertion_trigger_count = 3;
        }
        engine.assert(false, "one");
        engine.assert(false, "two");
        assert_eq!(called.load(Ordering::SeqCst), 0);
        engine.assert(false, "three");
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }
}
