//! The Track Store: sequentially-indexed bytes that are asserted equal to
//! a live variable during replay.

use crate::assertion::{AssertionAccumulator, SourceLocation};
use crate::counters::SequentialCounters;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use gmt_format::record::MAX_DATA_PAYLOAD;
use gmt_format::wire::ByteVec;

/// Float comparisons use `|a - b| < FLOAT_EPS`.
pub const FLOAT_EPS: f32 = 1e-5;
/// Double comparisons use `|a - b| < DOUBLE_EPS`.
pub const DOUBLE_EPS: f64 = 1e-11;

/// RECORD-side half of the Track Store: identical shape to
/// [`crate::pin::PinRecorder`], kept as a distinct type since the two
/// protocols diverge on replay.
#[derive(Debug, Clone, Default)]
pub struct TrackRecorder {
    counters: SequentialCounters,
}

impl TrackRecorder {
    /// A fresh recorder, all keys starting at index 0.
    pub fn new() -> TrackRecorder {
        TrackRecorder::default()
    }

    /// Reserve the next sequential index for `key`.
    pub fn next_index(&mut self, key: u32) -> u32 {
        self.counters.next(key)
    }

    /// Reset per-key counters, as `Update`/`Reset` require.
    pub fn reset(&mut self) {
        self.counters.reset();
    }
}

/// REPLAY-side half of the Track Store: compares the live value against
/// the decoded entry for `(key, next_index(key))` and raises an assertion
/// on mismatch.
///
/// The same `(key, index)` tuple recurs once per frame (the per-key index
/// resets every `Update`), so entries are kept as FIFO queues and consumed
/// in recording order rather than collapsed by a plain map `insert`.
#[derive(Debug, Clone, Default)]
pub struct TrackReplayer {
    counters: SequentialCounters,
    entries: BTreeMap<(u32, u32), VecDeque<ByteVec>>,
    /// `TRACK` float comparisons use `|a - b| < float_eps`.
    float_eps: f32,
    /// `TRACK` double comparisons use `|a - b| < double_eps`.
    double_eps: f64,
}

impl TrackReplayer {
    /// Build a replayer from the decoded TRACK records of a test file, with
    /// the epsilons from [`crate::settings::EngineSettings`].
    pub fn new(tracks: Vec<(u32, u32, ByteVec)>, float_eps: f32, double_eps: f64) -> TrackReplayer {
        let mut entries: BTreeMap<(u32, u32), VecDeque<ByteVec>> = BTreeMap::new();
        for (key, index, payload) in tracks {
            entries.entry((key, index)).or_default().push_back(payload);
        }
        TrackReplayer {
            counters: SequentialCounters::new(),
            entries,
            float_eps,
            double_eps,
        }
    }

    /// Reset per-key counters, as `Update`/`Reset` require.
    pub fn reset_counters(&mut self) {
        self.counters.reset();
    }

    /// Consume the next queued entry for `(key, next_index(key))`, in
    /// recording order.
    fn pop_next(&mut self, key: u32) -> (u32, Option<ByteVec>) {
        let index = self.counters.next(key);
        let payload = self
            .entries
            .get_mut(&(key, index))
            .and_then(VecDeque::pop_front);
        (index, payload)
    }

    /// Compare `live` against the recorded bytes for the next call with
    /// `key`, using a raw hex dump for the mismatch message. Used for
    /// untyped byte payloads; typed callers format their own message.
    ///
    /// A missing entry or size mismatch logs a WARNING and is skipped: the
    /// absence is not itself a failure. Only an actual value mismatch
    /// between two correctly-sized entries logs ERROR and is pushed to
    /// `assertions`, at `location` (SPEC_FULL.md §4.6).
    pub fn track_bytes(
        &mut self,
        key: u32,
        live: &[u8],
        location: SourceLocation,
        assertions: &mut AssertionAccumulator,
    ) {
        let (index, recorded) = self.pop_next(key);
        match recorded {
            Some(recorded) if recorded.len() != live.len() => {
                log::warn!(
                    "TRACK size mismatch for key {key} index {index}; skipping comparison"
                );
            }
            Some(recorded) if recorded.as_slice() == live => {}
            Some(recorded) => {
                let message = format!(
                    "recorded {}, current {}",
                    hex_dump(&recorded),
                    hex_dump(live),
                );
                log::error!("{message}");
                assertions.push_at(message, location);
            }
            None => {
                log::warn!("TRACK missing entry for key {key} index {index}; skipping comparison");
            }
        }
    }

    /// Consumes the next queued entry for `(key, next_index(key))`, handling
    /// the shared missing/size-mismatch WARNING-and-skip behavior. Returns
    /// `Some(recorded_bytes)` only when a correctly-sized entry exists.
    fn next_recorded(&mut self, key: u32, expected_len: usize) -> Option<ByteVec> {
        let (index, recorded) = self.pop_next(key);
        match recorded {
            Some(recorded) if recorded.len() == expected_len => Some(recorded),
            Some(_) => {
                log::warn!(
                    "TRACK size mismatch for key {key} index {index}; skipping comparison"
                );
                None
            }
            None => {
                log::warn!("TRACK missing entry for key {key} index {index}; skipping comparison");
                None
            }
        }
    }

    /// Typed adapter: assert the live `i32` matches the recorded value.
    pub fn track_i32(
        &mut self,
        key: u32,
        live: i32,
        location: SourceLocation,
        assertions: &mut AssertionAccumulator,
    ) {
        let Some(recorded) = self.next_recorded(key, 4) else {
            return;
        };
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&recorded);
        let recorded_value = i32::from_le_bytes(bytes);
        if recorded_value != live {
            let message = format!(
                "recorded {recorded_value} (0x{recorded_value:08X}), current {live} (0x{live:08X})"
            );
            log::error!("{message}");
            assertions.push_at(message, location);
        }
    }

    /// Typed adapter: assert the live `u32` matches the recorded value.
    pub fn track_u32(
        &mut self,
        key: u32,
        live: u32,
        location: SourceLocation,
        assertions: &mut AssertionAccumulator,
    ) {
        let Some(recorded) = self.next_recorded(key, 4) else {
            return;
        };
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&recorded);
        let recorded_value = u32::from_le_bytes(bytes);
        if recorded_value != live {
            let message = format!(
                "recorded {recorded_value} (0x{recorded_value:08X}), current {live} (0x{live:08X})"
            );
            log::error!("{message}");
            assertions.push_at(message, location);
        }
    }

    /// Typed adapter: assert the live `bool` matches the recorded value.
    pub fn track_bool(
        &mut self,
        key: u32,
        live: bool,
        location: SourceLocation,
        assertions: &mut AssertionAccumulator,
    ) {
        let Some(recorded) = self.next_recorded(key, 1) else {
            return;
        };
        let recorded_value = recorded[0] != 0;
        if recorded_value != live {
            let message = format!("recorded {recorded_value}, current {live}");
            log::error!("{message}");
            assertions.push_at(message, location);
        }
    }

    /// Typed adapter: assert the live `f32` is within `float_eps` (from
    /// [`crate::settings::EngineSettings`], default [`FLOAT_EPS`]) of the
    /// recorded value.
    pub fn track_f32(
        &mut self,
        key: u32,
        live: f32,
        location: SourceLocation,
        assertions: &mut AssertionAccumulator,
    ) {
        let Some(recorded) = self.next_recorded(key, 4) else {
            return;
        };
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&recorded);
        let recorded_value = f32::from_le_bytes(bytes);
        let diff = (recorded_value - live).abs();
        if diff >= self.float_eps {
            let message = format!("recorded {recorded_value}, current {live} (diff {diff})");
            log::error!("{message}");
            assertions.push_at(message, location);
        }
    }

    /// Typed adapter: assert the live `f64` is within `double_eps` (from
    /// [`crate::settings::EngineSettings`], default [`DOUBLE_EPS`]) of the
    /// recorded value.
    pub fn track_f64(
        &mut self,
        key: u32,
        live: f64,
        location: SourceLocation,
        assertions: &mut AssertionAccumulator,
    ) {
        let Some(recorded) = self.next_recorded(key, 8) else {
            return;
        };
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&recorded);
        let recorded_value = f64::from_le_bytes(bytes);
        let diff = (recorded_value - live).abs();
        if diff >= self.double_eps {
            let message = format!("recorded {recorded_value}, current {live} (diff {diff})");
            log::error!("{message}");
            assertions.push_at(message, location);
        }
    }
}

/// RECORD-side helper: emit `TRACK { key, index, payload }`, dropping
/// payloads over [`MAX_DATA_PAYLOAD`].
pub fn record_track(
    recorder: &mut TrackRecorder,
    key: u32,
    payload: &[u8],
) -> Option<gmt_format::record::Record> {
    if payload.len() > MAX_DATA_PAYLOAD {
        log::error!("TRACK payload for key {key} exceeds MAX_DATA_PAYLOAD");
        return None;
    }
    let sequential_index = recorder.next_index(key);
    let mut bytes = ByteVec::new();
    bytes.extend_from_slice(payload);
    Some(gmt_format::record::Record::Track {
        key,
        sequential_index,
        payload: bytes,
    })
}

/// Render up to 32 bytes of `data` as a hex dump, truncating longer
/// payloads with a trailing marker.
fn hex_dump(data: &[u8]) -> String {
    let shown = &data[..data.len().min(32)];
    let mut out = String::with_capacity(shown.len() * 2 + 3);
    for byte in shown {
        out.push_str(&format!("{byte:02x}"));
    }
    if data.len() > 32 {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8]) -> ByteVec {
        let mut v = ByteVec::new();
        v.extend_from_slice(bytes);
        v
    }

    fn here() -> SourceLocation {
        SourceLocation {
            file: file!(),
            line: line!(),
            function: module_path!(),
        }
    }

    fn replayer(tracks: Vec<(u32, u32, ByteVec)>) -> TrackReplayer {
        replayer(tracks, FLOAT_EPS, DOUBLE_EPS)
    }

    #[test]
    fn matching_values_raise_no_assertion() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&10i32.to_le_bytes()))];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_i32(1, 10, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 0);
    }

    #[test]
    fn mismatched_values_raise_an_assertion() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&10i32.to_le_bytes()))];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_i32(1, 11, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 1);
    }

    #[test]
    fn missing_entry_logs_a_warning_and_is_not_an_assertion() {
        let mut replayer = replayer(Vec::new());
        let mut assertions = AssertionAccumulator::new();
        replayer.track_i32(1, 11, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 0);
    }

    #[test]
    fn size_mismatch_logs_a_warning_and_is_not_an_assertion() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&10i32.to_le_bytes()))];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_f64(1, 1.0, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 0);
    }

    #[test]
    fn float_within_epsilon_matches() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&1.0f32.to_le_bytes()))];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_f32(1, 1.0 + 1e-6, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 0);
    }

    #[test]
    fn float_outside_epsilon_mismatches() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&1.0f32.to_le_bytes()))];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_f32(1, 1.1, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 1);
    }

    #[test]
    fn double_within_epsilon_matches() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&1.0f64.to_le_bytes()))];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_f64(1, 1.0 + 1e-12, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 0);
    }

    #[test]
    fn float_boundary_within_epsilon_passes_and_just_outside_fails_with_diff_message() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&1.0f32.to_le_bytes()))];

        let mut passing = replayer(tracks.clone());
        let mut assertions = AssertionAccumulator::new();
        passing.track_f32(1, 1.0000050, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 0);

        let mut failing = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        failing.track_f32(1, 1.00002, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 1);
        let message = &assertions.get_failed()[0].message;
        assert!(message.starts_with("recorded 1, current 1.00002"));
        assert!(message.contains("diff"));
    }

    #[test]
    fn integer_mismatch_message_has_decimal_and_hex() {
        let tracks = alloc::vec![(1u32, 0u32, payload(&10i32.to_le_bytes()))];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_i32(1, 11, here(), &mut assertions);
        let message = &assertions.get_failed()[0].message;
        assert!(message.contains("recorded 10 (0x0000000A)"));
        assert!(message.contains("current 11 (0x0000000B)"));
    }

    #[test]
    fn sequential_indices_advance_independently() {
        let tracks = alloc::vec![
            (1u32, 0u32, payload(&10i32.to_le_bytes())),
            (1u32, 1u32, payload(&20i32.to_le_bytes())),
        ];
        let mut replayer = replayer(tracks);
        let mut assertions = AssertionAccumulator::new();
        replayer.track_i32(1, 10, here(), &mut assertions);
        replayer.track_i32(1, 20, here(), &mut assertions);
        assert_eq!(assertions.total_count(), 0);
    }
}
