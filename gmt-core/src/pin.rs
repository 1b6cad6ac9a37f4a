//! The Pin Store: sequentially-indexed bytes that overwrite a live
//! variable during replay.

use crate::counters::SequentialCounters;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use gmt_format::wire::ByteVec;

/// Maximum PIN/TRACK payload size, re-exported for callers that only link
/// against `gmt-core`.
pub use gmt_format::record::MAX_DATA_PAYLOAD;

/// RECORD-side half of the Pin Store: hands out the next sequential index
/// per key. The caller is responsible for emitting the `PIN` record.
#[derive(Debug, Clone, Default)]
pub struct PinRecorder {
    counters: SequentialCounters,
}

impl PinRecorder {
    /// A fresh recorder, all keys starting at index 0.
    pub fn new() -> PinRecorder {
        PinRecorder::default()
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

/// REPLAY-side half of the Pin Store: looks up the decoded entry for
/// `(key, next_index(key))` and overwrites the caller's buffer.
#[derive(Debug, Clone, Default)]
pub struct PinReplayer {
    counters: SequentialCounters,
    entries: BTreeMap<(u32, u32), VecDeque<ByteVec>>,
}

impl PinReplayer {
    /// Build a replayer from the decoded PIN records of a test file.
    ///
    /// The same `(key, index)` tuple can legitimately recur once per frame
    /// (the per-key counter resets on `Update`/`Reset`), so entries queue up
    /// per tuple in file order and are consumed FIFO rather than overwritten.
    pub fn new(pins: Vec<(u32, u32, ByteVec)>) -> PinReplayer {
        let mut entries: BTreeMap<(u32, u32), VecDeque<ByteVec>> = BTreeMap::new();
        for (key, index, payload) in pins {
            entries.entry((key, index)).or_default().push_back(payload);
        }
        PinReplayer {
            counters: SequentialCounters::new(),
            entries,
        }
    }

    /// Reset per-key counters, as `Update`/`Reset` require. The decoded
    /// entries themselves are untouched.
    pub fn reset_counters(&mut self) {
        self.counters.reset();
    }

    /// Overwrite `out` with the recorded bytes for the next call with
    /// `key`.
    ///
    /// If no matching entry exists, or its length doesn't match `out`,
    /// `out` is left unchanged and a warning is logged (SPEC_FULL.md
    /// §4.5); this is not an assertion failure.
    pub fn pin(&mut self, key: u32, out: &mut [u8]) -> bool {
        let index = self.counters.next(key);
        let payload = self
            .entries
            .get_mut(&(key, index))
            .and_then(VecDeque::pop_front);
        match payload {
            Some(payload) if payload.len() == out.len() => {
                out.copy_from_slice(&payload);
                true
            }
            Some(_) => {
                log::warn!("PIN size mismatch for key {key} index {index}");
                false
            }
            None => {
                log::warn!("PIN missing for key {key} index {index}");
                false
            }
        }
    }

    /// Typed adapter: overwrite `value` with the recorded `i32`.
    pub fn pin_i32(&mut self, key: u32, value: &mut i32) {
        let mut bytes = value.to_le_bytes();
        if self.pin(key, &mut bytes) {
            *value = i32::from_le_bytes(bytes);
        }
    }

    /// Typed adapter: overwrite `value` with the recorded `u32`.
    pub fn pin_u32(&mut self, key: u32, value: &mut u32) {
        let mut bytes = value.to_le_bytes();
        if self.pin(key, &mut bytes) {
            *value = u32::from_le_bytes(bytes);
        }
    }

    /// Typed adapter: overwrite `value` with the recorded `f32`.
    pub fn pin_f32(&mut self, key: u32, value: &mut f32) {
        let mut bytes = value.to_le_bytes();
        if self.pin(key, &mut bytes) {
            *value = f32::from_le_bytes(bytes);
        }
    }

    /// Typed adapter: overwrite `value` with the recorded `f64`.
    pub fn pin_f64(&mut self, key: u32, value: &mut f64) {
        let mut bytes = value.to_le_bytes();
        if self.pin(key, &mut bytes) {
            *value = f64::from_le_bytes(bytes);
        }
    }

    /// Typed adapter: overwrite `value` with the recorded `bool`.
    pub fn pin_bool(&mut self, key: u32, value: &mut bool) {
        let mut bytes = [*value as u8];
        if self.pin(key, &mut bytes) {
            *value = bytes[0] != 0;
        }
    }
}

/// RECORD-side helper: emit `PIN { key, index, payload }` with the proper
/// sequential index, dropping payloads over [`MAX_DATA_PAYLOAD`].
pub fn record_pin(
    recorder: &mut PinRecorder,
    key: u32,
    payload: &[u8],
) -> Option<gmt_format::record::Record> {
    if payload.len() > MAX_DATA_PAYLOAD {
        log::error!("PIN payload for key {key} exceeds MAX_DATA_PAYLOAD");
        return None;
    }
    let sequential_index = recorder.next_index(key);
    let mut bytes = ByteVec::new();
    bytes.extend_from_slice(payload);
    Some(gmt_format::record::Record::Pin {
        key,
        sequential_index,
        payload: bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8]) -> ByteVec {
        let mut v = ByteVec::new();
        v.extend_from_slice(bytes);
        v
    }

    #[test]
    fn replays_recorded_sequence_in_order() {
        let pins = alloc::vec![
            (1u32, 0u32, payload(&10i32.to_le_bytes())),
            (1u32, 1u32, payload(&20i32.to_le_bytes())),
        ];
        let mut replayer = PinReplayer::new(pins);
        let mut x = 0i32;
        replayer.pin_i32(1, &mut x);
        assert_eq!(x, 10);
        replayer.pin_i32(1, &mut x);
        assert_eq!(x, 20);
    }

    #[test]
    fn missing_entry_leaves_value_unchanged() {
        let mut replayer = PinReplayer::new(Vec::new());
        let mut x = 42i32;
        replayer.pin_i32(1, &mut x);
        assert_eq!(x, 42);
    }

    #[test]
    fn size_mismatch_leaves_value_unchanged() {
        let pins = alloc::vec![(1u32, 0u32, payload(&[1, 2, 3]))];
        let mut replayer = PinReplayer::new(pins);
        let mut x = 42i32;
        replayer.pin_i32(1, &mut x);
        assert_eq!(x, 42);
    }

    #[test]
    fn oversized_payload_is_not_recorded() {
        let mut recorder = PinRecorder::new();
        let big = alloc::vec![0u8; MAX_DATA_PAYLOAD + 1];
        assert!(record_pin(&mut recorder, 1, &big).is_none());
    }

    #[test]
    fn frame_boundary_resets_counters() {
        let mut recorder = PinRecorder::new();
        assert_eq!(recorder.next_index(1), 0);
        recorder.reset();
        assert_eq!(recorder.next_index(1), 0);
    }

    /// A single call site hashes to the same key on every call; five calls
    /// per frame across two frames produce ten sequential entries, and
    /// REPLAY hands them back in the same order.
    #[test]
    fn auto_key_in_a_five_iteration_loop_replays_in_order() {
        const CALL_SITE_KEY: u32 = 0xC0FFEE;

        let mut recorder = PinRecorder::new();
        let mut pins = Vec::new();
        for frame in 0..2i32 {
            for iteration in 0..5i32 {
                let value = frame * 10 + iteration;
                let index = recorder.next_index(CALL_SITE_KEY);
                pins.push((CALL_SITE_KEY, index, payload(&value.to_le_bytes())));
            }
            recorder.reset();
        }
        assert_eq!(pins.len(), 10);

        let mut replayer = PinReplayer::new(pins);
        let mut replayed = Vec::new();
        for _frame in 0..2 {
            for _iteration in 0..5 {
                let mut x = 0i32;
                replayer.pin_i32(CALL_SITE_KEY, &mut x);
                replayed.push(x);
            }
            replayer.reset_counters();
        }
        assert_eq!(replayed, alloc::vec![0, 1, 2, 3, 4, 10, 11, 12, 13, 14]);
    }
}
