//! Per-key sequential counters shared by the Pin and Track stores.

use alloc::collections::BTreeMap;

/// Assigns each call with a given key the next sequential index for that
/// key, starting at 0. Reset at every frame boundary (`Update`) and by
/// `Reset`.
#[derive(Debug, Clone, Default)]
pub struct SequentialCounters(BTreeMap<u32, u32>);

impl SequentialCounters {
    /// A fresh counter set, all keys starting at 0.
    pub fn new() -> SequentialCounters {
        SequentialCounters::default()
    }

    /// Return the next index for `key` and advance its counter.
    pub fn next(&mut self, key: u32) -> u32 {
        let counter = self.0.entry(key).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    /// Reset every key's counter to 0.
    pub fn reset(&mut self) {
        self.0.clear();
    }
}
