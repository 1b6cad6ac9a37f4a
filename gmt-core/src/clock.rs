//! The replay clock and the Sync Signal gate.

/// `replay_time = now() - record_start_time - replay_time_offset`.
///
/// On `Init`/`Reset`, `record_start_time = now()` and `replay_time_offset =
/// 0`; the offset accumulates the time spent blocked on a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayClock {
    record_start_time: f64,
    replay_time_offset: f64,
    waiting_for_signal: bool,
    waiting_signal_id: i32,
    signal_wait_start: f64,
}

impl ReplayClock {
    /// Start a clock as of `now`.
    pub fn new(now: f64) -> ReplayClock {
        ReplayClock {
            record_start_time: now,
            replay_time_offset: 0.0,
            waiting_for_signal: false,
            waiting_signal_id: 0,
            signal_wait_start: 0.0,
        }
    }

    /// Restart the clock, as `Reset` requires.
    pub fn reset(&mut self, now: f64) {
        *self = ReplayClock::new(now);
    }

    /// The current replay-time value.
    pub fn replay_time(&self, now: f64) -> f64 {
        now - self.record_start_time - self.replay_time_offset
    }

    /// Whether injection is currently blocked on a signal.
    pub fn is_waiting_for_signal(&self) -> bool {
        self.waiting_for_signal
    }
}

/// Outcome of delivering a `SyncSignal` call to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// No signals remain in the file; the call was ignored.
    NoSignalsRemain,
    /// The id didn't match the next expected signal; cursor unchanged,
    /// gate unchanged.
    OrderMismatch,
    /// The cursor advanced and, if the engine was waiting, it unblocked.
    Advanced,
}

/// Gates FRAME injection on recorded SIGNAL checkpoints.
///
/// Grounded in the Clock & Signal Engine contract (SPEC_FULL.md §4.3): the
/// gate owns the decoded signal list and its cursor; `ReplayClock` owns the
/// wall-clock bookkeeping. They're threaded together rather than merged so
/// RECORD mode (which never gates) can use `ReplayClock` alone.
#[derive(Debug, Clone, Default)]
pub struct SignalGate {
    signals: alloc::vec::Vec<(f64, i32)>,
    cursor: usize,
}

impl SignalGate {
    /// Build a gate from the decoded SIGNAL records of a test file.
    pub fn new(signals: alloc::vec::Vec<(f64, i32)>) -> SignalGate {
        SignalGate { signals, cursor: 0 }
    }

    /// How many signals have been consumed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rewind to the start of the signal list, as `Reset` requires.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Check whether injection should block before this Update's inject
    /// loop runs. If it newly blocks, records the wait start on `clock`.
    ///
    /// Returns `true` if injection is (now, or still) gated.
    pub fn update_gate(&mut self, clock: &mut ReplayClock, now: f64) -> bool {
        if clock.waiting_for_signal {
            return true;
        }
        let Some(&(timestamp, signal_id)) = self.signals.get(self.cursor) else {
            return false;
        };
        if timestamp <= clock.replay_time(now) {
            clock.waiting_for_signal = true;
            clock.waiting_signal_id = signal_id;
            clock.signal_wait_start = now;
            true
        } else {
            false
        }
    }

    /// Deliver a `SyncSignal(id)` call from the host.
    pub fn sync_signal(&mut self, id: i32, clock: &mut ReplayClock, now: f64) -> SignalOutcome {
        let Some(&(timestamp, expected_id)) = self.signals.get(self.cursor) else {
            log::warn!("SyncSignal({id}) received but no signals remain in the test file");
            return SignalOutcome::NoSignalsRemain;
        };
        if expected_id != id {
            log::warn!("signal {id} does not match expected {expected_id}");
            return SignalOutcome::OrderMismatch;
        }

        if clock.waiting_for_signal && clock.waiting_signal_id == id {
            // Late: the host called SyncSignal after replay_time caught up
            // to this signal. Credit the time spent waiting.
            clock.replay_time_offset += now - clock.signal_wait_start;
            clock.waiting_for_signal = false;
        } else {
            // Early: the host called SyncSignal before replay_time reached
            // this signal's timestamp. Align the offset so replay_time
            // equals the signal's timestamp from this point forward.
            clock.replay_time_offset = now - clock.record_start_time - timestamp;
        }

        self.cursor += 1;
        SignalOutcome::Advanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocks_when_signal_timestamp_is_due() {
        let mut clock = ReplayClock::new(0.0);
        let mut gate = SignalGate::new(alloc::vec![(0.2, 7)]);
        assert!(!gate.update_gate(&mut clock, 0.1));
        assert!(gate.update_gate(&mut clock, 0.25));
        assert!(clock.is_waiting_for_signal());
    }

    #[test]
    fn late_signal_credits_wait_time() {
        let mut clock = ReplayClock::new(0.0);
        let mut gate = SignalGate::new(alloc::vec![(0.2, 7)]);
        gate.update_gate(&mut clock, 0.2);
        assert_eq!(
            gate.sync_signal(7, &mut clock, 2.0),
            SignalOutcome::Advanced
        );
        assert!(!clock.is_waiting_for_signal());
        assert_eq!(clock.replay_time_offset, 1.8);
        assert_eq!(gate.cursor(), 1);
    }

    #[test]
    fn early_signal_aligns_clock_to_its_timestamp() {
        let mut clock = ReplayClock::new(0.0);
        let mut gate = SignalGate::new(alloc::vec![(0.2, 7)]);
        // Host fires the signal at wall clock 0.05s, well before replay_time
        // would reach 0.2s.
        gate.sync_signal(7, &mut clock, 0.05);
        assert_eq!(clock.replay_time(0.05), 0.2);
    }

    #[test]
    fn order_mismatch_does_not_advance_or_unblock() {
        let mut clock = ReplayClock::new(0.0);
        let mut gate = SignalGate::new(alloc::vec![(0.1, 7), (0.2, 8)]);
        assert_eq!(
            gate.sync_signal(8, &mut clock, 0.1),
            SignalOutcome::OrderMismatch
        );
        assert_eq!(gate.cursor(), 0);
        assert_eq!(
            gate.sync_signal(7, &mut clock, 0.1),
            SignalOutcome::Advanced
        );
        assert_eq!(gate.cursor(), 1);
    }

    #[test]
    fn no_signals_remain_is_ignored() {
        let mut clock = ReplayClock::new(0.0);
        let mut gate = SignalGate::new(alloc::vec![]);
        assert_eq!(
            gate.sync_signal(1, &mut clock, 0.0),
            SignalOutcome::NoSignalsRemain
        );
    }
}
