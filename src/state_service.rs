// src/state_service.rs - Per-state event counters
use crate::state::AlarmEventState;
use serde::Serialize;
use tracing::error;

/// Counts retained events per state.
///
/// Each [`AlarmServer`](crate::AlarmServer) owns one instance. Every event
/// insertion registers its state, every removal unregisters it, and every
/// transition step is an unregister of the old state followed by a register of
/// the new one, so the counters always sum to the number of retained events.
#[derive(Debug, Default, Clone)]
pub struct AlarmServerStateService {
    counts: [usize; 4],
}

/// Snapshot of the counters, one field per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub active: usize,
    pub acknowledge: usize,
    pub inactive: usize,
    pub normal: usize,
}

impl StateCounts {
    /// Sum over all states
    pub fn total(&self) -> usize {
        self.active + self.acknowledge + self.inactive + self.normal
    }
}

impl AlarmServerStateService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_alarm_event_state(&mut self, state: AlarmEventState) {
        self.counts[state.index()] += 1;
    }

    /// Decrement the counter for `state`.
    ///
    /// Unregistering a state with a zero count means a register/unregister
    /// pair went missing. Debug builds panic; release builds clamp and log.
    pub fn unregister_alarm_event_state(&mut self, state: AlarmEventState) {
        let slot = &mut self.counts[state.index()];
        debug_assert!(*slot > 0, "unregistering {} with zero count", state);
        if *slot == 0 {
            error!("Alarm state registry underflow for state {}", state);
            return;
        }
        *slot -= 1;
    }

    /// Number of events currently in `state`
    pub fn count(&self, state: AlarmEventState) -> usize {
        self.counts[state.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn snapshot(&self) -> StateCounts {
        StateCounts {
            active: self.count(AlarmEventState::Active),
            acknowledge: self.count(AlarmEventState::Acknowledge),
            inactive: self.count(AlarmEventState::Inactive),
            normal: self.count(AlarmEventState::Normal),
        }
    }
}
