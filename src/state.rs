// src/state.rs - Alarm event states and the transition function
//
// An alarm event carries two independent flags, "condition active" and
// "operator acknowledged". The four combinations map onto the states below.
// Every mutation of an event goes through `transition`, which returns the
// ordered list of states the event passes through so that callers can keep
// the per-state counters in step with each intermediate hop.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived state of a single alarm event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmEventState {
    /// Condition active, not acknowledged
    Active,
    /// Condition active and acknowledged
    Acknowledge,
    /// Condition gone, not acknowledged
    Inactive,
    /// Condition gone and acknowledged (fully resolved)
    Normal,
}

impl AlarmEventState {
    /// All states, in eviction order (weakest first)
    pub const ALL: [AlarmEventState; 4] = [
        AlarmEventState::Normal,
        AlarmEventState::Inactive,
        AlarmEventState::Acknowledge,
        AlarmEventState::Active,
    ];

    /// Map the `(is_active, is_acknowledged)` pair onto a state
    pub fn from_flags(is_active: bool, is_acknowledged: bool) -> Self {
        match (is_active, is_acknowledged) {
            (true, false) => AlarmEventState::Active,
            (true, true) => AlarmEventState::Acknowledge,
            (false, false) => AlarmEventState::Inactive,
            (false, true) => AlarmEventState::Normal,
        }
    }

    /// Whether the alarm condition is currently true
    pub fn is_active(&self) -> bool {
        matches!(self, AlarmEventState::Active | AlarmEventState::Acknowledge)
    }

    /// Whether an operator has acknowledged the event
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, AlarmEventState::Acknowledge | AlarmEventState::Normal)
    }

    /// Eviction tier. Lower ranks are evicted first.
    pub fn eviction_rank(&self) -> u8 {
        match self {
            AlarmEventState::Normal => 0,
            AlarmEventState::Inactive => 1,
            AlarmEventState::Acknowledge => 2,
            AlarmEventState::Active => 3,
        }
    }

    /// Index into per-state counter arrays
    pub(crate) fn index(&self) -> usize {
        self.eviction_rank() as usize
    }
}

impl fmt::Display for AlarmEventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlarmEventState::Active => "Active",
            AlarmEventState::Acknowledge => "Acknowledge",
            AlarmEventState::Inactive => "Inactive",
            AlarmEventState::Normal => "Normal",
        };
        f.write_str(name)
    }
}

/// Inputs accepted by the event state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmInput {
    /// The alarm condition went away
    Off {
        /// When false, going off also acknowledges the event
        acknowledge_required: bool,
    },
    /// An operator acknowledged the event
    Acknowledge,
    /// The condition came back while the event is still open
    Reactivate,
}

/// Compute the states an event passes through when `input` is applied in
/// `state`. The starting state is not included; an empty list is a no-op.
///
/// ```rust
/// use alarm_core::state::{transition, AlarmEventState, AlarmInput};
///
/// let path = transition(AlarmEventState::Inactive, AlarmInput::Acknowledge);
/// assert_eq!(path, vec![AlarmEventState::Acknowledge, AlarmEventState::Normal]);
/// ```
pub fn transition(state: AlarmEventState, input: AlarmInput) -> Vec<AlarmEventState> {
    use AlarmEventState::*;

    match (state, input) {
        (Active, AlarmInput::Off { acknowledge_required: true }) => vec![Inactive],
        (Active, AlarmInput::Off { acknowledge_required: false }) => vec![Inactive, Normal],
        (Acknowledge, AlarmInput::Off { .. }) => vec![Inactive, Normal],
        (Inactive | Normal, AlarmInput::Off { .. }) => Vec::new(),

        (Active, AlarmInput::Acknowledge) => vec![Acknowledge],
        (Inactive, AlarmInput::Acknowledge) => vec![Acknowledge, Normal],
        (Acknowledge | Normal, AlarmInput::Acknowledge) => Vec::new(),

        (Inactive, AlarmInput::Reactivate) => vec![Active],
        (Active | Acknowledge | Normal, AlarmInput::Reactivate) => Vec::new(),
    }
}
