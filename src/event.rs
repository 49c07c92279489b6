// src/event.rs - A single alarm occurrence and its acknowledgment lifecycle
use crate::config::StoreType;
use crate::state::{transition, AlarmEventState, AlarmInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// User recorded when an event resolves without operator acknowledgment
pub const SYSTEM_USER: &str = "system";

/// One hop of a transition, `from` is unregistered before `to` is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateStep {
    pub from: AlarmEventState,
    pub to: AlarmEventState,
}

/// Alarm event: one occurrence of an alarm condition.
///
/// The state is never stored directly. It is derived from the `is_active` and
/// `is_acknowledged` flags, and those flags only change through
/// [`alarm_off`](Self::alarm_off), [`acknowledge`](Self::acknowledge) and
/// [`reactivate`](Self::reactivate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub group_name: String,
    pub message: String,
    #[serde(default)]
    pub priority: i32,

    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub active_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inactive_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub normal_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub acknowledge_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub acknowledge_user: Option<String>,

    /// Activations folded into this event after the first one
    #[serde(default)]
    pub repeat_count: u32,

    /// Copied from the item at creation
    #[serde(default = "default_true")]
    pub acknowledge_required: bool,
    /// Copied from the item at creation; false deletes the event on reaching Normal
    #[serde(default = "default_true")]
    pub history: bool,
    #[serde(default)]
    pub is_enable_alarm_distributor_server: bool,

    is_active: bool,
    is_acknowledged: bool,
}

fn default_true() -> bool {
    true
}

/// Identity and item flags shared by every event of an item
#[derive(Debug, Clone)]
pub struct EventSource {
    pub item_id: Uuid,
    pub item_name: String,
    pub group_name: String,
    pub message: String,
    pub priority: i32,
    pub acknowledge_required: bool,
    pub history: bool,
    pub distribution: bool,
}

impl AlarmEvent {
    /// Create a freshly activated event
    pub fn new(source: EventSource, now: DateTime<Utc>) -> Self {
        Self::with_state(source, AlarmEventState::Active, now)
    }

    /// Create an event already in `state`, e.g. when restoring persisted alarms.
    ///
    /// The timestamps belonging to `state` are set to `at`.
    pub fn with_state(source: EventSource, state: AlarmEventState, at: DateTime<Utc>) -> Self {
        let mut event = Self {
            id: Uuid::new_v4(),
            item_id: source.item_id,
            item_name: source.item_name,
            group_name: source.group_name,
            message: source.message,
            priority: source.priority,
            creation_time: at,
            active_time: Some(at),
            inactive_time: None,
            normal_time: None,
            acknowledge_time: None,
            acknowledge_user: None,
            repeat_count: 0,
            acknowledge_required: source.acknowledge_required,
            history: source.history,
            is_enable_alarm_distributor_server: source.distribution,
            is_active: state.is_active(),
            is_acknowledged: state.is_acknowledged(),
        };
        if !state.is_active() {
            event.inactive_time = Some(at);
        }
        if state.is_acknowledged() {
            event.acknowledge_time = Some(at);
        }
        if state == AlarmEventState::Normal {
            event.normal_time = Some(at);
        }
        event
    }

    pub fn state(&self) -> AlarmEventState {
        AlarmEventState::from_flags(self.is_active, self.is_acknowledged)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_acknowledged(&self) -> bool {
        self.is_acknowledged
    }

    /// Timestamp of the transition that put the event into its current tier.
    ///
    /// Restored events may lack the matching timestamp; creation time is used then.
    pub fn tier_entered_at(&self) -> DateTime<Utc> {
        let stamp = match self.state() {
            AlarmEventState::Normal => self.normal_time,
            AlarmEventState::Inactive => self.inactive_time,
            AlarmEventState::Acknowledge => self.acknowledge_time,
            AlarmEventState::Active => self.active_time,
        };
        stamp.unwrap_or(self.creation_time)
    }

    /// The alarm condition went away.
    ///
    /// Active goes to Inactive, or straight through to Normal when the item does
    /// not require acknowledgment. Acknowledge goes through Inactive to Normal.
    pub fn alarm_off(&mut self, now: DateTime<Utc>) -> Vec<StateStep> {
        let input = AlarmInput::Off {
            acknowledge_required: self.acknowledge_required,
        };
        self.apply(input, now, None, StoreType::StoreLast)
    }

    /// Operator acknowledgment. Returns no steps when already acknowledged.
    pub fn acknowledge(&mut self, user: &str, now: DateTime<Utc>) -> Vec<StateStep> {
        self.apply(AlarmInput::Acknowledge, now, Some(user), StoreType::StoreLast)
    }

    /// The condition came back while this event is still open.
    ///
    /// Bumps the repeat counter unless the event is already Normal. Under
    /// [`StoreType::StoreLast`] the active time moves to `now`.
    pub fn reactivate(&mut self, now: DateTime<Utc>, store_type: StoreType) -> Vec<StateStep> {
        if self.state() == AlarmEventState::Normal {
            return Vec::new();
        }
        self.repeat_count += 1;
        if self.is_active && store_type == StoreType::StoreLast {
            self.active_time = Some(now);
        }
        self.apply(AlarmInput::Reactivate, now, None, store_type)
    }

    fn apply(
        &mut self,
        input: AlarmInput,
        now: DateTime<Utc>,
        user: Option<&str>,
        store_type: StoreType,
    ) -> Vec<StateStep> {
        let mut from = self.state();
        let path = transition(from, input);
        let mut steps = Vec::with_capacity(path.len());

        for to in path {
            self.enter(to, now, user, store_type);
            debug!("Alarm event {} ({}): {} -> {}", self.id, self.item_name, from, to);
            steps.push(StateStep { from, to });
            from = to;
        }
        steps
    }

    fn enter(
        &mut self,
        to: AlarmEventState,
        now: DateTime<Utc>,
        user: Option<&str>,
        store_type: StoreType,
    ) {
        match to {
            AlarmEventState::Active => {
                if store_type == StoreType::StoreLast || self.active_time.is_none() {
                    self.active_time = Some(now);
                }
            }
            AlarmEventState::Acknowledge => {
                self.acknowledge_time = Some(now);
                self.acknowledge_user = user.map(str::to_string);
            }
            AlarmEventState::Inactive => {
                self.inactive_time = Some(now);
            }
            AlarmEventState::Normal => {
                if self.acknowledge_time.is_none() {
                    self.acknowledge_time = Some(now);
                    self.acknowledge_user = Some(SYSTEM_USER.to_string());
                }
                self.normal_time = Some(now);
            }
        }
        self.is_active = to.is_active();
        self.is_acknowledged = to.is_acknowledged();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use AlarmEventState::*;

    fn source(acknowledge_required: bool) -> EventSource {
        EventSource {
            item_id: Uuid::new_v4(),
            item_name: "TT-101".to_string(),
            group_name: "Reactor".to_string(),
            message: "Temperature high".to_string(),
            priority: 2,
            acknowledge_required,
            history: true,
            distribution: false,
        }
    }

    #[test]
    fn test_new_event_is_active() {
        let now = Utc::now();
        let event = AlarmEvent::new(source(true), now);
        assert_eq!(event.state(), Active);
        assert_eq!(event.active_time, Some(now));
        assert!(event.acknowledge_time.is_none());
    }

    #[test]
    fn test_acknowledge_then_off_resolves() {
        let t0 = Utc::now();
        let mut event = AlarmEvent::new(source(true), t0);

        let steps = event.acknowledge("operator", t0 + Duration::seconds(1));
        assert_eq!(steps, vec![StateStep { from: Active, to: Acknowledge }]);
        assert_eq!(event.acknowledge_user.as_deref(), Some("operator"));

        let steps = event.alarm_off(t0 + Duration::seconds(2));
        assert_eq!(
            steps,
            vec![
                StateStep { from: Acknowledge, to: Inactive },
                StateStep { from: Inactive, to: Normal },
            ]
        );
        assert_eq!(event.state(), Normal);
        assert_eq!(event.normal_time, Some(t0 + Duration::seconds(2)));
    }

    #[test]
    fn test_off_then_acknowledge_resolves() {
        let t0 = Utc::now();
        let mut event = AlarmEvent::new(source(true), t0);
        assert_eq!(event.alarm_off(t0).len(), 1);
        assert_eq!(event.state(), Inactive);

        let steps = event.acknowledge("operator", t0);
        assert_eq!(steps.len(), 2);
        assert_eq!(event.state(), Normal);
    }

    #[test]
    fn test_repeated_calls_are_idempotent() {
        let t0 = Utc::now();
        let mut event = AlarmEvent::new(source(true), t0);
        assert_eq!(event.acknowledge("a", t0).len(), 1);
        let snapshot = event.clone();
        assert!(event.acknowledge("b", t0 + Duration::seconds(5)).is_empty());
        assert_eq!(event, snapshot);

        assert_eq!(event.alarm_off(t0).len(), 2);
        let snapshot = event.clone();
        assert!(event.alarm_off(t0 + Duration::seconds(5)).is_empty());
        assert_eq!(event, snapshot);
    }

    #[test]
    fn test_off_without_acknowledge_required() {
        let t0 = Utc::now();
        let mut event = AlarmEvent::new(source(false), t0);
        let steps = event.alarm_off(t0);
        assert_eq!(steps.len(), 2);
        assert_eq!(event.state(), Normal);
        assert_eq!(event.acknowledge_time, Some(t0));
        assert_eq!(event.acknowledge_user.as_deref(), Some(SYSTEM_USER));
    }

    #[test]
    fn test_reactivate_store_first_keeps_active_time() {
        let t0 = Utc::now();
        let mut event = AlarmEvent::new(source(true), t0);
        event.alarm_off(t0 + Duration::seconds(1));

        let steps = event.reactivate(t0 + Duration::seconds(2), StoreType::StoreFirst);
        assert_eq!(steps, vec![StateStep { from: Inactive, to: Active }]);
        assert_eq!(event.active_time, Some(t0));
        assert_eq!(event.repeat_count, 1);
    }

    #[test]
    fn test_reactivate_store_last_refreshes_active_time() {
        let t0 = Utc::now();
        let t2 = t0 + Duration::seconds(2);
        let mut event = AlarmEvent::new(source(true), t0);
        event.alarm_off(t0 + Duration::seconds(1));
        event.reactivate(t2, StoreType::StoreLast);
        assert_eq!(event.active_time, Some(t2));
        assert_eq!(event.tier_entered_at(), t2);
    }

    #[test]
    fn test_with_state_sets_matching_timestamps() {
        let at = Utc::now();
        for state in AlarmEventState::ALL {
            let event = AlarmEvent::with_state(source(true), state, at);
            assert_eq!(event.state(), state);
            assert_eq!(event.tier_entered_at(), at);
        }
        let normal = AlarmEvent::with_state(source(true), Normal, at);
        assert!(normal.acknowledge_time.is_some());
        assert!(normal.inactive_time.is_some());
    }
}
