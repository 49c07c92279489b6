// src/server.rs - Alarm server: bounded event list, eviction and aggregate status
//
// All mutable state lives in `ServerInner` behind one mutex. Public operations
// lock it once, perform the whole mutation (including insert + evict and every
// registry update), queue the resulting notifications, release the lock and
// then dispatch the notifications on the calling thread.
//
// Mutating calls first take the re-entrant dispatch guard and hold it until
// their notifications are delivered, so batches reach observers in the order
// the mutations happened. Lock order is dispatch guard, then engine lock;
// queries only take the engine lock and stay usable from inside handlers.

use crate::config::{GroupConfig, ServerConfig, StoreType};
use crate::error::{AlarmError, Result};
use crate::event::{AlarmEvent, StateStep};
use crate::group::AlarmGroup;
use crate::item::{Activation, AlarmItem, ConditionEdge};
use crate::notify::{AlarmNotification, NotificationHandler, Notifier, Pending, SubscriptionId};
use crate::state::AlarmEventState;
use crate::state_service::{AlarmServerStateService, StateCounts};
use crate::value::Value;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on the up-front reservation of the event list
const MAX_RESERVED_EVENTS: usize = 4096;

/// Last published values of the aggregate flags
#[derive(Debug, Default, Clone, Copy)]
struct AnyFlags {
    active: bool,
    acknowledged: bool,
    inactive: bool,
}

struct ServerInner {
    capacity: usize,
    store_type: StoreType,
    enable_sending: bool,
    enabled: bool,
    groups: Vec<AlarmGroup>,
    events: Vec<AlarmEvent>,
    states: AlarmServerStateService,
    published: AnyFlags,
    pending: Vec<Pending>,
}

/// Alarm server handle.
///
/// Cloning is cheap; clones share the same event list, counters and observers.
///
/// # Examples
///
/// ```rust
/// use alarm_core::{AlarmServer, GroupConfig, ItemConfig, ServerConfig};
///
/// let config = ServerConfig {
///     max_number_of_alarms: 100,
///     groups: vec![GroupConfig::new("Boiler").with_item(ItemConfig::new("Flame out"))],
///     ..ServerConfig::default()
/// };
/// let server = AlarmServer::new(config)?;
///
/// server.activate_item("Boiler", "Flame out")?;
/// assert!(server.is_any_active());
///
/// server.acknowledge("operator");
/// server.deactivate_item("Boiler", "Flame out")?;
/// assert_eq!(server.clear_normal_alarms(), 1);
/// assert_eq!(server.event_count(), 0);
/// # Ok::<(), alarm_core::AlarmError>(())
/// ```
#[derive(Clone)]
pub struct AlarmServer {
    inner: Arc<Mutex<ServerInner>>,
    dispatch: Arc<ReentrantMutex<()>>,
    notifier: Arc<Notifier>,
}

impl AlarmServer {
    /// Build a server from validated configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.capacity();
        let reserve = capacity
            .saturating_mul(config.minimum_items_multiplier as usize)
            .min(MAX_RESERVED_EVENTS);

        let groups = config
            .groups
            .into_iter()
            .map(AlarmGroup::from_config)
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Alarm server created with {} groups, capacity {}",
            groups.len(),
            if capacity == 0 { "unbounded".to_string() } else { capacity.to_string() }
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(ServerInner {
                capacity,
                store_type: config.store_type,
                enable_sending: config.enable_sending_to_alarm_distributor_server,
                enabled: config.enabled,
                groups,
                events: Vec::with_capacity(reserve),
                states: AlarmServerStateService::new(),
                published: AnyFlags::default(),
                pending: Vec::new(),
            })),
            dispatch: Arc::new(ReentrantMutex::new(())),
            notifier: Arc::new(Notifier::new()),
        })
    }

    /// Run `f` under the engine lock, then publish flag changes and dispatch
    /// everything queued once the lock is released. The dispatch guard is held
    /// across both steps.
    fn with_inner<T>(&self, f: impl FnOnce(&mut ServerInner) -> Result<T>) -> Result<T> {
        let _dispatch = self.dispatch.lock();
        let (result, pending) = {
            let mut inner = self.inner.lock();
            let result = f(&mut *inner);
            inner.refresh_flags();
            (result, std::mem::take(&mut inner.pending))
        };
        self.notifier.dispatch(pending);
        result
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Add a group at runtime
    pub fn add_group(&self, config: GroupConfig) -> Result<()> {
        let group = AlarmGroup::from_config(config)?;
        self.with_inner(|inner| {
            if inner.groups.iter().any(|g| g.name() == group.name()) {
                return Err(AlarmError::Config(format!(
                    "Duplicate alarm group '{}'",
                    group.name()
                )));
            }
            info!("Added alarm group '{}' with {} items", group.name(), group.items().len());
            inner.groups.push(group);
            Ok(())
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// Disabling stops new event creation; existing events are left alone
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().enabled = enabled;
        info!("Alarm server {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn set_group_enabled(&self, group: &str, enabled: bool) -> Result<()> {
        self.with_inner(|inner| {
            let g = inner.group_index(group)?;
            inner.groups[g].set_enabled(enabled);
            Ok(())
        })
    }

    pub fn set_item_enabled(&self, group: &str, item: &str, enabled: bool) -> Result<()> {
        self.with_inner(|inner| {
            let (g, i) = inner.item_index(group, item)?;
            inner.groups[g].items_mut()[i].set_enabled(enabled);
            Ok(())
        })
    }

    /// Capacity of the event list, 0 meaning unbounded
    pub fn max_number_of_alarms(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn store_type(&self) -> StoreType {
        self.inner.lock().store_type
    }

    /// Snapshot of a group and its items
    pub fn group(&self, name: &str) -> Option<AlarmGroup> {
        self.inner.lock().groups.iter().find(|g| g.name() == name).cloned()
    }

    /// Snapshot of a single item
    pub fn item(&self, group: &str, item: &str) -> Result<AlarmItem> {
        let inner = self.inner.lock();
        let (g, i) = inner.item_index(group, item)?;
        Ok(inner.groups[g].items()[i].clone())
    }

    // ------------------------------------------------------------------
    // Inbound condition changes
    // ------------------------------------------------------------------

    /// Assign a new process value to an item and act on the resulting edge
    pub fn set_item_value(&self, group: &str, item: &str, value: Value) -> Result<()> {
        self.with_inner(|inner| {
            let (g, i) = inner.item_index(group, item)?;
            let active = inner.groups[g].items()[i].evaluate(&value)?;
            debug!(
                "'{}/{}' value {} {} trigger -> {}",
                group,
                item,
                value,
                inner.groups[g].items()[i].comparer(),
                active
            );
            inner.groups[g].items_mut()[i].record_value(value);
            inner.deliver(g, i, active, Utc::now());
            Ok(())
        })
    }

    /// Deliver an evaluated condition for an item
    pub fn set_item_condition(&self, group: &str, item: &str, active: bool) -> Result<()> {
        self.with_inner(|inner| {
            let (g, i) = inner.item_index(group, item)?;
            inner.deliver(g, i, active, Utc::now());
            Ok(())
        })
    }

    pub fn activate_item(&self, group: &str, item: &str) -> Result<()> {
        self.set_item_condition(group, item, true)
    }

    pub fn deactivate_item(&self, group: &str, item: &str) -> Result<()> {
        self.set_item_condition(group, item, false)
    }

    // ------------------------------------------------------------------
    // Event operations
    // ------------------------------------------------------------------

    /// Acknowledge one event. `Ok(false)` when it was already acknowledged.
    pub fn acknowledge_event(&self, id: Uuid, user: &str) -> Result<bool> {
        self.with_inner(|inner| {
            let idx = inner.event_index(id)?;
            Ok(inner.acknowledge_index(idx, user, Utc::now()))
        })
    }

    /// Acknowledge the open event of an item, if it has one
    pub fn acknowledge_item(&self, group: &str, item: &str, user: &str) -> Result<bool> {
        self.with_inner(|inner| {
            let (g, i) = inner.item_index(group, item)?;
            let Some(id) = inner.groups[g].items()[i].open_event() else {
                return Ok(false);
            };
            let idx = inner.event_index(id)?;
            Ok(inner.acknowledge_index(idx, user, Utc::now()))
        })
    }

    /// Turn one event off. `Ok(false)` when it was already off.
    pub fn alarm_off_event(&self, id: Uuid) -> Result<bool> {
        self.with_inner(|inner| {
            let idx = inner.event_index(id)?;
            Ok(inner.alarm_off_index(idx, Utc::now()))
        })
    }

    /// Acknowledge every currently Active event. Returns how many changed.
    pub fn acknowledge(&self, user: &str) -> usize {
        let result = self.with_inner(|inner| {
            let now = Utc::now();
            let targets: Vec<Uuid> = inner
                .events
                .iter()
                .filter(|e| e.state() == AlarmEventState::Active)
                .map(|e| e.id)
                .collect();

            let mut acknowledged = 0;
            for id in targets {
                if let Ok(idx) = inner.event_index(id) {
                    if inner.acknowledge_index(idx, user, now) {
                        acknowledged += 1;
                    }
                }
            }
            if acknowledged > 0 {
                info!("{} acknowledged {} alarm events", user, acknowledged);
            }
            Ok(acknowledged)
        });
        result.unwrap_or(0)
    }

    /// Remove every Normal event. Returns how many were removed.
    pub fn clear_normal_alarms(&self) -> usize {
        let result = self.with_inner(|inner| {
            let normal: Vec<Uuid> = inner
                .events
                .iter()
                .filter(|e| e.state() == AlarmEventState::Normal)
                .map(|e| e.id)
                .collect();

            for id in &normal {
                if let Ok(idx) = inner.event_index(*id) {
                    inner.remove_at(idx);
                }
            }
            if !normal.is_empty() {
                info!("Cleared {} normal alarm events", normal.len());
                inner.pending.push(Pending::Server(AlarmNotification::AlarmDeleted));
            }
            Ok(normal.len())
        });
        result.unwrap_or(0)
    }

    /// Explicitly delete one event
    pub fn delete_event(&self, id: Uuid) -> Result<AlarmEvent> {
        self.with_inner(|inner| {
            let idx = inner.event_index(id)?;
            let event = inner.remove_at(idx);
            info!("Deleted alarm event {} ({})", event.id, event.item_name);
            inner.pending.push(Pending::Server(AlarmNotification::AlarmDeleted));
            Ok(event)
        })
    }

    /// Seed the server with persisted events.
    ///
    /// Events may be in any state. Each is inserted under the normal capacity
    /// rule, and an event that is still open is re-attached to its item.
    /// Returns the number of events inserted.
    pub fn restore(&self, events: Vec<AlarmEvent>) -> usize {
        let result = self.with_inner(|inner| {
            let mut restored = 0;
            for event in events {
                if inner.events.iter().any(|e| e.id == event.id) {
                    warn!("Skipping restore of duplicate alarm event {}", event.id);
                    continue;
                }
                let id = event.id;
                let open = event.state() != AlarmEventState::Normal;
                inner.insert_event(event);
                restored += 1;

                // Only link events that survived the capacity rule
                if open {
                    if let Ok(idx) = inner.event_index(id) {
                        let event = inner.events[idx].clone();
                        inner.attach_restored(&event);
                    }
                }
            }
            info!("Restored {} alarm events", restored);
            Ok(restored)
        });
        result.unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot of all retained events in insertion order
    pub fn event_list(&self) -> Vec<AlarmEvent> {
        self.inner.lock().events.clone()
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn event(&self, id: Uuid) -> Option<AlarmEvent> {
        self.inner.lock().events.iter().find(|e| e.id == id).cloned()
    }

    pub fn is_any_active(&self) -> bool {
        self.inner.lock().states.count(AlarmEventState::Active) > 0
    }

    pub fn is_any_acknowledged(&self) -> bool {
        self.inner.lock().states.count(AlarmEventState::Acknowledge) > 0
    }

    pub fn is_any_inactive(&self) -> bool {
        self.inner.lock().states.count(AlarmEventState::Inactive) > 0
    }

    /// Events in the Acknowledge state (Normal events are not counted)
    pub fn number_of_acknowledged_alarms(&self) -> usize {
        self.inner.lock().states.count(AlarmEventState::Acknowledge)
    }

    /// Events of `item_id` that have never been acknowledged
    pub fn get_unacknowledged_alarm_events(&self, item_id: Uuid) -> Vec<AlarmEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.item_id == item_id && e.acknowledge_time.is_none())
            .cloned()
            .collect()
    }

    pub fn state_counts(&self) -> StateCounts {
        self.inner.lock().states.snapshot()
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn subscribe(&self, handler: NotificationHandler) -> SubscriptionId {
        self.notifier.server().subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.server().unsubscribe(id)
    }

    /// Observe `AlarmAcknowledge` notifications for one group's events
    pub fn subscribe_group(&self, group: &str, handler: NotificationHandler) -> Result<SubscriptionId> {
        self.inner.lock().group_index(group)?;
        Ok(self.notifier.group(group).subscribe(handler))
    }

    pub fn unsubscribe_group(&self, group: &str, id: SubscriptionId) -> bool {
        self.notifier.group(group).unsubscribe(id)
    }

    /// Receiver for server-level notifications, for async consumers
    pub fn notifications(&self) -> broadcast::Receiver<AlarmNotification> {
        self.notifier.receiver()
    }
}

impl std::fmt::Debug for AlarmServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AlarmServer")
            .field("capacity", &inner.capacity)
            .field("enabled", &inner.enabled)
            .field("groups", &inner.groups.len())
            .field("events", &inner.events.len())
            .finish()
    }
}

impl ServerInner {
    fn group_index(&self, name: &str) -> Result<usize> {
        self.groups
            .iter()
            .position(|g| g.name() == name)
            .ok_or_else(|| AlarmError::GroupNotFound(name.to_string()))
    }

    fn item_index(&self, group: &str, item: &str) -> Result<(usize, usize)> {
        let g = self.group_index(group)?;
        let i = self.groups[g].item_index(item)?;
        Ok((g, i))
    }

    fn event_index(&self, id: Uuid) -> Result<usize> {
        self.events
            .iter()
            .position(|e| e.id == id)
            .ok_or(AlarmError::EventNotFound(id))
    }

    /// Route a condition to the item, honoring the enable gates
    fn deliver(&mut self, g: usize, i: usize, active: bool, now: DateTime<Utc>) {
        let group = &self.groups[g];
        let item = &group.items()[i];
        if !self.enabled || !group.is_enabled() || !item.is_enabled() {
            debug!(
                "Suppressed condition {} for '{}/{}' (disabled)",
                active,
                group.name(),
                item.name()
            );
            return;
        }

        match self.groups[g].items_mut()[i].set_condition(active) {
            Some(ConditionEdge::Activated) => self.activate(g, i, now),
            Some(ConditionEdge::Deactivated) => {
                let open = self.groups[g].items()[i].open_event();
                if let Some(idx) = open.and_then(|id| self.event_index(id).ok()) {
                    self.alarm_off_index(idx, now);
                }
            }
            None => {}
        }
    }

    fn activate(&mut self, g: usize, i: usize, now: DateTime<Utc>) {
        let activation = self.groups[g].items()[i].activation();
        if let Activation::Repeat(id) = activation {
            if let Ok(idx) = self.event_index(id) {
                let steps = self.events[idx].reactivate(now, self.store_type);
                debug!(
                    "Repeat activation of '{}', count {}",
                    self.events[idx].item_name, self.events[idx].repeat_count
                );
                if !steps.is_empty() {
                    self.pending
                        .push(Pending::Server(AlarmNotification::AlarmActive { event_id: id }));
                    self.settle(idx, &steps);
                }
                return;
            }
        }

        let group = &self.groups[g];
        let item = &group.items()[i];
        let distribution = item.is_enable_distribution(self.enable_sending, group.enable_distribution());
        let event = AlarmEvent::new(item.event_source(group.name(), distribution), now);
        let id = event.id;
        info!("Alarm event {} raised for '{}/{}'", id, group.name(), item.name());

        self.groups[g].items_mut()[i].set_open_event(Some(id));
        self.pending
            .push(Pending::Server(AlarmNotification::AlarmActive { event_id: id }));
        self.insert_event(event);
    }

    fn acknowledge_index(&mut self, idx: usize, user: &str, now: DateTime<Utc>) -> bool {
        let steps = self.events[idx].acknowledge(user, now);
        if steps.is_empty() {
            return false;
        }
        let event_id = self.events[idx].id;
        let group = self.events[idx].group_name.clone();
        self.pending.push(Pending::Group(
            group,
            AlarmNotification::AlarmAcknowledge { event_id },
        ));
        self.pending
            .push(Pending::Server(AlarmNotification::AlarmAcknowledge { event_id }));
        self.settle(idx, &steps);
        true
    }

    fn alarm_off_index(&mut self, idx: usize, now: DateTime<Utc>) -> bool {
        let steps = self.events[idx].alarm_off(now);
        if steps.is_empty() {
            return false;
        }
        self.settle(idx, &steps);
        true
    }

    /// Mirror `steps` into the counters and handle arrival at Normal
    fn settle(&mut self, idx: usize, steps: &[StateStep]) {
        for step in steps {
            self.states.unregister_alarm_event_state(step.from);
            self.states.register_alarm_event_state(step.to);
        }

        if self.events[idx].state() != AlarmEventState::Normal {
            return;
        }
        let id = self.events[idx].id;
        self.detach(id);
        if !self.events[idx].history {
            let event = self.remove_at(idx);
            info!("Alarm event {} ({}) resolved without history, deleted", id, event.item_name);
            self.pending.push(Pending::Server(AlarmNotification::AlarmDeleted));
        }
    }

    /// Append an event, evicting one event if the list is over capacity
    fn insert_event(&mut self, event: AlarmEvent) {
        self.states.register_alarm_event_state(event.state());
        self.events.push(event);

        if self.capacity > 0 && self.events.len() > self.capacity {
            if let Some(idx) = self.eviction_candidate() {
                let evicted = self.remove_at(idx);
                info!(
                    "Evicted alarm event {} ({}) in state {} at capacity {}",
                    evicted.id,
                    evicted.item_name,
                    evicted.state(),
                    self.capacity
                );
                self.pending.push(Pending::Server(AlarmNotification::AlarmDeleted));
            }
        }
    }

    /// Weakest tier first, then earliest tier entry, then insertion order
    fn eviction_candidate(&self) -> Option<usize> {
        self.events
            .iter()
            .enumerate()
            .min_by_key(|(idx, e)| (e.state().eviction_rank(), e.tier_entered_at(), *idx))
            .map(|(idx, _)| idx)
    }

    fn remove_at(&mut self, idx: usize) -> AlarmEvent {
        let event = self.events.remove(idx);
        self.states.unregister_alarm_event_state(event.state());
        self.detach(event.id);
        event
    }

    /// Clear any item's reference to event `id`
    fn detach(&mut self, id: Uuid) {
        for group in &mut self.groups {
            for item in group.items_mut() {
                if item.open_event() == Some(id) {
                    item.set_open_event(None);
                }
            }
        }
    }

    fn attach_restored(&mut self, event: &AlarmEvent) {
        let Some(group) = self.groups.iter_mut().find(|g| g.name() == event.group_name) else {
            warn!(
                "Restored alarm event {} references unknown group '{}'",
                event.id, event.group_name
            );
            return;
        };
        if let Some(item) = group.item_by_id_mut(event.item_id) {
            if item.open_event().is_none() {
                item.set_open_event(Some(event.id));
                item.set_condition(event.is_active());
            }
        }
    }

    /// Publish the aggregate flags that changed since the last publication
    fn refresh_flags(&mut self) {
        let current = AnyFlags {
            active: self.states.count(AlarmEventState::Active) > 0,
            acknowledged: self.states.count(AlarmEventState::Acknowledge) > 0,
            inactive: self.states.count(AlarmEventState::Inactive) > 0,
        };
        if current.active != self.published.active {
            self.pending
                .push(Pending::Server(AlarmNotification::AnyActive(current.active)));
        }
        if current.acknowledged != self.published.acknowledged {
            self.pending
                .push(Pending::Server(AlarmNotification::AnyAcknowledged(current.acknowledged)));
        }
        if current.inactive != self.published.inactive {
            self.pending
                .push(Pending::Server(AlarmNotification::AnyInactive(current.inactive)));
        }
        self.published = current;
    }
}
