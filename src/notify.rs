// src/notify.rs - Outbound alarm notifications
//
// Handlers run synchronously on the thread that caused the notification, in the
// order the notifications were produced. The server collects notifications while
// it holds its lock and dispatches them once the lock is released, so handlers
// are free to query the server.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Capacity of the broadcast channel handed to async consumers
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// Notifications raised by the alarm server and its groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AlarmNotification {
    /// A new event was created, or an open event became active again
    AlarmActive { event_id: Uuid },
    /// An acknowledge call changed an event's state
    AlarmAcknowledge { event_id: Uuid },
    /// One or more events were removed from the event list
    AlarmDeleted,
    AnyActive(bool),
    AnyAcknowledged(bool),
    AnyInactive(bool),
}

/// Callback registered with [`AlarmServer::subscribe`](crate::AlarmServer::subscribe)
pub type NotificationHandler = Arc<dyn Fn(&AlarmNotification) + Send + Sync>;

/// Handle returned by subscribe calls, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of handlers
#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, NotificationHandler)>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: NotificationHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, handler));
        id
    }

    /// Returns false when `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every handler with `notification`.
    ///
    /// The handler list is copied first so handlers may (un)subscribe.
    pub fn notify(&self, notification: &AlarmNotification) {
        let handlers: Vec<NotificationHandler> =
            self.handlers.read().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler(notification);
        }
    }
}

/// Where a pending notification goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pending {
    Server(AlarmNotification),
    Group(String, AlarmNotification),
}

/// Server observers, per-group observers and the broadcast channel
pub(crate) struct Notifier {
    server: Observers,
    groups: RwLock<HashMap<String, Arc<Observers>>>,
    tx: broadcast::Sender<AlarmNotification>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            server: Observers::new(),
            groups: RwLock::new(HashMap::new()),
            tx,
        }
    }

    pub(crate) fn server(&self) -> &Observers {
        &self.server
    }

    pub(crate) fn group(&self, name: &str) -> Arc<Observers> {
        if let Some(observers) = self.groups.read().get(name) {
            return Arc::clone(observers);
        }
        Arc::clone(self.groups.write().entry(name.to_string()).or_default())
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<AlarmNotification> {
        self.tx.subscribe()
    }

    pub(crate) fn dispatch(&self, pending: Vec<Pending>) {
        for item in pending {
            match item {
                Pending::Server(notification) => {
                    trace!("Dispatching {:?}", notification);
                    self.server.notify(&notification);
                    // No receivers is not an error
                    let _ = self.tx.send(notification);
                }
                Pending::Group(group, notification) => {
                    let observers = self.groups.read().get(&group).cloned();
                    if let Some(observers) = observers {
                        trace!("Dispatching {:?} to group '{}'", notification, group);
                        observers.notify(&notification);
                    }
                }
            }
        }
    }
}
