//! Per-entity observer registry and notification fan-out.
//!
//! Observers are kept in a map from entity key to a list of shared
//! registrations. Notifying takes a snapshot of the list under the read lock
//! and delivers after releasing it, so observers may subscribe or unsubscribe
//! from inside a callback. A concurrent unsubscribe can still let one
//! in-flight notification through.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::{debug, warn};

use crate::entity::EntityKey;
use crate::error::SubscriptionError;
use crate::event::EventRecord;
use crate::sample::TimestampedValue;

use super::item::{MonitoredItem, Notification, SubscriptionHandle};
use super::stream::NotificationStream;

type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

enum Sink {
    Callback(Callback),
    Channel(Sender<Notification>),
}

struct Registration {
    handle: SubscriptionHandle,
    item: MonitoredItem,
    sink: Sink,
    last: Mutex<Option<TimestampedValue>>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Callback(_) => "callback",
            Sink::Channel(_) => "channel",
        };
        f.debug_struct("Registration")
            .field("handle", &self.handle)
            .field("item", &self.item)
            .field("sink", &sink)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    by_entity: HashMap<EntityKey, Vec<Arc<Registration>>>,
    by_handle: HashMap<SubscriptionHandle, EntityKey>,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryInner {
    state: RwLock<RegistryState>,
    dropped: AtomicU64,
}

impl RegistryInner {
    // Observer code never runs under this lock, so a poisoned lock still
    // guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, key: EntityKey, item: MonitoredItem, sink: Sink) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new();
        let registration = Arc::new(Registration {
            handle,
            item,
            sink,
            last: Mutex::new(None),
        });
        let mut state = self.write();
        state.by_handle.insert(handle, key.clone());
        state.by_entity.entry(key).or_default().push(registration);
        handle
    }

    pub(crate) fn remove(&self, handle: SubscriptionHandle) -> Result<EntityKey, SubscriptionError> {
        let mut state = self.write();
        let Some(key) = state.by_handle.remove(&handle) else {
            return Err(SubscriptionError::UnknownHandle {
                handle: handle.to_string(),
            });
        };
        if let Some(list) = state.by_entity.get_mut(&key) {
            list.retain(|r| r.handle != handle);
            if list.is_empty() {
                state.by_entity.remove(&key);
            }
        }
        Ok(key)
    }

    fn snapshot(&self, key: &EntityKey, wanted: fn(&MonitoredItem) -> bool) -> Vec<Arc<Registration>> {
        self.read()
            .by_entity
            .get(key)
            .map(|list| list.iter().filter(|r| wanted(&r.item)).cloned().collect())
            .unwrap_or_default()
    }
}

/// Registry of observers keyed by entity.
///
/// Cloning is cheap; clones share the same registrations.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use historian::{EntityKey, SubscriptionRegistry, TimestampedValue};
/// use chrono::Utc;
///
/// let registry = SubscriptionRegistry::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// registry.subscribe("MyLevel", move |_| {
///     counter.fetch_add(1, Ordering::Relaxed);
/// });
///
/// let delivered = registry.notify(&EntityKey::from("MyLevel"), &TimestampedValue::good(1.0, Utc::now()));
/// assert_eq!(delivered, 1);
/// assert_eq!(seen.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    /// A registry without observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for every value produced by `key`.
    pub fn subscribe<F>(&self, key: impl Into<EntityKey>, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.subscribe_with(key, MonitoredItem::Values, callback)
    }

    /// Registers a callback for the notifications `item` selects.
    pub fn subscribe_with<F>(&self, key: impl Into<EntityKey>, item: MonitoredItem, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let key = key.into();
        let handle = self.inner.insert(key.clone(), item, Sink::Callback(Arc::new(callback)));
        debug!(%key, %handle, "observer subscribed");
        handle
    }

    /// Registers a bounded channel observer and returns its receiving end.
    pub fn subscribe_stream(&self, key: impl Into<EntityKey>, item: MonitoredItem, capacity: usize) -> NotificationStream {
        let key = key.into();
        let (tx, rx) = bounded(capacity.max(1));
        let handle = self.inner.insert(key.clone(), item, Sink::Channel(tx));
        debug!(%key, %handle, capacity, "stream subscribed");
        NotificationStream::new(handle, rx, Arc::downgrade(&self.inner))
    }

    /// Removes an observer. The entity entry goes away with its last observer.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::UnknownHandle` if the handle is not registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SubscriptionError> {
        let key = self.inner.remove(handle)?;
        debug!(%key, %handle, "observer unsubscribed");
        Ok(())
    }

    /// Returns true if the handle is registered.
    #[must_use]
    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.inner.read().by_handle.contains_key(&handle)
    }

    /// Delivers a produced value to the value observers of `key`.
    ///
    /// Returns how many observers received it.
    pub fn notify(&self, key: &EntityKey, value: &TimestampedValue) -> usize {
        let observers = self.inner.snapshot(key, MonitoredItem::wants_values);
        let mut delivered = 0;

        for registration in observers {
            let notification = Notification::DataChange {
                handle: registration.handle,
                key: key.clone(),
                value: value.clone(),
            };

            if let MonitoredItem::Data(filter) = &registration.item {
                let passes = {
                    let last = registration.last.lock().unwrap_or_else(PoisonError::into_inner);
                    filter.passes(last.as_ref(), value)
                };
                if !passes {
                    continue;
                }
                // The deadband reference only moves when the observer got the value.
                if self.deliver(&registration, key, notification) {
                    *registration.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
                    delivered += 1;
                }
            } else if self.deliver(&registration, key, notification) {
                delivered += 1;
            }
        }

        delivered
    }

    /// Delivers an event to the event observers of `source` whose filter it
    /// passes.
    pub fn notify_event(&self, source: &EntityKey, record: &EventRecord) -> usize {
        let observers = self.inner.snapshot(source, MonitoredItem::wants_events);
        let mut delivered = 0;

        for registration in observers {
            let MonitoredItem::Events(filter) = &registration.item else {
                continue;
            };
            if !filter.evaluate(record) {
                continue;
            }
            let notification = Notification::Event {
                handle: registration.handle,
                key: source.clone(),
                event_id: record.event_id.clone(),
                fields: filter.project(record),
            };
            if self.deliver(&registration, source, notification) {
                delivered += 1;
            }
        }

        delivered
    }

    fn deliver(&self, registration: &Registration, key: &EntityKey, notification: Notification) -> bool {
        match &registration.sink {
            Sink::Callback(callback) => {
                callback(&notification);
                true
            }
            // Never block the producer: drop if the observer is slow.
            Sink::Channel(tx) => match tx.try_send(notification) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(%key, handle = %registration.handle, "observer queue full, notification dropped");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    if self.inner.remove(registration.handle).is_ok() {
                        warn!(%key, handle = %registration.handle, "reaped disconnected observer");
                    }
                    false
                }
            },
        }
    }

    /// Number of observers registered on `key`.
    #[must_use]
    pub fn observer_count(&self, key: &EntityKey) -> usize {
        self.inner.read().by_entity.get(key).map_or(0, Vec::len)
    }

    /// Number of entities with at least one observer.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.inner.read().by_entity.len()
    }

    /// Notifications dropped because a channel observer was full or gone.
    #[must_use]
    pub fn dropped_notifications(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}
