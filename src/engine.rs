//! Engine facade: wires the historian and the subscription registry.
//!
//! The inbound side (`on_value_produced`, `on_event_produced`) is called by
//! simulations or device layers. The outbound side is what a service layer
//! exposes to clients: history reads and deletes, subscriptions, and the
//! current state of each monitored entity.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::alarm::AlarmEvent;
use crate::config::HistorianConfig;
use crate::entity::{EntityKey, MonitoredEntity};
use crate::error::{HistorianError, HistorianResult, HistoryError};
use crate::event::{EventId, EventIdGenerator, EventRecord};
use crate::historian::Historian;
use crate::sample::TimestampedValue;
use crate::storage::{EventDeletion, HistoryPage, ReadEventsRequest, ReadRawRequest};
use crate::subscription::{MonitoredItem, Notification, NotificationStream, SubscriptionHandle, SubscriptionRegistry};
use crate::value::Variant;

fn lock_err(context: &'static str) -> HistorianError {
    HistorianError::internal(format!("poisoned lock: {context}"))
}

/// Historian engine.
#[derive(Debug)]
pub struct Engine {
    config: HistorianConfig,
    historian: Arc<Historian>,
    registry: SubscriptionRegistry,
    event_ids: Arc<EventIdGenerator>,
    entities: RwLock<HashMap<EntityKey, MonitoredEntity>>,
}

impl Engine {
    /// Creates an engine with empty histories and no observers.
    ///
    /// # Errors
    ///
    /// Whatever [`HistorianConfig::validate`] rejects.
    pub fn new(config: HistorianConfig) -> HistorianResult<Self> {
        Self::with_event_ids(config, Arc::new(EventIdGenerator::new()))
    }

    /// Creates an engine sharing an existing event id generator.
    ///
    /// # Errors
    ///
    /// Whatever [`HistorianConfig::validate`] rejects.
    pub fn with_event_ids(config: HistorianConfig, event_ids: Arc<EventIdGenerator>) -> HistorianResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            historian: Arc::new(Historian::new()),
            registry: SubscriptionRegistry::new(),
            event_ids,
            entities: RwLock::new(HashMap::new()),
        })
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &HistorianConfig {
        &self.config
    }

    /// Historized stores, keyed by entity.
    #[must_use]
    pub fn historian(&self) -> &Historian {
        &self.historian
    }

    /// Observers of values and events.
    #[must_use]
    pub const fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Shared event id generator.
    #[must_use]
    pub fn event_ids(&self) -> Arc<EventIdGenerator> {
        Arc::clone(&self.event_ids)
    }

    // ---- inbound ----

    /// A new value was produced for `key`.
    ///
    /// Updates the entity, appends to its history if historized and notifies
    /// observers. Returns how many observers received the value.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn on_value_produced(&self, key: impl Into<EntityKey>, value: TimestampedValue) -> HistorianResult<usize> {
        let key = key.into();
        {
            let mut entities = self.entities.write().map_err(|_| lock_err("engine entities"))?;
            entities
                .entry(key.clone())
                .or_insert_with(|| MonitoredEntity::new(key.clone()))
                .update(value.clone());
        }
        self.historian.record_value(&key, &value)?;
        Ok(self.registry.notify(&key, &value))
    }

    /// A new event was produced by `source`.
    ///
    /// Appends to its event history if historized and notifies event
    /// observers. Returns how many observers received the event.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn on_event_produced(&self, source: impl Into<EntityKey>, record: EventRecord) -> HistorianResult<usize> {
        let source = source.into();
        self.historian.record_event(&source, &record)?;
        Ok(self.registry.notify_event(&source, &record))
    }

    /// Publishes an alarm event under its condition source.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn publish_alarm_event(&self, event: &AlarmEvent) -> HistorianResult<usize> {
        self.on_event_produced(event.source.clone(), event.to_record())
    }

    // ---- outbound ----

    /// Current state of `key`, if it ever produced a value.
    #[must_use]
    pub fn entity(&self, key: &EntityKey) -> Option<MonitoredEntity> {
        self.entities.read().ok()?.get(key).cloned()
    }

    /// Current value of `key`.
    #[must_use]
    pub fn current_value(&self, key: &EntityKey) -> Option<Variant> {
        self.entity(key)?.current.map(|v| v.value)
    }

    /// Starts historizing `key` with the configured value capacity.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn historize_values(&self, key: impl Into<EntityKey>) -> HistorianResult<()> {
        self.historian.add_value_history(key, self.config.value_capacity)?;
        Ok(())
    }

    /// Starts historizing events of `source` with the configured event capacity.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn historize_events(&self, source: impl Into<EntityKey>) -> HistorianResult<()> {
        self.historian.add_event_history(source, self.config.event_capacity)?;
        Ok(())
    }

    /// Forgets `key`: its current state, its value history and its event
    /// history. Observers stay registered.
    ///
    /// Returns true if anything was removed.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn remove_entity(&self, key: &EntityKey) -> HistorianResult<bool> {
        let entity = {
            let mut entities = self.entities.write().map_err(|_| lock_err("engine entities"))?;
            entities.remove(key).is_some()
        };
        let values = self.historian.remove_value_history(key)?;
        let events = self.historian.remove_event_history(key)?;
        let removed = entity || values || events;
        if removed {
            debug!(%key, entity, values, events, "entity removed");
        }
        Ok(removed)
    }

    /// Raw history read.
    ///
    /// # Errors
    ///
    /// See [`Historian::read_raw`].
    pub fn read_history(&self, key: &EntityKey, request: &ReadRawRequest) -> HistorianResult<HistoryPage<TimestampedValue>> {
        self.historian.read_raw(key, request)
    }

    /// Stepped-interpolation read.
    ///
    /// # Errors
    ///
    /// See [`Historian::read_at_times`].
    pub fn read_at_times(&self, key: &EntityKey, times: &[DateTime<Utc>]) -> HistorianResult<Vec<TimestampedValue>> {
        self.historian.read_at_times(key, times)
    }

    /// Filtered event history read.
    ///
    /// # Errors
    ///
    /// See [`Historian::read_events`].
    pub fn read_event_history(&self, source: &EntityKey, request: &ReadEventsRequest) -> HistorianResult<HistoryPage<Vec<Variant>>> {
        self.historian.read_events(source, request)
    }

    /// Deletes values in `[start, end)`.
    ///
    /// # Errors
    ///
    /// See [`Historian::delete_raw`].
    pub fn delete_history(&self, key: &EntityKey, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> HistorianResult<usize> {
        self.historian.delete_raw(key, start, end)
    }

    /// Deletes values stamped exactly at each time.
    ///
    /// # Errors
    ///
    /// See [`Historian::delete_at_times`].
    pub fn delete_at_times(&self, key: &EntityKey, times: &[DateTime<Utc>]) -> HistorianResult<Vec<Result<(), HistoryError>>> {
        self.historian.delete_at_times(key, times)
    }

    /// Deletes events by id.
    ///
    /// # Errors
    ///
    /// See [`Historian::delete_events`].
    pub fn delete_events(&self, source: &EntityKey, ids: &[EventId]) -> HistorianResult<Vec<EventDeletion>> {
        self.historian.delete_events(source, ids)
    }

    /// Registers a callback observer.
    pub fn subscribe<F>(&self, key: impl Into<EntityKey>, item: MonitoredItem, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.registry.subscribe_with(key, item, callback)
    }

    /// Registers a channel observer with the configured queue capacity.
    pub fn subscribe_stream(&self, key: impl Into<EntityKey>, item: MonitoredItem) -> NotificationStream {
        self.registry.subscribe_stream(key, item, self.config.stream_capacity)
    }

    /// Removes an observer.
    ///
    /// # Errors
    ///
    /// `UnknownHandle` if it is not registered.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> HistorianResult<()> {
        Ok(self.registry.unsubscribe(handle)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::alarm::{AlarmLimits, LevelAlarm};
    use crate::event::EventFilter;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs)
    }

    fn engine() -> Engine {
        Engine::new(HistorianConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = HistorianConfig {
            value_capacity: 0,
            ..HistorianConfig::default()
        };
        assert!(Engine::new(config).unwrap_err().is_validation());
    }

    #[test]
    fn test_value_updates_entity_history_and_observers() {
        let engine = engine();
        let key = EntityKey::from("MyLevel");
        engine.historize_values("MyLevel").unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        engine.subscribe("MyLevel", MonitoredItem::Values, move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(engine.on_value_produced("MyLevel", TimestampedValue::good(1.0, t(1))).unwrap(), 1);
        assert_eq!(engine.on_value_produced("MyLevel", TimestampedValue::good(2.0, t(2))).unwrap(), 1);

        let entity = engine.entity(&key).unwrap();
        assert_eq!(entity.revision, 2);
        assert_eq!(engine.current_value(&key), Some(Variant::Float(2.0)));
        assert_eq!(seen.load(Ordering::Relaxed), 2);

        let page = engine.read_history(&key, &ReadRawRequest::all()).unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn test_unhistorized_values_are_not_stored() {
        let engine = engine();
        let key = EntityKey::from("DataItem0");
        engine.on_value_produced("DataItem0", TimestampedValue::good(1.0, t(1))).unwrap();
        assert!(engine.entity(&key).is_some());
        assert!(engine.read_history(&key, &ReadRawRequest::all()).unwrap_err().is_no_data());
    }

    #[test]
    fn test_alarm_event_is_historized_and_streamed() {
        let engine = engine();
        let source = EntityKey::from("MyLevel.Alarm");
        engine.historize_events("MyLevel.Alarm").unwrap();
        let stream = engine.subscribe_stream("MyLevel.Alarm", MonitoredItem::Events(EventFilter::select_all_standard()));

        let mut alarm = LevelAlarm::new("MyLevel.Alarm", AlarmLimits::default(), engine.event_ids());
        let event = alarm.evaluate(&Variant::Float(75.0), t(1)).unwrap();
        assert_eq!(engine.publish_alarm_event(&event).unwrap(), 1);

        let notification = stream.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(notification, Notification::Event { ref event_id, .. } if *event_id == event.event_id));

        let request = ReadEventsRequest::new(None, None, EventFilter::select_all_standard());
        let page = engine.read_event_history(&source, &request).unwrap();
        assert_eq!(page.items.len(), 1);

        let outcome = engine.delete_events(&source, &[event.event_id]).unwrap();
        assert_eq!(outcome, vec![EventDeletion::Removed]);
    }

    #[test]
    fn test_remove_entity_drops_state_and_histories() {
        let engine = engine();
        let key = EntityKey::from("MyLevel");
        engine.historize_values("MyLevel").unwrap();
        engine.historize_events("MyLevel").unwrap();
        engine.on_value_produced("MyLevel", TimestampedValue::good(1.0, t(1))).unwrap();
        let record = EventRecord::base(engine.event_ids().next_id(), "LevelEvent", &key, t(1), "level", 500);
        engine.on_event_produced("MyLevel", record).unwrap();

        assert!(engine.remove_entity(&key).unwrap());
        assert!(engine.entity(&key).is_none());
        assert!(!engine.historian().is_historizing(&key));
        assert!(engine.read_history(&key, &ReadRawRequest::all()).unwrap_err().is_no_data());
        assert!(engine.historian().event_store(&key).is_none());

        assert!(!engine.remove_entity(&key).unwrap());
    }

    #[test]
    fn test_unsubscribe_unknown_handle() {
        let engine = engine();
        let err = engine.unsubscribe(SubscriptionHandle::new()).unwrap_err();
        assert!(err.is_subscription());
    }
}
