//! Per-entity history registry and the history service operations.
//!
//! The `Historian` owns one value store per historized variable and one event
//! store per historized event source. Operations on an entity that is not
//! historized fail with `NoData`. Modified/processed reads and all updates are
//! recognised but unsupported.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entity::EntityKey;
use crate::error::{HistorianError, HistorianResult, HistoryError};
use crate::event::{EventId, EventRecord};
use crate::sample::TimestampedValue;
use crate::storage::{
    EventDeletion, EventHistory, EventStore, HistoryPage, ReadEventsRequest, ReadRawRequest, ValueHistory,
    ValueStore,
};
use crate::time::DeleteRange;
use crate::value::Variant;

fn lock_err(context: &'static str) -> HistorianError {
    HistorianError::internal(format!("poisoned lock: {context}"))
}

fn not_historized(key: &EntityKey) -> HistorianError {
    HistoryError::no_data(key.as_str(), "not historized").into()
}

/// Registry of value and event histories.
#[derive(Default)]
pub struct Historian {
    values: RwLock<HashMap<EntityKey, Arc<dyn ValueStore>>>,
    events: RwLock<HashMap<EntityKey, Arc<dyn EventStore>>>,
}

impl std::fmt::Debug for Historian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Historian")
            .field("values", &self.value_keys().map(|k| k.len()).unwrap_or_default())
            .field("events", &self.event_keys().map(|k| k.len()).unwrap_or_default())
            .finish()
    }
}

impl Historian {
    /// An empty historian that historizes nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts historizing values of `key` in memory. Keeps an existing store.
    ///
    /// # Errors
    ///
    /// `ZeroCapacity` if `capacity` is 0.
    pub fn add_value_history(&self, key: impl Into<EntityKey>, capacity: usize) -> HistorianResult<Arc<dyn ValueStore>> {
        let key = key.into();
        let mut values = self.values.write().map_err(|_| lock_err("historian values"))?;
        if let Some(existing) = values.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let store: Arc<dyn ValueStore> = Arc::new(ValueHistory::new(key.clone(), capacity)?);
        debug!(%key, capacity, "value history added");
        values.insert(key, Arc::clone(&store));
        Ok(store)
    }

    /// Historizes `key` with a caller-supplied store, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn add_value_store(&self, store: Arc<dyn ValueStore>) -> HistorianResult<()> {
        let mut values = self.values.write().map_err(|_| lock_err("historian values"))?;
        values.insert(store.key().clone(), store);
        Ok(())
    }

    /// Starts historizing events of `source` in memory. Keeps an existing store.
    ///
    /// # Errors
    ///
    /// `ZeroCapacity` if `capacity` is 0.
    pub fn add_event_history(&self, source: impl Into<EntityKey>, capacity: usize) -> HistorianResult<Arc<dyn EventStore>> {
        let source = source.into();
        let mut events = self.events.write().map_err(|_| lock_err("historian events"))?;
        if let Some(existing) = events.get(&source) {
            return Ok(Arc::clone(existing));
        }
        let store: Arc<dyn EventStore> = Arc::new(EventHistory::new(source.clone(), capacity)?);
        debug!(%source, capacity, "event history added");
        events.insert(source, Arc::clone(&store));
        Ok(store)
    }

    /// Stops historizing values of `key`, discarding its history.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn remove_value_history(&self, key: &EntityKey) -> HistorianResult<bool> {
        let mut values = self.values.write().map_err(|_| lock_err("historian values"))?;
        Ok(values.remove(key).is_some())
    }

    /// Stops historizing events of `source`, discarding its history.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn remove_event_history(&self, source: &EntityKey) -> HistorianResult<bool> {
        let mut events = self.events.write().map_err(|_| lock_err("historian events"))?;
        Ok(events.remove(source).is_some())
    }

    /// Returns true if values or events of `key` are historized.
    #[must_use]
    pub fn is_historizing(&self, key: &EntityKey) -> bool {
        let values = self.values.read().is_ok_and(|v| v.contains_key(key));
        values || self.events.read().is_ok_and(|e| e.contains_key(key))
    }

    /// Value store of `key`, if historized.
    #[must_use]
    pub fn value_store(&self, key: &EntityKey) -> Option<Arc<dyn ValueStore>> {
        self.values.read().ok()?.get(key).cloned()
    }

    /// Event store of `source`, if historized.
    #[must_use]
    pub fn event_store(&self, source: &EntityKey) -> Option<Arc<dyn EventStore>> {
        self.events.read().ok()?.get(source).cloned()
    }

    /// Keys with value history, sorted.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn value_keys(&self) -> HistorianResult<Vec<EntityKey>> {
        let values = self.values.read().map_err(|_| lock_err("historian values"))?;
        let mut keys: Vec<EntityKey> = values.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Sources with event history, sorted.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn event_keys(&self) -> HistorianResult<Vec<EntityKey>> {
        let events = self.events.read().map_err(|_| lock_err("historian events"))?;
        let mut keys: Vec<EntityKey> = events.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn values_of(&self, key: &EntityKey) -> HistorianResult<Arc<dyn ValueStore>> {
        let values = self.values.read().map_err(|_| lock_err("historian values"))?;
        values.get(key).cloned().ok_or_else(|| not_historized(key))
    }

    fn events_of(&self, source: &EntityKey) -> HistorianResult<Arc<dyn EventStore>> {
        let events = self.events.read().map_err(|_| lock_err("historian events"))?;
        events.get(source).cloned().ok_or_else(|| not_historized(source))
    }

    /// Appends a value if `key` is historized. Returns whether it was stored.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn record_value(&self, key: &EntityKey, value: &TimestampedValue) -> HistorianResult<bool> {
        let Some(store) = self.value_store(key) else {
            return Ok(false);
        };
        store.append(value.clone())?;
        Ok(true)
    }

    /// Appends an event if `source` is historized. Returns whether it was stored.
    ///
    /// # Errors
    ///
    /// Internal error on a poisoned lock.
    pub fn record_event(&self, source: &EntityKey, record: &EventRecord) -> HistorianResult<bool> {
        let Some(store) = self.event_store(source) else {
            return Ok(false);
        };
        store.append(record.clone())?;
        Ok(true)
    }

    /// Raw read of `key`'s history.
    ///
    /// # Errors
    ///
    /// `NoData` if `key` is not historized, `InvalidTimeRange` if start is
    /// after end.
    pub fn read_raw(&self, key: &EntityKey, request: &ReadRawRequest) -> HistorianResult<HistoryPage<TimestampedValue>> {
        debug!(
            %key,
            bounds = %request.bounds(),
            max_values = request.max_values,
            resumed = request.continuation.is_some(),
            "read raw"
        );
        request.bounds().validate()?;
        Ok(self.values_of(key)?.read_raw(request)?)
    }

    /// Stepped-interpolation read at the requested times.
    ///
    /// # Errors
    ///
    /// `NoData` if `key` is not historized.
    pub fn read_at_times(&self, key: &EntityKey, times: &[DateTime<Utc>]) -> HistorianResult<Vec<TimestampedValue>> {
        debug!(%key, count = times.len(), "read at times");
        Ok(self.values_of(key)?.read_at_times(times)?)
    }

    /// Filtered event read of `source`'s history.
    ///
    /// # Errors
    ///
    /// `NoData` if `source` is not historized, `InvalidTimeRange` if start is
    /// after end.
    pub fn read_events(&self, source: &EntityKey, request: &ReadEventsRequest) -> HistorianResult<HistoryPage<Vec<Variant>>> {
        debug!(
            %source,
            bounds = %request.bounds(),
            max_values = request.max_values,
            resumed = request.continuation.is_some(),
            "read events"
        );
        request.bounds().validate()?;
        Ok(self.events_of(source)?.read_events(request)?)
    }

    /// Deletes `key`'s values in `[start, end)`.
    ///
    /// # Errors
    ///
    /// `UndefinedEndTime` if `end` is `None`, `NoData` if not historized.
    pub fn delete_raw(&self, key: &EntityKey, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> HistorianResult<usize> {
        debug!(%key, ?start, ?end, "delete raw");
        let range = DeleteRange::new(key.as_str(), start, end)?;
        Ok(self.values_of(key)?.delete_raw(&range)?)
    }

    /// Deletes values stamped exactly at each time; one result per time.
    ///
    /// # Errors
    ///
    /// `NoData` if `key` is not historized.
    pub fn delete_at_times(&self, key: &EntityKey, times: &[DateTime<Utc>]) -> HistorianResult<Vec<Result<(), HistoryError>>> {
        debug!(%key, count = times.len(), "delete at times");
        Ok(self.values_of(key)?.delete_at_times(times)?)
    }

    /// Deletes events by id; one outcome per id.
    ///
    /// # Errors
    ///
    /// `NoData` if `source` is not historized.
    pub fn delete_events(&self, source: &EntityKey, ids: &[EventId]) -> HistorianResult<Vec<EventDeletion>> {
        debug!(%source, count = ids.len(), "delete events");
        Ok(self.events_of(source)?.delete_events(ids)?)
    }

    /// Reads of modified values are not supported.
    ///
    /// # Errors
    ///
    /// Always `Unsupported`.
    pub fn read_modified(&self, key: &EntityKey) -> HistorianResult<Vec<TimestampedValue>> {
        debug!(%key, "read modified");
        Err(HistoryError::unsupported("read_modified").into())
    }

    /// Aggregate reads are not supported.
    ///
    /// # Errors
    ///
    /// Always `Unsupported`.
    pub fn read_processed(&self, key: &EntityKey) -> HistorianResult<Vec<TimestampedValue>> {
        debug!(%key, "read processed");
        Err(HistoryError::unsupported("read_processed").into())
    }

    /// History updates are not supported.
    ///
    /// # Errors
    ///
    /// Always `Unsupported`.
    pub fn update_data(&self, key: &EntityKey, _values: &[TimestampedValue]) -> HistorianResult<()> {
        debug!(%key, "update data");
        Err(HistoryError::unsupported("update_data").into())
    }

    /// Event history updates are not supported.
    ///
    /// # Errors
    ///
    /// Always `Unsupported`.
    pub fn update_event(&self, source: &EntityKey, _records: &[EventRecord]) -> HistorianResult<()> {
        debug!(%source, "update event");
        Err(HistoryError::unsupported("update_event").into())
    }

    /// Structure data updates are not supported.
    ///
    /// # Errors
    ///
    /// Always `Unsupported`.
    pub fn update_structure_data(&self, key: &EntityKey) -> HistorianResult<()> {
        debug!(%key, "update structure data");
        Err(HistoryError::unsupported("update_structure_data").into())
    }

    /// Deleting modified values is not supported.
    ///
    /// # Errors
    ///
    /// Always `Unsupported`.
    pub fn delete_modified(&self, key: &EntityKey) -> HistorianResult<usize> {
        debug!(%key, "delete modified");
        Err(HistoryError::unsupported("delete_modified").into())
    }
}
