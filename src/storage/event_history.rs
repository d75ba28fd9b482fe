//! In-memory bounded event history.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::entity::EntityKey;
use crate::error::{HistoryError, ValidationError};
use crate::event::{EventId, EventRecord};
use crate::value::Variant;

use super::continuation::{paginate, scan, HistoryPage};
use super::lock_err;
use super::traits::{EventDeletion, EventStore, ReadEventsRequest};

/// Default number of events retained per source.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

const fn event_time(r: &EventRecord) -> DateTime<Utc> {
    r.time
}

/// Bounded FIFO of event records, oldest at the head.
#[derive(Debug)]
pub struct EventHistory {
    key: EntityKey,
    capacity: usize,
    entries: RwLock<VecDeque<EventRecord>>,
}

impl EventHistory {
    /// Creates an empty history.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ZeroCapacity` if `capacity` is 0.
    pub fn new(key: impl Into<EntityKey>, capacity: usize) -> Result<Self, ValidationError> {
        let key = key.into();
        if capacity == 0 {
            return Err(ValidationError::ZeroCapacity {
                field: format!("event history '{key}'"),
            });
        }
        Ok(Self {
            key,
            capacity,
            entries: RwLock::new(VecDeque::new()),
        })
    }
}

impl EventStore for EventHistory {
    fn key(&self) -> &EntityKey {
        &self.key
    }

    fn capacity(&self) -> Result<usize, HistoryError> {
        Ok(self.capacity)
    }

    fn len(&self) -> Result<usize, HistoryError> {
        let entries = self.entries.read().map_err(|_| lock_err("event history"))?;
        Ok(entries.len())
    }

    fn append(&self, record: EventRecord) -> Result<(), HistoryError> {
        let mut entries = self.entries.write().map_err(|_| lock_err("event history"))?;
        entries.push_back(record);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        Ok(())
    }

    fn read_events(&self, request: &ReadEventsRequest) -> Result<HistoryPage<Vec<Variant>>, HistoryError> {
        let entries = self.entries.read().map_err(|_| lock_err("event history"))?;
        let filter = &request.filter;
        let candidates = scan(&*entries, request.bounds(), event_time).filter(|r| filter.evaluate(r));
        Ok(paginate(candidates, request.max_values, request.continuation, |r| {
            filter.project(r)
        }))
    }

    fn delete_events(&self, ids: &[EventId]) -> Result<Vec<EventDeletion>, HistoryError> {
        let mut entries = self.entries.write().map_err(|_| lock_err("event history"))?;
        Ok(ids
            .iter()
            .map(|id| {
                let mut removed = false;
                for i in (0..entries.len()).rev() {
                    if entries[i].event_id == *id {
                        entries.remove(i);
                        removed = true;
                    }
                }
                if removed {
                    EventDeletion::Removed
                } else {
                    EventDeletion::Unresolved
                }
            })
            .collect())
    }

    fn snapshot(&self) -> Result<Vec<EventRecord>, HistoryError> {
        let entries = self.entries.read().map_err(|_| lock_err("event history"))?;
        Ok(entries.iter().cloned().collect())
    }
}
