//! Abstract history store traits.
//!
//! The historian only talks to stores through these traits, so a persistent
//! backend can replace the in-memory histories without touching callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;
use crate::error::{HistorianResult, HistoryError};
use crate::event::{EventFilter, EventId, EventRecord};
use crate::sample::TimestampedValue;
use crate::time::{DeleteRange, HistoryBounds};
use crate::value::Variant;

use super::continuation::{ContinuationPoint, HistoryPage};

/// Parameters of a raw value read.
///
/// # Examples
///
/// ```
/// use historian::storage::ReadRawRequest;
///
/// let request = ReadRawRequest::all().with_max_values(100);
/// assert_eq!(request.max_values, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRawRequest {
    /// Lower bound; `None` is undefined.
    pub start: Option<DateTime<Utc>>,
    /// Upper bound; `None` is undefined.
    pub end: Option<DateTime<Utc>>,
    /// Page size; 0 means unlimited.
    pub max_values: usize,
    /// Include entries exactly at the bounds.
    pub return_bounds: bool,
    /// Resume token from a previous page.
    pub continuation: Option<ContinuationPoint>,
}

impl ReadRawRequest {
    /// Unlimited read between `start` and `end`, bounds excluded.
    #[must_use]
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start,
            end,
            max_values: 0,
            return_bounds: false,
            continuation: None,
        }
    }

    /// Everything, oldest first.
    #[must_use]
    pub const fn all() -> Self {
        Self::new(None, None)
    }

    /// Sets the page size; 0 means unlimited.
    #[must_use]
    pub const fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    /// Whether entries exactly at the bounds are returned.
    #[must_use]
    pub const fn with_bounds(mut self, return_bounds: bool) -> Self {
        self.return_bounds = return_bounds;
        self
    }

    /// Same request, resumed at `continuation`.
    #[must_use]
    pub const fn resume(mut self, continuation: Option<ContinuationPoint>) -> Self {
        self.continuation = continuation;
        self
    }

    /// Time bounds of this request.
    #[must_use]
    pub const fn bounds(&self) -> HistoryBounds {
        HistoryBounds::new(self.start, self.end, self.return_bounds)
    }
}

/// Parameters of an event history read.
#[derive(Debug, Clone)]
pub struct ReadEventsRequest {
    /// Lower bound (inclusive); `None` is undefined.
    pub start: Option<DateTime<Utc>>,
    /// Upper bound (inclusive); `None` is undefined.
    pub end: Option<DateTime<Utc>>,
    /// Page size; 0 means unlimited.
    pub max_values: usize,
    /// Where clause and projection.
    pub filter: EventFilter,
    /// Resume token from a previous page.
    pub continuation: Option<ContinuationPoint>,
}

impl ReadEventsRequest {
    /// Unlimited read of events between `start` and `end` through `filter`.
    #[must_use]
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>, filter: EventFilter) -> Self {
        Self {
            start,
            end,
            max_values: 0,
            filter,
            continuation: None,
        }
    }

    /// Sets the page size; 0 means unlimited.
    #[must_use]
    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    /// Same request, resumed at `continuation`.
    #[must_use]
    pub fn resume(mut self, continuation: Option<ContinuationPoint>) -> Self {
        self.continuation = continuation;
        self
    }

    /// Time bounds of this request. Event reads always include the bounds.
    #[must_use]
    pub const fn bounds(&self) -> HistoryBounds {
        HistoryBounds::new(self.start, self.end, true)
    }
}

/// Outcome of deleting one event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDeletion {
    /// At least one record with the id was removed.
    Removed,
    /// No record with the id was stored.
    Unresolved,
}

/// Bounded history of timestamped values for one entity.
///
/// # Concurrency
/// Appends, evictions and deletes are atomic with respect to reads: a reader
/// observes either the state before or after a mutation.
pub trait ValueStore: Send + Sync {
    /// Entity this history belongs to.
    fn key(&self) -> &EntityKey;

    /// Maximum number of retained samples.
    fn capacity(&self) -> Result<usize, HistoryError>;

    /// Changes the capacity, evicting the oldest samples if it shrinks.
    fn set_capacity(&self, capacity: usize) -> HistorianResult<()>;

    /// Number of stored samples.
    fn len(&self) -> Result<usize, HistoryError>;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> Result<bool, HistoryError> {
        Ok(self.len()? == 0)
    }

    /// Appends at the tail, evicting from the head while over capacity.
    fn append(&self, value: TimestampedValue) -> Result<(), HistoryError>;

    /// Reads raw samples within bounds, one page at a time.
    fn read_raw(&self, request: &ReadRawRequest) -> Result<HistoryPage<TimestampedValue>, HistoryError>;

    /// Stepped interpolation: for each time, the newest sample at or before
    /// it, stamped with the requested time. `BadNoData` when none exists.
    fn read_at_times(&self, times: &[DateTime<Utc>]) -> Result<Vec<TimestampedValue>, HistoryError>;

    /// Removes every sample within the range; returns how many.
    fn delete_raw(&self, range: &DeleteRange) -> Result<usize, HistoryError>;

    /// Removes samples stamped exactly at each time. One result per time;
    /// `NoData` where nothing matched.
    fn delete_at_times(&self, times: &[DateTime<Utc>]) -> Result<Vec<Result<(), HistoryError>>, HistoryError>;

    /// Newest stored sample.
    fn latest(&self) -> Result<Option<TimestampedValue>, HistoryError>;

    /// Copy of all stored samples, oldest first.
    fn snapshot(&self) -> Result<Vec<TimestampedValue>, HistoryError>;
}

/// Bounded history of event records for one event source.
pub trait EventStore: Send + Sync {
    /// Event source this history belongs to.
    fn key(&self) -> &EntityKey;

    /// Maximum number of retained records.
    fn capacity(&self) -> Result<usize, HistoryError>;

    /// Number of stored records.
    fn len(&self) -> Result<usize, HistoryError>;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> Result<bool, HistoryError> {
        Ok(self.len()? == 0)
    }

    /// Appends at the tail, evicting from the head while over capacity.
    fn append(&self, record: EventRecord) -> Result<(), HistoryError>;

    /// Reads filtered, projected events within bounds, one page at a time.
    fn read_events(&self, request: &ReadEventsRequest) -> Result<HistoryPage<Vec<Variant>>, HistoryError>;

    /// Removes every record carrying each id. One outcome per id.
    fn delete_events(&self, ids: &[EventId]) -> Result<Vec<EventDeletion>, HistoryError>;

    /// Copy of all stored records, oldest first.
    fn snapshot(&self) -> Result<Vec<EventRecord>, HistoryError>;
}
