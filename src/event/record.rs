//! Event ids and event records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKey;
use crate::value::Variant;

/// Length in bytes of generated event ids.
pub const EVENT_ID_LEN: usize = 16;

/// Unique, opaque event identifier (a byte sequence).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Vec<u8>);

impl EventId {
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl From<&[u8]> for EventId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Generates unique event ids.
///
/// Ids are `blake3(seed || counter)` truncated to [`EVENT_ID_LEN`] bytes. The
/// seed is random per generator unless supplied, so ids from different process
/// runs do not collide. One generator is shared by everything that emits
/// events for a given engine.
#[derive(Debug)]
pub struct EventIdGenerator {
    seed: [u8; 16],
    counter: AtomicU64,
}

impl EventIdGenerator {
    /// Creates a generator with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(*Uuid::new_v4().as_bytes())
    }

    /// Creates a generator with a fixed seed (deterministic ids).
    #[must_use]
    pub const fn with_seed(seed: [u8; 16]) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the next event id.
    pub fn next_id(&self) -> EventId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut h = Hasher::new();
        h.update(&self.seed);
        h.update(&n.to_le_bytes());
        let hash = h.finalize();
        EventId(hash.as_bytes()[..EVENT_ID_LEN].to_vec())
    }

    /// Number of ids issued so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for EventIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of a field inside an event, as `/`-separated browse names.
///
/// `"Severity"` addresses a top-level field; `"ActiveState/Id"` a nested one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

/// Names of the standard event fields.
pub mod fields {
    /// Unique id of the event, as a byte string.
    pub const EVENT_ID: &str = "EventId";
    /// Name of the event type.
    pub const EVENT_TYPE: &str = "EventType";
    /// Entity that produced the event.
    pub const SOURCE_NAME: &str = "SourceName";
    /// When the event occurred.
    pub const TIME: &str = "Time";
    /// When the server received the event.
    pub const RECEIVE_TIME: &str = "ReceiveTime";
    /// Human-readable description.
    pub const MESSAGE: &str = "Message";
    /// Urgency, 1 to 1000.
    pub const SEVERITY: &str = "Severity";

    /// Name of the alarm condition.
    pub const CONDITION_NAME: &str = "ConditionName";
    /// Whether the condition is active.
    pub const ACTIVE_STATE: &str = "ActiveState/Id";
    /// Whether the condition was acknowledged.
    pub const ACKED_STATE: &str = "AckedState/Id";
    /// Whether the condition was confirmed.
    pub const CONFIRMED_STATE: &str = "ConfirmedState/Id";
    /// Whether the condition is enabled.
    pub const ENABLED_STATE: &str = "EnabledState/Id";
    /// Whether the condition still needs attention.
    pub const RETAIN: &str = "Retain";
    /// Limit currently violated by a level alarm.
    pub const LIMIT_STATE: &str = "LimitState/CurrentState";
    /// Last operator comment.
    pub const COMMENT: &str = "Comment";

    /// The base event fields every record carries.
    pub const STANDARD: [&str; 7] = [EVENT_ID, EVENT_TYPE, SOURCE_NAME, TIME, RECEIVE_TIME, MESSAGE, SEVERITY];
}

/// A discrete event. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique event id.
    pub event_id: EventId,
    /// When the event occurred; history is ordered by this.
    pub time: DateTime<Utc>,
    /// Field values keyed by path.
    pub fields: BTreeMap<FieldPath, Variant>,
}

impl EventRecord {
    /// Creates a record carrying only its id and time fields.
    #[must_use]
    pub fn new(event_id: EventId, time: DateTime<Utc>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(FieldPath::from(fields::EVENT_ID), Variant::ByteString(event_id.as_bytes().to_vec()));
        map.insert(FieldPath::from(fields::TIME), Variant::DateTime(time));
        Self {
            event_id,
            time,
            fields: map,
        }
    }

    /// Creates a record with the standard base event fields populated.
    #[must_use]
    pub fn base(
        event_id: EventId,
        event_type: &str,
        source: &EntityKey,
        time: DateTime<Utc>,
        message: impl Into<String>,
        severity: u16,
    ) -> Self {
        Self::new(event_id, time)
            .with_field(fields::EVENT_TYPE, event_type)
            .with_field(fields::SOURCE_NAME, source.as_str())
            .with_field(fields::RECEIVE_TIME, Utc::now())
            .with_field(fields::MESSAGE, message.into())
            .with_field(fields::SEVERITY, severity)
    }

    /// Sets a field, replacing any previous value.
    #[must_use]
    pub fn with_field(mut self, path: &str, value: impl Into<Variant>) -> Self {
        self.fields.insert(FieldPath::from(path), value.into());
        self
    }

    /// Returns the value of a field, if present.
    #[must_use]
    pub fn field(&self, path: &FieldPath) -> Option<&Variant> {
        self.fields.get(path)
    }

    /// Severity field, if present and numeric.
    #[must_use]
    pub fn severity(&self) -> Option<i64> {
        self.fields
            .get(&FieldPath::from(fields::SEVERITY))
            .and_then(Variant::as_int)
    }
}
