//! Entity keys and monitored entity state.
//!
//! An entity is an addressable data point (a variable) or an event source.
//! Keys are opaque: the historian never interprets them beyond equality.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sample::TimestampedValue;

/// Opaque identifier of a monitored entity or event source.
///
/// # Examples
///
/// ```
/// use historian::EntityKey;
///
/// let key = EntityKey::from("MyLevel");
/// assert_eq!(key.as_str(), "MyLevel");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    /// Wraps a key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for EntityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Current state of an entity whose value is produced by a simulation or
/// device layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredEntity {
    /// The entity key.
    pub key: EntityKey,
    /// The most recent value, if any was produced.
    pub current: Option<TimestampedValue>,
    /// Incremented on every produced value; starts at 0.
    pub revision: u64,
}

impl MonitoredEntity {
    /// An entity with no value yet.
    #[must_use]
    pub fn new(key: impl Into<EntityKey>) -> Self {
        Self {
            key: key.into(),
            current: None,
            revision: 0,
        }
    }

    /// Replaces the current value and bumps the revision.
    pub fn update(&mut self, value: TimestampedValue) {
        self.current = Some(value);
        self.revision = self.revision.saturating_add(1);
    }
}
