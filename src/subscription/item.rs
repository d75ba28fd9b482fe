//! Subscription handles, monitored item filters and notifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKey;
use crate::error::ValidationError;
use crate::event::{EventFilter, EventId};
use crate::sample::TimestampedValue;
use crate::value::Variant;

/// Unique identifier for one registered observer.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    /// Create a new random handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which changes of a sample count as a data change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataChangeTrigger {
    /// Only status changes.
    Status,
    /// Status or value changes.
    #[default]
    StatusValue,
    /// Status, value or source timestamp changes.
    StatusValueTimestamp,
}

/// Suppresses value changes smaller than a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Deadband {
    /// Any value change is reported.
    #[default]
    None,
    /// A numeric change must exceed this absolute amount.
    Absolute(f64),
    /// Percent of the engineering-unit range. Not supported: entities carry
    /// no range.
    Percent(f64),
}

/// Data change filter evaluated per registration against the last value it
/// was sent.
///
/// # Examples
///
/// ```
/// use historian::subscription::{DataChangeFilter, DataChangeTrigger, Deadband};
///
/// let filter = DataChangeFilter::new(DataChangeTrigger::StatusValue, Deadband::Absolute(0.5)).unwrap();
/// assert_eq!(filter.trigger(), DataChangeTrigger::StatusValue);
/// assert!(DataChangeFilter::new(DataChangeTrigger::Status, Deadband::Percent(5.0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawDataChangeFilter")]
pub struct DataChangeFilter {
    trigger: DataChangeTrigger,
    deadband: Deadband,
}

// Deserialized filters go through the same checks as `DataChangeFilter::new`.
#[derive(Deserialize)]
struct RawDataChangeFilter {
    #[serde(default)]
    trigger: DataChangeTrigger,
    #[serde(default)]
    deadband: Deadband,
}

impl TryFrom<RawDataChangeFilter> for DataChangeFilter {
    type Error = ValidationError;

    fn try_from(raw: RawDataChangeFilter) -> Result<Self, Self::Error> {
        Self::new(raw.trigger, raw.deadband)
    }
}

impl DataChangeFilter {
    /// Builds a filter.
    ///
    /// # Errors
    ///
    /// `InvalidDeadband` for a negative or non-finite absolute deadband,
    /// `UnsupportedFilter` for a percent deadband.
    pub fn new(trigger: DataChangeTrigger, deadband: Deadband) -> Result<Self, ValidationError> {
        match deadband {
            Deadband::Absolute(value) if !value.is_finite() || value < 0.0 => {
                return Err(ValidationError::InvalidDeadband { value });
            }
            Deadband::Percent(_) => {
                return Err(ValidationError::UnsupportedFilter {
                    reason: "percent deadband requires an engineering-unit range".to_string(),
                });
            }
            _ => {}
        }
        Ok(Self { trigger, deadband })
    }

    /// Which changes count.
    #[must_use]
    pub const fn trigger(&self) -> DataChangeTrigger {
        self.trigger
    }

    /// Minimum numeric change that is reported.
    #[must_use]
    pub const fn deadband(&self) -> Deadband {
        self.deadband
    }

    /// Returns true if `new` should be reported given the last reported value.
    #[must_use]
    pub fn passes(&self, last: Option<&TimestampedValue>, new: &TimestampedValue) -> bool {
        let Some(last) = last else {
            return true;
        };
        if last.status != new.status {
            return true;
        }
        if self.trigger == DataChangeTrigger::Status {
            return false;
        }
        if self.value_changed(&last.value, &new.value) {
            return true;
        }
        self.trigger == DataChangeTrigger::StatusValueTimestamp && last.source_time != new.source_time
    }

    fn value_changed(&self, old: &Variant, new: &Variant) -> bool {
        let Deadband::Absolute(band) = self.deadband else {
            return old != new;
        };
        match (old, new) {
            (Variant::FloatArray(a), Variant::FloatArray(b)) if a.len() == b.len() => {
                a.iter().zip(b).any(|(x, y)| (x - y).abs() > band)
            }
            #[allow(clippy::cast_precision_loss)]
            (Variant::IntArray(a), Variant::IntArray(b)) if a.len() == b.len() => {
                a.iter().zip(b).any(|(x, y)| (*x as f64 - *y as f64).abs() > band)
            }
            _ => match (old.as_float(), new.as_float()) {
                (Some(x), Some(y)) => (x - y).abs() > band,
                _ => old != new,
            },
        }
    }
}

/// What an observer is interested in.
#[derive(Debug, Clone)]
pub enum MonitoredItem {
    /// Every produced value, unfiltered.
    Values,
    /// Value changes passing a data change filter.
    Data(DataChangeFilter),
    /// Events passing the filter's where clause, projected by its select clause.
    Events(EventFilter),
}

impl MonitoredItem {
    pub(crate) const fn wants_values(&self) -> bool {
        matches!(self, Self::Values | Self::Data(_))
    }

    pub(crate) const fn wants_events(&self) -> bool {
        matches!(self, Self::Events(_))
    }
}

/// A delivered notification.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    DataChange {
        handle: SubscriptionHandle,
        key: EntityKey,
        value: TimestampedValue,
    },
    Event {
        handle: SubscriptionHandle,
        key: EntityKey,
        event_id: EventId,
        /// Selected fields, in select clause order.
        fields: Vec<Variant>,
    },
}

impl Notification {
    #[must_use]
    pub const fn handle(&self) -> SubscriptionHandle {
        match self {
            Self::DataChange { handle, .. } | Self::Event { handle, .. } => *handle,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &EntityKey {
        match self {
            Self::DataChange { key, .. } | Self::Event { key, .. } => key,
        }
    }

    /// The sample carried by a data change.
    #[must_use]
    pub const fn value(&self) -> Option<&TimestampedValue> {
        match self {
            Self::DataChange { value, .. } => Some(value),
            Self::Event { .. } => None,
        }
    }
}
