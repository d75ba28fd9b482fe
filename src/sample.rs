//! Timestamped samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quality::StatusCode;
use crate::value::Variant;

/// A value with its quality and timestamps. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedValue {
    /// The sampled value.
    pub value: Variant,
    /// Quality of the sample.
    pub status: StatusCode,
    /// When the value was sampled at its source. History is ordered by this.
    pub source_time: DateTime<Utc>,
    /// When the value was received by the server.
    pub server_time: DateTime<Utc>,
}

impl TimestampedValue {
    /// A sample with explicit status and timestamps.
    #[must_use]
    pub const fn new(
        value: Variant,
        status: StatusCode,
        source_time: DateTime<Utc>,
        server_time: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            status,
            source_time,
            server_time,
        }
    }

    /// A good-quality sample taken at `source_time` and received now.
    #[must_use]
    pub fn good(value: impl Into<Variant>, source_time: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            status: StatusCode::Good,
            source_time,
            server_time: Utc::now(),
        }
    }

    /// Placeholder returned when nothing is stored at or before `requested`.
    #[must_use]
    pub fn no_data(requested: DateTime<Utc>) -> Self {
        Self {
            value: Variant::Null,
            status: StatusCode::BadNoData,
            source_time: requested,
            server_time: requested,
        }
    }

    /// Copy of this sample with both timestamps forced to `at`.
    #[must_use]
    pub fn at(&self, at: DateTime<Utc>) -> Self {
        Self {
            value: self.value.clone(),
            status: self.status,
            source_time: at,
            server_time: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_good_sample() {
        let now = Utc::now();
        let v = TimestampedValue::good(12.0, now);
        assert_eq!(v.status, StatusCode::Good);
        assert_eq!(v.source_time, now);
        assert_eq!(v.value, Variant::Float(12.0));
    }

    #[test]
    fn test_no_data_sample() {
        let now = Utc::now();
        let v = TimestampedValue::no_data(now);
        assert!(v.status.is_bad());
        assert!(v.value.is_null());
        assert_eq!(v.source_time, now);
    }

    #[test]
    fn test_at_rewrites_timestamps_only() {
        let then = DateTime::<Utc>::UNIX_EPOCH;
        let v = TimestampedValue::new(Variant::Int(1), StatusCode::UncertainLastUsableValue, then, then);
        let now = Utc::now();
        let moved = v.at(now);
        assert_eq!(moved.value, v.value);
        assert_eq!(moved.status, v.status);
        assert_eq!(moved.source_time, now);
        assert_eq!(moved.server_time, now);
    }
}
