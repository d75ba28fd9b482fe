//! Error types for the historian.
//!
//! All errors are strongly typed using thiserror. Every failure is classified
//! into one of a small number of kinds (see [`ErrorKind`]) and carries enough
//! context (entity key, requested time or range) to be logged meaningfully.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Validation errors: structurally invalid input, fatal to the single call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("End time must be defined for a raw delete on '{entity}'")]
    UndefinedEndTime {
        entity: String,
    },

    #[error("Invalid time range: start ({start}) is after end ({end})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Alarm limits must be finite and strictly ascending (lowLow={low_low}, low={low}, high={high}, highHigh={high_high})")]
    InvalidAlarmLimits {
        low_low: f64,
        low: f64,
        high: f64,
        high_high: f64,
    },

    #[error("Capacity for '{field}' must be greater than zero")]
    ZeroCapacity {
        field: String,
    },

    #[error("Tick period must be greater than zero")]
    ZeroTickPeriod,

    #[error("Invalid deadband value {value}")]
    InvalidDeadband {
        value: f64,
    },

    #[error("Unsupported monitoring filter: {reason}")]
    UnsupportedFilter {
        reason: String,
    },

    #[error("Invalid like pattern '{pattern}': {reason}")]
    InvalidLikePattern {
        pattern: String,
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// History operation errors.
///
/// These are `Clone + PartialEq` so batch operations can report them per item
/// in a results array parallel to the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("No data for '{entity}': {detail}")]
    NoData {
        entity: String,
        detail: String,
    },

    #[error("History operation not supported: {operation}")]
    Unsupported {
        operation: String,
    },

    #[error("Internal history error: {message}")]
    Internal {
        message: String,
    },
}

impl HistoryError {
    /// Creates a `NoData` error for an entity.
    #[must_use]
    pub fn no_data(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NoData {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// Creates an `Unsupported` error for a named operation.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

/// Errors raised by alarm condition methods.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("Event id {event_id} is not the current event of condition '{condition}'")]
    EventIdUnknown {
        condition: String,
        event_id: String,
    },

    #[error("Condition '{condition}' is already acknowledged")]
    AlreadyAcked {
        condition: String,
    },

    #[error("Condition '{condition}' is already confirmed")]
    AlreadyConfirmed {
        condition: String,
    },

    #[error("Condition '{condition}' is in an invalid state: {reason}")]
    InvalidState {
        condition: String,
        reason: String,
    },

    #[error("Condition '{condition}' is disabled")]
    Disabled {
        condition: String,
    },
}

/// Subscription errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Unknown subscription handle: {handle}")]
    UnknownHandle {
        handle: String,
    },

    #[error("Notification stream disconnected: {handle}")]
    Disconnected {
        handle: String,
    },

    #[error("Timed out after {duration_ms}ms waiting for a notification")]
    Timeout {
        duration_ms: u64,
    },
}

/// Coarse classification of every error the crate can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input; the call failed, nothing else is affected.
    InvalidArgument,
    /// A requested entity, timestamp or event has no matching entry.
    NoData,
    /// The operation is not implemented by this historian.
    Unsupported,
    /// An alarm condition method was rejected.
    Alarm,
    /// A subscription handle or stream failed.
    Subscription,
    /// Unexpected internal failure.
    Internal,
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum HistorianError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Alarm error: {0}")]
    Alarm(#[from] AlarmError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl HistorianError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidArgument,
            Self::History(HistoryError::NoData { .. }) => ErrorKind::NoData,
            Self::History(HistoryError::Unsupported { .. }) => ErrorKind::Unsupported,
            Self::History(HistoryError::Internal { .. }) | Self::Internal { .. } => ErrorKind::Internal,
            Self::Alarm(_) => ErrorKind::Alarm,
            Self::Subscription(_) => ErrorKind::Subscription,
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a `NoData` history error.
    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::History(HistoryError::NoData { .. }))
    }

    /// Returns true if the operation is unsupported.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::History(HistoryError::Unsupported { .. }))
    }

    /// Returns true if this is an alarm condition error.
    #[must_use]
    pub const fn is_alarm(&self) -> bool {
        matches!(self, Self::Alarm(_))
    }

    /// Returns true if this is a subscription error.
    #[must_use]
    pub const fn is_subscription(&self) -> bool {
        matches!(self, Self::Subscription(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Internal)
    }
}

/// Result type alias for historian operations.
pub type HistorianResult<T> = Result<T, HistorianError>;
