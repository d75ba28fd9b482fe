//! Time bounds for history queries.
//!
//! History reads take a start and an end time, either of which may be left
//! undefined (`None`). Which of the two is defined decides the scan direction:
//! - **Forward** from the oldest entry when the start is defined, or when the
//!   end is undefined (this includes "both undefined", which returns all data).
//! - **Backward** from the newest entry when only the end is defined.
//!
//! The rule is asymmetric on purpose: continuation points are offsets into the
//! scan, so the direction must be stable across paginated calls.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Direction in which a history scan walks the stored entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// Oldest to newest.
    Forward,
    /// Newest to oldest.
    Backward,
}

impl ScanDirection {
    /// Selects the scan direction for the given bounds.
    #[must_use]
    pub const fn for_bounds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        if start.is_some() || end.is_none() {
            Self::Forward
        } else {
            Self::Backward
        }
    }
}

/// Start/end bounds of a history read.
///
/// # Examples
///
/// ```
/// use historian::time::{HistoryBounds, ScanDirection};
/// use chrono::{DateTime, Utc};
///
/// let end = DateTime::<Utc>::UNIX_EPOCH;
/// let bounds = HistoryBounds::new(None, Some(end), true);
/// assert_eq!(bounds.direction(), ScanDirection::Backward);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryBounds {
    /// Lower bound; `None` means undefined.
    pub start: Option<DateTime<Utc>>,
    /// Upper bound; `None` means undefined.
    pub end: Option<DateTime<Utc>>,
    /// Whether entries exactly at a bound are part of the result.
    pub inclusive: bool,
}

impl HistoryBounds {
    /// Creates bounds from optional start and end times.
    #[must_use]
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>, inclusive: bool) -> Self {
        Self { start, end, inclusive }
    }

    /// Bounds with neither end defined: the whole history, oldest first.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: None,
            end: None,
            inclusive: true,
        }
    }

    /// Returns the scan direction for these bounds.
    #[must_use]
    pub const fn direction(&self) -> ScanDirection {
        ScanDirection::for_bounds(self.start, self.end)
    }

    /// Returns true if `t` lies beyond the end bound.
    #[must_use]
    pub fn is_past_end(&self, t: DateTime<Utc>) -> bool {
        match self.end {
            Some(end) => t > end || (!self.inclusive && t == end),
            None => false,
        }
    }

    /// Returns true if `t` satisfies the start bound.
    #[must_use]
    pub fn is_after_start(&self, t: DateTime<Utc>) -> bool {
        match self.start {
            Some(start) => t > start || (self.inclusive && t == start),
            None => true,
        }
    }

    /// Returns true if `t` lies within both bounds.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.is_after_start(t) && !self.is_past_end(t)
    }

    /// Rejects bounds whose start is after the end.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if both bounds are defined
    /// and `start > end`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
        }
        Ok(())
    }
}

impl Default for HistoryBounds {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for HistoryBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = if self.inclusive { ('[', ']') } else { ('(', ')') };
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, "{open}{s} → {e}{close}"),
            (Some(s), None) => write!(f, "{open}{s} → ∞)"),
            (None, Some(e)) => write!(f, "(-∞ → {e}{close}"),
            (None, None) => write!(f, "(-∞ → ∞)"),
        }
    }
}

/// Half-open deletion range `[start, end)`.
///
/// The end must always be defined; an undefined start deletes from the oldest
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeleteRange {
    /// Inclusive start; `None` deletes from the beginning.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl DeleteRange {
    /// Builds a delete range, requiring a defined end time.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UndefinedEndTime` when `end` is `None`.
    pub fn new(
        entity: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, ValidationError> {
        let Some(end) = end else {
            return Err(ValidationError::UndefinedEndTime {
                entity: entity.to_string(),
            });
        };
        Ok(Self { start, end })
    }

    /// Check if a timestamp falls within `[start, end)`.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| t >= s) && t < self.end
    }
}
