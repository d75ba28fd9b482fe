//! Runtime configuration, loaded from JSON.
//!
//! Every field has a default, so an empty object `{}` is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alarm::AlarmLimits;
use crate::error::ValidationError;

/// Level alarm settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Lowest limit; below it the alarm is `LowLow`.
    pub low_low: f64,
    /// Below this limit the alarm is `Low`.
    pub low: f64,
    /// Above this limit the alarm is `High`.
    pub high: f64,
    /// Highest limit; above it the alarm is `HighHigh`.
    pub high_high: f64,
    /// Whether the alarm starts enabled.
    pub enabled: bool,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            low_low: 10.0,
            low: 30.0,
            high: 70.0,
            high_high: 90.0,
            enabled: true,
        }
    }
}

impl AlarmConfig {
    /// The validated limits.
    ///
    /// # Errors
    ///
    /// `InvalidAlarmLimits` unless the limits are finite and strictly ascending.
    pub fn limits(&self) -> Result<AlarmLimits, ValidationError> {
        AlarmLimits::new(self.low_low, self.low, self.high, self.high_high)
    }
}

/// Historian configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorianConfig {
    /// Ring capacity of each value history.
    pub value_capacity: usize,
    /// Ring capacity of each event history.
    pub event_capacity: usize,
    /// Monitor loop period in milliseconds.
    pub tick_period_ms: u64,
    /// Queue capacity of each channel observer.
    pub stream_capacity: usize,
    /// Level alarm settings.
    pub alarm: AlarmConfig,
    /// Number of simulated sine data items.
    pub sine_items: usize,
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            value_capacity: 10_000,
            event_capacity: 10_000,
            tick_period_ms: 1_000,
            stream_capacity: 1_024,
            alarm: AlarmConfig::default(),
            sine_items: 10,
        }
    }
}

impl HistorianConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on malformed JSON, otherwise whatever
    /// [`validate`](Self::validate) rejects.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|err| ValidationError::InvalidConfig {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field rule.
    ///
    /// # Errors
    ///
    /// The first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, capacity) in [
            ("value_capacity", self.value_capacity),
            ("event_capacity", self.event_capacity),
            ("stream_capacity", self.stream_capacity),
        ] {
            if capacity == 0 {
                return Err(ValidationError::ZeroCapacity {
                    field: field.to_string(),
                });
            }
        }
        if self.tick_period_ms == 0 {
            return Err(ValidationError::ZeroTickPeriod);
        }
        self.alarm.limits()?;
        Ok(())
    }

    /// Monitor loop period.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }
}
