//! Exclusive level alarm condition.
//!
//! A `LevelAlarm` watches one monitored value against four ascending limits.
//! At most one limit is active at a time (the most severe one crossed).
//!
//! ```text
//!         > high_high  -> 700 HighHigh
//!         > high       -> 500 High
//!         < low_low    -> 700 LowLow
//!         < low        -> 500 Low
//!         otherwise    -> inactive
//! ```
//!
//! Every state transition produces exactly one [`AlarmEvent`] carrying a fresh
//! event id; acknowledge, confirm and comment must name the id of the latest
//! event.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entity::EntityKey;
use crate::error::{AlarmError, ValidationError};
use crate::event::{fields, EventId, EventIdGenerator, EventRecord};
use crate::value::Variant;

/// Event type name carried by alarm events.
pub const LEVEL_ALARM_EVENT_TYPE: &str = "ExclusiveLevelAlarm";

/// Severity of a High or Low limit violation.
pub const SEVERITY_MEDIUM: u16 = 500;
/// Severity of a HighHigh or LowLow limit violation.
pub const SEVERITY_HIGH: u16 = 700;

/// The four alarm limits, strictly ascending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAlarmLimits")]
pub struct AlarmLimits {
    low_low: f64,
    low: f64,
    high: f64,
    high_high: f64,
}

#[derive(Deserialize)]
struct RawAlarmLimits {
    low_low: f64,
    low: f64,
    high: f64,
    high_high: f64,
}

impl TryFrom<RawAlarmLimits> for AlarmLimits {
    type Error = ValidationError;

    fn try_from(raw: RawAlarmLimits) -> Result<Self, Self::Error> {
        Self::new(raw.low_low, raw.low, raw.high, raw.high_high)
    }
}

impl AlarmLimits {
    /// Validates and builds the limits.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidAlarmLimits` unless all limits are
    /// finite and `low_low < low < high < high_high`.
    pub fn new(low_low: f64, low: f64, high: f64, high_high: f64) -> Result<Self, ValidationError> {
        let finite = [low_low, low, high, high_high].iter().all(|v| v.is_finite());
        if !finite || !(low_low < low && low < high && high < high_high) {
            return Err(ValidationError::InvalidAlarmLimits {
                low_low,
                low,
                high,
                high_high,
            });
        }
        Ok(Self {
            low_low,
            low,
            high,
            high_high,
        })
    }

    /// Lowest limit; below it the alarm is `LowLow`.
    #[must_use]
    pub const fn low_low(&self) -> f64 {
        self.low_low
    }

    /// Below this limit the alarm is `Low`.
    #[must_use]
    pub const fn low(&self) -> f64 {
        self.low
    }

    /// Above this limit the alarm is `High`.
    #[must_use]
    pub const fn high(&self) -> f64 {
        self.high
    }

    /// Highest limit; above it the alarm is `HighHigh`.
    #[must_use]
    pub const fn high_high(&self) -> f64 {
        self.high_high
    }

    /// Which limit `level` violates, with its severity.
    #[must_use]
    pub fn classify(&self, level: f64) -> Option<(u16, LimitState)> {
        if level > self.high_high {
            Some((SEVERITY_HIGH, LimitState::HighHigh))
        } else if level > self.high {
            Some((SEVERITY_MEDIUM, LimitState::High))
        } else if level < self.low_low {
            Some((SEVERITY_HIGH, LimitState::LowLow))
        } else if level < self.low {
            Some((SEVERITY_MEDIUM, LimitState::Low))
        } else {
            None
        }
    }
}

impl Default for AlarmLimits {
    fn default() -> Self {
        Self {
            low_low: 10.0,
            low: 30.0,
            high: 70.0,
            high_high: 90.0,
        }
    }
}

/// Currently violated limit.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitState {
    #[default]
    None,
    LowLow,
    Low,
    High,
    HighHigh,
}

impl fmt::Display for LimitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::LowLow => "LowLow",
            Self::Low => "Low",
            Self::High => "High",
            Self::HighHigh => "HighHigh",
        };
        f.write_str(name)
    }
}

/// What caused an alarm event.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmTransition {
    Activated,
    Inactivated,
    Acknowledged,
    Confirmed,
    Commented,
    Disabled,
}

/// Snapshot of the condition at the moment it emitted an event.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub event_id: EventId,
    pub source: EntityKey,
    pub time: DateTime<Utc>,
    pub transition: AlarmTransition,
    pub severity: u16,
    pub limit_state: LimitState,
    pub message: String,
    pub active: bool,
    pub acked: bool,
    pub confirmed: bool,
    pub enabled: bool,
    pub retain: bool,
    pub comment: Option<String>,
}

impl AlarmEvent {
    /// Converts to an event record with the standard and condition fields.
    #[must_use]
    pub fn to_record(&self) -> EventRecord {
        let record = EventRecord::base(
            self.event_id.clone(),
            LEVEL_ALARM_EVENT_TYPE,
            &self.source,
            self.time,
            self.message.clone(),
            self.severity,
        )
        .with_field(fields::CONDITION_NAME, self.source.as_str())
        .with_field(fields::ACTIVE_STATE, self.active)
        .with_field(fields::ACKED_STATE, self.acked)
        .with_field(fields::CONFIRMED_STATE, self.confirmed)
        .with_field(fields::ENABLED_STATE, self.enabled)
        .with_field(fields::RETAIN, self.retain)
        .with_field(fields::LIMIT_STATE, self.limit_state.to_string());

        match &self.comment {
            Some(comment) => record.with_field(fields::COMMENT, comment.as_str()),
            None => record.with_field(fields::COMMENT, Variant::Null),
        }
    }
}

/// Exclusive level alarm condition state machine.
#[derive(Debug)]
pub struct LevelAlarm {
    source: EntityKey,
    limits: AlarmLimits,
    ids: Arc<EventIdGenerator>,
    enabled: bool,
    active: bool,
    acked: bool,
    confirmed: bool,
    retain: bool,
    severity: u16,
    limit_state: LimitState,
    event_id: Option<EventId>,
    comment: Option<String>,
}

impl LevelAlarm {
    /// Creates an enabled, inactive alarm.
    #[must_use]
    pub fn new(source: impl Into<EntityKey>, limits: AlarmLimits, ids: Arc<EventIdGenerator>) -> Self {
        Self {
            source: source.into(),
            limits,
            ids,
            enabled: true,
            active: false,
            acked: true,
            confirmed: true,
            retain: false,
            severity: SEVERITY_MEDIUM,
            limit_state: LimitState::None,
            event_id: None,
            comment: None,
        }
    }

    /// Source entity the alarm reports on.
    #[must_use]
    pub const fn source(&self) -> &EntityKey {
        &self.source
    }

    /// Limits the level is checked against.
    #[must_use]
    pub const fn limits(&self) -> &AlarmLimits {
        &self.limits
    }

    /// Whether the alarm evaluates levels at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a limit is currently violated.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the latest activation was acknowledged.
    #[must_use]
    pub const fn is_acked(&self) -> bool {
        self.acked
    }

    /// Whether the latest activation was confirmed.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Whether the condition still needs operator attention.
    #[must_use]
    pub const fn retain(&self) -> bool {
        self.retain
    }

    /// Severity of the latest activation.
    #[must_use]
    pub const fn severity(&self) -> u16 {
        self.severity
    }

    /// Limit currently violated, `None` while inactive.
    #[must_use]
    pub const fn limit_state(&self) -> LimitState {
        self.limit_state
    }

    /// Id of the latest emitted event.
    #[must_use]
    pub const fn event_id(&self) -> Option<&EventId> {
        self.event_id.as_ref()
    }

    /// Last operator comment, if any.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Feeds a new level. A `Null` or non-numeric value inactivates.
    pub fn evaluate(&mut self, value: &Variant, time: DateTime<Utc>) -> Option<AlarmEvent> {
        let classified = value.as_float().map(|level| self.limits.classify(level));
        match classified {
            Some(Some((severity, limit))) => self.activate(severity, limit, time),
            Some(None) | None => self.inactivate(time),
        }
    }

    fn activate(&mut self, severity: u16, limit: LimitState, time: DateTime<Utc>) -> Option<AlarmEvent> {
        if !self.enabled || (self.active && self.severity == severity && self.limit_state == limit) {
            return None;
        }
        self.active = true;
        self.retain = true;
        self.acked = false;
        self.confirmed = false;
        self.severity = severity;
        self.limit_state = limit;
        info!(source = %self.source, severity, limit = %limit, "alarm activated");
        Some(self.emit(AlarmTransition::Activated, time, "Level exceeded"))
    }

    fn inactivate(&mut self, time: DateTime<Utc>) -> Option<AlarmEvent> {
        if !self.enabled || !self.active {
            return None;
        }
        self.active = false;
        self.retain = !self.acked;
        self.limit_state = LimitState::None;
        info!(source = %self.source, "alarm inactivated");
        Some(self.emit(AlarmTransition::Inactivated, time, "Level back to normal"))
    }

    fn check_event_id(&self, event_id: &EventId) -> Result<(), AlarmError> {
        if !self.enabled {
            return Err(AlarmError::Disabled {
                condition: self.source.to_string(),
            });
        }
        if self.event_id.as_ref() != Some(event_id) {
            return Err(AlarmError::EventIdUnknown {
                condition: self.source.to_string(),
                event_id: event_id.to_string(),
            });
        }
        Ok(())
    }

    /// Acknowledges the latest event.
    ///
    /// # Errors
    ///
    /// `Disabled`, `EventIdUnknown` if `event_id` is not the latest event, or
    /// `AlreadyAcked`.
    pub fn acknowledge(&mut self, event_id: &EventId, comment: Option<&str>) -> Result<AlarmEvent, AlarmError> {
        self.check_event_id(event_id)?;
        if self.acked {
            return Err(AlarmError::AlreadyAcked {
                condition: self.source.to_string(),
            });
        }
        self.acked = true;
        self.retain = self.active;
        if let Some(c) = comment {
            self.comment = Some(c.to_string());
        }
        info!(source = %self.source, "alarm acknowledged");
        Ok(self.emit(AlarmTransition::Acknowledged, Utc::now(), "Acknowledged"))
    }

    /// Confirms the latest event. Confirming an inactive condition clears
    /// retain.
    ///
    /// # Errors
    ///
    /// `Disabled`, `EventIdUnknown`, `AlreadyConfirmed`, or `InvalidState` if
    /// the condition is not acknowledged yet.
    pub fn confirm(&mut self, event_id: &EventId, comment: Option<&str>) -> Result<AlarmEvent, AlarmError> {
        self.check_event_id(event_id)?;
        if self.confirmed {
            return Err(AlarmError::AlreadyConfirmed {
                condition: self.source.to_string(),
            });
        }
        if !self.acked {
            return Err(AlarmError::InvalidState {
                condition: self.source.to_string(),
                reason: "can only be confirmed when acknowledged".to_string(),
            });
        }
        if !self.active {
            self.retain = false;
        }
        self.confirmed = true;
        if let Some(c) = comment {
            self.comment = Some(c.to_string());
        }
        info!(source = %self.source, "alarm confirmed");
        Ok(self.emit(AlarmTransition::Confirmed, Utc::now(), "Confirmed"))
    }

    /// Attaches a comment to the latest event.
    ///
    /// # Errors
    ///
    /// `Disabled` or `EventIdUnknown`.
    pub fn add_comment(&mut self, event_id: &EventId, comment: &str) -> Result<AlarmEvent, AlarmError> {
        self.check_event_id(event_id)?;
        self.comment = Some(comment.to_string());
        Ok(self.emit(AlarmTransition::Commented, Utc::now(), "Comment added"))
    }

    /// Enables the condition. Emits nothing; the next evaluation decides the
    /// state.
    pub fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            info!(source = %self.source, "alarm enabled");
        }
    }

    /// Disables the condition and clears retain. Emits an event if it was
    /// enabled.
    pub fn disable(&mut self) -> Option<AlarmEvent> {
        if !self.enabled {
            return None;
        }
        self.enabled = false;
        self.retain = false;
        info!(source = %self.source, "alarm disabled");
        Some(self.emit(AlarmTransition::Disabled, Utc::now(), "Disabled"))
    }

    fn emit(&mut self, transition: AlarmTransition, time: DateTime<Utc>, message: &str) -> AlarmEvent {
        let event_id = self.ids.next_id();
        self.event_id = Some(event_id.clone());
        AlarmEvent {
            event_id,
            source: self.source.clone(),
            time,
            transition,
            severity: self.severity,
            limit_state: self.limit_state,
            message: message.to_string(),
            active: self.active,
            acked: self.acked,
            confirmed: self.confirmed,
            enabled: self.enabled,
            retain: self.retain,
            comment: self.comment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FieldPath;

    fn alarm() -> LevelAlarm {
        LevelAlarm::new("MyLevel.Alarm", AlarmLimits::default(), Arc::new(EventIdGenerator::new()))
    }

    fn feed(alarm: &mut LevelAlarm, level: f64) -> Option<AlarmEvent> {
        alarm.evaluate(&Variant::Float(level), Utc::now())
    }

    #[test]
    fn test_limits_validation() {
        assert!(AlarmLimits::new(10.0, 30.0, 70.0, 90.0).is_ok());
        assert!(AlarmLimits::new(30.0, 10.0, 70.0, 90.0).is_err());
        assert!(AlarmLimits::new(10.0, 10.0, 70.0, 90.0).is_err());
        assert!(AlarmLimits::new(f64::NAN, 30.0, 70.0, 90.0).is_err());
    }

    #[test]
    fn test_deserialized_limits_are_validated() {
        let limits: AlarmLimits =
            serde_json::from_str(r#"{"low_low":5.0,"low":20.0,"high":80.0,"high_high":95.0}"#).unwrap();
        assert_eq!(limits, AlarmLimits::new(5.0, 20.0, 80.0, 95.0).unwrap());
        let swapped = r#"{"low_low":30.0,"low":10.0,"high":70.0,"high_high":90.0}"#;
        assert!(serde_json::from_str::<AlarmLimits>(swapped).is_err());
    }

    #[test]
    fn test_classify() {
        let limits = AlarmLimits::default();
        assert_eq!(limits.classify(95.0), Some((700, LimitState::HighHigh)));
        assert_eq!(limits.classify(75.0), Some((500, LimitState::High)));
        assert_eq!(limits.classify(50.0), None);
        assert_eq!(limits.classify(70.0), None);
        assert_eq!(limits.classify(20.0), Some((500, LimitState::Low)));
        assert_eq!(limits.classify(5.0), Some((700, LimitState::LowLow)));
    }

    #[test]
    fn test_alarm_sequence() {
        let mut a = alarm();
        let events: Vec<AlarmEvent> = [50.0, 75.0, 50.0, 5.0, 50.0]
            .into_iter()
            .filter_map(|v| feed(&mut a, v))
            .collect();

        assert_eq!(events.len(), 4);
        assert!(events[0].active);
        assert_eq!(events[0].severity, 500);
        assert_eq!(events[0].limit_state, LimitState::High);
        assert!(!events[1].active);
        assert!(events[2].active);
        assert_eq!(events[2].severity, 700);
        assert_eq!(events[2].limit_state, LimitState::LowLow);
        assert!(!events[3].active);
        assert_eq!(events[3].limit_state, LimitState::None);
    }

    #[test]
    fn test_same_severity_does_not_retrigger() {
        let mut a = alarm();
        assert!(feed(&mut a, 75.0).is_some());
        assert!(feed(&mut a, 80.0).is_none());
        assert!(feed(&mut a, 95.0).is_some());
        assert!(feed(&mut a, 99.0).is_none());
    }

    #[test]
    fn test_limit_change_at_same_severity_is_a_transition() {
        let mut a = alarm();
        let high = feed(&mut a, 75.0).unwrap();
        assert_eq!(high.limit_state, LimitState::High);

        let low = feed(&mut a, 25.0).unwrap();
        assert_eq!(low.transition, AlarmTransition::Activated);
        assert_eq!(low.severity, SEVERITY_MEDIUM);
        assert_eq!(low.limit_state, LimitState::Low);
        assert_ne!(low.event_id, high.event_id);
        assert_eq!(a.limit_state(), LimitState::Low);
        assert!(feed(&mut a, 22.0).is_none());
    }

    #[test]
    fn test_null_inactivates() {
        let mut a = alarm();
        feed(&mut a, 95.0);
        let event = a.evaluate(&Variant::Null, Utc::now()).unwrap();
        assert_eq!(event.transition, AlarmTransition::Inactivated);
        assert!(!a.is_active());
    }

    #[test]
    fn test_inactivation_retain_follows_ack() {
        let mut a = alarm();
        feed(&mut a, 95.0);
        assert!(a.retain());
        feed(&mut a, 50.0);
        assert!(a.retain(), "unacknowledged alarm stays retained");

        let id = a.event_id().cloned().unwrap();
        a.acknowledge(&id, None).unwrap();
        assert!(!a.retain());
    }

    #[test]
    fn test_acknowledge_and_confirm() {
        let mut a = alarm();
        let activated = feed(&mut a, 95.0).unwrap();

        let stale = EventId::from_bytes(vec![0; 16]);
        assert!(matches!(a.acknowledge(&stale, None), Err(AlarmError::EventIdUnknown { .. })));
        assert!(matches!(
            a.confirm(&activated.event_id, None),
            Err(AlarmError::InvalidState { .. })
        ));

        let acked = a.acknowledge(&activated.event_id, Some("seen")).unwrap();
        assert!(acked.acked);
        assert_eq!(acked.comment.as_deref(), Some("seen"));
        assert!(acked.retain, "active alarm stays retained after ack");
        assert!(matches!(
            a.acknowledge(&acked.event_id, None),
            Err(AlarmError::AlreadyAcked { .. })
        ));

        let confirmed = a.confirm(&acked.event_id, None).unwrap();
        assert!(confirmed.confirmed);
        assert!(confirmed.retain);
        assert!(matches!(
            a.confirm(&confirmed.event_id, None),
            Err(AlarmError::AlreadyConfirmed { .. })
        ));
    }

    #[test]
    fn test_confirm_inactive_clears_retain() {
        let mut a = alarm();
        feed(&mut a, 95.0);
        let inactive = feed(&mut a, 50.0).unwrap();
        let acked = a.acknowledge(&inactive.event_id, None).unwrap();
        let confirmed = a.confirm(&acked.event_id, None).unwrap();
        assert!(!confirmed.retain);
    }

    #[test]
    fn test_add_comment_emits_event() {
        let mut a = alarm();
        let e = feed(&mut a, 95.0).unwrap();
        let commented = a.add_comment(&e.event_id, "operator notified").unwrap();
        assert_eq!(commented.transition, AlarmTransition::Commented);
        assert_ne!(commented.event_id, e.event_id);
        assert_eq!(a.comment(), Some("operator notified"));
    }

    #[test]
    fn test_disable_and_enable() {
        let mut a = alarm();
        feed(&mut a, 95.0);
        let disabled = a.disable().unwrap();
        assert!(!disabled.enabled);
        assert!(!disabled.retain);
        assert!(a.disable().is_none());

        assert!(feed(&mut a, 50.0).is_none(), "disabled alarm ignores values");
        let id = a.event_id().cloned().unwrap();
        assert!(matches!(a.acknowledge(&id, None), Err(AlarmError::Disabled { .. })));

        a.enable();
        assert!(a.is_enabled());
    }

    #[test]
    fn test_to_record_fields() {
        let mut a = alarm();
        let event = feed(&mut a, 75.0).unwrap();
        let record = event.to_record();

        assert_eq!(record.event_id, event.event_id);
        assert_eq!(record.severity(), Some(500));
        let get = |name: &str| record.field(&FieldPath::from(name)).cloned();
        assert_eq!(get(fields::ACTIVE_STATE), Some(Variant::Bool(true)));
        assert_eq!(get(fields::ACKED_STATE), Some(Variant::Bool(false)));
        assert_eq!(get(fields::LIMIT_STATE), Some(Variant::from("High")));
        assert_eq!(get(fields::SOURCE_NAME), Some(Variant::from("MyLevel.Alarm")));
        assert_eq!(get(fields::EVENT_TYPE), Some(Variant::from(LEVEL_ALARM_EVENT_TYPE)));
        assert_eq!(get(fields::COMMENT), Some(Variant::Null));
    }
}
