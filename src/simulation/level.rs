use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::alarm::LevelAlarm;
use crate::engine::Engine;
use crate::entity::EntityKey;
use crate::error::HistorianResult;
use crate::sample::TimestampedValue;
use crate::value::Variant;

use super::Simulation;

/// Entity key of the simulated level measurement.
pub const LEVEL_KEY: &str = "MyLevel";
/// Event source of the level alarm.
pub const LEVEL_ALARM_SOURCE: &str = "MyLevel.Alarm";

#[derive(Debug)]
enum Levels {
    Triangle { last: Option<f64>, step: f64 },
    Sequence { values: Vec<f64>, next: usize },
}

impl Levels {
    fn next(&mut self) -> Option<f64> {
        match self {
            Self::Triangle { last, step } => {
                let level = last.map_or(0.0, |l| l + *step);
                if level <= 0.0 {
                    *step = 1.0;
                } else if level >= 100.0 {
                    *step = -1.0;
                }
                *last = Some(level);
                Some(level)
            }
            Self::Sequence { values, next } => {
                let level = values.get(*next).copied()?;
                *next += 1;
                Some(level)
            }
        }
    }
}

/// Level measurement oscillating between 0 and 100, watched by a level alarm.
///
/// Each tick produces one value on [`LEVEL_KEY`], feeds it to the alarm and
/// publishes any alarm event under [`LEVEL_ALARM_SOURCE`].
#[derive(Debug)]
pub struct LevelSimulation {
    key: EntityKey,
    levels: Levels,
    alarm: Arc<Mutex<LevelAlarm>>,
}

impl LevelSimulation {
    /// Triangle wave starting at 0, stepping by 1.
    ///
    /// # Errors
    ///
    /// `InvalidAlarmLimits` if the configured limits are invalid.
    pub fn new(engine: &Engine) -> HistorianResult<Self> {
        Self::build(engine, Levels::Triangle { last: None, step: 1.0 })
    }

    /// Replays `values`, one per tick, then stops producing.
    ///
    /// # Errors
    ///
    /// `InvalidAlarmLimits` if the configured limits are invalid.
    pub fn with_sequence(engine: &Engine, values: Vec<f64>) -> HistorianResult<Self> {
        Self::build(engine, Levels::Sequence { values, next: 0 })
    }

    fn build(engine: &Engine, levels: Levels) -> HistorianResult<Self> {
        let config = &engine.config().alarm;
        let mut alarm = LevelAlarm::new(LEVEL_ALARM_SOURCE, config.limits()?, engine.event_ids());
        if !config.enabled {
            let _ = alarm.disable();
        }
        Ok(Self {
            key: EntityKey::from(LEVEL_KEY),
            levels,
            alarm: Arc::new(Mutex::new(alarm)),
        })
    }

    /// The alarm, shared so callers can acknowledge and confirm it.
    #[must_use]
    pub fn alarm(&self) -> Arc<Mutex<LevelAlarm>> {
        Arc::clone(&self.alarm)
    }
}

impl Simulation for LevelSimulation {
    fn name(&self) -> &str {
        LEVEL_KEY
    }

    fn tick(&mut self, engine: &Engine, now: DateTime<Utc>) -> HistorianResult<()> {
        let Some(level) = self.levels.next() else {
            return Ok(());
        };
        engine.on_value_produced(self.key.clone(), TimestampedValue::good(level, now))?;

        let event = self
            .alarm
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evaluate(&Variant::Float(level), now);
        if let Some(event) = event {
            engine.publish_alarm_event(&event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistorianConfig;

    #[test]
    fn test_triangle_turns_at_bounds() {
        let mut levels = Levels::Triangle { last: None, step: 1.0 };
        let first: Vec<f64> = (0..3).filter_map(|_| levels.next()).collect();
        assert_eq!(first, vec![0.0, 1.0, 2.0]);

        let mut levels = Levels::Triangle {
            last: Some(99.0),
            step: 1.0,
        };
        let turn: Vec<f64> = (0..3).filter_map(|_| levels.next()).collect();
        assert_eq!(turn, vec![100.0, 99.0, 98.0]);
    }

    #[test]
    fn test_sequence_runs_out() {
        let engine = Engine::new(HistorianConfig::default()).unwrap();
        let mut sim = LevelSimulation::with_sequence(&engine, vec![50.0]).unwrap();
        sim.tick(&engine, Utc::now()).unwrap();
        sim.tick(&engine, Utc::now()).unwrap();
        let entity = engine.entity(&EntityKey::from(LEVEL_KEY)).unwrap();
        assert_eq!(entity.revision, 1);
    }

    #[test]
    fn test_disabled_alarm_from_config() {
        let mut config = HistorianConfig::default();
        config.alarm.enabled = false;
        let engine = Engine::new(config).unwrap();
        let mut sim = LevelSimulation::with_sequence(&engine, vec![95.0]).unwrap();
        sim.tick(&engine, Utc::now()).unwrap();
        let alarm = sim.alarm();
        let alarm = alarm.lock().unwrap();
        assert!(!alarm.is_enabled());
        assert!(!alarm.is_active());
    }
}
