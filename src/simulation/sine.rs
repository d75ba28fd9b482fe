use std::f64::consts::PI;

use chrono::{DateTime, Utc};

use crate::engine::Engine;
use crate::entity::EntityKey;
use crate::error::HistorianResult;
use crate::sample::TimestampedValue;

use super::Simulation;

/// A set of data items `DataItem0..DataItemN` sharing one sine wave.
///
/// Every tick advances the phase by one degree and sets every item to
/// `100 * sin(phase)`.
#[derive(Debug, Clone)]
pub struct SineSimulation {
    keys: Vec<EntityKey>,
    phase: f64,
}

impl SineSimulation {
    /// Simulation of `items` sine data items.
    #[must_use]
    pub fn new(items: usize) -> Self {
        Self {
            keys: (0..items).map(|i| EntityKey::new(format!("DataItem{i}"))).collect(),
            phase: 0.0,
        }
    }

    /// Keys of the simulated items, in index order.
    #[must_use]
    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }

    /// Advances the phase and returns the new value.
    fn advance(&mut self) -> f64 {
        self.phase += PI / 180.0;
        100.0 * self.phase.sin()
    }
}

impl Simulation for SineSimulation {
    fn name(&self) -> &str {
        "sine"
    }

    fn tick(&mut self, engine: &Engine, now: DateTime<Utc>) -> HistorianResult<()> {
        let value = self.advance();
        for key in &self.keys {
            engine.on_value_produced(key.clone(), TimestampedValue::good(value, now))?;
        }
        Ok(())
    }
}
