//! Periodic value producers and the loop that drives them.

use chrono::{DateTime, Utc};

use crate::engine::Engine;
use crate::error::HistorianResult;

/// The level measurement and its alarm.
pub mod level;
/// The periodic tick loop.
pub mod monitor_loop;
/// The sine data items.
pub mod sine;

pub use level::{LevelSimulation, LEVEL_ALARM_SOURCE, LEVEL_KEY};
pub use monitor_loop::{LoopState, MonitorLoop};
pub use sine::SineSimulation;

/// Something that produces values once per tick.
pub trait Simulation: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produces this tick's values into `engine`.
    ///
    /// # Errors
    ///
    /// Any engine failure. The loop logs it and keeps ticking.
    fn tick(&mut self, engine: &Engine, now: DateTime<Utc>) -> HistorianResult<()>;
}

fn _assert_simulation_object_safe(_: &dyn Simulation) {}
