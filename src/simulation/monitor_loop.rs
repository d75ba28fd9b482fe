use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, tick, Sender};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::engine::Engine;
use crate::error::{HistorianError, HistorianResult, ValidationError};

use super::Simulation;

/// Lifecycle state of a [`MonitorLoop`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Stopped,
    Running,
}

struct Shared {
    engine: Arc<Engine>,
    simulations: Mutex<Vec<Box<dyn Simulation>>>,
    ticks: AtomicU64,
}

impl Shared {
    // The simulations mutex serialises ticks: a manual tick never overlaps a
    // scheduled one.
    fn tick(&self, now: DateTime<Utc>) {
        let mut simulations = self.simulations.lock().unwrap_or_else(PoisonError::into_inner);
        for simulation in simulations.iter_mut() {
            if let Err(err) = simulation.tick(&self.engine, now) {
                error!(simulation = simulation.name(), %err, "simulation tick failed");
            }
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}

struct Worker {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

/// Drives simulations at a fixed period on a dedicated thread.
///
/// `start` and `stop` are idempotent. `stop` waits for an in-flight tick and
/// returns once the worker has exited, so no tick runs after it returns.
pub struct MonitorLoop {
    shared: Arc<Shared>,
    period: Duration,
    worker: Mutex<Option<Worker>>,
}

impl fmt::Debug for MonitorLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorLoop")
            .field("period", &self.period)
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish_non_exhaustive()
    }
}

impl MonitorLoop {
    /// Creates a stopped loop.
    ///
    /// # Errors
    ///
    /// `ZeroTickPeriod` if `period` is zero.
    pub fn new(engine: Arc<Engine>, period: Duration) -> Result<Self, ValidationError> {
        if period.is_zero() {
            return Err(ValidationError::ZeroTickPeriod);
        }
        Ok(Self {
            shared: Arc::new(Shared {
                engine,
                simulations: Mutex::new(Vec::new()),
                ticks: AtomicU64::new(0),
            }),
            period,
            worker: Mutex::new(None),
        })
    }

    /// Creates a stopped loop ticking at the engine's configured period.
    ///
    /// # Errors
    ///
    /// `ZeroTickPeriod` if the configured period is zero.
    pub fn from_config(engine: Arc<Engine>) -> Result<Self, ValidationError> {
        let period = engine.config().tick_period();
        Self::new(engine, period)
    }

    /// Engine the simulations feed.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.shared.engine
    }

    /// Time between scheduled ticks.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Adds a simulation; it runs from the next tick on.
    pub fn add_simulation(&self, simulation: impl Simulation + 'static) {
        let mut simulations = self.shared.simulations.lock().unwrap_or_else(PoisonError::into_inner);
        simulations.push(Box::new(simulation));
    }

    /// Starts ticking. No-op if already running.
    ///
    /// # Errors
    ///
    /// Internal error if the worker thread cannot be spawned.
    pub fn start(&self) -> HistorianResult<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let period = self.period;
        let join = thread::Builder::new()
            .name("historian-monitor".to_string())
            .spawn(move || {
                let ticker = tick(period);
                loop {
                    select! {
                        recv(ticker) -> _ => shared.tick(Utc::now()),
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .map_err(|err| HistorianError::internal(format!("failed to spawn monitor loop: {err}")))?;

        *worker = Some(Worker { stop_tx, join });
        info!(period_ms = self.period.as_millis(), "monitor loop started");
        Ok(())
    }

    /// Stops ticking and joins the worker. No-op if already stopped.
    pub fn stop(&self) {
        let taken = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Worker { stop_tx, join }) = taken else {
            return;
        };
        let _ = stop_tx.send(());
        if join.join().is_err() {
            error!("monitor loop worker panicked");
        }
        info!(ticks = self.ticks(), "monitor loop stopped");
    }

    /// Whether the loop is currently ticking.
    #[must_use]
    pub fn state(&self) -> LoopState {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    /// Runs one tick on the calling thread, serialised with scheduled ticks.
    pub fn tick_once(&self, now: DateTime<Utc>) {
        self.shared.tick(now);
    }

    /// Ticks completed so far, scheduled and manual.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for MonitorLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
