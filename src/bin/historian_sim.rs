//! Historian simulation driver
//!
//! Runs the level and sine simulations for a number of ticks, logs alarm
//! events as they arrive and prints a history summary at the end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use historian::simulation::{LEVEL_ALARM_SOURCE, LEVEL_KEY};
use historian::{
    Engine, EntityKey, EventFilter, HistorianConfig, HistorianError, HistorianResult, LevelSimulation, MonitorLoop,
    MonitoredItem, Notification, ReadEventsRequest, ReadRawRequest, SineSimulation, Variant,
};

struct Args {
    ticks: u64,
    period_ms: Option<u64>,
    config: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            ticks: 200,
            period_ms: None,
            config: None,
        }
    }
}

fn value_of(args: &[String], i: usize, flag: &str) -> String {
    args.get(i + 1).cloned().unwrap_or_else(|| {
        eprintln!("error: {flag} requires a value");
        std::process::exit(1);
    })
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" | "-n" => {
                let raw = value_of(&args, i, "--ticks");
                parsed.ticks = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid tick count: {raw}");
                    std::process::exit(1);
                });
                i += 2;
            }
            "--period-ms" | "-p" => {
                let raw = value_of(&args, i, "--period-ms");
                parsed.period_ms = Some(raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid period: {raw}");
                    std::process::exit(1);
                }));
                i += 2;
            }
            "--config" | "-c" => {
                parsed.config = Some(PathBuf::from(value_of(&args, i, "--config")));
                i += 2;
            }
            "--help" | "-h" => {
                println!("historian-sim - level alarm and sine simulation");
                println!();
                println!("USAGE:");
                println!("    historian-sim [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -n, --ticks <N>           Ticks to run [default: 200]");
                println!("    -p, --period-ms <MS>      Tick period, overrides the config file");
                println!("    -c, --config <FILE>       JSON configuration file");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    parsed
}

fn fields_summary(fields: &[Variant]) -> String {
    fields.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ")
}

/// How long `ticks` periods take, or `None` if that does not fit a `Duration`.
fn run_duration(period: Duration, ticks: u64) -> Option<Duration> {
    period.checked_mul(u32::try_from(ticks).ok()?)
}

fn load_config(args: &Args) -> HistorianResult<HistorianConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|err| {
                historian::HistorianError::internal(format!("cannot read {}: {err}", path.display()))
            })?;
            HistorianConfig::from_json_str(&json)?
        }
        None => HistorianConfig::default(),
    };
    if let Some(period_ms) = args.period_ms {
        config.tick_period_ms = period_ms;
        config.validate()?;
    }
    Ok(config)
}

fn run(args: &Args) -> HistorianResult<()> {
    let config = load_config(args)?;
    let engine = Arc::new(Engine::new(config)?);
    engine.historize_values(LEVEL_KEY)?;
    engine.historize_events(LEVEL_ALARM_SOURCE)?;

    let level = LevelSimulation::new(&engine)?;
    let condition = level.alarm();
    let sine = SineSimulation::new(engine.config().sine_items);
    for key in sine.keys() {
        engine.historize_values(key.clone())?;
    }

    let alarms = engine.subscribe_stream(LEVEL_ALARM_SOURCE, MonitoredItem::Events(EventFilter::select_all_standard()));

    let monitor = MonitorLoop::from_config(Arc::clone(&engine))?;
    let deadline = run_duration(monitor.period(), args.ticks)
        .and_then(|duration| Instant::now().checked_add(duration))
        .ok_or_else(|| {
            HistorianError::internal(format!("{} ticks of {:?} overflow the clock", args.ticks, monitor.period()))
        })?;
    monitor.add_simulation(level);
    monitor.add_simulation(sine);
    monitor.start()?;

    while Instant::now() < deadline {
        let Ok(notification) = alarms.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        let Notification::Event { event_id, fields, .. } = notification else {
            continue;
        };
        info!(%event_id, fields = %fields_summary(&fields), "alarm event");

        // Acknowledge every new activation so the condition cycles through
        // its full state set.
        let mut alarm = match condition.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !alarm.is_active() || alarm.is_acked() || alarm.event_id() != Some(&event_id) {
            continue;
        }
        let outcome = alarm.acknowledge(&event_id, Some("acknowledged by simulator"));
        drop(alarm);
        match outcome {
            Ok(ack) => {
                engine.publish_alarm_event(&ack)?;
            }
            Err(err) => warn!(%err, "acknowledge failed"),
        }
    }

    monitor.stop();

    let level_key = EntityKey::from(LEVEL_KEY);
    let values = engine.read_history(&level_key, &ReadRawRequest::all())?;
    let events = engine.read_event_history(
        &EntityKey::from(LEVEL_ALARM_SOURCE),
        &ReadEventsRequest::new(None, None, EventFilter::select_all_standard()),
    )?;
    info!(
        ticks = monitor.ticks(),
        level_values = values.items.len(),
        alarm_events = events.items.len(),
        dropped = engine.registry().dropped_notifications(),
        "simulation finished"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args();
    if let Err(err) = run(&args) {
        error!(%err, "historian-sim failed");
        std::process::exit(1);
    }
}
