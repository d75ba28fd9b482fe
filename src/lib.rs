//! # historian - In-memory time-series history and change notification
//!
//! `historian` keeps bounded histories of timestamped variable values and
//! events, answers raw, stepped and filtered history reads with
//! continuation-point pagination, and fans out every produced value or event to
//! registered observers.
//!
//! ## Core Concepts
//!
//! - **Entity**: an addressable variable or event source, named by an [`EntityKey`]
//! - **Value history**: a capacity-bounded, time-ordered ring of [`TimestampedValue`]s
//! - **Event history**: a capacity-bounded ring of [`EventRecord`]s, read through an [`EventFilter`]
//! - **Subscription**: an observer registered on an entity, by callback or bounded stream
//! - **Level alarm**: an exclusive limit alarm emitting one event per state transition
//! - **Monitor loop**: a periodic tick driving simulations
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use historian::{Engine, EntityKey, HistorianConfig, MonitoredItem, ReadRawRequest, TimestampedValue};
//!
//! let engine = Engine::new(HistorianConfig::default()).unwrap();
//! engine.historize_values("MyLevel").unwrap();
//! let stream = engine.subscribe_stream("MyLevel", MonitoredItem::Values);
//!
//! let t0 = Utc.timestamp_opt(0, 0).unwrap();
//! for i in 0..3 {
//!     let value = TimestampedValue::good(f64::from(i), t0 + Duration::seconds(i64::from(i)));
//!     engine.on_value_produced("MyLevel", value).unwrap();
//! }
//!
//! let page = engine
//!     .read_history(&EntityKey::from("MyLevel"), &ReadRawRequest::all().with_max_values(2))
//!     .unwrap();
//! assert_eq!(page.items.len(), 2);
//! assert!(page.continuation.is_some());
//! assert_eq!(stream.drain().len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod entity;
pub mod error;
pub mod event;
pub mod quality;
pub mod sample;
pub mod time;
pub mod value;

// History and notification
pub mod historian;
pub mod storage;
pub mod subscription;

// Conditions, wiring and simulation
pub mod alarm;
pub mod config;
pub mod engine;
pub mod simulation;

// Re-export primary types at crate root for convenience
pub use alarm::{AlarmEvent, AlarmLimits, AlarmTransition, LevelAlarm, LimitState};
pub use config::{AlarmConfig, HistorianConfig};
pub use engine::Engine;
pub use entity::{EntityKey, MonitoredEntity};
pub use error::{
    AlarmError, ErrorKind, HistorianError, HistorianResult, HistoryError, SubscriptionError, ValidationError,
};
pub use event::{EventFilter, EventId, EventIdGenerator, EventRecord, FieldPath, FilterExpr};
pub use historian::Historian;
pub use quality::{Severity, StatusCode};
pub use sample::TimestampedValue;
pub use simulation::{LevelSimulation, LoopState, MonitorLoop, SineSimulation, Simulation};
pub use storage::{
    ContinuationPoint, EventDeletion, EventHistory, EventStore, HistoryPage, ReadEventsRequest, ReadRawRequest,
    ValueHistory, ValueStore,
};
pub use subscription::{
    DataChangeFilter, DataChangeTrigger, Deadband, MonitoredItem, Notification, NotificationStream, SubscriptionHandle,
    SubscriptionRegistry,
};
pub use time::{DeleteRange, HistoryBounds, ScanDirection};
pub use value::Variant;
