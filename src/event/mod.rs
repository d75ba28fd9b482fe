//! Discrete events: ids, records and filters.

/// Where/select filtering of event records.
pub mod filter;
/// Event ids, field paths and records.
pub mod record;

pub use filter::{EventFilter, FilterExpr};
pub use record::{fields, EventId, EventIdGenerator, EventRecord, FieldPath, EVENT_ID_LEN};
