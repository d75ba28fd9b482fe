//! History storage.

/// Continuation points and paginated scans.
pub mod continuation;
/// In-memory event history.
pub mod event_history;
/// Store traits and read requests.
pub mod traits;
/// In-memory value history.
pub mod value_history;

pub use continuation::{ContinuationPoint, HistoryPage};
pub use event_history::{EventHistory, DEFAULT_EVENT_CAPACITY};
pub use traits::{EventDeletion, EventStore, ReadEventsRequest, ReadRawRequest, ValueStore};
pub use value_history::{ValueHistory, DEFAULT_VALUE_CAPACITY};

use crate::error::HistoryError;

fn lock_err(context: &'static str) -> HistoryError {
    HistoryError::Internal {
        message: format!("poisoned lock: {context}"),
    }
}
