//! Change notification to registered observers.

/// Handles, filters and notifications.
pub mod item;
/// The observer registry.
pub mod registry;
/// Channel-backed notification streams.
pub mod stream;

pub use item::{DataChangeFilter, DataChangeTrigger, Deadband, MonitoredItem, Notification, SubscriptionHandle};
pub use registry::SubscriptionRegistry;
pub use stream::NotificationStream;
