use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::SubscriptionError;

use super::item::{Notification, SubscriptionHandle};
use super::registry::RegistryInner;

/// A bounded queue of notifications for one observer.
///
/// Producers never block on it: when the queue is full the notification is
/// dropped and counted. Dropping the stream unsubscribes.
#[derive(Debug)]
pub struct NotificationStream {
    handle: SubscriptionHandle,
    rx: Receiver<Notification>,
    registry: Weak<RegistryInner>,
    unsubscribed: AtomicBool,
}

impl NotificationStream {
    pub(crate) fn new(handle: SubscriptionHandle, rx: Receiver<Notification>, registry: Weak<RegistryInner>) -> Self {
        Self {
            handle,
            rx,
            registry,
            unsubscribed: AtomicBool::new(false),
        }
    }

    /// The subscription handle backing this stream.
    #[must_use]
    pub const fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Number of notifications waiting in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Explicit unsubscription. Idempotent; queued notifications stay readable.
    pub fn unsubscribe(&self) {
        if self.unsubscribed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.registry.upgrade() {
            let _ = inner.remove(self.handle);
        }
    }

    /// Receive the next notification (blocking).
    ///
    /// # Errors
    ///
    /// `Disconnected` once unsubscribed and drained.
    pub fn recv(&self) -> Result<Notification, SubscriptionError> {
        self.rx.recv().map_err(|_| SubscriptionError::Disconnected {
            handle: self.handle.to_string(),
        })
    }

    /// Receive the next notification with a timeout.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing arrived in time, `Disconnected` once unsubscribed
    /// and drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, SubscriptionError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            #[allow(clippy::cast_possible_truncation)]
            RecvTimeoutError::Timeout => SubscriptionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            },
            RecvTimeoutError::Disconnected => SubscriptionError::Disconnected {
                handle: self.handle.to_string(),
            },
        })
    }

    /// Next queued notification, if any.
    ///
    /// # Errors
    ///
    /// `Disconnected` once unsubscribed and drained.
    pub fn try_recv(&self) -> Result<Option<Notification>, SubscriptionError> {
        match self.rx.try_recv() {
            Ok(n) => Ok(Some(n)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SubscriptionError::Disconnected {
                handle: self.handle.to_string(),
            }),
        }
    }

    /// Drains everything currently queued.
    #[must_use]
    pub fn drain(&self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }
}

impl Drop for NotificationStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
