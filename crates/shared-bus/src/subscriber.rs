//! # Event Subscriber
//!
//! Defines the subscription side of a typed event.

use tokio::sync::broadcast;
use tracing::debug;

/// A subscription handle for receiving triggers of an `Event<T>`.
pub struct Subscription<T> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(receiver: broadcast::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Receive the next payload.
    ///
    /// # Returns
    ///
    /// - `Some(payload)` - The next payload
    /// - `None` - The event was dropped
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some events dropped");
                }
            }
        }
    }
}
