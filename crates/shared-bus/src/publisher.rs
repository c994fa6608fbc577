//! # Event Publisher
//!
//! Defines the triggering side of a typed event.
//!
//! An `Event<T>` has two kinds of consumers:
//!
//! - **Hooks**: closures run synchronously, in registration order, on the task
//!   that calls `trigger`. The hook list is snapshotted before any hook runs,
//!   so a hook may register or remove hooks without deadlocking.
//! - **Subscriptions**: async receivers fed through a broadcast channel. Slow
//!   subscribers lag and skip events rather than block the trigger.

use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::trace;

type HookFn<T> = Arc<dyn Fn(&T) + Send + Sync>;
type HookMap<T> = RwLock<BTreeMap<u64, HookFn<T>>>;

/// A strongly typed event owned by the component that triggers it.
pub struct Event<T> {
    /// Broadcast sender for async subscriptions.
    sender: broadcast::Sender<T>,

    /// Registered hooks keyed by registration order.
    hooks: Arc<HookMap<T>>,

    /// Next hook identifier.
    next_hook_id: AtomicU64,
}

impl<T: Clone + Send + 'static> Event<T> {
    /// Create an event with the default subscription capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an event with the given subscription capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            hooks: Arc::new(RwLock::new(BTreeMap::new())),
            next_hook_id: AtomicU64::new(0),
        }
    }

    /// Register a hook. The hook stays registered until the returned handle
    /// is dropped or `unhook` is called on it.
    #[must_use = "dropping the hook handle unregisters the hook"]
    pub fn hook<F>(&self, f: F) -> Hook<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_hook_id.fetch_add(1, Ordering::Relaxed);
        self.hooks.write().insert(id, Arc::new(f));

        Hook {
            id,
            hooks: Arc::downgrade(&self.hooks),
        }
    }

    /// Subscribe to future triggers.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription::new(self.sender.subscribe())
    }

    /// Deliver `payload` to every hook, then to every subscription.
    ///
    /// Returns the number of hooks and subscriptions that were reached.
    pub fn trigger(&self, payload: &T) -> usize {
        let hooks: Vec<HookFn<T>> = self.hooks.read().values().cloned().collect();
        for hook in &hooks {
            hook(payload);
        }

        let receivers = if self.sender.receiver_count() > 0 {
            self.sender.send(payload.clone()).unwrap_or(0)
        } else {
            0
        };

        trace!(hooks = hooks.len(), receivers, "Event triggered");
        hooks.len() + receivers
    }
}

impl<T: Clone + Send + 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("hooks", &self.hooks.read().len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// Registration handle of a hook. Dropping it removes the hook.
pub struct Hook<T> {
    id: u64,
    hooks: Weak<HookMap<T>>,
}

impl<T> Hook<T> {
    /// Remove the hook now.
    pub fn unhook(self) {
        drop(self);
    }
}

impl<T> Drop for Hook<T> {
    fn drop(&mut self) {
        if let Some(hooks) = self.hooks.upgrade() {
            hooks.write().remove(&self.id);
        }
    }
}

impl<T> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("id", &self.id).finish()
    }
}
