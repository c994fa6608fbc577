//! # Shared Bus - Typed Events and Value Notifiers
//!
//! Observer primitives owned by the components that emit through them.
//! There are no global emitters: every `Event<T>` or `ValueNotifier<K>` is a
//! field of the component that triggers it and is handed to dependents by
//! reference.
//!
//! ## Primitives
//!
//! ```text
//! ┌──────────────┐   trigger(&T)   ┌──────────────┐ ──→ hooks (sync, in order)
//! │  Component   │ ──────────────→ │   Event<T>   │
//! └──────────────┘                 └──────────────┘ ──→ subscriptions (async)
//!
//! ┌──────────────┐   notify(&K)    ┌──────────────┐ ──→ every Listener for K
//! │  Component   │ ──────────────→ │ValueNotifier │
//! └──────────────┘                 └──────────────┘
//! ```
//!
//! - `Event<T>`: strongly typed fan-out. Hooks run synchronously on the
//!   triggering task; subscriptions receive clones through a broadcast channel.
//! - `ValueNotifier<K>`: any number of independent listeners per key; a
//!   notification signals all of them without deregistering any.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod notifier;
pub mod publisher;
pub mod subscriber;

pub use notifier::{Listener, ValueNotifier};
pub use publisher::{Event, Hook};
pub use subscriber::Subscription;

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
