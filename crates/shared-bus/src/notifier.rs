//! # Value Notifier
//!
//! Keyed one-shot signals. Any number of listeners can wait on the same key;
//! `notify(key)` signals every listener registered for it at that moment.
//! Signalling does not deregister a listener. A listener is removed when its
//! handle is dropped or `deregister` is called.
//!
//! A notification that arrives before anyone waits is not lost: the listener
//! remembers it and `wait` returns immediately.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::trace;

#[derive(Default)]
struct ListenerState {
    triggered: AtomicBool,
    notify: Notify,
}

impl ListenerState {
    fn signal(&self) {
        self.triggered.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

type ListenerMap<K> = Mutex<HashMap<K, HashMap<u64, Arc<ListenerState>>>>;

/// Registry of listeners waiting for keys to be signalled.
pub struct ValueNotifier<K> {
    listeners: Arc<ListenerMap<K>>,
    next_id: AtomicU64,
}

impl<K: Eq + Hash + Clone> ValueNotifier<K> {
    /// Create an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new listener for `key`.
    #[must_use = "dropping the listener deregisters it"]
    pub fn listener(&self, key: K) -> Listener<K> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ListenerState::default());

        self.listeners
            .lock()
            .entry(key.clone())
            .or_default()
            .insert(id, state.clone());

        Listener {
            key,
            id,
            state,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Signal every listener currently registered for `key`.
    ///
    /// Returns the number of listeners signalled.
    pub fn notify(&self, key: &K) -> usize {
        let states: Vec<Arc<ListenerState>> = match self.listeners.lock().get(key) {
            Some(listeners) => listeners.values().cloned().collect(),
            None => return 0,
        };

        for state in &states {
            state.signal();
        }
        trace!(listeners = states.len(), "Value notified");
        states.len()
    }

    /// Signal every listener whose key satisfies `predicate`.
    ///
    /// Returns the number of listeners signalled.
    pub fn notify_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let states: Vec<Arc<ListenerState>> = self
            .listeners
            .lock()
            .iter()
            .filter(|(key, _)| predicate(key))
            .flat_map(|(_, listeners)| listeners.values().cloned())
            .collect();

        for state in &states {
            state.signal();
        }
        states.len()
    }

    /// Number of listeners registered for `key`.
    #[must_use]
    pub fn listener_count(&self, key: &K) -> usize {
        self.listeners.lock().get(key).map_or(0, HashMap::len)
    }

    /// Whether any listener is registered for `key`.
    #[must_use]
    pub fn has_listeners(&self, key: &K) -> bool {
        self.listener_count(key) > 0
    }

    /// Number of distinct keys with at least one listener.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<K: Eq + Hash + Clone> Default for ValueNotifier<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for ValueNotifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueNotifier")
            .field("keys", &self.listeners.lock().len())
            .finish()
    }
}

/// A single listener for one key.
pub struct Listener<K: Eq + Hash> {
    key: K,
    id: u64,
    state: Arc<ListenerState>,
    listeners: Weak<ListenerMap<K>>,
}

impl<K: Eq + Hash> Listener<K> {
    /// Key this listener waits for.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether the key has been signalled.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.state.triggered.load(Ordering::Acquire)
    }

    /// Wait until the key is signalled. Returns immediately if it already was.
    ///
    /// Any number of tasks may wait on the same listener; all of them wake.
    pub async fn wait(&self) {
        loop {
            // Armed before the flag check so a signal in between is not missed.
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Remove the listener from its notifier.
    pub fn deregister(self) {
        drop(self);
    }
}

impl<K: Eq + Hash> Drop for Listener<K> {
    fn drop(&mut self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut listeners = listeners.lock();
        let Some(for_key) = listeners.get_mut(&self.key) else {
            return;
        };

        for_key.remove(&self.id);
        if for_key.is_empty() {
            listeners.remove(&self.key);
        }
    }
}

impl<K: Eq + Hash + fmt::Debug> fmt::Debug for Listener<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("key", &self.key)
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_notify_before_wait() {
        let notifier: ValueNotifier<u32> = ValueNotifier::new();
        let listener = notifier.listener(1);

        assert_eq!(notifier.notify(&1), 1);
        assert!(listener.is_triggered());
        timeout(Duration::from_millis(100), listener.wait())
            .await
            .expect("already signalled");
    }

    #[tokio::test]
    async fn test_notify_wakes_waiter() {
        let notifier = Arc::new(ValueNotifier::<u32>::new());
        let listener = notifier.listener(9);

        let waiter = tokio::spawn(async move {
            listener.wait().await;
            listener.is_triggered()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        notifier.notify(&9);

        let triggered = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("timeout")
            .expect("join");
        assert!(triggered);
    }

    #[tokio::test]
    async fn test_shared_listener_wakes_every_waiter() {
        let notifier = ValueNotifier::<u32>::new();
        let listener = Arc::new(notifier.listener(1));

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let listener = listener.clone();
                tokio::spawn(async move { listener.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        notifier.notify(&1);

        for waiter in waiters {
            timeout(Duration::from_secs(1), waiter)
                .await
                .expect("every waiter wakes")
                .expect("join");
        }
        assert!(listener.is_triggered());
    }

    #[test]
    fn test_all_listeners_of_key_signalled() {
        let notifier: ValueNotifier<&str> = ValueNotifier::new();
        let a = notifier.listener("block");
        let b = notifier.listener("block");
        let other = notifier.listener("other");

        assert_eq!(notifier.notify(&"block"), 2);
        assert!(a.is_triggered());
        assert!(b.is_triggered());
        assert!(!other.is_triggered());
    }

    #[test]
    fn test_signal_does_not_deregister() {
        let notifier: ValueNotifier<u32> = ValueNotifier::new();
        let listener = notifier.listener(3);

        notifier.notify(&3);
        assert_eq!(notifier.listener_count(&3), 1);

        listener.deregister();
        assert_eq!(notifier.listener_count(&3), 0);
        assert_eq!(notifier.key_count(), 0);
    }

    #[test]
    fn test_drop_removes_only_own_listener() {
        let notifier: ValueNotifier<u32> = ValueNotifier::new();
        let first = notifier.listener(5);
        let second = notifier.listener(5);

        drop(first);
        assert_eq!(notifier.listener_count(&5), 1);
        assert_eq!(notifier.notify(&5), 1);
        assert!(second.is_triggered());
    }

    #[test]
    fn test_notify_where() {
        let notifier: ValueNotifier<u32> = ValueNotifier::new();
        let low = notifier.listener(4);
        let reached = notifier.listener(10);
        let future = notifier.listener(11);

        assert_eq!(notifier.notify_where(|slot| *slot <= 10), 2);
        assert!(low.is_triggered());
        assert!(reached.is_triggered());
        assert!(!future.is_triggered());
    }

    #[test]
    fn test_notify_unknown_key() {
        let notifier: ValueNotifier<u32> = ValueNotifier::new();
        assert_eq!(notifier.notify(&42), 0);
    }
}
