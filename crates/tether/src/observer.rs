//! # Observer Lists
//!
//! Synchronous fan-out for cross-cutting instrumentation.
//!
//! ## Design
//!
//! - Callbacks run on the notifying thread, in registration order
//! - Notifying with no observers costs one read lock
//! - Callbacks are called from a snapshot taken under the lock, so a
//!   callback may register or remove observers without deadlocking
//! - After `remove` returns, the callback is not called by any later
//!   `notify`
//!
//! Observers only get a shared reference. They cannot reorder or mutate
//! what they observe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Handle returned by [`ObserverList::add`], used to remove the observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered list of callbacks for values of type `T`.
pub struct ObserverList<T: ?Sized> {
    observers: RwLock<Vec<(ObserverId, Arc<dyn Fn(&T) + Send + Sync>)>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> ObserverList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a callback. It fires after every earlier registration.
    pub fn add<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(callback)));
        id
    }

    /// Removes a callback. Returns false if it was not registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Calls every registered callback with `value`.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Arc<dyn Fn(&T) + Send + Sync>> = {
            let observers = self.observers.read();
            if observers.is_empty() {
                return;
            }
            observers.iter().map(|(_, callback)| Arc::clone(callback)).collect()
        };

        for callback in snapshot {
            callback(value);
        }
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl<T: ?Sized> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let list = ObserverList::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            list.add(move |value: &u32| log.lock().push(format!("{tag}{value}")));
        }

        list.notify(&1);
        list.notify(&2);

        assert_eq!(*log.lock(), vec!["a1", "b1", "c1", "a2", "b2", "c2"]);
    }

    #[test]
    fn test_remove_stops_delivery() {
        let list = ObserverList::<u32>::new();
        let count = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&count);
        let id = list.add(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        list.notify(&0);
        assert!(list.remove(id));
        assert!(!list.remove(id));
        list.notify(&0);

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn test_notify_without_observers() {
        let list = ObserverList::<str>::new();
        list.notify("nobody listening");
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_callback_may_register_during_notify() {
        let list = Arc::new(ObserverList::<u32>::new());
        let inner = Arc::clone(&list);

        list.add(move |_| {
            inner.add(|_| {});
        });

        list.notify(&0);
        assert_eq!(list.len(), 2);
    }
}
