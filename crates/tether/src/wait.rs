//! # Wait/Wake Primitive
//!
//! Paces the network worker between cycles.
//!
//! ## Design
//!
//! - One waiter (the worker), wakers on any thread
//! - `wait()` returns after `max_wait` or on a wake, whichever comes first
//! - A wake that lands while nobody is waiting is remembered, so the next
//!   `wait()` returns immediately instead of losing it
//!
//! `wake()` only does anything when explicit waking was enabled at
//! construction. `interrupt()` always wakes and is reserved for shutdown.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Timed condition the worker sleeps on.
pub struct WaitCondition {
    /// Whether `wake()` is honoured.
    can_explicitly_wake: bool,
    /// Longest single wait.
    max_wait: Duration,
    /// Pending wake flag.
    signaled: Mutex<bool>,
    /// Wakes the waiter.
    condvar: Condvar,
}

impl WaitCondition {
    /// Creates a wait condition.
    #[must_use]
    pub fn new(can_explicitly_wake: bool, max_wait: Duration) -> Self {
        Self {
            can_explicitly_wake,
            max_wait,
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until `max_wait` elapses or a wake arrives.
    ///
    /// Returns true if woken, false on timeout.
    pub fn wait(&self) -> bool {
        let mut signaled = self.signaled.lock();
        if !*signaled {
            self.condvar.wait_for(&mut signaled, self.max_wait);
        }
        std::mem::replace(&mut *signaled, false)
    }

    /// Wakes the waiter early. No-op unless explicit waking is enabled.
    pub fn wake(&self) {
        if self.can_explicitly_wake {
            self.signal();
        }
    }

    /// Wakes the waiter regardless of configuration.
    pub fn interrupt(&self) {
        self.signal();
    }

    /// Returns whether `wake()` is honoured.
    #[must_use]
    pub const fn can_explicitly_wake(&self) -> bool {
        self.can_explicitly_wake
    }

    /// Returns the longest single wait.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        self.max_wait
    }

    fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_one();
    }
}

impl std::fmt::Debug for WaitCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitCondition")
            .field("can_explicitly_wake", &self.can_explicitly_wake)
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out() {
        let condition = WaitCondition::new(true, Duration::from_millis(10));

        let start = Instant::now();
        let woken = condition.wait();

        assert!(!woken);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_wake_before_wait_is_remembered() {
        let condition = WaitCondition::new(true, Duration::from_secs(10));

        condition.wake();
        let start = Instant::now();
        assert!(condition.wait());
        assert!(start.elapsed() < Duration::from_secs(5));

        // Consumed by the first wait
        let condition = WaitCondition::new(true, Duration::from_millis(5));
        condition.wake();
        assert!(condition.wait());
        assert!(!condition.wait());
    }

    #[test]
    fn test_wake_is_noop_when_disabled() {
        let condition = WaitCondition::new(false, Duration::from_millis(20));

        condition.wake();
        let start = Instant::now();
        assert!(!condition.wait());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_interrupt_ignores_configuration() {
        let condition = WaitCondition::new(false, Duration::from_secs(10));

        condition.interrupt();
        assert!(condition.wait());
    }

    #[test]
    fn test_wake_from_other_thread() {
        let condition = Arc::new(WaitCondition::new(true, Duration::from_secs(10)));
        let waker = Arc::clone(&condition);

        let start = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            waker.wake();
        });

        assert!(condition.wait());
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
