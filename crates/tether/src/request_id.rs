//! # Request-ID Allocator
//!
//! Hands out [`RequestId`]s in submission order.
//!
//! The counter is atomic so submissions may come from more than one
//! producer thread. It restarts at [`RequestId::FIRST`] whenever the
//! connection it belongs to is destroyed.

use std::sync::atomic::{AtomicI64, Ordering};

use tether_protocol::RequestId;

/// Monotonic request-id counter.
#[derive(Debug, Default)]
pub struct RequestIdAllocator {
    next: AtomicI64,
}

impl RequestIdAllocator {
    /// Creates an allocator starting at [`RequestId::FIRST`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicI64::new(RequestId::FIRST.0),
        }
    }

    /// Returns the next id and advances the counter.
    #[inline]
    pub fn allocate(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the id the next allocation will produce.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> RequestId {
        RequestId(self.next.load(Ordering::SeqCst))
    }

    /// Restarts the sequence.
    pub fn reset(&self) {
        self.next.store(RequestId::FIRST.0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_and_reset() {
        let allocator = RequestIdAllocator::new();

        assert_eq!(allocator.allocate(), RequestId(0));
        assert_eq!(allocator.allocate(), RequestId(1));
        assert_eq!(allocator.peek(), RequestId(2));

        allocator.reset();
        assert_eq!(allocator.peek(), RequestId::FIRST);
        assert_eq!(allocator.allocate(), RequestId(0));
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let allocator = Arc::new(RequestIdAllocator::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || (0..1000).map(|_| allocator.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }

        assert_eq!(seen.len(), 8000);
        assert_eq!(allocator.peek(), RequestId(8000));
    }
}
