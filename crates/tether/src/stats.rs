//! # Bridge Statistics
//!
//! Counters updated from both sides of the bridge.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared between the owner and the network worker.
#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Messages accepted by the outgoing queue.
    pub messages_enqueued: AtomicU64,
    /// Messages handed to the connection.
    pub messages_sent: AtomicU64,
    /// Messages dropped because their connection was destroyed first.
    pub messages_discarded: AtomicU64,
    /// Non-empty op lists pushed to the incoming queue.
    pub op_lists_received: AtomicU64,
    /// Polls that returned nothing.
    pub empty_polls: AtomicU64,
    /// Explicit flushes issued to the connection.
    pub connection_flushes: AtomicU64,
    /// Poll/send cycles completed.
    pub cycles: AtomicU64,
    /// Times the poll interval had to be raised to the minimum.
    pub interval_clamps: AtomicU64,
}

/// Plain copy of [`BridgeStats`] at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages accepted by the outgoing queue.
    pub messages_enqueued: u64,
    /// Messages handed to the connection.
    pub messages_sent: u64,
    /// Messages dropped because their connection was destroyed first.
    pub messages_discarded: u64,
    /// Non-empty op lists pushed to the incoming queue.
    pub op_lists_received: u64,
    /// Polls that returned nothing.
    pub empty_polls: u64,
    /// Explicit flushes issued to the connection.
    pub connection_flushes: u64,
    /// Poll/send cycles completed.
    pub cycles: u64,
    /// Times the poll interval had to be raised to the minimum.
    pub interval_clamps: u64,
}

impl BridgeStats {
    /// Adds `n` to a counter.
    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_discarded: self.messages_discarded.load(Ordering::Relaxed),
            op_lists_received: self.op_lists_received.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            connection_flushes: self.connection_flushes.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            interval_clamps: self.interval_clamps.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Messages still waiting in the queue when this snapshot was taken.
    #[must_use]
    pub const fn in_flight(&self) -> u64 {
        self.messages_enqueued
            .saturating_sub(self.messages_sent)
            .saturating_sub(self.messages_discarded)
    }
}
