//! # Bridge Queues
//!
//! The two hand-off points between the owner thread and the network worker.
//!
//! ```text
//!   owner ──push──> [OutgoingQueue] ──drain──> worker ──> connection
//!   owner <─take─── [OpListQueue]  <──push─── worker <── connection
//! ```
//!
//! ## Design
//!
//! Both are unbounded `crossbeam_channel` pairs. Producers never block
//! and never fail while the queue exists. Each side keeps a clone of both
//! ends so either can be drained from whichever thread currently owns
//! the work (the worker in background mode, the owner in inline mode).

use crossbeam_channel::{unbounded, Receiver, Sender};

use tether_protocol::{OpList, OutgoingMessage};

/// FIFO of messages waiting to be sent.
#[derive(Clone, Debug)]
pub struct OutgoingQueue {
    sender: Sender<OutgoingMessage>,
    receiver: Receiver<OutgoingMessage>,
}

impl OutgoingQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Appends a message. Never blocks.
    pub fn push(&self, message: OutgoingMessage) {
        // Both ends are owned by this struct, so the channel cannot be
        // disconnected while `self` is alive.
        let _ = self.sender.send(message);
    }

    /// Pops the oldest message, if any.
    #[must_use]
    pub fn pop(&self) -> Option<OutgoingMessage> {
        self.receiver.try_recv().ok()
    }

    /// Removes and returns every queued message, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<OutgoingMessage> {
        self.receiver.try_iter().collect()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for OutgoingQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// FIFO of received op lists waiting for the simulation tick.
#[derive(Clone, Debug)]
pub struct OpListQueue {
    sender: Sender<OpList>,
    receiver: Receiver<OpList>,
}

impl OpListQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Appends a batch. Never blocks.
    pub fn push(&self, op_list: OpList) {
        let _ = self.sender.send(op_list);
    }

    /// Removes and returns every queued batch, oldest first.
    #[must_use]
    pub fn take_all(&self) -> Vec<OpList> {
        self.receiver.try_iter().collect()
    }

    /// Number of queued batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for OpListQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tether_protocol::{EntityId, Op};

    fn delete(id: i64) -> OutgoingMessage {
        OutgoingMessage::DeleteEntity { entity_id: EntityId(id) }
    }

    #[test]
    fn test_outgoing_fifo() {
        let queue = OutgoingQueue::new();
        for id in 0..5 {
            queue.push(delete(id));
        }

        assert_eq!(queue.len(), 5);
        assert_eq!(queue.pop(), Some(delete(0)));

        let rest = queue.drain();
        assert_eq!(rest, (1..5).map(delete).collect::<Vec<_>>());
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_outgoing_cross_thread_order() {
        let queue = OutgoingQueue::new();
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            for id in 0..1000 {
                producer.push(delete(id));
            }
        });
        handle.join().unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 1000);
        for (index, message) in drained.iter().enumerate() {
            assert_eq!(message.entity_id(), Some(EntityId(index as i64)));
        }
    }

    #[test]
    fn test_op_list_take_all_empties_queue() {
        let queue = OpListQueue::new();
        for id in 1..=3 {
            queue.push(OpList::new(vec![Op::AddEntity { entity_id: EntityId(id) }]));
        }

        let batches = queue.take_all();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].ops[0], Op::AddEntity { entity_id: EntityId(1) });
        assert_eq!(batches[2].ops[0], Op::AddEntity { entity_id: EntityId(3) });
        assert!(queue.is_empty());
        assert!(queue.take_all().is_empty());
    }
}
