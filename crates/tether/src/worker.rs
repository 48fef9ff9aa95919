//! # Network Worker
//!
//! Moves ops in and messages out, either on a dedicated thread or inline
//! on the owner thread.
//!
//! ## Cycle
//!
//! ```text
//!   ┌──────────┐  wait/wake   ┌──────────┐  non-empty   ┌──────────────┐
//!   │   Idle   │ ───────────> │ Polling  │ ───────────> │ OpListQueue  │
//!   └──────────┘              └────┬─────┘              └──────────────┘
//!        ^                         │
//!        │                    ┌────▼─────┐  FIFO drain  ┌──────────────┐
//!        └─────────────────── │ Sending  │ ───────────> │  connection  │
//!                             └──────────┘  + flush     └──────────────┘
//! ```
//!
//! ## Design
//!
//! Polling and sending live in `Pump`, which owns the connection. Two
//! cycle drivers decide when a cycle runs:
//!
//! - `InlineDriver`: on the owner thread, whenever the owner flushes
//! - `BackgroundDriver`: on `tether-network-worker`, paced by a
//!   [`WaitCondition`]
//!
//! The driver is picked once, at install. Stop is cooperative: the
//! background loop checks for `StopRequested` at the top of each cycle and
//! never abandons a poll or send that already started.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::bounded;
use tether_protocol::{CommandParameters, OutgoingMessage, UpdateParameters};

use crate::connection::WorkerConnection;
use crate::error::BridgeError;
use crate::observer::ObserverList;
use crate::queue::{OpListQueue, OutgoingQueue};
use crate::stats::BridgeStats;
use crate::wait::WaitCondition;

/// Name of the background network thread.
pub const WORKER_THREAD_NAME: &str = "tether-network-worker";

/// Lifecycle of the background network thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadState {
    /// No thread, or ready to start one.
    NotStarted = 0,
    /// The loop is running.
    Running = 1,
    /// Shutdown asked the loop to exit after its current cycle.
    StopRequested = 2,
    /// The loop has exited.
    Stopped = 3,
}

impl ThreadState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::StopRequested,
            3 => Self::Stopped,
            _ => Self::NotStarted,
        }
    }
}

/// Where the worker currently is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoopPhase {
    /// Waiting for the next cycle.
    Idle = 0,
    /// Pulling ops from the connection.
    Polling = 1,
    /// Draining the outgoing queue.
    Sending = 2,
    /// No connection is being driven.
    Stopped = 3,
}

impl LoopPhase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Polling,
            2 => Self::Sending,
            _ => Self::Stopped,
        }
    }
}

/// State visible to both the owner and the network worker.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) outgoing: OutgoingQueue,
    pub(crate) incoming: OpListQueue,
    pub(crate) on_enqueue: ObserverList<OutgoingMessage>,
    pub(crate) on_dequeue: ObserverList<OutgoingMessage>,
    pub(crate) stats: BridgeStats,
    thread_state: AtomicU8,
    phase: AtomicU8,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            outgoing: OutgoingQueue::new(),
            incoming: OpListQueue::new(),
            on_enqueue: ObserverList::new(),
            on_dequeue: ObserverList::new(),
            stats: BridgeStats::default(),
            thread_state: AtomicU8::new(ThreadState::NotStarted as u8),
            phase: AtomicU8::new(LoopPhase::Stopped as u8),
        }
    }

    pub(crate) fn thread_state(&self) -> ThreadState {
        ThreadState::from_u8(self.thread_state.load(Ordering::Acquire))
    }

    pub(crate) fn set_thread_state(&self, state: ThreadState) {
        self.thread_state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn phase(&self) -> LoopPhase {
        LoopPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set_phase(&self, phase: LoopPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// Owns the connection and performs one poll/send cycle at a time.
pub(crate) struct Pump {
    connection: Box<dyn WorkerConnection>,
    shared: Arc<Shared>,
}

impl Pump {
    pub(crate) fn new(connection: Box<dyn WorkerConnection>, shared: Arc<Shared>) -> Self {
        Self { connection, shared }
    }

    /// Polls once and runs the send drain.
    pub(crate) fn run_cycle(&mut self) {
        self.queue_latest_op_list();
        self.process_outgoing_messages();
        BridgeStats::add(&self.shared.stats.cycles, 1);
        self.shared.set_phase(LoopPhase::Idle);
    }

    /// Pulls one op list without waiting. Empty lists are dropped here.
    fn queue_latest_op_list(&mut self) {
        self.shared.set_phase(LoopPhase::Polling);

        let op_list = self.connection.get_op_list(0);
        if op_list.is_empty() {
            BridgeStats::add(&self.shared.stats.empty_polls, 1);
            return;
        }

        self.shared.incoming.push(op_list);
        BridgeStats::add(&self.shared.stats.op_lists_received, 1);
    }

    /// Sends everything queued, oldest first, then flushes if anything
    /// went out. Returns the number of messages sent.
    fn process_outgoing_messages(&mut self) -> usize {
        self.shared.set_phase(LoopPhase::Sending);

        let mut sent = 0usize;
        while let Some(message) = self.shared.outgoing.pop() {
            self.shared.on_dequeue.notify(&message);
            dispatch(&mut *self.connection, message);
            sent += 1;
        }

        if sent > 0 {
            self.connection.flush();
            BridgeStats::add(&self.shared.stats.messages_sent, sent as u64);
            BridgeStats::add(&self.shared.stats.connection_flushes, 1);
        }

        sent
    }

    pub(crate) fn into_connection(self) -> Box<dyn WorkerConnection> {
        self.connection
    }
}

/// Issues the connection call matching a message.
///
/// Component mutations never loop back to this worker. Requests go out
/// with the runtime's default timeout.
pub(crate) fn dispatch(connection: &mut dyn WorkerConnection, message: OutgoingMessage) {
    let disable_loopback = UpdateParameters::no_loopback();

    match message {
        OutgoingMessage::ReserveEntityIds { number_of_entity_ids } => {
            connection.send_reserve_entity_ids_request(number_of_entity_ids, None);
        }
        OutgoingMessage::CreateEntity { components, entity_id } => {
            connection.send_create_entity_request(components, entity_id, None);
        }
        OutgoingMessage::DeleteEntity { entity_id } => {
            connection.send_delete_entity_request(entity_id, None);
        }
        OutgoingMessage::AddComponent { entity_id, data } => {
            connection.send_add_component(entity_id, data, disable_loopback);
        }
        OutgoingMessage::RemoveComponent { entity_id, component_id } => {
            connection.send_remove_component(entity_id, component_id, disable_loopback);
        }
        OutgoingMessage::ComponentUpdate { entity_id, update } => {
            connection.send_component_update(entity_id, update, disable_loopback);
        }
        OutgoingMessage::CommandRequest { entity_id, request } => {
            connection.send_command_request(entity_id, request, None, CommandParameters::default());
        }
        OutgoingMessage::CommandResponse { request_id, response } => {
            connection.send_command_response(request_id, response);
        }
        OutgoingMessage::CommandFailure { request_id, message } => {
            connection.send_command_failure(request_id, message);
        }
        OutgoingMessage::LogMessage { level, logger_name, message } => {
            connection.send_log_message(level, logger_name, message);
        }
        OutgoingMessage::ComponentInterest { entity_id, interests } => {
            connection.send_component_interest(entity_id, interests);
        }
        OutgoingMessage::EntityQuery { query } => {
            connection.send_entity_query_request(query, None);
        }
        OutgoingMessage::Metrics { metrics } => {
            connection.send_metrics(metrics);
        }
    }
}

/// Decides when poll/send cycles run.
pub(crate) trait CycleDriver: Send {
    /// Asks for queued messages to go out now.
    fn flush(&mut self);

    /// Stops driving and returns the connection, if it survived.
    fn shutdown(self: Box<Self>) -> Option<Box<dyn WorkerConnection>>;
}

/// Runs cycles synchronously on the owner thread.
pub(crate) struct InlineDriver {
    pump: Pump,
}

impl InlineDriver {
    pub(crate) fn new(pump: Pump) -> Self {
        pump.shared.set_phase(LoopPhase::Idle);
        Self { pump }
    }
}

impl CycleDriver for InlineDriver {
    fn flush(&mut self) {
        self.pump.run_cycle();
    }

    fn shutdown(self: Box<Self>) -> Option<Box<dyn WorkerConnection>> {
        let Self { pump } = *self;
        pump.shared.set_phase(LoopPhase::Stopped);
        Some(pump.into_connection())
    }
}

/// Runs cycles on a dedicated network thread.
pub(crate) struct BackgroundDriver {
    wait: Arc<WaitCondition>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<Option<Box<dyn WorkerConnection>>>>,
}

impl BackgroundDriver {
    /// Starts the network thread.
    ///
    /// On failure the pump is handed back untouched so its connection can
    /// still be torn down properly.
    pub(crate) fn start(pump: Pump, wait: Arc<WaitCondition>) -> Result<Self, (BridgeError, Pump)> {
        let shared = Arc::clone(&pump.shared);
        let (handoff_tx, handoff_rx) = bounded::<Pump>(1);
        let loop_wait = Arc::clone(&wait);

        shared.set_thread_state(ThreadState::Running);
        shared.set_phase(LoopPhase::Idle);

        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let pump = handoff_rx.recv().ok()?;
                Some(run_loop(pump, &loop_wait))
            });

        match spawned {
            Ok(thread) => {
                // Capacity 1 and a live receiver: cannot fail.
                let _ = handoff_tx.send(pump);
                tracing::info!(
                    "network worker started (wait {:?}, explicit wake: {})",
                    wait.max_wait(),
                    wait.can_explicitly_wake()
                );
                Ok(Self {
                    wait,
                    shared,
                    thread: Some(thread),
                })
            }
            Err(e) => {
                shared.set_thread_state(ThreadState::NotStarted);
                shared.set_phase(LoopPhase::Stopped);
                Err((BridgeError::ThreadSpawn(e.to_string()), pump))
            }
        }
    }
}

impl CycleDriver for BackgroundDriver {
    fn flush(&mut self) {
        self.wait.wake();
    }

    fn shutdown(mut self: Box<Self>) -> Option<Box<dyn WorkerConnection>> {
        self.shared.set_thread_state(ThreadState::StopRequested);
        self.wait.interrupt();

        let thread = self.thread.take()?;
        match thread.join() {
            Ok(connection) => {
                tracing::info!("network worker stopped");
                connection
            }
            Err(_) => {
                tracing::error!("network worker panicked; its connection is lost");
                self.shared.set_thread_state(ThreadState::Stopped);
                self.shared.set_phase(LoopPhase::Stopped);
                None
            }
        }
    }
}

/// Body of the network thread.
fn run_loop(mut pump: Pump, wait: &WaitCondition) -> Box<dyn WorkerConnection> {
    let shared = Arc::clone(&pump.shared);

    while shared.thread_state() != ThreadState::StopRequested {
        shared.set_phase(LoopPhase::Idle);
        wait.wait();
        pump.run_cycle();
    }

    shared.set_phase(LoopPhase::Stopped);
    shared.set_thread_state(ThreadState::Stopped);
    pump.into_connection()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ConnectionCall, MockConnection};
    use std::time::Duration;
    use tether_protocol::{ComponentData, ComponentId, EntityId, Op, OpList};

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new())
    }

    #[test]
    fn test_thread_state_roundtrip() {
        let shared = shared();
        assert_eq!(shared.thread_state(), ThreadState::NotStarted);
        assert_eq!(shared.phase(), LoopPhase::Stopped);

        for state in [ThreadState::Running, ThreadState::StopRequested, ThreadState::Stopped] {
            shared.set_thread_state(state);
            assert_eq!(shared.thread_state(), state);
        }
    }

    #[test]
    fn test_cycle_polls_then_sends_then_flushes() {
        let (connection, probe) = MockConnection::new("worker-1");
        probe.push_op_list(OpList::new(vec![Op::AddEntity { entity_id: EntityId(3) }]));

        let shared = shared();
        shared.outgoing.push(OutgoingMessage::DeleteEntity { entity_id: EntityId(3) });

        let mut pump = Pump::new(Box::new(connection), Arc::clone(&shared));
        pump.run_cycle();

        assert_eq!(
            probe.calls(),
            vec![
                ConnectionCall::GetOpList { timeout_millis: 0 },
                ConnectionCall::DeleteEntity { entity_id: EntityId(3), timeout_millis: None },
                ConnectionCall::Flush,
            ]
        );
        assert_eq!(shared.incoming.len(), 1);
        assert_eq!(shared.phase(), LoopPhase::Idle);
    }

    #[test]
    fn test_empty_poll_is_discarded_and_idle_cycle_does_not_flush() {
        let (connection, probe) = MockConnection::new("worker-1");
        let shared = shared();

        let mut pump = Pump::new(Box::new(connection), Arc::clone(&shared));
        pump.run_cycle();

        assert!(shared.incoming.is_empty());
        assert_eq!(probe.calls(), vec![ConnectionCall::GetOpList { timeout_millis: 0 }]);

        let stats = shared.stats.snapshot();
        assert_eq!(stats.empty_polls, 1);
        assert_eq!(stats.connection_flushes, 0);
        assert_eq!(stats.cycles, 1);
    }

    #[test]
    fn test_mutations_disable_loopback() {
        let (mut connection, probe) = MockConnection::new("worker-1");

        dispatch(
            &mut connection,
            OutgoingMessage::AddComponent {
                entity_id: EntityId(1),
                data: ComponentData::new(ComponentId(50), vec![1]),
            },
        );
        dispatch(
            &mut connection,
            OutgoingMessage::RemoveComponent {
                entity_id: EntityId(1),
                component_id: ComponentId(50),
            },
        );

        for call in probe.calls() {
            match call {
                ConnectionCall::AddComponent { parameters, .. }
                | ConnectionCall::RemoveComponent { parameters, .. } => {
                    assert!(!parameters.loopback);
                }
                other => panic!("unexpected call {other:?}"),
            }
        }
    }

    #[test]
    fn test_dequeue_observers_see_every_message_in_order() {
        let (connection, _probe) = MockConnection::new("worker-1");
        let shared = shared();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        shared.on_dequeue.add(move |message: &OutgoingMessage| {
            sink.lock().push(message.entity_id());
        });

        for id in 0..4 {
            shared.outgoing.push(OutgoingMessage::DeleteEntity { entity_id: EntityId(id) });
        }

        let mut pump = Pump::new(Box::new(connection), Arc::clone(&shared));
        pump.run_cycle();

        assert_eq!(
            *seen.lock(),
            (0..4).map(|id| Some(EntityId(id))).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_background_driver_start_and_shutdown() {
        let (connection, probe) = MockConnection::new("worker-1");
        let shared = shared();
        let wait = Arc::new(WaitCondition::new(true, Duration::from_millis(1)));

        let pump = Pump::new(Box::new(connection), Arc::clone(&shared));
        let driver = match BackgroundDriver::start(pump, wait) {
            Ok(driver) => Box::new(driver),
            Err((e, _)) => panic!("failed to start: {e}"),
        };
        assert_eq!(shared.thread_state(), ThreadState::Running);

        shared.outgoing.push(OutgoingMessage::DeleteEntity { entity_id: EntityId(1) });
        assert!(probe.wait_for_sends(1, Duration::from_secs(5)));

        let connection = driver.shutdown();
        assert!(connection.is_some());
        assert_eq!(shared.thread_state(), ThreadState::Stopped);
        assert_eq!(shared.phase(), LoopPhase::Stopped);
    }
}
