//! # Worker Bridge
//!
//! The owner-facing side of TETHER: submit messages, drain op lists,
//! install and destroy connections.
//!
//! ## Design
//!
//! ```text
//!   install_connection ──> capture identity ──> pick driver ──> Connected
//!                                                                   │
//!   destroy_connection <── reclaim thread <── join worker <── StopRequested
//! ```
//!
//! - Submissions take `&self`, never block, and are rejected with
//!   [`BridgeError::NotConnected`] before anything is queued or numbered
//! - Request ids are handed out at enqueue time, so the caller knows the id
//!   before the message reaches the wire
//! - The connection handle is only touched by whoever drives the cycle. The
//!   owner reads the identity cached at install
//! - Teardown of the old handle runs on a reclaim thread. A later install
//!   waits for it, so at most one session is ever open
//!
//! Dequeue observers run while the cycle is being driven. In inline mode
//! that is inside [`WorkerBridge::flush`]. A flush requested from there is
//! skipped, and whatever the observer queued goes out in the same drain.

use std::cell::Cell;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tether_protocol::{
    CommandRequest, CommandResponse, ComponentData, ComponentId, ComponentUpdate, EntityId,
    EntityQuery, InterestOverride, LogLevel, Metrics, OpList, OutgoingMessage, RequestId,
};

use crate::config::BridgeSettings;
use crate::connection::{destroy_in_background, ConnectionInfo, WorkerConnection};
use crate::error::{BridgeError, BridgeResult};
use crate::observer::ObserverId;
use crate::request_id::RequestIdAllocator;
use crate::stats::{BridgeStats, StatsSnapshot};
use crate::wait::WaitCondition;
use crate::worker::{BackgroundDriver, CycleDriver, InlineDriver, LoopPhase, Pump, Shared, ThreadState};

thread_local! {
    static DRIVING_CYCLE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside an inline cycle until dropped.
struct CycleGuard;

impl CycleGuard {
    fn enter() -> Self {
        DRIVING_CYCLE.with(|flag| flag.set(true));
        Self
    }

    fn active() -> bool {
        DRIVING_CYCLE.with(Cell::get)
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        DRIVING_CYCLE.with(|flag| flag.set(false));
    }
}

/// Thread-decoupled bridge between a simulation loop and one worker
/// connection.
pub struct WorkerBridge {
    settings: BridgeSettings,
    shared: Arc<Shared>,
    request_ids: RequestIdAllocator,
    /// Held from id allocation to queue push.
    enqueue_order: Mutex<()>,
    driver: Mutex<Option<Box<dyn CycleDriver>>>,
    info: Option<ConnectionInfo>,
    teardown: Option<JoinHandle<()>>,
}

impl WorkerBridge {
    /// Creates a bridge with no connection installed.
    #[must_use]
    pub fn new(settings: BridgeSettings) -> Self {
        Self {
            settings,
            shared: Arc::new(Shared::new()),
            request_ids: RequestIdAllocator::new(),
            enqueue_order: Mutex::new(()),
            driver: Mutex::new(None),
            info: None,
            teardown: None,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Takes ownership of a live connection and starts driving it.
    ///
    /// Waits for any earlier connection's teardown to finish first. In
    /// background mode this spawns the network worker.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::AlreadyConnected`] if a connection is installed.
    ///   The rejected handle is dropped.
    /// - [`BridgeError::ThreadSpawn`] if the worker thread cannot start.
    ///   The rejected handle is torn down like a destroyed one.
    pub fn install_connection(&mut self, connection: Box<dyn WorkerConnection>) -> BridgeResult<()> {
        if self.info.is_some() {
            return Err(BridgeError::AlreadyConnected);
        }

        self.wait_for_teardown();

        let info = ConnectionInfo::capture(&*connection);
        let pump = Pump::new(connection, Arc::clone(&self.shared));

        let driver: Box<dyn CycleDriver> = if self.settings.run_on_owner_thread {
            Box::new(InlineDriver::new(pump))
        } else {
            let interval = self.settings.wait_interval();
            if interval.clamped {
                BridgeStats::add(&self.shared.stats.interval_clamps, 1);
                tracing::warn!(
                    "ops poll rate {} Hz is out of range, waiting {:?} between cycles",
                    self.settings.ops_poll_rate_hz,
                    interval.duration
                );
            }

            let wait = Arc::new(WaitCondition::new(
                self.settings.flush_after_every_outgoing_op,
                interval.duration,
            ));

            match BackgroundDriver::start(pump, wait) {
                Ok(driver) => Box::new(driver),
                Err((e, pump)) => {
                    tracing::error!("could not start network worker: {}", e);
                    self.teardown = destroy_in_background(pump.into_connection());
                    return Err(e);
                }
            }
        };

        tracing::info!(
            "worker connection installed: {} ({} attributes, {})",
            info.worker_id,
            info.attributes.len(),
            if self.settings.run_on_owner_thread { "inline" } else { "background" }
        );

        *self.driver.get_mut() = Some(driver);
        self.info = Some(info);
        Ok(())
    }

    /// Stops driving the connection and hands it to a reclaim thread.
    ///
    /// Never waits for the remote close. Messages still queued are
    /// discarded, request ids restart at 0 and the thread state returns to
    /// `NotStarted`. Safe to call any number of times.
    pub fn destroy_connection(&mut self) {
        let driver = self.driver.get_mut().take();
        let connection = driver.and_then(|driver| driver.shutdown());

        if let Some(connection) = connection {
            self.wait_for_teardown();
            self.teardown = destroy_in_background(connection);
        }

        let discarded = self.shared.outgoing.drain().len();
        if discarded > 0 {
            BridgeStats::add(&self.shared.stats.messages_discarded, discarded as u64);
            tracing::debug!("discarded {} queued messages on destroy", discarded);
        }

        if let Some(info) = self.info.take() {
            tracing::info!("worker connection {} destroyed", info.worker_id);
        }

        self.request_ids.reset();
        self.shared.set_thread_state(ThreadState::NotStarted);
        self.shared.set_phase(LoopPhase::Stopped);
    }

    /// Blocks until the last destroyed connection has finished closing.
    pub fn wait_for_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            if teardown.join().is_err() {
                tracing::warn!("connection teardown panicked");
            }
        }
    }

    // =========================================================================
    // FLUSHING
    // =========================================================================

    /// Pushes queued messages out now.
    ///
    /// Inline, this polls once and sends everything queued before
    /// returning. In the background it only wakes the worker early.
    ///
    /// Called from a dequeue observer during an inline cycle, this does
    /// nothing. The running drain already picks up new messages.
    pub fn flush(&self) {
        if CycleGuard::active() {
            tracing::debug!("flush requested inside a running cycle, skipped");
            return;
        }

        if let Some(driver) = self.driver.lock().as_mut() {
            let _guard = CycleGuard::enter();
            driver.flush();
        }
    }

    /// Flushes if every submission is configured to flush.
    pub fn maybe_flush(&self) {
        if self.settings.flush_after_every_outgoing_op {
            self.flush();
        }
    }

    // =========================================================================
    // INCOMING
    // =========================================================================

    /// Takes every op list received so far, oldest first.
    #[must_use]
    pub fn get_op_list(&self) -> Vec<OpList> {
        self.shared.incoming.take_all()
    }

    // =========================================================================
    // OUTGOING
    // =========================================================================

    /// Queues a request for `number_of_entity_ids` fresh entity ids.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_reserve_entity_ids_request(&self, number_of_entity_ids: u32) -> BridgeResult<RequestId> {
        self.submit_request(OutgoingMessage::ReserveEntityIds { number_of_entity_ids })
    }

    /// Queues an entity creation. `entity_id` is a previously reserved id,
    /// or `None` to let the runtime pick.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_create_entity_request(
        &self,
        components: Vec<ComponentData>,
        entity_id: Option<EntityId>,
    ) -> BridgeResult<RequestId> {
        self.submit_request(OutgoingMessage::CreateEntity { components, entity_id })
    }

    /// Queues an entity deletion.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_delete_entity_request(&self, entity_id: EntityId) -> BridgeResult<RequestId> {
        self.submit_request(OutgoingMessage::DeleteEntity { entity_id })
    }

    /// Queues adding a component.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_add_component(&self, entity_id: EntityId, data: ComponentData) -> BridgeResult<()> {
        self.submit(OutgoingMessage::AddComponent { entity_id, data })
    }

    /// Queues removing a component.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_remove_component(&self, entity_id: EntityId, component_id: ComponentId) -> BridgeResult<()> {
        self.submit(OutgoingMessage::RemoveComponent { entity_id, component_id })
    }

    /// Queues a component update.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_component_update(&self, entity_id: EntityId, update: ComponentUpdate) -> BridgeResult<()> {
        self.submit(OutgoingMessage::ComponentUpdate { entity_id, update })
    }

    /// Queues a command invocation.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_command_request(&self, entity_id: EntityId, request: CommandRequest) -> BridgeResult<RequestId> {
        self.submit_request(OutgoingMessage::CommandRequest { entity_id, request })
    }

    /// Queues the answer to a received command.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_command_response(&self, request_id: RequestId, response: CommandResponse) -> BridgeResult<()> {
        self.submit(OutgoingMessage::CommandResponse { request_id, response })
    }

    /// Queues the rejection of a received command.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_command_failure(&self, request_id: RequestId, message: impl Into<String>) -> BridgeResult<()> {
        self.submit(OutgoingMessage::CommandFailure {
            request_id,
            message: message.into(),
        })
    }

    /// Queues a log line for the runtime.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_log_message(
        &self,
        level: LogLevel,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> BridgeResult<()> {
        self.submit(OutgoingMessage::LogMessage {
            level,
            logger_name: logger_name.into(),
            message: message.into(),
        })
    }

    /// Queues component interest overrides.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_component_interest(&self, entity_id: EntityId, interests: Vec<InterestOverride>) -> BridgeResult<()> {
        self.submit(OutgoingMessage::ComponentInterest { entity_id, interests })
    }

    /// Queues an entity query.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_entity_query_request(&self, query: EntityQuery) -> BridgeResult<RequestId> {
        self.submit_request(OutgoingMessage::EntityQuery { query })
    }

    /// Queues a metrics report.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotConnected`] if no connection is installed.
    pub fn send_metrics(&self, metrics: Metrics) -> BridgeResult<()> {
        self.submit(OutgoingMessage::Metrics { metrics })
    }

    fn submit(&self, message: OutgoingMessage) -> BridgeResult<()> {
        self.ensure_connected()?;
        self.enqueue(message, || ());
        Ok(())
    }

    fn submit_request(&self, message: OutgoingMessage) -> BridgeResult<RequestId> {
        self.ensure_connected()?;
        Ok(self.enqueue(message, || self.request_ids.allocate()))
    }

    fn ensure_connected(&self) -> BridgeResult<()> {
        if self.info.is_some() {
            Ok(())
        } else {
            Err(BridgeError::NotConnected)
        }
    }

    /// Queues `message`. `stamp` runs under the same lock as the push, so
    /// request ids reach the queue in the order they were handed out.
    fn enqueue<T>(&self, message: OutgoingMessage, stamp: impl FnOnce() -> T) -> T {
        self.shared.on_enqueue.notify(&message);

        let stamped = {
            let _order = self.enqueue_order.lock();
            let stamped = stamp();
            BridgeStats::add(&self.shared.stats.messages_enqueued, 1);
            self.shared.outgoing.push(message);
            stamped
        };

        self.maybe_flush();
        stamped
    }

    // =========================================================================
    // OBSERVERS
    // =========================================================================

    /// Registers a callback run for every message as it is queued, on the
    /// submitting thread.
    pub fn on_enqueue<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&OutgoingMessage) + Send + Sync + 'static,
    {
        self.shared.on_enqueue.add(callback)
    }

    /// Registers a callback run for every message just before it is sent,
    /// on whichever thread drives the cycle.
    ///
    /// The callback may submit. Inline, those messages are sent in the
    /// cycle that is already draining.
    pub fn on_dequeue<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&OutgoingMessage) + Send + Sync + 'static,
    {
        self.shared.on_dequeue.add(callback)
    }

    /// Unregisters an enqueue callback. Returns false if it was unknown.
    pub fn remove_enqueue_observer(&self, id: ObserverId) -> bool {
        self.shared.on_enqueue.remove(id)
    }

    /// Unregisters a dequeue callback. Returns false if it was unknown.
    pub fn remove_dequeue_observer(&self, id: ObserverId) -> bool {
        self.shared.on_dequeue.remove(id)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Returns true while a connection is installed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.info.is_some()
    }

    /// Worker id of the installed connection.
    #[must_use]
    pub fn worker_id(&self) -> Option<&str> {
        self.info.as_ref().map(|info| info.worker_id.as_str())
    }

    /// Attributes of the installed connection, empty when disconnected.
    #[must_use]
    pub fn worker_attributes(&self) -> &[String] {
        match &self.info {
            Some(info) => &info.attributes,
            None => &[],
        }
    }

    /// Id the next request-shaped submission will get.
    #[must_use]
    pub fn next_request_id(&self) -> RequestId {
        self.request_ids.peek()
    }

    /// Lifecycle of the network worker thread.
    #[must_use]
    pub fn thread_state(&self) -> ThreadState {
        self.shared.thread_state()
    }

    /// Where the cycle currently is.
    #[must_use]
    pub fn loop_phase(&self) -> LoopPhase {
        self.shared.phase()
    }

    /// Messages queued but not yet sent.
    #[must_use]
    pub fn pending_outgoing(&self) -> usize {
        self.shared.outgoing.len()
    }

    /// Op lists received but not yet taken.
    #[must_use]
    pub fn pending_op_lists(&self) -> usize {
        self.shared.incoming.len()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Settings this bridge was built with.
    #[must_use]
    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }
}

impl Default for WorkerBridge {
    fn default() -> Self {
        Self::new(BridgeSettings::default())
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.destroy_connection();
    }
}

impl std::fmt::Debug for WorkerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerBridge")
            .field("settings", &self.settings)
            .field("connection", &self.info)
            .field("thread_state", &self.thread_state())
            .field("loop_phase", &self.loop_phase())
            .field("pending_outgoing", &self.pending_outgoing())
            .field("pending_op_lists", &self.pending_op_lists())
            .finish_non_exhaustive()
    }
}
