//! # Mock Connection
//!
//! An in-memory [`WorkerConnection`] for tests, benchmarks and the soak
//! driver.
//!
//! Every call is recorded as a [`ConnectionCall`]. Op lists are scripted
//! through the [`MockProbe`] returned alongside the connection; the probe
//! stays usable after the connection has moved onto the network worker or
//! been destroyed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tether_protocol::{
    CommandParameters, CommandRequest, CommandResponse, ComponentData, ComponentId,
    ComponentUpdate, EntityId, EntityQuery, InterestOverride, LogLevel, Metrics, OpList,
    OutgoingMessageKind, RequestId, UpdateParameters,
};

use crate::connection::WorkerConnection;

/// One recorded call on a [`MockConnection`].
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum ConnectionCall {
    GetOpList {
        timeout_millis: u32,
    },
    ReserveEntityIds {
        number_of_entity_ids: u32,
        timeout_millis: Option<u32>,
    },
    CreateEntity {
        components: Vec<ComponentData>,
        entity_id: Option<EntityId>,
        timeout_millis: Option<u32>,
    },
    DeleteEntity {
        entity_id: EntityId,
        timeout_millis: Option<u32>,
    },
    AddComponent {
        entity_id: EntityId,
        data: ComponentData,
        parameters: UpdateParameters,
    },
    RemoveComponent {
        entity_id: EntityId,
        component_id: ComponentId,
        parameters: UpdateParameters,
    },
    ComponentUpdate {
        entity_id: EntityId,
        update: ComponentUpdate,
        parameters: UpdateParameters,
    },
    CommandRequest {
        entity_id: EntityId,
        request: CommandRequest,
        timeout_millis: Option<u32>,
        parameters: CommandParameters,
    },
    CommandResponse {
        request_id: RequestId,
        response: CommandResponse,
    },
    CommandFailure {
        request_id: RequestId,
        message: String,
    },
    LogMessage {
        level: LogLevel,
        logger_name: String,
        message: String,
    },
    ComponentInterest {
        entity_id: EntityId,
        interests: Vec<InterestOverride>,
    },
    EntityQuery {
        query: EntityQuery,
        timeout_millis: Option<u32>,
    },
    Metrics {
        metrics: Metrics,
    },
    Flush,
}

impl ConnectionCall {
    /// The outgoing message kind this call sends, or `None` for polls and
    /// flushes.
    #[must_use]
    pub const fn sent_kind(&self) -> Option<OutgoingMessageKind> {
        let kind = match self {
            Self::GetOpList { .. } | Self::Flush => return None,
            Self::ReserveEntityIds { .. } => OutgoingMessageKind::ReserveEntityIds,
            Self::CreateEntity { .. } => OutgoingMessageKind::CreateEntity,
            Self::DeleteEntity { .. } => OutgoingMessageKind::DeleteEntity,
            Self::AddComponent { .. } => OutgoingMessageKind::AddComponent,
            Self::RemoveComponent { .. } => OutgoingMessageKind::RemoveComponent,
            Self::ComponentUpdate { .. } => OutgoingMessageKind::ComponentUpdate,
            Self::CommandRequest { .. } => OutgoingMessageKind::CommandRequest,
            Self::CommandResponse { .. } => OutgoingMessageKind::CommandResponse,
            Self::CommandFailure { .. } => OutgoingMessageKind::CommandFailure,
            Self::LogMessage { .. } => OutgoingMessageKind::LogMessage,
            Self::ComponentInterest { .. } => OutgoingMessageKind::ComponentInterest,
            Self::EntityQuery { .. } => OutgoingMessageKind::EntityQuery,
            Self::Metrics { .. } => OutgoingMessageKind::Metrics,
        };
        Some(kind)
    }

    /// Returns true for calls that put a message on the wire.
    #[must_use]
    pub const fn is_send(&self) -> bool {
        self.sent_kind().is_some()
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<ConnectionCall>,
    sends: usize,
    scripted: VecDeque<OpList>,
    destroyed: bool,
    destroyed_on: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    changed: Condvar,
}

impl Shared {
    fn record(&self, call: ConnectionCall) {
        let mut state = self.state.lock();
        if call.is_send() {
            state.sends += 1;
        }
        state.calls.push(call);
        self.changed.notify_all();
    }

    /// Waits until `done` holds or `timeout` elapses.
    fn wait_until(&self, timeout: Duration, done: impl Fn(&MockState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !done(&*state) {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return done(&*state);
            }
        }
        true
    }
}

/// Fake session that records calls instead of talking to a runtime.
#[derive(Debug)]
pub struct MockConnection {
    worker_id: String,
    attributes: Vec<String>,
    poll_delay: Duration,
    destroy_delay: Duration,
    shared: Arc<Shared>,
}

impl MockConnection {
    /// Creates a connection and the probe that observes it.
    #[must_use]
    pub fn new(worker_id: impl Into<String>) -> (Self, MockProbe) {
        let shared = Arc::new(Shared::default());
        let connection = Self {
            worker_id: worker_id.into(),
            attributes: Vec::new(),
            poll_delay: Duration::ZERO,
            destroy_delay: Duration::ZERO,
            shared: Arc::clone(&shared),
        };
        (connection, MockProbe { shared })
    }

    /// Sets the attributes reported to the bridge.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Makes every `get_op_list` block for `delay` after it is recorded,
    /// like a poll stuck on the network.
    #[must_use]
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Makes `destroy` block for `delay`, like a slow remote close.
    #[must_use]
    pub fn with_destroy_delay(mut self, delay: Duration) -> Self {
        self.destroy_delay = delay;
        self
    }
}

impl WorkerConnection for MockConnection {
    fn worker_id(&self) -> String {
        self.worker_id.clone()
    }

    fn worker_attributes(&self) -> Vec<String> {
        self.attributes.clone()
    }

    fn get_op_list(&mut self, timeout_millis: u32) -> OpList {
        self.shared.record(ConnectionCall::GetOpList { timeout_millis });
        if !self.poll_delay.is_zero() {
            thread::sleep(self.poll_delay);
        }
        self.shared.state.lock().scripted.pop_front().unwrap_or_default()
    }

    fn send_reserve_entity_ids_request(&mut self, number_of_entity_ids: u32, timeout_millis: Option<u32>) {
        self.shared.record(ConnectionCall::ReserveEntityIds {
            number_of_entity_ids,
            timeout_millis,
        });
    }

    fn send_create_entity_request(
        &mut self,
        components: Vec<ComponentData>,
        entity_id: Option<EntityId>,
        timeout_millis: Option<u32>,
    ) {
        self.shared.record(ConnectionCall::CreateEntity {
            components,
            entity_id,
            timeout_millis,
        });
    }

    fn send_delete_entity_request(&mut self, entity_id: EntityId, timeout_millis: Option<u32>) {
        self.shared.record(ConnectionCall::DeleteEntity {
            entity_id,
            timeout_millis,
        });
    }

    fn send_add_component(&mut self, entity_id: EntityId, data: ComponentData, parameters: UpdateParameters) {
        self.shared.record(ConnectionCall::AddComponent {
            entity_id,
            data,
            parameters,
        });
    }

    fn send_remove_component(
        &mut self,
        entity_id: EntityId,
        component_id: ComponentId,
        parameters: UpdateParameters,
    ) {
        self.shared.record(ConnectionCall::RemoveComponent {
            entity_id,
            component_id,
            parameters,
        });
    }

    fn send_component_update(&mut self, entity_id: EntityId, update: ComponentUpdate, parameters: UpdateParameters) {
        self.shared.record(ConnectionCall::ComponentUpdate {
            entity_id,
            update,
            parameters,
        });
    }

    fn send_command_request(
        &mut self,
        entity_id: EntityId,
        request: CommandRequest,
        timeout_millis: Option<u32>,
        parameters: CommandParameters,
    ) {
        self.shared.record(ConnectionCall::CommandRequest {
            entity_id,
            request,
            timeout_millis,
            parameters,
        });
    }

    fn send_command_response(&mut self, request_id: RequestId, response: CommandResponse) {
        self.shared.record(ConnectionCall::CommandResponse { request_id, response });
    }

    fn send_command_failure(&mut self, request_id: RequestId, message: String) {
        self.shared.record(ConnectionCall::CommandFailure { request_id, message });
    }

    fn send_log_message(&mut self, level: LogLevel, logger_name: String, message: String) {
        self.shared.record(ConnectionCall::LogMessage {
            level,
            logger_name,
            message,
        });
    }

    fn send_component_interest(&mut self, entity_id: EntityId, interests: Vec<InterestOverride>) {
        self.shared.record(ConnectionCall::ComponentInterest { entity_id, interests });
    }

    fn send_entity_query_request(&mut self, query: EntityQuery, timeout_millis: Option<u32>) {
        self.shared.record(ConnectionCall::EntityQuery { query, timeout_millis });
    }

    fn send_metrics(&mut self, metrics: Metrics) {
        self.shared.record(ConnectionCall::Metrics { metrics });
    }

    fn flush(&mut self) {
        self.shared.record(ConnectionCall::Flush);
    }

    fn destroy(self: Box<Self>) {
        if !self.destroy_delay.is_zero() {
            thread::sleep(self.destroy_delay);
        }

        let mut state = self.shared.state.lock();
        state.destroyed = true;
        state.destroyed_on = thread::current().name().map(str::to_string);
        self.shared.changed.notify_all();
    }
}

/// Observer side of a [`MockConnection`].
#[derive(Clone, Debug)]
pub struct MockProbe {
    shared: Arc<Shared>,
}

impl MockProbe {
    /// Queues an op list for a later `get_op_list` call.
    pub fn push_op_list(&self, op_list: OpList) {
        self.shared.state.lock().scripted.push_back(op_list);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ConnectionCall> {
        self.shared.state.lock().calls.clone()
    }

    /// Only the calls that sent a message, in order.
    #[must_use]
    pub fn sent_calls(&self) -> Vec<ConnectionCall> {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_send())
            .cloned()
            .collect()
    }

    /// Number of messages sent so far.
    #[must_use]
    pub fn sends(&self) -> usize {
        self.shared.state.lock().sends
    }

    /// Number of connection flushes so far.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.count(|call| matches!(call, ConnectionCall::Flush))
    }

    /// Number of polls so far.
    #[must_use]
    pub fn polls(&self) -> usize {
        self.count(|call| matches!(call, ConnectionCall::GetOpList { .. }))
    }

    /// Returns true once `destroy` has completed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().destroyed
    }

    /// Name of the thread `destroy` ran on.
    #[must_use]
    pub fn destroyed_on(&self) -> Option<String> {
        self.shared.state.lock().destroyed_on.clone()
    }

    /// Blocks until at least `count` messages were sent. Returns false on
    /// timeout.
    pub fn wait_for_sends(&self, count: usize, timeout: Duration) -> bool {
        self.shared.wait_until(timeout, |state| state.sends >= count)
    }

    /// Blocks until at least `count` polls happened. Returns false on
    /// timeout.
    pub fn wait_for_polls(&self, count: usize, timeout: Duration) -> bool {
        self.shared.wait_until(timeout, |state| {
            state
                .calls
                .iter()
                .filter(|call| matches!(call, ConnectionCall::GetOpList { .. }))
                .count()
                >= count
        })
    }

    /// Blocks until `destroy` has completed. Returns false on timeout.
    pub fn wait_for_destroy(&self, timeout: Duration) -> bool {
        self.shared.wait_until(timeout, |state| state.destroyed)
    }

    fn count(&self, predicate: impl Fn(&ConnectionCall) -> bool) -> usize {
        self.shared.state.lock().calls.iter().filter(|call| predicate(*call)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_protocol::Op;

    #[test]
    fn test_records_calls_in_order() {
        let (mut connection, probe) = MockConnection::new("mock");

        connection.send_delete_entity_request(EntityId(1), None);
        connection.send_reserve_entity_ids_request(4, Some(100));
        connection.flush();

        assert_eq!(probe.sends(), 2);
        assert_eq!(probe.flushes(), 1);
        assert_eq!(
            probe.sent_calls(),
            vec![
                ConnectionCall::DeleteEntity { entity_id: EntityId(1), timeout_millis: None },
                ConnectionCall::ReserveEntityIds { number_of_entity_ids: 4, timeout_millis: Some(100) },
            ]
        );
    }

    #[test]
    fn test_serves_scripted_op_lists_then_empty() {
        let (mut connection, probe) = MockConnection::new("mock");
        probe.push_op_list(OpList::new(vec![Op::AddEntity { entity_id: EntityId(9) }]));

        assert_eq!(connection.get_op_list(0).len(), 1);
        assert!(connection.get_op_list(0).is_empty());
        assert_eq!(probe.polls(), 2);
    }

    #[test]
    fn test_identity_and_destroy() {
        let (connection, probe) = MockConnection::new("worker-7");
        let connection = connection.with_attributes(["physics", "ai"]);

        assert_eq!(connection.worker_id(), "worker-7");
        assert_eq!(connection.worker_attributes(), vec!["physics".to_string(), "ai".to_string()]);

        Box::new(connection).destroy();
        assert!(probe.is_destroyed());
        assert!(probe.wait_for_destroy(Duration::ZERO));
    }

    #[test]
    fn test_sent_kind() {
        assert_eq!(ConnectionCall::Flush.sent_kind(), None);
        assert_eq!(
            ConnectionCall::Metrics { metrics: Metrics::default() }.sent_kind(),
            Some(OutgoingMessageKind::Metrics)
        );
    }
}
