//! # Connection Handle
//!
//! The capability the bridge drives: one live session with the runtime.
//!
//! ## Design
//!
//! The bridge never serializes bytes itself. Everything it needs from a
//! session is the [`WorkerConnection`] trait: identity, a non-blocking
//! poll, one send call per [`OutgoingMessage`] variant, flush and destroy.
//! Production sessions and the test fake in [`crate::mock`] both
//! implement it.
//!
//! Ownership moves with the work. In background mode the handle lives on
//! the network worker thread and comes back through its `JoinHandle`, so
//! no lock ever guards it. Destruction is handed to a reclaim thread that
//! is never joined by `destroy_connection`.
//!
//! [`OutgoingMessage`]: tether_protocol::OutgoingMessage

use std::thread::{self, JoinHandle};

use tether_protocol::{
    CommandParameters, CommandRequest, CommandResponse, ComponentData, ComponentId,
    ComponentUpdate, EntityId, EntityQuery, InterestOverride, LogLevel, Metrics, OpList,
    RequestId, UpdateParameters,
};

/// A live, negotiated session with the remote runtime.
///
/// Implementations are only ever called from one thread at a time.
pub trait WorkerConnection: Send {
    /// Id the runtime assigned to this worker.
    fn worker_id(&self) -> String;

    /// Capability tags of this worker.
    fn worker_attributes(&self) -> Vec<String>;

    /// Returns the ops received since the last call, waiting at most
    /// `timeout_millis` for the first one.
    fn get_op_list(&mut self, timeout_millis: u32) -> OpList;

    /// Reserves a block of entity ids.
    fn send_reserve_entity_ids_request(&mut self, number_of_entity_ids: u32, timeout_millis: Option<u32>);

    /// Creates an entity.
    fn send_create_entity_request(
        &mut self,
        components: Vec<ComponentData>,
        entity_id: Option<EntityId>,
        timeout_millis: Option<u32>,
    );

    /// Deletes an entity.
    fn send_delete_entity_request(&mut self, entity_id: EntityId, timeout_millis: Option<u32>);

    /// Adds a component to an entity.
    fn send_add_component(&mut self, entity_id: EntityId, data: ComponentData, parameters: UpdateParameters);

    /// Removes a component from an entity.
    fn send_remove_component(
        &mut self,
        entity_id: EntityId,
        component_id: ComponentId,
        parameters: UpdateParameters,
    );

    /// Applies a component delta.
    fn send_component_update(&mut self, entity_id: EntityId, update: ComponentUpdate, parameters: UpdateParameters);

    /// Invokes a command.
    fn send_command_request(
        &mut self,
        entity_id: EntityId,
        request: CommandRequest,
        timeout_millis: Option<u32>,
        parameters: CommandParameters,
    );

    /// Answers a received command.
    fn send_command_response(&mut self, request_id: RequestId, response: CommandResponse);

    /// Rejects a received command.
    fn send_command_failure(&mut self, request_id: RequestId, message: String);

    /// Forwards a log line.
    fn send_log_message(&mut self, level: LogLevel, logger_name: String, message: String);

    /// Changes component interest for an entity.
    fn send_component_interest(&mut self, entity_id: EntityId, interests: Vec<InterestOverride>);

    /// Runs an entity query.
    fn send_entity_query_request(&mut self, query: EntityQuery, timeout_millis: Option<u32>);

    /// Reports metrics.
    fn send_metrics(&mut self, metrics: Metrics);

    /// Pushes buffered sends onto the wire.
    fn flush(&mut self);

    /// Closes the session. May block on the remote side.
    ///
    /// The default just drops the handle.
    fn destroy(self: Box<Self>) {}
}

/// Identity captured from a connection when it is installed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Id the runtime assigned to this worker.
    pub worker_id: String,
    /// Capability tags, never mutated after capture.
    pub attributes: Vec<String>,
}

impl ConnectionInfo {
    /// Reads identity from a live connection.
    #[must_use]
    pub fn capture(connection: &dyn WorkerConnection) -> Self {
        Self {
            worker_id: connection.worker_id(),
            attributes: connection.worker_attributes(),
        }
    }
}

/// Destroys a connection on a reclaim thread.
///
/// Returns the reclaim thread so a later install can wait for it. If the
/// thread cannot be spawned the connection is dropped on the caller.
pub(crate) fn destroy_in_background(connection: Box<dyn WorkerConnection>) -> Option<JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name("tether-teardown".to_string())
        .spawn(move || {
            connection.destroy();
            tracing::debug!("worker connection destroyed");
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            // The closure, and the connection with it, was dropped here.
            tracing::warn!("teardown thread unavailable ({}), connection dropped inline", e);
            None
        }
    }
}
