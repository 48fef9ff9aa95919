//! # Inbound Ops
//!
//! Events pulled from a connection, batched into an [`OpList`] per poll.
//!
//! ## Design
//!
//! Ops are surfaced to the simulation exactly as the connection reported
//! them. Failed requests arrive as response ops with a non-success
//! [`StatusCode`]; the bridge never retries or reinterprets them.

use serde::{Deserialize, Serialize};

use crate::command::{CommandRequest, CommandResponse};
use crate::component::{ComponentData, ComponentUpdate};
use crate::ids::{ComponentId, EntityId, RequestId};
use crate::message::LogLevel;
use crate::metrics::Metrics;

/// Outcome of a request, as reported by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusCode {
    /// The request succeeded.
    Success = 1,
    /// No response arrived in time.
    Timeout = 2,
    /// The target worker or entity was not found.
    NotFound = 3,
    /// Authority moved while the request was in flight.
    AuthorityLost = 4,
    /// The worker may not make this request.
    PermissionDenied = 5,
    /// The receiving worker rejected the request.
    ApplicationError = 6,
    /// The runtime failed.
    InternalError = 7,
}

impl StatusCode {
    /// Returns true for [`StatusCode::Success`].
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Authority state of this worker over a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Authority {
    /// Another worker owns it.
    NotAuthoritative = 0,
    /// This worker owns it.
    Authoritative = 1,
    /// Ownership is about to move away.
    AuthorityLossImminent = 2,
}

/// A single inbound event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// The session was closed by the runtime.
    Disconnect {
        /// Reason code.
        code: u8,
        /// Human-readable reason.
        reason: String,
    },
    /// A worker flag changed.
    FlagUpdate {
        /// Flag name.
        name: String,
        /// New value, or `None` if the flag was removed.
        value: Option<String>,
    },
    /// A log line addressed to this worker.
    LogMessage {
        /// Severity.
        level: LogLevel,
        /// The text.
        message: String,
    },
    /// Metrics pushed by the runtime.
    Metrics(Metrics),
    /// Start or end of an atomic batch of entity ops.
    CriticalSection {
        /// True when entering.
        in_critical_section: bool,
    },
    /// An entity came into view.
    AddEntity {
        /// The entity.
        entity_id: EntityId,
    },
    /// An entity left view.
    RemoveEntity {
        /// The entity.
        entity_id: EntityId,
    },
    /// Answer to a reserve-entity-ids request.
    ReserveEntityIdsResponse {
        /// Request being answered.
        request_id: RequestId,
        /// Outcome.
        status: StatusCode,
        /// First id of the reserved range on success.
        first_entity_id: Option<EntityId>,
        /// Size of the reserved range.
        number_of_entity_ids: u32,
    },
    /// Answer to a create-entity request.
    CreateEntityResponse {
        /// Request being answered.
        request_id: RequestId,
        /// Outcome.
        status: StatusCode,
        /// The created entity on success.
        entity_id: Option<EntityId>,
    },
    /// Answer to a delete-entity request.
    DeleteEntityResponse {
        /// Request being answered.
        request_id: RequestId,
        /// Entity that was targeted.
        entity_id: EntityId,
        /// Outcome.
        status: StatusCode,
    },
    /// Answer to an entity query.
    EntityQueryResponse {
        /// Request being answered.
        request_id: RequestId,
        /// Outcome.
        status: StatusCode,
        /// Number of matching entities.
        result_count: u32,
    },
    /// A component was added to an entity in view.
    AddComponent {
        /// The entity.
        entity_id: EntityId,
        /// Initial state.
        data: ComponentData,
    },
    /// A component was removed from an entity in view.
    RemoveComponent {
        /// The entity.
        entity_id: EntityId,
        /// The component.
        component_id: ComponentId,
    },
    /// Authority over a component changed.
    AuthorityChange {
        /// The entity.
        entity_id: EntityId,
        /// The component.
        component_id: ComponentId,
        /// New authority state.
        authority: Authority,
    },
    /// A component changed.
    ComponentUpdate {
        /// The entity.
        entity_id: EntityId,
        /// The delta.
        update: ComponentUpdate,
    },
    /// Another worker invoked a command on an entity this worker owns.
    CommandRequest {
        /// Id to answer with.
        request_id: RequestId,
        /// Target entity.
        entity_id: EntityId,
        /// Time budget for the answer.
        timeout_millis: u32,
        /// Worker that sent it.
        caller_worker_id: String,
        /// The command.
        request: CommandRequest,
    },
    /// Answer to a command this worker sent.
    CommandResponse {
        /// Request being answered.
        request_id: RequestId,
        /// Target entity.
        entity_id: EntityId,
        /// Outcome.
        status: StatusCode,
        /// The answer on success.
        response: Option<CommandResponse>,
    },
}

impl Op {
    /// Request id this op answers, for response-shaped ops.
    #[must_use]
    pub const fn answered_request(&self) -> Option<RequestId> {
        match self {
            Self::ReserveEntityIdsResponse { request_id, .. }
            | Self::CreateEntityResponse { request_id, .. }
            | Self::DeleteEntityResponse { request_id, .. }
            | Self::EntityQueryResponse { request_id, .. }
            | Self::CommandResponse { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

/// An ordered batch of ops produced by one poll of a connection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpList {
    /// The ops, in the order the connection produced them.
    pub ops: Vec<Op>,
}

impl OpList {
    /// Creates an op list from ops.
    #[must_use]
    pub const fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    /// Creates an empty op list.
    #[must_use]
    pub const fn empty() -> Self {
        Self { ops: Vec::new() }
    }

    /// Number of ops in the batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the poll produced nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates the ops in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Op> {
        self.ops.iter()
    }
}

impl From<Vec<Op>> for OpList {
    fn from(ops: Vec<Op>) -> Self {
        Self::new(ops)
    }
}

impl IntoIterator for OpList {
    type Item = Op;
    type IntoIter = std::vec::IntoIter<Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a OpList {
    type Item = &'a Op;
    type IntoIter = std::slice::Iter<'a, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
