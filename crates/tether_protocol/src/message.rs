//! # Outgoing Messages
//!
//! One variant per call the bridge can make on a connection.
//!
//! ## Design
//!
//! The set is closed. Adding a variant forces every dispatcher to handle
//! it, because dispatch is an exhaustive `match` with no wildcard arm.
//!
//! ```text
//! submission ──> OutgoingMessage ──> queue ──> worker ──> connection.send_*()
//! ```

use serde::{Deserialize, Serialize};

use crate::command::{CommandRequest, CommandResponse};
use crate::component::{ComponentData, ComponentUpdate, InterestOverride};
use crate::ids::{ComponentId, EntityId, RequestId};
use crate::metrics::Metrics;
use crate::query::EntityQuery;

/// Severity of a log line forwarded to the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug = 1,
    /// Normal operation.
    Info = 2,
    /// Something unexpected.
    Warn = 3,
    /// Something failed.
    Error = 4,
    /// The worker cannot continue.
    Fatal = 5,
}

/// A queued outbound operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OutgoingMessage {
    /// Reserve a block of entity ids.
    ReserveEntityIds {
        /// How many ids to reserve.
        number_of_entity_ids: u32,
    },
    /// Create an entity with an initial set of components.
    CreateEntity {
        /// Initial components.
        components: Vec<ComponentData>,
        /// Previously reserved id, or `None` to let the runtime choose.
        entity_id: Option<EntityId>,
    },
    /// Delete an entity.
    DeleteEntity {
        /// Entity to delete.
        entity_id: EntityId,
    },
    /// Add a component to an entity.
    AddComponent {
        /// Target entity.
        entity_id: EntityId,
        /// Initial component state.
        data: ComponentData,
    },
    /// Remove a component from an entity.
    RemoveComponent {
        /// Target entity.
        entity_id: EntityId,
        /// Component to remove.
        component_id: ComponentId,
    },
    /// Apply a delta to a component.
    ComponentUpdate {
        /// Target entity.
        entity_id: EntityId,
        /// The delta.
        update: ComponentUpdate,
    },
    /// Invoke a command on an entity.
    CommandRequest {
        /// Target entity.
        entity_id: EntityId,
        /// The command.
        request: CommandRequest,
    },
    /// Answer a command received earlier.
    CommandResponse {
        /// Id of the request being answered.
        request_id: RequestId,
        /// The answer.
        response: CommandResponse,
    },
    /// Reject a command received earlier.
    CommandFailure {
        /// Id of the request being rejected.
        request_id: RequestId,
        /// Human-readable reason.
        message: String,
    },
    /// Forward a log line to the runtime.
    LogMessage {
        /// Severity.
        level: LogLevel,
        /// Logger that produced it.
        logger_name: String,
        /// The text.
        message: String,
    },
    /// Change component interest for an entity.
    ComponentInterest {
        /// Target entity.
        entity_id: EntityId,
        /// Overrides to apply.
        interests: Vec<InterestOverride>,
    },
    /// Run an entity query.
    EntityQuery {
        /// The query.
        query: EntityQuery,
    },
    /// Report worker metrics.
    Metrics {
        /// The report.
        metrics: Metrics,
    },
}

/// Fieldless tag naming each [`OutgoingMessage`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OutgoingMessageKind {
    /// [`OutgoingMessage::ReserveEntityIds`].
    ReserveEntityIds = 0,
    /// [`OutgoingMessage::CreateEntity`].
    CreateEntity = 1,
    /// [`OutgoingMessage::DeleteEntity`].
    DeleteEntity = 2,
    /// [`OutgoingMessage::AddComponent`].
    AddComponent = 3,
    /// [`OutgoingMessage::RemoveComponent`].
    RemoveComponent = 4,
    /// [`OutgoingMessage::ComponentUpdate`].
    ComponentUpdate = 5,
    /// [`OutgoingMessage::CommandRequest`].
    CommandRequest = 6,
    /// [`OutgoingMessage::CommandResponse`].
    CommandResponse = 7,
    /// [`OutgoingMessage::CommandFailure`].
    CommandFailure = 8,
    /// [`OutgoingMessage::LogMessage`].
    LogMessage = 9,
    /// [`OutgoingMessage::ComponentInterest`].
    ComponentInterest = 10,
    /// [`OutgoingMessage::EntityQuery`].
    EntityQuery = 11,
    /// [`OutgoingMessage::Metrics`].
    Metrics = 12,
}

impl OutgoingMessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::ReserveEntityIds,
        Self::CreateEntity,
        Self::DeleteEntity,
        Self::AddComponent,
        Self::RemoveComponent,
        Self::ComponentUpdate,
        Self::CommandRequest,
        Self::CommandResponse,
        Self::CommandFailure,
        Self::LogMessage,
        Self::ComponentInterest,
        Self::EntityQuery,
        Self::Metrics,
    ];

    /// Returns true for kinds that are answered asynchronously and
    /// therefore get a [`RequestId`] at submission.
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            Self::ReserveEntityIds
                | Self::CreateEntity
                | Self::DeleteEntity
                | Self::CommandRequest
                | Self::EntityQuery
        )
    }

    /// Short stable name, used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReserveEntityIds => "reserve_entity_ids",
            Self::CreateEntity => "create_entity",
            Self::DeleteEntity => "delete_entity",
            Self::AddComponent => "add_component",
            Self::RemoveComponent => "remove_component",
            Self::ComponentUpdate => "component_update",
            Self::CommandRequest => "command_request",
            Self::CommandResponse => "command_response",
            Self::CommandFailure => "command_failure",
            Self::LogMessage => "log_message",
            Self::ComponentInterest => "component_interest",
            Self::EntityQuery => "entity_query",
            Self::Metrics => "metrics",
        }
    }
}

impl OutgoingMessage {
    /// Returns the tag of this message.
    #[must_use]
    pub const fn kind(&self) -> OutgoingMessageKind {
        match self {
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
        }
    }

    /// Entity the message targets, if any.
    #[must_use]
    pub const fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::CreateEntity { entity_id, .. } => *entity_id,
            Self::DeleteEntity { entity_id }
            | Self::AddComponent { entity_id, .. }
            | Self::RemoveComponent { entity_id, .. }
            | Self::ComponentUpdate { entity_id, .. }
            | Self::CommandRequest { entity_id, .. }
            | Self::ComponentInterest { entity_id, .. } => Some(*entity_id),
            Self::ReserveEntityIds { .. }
            | Self::CommandResponse { .. }
            | Self::CommandFailure { .. }
            | Self::LogMessage { .. }
            | Self::EntityQuery { .. }
            | Self::Metrics { .. } => None,
        }
    }
}
