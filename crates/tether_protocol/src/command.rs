//! # Commands
//!
//! Entity commands are request/response pairs addressed to a component.

use serde::{Deserialize, Serialize};

use crate::ids::{CommandIndex, ComponentId};

/// A command invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Component that owns the command.
    pub component_id: ComponentId,
    /// Which command on that component.
    pub command_index: CommandIndex,
    /// Schema-encoded arguments.
    pub payload: Vec<u8>,
}

/// The answer to a [`CommandRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Component that owns the command.
    pub component_id: ComponentId,
    /// Which command on that component.
    pub command_index: CommandIndex,
    /// Schema-encoded result.
    pub payload: Vec<u8>,
}

/// Delivery options for a command request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandParameters {
    /// Let the runtime short-circuit commands to entities this worker owns.
    pub allow_short_circuit: bool,
}
