//! # Component Payloads
//!
//! Component snapshots, deltas and interest overrides.
//!
//! The `payload` bytes are schema-encoded by the caller and passed through
//! untouched.

use serde::{Deserialize, Serialize};

use crate::ids::ComponentId;

/// Full state of one component, used when adding it or creating an entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentData {
    /// Component type.
    pub component_id: ComponentId,
    /// Schema-encoded fields.
    pub payload: Vec<u8>,
}

impl ComponentData {
    /// Creates component data from a raw payload.
    #[must_use]
    pub fn new(component_id: ComponentId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            component_id,
            payload: payload.into(),
        }
    }
}

/// A delta applied to an existing component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    /// Component type.
    pub component_id: ComponentId,
    /// Schema-encoded changed fields and events.
    pub payload: Vec<u8>,
}

impl ComponentUpdate {
    /// Creates an update from a raw payload.
    #[must_use]
    pub fn new(component_id: ComponentId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            component_id,
            payload: payload.into(),
        }
    }
}

/// Overrides whether the worker is interested in a component on an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestOverride {
    /// Component type.
    pub component_id: ComponentId,
    /// Whether updates for it should be delivered.
    pub is_interested: bool,
}

/// Parameters attached to component mutations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParameters {
    /// Whether the mutation is echoed back to the worker that issued it.
    pub loopback: bool,
}

impl UpdateParameters {
    /// Mutations are not delivered back to their sender.
    #[must_use]
    pub const fn no_loopback() -> Self {
        Self { loopback: false }
    }

    /// Mutations are echoed back to their sender.
    #[must_use]
    pub const fn with_loopback() -> Self {
        Self { loopback: true }
    }
}
