//! # Entity Queries
//!
//! A small constraint tree evaluated by the remote runtime.

use serde::{Deserialize, Serialize};

use crate::ids::{ComponentId, EntityId};

/// A single query constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryConstraint {
    /// Matches exactly one entity.
    EntityId(EntityId),
    /// Matches entities carrying the component.
    Component(ComponentId),
    /// Matches entities within a sphere.
    Sphere {
        /// Centre, in world units.
        center: [f64; 3],
        /// Radius, in world units.
        radius: f64,
    },
    /// Every child must match.
    And(Vec<QueryConstraint>),
    /// Any child may match.
    Or(Vec<QueryConstraint>),
    /// The child must not match.
    Not(Box<QueryConstraint>),
}

/// What the query returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    /// Only the number of matching entities.
    Count,
    /// Snapshots of the listed components for each match.
    Snapshot(Vec<ComponentId>),
}

/// An entity query request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Root constraint.
    pub constraint: QueryConstraint,
    /// Result shape.
    pub result_type: ResultType,
}

impl EntityQuery {
    /// Counts entities matching the constraint.
    #[must_use]
    pub fn count(constraint: QueryConstraint) -> Self {
        Self {
            constraint,
            result_type: ResultType::Count,
        }
    }

    /// Snapshots the given components of every matching entity.
    #[must_use]
    pub fn snapshot(constraint: QueryConstraint, components: Vec<ComponentId>) -> Self {
        Self {
            constraint,
            result_type: ResultType::Snapshot(components),
        }
    }
}
