//! # TETHER Protocol
//!
//! The vocabulary spoken between the simulation and a remote worker session.
//!
//! ## Contents
//!
//! - **Identifiers**: entity, component, command and request ids
//! - **Payloads**: component data/updates, commands, queries, metrics
//! - **Outbound**: [`OutgoingMessage`], one variant per connection call
//! - **Inbound**: [`Op`] and [`OpList`], batches pulled from the session
//!
//! Payload bytes are opaque here. Schema encoding belongs to whoever
//! produces and consumes them.
//!
//! ## Example
//!
//! ```rust
//! use tether_protocol::{EntityId, OutgoingMessage, OutgoingMessageKind};
//!
//! let message = OutgoingMessage::DeleteEntity { entity_id: EntityId(7) };
//! assert_eq!(message.kind(), OutgoingMessageKind::DeleteEntity);
//! assert!(message.kind().is_request());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod command;
pub mod component;
pub mod ids;
pub mod message;
pub mod metrics;
pub mod op;
pub mod query;

pub use command::{CommandParameters, CommandRequest, CommandResponse};
pub use component::{ComponentData, ComponentUpdate, InterestOverride, UpdateParameters};
pub use ids::{CommandIndex, ComponentId, EntityId, RequestId};
pub use message::{LogLevel, OutgoingMessage, OutgoingMessageKind};
pub use metrics::{GaugeMetric, HistogramBucket, HistogramMetric, Metrics};
pub use op::{Authority, Op, OpList, StatusCode};
pub use query::{EntityQuery, QueryConstraint, ResultType};
