//! # TETHER
//!
//! Thread-decoupled bridge between a simulation loop and a remote worker
//! connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        SIMULATION THREAD                             │
//! │   send_*() ──> enqueue observers ──> OutgoingQueue ──> maybe_flush   │
//! │   get_op_list() <──────────────────── OpListQueue                    │
//! └──────────────────────────────────────────────────────────────────────┘
//!                  │ crossbeam channels            ^
//!                  v                               │
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 NETWORK WORKER (or owner, inline)                    │
//! │   wait ──> poll connection ──> drain + send ──> flush ──> wait ...   │
//! └──────────────────────────────────────────────────────────────────────┘
//!                  │ Box<dyn WorkerConnection>     ^
//!                  v                               │
//!                          remote runtime
//! ```
//!
//! ## Guarantees
//!
//! - Submissions never block the simulation thread
//! - Messages reach the connection in submission order
//! - Everything dequeued before shutdown is sent exactly once
//! - Shutdown never waits on the remote side closing
//!
//! ## Example
//!
//! ```rust
//! use tether::mock::MockConnection;
//! use tether::{BridgeSettings, WorkerBridge};
//! use tether_protocol::EntityId;
//!
//! let mut bridge = WorkerBridge::new(BridgeSettings::inline());
//! let (connection, probe) = MockConnection::new("worker-1");
//! bridge.install_connection(Box::new(connection))?;
//!
//! let create = bridge.send_create_entity_request(Vec::new(), None)?;
//! let delete = bridge.send_delete_entity_request(EntityId(7))?;
//! assert_eq!((create.0, delete.0), (0, 1));
//! assert_eq!(probe.sends(), 2);
//!
//! bridge.destroy_connection();
//! # Ok::<(), tether::BridgeError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod mock;
pub mod observer;
pub mod queue;
pub mod request_id;
pub mod stats;
pub mod wait;
pub mod worker;

pub use bridge::WorkerBridge;
pub use config::{BridgeSettings, WaitInterval};
pub use connection::{ConnectionInfo, WorkerConnection};
pub use error::{BridgeError, BridgeResult};
pub use observer::{ObserverId, ObserverList};
pub use queue::{OpListQueue, OutgoingQueue};
pub use request_id::RequestIdAllocator;
pub use stats::{BridgeStats, StatsSnapshot};
pub use wait::WaitCondition;
pub use worker::{LoopPhase, ThreadState};
