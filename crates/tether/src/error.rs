//! # Bridge Error Types
//!
//! All errors the bridge can report to its owner.
//!
//! Remote failures are not errors here. They arrive as ops with a
//! non-success status and are left for the protocol layer to interpret.

use thiserror::Error;

/// Errors that can occur while driving the bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A submission was made with no connection installed.
    #[error("no connection installed")]
    NotConnected,

    /// A connection was installed over a live one.
    #[error("a connection is already installed; destroy it first")]
    AlreadyConnected,

    /// Settings could not be parsed or read.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The network worker thread could not be started.
    #[error("failed to spawn network worker: {0}")]
    ThreadSpawn(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
