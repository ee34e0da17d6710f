//! Engine errors. The audio path never returns one.

use monument_core::graph::RoutingError;
use monument_modulation::ModulationError;
use thiserror::Error;

/// Errors raised by engine construction and the control handle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A routing failed validation.
    #[error("routing rejected: {0}")]
    Routing(#[from] RoutingError),
    /// A stage or preset name in a state blob is not known.
    #[error("unknown {kind} name {name:?}")]
    UnknownName {
        /// What was being named.
        kind: &'static str,
        /// The name found.
        name: String,
    },
    /// A connection set was rejected.
    #[error("modulation rejected: {0}")]
    Modulation(#[from] ModulationError),
    /// State bytes could not be decoded.
    #[error("state decode failed: {0}")]
    StateDecode(#[from] serde_json::Error),
    /// State was written by a newer format.
    #[error("state version {found} is not supported (expected at most {supported})")]
    VersionMismatch {
        /// Version in the blob.
        found: u32,
        /// Newest version this build reads.
        supported: u32,
    },
}
