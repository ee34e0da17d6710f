//! Modulation errors. Raised only in the control context.

use thiserror::Error;

use crate::sources::SourceId;

/// Reasons a connection or connection set is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModulationError {
    /// The set already holds the maximum number of connections.
    #[error("connection set is full ({max} connections)")]
    TooManyConnections {
        /// Capacity.
        max: usize,
    },
    /// The source has no such output channel.
    #[error("{source_id:?} has no channel {channel}")]
    InvalidSourceChannel {
        /// Source.
        source_id: SourceId,
        /// Requested channel.
        channel: u8,
    },
    /// The destination is not a known parameter.
    #[error("unknown destination parameter {0}")]
    UnknownDestination(u32),
}
