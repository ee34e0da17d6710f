//! Stage routing for the monument signal path.
//!
//! The graph splits into a control-context half and an audio-context half:
//!
//! - [`RoutingConfiguration`] - an immutable, validated list of
//!   [`RouteStep`]s (series, parallel fan-out with or without a dry share,
//!   feedback taps, crossfeed)
//!   referencing stages by [`StageSlot`]. Built off the audio thread and
//!   shared through an `Arc`.
//! - [`ProcessingGraph`] - owns the fixed stage pool and scratch buses and
//!   executes the active configuration once per block with zero allocation.
//!
//! # Click-free Switching
//!
//! A requested configuration is installed at a block boundary between a
//! linear fade-out of the old routing and a fade-in of the new one (see
//! [`ProcessingGraph::request`]). Because the stage pool is fixed, a switch
//! never constructs or prepares a stage on the audio thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use monument_core::graph::{ProcessingGraph, RoutingConfiguration, StageSlot};
//!
//! let routing = RoutingConfiguration::builder()
//!     .series(StageSlot(0))
//!     .parallel(&[(StageSlot(1), 0.7), (StageSlot(2), 0.3)])
//!     .build(stages.len())?;
//! let mut graph = ProcessingGraph::new(stages, Arc::new(routing), 48000.0, 512, 2)?;
//! graph.process(block, &params);
//! ```
//!
//! # no_std Support
//!
//! This module is `no_std` compatible with `alloc`. The `Arc` type comes from
//! `alloc::sync::Arc` in `no_std` mode.

pub mod buffer;
pub mod config;
mod processing;

pub use buffer::{FeedbackTap, StereoBuffer};
pub use config::{
    MAX_BRANCHES, MAX_FEEDBACK_GAIN, MAX_STEPS, ParallelBranches, RouteStep, RoutingBuilder,
    RoutingConfiguration, RoutingError, StageSlot,
};
pub use processing::{DEFAULT_CROSSFADE_MS, MIN_CROSSFADE_MS, ProcessingGraph};
