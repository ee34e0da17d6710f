//! Monument Engine - runs the reverb once per block and exposes a
//! thread-safe handle for everything else.
//!
//! Per block, in the audio context:
//!
//! 1. [`MacroBlender`](monument_reverb::MacroBlender) turns macro positions
//!    into base-parameter targets.
//! 2. [`ModulationRouter`](monument_modulation::ModulationRouter) adds
//!    per-destination offsets.
//! 3. [`ParameterDistributor`](monument_core::ParameterDistributor) expands
//!    the effective targets into per-sample ramps.
//! 4. [`ProcessingGraph`](monument_core::graph::ProcessingGraph) runs the
//!    stages in routing order.
//!
//! The [`EngineHandle`] lives in the control context: it sets parameters
//! and macros, publishes routings and connection sets, and captures or
//! restores state.
//!
//! | Context | Type | Allocates | Locks | Logs |
//! |---------|------|-----------|-------|------|
//! | audio | [`Engine::process`] | no | no | no |
//! | control | [`EngineHandle`], [`Engine::prepare`] | yes | yes | yes |
//!
//! ```rust
//! use monument_engine::{Engine, EngineConfig};
//!
//! let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
//! let state = handle.capture_state().unwrap();
//!
//! let mut left = vec![0.0; 1024];
//! let mut right = vec![0.0; 1024];
//! engine.process(&mut left, &mut right);
//!
//! handle.restore_state(&state).unwrap();
//! handle.collect_garbage();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod state;

pub use config::EngineConfig;
pub use engine::{Engine, MODULATION_DEPTH};
pub use error::EngineError;
pub use handle::EngineHandle;
pub use state::{EngineState, RoutingSpec, RoutingState, STATE_VERSION};
