//! Monument Core - real-time DSP primitives, parameter distribution and
//! stage routing for the monument reverb engine.
//!
//! Everything in this crate is designed for the audio context: no allocation
//! after `prepare`, no locks, no I/O, no panics on the processing path.
//!
//! # Core Abstractions
//!
//! ## Parameters
//!
//! - [`ParamDescriptor`] / [`ParamId`] - Normalized parameter metadata
//! - [`ParameterTargets`] - Lock-free control-rate targets (one atomic per parameter)
//! - [`ParameterDistributor`] - Per-block expansion into per-sample ramps or
//!   constant views ([`ParameterBuffer`]), handed to stages as [`BlockParams`]
//! - [`SmoothedParam`] - Exponential smoothing (RC-like response)
//! - [`LinearSmoothedParam`] - Linear ramps that land exactly on target
//!
//! ## Stages and Routing
//!
//! - [`ProcessingStage`] - prepare/process/reset contract for every unit
//! - [`graph::RoutingConfiguration`] - Immutable, validated stage ordering
//! - [`graph::ProcessingGraph`] - Fixed stage pool with click-free switching
//!
//! ## Building Blocks
//!
//! - [`DelayLine`] - Fractional circular delay
//! - [`AllpassFilter`] - Lattice allpass diffuser
//! - [`Biquad`] / [`BiquadCoefficients`] - RBJ second-order sections
//! - [`OnePole`] - One-pole lowpass (damping, taps)
//! - [`TiltFilter`] - Non-amplifying two-band tilt
//! - [`DcBlocker`] - First-order DC blocker
//! - [`Lfo`] - Low-frequency oscillator with tempo sync ([`LfoRate`])
//! - [`EnvelopeFollower`] - Peak / RMS level tracking
//!
//! # no_std Support
//!
//! Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! monument-core = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod allpass;
pub mod biquad;
pub mod dc_blocker;
pub mod delay;
pub mod distributor;
pub mod envelope;
pub mod graph;
pub mod lfo;
pub mod math;
pub mod one_pole;
pub mod param;
pub mod param_info;
pub mod stage;
pub mod tempo;
pub mod tilt;

// Re-export main types at crate root
pub use allpass::AllpassFilter;
pub use biquad::{Biquad, BiquadCoefficients};
pub use dc_blocker::DcBlocker;
pub use delay::{DelayLine, Interpolation};
pub use distributor::{BlockParams, ParameterBuffer, ParameterDistributor, ParameterTargets};
pub use envelope::{DetectionMode, EnvelopeFollower};
pub use lfo::{Lfo, LfoRate, LfoWaveform};
pub use math::{
    db_to_linear, flush_denormal, lerp, linear_to_db, ms_to_samples, one_pole_coeff, rms,
    sanitize, sanitize_buffer, wet_dry_mix,
};
pub use one_pole::OnePole;
pub use param::{LinearSmoothedParam, SmoothedParam};
pub use param_info::{ParamDescriptor, ParamFlags, ParamId};
pub use stage::{AudioBlock, ProcessingStage};
pub use tempo::{NoteDivision, TempoContext};
pub use tilt::TiltFilter;
