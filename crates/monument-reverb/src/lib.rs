//! Monument Reverb - the reverberation network, its coloration stages and
//! the macro layer, built on monument-core.
//!
//! - [`ReverberationCore`] - Eight-line feedback delay network with an
//!   orthogonal, continuously warpable [`MixMatrix`]
//! - [`Foundation`] - Input conditioning
//! - [`Pillars`] - Early-reflection tap cluster
//! - [`Weathering`] - Slow modulated delay
//! - [`TubeRayTracer`] - Resonant tube network driven by wandering rays
//! - [`ElasticHallway`] - Room modes that sag under pressure
//! - [`AlienAmplification`] - Phase rotation, paradox resonance and
//!   drifting absorption
//! - [`Buttress`] - Soft containment
//! - [`Facade`] - Air, width and wet/dry
//! - [`Stage`] / [`StageKind`] - The closed stage set the graph routes
//! - [`RoutingPreset`] - Named routings over the stage pool
//! - [`MacroBlender`] - High-level macros onto base parameters
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use monument_core::graph::ProcessingGraph;
//! use monument_core::{AudioBlock, ParameterDistributor, ParameterTargets};
//! use monument_reverb::params::PARAMS;
//! use monument_reverb::{RoutingPreset, Stage};
//!
//! let config = Arc::new(RoutingPreset::TraditionalCathedral.build().unwrap());
//! let mut graph = ProcessingGraph::new(Stage::pool(48000.0, 256), config, 48000.0, 256, 2).unwrap();
//! let targets = ParameterTargets::new(&PARAMS);
//! let mut dist = ParameterDistributor::new(&PARAMS, 48000.0, 256, 4);
//!
//! let mut left = vec![0.0; 256];
//! let mut right = vec![0.0; 256];
//! left[0] = 1.0;
//! let params = dist.begin_block(&targets, 256);
//! graph.process(AudioBlock::new(&mut left, &mut right), &params);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod alien;
pub mod buttress;
pub mod chambers;
pub mod elastic_hallway;
pub mod facade;
pub mod foundation;
pub mod macros;
pub mod mix_matrix;
pub mod params;
pub mod pillars;
pub mod routing;
pub mod stage;
pub mod tubes;
pub mod weathering;

pub use alien::AlienAmplification;
pub use buttress::Buttress;
pub use chambers::ReverberationCore;
pub use elastic_hallway::ElasticHallway;
pub use facade::Facade;
pub use foundation::Foundation;
pub use macros::{MacroBlend, MacroBlender, MacroValues};
pub use mix_matrix::MixMatrix;
pub use pillars::Pillars;
pub use routing::RoutingPreset;
pub use stage::{Stage, StageKind};
pub use tubes::TubeRayTracer;
pub use weathering::Weathering;
