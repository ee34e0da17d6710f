//! Monument Modulation - modulation sources and the lock-free router that
//! turns them into per-parameter offsets.
//!
//! # Sources
//!
//! A fixed bank, updated once per block:
//!
//! - [`ChaosAttractor`] - Lorenz system, three bipolar channels
//! - [`AudioFollower`] - RMS of the input, unipolar
//! - [`BrownianMotion`] - Inertial bounded random walk, bipolar
//! - [`EnvelopeTracker`] - Attack/sustain/release-aware level, unipolar
//! - LFO 1–4 - Free-running or tempo-synced, see [`LfoSettings`]
//!
//! # Routing
//!
//! A [`ConnectionSet`] holds up to [`MAX_CONNECTIONS`]
//! [`ModulationConnection`]s. The control context publishes sets through a
//! [`RouterHandle`]; the [`ModulationRouter`] picks them up at the next block
//! without locking or freeing memory.
//!
//! ```rust
//! use monument_core::TempoContext;
//! use monument_modulation::{ConnectionSet, ModulationConnection, ModulationRouter, SourceId};
//!
//! let (mut router, handle) = ModulationRouter::new(12, 48000.0, 7);
//!
//! let mut set = ConnectionSet::new();
//! set.push(ModulationConnection::new(SourceId::Lfo1, 0, 0.5)).unwrap();
//! handle.publish(set).unwrap();
//!
//! let input = vec![0.0; 256];
//! let offsets = router.compute_offsets(&input, &input, &TempoContext::default());
//! assert_eq!(offsets.len(), 12);
//! assert!(offsets.iter().all(|o| (-1.0..=1.0).contains(o)));
//! ```

pub mod connection;
pub mod error;
pub mod router;
pub mod snapshot;
pub mod sources;

pub use connection::{
    ConnectionSet, Curve, DEFAULT_SMOOTHING_MS, LfoSettings, MAX_CONNECTIONS,
    ModulationConnection, RandomDensity, SMOOTHING_RANGE_MS,
};
pub use error::ModulationError;
pub use router::{ModulationRouter, RouterHandle};
pub use snapshot::{Publisher, Reader};
pub use sources::{
    AudioFollower, BrownianMotion, ChaosAttractor, EnvelopePhase, EnvelopeTracker, LFO_COUNT,
    SourceBank, SourceId,
};
