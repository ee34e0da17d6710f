//! Control-context handle.
//!
//! Everything here runs off the audio thread. Parameter and macro targets
//! and tempo are atomics the engine reads at block start; routings and
//! connection sets are published snapshots. State restore publishes
//! everything first, then bumps a generation counter the engine acts on at
//! its next block.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use monument_core::graph::RoutingConfiguration;
use monument_core::{ParamDescriptor, ParamId, ParameterTargets, TempoContext};
use monument_modulation::{ConnectionSet, Publisher, RouterHandle};
use monument_reverb::macros::MACROS;
use monument_reverb::params::{self, PARAM_COUNT, PARAMS};
use parking_lot::Mutex;

use crate::error::EngineError;
use crate::state::{EngineState, RoutingSpec, RoutingState, STATE_VERSION};

/// State shared between the engine and its handles.
pub(crate) struct Shared {
    pub(crate) params: ParameterTargets,
    pub(crate) macros: ParameterTargets,
    bpm: AtomicU32,
    playing: AtomicBool,
    pub(crate) seed: AtomicU64,
    pub(crate) restore_generation: AtomicU64,
    pub(crate) latency: AtomicUsize,
    /// Control context only.
    routing_spec: Mutex<RoutingSpec>,
}

impl Shared {
    pub(crate) fn new(seed: u64, routing: RoutingSpec) -> Self {
        Self {
            params: ParameterTargets::new(&PARAMS),
            macros: ParameterTargets::new(&MACROS),
            bpm: AtomicU32::new(0.0f32.to_bits()),
            playing: AtomicBool::new(false),
            seed: AtomicU64::new(seed),
            restore_generation: AtomicU64::new(0),
            latency: AtomicUsize::new(0),
            routing_spec: Mutex::new(routing),
        }
    }

    #[inline]
    pub(crate) fn tempo(&self) -> TempoContext {
        TempoContext::new(
            f32::from_bits(self.bpm.load(Ordering::Relaxed)),
            self.playing.load(Ordering::Relaxed),
        )
    }
}

/// Cloneable control-context handle to a running [`Engine`](crate::Engine).
///
/// ```rust
/// use monument_engine::{Engine, EngineConfig};
/// use monument_reverb::params::{MIX, TIME};
/// use monument_reverb::RoutingPreset;
///
/// let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
/// handle.set_param(TIME, 0.8);
/// handle.set_param(MIX, 1.0);
/// handle.publish_routing(RoutingPreset::ParallelWorlds).unwrap();
///
/// let mut left = vec![0.0; 512];
/// let mut right = vec![0.0; 512];
/// left[0] = 1.0;
/// engine.process(&mut left, &mut right);
/// ```
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) shared: Arc<Shared>,
    pub(crate) routing: Publisher<RoutingConfiguration>,
    pub(crate) modulation: RouterHandle,
}

impl EngineHandle {
    /// Set a parameter target. Values are clamped; non-finite values become
    /// the default. Returns the stored value, or `None` for an unknown id.
    pub fn set_param(&self, id: ParamId, value: f32) -> Option<f32> {
        self.shared.params.set_target(id, value)
    }

    /// Set a parameter by its string id.
    pub fn set_param_by_name(&self, string_id: &str, value: f32) -> Option<f32> {
        let desc = params::by_string_id(string_id)?;
        self.set_param(desc.id, value)
    }

    /// Current parameter target.
    pub fn param(&self, id: ParamId) -> Option<f32> {
        self.shared.params.target(id)
    }

    /// Set a macro. Same clamping as [`set_param`](Self::set_param).
    pub fn set_macro(&self, id: ParamId, value: f32) -> Option<f32> {
        self.shared.macros.set_target(id, value)
    }

    /// Current macro position.
    pub fn macro_value(&self, id: ParamId) -> Option<f32> {
        self.shared.macros.target(id)
    }

    /// Parameter metadata, indexed by id.
    pub fn param_descriptors(&self) -> &'static [ParamDescriptor] {
        &PARAMS
    }

    /// Macro metadata, indexed by id.
    pub fn macro_descriptors(&self) -> &'static [ParamDescriptor] {
        &MACROS
    }

    /// Validate and publish a routing. The engine fades over to it at its
    /// next block.
    pub fn publish_routing(&self, routing: impl Into<RoutingSpec>) -> Result<(), EngineError> {
        let spec = routing.into();
        let config = match spec.build() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "routing rejected");
                return Err(err.into());
            }
        };
        tracing::debug!(steps = config.steps().len(), "publishing routing");
        let mut current = self.shared.routing_spec.lock();
        self.routing.publish(config);
        *current = spec;
        Ok(())
    }

    /// The most recently published routing.
    pub fn routing(&self) -> RoutingSpec {
        self.shared.routing_spec.lock().clone()
    }

    /// Validate and publish a modulation connection set.
    pub fn publish_connections(&self, set: ConnectionSet) -> Result<(), EngineError> {
        Ok(self.modulation.publish(set)?)
    }

    /// The most recently published connection set.
    pub fn connections(&self) -> ConnectionSet {
        self.modulation.current()
    }

    /// Host tempo for synced LFOs. A non-positive BPM means unknown.
    pub fn set_tempo(&self, bpm: f32, playing: bool) {
        let bpm = if bpm.is_finite() { bpm.max(0.0) } else { 0.0 };
        self.shared.bpm.store(bpm.to_bits(), Ordering::Relaxed);
        self.shared.playing.store(playing, Ordering::Relaxed);
    }

    /// Latency of the active routing in samples.
    pub fn latency_samples(&self) -> usize {
        self.shared.latency.load(Ordering::Relaxed)
    }

    /// Free routings and connection sets the engine has moved past.
    pub fn collect_garbage(&self) -> usize {
        self.routing.collect_garbage() + self.modulation.collect_garbage()
    }

    /// Snapshot of everything that determines the output.
    pub fn state(&self) -> EngineState {
        let named = |targets: &ParameterTargets| -> BTreeMap<String, f32> {
            targets
                .descriptors()
                .iter()
                .filter_map(|d| targets.target(d.id).map(|v| (d.string_id.to_owned(), v)))
                .collect()
        };
        EngineState {
            version: STATE_VERSION,
            seed: self.shared.seed.load(Ordering::Relaxed),
            params: named(&self.shared.params),
            macros: named(&self.shared.macros),
            routing: RoutingState::from(&self.routing()),
            connections: self.connections(),
        }
    }

    /// [`state`](Self::state) encoded as bytes.
    pub fn capture_state(&self) -> Result<Vec<u8>, EngineError> {
        self.state().to_bytes()
    }

    /// Decode and apply a state blob.
    pub fn restore_state(&self, bytes: &[u8]) -> Result<(), EngineError> {
        let state = match EngineState::from_bytes(bytes) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(%err, "state restore failed");
                return Err(err);
            }
        };
        self.apply_state(state)
    }

    /// Apply a decoded state. Nothing changes if any part is invalid.
    ///
    /// The engine resets its stages, snaps its parameter ramps and reseeds
    /// modulation at its next block, so identical input afterwards gives
    /// identical output.
    pub fn apply_state(&self, state: EngineState) -> Result<(), EngineError> {
        let spec = RoutingSpec::try_from(&state.routing)?;
        let config = spec.build()?;
        let mut connections = state.connections;
        connections.validate(PARAM_COUNT)?;

        apply_named(&self.shared.params, &state.params);
        apply_named(&self.shared.macros, &state.macros);
        self.modulation.publish(connections)?;
        {
            let mut current = self.shared.routing_spec.lock();
            self.routing.publish(config);
            *current = spec;
        }
        self.shared.seed.store(state.seed, Ordering::Relaxed);
        self.shared.restore_generation.fetch_add(1, Ordering::Release);
        tracing::info!(version = state.version, seed = state.seed, "state restored");
        Ok(())
    }
}

/// Reset `targets` to defaults, then apply the known names from `values`.
fn apply_named(targets: &ParameterTargets, values: &BTreeMap<String, f32>) {
    targets.reset_to_defaults();
    for (name, &value) in values {
        match targets.descriptors().iter().find(|d| d.string_id == name) {
            Some(desc) => {
                targets.set_target(desc.id, value);
            }
            None => tracing::warn!(name = name.as_str(), "unknown parameter in state, skipped"),
        }
    }
}
