//! Audio-context engine.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use monument_core::graph::{ProcessingGraph, RoutingConfiguration};
use monument_core::{AudioBlock, ParamId, ParameterDistributor, sanitize_buffer};
use monument_modulation::{ModulationRouter, Publisher, Reader};
use monument_reverb::macros::{MACRO_COUNT, MACROS};
use monument_reverb::params::{PARAM_COUNT, PARAMS};
use monument_reverb::{MacroBlender, MacroValues, Stage, StageKind};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::handle::{EngineHandle, Shared};
use crate::state::RoutingSpec;

/// Share of the normalized range a full-scale modulation offset spans.
pub const MODULATION_DEPTH: f32 = 0.5;

/// The reverb engine: macro blend, modulation, parameter distribution and
/// the stage graph, run once per block.
///
/// Owned by the audio thread. [`process`](Self::process) and
/// [`process_mono`](Self::process_mono) never allocate, lock or log.
pub struct Engine {
    shared: Arc<Shared>,
    graph: ProcessingGraph<Stage>,
    distributor: ParameterDistributor,
    router: ModulationRouter,
    routing: Reader<RoutingConfiguration>,
    restore_seen: u64,
    mono_scratch: Vec<f32>,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine and its control handle.
    pub fn new(config: EngineConfig) -> Result<(Self, EngineHandle), EngineError> {
        config.validate()?;
        let spec = RoutingSpec::default();
        let initial = Arc::new(spec.build()?);
        let routing = Publisher::from_arc(Arc::clone(&initial));

        let mut graph = ProcessingGraph::new(
            Stage::pool(config.sample_rate, config.max_block),
            initial,
            config.sample_rate,
            config.max_block,
            config.channels,
        )?;
        graph.set_crossfade_ms(config.crossfade_ms);

        let shared = Arc::new(Shared::new(config.seed, spec));
        let mut distributor =
            ParameterDistributor::new(&PARAMS, config.sample_rate, config.max_block, config.stable_blocks);
        distributor.snap_to_targets(&shared.params);
        let (router, modulation) = ModulationRouter::new(PARAM_COUNT, config.sample_rate, config.seed);
        shared.latency.store(graph.latency_samples(), Ordering::Relaxed);

        tracing::info!(
            sample_rate = config.sample_rate,
            max_block = config.max_block,
            channels = config.channels,
            "engine created"
        );

        let engine = Self {
            routing: routing.reader(),
            shared: Arc::clone(&shared),
            graph,
            distributor,
            router,
            restore_seen: 0,
            mono_scratch: vec![0.0; config.max_block],
            config,
        };
        let handle = EngineHandle { shared, routing, modulation };
        Ok((engine, handle))
    }

    /// Re-size every buffer for a new sample rate, block size or channel
    /// count. Control context only: this allocates.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize, channels: usize) -> Result<(), EngineError> {
        let config = EngineConfig { sample_rate, max_block, channels, ..self.config.clone() };
        config.validate()?;
        self.graph.prepare(sample_rate, max_block, channels);
        self.graph.set_crossfade_ms(config.crossfade_ms);
        self.distributor.prepare(sample_rate, max_block);
        self.distributor.snap_to_targets(&self.shared.params);
        self.router.set_sample_rate(sample_rate);
        self.mono_scratch = vec![0.0; max_block];
        self.config = config;
        self.shared.latency.store(self.graph.latency_samples(), Ordering::Relaxed);
        tracing::debug!(sample_rate, max_block, channels, "engine prepared");
        Ok(())
    }

    /// Clear all stage state, modulation smoothing and parameter ramps.
    pub fn reset(&mut self) {
        self.graph.reset();
        self.router.reset();
        self.distributor.snap_to_targets(&self.shared.params);
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Latency of the active routing in samples.
    pub fn latency_samples(&self) -> usize {
        self.graph.latency_samples()
    }

    /// Whether a routing switch is in progress.
    pub fn is_transitioning(&self) -> bool {
        self.graph.is_transitioning()
    }

    /// The active routing.
    pub fn active_routing(&self) -> &Arc<RoutingConfiguration> {
        self.graph.active()
    }

    /// Direct access to a pool stage, for analysis and stage-level setters
    /// that are not parameters (input trim, saturation drive, feedback
    /// override).
    pub fn stage_mut(&mut self, kind: StageKind) -> Option<&mut Stage> {
        self.graph.stage_mut(kind.slot())
    }

    /// Process a stereo block in place. Blocks longer than the prepared
    /// maximum are split.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.apply_pending_restore();
        let len = left.len().min(right.len());
        let max_block = self.config.max_block;
        for (l, r) in left[..len].chunks_mut(max_block).zip(right[..len].chunks_mut(max_block)) {
            self.process_chunk(l, r);
        }
    }

    /// Process a mono block in place. The signal is run as dual mono and the
    /// two outputs are averaged.
    pub fn process_mono(&mut self, buffer: &mut [f32]) {
        self.apply_pending_restore();
        let mut scratch = std::mem::take(&mut self.mono_scratch);
        for chunk in buffer.chunks_mut(self.config.max_block) {
            let right = &mut scratch[..chunk.len()];
            right.copy_from_slice(chunk);
            self.process_chunk(chunk, right);
            for (l, r) in chunk.iter_mut().zip(right.iter()) {
                *l = 0.5 * (*l + *r);
            }
        }
        self.mono_scratch = scratch;
    }

    fn apply_pending_restore(&mut self) {
        let generation = self.shared.restore_generation.load(Ordering::Acquire);
        if generation == self.restore_seen {
            return;
        }
        self.restore_seen = generation;
        self.routing.refresh();
        if self.graph.install_immediately(Arc::clone(self.routing.get_arc())).is_err() {
            self.graph.reset();
        }
        self.router.reseed(self.shared.seed.load(Ordering::Relaxed));
        self.distributor.snap_to_targets(&self.shared.params);
    }

    fn process_chunk(&mut self, left: &mut [f32], right: &mut [f32]) {
        // Followers and the dry capture see the input before the graph does.
        sanitize_buffer(left);
        sanitize_buffer(right);

        if self.routing.refresh() {
            self.graph.request(Arc::clone(self.routing.get_arc()));
        }

        let macros = MacroValues(core::array::from_fn::<f32, MACRO_COUNT, _>(|i| {
            self.shared.macros.target(ParamId(i as u32)).unwrap_or(MACROS[i].default)
        }));
        let blend = MacroBlender::compute(&macros);
        let tempo = self.shared.tempo();
        let offsets = self.router.compute_offsets(left, right, &tempo);

        if let Some(facade) = self.graph.stage_mut(StageKind::Facade.slot()).and_then(Stage::as_facade_mut) {
            facade.capture_dry(left, right);
        }

        let params = self.distributor.begin_block_with(&self.shared.params, left.len(), |id, user| {
            let base = blend.apply(id, user);
            match PARAMS.get(id.index()) {
                Some(desc) if desc.is_modulatable() => {
                    base + offsets.get(id.index()).copied().unwrap_or(0.0) * MODULATION_DEPTH
                }
                _ => base,
            }
        });
        self.graph.process(AudioBlock::new(left, right), &params);
        self.shared.latency.store(self.graph.latency_samples(), Ordering::Relaxed);
    }
}
