//! Graph execution and click-free configuration switching.
//!
//! [`ProcessingGraph`] owns a fixed pool of stages, the active
//! [`RoutingConfiguration`] and the scratch buses needed to run it. The
//! pool is built and prepared in the control context; the audio context only
//! runs steps and, at block boundaries, installs a newly requested
//! configuration.
//!
//! # Switching
//!
//! Stages are shared between configurations, so the old and new routing
//! cannot both run in the same block. A switch is therefore a short dip:
//! the output gain ramps linearly to zero under the old configuration over
//! half the crossfade window, the new configuration is installed at the next
//! block boundary, and the gain ramps back to one. A request that arrives
//! mid-transition replaces the pending configuration (last writer wins) and
//! the ramp heads back down from wherever it is, so the gain never jumps.
//!
//! The two topologies are never heard together: for the length of the
//! window the output briefly dips toward silence. Stages that the new
//! configuration runs but the old one did not are reset when it is
//! installed, so they start from silence instead of replaying stale memory.
//!
//! # Input
//!
//! Non-finite input samples are zeroed before the first step, so a single
//! NaN from the host never reaches a stage's delay memory.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::distributor::BlockParams;
use crate::param::LinearSmoothedParam;
use crate::stage::{AudioBlock, ProcessingStage};

use super::buffer::{FeedbackTap, StereoBuffer};
use super::config::{MAX_STEPS, RouteStep, RoutingConfiguration, RoutingError, StageSlot};

/// Default crossfade window for configuration switches.
pub const DEFAULT_CROSSFADE_MS: f32 = 10.0;

/// Shortest crossfade window. Anything shorter is a hard cut.
pub const MIN_CROSSFADE_MS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Idle,
    FadingOut,
    FadingIn,
}

/// Executes a [`RoutingConfiguration`] over a fixed stage pool.
pub struct ProcessingGraph<S: ProcessingStage> {
    stages: Vec<S>,
    active: Arc<RoutingConfiguration>,
    pending: Option<Arc<RoutingConfiguration>>,
    transition: Transition,
    fade: LinearSmoothedParam,
    crossfade_ms: f32,
    dry: StereoBuffer,
    branch: StereoBuffer,
    sum: StereoBuffer,
    taps: Vec<FeedbackTap>,
    sample_rate: f32,
    max_block: usize,
}

impl<S: ProcessingStage> ProcessingGraph<S> {
    /// Build a graph over `stages` (slot `i` is `stages[i]`) and prepare it.
    ///
    /// Fails if `initial` does not validate against the pool.
    pub fn new(
        stages: Vec<S>,
        initial: Arc<RoutingConfiguration>,
        sample_rate: f32,
        max_block: usize,
        channels: usize,
    ) -> Result<Self, RoutingError> {
        initial.validate(stages.len())?;
        let mut graph = Self {
            stages,
            active: initial,
            pending: None,
            transition: Transition::Idle,
            fade: LinearSmoothedParam::new(1.0),
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            dry: StereoBuffer::new(0),
            branch: StereoBuffer::new(0),
            sum: StereoBuffer::new(0),
            taps: Vec::new(),
            sample_rate,
            max_block,
        };
        graph.prepare(sample_rate, max_block, channels);
        Ok(graph)
    }

    /// Size every buffer and prepare every stage. Control context only.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize, channels: usize) {
        self.sample_rate = sample_rate;
        self.max_block = max_block.max(1);
        for stage in &mut self.stages {
            stage.prepare(sample_rate, self.max_block, channels);
        }
        self.dry.resize(self.max_block);
        self.branch.resize(self.max_block);
        self.sum.resize(self.max_block);
        self.taps = (0..MAX_STEPS)
            .map(|_| FeedbackTap::new(sample_rate, self.max_block))
            .collect();
        self.update_fade_length();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample_rate,
            max_block = self.max_block,
            channels,
            stages = self.stages.len(),
            "graph_prepare"
        );
    }

    /// Set the full switch window (fade-out plus fade-in) in milliseconds.
    /// Values below [`MIN_CROSSFADE_MS`] are raised to it.
    pub fn set_crossfade_ms(&mut self, crossfade_ms: f32) {
        self.crossfade_ms = if crossfade_ms.is_finite() {
            crossfade_ms.max(MIN_CROSSFADE_MS)
        } else {
            DEFAULT_CROSSFADE_MS
        };
        self.update_fade_length();
    }

    fn update_fade_length(&mut self) {
        let half = self.crossfade_ms * 0.5;
        self.fade.set_transition_time_ms(half, self.sample_rate);
    }

    /// Samples per fade half.
    pub fn fade_samples(&self) -> u32 {
        self.fade.ramp_samples()
    }

    /// Number of stages in the pool.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Borrow a pool stage.
    pub fn stage(&self, slot: StageSlot) -> Option<&S> {
        self.stages.get(slot.index())
    }

    /// Mutably borrow a pool stage.
    pub fn stage_mut(&mut self, slot: StageSlot) -> Option<&mut S> {
        self.stages.get_mut(slot.index())
    }

    /// The configuration currently producing output.
    pub fn active(&self) -> &Arc<RoutingConfiguration> {
        &self.active
    }

    /// Returns `true` while a switch is fading out or in.
    pub fn is_transitioning(&self) -> bool {
        self.transition != Transition::Idle || self.pending.is_some()
    }

    /// Ask for `config` to become active at the next opportunity.
    ///
    /// Audio-context safe: no allocation, and the previous pending request
    /// is simply replaced. Requests for the configuration already active (or
    /// already pending) are ignored. Configurations that do not validate
    /// against this pool are refused and `false` is returned.
    ///
    /// The graph may drop its reference to a replaced `Arc` here; callers
    /// that publish from another thread keep their own reference so the
    /// final deallocation never happens on the audio thread.
    pub fn request(&mut self, config: Arc<RoutingConfiguration>) -> bool {
        if config.validate(self.stages.len()).is_err() {
            return false;
        }
        let already_pending = self.pending.as_ref().is_some_and(|p| Arc::ptr_eq(p, &config));
        if already_pending {
            return true;
        }
        if Arc::ptr_eq(&self.active, &config) {
            // Going back to what is playing cancels any pending switch.
            self.pending = None;
            if self.transition == Transition::FadingOut {
                self.transition = Transition::FadingIn;
                self.fade.set_target(1.0);
            }
            return true;
        }
        self.pending = Some(config);
        true
    }

    /// Install `config` immediately with no fade and clear all stage state.
    /// Control context only (used on restore and reset).
    pub fn install_immediately(&mut self, config: Arc<RoutingConfiguration>) -> Result<(), RoutingError> {
        config.validate(self.stages.len())?;
        self.active = config;
        self.pending = None;
        self.reset();
        #[cfg(feature = "tracing")]
        tracing::debug!(steps = self.active.steps().len(), "graph_install");
        Ok(())
    }

    /// Clear every stage, feedback tap and transition.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
        for tap in &mut self.taps {
            tap.clear();
        }
        if let Some(pending) = self.pending.take() {
            self.active = pending;
        }
        self.transition = Transition::Idle;
        self.fade.set_immediate(1.0);
    }

    /// Latency of the active configuration in samples.
    ///
    /// Series stages add up; a parallel step contributes its slowest branch.
    pub fn latency_samples(&self) -> usize {
        let config = &self.active;
        let latency = |slot: StageSlot| {
            if config.is_bypassed(slot) {
                0
            } else {
                self.stages.get(slot.index()).map_or(0, |stage| stage.latency_samples())
            }
        };
        config
            .steps()
            .iter()
            .map(|step| match *step {
                RouteStep::Series(slot) | RouteStep::Feedback { stage: slot, .. } => latency(slot),
                RouteStep::Parallel(branches) | RouteStep::ParallelMix { branches, .. } => {
                    branches.iter().map(|(slot, _)| latency(slot)).max().unwrap_or(0)
                }
                RouteStep::Crossfeed(_) => 0,
            })
            .sum()
    }

    /// Process one block in place.
    ///
    /// The block must not exceed the prepared maximum; longer blocks are
    /// truncated to it.
    pub fn process(&mut self, mut block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let len = block.len().min(self.max_block);
        let mut block = AudioBlock::new(&mut block.left[..len], &mut block.right[..len]);
        block.sanitize();

        self.advance_transition();

        Self::run_steps(
            &mut self.stages,
            &self.active,
            &mut self.taps,
            &mut self.dry,
            &mut self.branch,
            &mut self.sum,
            block.reborrow(),
            params,
        );

        if self.transition != Transition::Idle {
            for i in 0..len {
                let gain = self.fade.advance();
                block.left[i] *= gain;
                block.right[i] *= gain;
            }
            if self.transition == Transition::FadingIn && self.fade.is_settled() {
                self.transition = Transition::Idle;
            }
        }
    }

    /// Block-boundary state machine for configuration switches.
    fn advance_transition(&mut self) {
        match self.transition {
            Transition::Idle => {
                if self.pending.is_some() {
                    self.transition = Transition::FadingOut;
                    self.fade.set_target(0.0);
                }
            }
            Transition::FadingOut => {
                if self.fade.is_settled() {
                    if let Some(next) = self.pending.take() {
                        let joining = next.running_mask() & !self.active.running_mask();
                        for (index, stage) in self.stages.iter_mut().enumerate() {
                            if index < 32 && joining & (1 << index) != 0 {
                                stage.reset();
                            }
                        }
                        self.active = next;
                        for tap in &mut self.taps {
                            tap.clear();
                        }
                        #[cfg(feature = "tracing")]
                        tracing::debug!(joining, steps = self.active.steps().len(), "graph_switch");
                    }
                    self.transition = Transition::FadingIn;
                    self.fade.set_target(1.0);
                }
            }
            Transition::FadingIn => {
                if self.pending.is_some() {
                    self.transition = Transition::FadingOut;
                    self.fade.set_target(0.0);
                }
            }
        }
    }

    /// Runs a configuration against the stage pool.
    ///
    /// Static to allow disjoint borrows of the pool, the taps and the scratch
    /// buses. Zero allocations.
    #[allow(clippy::too_many_arguments)]
    fn run_steps(
        stages: &mut [S],
        config: &RoutingConfiguration,
        taps: &mut [FeedbackTap],
        dry: &mut StereoBuffer,
        branch: &mut StereoBuffer,
        sum: &mut StereoBuffer,
        mut block: AudioBlock<'_>,
        params: &BlockParams<'_>,
    ) {
        let len = block.len();

        for (step_index, step) in config.steps().iter().enumerate() {
            match *step {
                RouteStep::Series(slot) => {
                    if !config.is_bypassed(slot)
                        && let Some(stage) = stages.get_mut(slot.index())
                    {
                        stage.process(block.reborrow(), params);
                        block.sanitize();
                    }
                }

                RouteStep::Parallel(branches) | RouteStep::ParallelMix { branches, .. } => {
                    dry.copy_from_slices(block.left, block.right);
                    let dry_level = match *step {
                        RouteStep::ParallelMix { dry: level, .. } => level,
                        _ => 0.0,
                    };
                    sum.left[..len].fill(0.0);
                    sum.right[..len].fill(0.0);
                    if dry_level > 0.0 {
                        sum.accumulate_scaled(&dry.left[..len], &dry.right[..len], dry_level);
                    }

                    for (slot, gain) in branches.iter() {
                        branch.copy_from_slices(&dry.left[..len], &dry.right[..len]);
                        if !config.is_bypassed(slot)
                            && let Some(stage) = stages.get_mut(slot.index())
                        {
                            let mut branch_block =
                                AudioBlock::new(&mut branch.left[..len], &mut branch.right[..len]);
                            stage.process(branch_block.reborrow(), params);
                            branch_block.sanitize();
                        }
                        sum.accumulate_scaled(&branch.left[..len], &branch.right[..len], gain);
                    }

                    block.left.copy_from_slice(&sum.left[..len]);
                    block.right.copy_from_slice(&sum.right[..len]);
                }

                RouteStep::Feedback { stage: slot, gain } => {
                    let Some(tap) = taps.get_mut(step_index) else {
                        continue;
                    };
                    tap.set_gain(gain);
                    tap.inject(block.left, block.right);
                    if !config.is_bypassed(slot)
                        && let Some(stage) = stages.get_mut(slot.index())
                    {
                        stage.process(block.reborrow(), params);
                        block.sanitize();
                    }
                    tap.capture(block.left, block.right);
                }

                RouteStep::Crossfeed(amount) => {
                    let k = 0.5 * amount;
                    for (l, r) in block.left.iter_mut().zip(block.right.iter_mut()) {
                        let (a, b) = (*l, *r);
                        *l = a + k * (b - a);
                        *r = b + k * (a - b);
                    }
                }
            }
        }
    }
}
