//! Routing configurations: what runs, in which order, with which taps.
//!
//! A [`RoutingConfiguration`] is built and validated entirely in the control
//! context, wrapped in an `Arc`, and handed to the audio context as an
//! immutable snapshot. Stages are referenced by [`StageSlot`], an index into
//! the graph's fixed stage pool, so installing a configuration never
//! constructs a stage.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Maximum number of steps in one configuration.
pub const MAX_STEPS: usize = 16;

/// Maximum number of branches in one parallel step.
pub const MAX_BRANCHES: usize = 4;

/// Highest gain a feedback tap may use.
pub const MAX_FEEDBACK_GAIN: f32 = 0.95;

/// Index of a stage in the graph's fixed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageSlot(pub u8);

impl StageSlot {
    /// Pool index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    const fn bit(self) -> u32 {
        1 << (self.0 & 31)
    }
}

impl core::fmt::Display for StageSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "stage #{}", self.0)
    }
}

/// Fan-out branches of a parallel step: each branch runs on a copy of the
/// current bus and the outputs are summed with their gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParallelBranches {
    branches: [(StageSlot, f32); MAX_BRANCHES],
    count: usize,
}

impl ParallelBranches {
    /// Active branches as `(slot, gain)` pairs.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (StageSlot, f32)> + '_ {
        self.branches[..self.count].iter().copied()
    }

    /// Number of active branches.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if there are no branches.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// One step of a routing configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteStep {
    /// Run one stage in place on the bus.
    Series(StageSlot),
    /// Run each branch on a copy of the bus, replace the bus with the
    /// weighted sum.
    Parallel(ParallelBranches),
    /// Like [`Parallel`](Self::Parallel), but the unprocessed bus is kept
    /// under the branch sum at level `dry`.
    ParallelMix {
        /// Branches run on copies of the bus.
        branches: ParallelBranches,
        /// Level of the untouched bus in the output, `0..=1`.
        dry: f32,
    },
    /// Run a stage with the previous block's output of that stage, low-passed
    /// and scaled by `gain`, mixed into its input.
    Feedback {
        /// Stage inside the loop.
        stage: StageSlot,
        /// Loop gain, at most [`MAX_FEEDBACK_GAIN`].
        gain: f32,
    },
    /// Blend left and right toward each other; 1.0 collapses to mono.
    Crossfeed(f32),
}

/// Rejection reasons for a configuration under construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoutingError {
    /// No steps.
    Empty,
    /// More than [`MAX_STEPS`] steps.
    TooManySteps(usize),
    /// A parallel step with no branches or more than [`MAX_BRANCHES`].
    InvalidBranchCount(usize),
    /// A stage appears more than once.
    DuplicateStage(StageSlot),
    /// A slot outside the stage pool.
    UnknownStage(StageSlot),
    /// A feedback gain above [`MAX_FEEDBACK_GAIN`] or below zero.
    FeedbackGainOutOfRange(f32),
    /// A NaN or infinite gain or crossfeed amount.
    NonFiniteGain,
    /// A parallel-mix dry level outside `0..=1`.
    DryLevelOutOfRange(f32),
}

impl core::fmt::Display for RoutingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "routing has no steps"),
            Self::TooManySteps(n) => write!(f, "routing has {n} steps, at most {MAX_STEPS} allowed"),
            Self::InvalidBranchCount(n) => {
                write!(f, "parallel step has {n} branches, expected 1 to {MAX_BRANCHES}")
            }
            Self::DuplicateStage(slot) => write!(f, "{slot} appears more than once"),
            Self::UnknownStage(slot) => write!(f, "{slot} is not in the stage pool"),
            Self::FeedbackGainOutOfRange(g) => {
                write!(f, "feedback gain {g} outside 0..={MAX_FEEDBACK_GAIN}")
            }
            Self::NonFiniteGain => write!(f, "gain is not finite"),
            Self::DryLevelOutOfRange(d) => write!(f, "dry level {d} outside 0..=1"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RoutingError {}

/// An immutable, validated routing of pool stages.
///
/// ```rust
/// use monument_core::graph::{RoutingConfiguration, StageSlot};
///
/// let config = RoutingConfiguration::builder()
///     .series(StageSlot(0))
///     .parallel(&[(StageSlot(1), 0.5), (StageSlot(2), 0.5)])
///     .feedback(StageSlot(3), 0.3)
///     .build(4)
///     .unwrap();
/// assert_eq!(config.steps().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfiguration {
    steps: Vec<RouteStep>,
    bypass: u32,
}

impl RoutingConfiguration {
    /// Start building a configuration.
    pub fn builder() -> RoutingBuilder {
        RoutingBuilder::default()
    }

    /// Ordered steps.
    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    /// Whether `slot` is bypassed (treated as identity).
    #[inline]
    pub fn is_bypassed(&self, slot: StageSlot) -> bool {
        self.bypass & slot.bit() != 0
    }

    /// Raw bypass mask, one bit per slot.
    pub fn bypass_mask(&self) -> u32 {
        self.bypass
    }

    /// Slots that actually run: referenced and not bypassed, one bit each.
    pub fn running_mask(&self) -> u32 {
        self.stages()
            .filter(|slot| !self.is_bypassed(*slot))
            .fold(0, |mask, slot| mask | slot.bit())
    }

    /// Every slot referenced, in step order.
    pub fn stages(&self) -> impl Iterator<Item = StageSlot> + '_ {
        self.steps.iter().flat_map(|step| {
            let mut slots = [None; MAX_BRANCHES];
            match *step {
                RouteStep::Series(slot) | RouteStep::Feedback { stage: slot, .. } => {
                    slots[0] = Some(slot);
                }
                RouteStep::Parallel(branches) | RouteStep::ParallelMix { branches, .. } => {
                    for (dst, (slot, _)) in slots.iter_mut().zip(branches.iter()) {
                        *dst = Some(slot);
                    }
                }
                RouteStep::Crossfeed(_) => {}
            }
            slots.into_iter().flatten()
        })
    }

    /// Re-check every rule against a pool of `stage_count` stages.
    pub fn validate(&self, stage_count: usize) -> Result<(), RoutingError> {
        if self.steps.is_empty() {
            return Err(RoutingError::Empty);
        }
        if self.steps.len() > MAX_STEPS {
            return Err(RoutingError::TooManySteps(self.steps.len()));
        }

        let mut seen = 0u32;
        for step in &self.steps {
            match *step {
                RouteStep::Parallel(branches) => check_branches(&branches)?,
                RouteStep::ParallelMix { branches, dry } => {
                    check_branches(&branches)?;
                    if !dry.is_finite() {
                        return Err(RoutingError::NonFiniteGain);
                    }
                    if !(0.0..=1.0).contains(&dry) {
                        return Err(RoutingError::DryLevelOutOfRange(dry));
                    }
                }
                RouteStep::Feedback { gain, .. } => {
                    if !gain.is_finite() {
                        return Err(RoutingError::NonFiniteGain);
                    }
                    if !(0.0..=MAX_FEEDBACK_GAIN).contains(&gain) {
                        return Err(RoutingError::FeedbackGainOutOfRange(gain));
                    }
                }
                RouteStep::Crossfeed(amount) => {
                    if !amount.is_finite() {
                        return Err(RoutingError::NonFiniteGain);
                    }
                }
                RouteStep::Series(_) => {}
            }
        }
        for slot in self.stages() {
            if slot.index() >= stage_count || slot.index() >= 32 {
                return Err(RoutingError::UnknownStage(slot));
            }
            if seen & slot.bit() != 0 {
                return Err(RoutingError::DuplicateStage(slot));
            }
            seen |= slot.bit();
        }
        Ok(())
    }
}

fn check_branches(branches: &ParallelBranches) -> Result<(), RoutingError> {
    if branches.is_empty() || branches.len() > MAX_BRANCHES {
        return Err(RoutingError::InvalidBranchCount(branches.len()));
    }
    if branches.iter().any(|(_, g)| !g.is_finite()) {
        return Err(RoutingError::NonFiniteGain);
    }
    Ok(())
}

/// Builder for [`RoutingConfiguration`]. Errors surface at
/// [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct RoutingBuilder {
    steps: Vec<RouteStep>,
    bypass: u32,
    error: Option<RoutingError>,
}

impl RoutingBuilder {
    /// Append a series stage.
    pub fn series(mut self, slot: StageSlot) -> Self {
        self.steps.push(RouteStep::Series(slot));
        self
    }

    /// Append a parallel step. More than [`MAX_BRANCHES`] branches, or none,
    /// is an error.
    pub fn parallel(mut self, branches: &[(StageSlot, f32)]) -> Self {
        if let Some(step) = self.branches(branches) {
            self.steps.push(RouteStep::Parallel(step));
        }
        self
    }

    /// Append a parallel step that keeps the incoming bus at level `dry`
    /// under the branch sum.
    pub fn parallel_mix(mut self, branches: &[(StageSlot, f32)], dry: f32) -> Self {
        if let Some(branches) = self.branches(branches) {
            self.steps.push(RouteStep::ParallelMix { branches, dry });
        }
        self
    }

    fn branches(&mut self, branches: &[(StageSlot, f32)]) -> Option<ParallelBranches> {
        if branches.is_empty() || branches.len() > MAX_BRANCHES {
            if self.error.is_none() {
                self.error = Some(RoutingError::InvalidBranchCount(branches.len()));
            }
            return None;
        }
        let mut step = ParallelBranches {
            branches: [(StageSlot(0), 0.0); MAX_BRANCHES],
            count: branches.len(),
        };
        step.branches[..branches.len()].copy_from_slice(branches);
        Some(step)
    }

    /// Append a stage wrapped in a feedback tap.
    pub fn feedback(mut self, stage: StageSlot, gain: f32) -> Self {
        self.steps.push(RouteStep::Feedback { stage, gain });
        self
    }

    /// Append a crossfeed step. The amount is clamped to `[0, 1]`.
    pub fn crossfeed(mut self, amount: f32) -> Self {
        let amount = if amount.is_finite() { amount.clamp(0.0, 1.0) } else { amount };
        self.steps.push(RouteStep::Crossfeed(amount));
        self
    }

    /// Mark a stage as bypassed.
    pub fn bypass(mut self, slot: StageSlot) -> Self {
        self.bypass |= slot.bit();
        self
    }

    /// Replace the whole bypass mask.
    pub fn bypass_mask(mut self, mask: u32) -> Self {
        self.bypass = mask;
        self
    }

    /// Validate against a pool of `stage_count` stages and finish.
    pub fn build(self, stage_count: usize) -> Result<RoutingConfiguration, RoutingError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let config = RoutingConfiguration {
            steps: self.steps,
            bypass: self.bypass,
        };
        config.validate(stage_count)?;
        Ok(config)
    }
}
