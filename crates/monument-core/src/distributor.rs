//! Control-rate targets to per-sample parameter buffers.
//!
//! Two halves split across the thread boundary:
//!
//! - [`ParameterTargets`] is shared (behind an `Arc`) between the control
//!   context and the audio context. Each parameter is one `AtomicU32` holding
//!   `f32` bits, so setting a target never locks and never allocates.
//! - [`ParameterDistributor`] is owned by the audio context. Once per block it
//!   reads every target, restarts a linear ramp for any lane whose target
//!   moved, and exposes the block's values as a [`BlockParams`] snapshot.
//!
//! A lane that has been settled on an unchanged target for `stable_blocks`
//! consecutive blocks is handed out as [`ParameterBuffer::Constant`], so
//! stages can skip per-sample reads and the distributor skips the fill.
//!
//! ```rust
//! use monument_core::{ParamDescriptor, ParamId, ParameterDistributor, ParameterTargets};
//!
//! static PARAMS: [ParamDescriptor; 1] =
//!     [ParamDescriptor::normalized(ParamId(0), "Mix", "Mix", "mix", 0.5, 10.0)];
//!
//! let targets = ParameterTargets::new(&PARAMS);
//! let mut dist = ParameterDistributor::new(&PARAMS, 48000.0, 256, 4);
//!
//! targets.set_target(ParamId(0), 1.0);
//! let block = dist.begin_block(&targets, 256);
//! let mix = block.get(ParamId(0));
//! assert!(mix.at(0) > 0.5 && mix.at(0) < 1.0);
//! ```

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::sync::atomic::{AtomicU32, Ordering};

use crate::math::ms_to_samples;
use crate::param::LinearSmoothedParam;
use crate::param_info::{ParamDescriptor, ParamId};

/// Lock-free store of control-rate parameter targets.
///
/// Writers are the control context (host automation, UI, state restore);
/// the reader is the distributor at block start. Values are clamped on the
/// way in, so the audio context never sees an out-of-range target.
#[derive(Debug)]
pub struct ParameterTargets {
    descriptors: &'static [ParamDescriptor],
    slots: Vec<AtomicU32>,
}

impl ParameterTargets {
    /// Create a target store initialized to each parameter's default.
    pub fn new(descriptors: &'static [ParamDescriptor]) -> Self {
        let slots = descriptors
            .iter()
            .map(|d| AtomicU32::new(d.default.to_bits()))
            .collect();
        Self { descriptors, slots }
    }

    /// Set a target. Out-of-range values are clamped, non-finite values fall
    /// back to the default. Returns the stored value, or `None` for an
    /// unknown id.
    pub fn set_target(&self, id: ParamId, value: f32) -> Option<f32> {
        let desc = self.descriptors.get(id.index())?;
        let clamped = desc.clamp(value);
        self.slots[id.index()].store(clamped.to_bits(), Ordering::Relaxed);
        Some(clamped)
    }

    /// Current target for `id`.
    pub fn target(&self, id: ParamId) -> Option<f32> {
        self.slots.get(id.index()).map(|slot| load(slot))
    }

    /// Reset every target to its default.
    pub fn reset_to_defaults(&self) {
        for (slot, desc) in self.slots.iter().zip(self.descriptors) {
            slot.store(desc.default.to_bits(), Ordering::Relaxed);
        }
    }

    /// Copy all targets into `out` (truncated to the shorter length).
    pub fn snapshot_into(&self, out: &mut [f32]) {
        for (dst, slot) in out.iter_mut().zip(&self.slots) {
            *dst = load(slot);
        }
    }

    /// Parameter metadata, indexed by [`ParamId::index`].
    pub fn descriptors(&self) -> &'static [ParamDescriptor] {
        self.descriptors
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no parameters are registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[inline]
fn load(slot: &AtomicU32) -> f32 {
    f32::from_bits(slot.load(Ordering::Relaxed))
}

/// One block's worth of values for a single parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterBuffer<'a> {
    /// A ramp (or a not-yet-stable plateau), one value per sample.
    PerSample(&'a [f32]),
    /// The value is the same for every sample of the block.
    Constant(f32),
}

impl ParameterBuffer<'_> {
    /// Value at sample `index`. Reads past the end return the last value.
    #[inline]
    pub fn at(&self, index: usize) -> f32 {
        match *self {
            Self::PerSample(values) => values
                .get(index)
                .or_else(|| values.last())
                .copied()
                .unwrap_or(0.0),
            Self::Constant(value) => value,
        }
    }

    /// First value of the block.
    #[inline]
    pub fn first(&self) -> f32 {
        self.at(0)
    }

    /// Last value of the block (what the next block ramps from).
    #[inline]
    pub fn last(&self) -> f32 {
        match *self {
            Self::PerSample(values) => values.last().copied().unwrap_or(0.0),
            Self::Constant(value) => value,
        }
    }

    /// Returns `true` for the constant view.
    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }
}

struct Lane {
    ramp: LinearSmoothedParam,
    buffer: Vec<f32>,
    ramp_samples: u32,
    stable_blocks: u32,
    constant: bool,
}

impl Lane {
    fn new(desc: &ParamDescriptor, sample_rate: f32, max_block: usize) -> Self {
        let mut lane = Self {
            ramp: LinearSmoothedParam::new(desc.default),
            buffer: vec![desc.default; max_block],
            ramp_samples: 1,
            stable_blocks: 0,
            constant: false,
        };
        lane.configure(desc, sample_rate, max_block);
        lane
    }

    fn configure(&mut self, desc: &ParamDescriptor, sample_rate: f32, max_block: usize) {
        self.ramp_samples = if desc.is_stepped() {
            1
        } else {
            (ms_to_samples(desc.smoothing_ms, sample_rate) as u32).max(1)
        };
        self.ramp.set_ramp_samples(self.ramp_samples);
        self.buffer.resize(max_block, self.ramp.get());
    }
}

/// Audio-context side of parameter distribution.
///
/// All lane buffers are sized to the maximum block length in
/// [`new`](Self::new) / [`prepare`](Self::prepare); [`begin_block`](Self::begin_block)
/// only writes into them.
pub struct ParameterDistributor {
    descriptors: &'static [ParamDescriptor],
    lanes: Vec<Lane>,
    sample_rate: f32,
    max_block: usize,
    stable_blocks: u32,
}

impl ParameterDistributor {
    /// Create a distributor with one lane per descriptor.
    ///
    /// `stable_blocks` is how many settled, unchanged blocks a lane needs
    /// before it is delivered as a constant view.
    pub fn new(
        descriptors: &'static [ParamDescriptor],
        sample_rate: f32,
        max_block: usize,
        stable_blocks: u32,
    ) -> Self {
        let max_block = max_block.max(1);
        let lanes = descriptors
            .iter()
            .map(|d| Lane::new(d, sample_rate, max_block))
            .collect();
        Self {
            descriptors,
            lanes,
            sample_rate,
            max_block,
            stable_blocks,
        }
    }

    /// Re-size lane buffers and recompute ramp lengths. Control context only.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize) {
        self.sample_rate = sample_rate;
        self.max_block = max_block.max(1);
        for (lane, desc) in self.lanes.iter_mut().zip(self.descriptors) {
            lane.configure(desc, sample_rate, self.max_block);
        }
    }

    /// Maximum block length the lanes can hold.
    pub fn max_block(&self) -> usize {
        self.max_block
    }

    /// Ramp length in samples for `id`.
    pub fn ramp_samples(&self, id: ParamId) -> Option<u32> {
        self.lanes.get(id.index()).map(|lane| lane.ramp_samples)
    }

    /// Last delivered value for `id`.
    pub fn current(&self, id: ParamId) -> Option<f32> {
        self.lanes.get(id.index()).map(|lane| lane.ramp.get())
    }

    /// Jump every lane to `targets` with no ramp.
    pub fn snap_to_targets(&mut self, targets: &ParameterTargets) {
        for (index, lane) in self.lanes.iter_mut().enumerate() {
            let value = targets.target(ParamId(index as u32)).unwrap_or(0.0);
            lane.ramp.set_immediate(value);
            lane.buffer.fill(value);
            lane.stable_blocks = 0;
            lane.constant = false;
        }
    }

    /// Expand the current targets into per-sample buffers for one block.
    pub fn begin_block(&mut self, targets: &ParameterTargets, block_len: usize) -> BlockParams<'_> {
        self.begin_block_with(targets, block_len, |_, target| target)
    }

    /// Like [`begin_block`](Self::begin_block), but lets the caller replace
    /// each target with an effective value (macro blend plus modulation
    /// offset) before ramping. The result is clamped to the parameter range.
    ///
    /// `block_len` is capped at the prepared maximum.
    pub fn begin_block_with<F>(
        &mut self,
        targets: &ParameterTargets,
        block_len: usize,
        mut effective: F,
    ) -> BlockParams<'_>
    where
        F: FnMut(ParamId, f32) -> f32,
    {
        let len = block_len.min(self.max_block);
        for (index, (lane, desc)) in self.lanes.iter_mut().zip(self.descriptors).enumerate() {
            let id = ParamId(index as u32);
            let user = targets.target(id).unwrap_or(desc.default);
            let target = desc.clamp(effective(id, user));

            if target != lane.ramp.target() {
                lane.ramp.set_target(target);
                lane.stable_blocks = 0;
            } else if lane.ramp.is_settled() {
                lane.stable_blocks = lane.stable_blocks.saturating_add(1);
            }

            lane.constant = lane.ramp.is_settled() && lane.stable_blocks >= self.stable_blocks;
            if !lane.constant {
                lane.ramp.fill(&mut lane.buffer[..len]);
            }
        }
        BlockParams {
            lanes: &self.lanes,
            len,
        }
    }
}

/// Read-only parameter snapshot for one block.
///
/// Borrowed by every stage for the duration of a single process call.
pub struct BlockParams<'a> {
    lanes: &'a [Lane],
    len: usize,
}

impl<'a> BlockParams<'a> {
    /// Buffer for `id`. Unknown ids read as a constant 0.
    #[inline]
    pub fn get(&self, id: ParamId) -> ParameterBuffer<'a> {
        match self.lanes.get(id.index()) {
            Some(lane) if lane.constant => ParameterBuffer::Constant(lane.ramp.get()),
            Some(lane) => ParameterBuffer::PerSample(&lane.buffer[..self.len]),
            None => ParameterBuffer::Constant(0.0),
        }
    }

    /// Shorthand for `get(id).at(index)`.
    #[inline]
    pub fn value_at(&self, id: ParamId, index: usize) -> f32 {
        self.get(id).at(index)
    }

    /// Shorthand for `get(id).last()`, for stages that update coefficients
    /// once per block.
    #[inline]
    pub fn block_value(&self, id: ParamId) -> f32 {
        self.get(id).last()
    }

    /// Number of samples in the block.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PARAMS: [ParamDescriptor; 3] = [
        ParamDescriptor::normalized(ParamId(0), "Time", "Time", "time", 0.55, 10.0),
        ParamDescriptor::normalized(ParamId(1), "Mass", "Mass", "mass", 0.5, 1.0),
        ParamDescriptor::stepped(ParamId(2), "Freeze", "Freeze", "freeze", 0.0),
    ];

    fn setup() -> (ParameterTargets, ParameterDistributor) {
        (
            ParameterTargets::new(&PARAMS),
            ParameterDistributor::new(&PARAMS, 48000.0, 128, 2),
        )
    }

    #[test]
    fn targets_are_clamped_not_rejected() {
        let targets = ParameterTargets::new(&PARAMS);
        assert_eq!(targets.set_target(ParamId(0), 3.0), Some(1.0));
        assert_eq!(targets.set_target(ParamId(0), -1.0), Some(0.0));
        assert_eq!(targets.set_target(ParamId(1), f32::NAN), Some(0.5));
        assert_eq!(targets.set_target(ParamId(9), 0.5), None);
    }

    #[test]
    fn ramp_lands_on_target_after_ramp_length() {
        let (targets, mut dist) = setup();
        targets.set_target(ParamId(0), 1.0);
        // 10 ms at 48 kHz = 480 samples, i.e. 3.75 blocks of 128.
        for _ in 0..4 {
            dist.begin_block(&targets, 128);
        }
        let block = dist.begin_block(&targets, 128);
        assert_eq!(block.get(ParamId(0)).at(0), 1.0);
        assert_eq!(block.get(ParamId(0)).last(), 1.0);
    }

    #[test]
    fn ramp_step_is_bounded() {
        let (targets, mut dist) = setup();
        targets.set_target(ParamId(0), 0.0);
        let mut prev = 0.55;
        for _ in 0..5 {
            let block = dist.begin_block(&targets, 128);
            let buf = block.get(ParamId(0));
            for i in 0..block.len() {
                let v = buf.at(i);
                assert!((v - prev).abs() <= 0.55 / 480.0 + 1e-6);
                prev = v;
            }
        }
    }

    #[test]
    fn stable_lane_becomes_constant() {
        let (targets, mut dist) = setup();
        assert!(!dist.begin_block(&targets, 64).get(ParamId(1)).is_constant());
        dist.begin_block(&targets, 64);
        let block = dist.begin_block(&targets, 64);
        assert_eq!(block.get(ParamId(1)), ParameterBuffer::Constant(0.5));

        targets.set_target(ParamId(1), 0.7);
        assert!(!dist.begin_block(&targets, 64).get(ParamId(1)).is_constant());
    }

    #[test]
    fn stepped_parameter_jumps_on_first_sample() {
        let (targets, mut dist) = setup();
        targets.set_target(ParamId(2), 1.0);
        let block = dist.begin_block(&targets, 64);
        assert_eq!(block.get(ParamId(2)).at(0), 1.0);
    }

    #[test]
    fn effective_override_is_clamped() {
        let (targets, mut dist) = setup();
        dist.snap_to_targets(&targets);
        let block = dist.begin_block_with(&targets, 64, |id, t| if id == ParamId(2) { 5.0 } else { t });
        assert_eq!(block.get(ParamId(2)).last(), 1.0);
    }

    #[test]
    fn block_len_is_capped() {
        let (targets, mut dist) = setup();
        let block = dist.begin_block(&targets, 4096);
        assert_eq!(block.len(), 128);
    }
}
