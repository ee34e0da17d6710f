//! Scratch buses and feedback-tap memory for graph execution.
//!
//! Everything here is sized in `prepare` and only written during processing.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::one_pole::OnePole;
use crate::param::SmoothedParam;

/// Owned stereo scratch buffer.
pub struct StereoBuffer {
    /// Left channel samples.
    pub left: Vec<f32>,
    /// Right channel samples.
    pub right: Vec<f32>,
}

impl StereoBuffer {
    /// Creates a zeroed buffer of `block_size` samples per channel.
    pub fn new(block_size: usize) -> Self {
        Self {
            left: vec![0.0; block_size],
            right: vec![0.0; block_size],
        }
    }

    /// Fills both channels with zeros.
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Resizes both channels, zeroing new samples. Control context only.
    pub fn resize(&mut self, block_size: usize) {
        self.left.resize(block_size, 0.0);
        self.right.resize(block_size, 0.0);
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns true if the buffer has zero length.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Copy the first `left.len()` samples from a pair of slices.
    pub fn copy_from_slices(&mut self, left: &[f32], right: &[f32]) {
        let len = left.len();
        self.left[..len].copy_from_slice(left);
        self.right[..len].copy_from_slice(&right[..len]);
    }

    /// `self[..len] += other[..len] * gain`
    pub fn accumulate_scaled(&mut self, left: &[f32], right: &[f32], gain: f32) {
        for (dst, src) in self.left.iter_mut().zip(left) {
            *dst += *src * gain;
        }
        for (dst, src) in self.right.iter_mut().zip(right) {
            *dst += *src * gain;
        }
    }
}

/// Loop-tap cutoff in Hz.
pub const FEEDBACK_LOWPASS_HZ: f32 = 8000.0;

/// Gain smoothing for feedback taps, in milliseconds.
pub const FEEDBACK_GAIN_SMOOTHING_MS: f32 = 50.0;

/// Memory for one feedback step: the previous block's stage output, a
/// lowpass on the returned signal and a smoothed loop gain.
pub struct FeedbackTap {
    previous: StereoBuffer,
    previous_len: usize,
    lowpass_left: OnePole,
    lowpass_right: OnePole,
    gain: SmoothedParam,
}

impl FeedbackTap {
    /// Create a silent tap for blocks up to `max_block`.
    pub fn new(sample_rate: f32, max_block: usize) -> Self {
        Self {
            previous: StereoBuffer::new(max_block),
            previous_len: 0,
            lowpass_left: OnePole::new(sample_rate, FEEDBACK_LOWPASS_HZ),
            lowpass_right: OnePole::new(sample_rate, FEEDBACK_LOWPASS_HZ),
            gain: SmoothedParam::with_config(0.0, sample_rate, FEEDBACK_GAIN_SMOOTHING_MS),
        }
    }

    /// Set the loop gain the tap smooths toward.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set_target(gain);
    }

    /// Mix the returned signal into `left`/`right` (the stage input).
    pub fn inject(&mut self, left: &mut [f32], right: &mut [f32]) {
        for i in 0..left.len().min(right.len()) {
            let g = self.gain.advance();
            let (l, r) = if i < self.previous_len {
                (self.previous.left[i], self.previous.right[i])
            } else {
                (0.0, 0.0)
            };
            left[i] += g * self.lowpass_left.process(l);
            right[i] += g * self.lowpass_right.process(r);
        }
    }

    /// Remember the stage output for the next block.
    pub fn capture(&mut self, left: &[f32], right: &[f32]) {
        let len = left.len().min(self.previous.len());
        self.previous.copy_from_slices(&left[..len], &right[..len]);
        self.previous_len = len;
    }

    /// Clear memory and snap the gain to zero.
    pub fn clear(&mut self) {
        self.previous.clear();
        self.previous_len = 0;
        self.lowpass_left.reset();
        self.lowpass_right.reset();
        self.gain.set_immediate(0.0);
    }
}
