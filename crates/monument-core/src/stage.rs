//! The processing-stage contract shared by every unit in the signal path.
//!
//! A stage owns only its internal state (delay memory, filter history,
//! envelopes). Ordering and topology live in the
//! [`ProcessingGraph`](crate::graph::ProcessingGraph); per-block parameter
//! values arrive through [`BlockParams`].
//!
//! The stage set is closed, so implementors are typically one enum with a
//! variant per stage type and a `match` in each method. No boxing, no
//! plugin loading.

use crate::distributor::BlockParams;

/// A borrowed stereo block.
///
/// Mono hosts pass the same signal in both channels and read back the left.
pub struct AudioBlock<'a> {
    /// Left channel samples.
    pub left: &'a mut [f32],
    /// Right channel samples.
    pub right: &'a mut [f32],
}

impl<'a> AudioBlock<'a> {
    /// Wrap two channel slices. The block length is the shorter of the two.
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        let len = left.len().min(right.len());
        Self {
            left: &mut left[..len],
            right: &mut right[..len],
        }
    }

    /// Samples per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns `true` for a zero-length block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Reborrow for a nested call without giving up `self`.
    #[inline]
    pub fn reborrow(&mut self) -> AudioBlock<'_> {
        AudioBlock {
            left: &mut *self.left,
            right: &mut *self.right,
        }
    }

    /// Multiply both channels by `gain`.
    pub fn scale(&mut self, gain: f32) {
        for sample in self.left.iter_mut().chain(self.right.iter_mut()) {
            *sample *= gain;
        }
    }

    /// Zero any NaN or infinite samples. Returns `true` if any were found.
    pub fn sanitize(&mut self) -> bool {
        let l = crate::math::sanitize_buffer(self.left);
        let r = crate::math::sanitize_buffer(self.right);
        l || r
    }
}

/// A unit of the signal path.
///
/// All methods except [`prepare`](Self::prepare) run in the audio context and
/// must not allocate, lock or block.
pub trait ProcessingStage {
    /// Size internal buffers for the given format. Control context only;
    /// this is the only method allowed to allocate.
    fn prepare(&mut self, sample_rate: f32, max_block: usize, channels: usize);

    /// Process one block in place.
    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>);

    /// Clear all internal state without changing configuration.
    fn reset(&mut self);

    /// Processing latency in samples.
    fn latency_samples(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_uses_shorter_channel() {
        let mut l = [1.0; 8];
        let mut r = [1.0; 5];
        let block = AudioBlock::new(&mut l, &mut r);
        assert_eq!(block.len(), 5);
    }

    #[test]
    fn sanitize_reports_and_clears() {
        let mut l = [0.5, f32::NAN];
        let mut r = [f32::INFINITY, 0.25];
        let mut block = AudioBlock::new(&mut l, &mut r);
        assert!(block.sanitize());
        assert_eq!(l, [0.5, 0.0]);
        assert_eq!(r, [0.0, 0.25]);
    }

    #[test]
    fn scale_both_channels() {
        let mut l = [1.0; 4];
        let mut r = [2.0; 4];
        AudioBlock::new(&mut l, &mut r).scale(0.5);
        assert_eq!(l, [0.5; 4]);
        assert_eq!(r, [1.0; 4]);
    }
}
