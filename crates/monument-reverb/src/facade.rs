//! Output stage: air, width, wet/dry.
//!
//! The dry signal is whatever entered the graph this block. The engine hands
//! it over with [`Facade::capture_dry`] before the graph runs, so the mix is
//! taken against the true input no matter where Facade sits in the routing.

use monument_core::{AudioBlock, BlockParams, OnePole, ProcessingStage, lerp, wet_dry_mix};

use crate::params::{AIR, MIX, WIDTH};

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

const AIR_SPLIT_HZ: f32 = 6500.0;
const AIR_GAIN: (f32, f32) = (-0.3, 0.35);
const MAX_WIDTH: f32 = 2.0;

/// Output stage.
#[derive(Debug, Clone)]
pub struct Facade {
    air: [OnePole; 2],
    dry_left: Vec<f32>,
    dry_right: Vec<f32>,
    dry_len: usize,
}

impl Facade {
    /// Create with room for `max_block` samples of dry signal.
    pub fn new(sample_rate: f32, max_block: usize) -> Self {
        Self {
            air: [OnePole::new(sample_rate, AIR_SPLIT_HZ), OnePole::new(sample_rate, AIR_SPLIT_HZ)],
            dry_left: vec![0.0; max_block],
            dry_right: vec![0.0; max_block],
            dry_len: 0,
        }
    }

    /// Copy the block's dry input. Must be called before the graph runs on
    /// the same block; input longer than the prepared block is truncated.
    pub fn capture_dry(&mut self, left: &[f32], right: &[f32]) {
        let len = left.len().min(right.len()).min(self.dry_left.len());
        self.dry_left[..len].copy_from_slice(&left[..len]);
        self.dry_right[..len].copy_from_slice(&right[..len]);
        self.dry_len = len;
    }
}

impl ProcessingStage for Facade {
    fn prepare(&mut self, sample_rate: f32, max_block: usize, _channels: usize) {
        for f in &mut self.air {
            f.set_sample_rate(sample_rate);
            f.set_frequency(AIR_SPLIT_HZ);
        }
        self.dry_left.resize(max_block, 0.0);
        self.dry_right.resize(max_block, 0.0);
        self.reset();
    }

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let air = params.get(AIR);
        let width = params.get(WIDTH);
        let mix = params.get(MIX);
        let [air_l, air_r] = &mut self.air;

        for (n, (l, r)) in block.left.iter_mut().zip(block.right.iter_mut()).enumerate() {
            let air_gain = lerp(AIR_GAIN.0, AIR_GAIN.1, air.at(n));
            let wet_l = *l + (*l - air_l.process(*l)) * air_gain;
            let wet_r = *r + (*r - air_r.process(*r)) * air_gain;

            let mid = (wet_l + wet_r) * 0.5;
            let side = (wet_l - wet_r) * 0.5 * width.at(n) * MAX_WIDTH;
            let (wet_l, wet_r) = (mid + side, mid - side);

            // Past the captured length the dry signal is silence.
            let (dry_l, dry_r) = if n < self.dry_len {
                (self.dry_left[n], self.dry_right[n])
            } else {
                (0.0, 0.0)
            };
            let m = mix.at(n);
            *l = wet_dry_mix(dry_l, wet_l, m);
            *r = wet_dry_mix(dry_r, wet_r, m);
        }
        self.dry_len = 0;
    }

    fn reset(&mut self) {
        for f in &mut self.air {
            f.reset();
        }
        self.dry_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PARAMS;
    use monument_core::{ParamId, ParameterDistributor, ParameterTargets};

    fn run(stage: &mut Facade, settings: &[(ParamId, f32)], left: &mut [f32], right: &mut [f32]) {
        let targets = ParameterTargets::new(&PARAMS);
        for &(id, value) in settings {
            targets.set_target(id, value);
        }
        let mut dist = ParameterDistributor::new(&PARAMS, 48000.0, left.len(), 4);
        dist.snap_to_targets(&targets);
        let params = dist.begin_block(&targets, left.len());
        stage.process(AudioBlock::new(left, right), &params);
    }

    #[test]
    fn full_dry_returns_captured_input() {
        let mut stage = Facade::new(48000.0, 64);
        let dry: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        stage.capture_dry(&dry, &dry);
        let mut l = vec![0.9; 64];
        let mut r = vec![-0.9; 64];
        run(&mut stage, &[(MIX, 0.0)], &mut l, &mut r);
        for (out, d) in l.iter().zip(&dry) {
            assert!((out - d).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_width_is_mono() {
        let mut stage = Facade::new(48000.0, 64);
        let mut l = vec![0.5; 64];
        let mut r = vec![-0.1; 64];
        run(&mut stage, &[(MIX, 1.0), (WIDTH, 0.0), (AIR, 0.5)], &mut l, &mut r);
        for (a, b) in l.iter().zip(&r) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn neutral_width_keeps_stereo_image() {
        let mut stage = Facade::new(48000.0, 64);
        // DC sits entirely in the low band, so air has no effect here.
        let mut l = vec![0.5; 64];
        let mut r = vec![-0.1; 64];
        run(&mut stage, &[(MIX, 1.0), (WIDTH, 0.5), (AIR, 1.0)], &mut l, &mut r);
        assert!((l[63] - 0.5).abs() < 0.02, "{}", l[63]);
        assert!((r[63] + 0.1).abs() < 0.02, "{}", r[63]);
    }

    #[test]
    fn missing_dry_is_silence() {
        let mut stage = Facade::new(48000.0, 64);
        let mut l = vec![0.7; 64];
        let mut r = vec![0.7; 64];
        run(&mut stage, &[(MIX, 0.0)], &mut l, &mut r);
        assert!(l.iter().chain(&r).all(|v| *v == 0.0));
    }
}
