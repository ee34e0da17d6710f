//! Physics that does not hold: rotating phase, a resonance that gains
//! energy, absorption that wanders on its own.
//!
//! Three passes in series, all scaled by an "impossibility" amount:
//!
//! 1. Spectral rotation: eight octave-spaced all-passes (100 Hz - 12.8 kHz)
//!    whose centres are swept up to ±30% by one slow sine, each band a
//!    quarter-turn behind the last. Blended against the input.
//! 2. Paradox resonance: a narrow peaking boost at 500 Hz. Peaks above 0.95
//!    are folded back with a tanh knee.
//! 3. Non-local absorption: a low-pass whose cutoff drifts between 2 and
//!    10 kHz independent of the signal.
//!
//! | Control | Source | Range |
//! |---------|--------|-------|
//! | Impossibility | `warp` | 0.3 - 1 |
//! | Rotation rate / blend | `drift` | 0.067 - 0.2 Hz / 9 - 30% |
//! | Paradox boost | `bloom` | 0 - 5 dB |

use core::f32::consts::{PI, TAU};

use libm::{expf, logf, sinf, tanhf};
use monument_core::{AudioBlock, Biquad, BiquadCoefficients, BlockParams, ProcessingStage, lerp};

use crate::params::{BLOOM, DRIFT, WARP};

const BANDS: usize = 8;
const BAND_HZ: [f32; BANDS] = [100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0, 12800.0];
const BAND_Q: f32 = 0.707;
const SWEEP_DEPTH: f32 = 0.3;

const IMPOSSIBILITY: (f32, f32) = (0.3, 1.0);
const ROTATION: (f32, f32) = (0.3, 1.0);
const ROTATION_RATE_HZ: (f32, f32) = (0.01, 0.2);
const ROTATION_BLEND: f32 = 0.3;

const PARADOX_HZ: (f32, f32) = (50.0, 5000.0);
const PARADOX_POSITION: f32 = 0.5;
const PARADOX_MAX_DB: f32 = 5.0;
const PARADOX_Q: (f32, f32) = (5.0, 20.0);
const FOLD_KNEE: f32 = 0.95;

const ABSORB_CUTOFF_HZ: (f32, f32) = (2000.0, 10000.0);
const ABSORB_RATE_HZ: (f32, f32) = (0.02, 0.1);
const ABSORB_SHARE: f32 = 0.2;

const CONTROL_INTERVAL: usize = 64;

/// Log-mapped paradox centre for a normalized position.
fn paradox_hz(position: f32) -> f32 {
    let (lo, hi) = (logf(PARADOX_HZ.0), logf(PARADOX_HZ.1));
    expf(lerp(lo, hi, position.clamp(0.0, 1.0)))
}

/// Fold peaks above the knee back under it.
#[inline]
fn fold(x: f32) -> f32 {
    if x.abs() > FOLD_KNEE { FOLD_KNEE * tanhf(x / FOLD_KNEE) } else { x }
}

/// Alien amplification stage.
#[derive(Debug, Clone)]
pub struct AlienAmplification {
    sample_rate: f32,
    bands: [[Biquad; 2]; BANDS],
    paradox: [Biquad; 2],
    absorb: [Biquad; 2],
    rotation_phase: f32,
    absorb_phase: f32,
    rotation_blend: f32,
    absorb_share: f32,
    counter: usize,
}

impl AlienAmplification {
    /// Create with every filter at rest.
    pub fn new(sample_rate: f32) -> Self {
        let mut stage = Self {
            sample_rate,
            bands: core::array::from_fn(|_| [Biquad::default(), Biquad::default()]),
            paradox: [Biquad::default(), Biquad::default()],
            absorb: [Biquad::default(), Biquad::default()],
            rotation_phase: 0.0,
            absorb_phase: 0.0,
            rotation_blend: 0.0,
            absorb_share: 0.0,
            counter: 0,
        };
        stage.reset();
        stage
    }

    /// Centre of the paradox resonance in Hz.
    pub fn paradox_frequency(&self) -> f32 {
        paradox_hz(PARADOX_POSITION)
    }

    fn set_pair(pair: &mut [Biquad; 2], coeffs: BiquadCoefficients) {
        for f in pair {
            f.set_coefficients(coeffs);
        }
    }

    fn control(&mut self, warp: f32, drift: f32, bloom: f32) {
        let impossibility = lerp(IMPOSSIBILITY.0, IMPOSSIBILITY.1, warp.clamp(0.0, 1.0));
        let rotation = lerp(ROTATION.0, ROTATION.1, drift.clamp(0.0, 1.0));
        let step = CONTROL_INTERVAL as f32 / self.sample_rate;

        let rate = lerp(ROTATION_RATE_HZ.0, ROTATION_RATE_HZ.1, rotation);
        self.rotation_phase = (self.rotation_phase + TAU * rate * step) % TAU;
        for (i, pair) in self.bands.iter_mut().enumerate() {
            let offset = i as f32 * PI / 4.0;
            let sweep = 1.0 + sinf(self.rotation_phase + offset) * impossibility * SWEEP_DEPTH;
            Self::set_pair(pair, BiquadCoefficients::allpass(BAND_HZ[i] * sweep, BAND_Q, self.sample_rate));
        }
        self.rotation_blend = rotation * ROTATION_BLEND;

        let q = lerp(PARADOX_Q.0, PARADOX_Q.1, impossibility);
        let boost = PARADOX_MAX_DB * bloom.clamp(0.0, 1.0);
        let paradox = BiquadCoefficients::peaking(self.paradox_frequency(), q, boost, self.sample_rate);
        Self::set_pair(&mut self.paradox, paradox);

        let rate = lerp(ABSORB_RATE_HZ.0, ABSORB_RATE_HZ.1, impossibility);
        self.absorb_phase = (self.absorb_phase + TAU * rate * step) % TAU;
        let absorption = (0.5 + 0.5 * sinf(self.absorb_phase)) * impossibility;
        let cutoff = lerp(ABSORB_CUTOFF_HZ.0, ABSORB_CUTOFF_HZ.1, absorption);
        Self::set_pair(&mut self.absorb, BiquadCoefficients::lowpass(cutoff, BAND_Q, self.sample_rate));
        self.absorb_share = impossibility * ABSORB_SHARE;
    }

    #[inline]
    fn channel(&mut self, ch: usize, x: f32) -> f32 {
        let mut rotated = x;
        for pair in &mut self.bands {
            rotated = pair[ch].process(rotated);
        }
        let x = lerp(x, rotated, self.rotation_blend);
        let x = fold(self.paradox[ch].process(x));
        lerp(x, self.absorb[ch].process(x), self.absorb_share)
    }
}

impl ProcessingStage for AlienAmplification {
    fn prepare(&mut self, sample_rate: f32, _max_block: usize, _channels: usize) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let warp = params.get(WARP);
        let drift = params.get(DRIFT);
        let bloom = params.get(BLOOM);

        for (n, (l, r)) in block.left.iter_mut().zip(block.right.iter_mut()).enumerate() {
            if self.counter == 0 {
                self.control(warp.at(n), drift.at(n), bloom.at(n));
            }
            self.counter = (self.counter + 1) % CONTROL_INTERVAL;
            *l = self.channel(0, *l);
            *r = self.channel(1, *r);
        }
    }

    fn reset(&mut self) {
        for f in self.bands.iter_mut().flatten().chain(&mut self.paradox).chain(&mut self.absorb) {
            f.clear();
        }
        self.rotation_phase = 0.0;
        self.absorb_phase = 0.0;
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PARAMS;
    use monument_core::{ParamId, ParameterDistributor, ParameterTargets, rms};

    fn run(stage: &mut AlienAmplification, values: &[(ParamId, f32)], left: &mut [f32], right: &mut [f32]) {
        let targets = ParameterTargets::new(&PARAMS);
        for &(id, v) in values {
            targets.set_target(id, v);
        }
        let mut dist = ParameterDistributor::new(&PARAMS, 48000.0, left.len(), 4);
        dist.snap_to_targets(&targets);
        let params = dist.begin_block(&targets, left.len());
        stage.process(AudioBlock::new(left, right), &params);
    }

    fn tone(freq: f32, amp: f32, len: usize) -> Vec<f32> {
        (0..len).map(|i| libm::sinf(TAU * freq * i as f32 / 48000.0) * amp).collect()
    }

    #[test]
    fn paradox_sits_at_500_hz() {
        let stage = AlienAmplification::new(48000.0);
        assert!((stage.paradox_frequency() - 500.0).abs() < 0.5);
    }

    #[test]
    fn fold_only_touches_peaks() {
        assert_eq!(fold(0.5), 0.5);
        assert_eq!(fold(-0.95), -0.95);
        assert!(fold(3.0) < FOLD_KNEE);
        assert!(fold(-3.0) > -FOLD_KNEE);
    }

    #[test]
    fn bloom_boosts_the_paradox_band() {
        let level = |bloom: f32| {
            let mut stage = AlienAmplification::new(48000.0);
            let mut l = tone(500.0, 0.2, 48000);
            let mut r = l.clone();
            run(&mut stage, &[(BLOOM, bloom), (DRIFT, 0.0)], &mut l, &mut r);
            rms(&l[24000..])
        };
        assert!(level(1.0) > level(0.0) * 1.3);
    }

    #[test]
    fn loud_input_is_contained() {
        let mut stage = AlienAmplification::new(48000.0);
        let mut l = tone(500.0, 2.0, 24000);
        let mut r = l.clone();
        run(&mut stage, &[(BLOOM, 1.0), (WARP, 1.0)], &mut l, &mut r);
        // The fold keeps the boosted band under the knee before absorption.
        assert!(l.iter().chain(&r).all(|x| x.is_finite() && x.abs() <= 1.0));
    }

    #[test]
    fn reset_is_reproducible() {
        let mut stage = AlienAmplification::new(48000.0);
        let input = tone(1234.0, 0.3, 4096);
        let (mut a, mut b) = (input.clone(), input.clone());
        run(&mut stage, &[(WARP, 0.7), (DRIFT, 0.5)], &mut a, &mut b);
        stage.reset();
        let (mut c, mut d) = (input.clone(), input);
        run(&mut stage, &[(WARP, 0.7), (DRIFT, 0.5)], &mut c, &mut d);
        assert_eq!(a, c);
    }
}
