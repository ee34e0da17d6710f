//! Early-reflection tap cluster.
//!
//! A fixed table of taps reads a 90 ms stereo buffer. `pillar_shape` warps
//! the tap positions between a tight cluster near the front (0) and an even
//! spread (0.5) to a late-weighted spread (1). `density` fades in extra taps
//! and sets the reflection level. Each tap passes a first-order allpass so
//! the cluster smears instead of ringing.

use libm::{powf, sqrtf};
use monument_core::{
    AudioBlock, BlockParams, DcBlocker, DelayLine, Interpolation, ProcessingStage, SmoothedParam,
    lerp, ms_to_samples,
};

use crate::params::{DENSITY, PILLAR_SHAPE};

/// Maximum tap count.
pub const MAX_TAPS: usize = 28;
const MIN_TAPS: f32 = 20.0;

const BUFFER_MS: f32 = 90.0;
const MIN_DELAY_MS: f32 = 4.0;
const MAX_DELAY_MS: f32 = 50.0;
const MIN_TAP_GAIN: f32 = 0.08;
const MAX_TAP_GAIN: f32 = 0.42;
const MAX_TAP_ENERGY: f32 = 1.6;
const OUTPUT_CEILING: f32 = 1.25;
const SHAPE_SMOOTHING_MS: f32 = 500.0;
const CONTROL_INTERVAL: usize = 32;

// Normalized tap positions. Sorted so the fade-in taps land late.
const TAP_POSITIONS: [f32; MAX_TAPS] = [
    0.013, 0.041, 0.067, 0.102, 0.129, 0.163, 0.197, 0.224, 0.259, 0.291, 0.318, 0.356, 0.389,
    0.421, 0.452, 0.487, 0.523, 0.559, 0.588, 0.627, 0.661, 0.694, 0.732, 0.771, 0.806, 0.849,
    0.897, 0.953,
];

// Normalized tap levels, mapped into [MIN_TAP_GAIN, MAX_TAP_GAIN].
const TAP_LEVELS: [f32; MAX_TAPS] = [
    0.92, 0.31, 0.77, 0.58, 0.14, 0.85, 0.43, 0.66, 0.22, 0.71, 0.49, 0.08, 0.63, 0.37, 0.81,
    0.27, 0.55, 0.12, 0.74, 0.46, 0.33, 0.61, 0.19, 0.52, 0.29, 0.41, 0.17, 0.36,
];

// Alternating polarity keeps the cluster from summing into a comb.
const TAP_SIGNS: [f32; MAX_TAPS] = [
    1.0, -1.0, 1.0, 1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0,
    -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0,
];

// Allpass smear per tap, all below 0.3.
const TAP_SMEAR: [f32; MAX_TAPS] = [
    0.05, 0.21, 0.12, 0.27, 0.08, 0.18, 0.24, 0.06, 0.15, 0.29, 0.10, 0.22, 0.13, 0.26, 0.07,
    0.19, 0.28, 0.11, 0.16, 0.23, 0.09, 0.25, 0.14, 0.20, 0.05, 0.17, 0.27, 0.12,
];

/// Map `pillar_shape` in [0, 1] onto a position exponent and apply it.
///
/// Below the midpoint positions are pushed toward zero (compressed), above
/// it toward one (expanded). 0.5 leaves them untouched.
#[inline]
pub fn shape_position(position: f32, shape: f32) -> f32 {
    let s = lerp(-1.0, 1.0, shape.clamp(0.0, 1.0));
    let exponent = if s < 0.0 { 1.0 - 2.0 * s } else { 1.0 / (1.0 + 1.5 * s) };
    powf(position.clamp(0.0, 1.0), exponent)
}

/// Fractional active tap count for a density value.
#[inline]
pub fn active_taps(density: f32) -> f32 {
    lerp(MIN_TAPS, MAX_TAPS as f32, density.clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Copy, Default)]
struct TapAllpass {
    x1: f32,
    y1: f32,
}

impl TapAllpass {
    #[inline]
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        let out = -coeff * input + self.x1 + coeff * self.y1;
        self.x1 = input;
        self.y1 = out;
        out
    }
}

#[derive(Debug, Clone)]
struct TapLayout {
    delays: [f32; MAX_TAPS],
    gains: [f32; MAX_TAPS],
}

impl TapLayout {
    fn update(&mut self, shape: f32, density: f32, sample_rate: f32) {
        for (delay, &pos) in self.delays.iter_mut().zip(&TAP_POSITIONS) {
            let ms = lerp(MIN_DELAY_MS, MAX_DELAY_MS, shape_position(pos, shape));
            *delay = ms_to_samples(ms, sample_rate);
        }

        let count = active_taps(density);
        let mut energy = 0.0;
        for (i, gain) in self.gains.iter_mut().enumerate() {
            let fade = (count - i as f32).clamp(0.0, 1.0);
            *gain = lerp(MIN_TAP_GAIN, MAX_TAP_GAIN, TAP_LEVELS[i]) * TAP_SIGNS[i] * fade;
            energy += *gain * *gain;
        }
        let rms = sqrtf(energy);
        if rms > MAX_TAP_ENERGY {
            let scale = MAX_TAP_ENERGY / rms;
            for gain in &mut self.gains {
                *gain *= scale;
            }
        }
    }
}

/// Early-reflection stage.
#[derive(Debug, Clone)]
pub struct Pillars {
    lines: [DelayLine; 2],
    smear: [[TapAllpass; MAX_TAPS]; 2],
    dc: [DcBlocker; 2],
    layout: TapLayout,
    shape: SmoothedParam,
    /// Jump to the next shape target instead of gliding (set by reset).
    snap_shape: bool,
    sample_rate: f32,
    counter: usize,
}

impl Pillars {
    /// Create with the default layout.
    pub fn new(sample_rate: f32) -> Self {
        let mut line = DelayLine::new(buffer_capacity(sample_rate));
        line.set_interpolation(Interpolation::Linear);
        let mut layout = TapLayout { delays: [0.0; MAX_TAPS], gains: [0.0; MAX_TAPS] };
        layout.update(0.5, 0.5, sample_rate);
        Self {
            lines: [line.clone(), line],
            smear: [[TapAllpass::default(); MAX_TAPS]; 2],
            dc: [DcBlocker::new(sample_rate), DcBlocker::new(sample_rate)],
            layout,
            shape: SmoothedParam::with_config(0.5, sample_rate, SHAPE_SMOOTHING_MS),
            snap_shape: true,
            sample_rate,
            counter: 0,
        }
    }

    /// Current tap delays in samples.
    pub fn tap_delays(&self) -> &[f32; MAX_TAPS] {
        &self.layout.delays
    }

    /// Current signed tap gains. Faded-out taps are zero.
    pub fn tap_gains(&self) -> &[f32; MAX_TAPS] {
        &self.layout.gains
    }
}

fn buffer_capacity(sample_rate: f32) -> usize {
    ms_to_samples(BUFFER_MS, sample_rate) as usize + 4
}

impl ProcessingStage for Pillars {
    fn prepare(&mut self, sample_rate: f32, _max_block: usize, _channels: usize) {
        self.sample_rate = sample_rate;
        let capacity = buffer_capacity(sample_rate);
        for line in &mut self.lines {
            line.resize(capacity);
        }
        for dc in &mut self.dc {
            dc.set_sample_rate(sample_rate);
        }
        self.shape.set_sample_rate(sample_rate);
        self.reset();
    }

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let shape = params.block_value(PILLAR_SHAPE);
        if self.snap_shape {
            self.shape.set_immediate(shape);
            self.snap_shape = false;
        } else {
            self.shape.set_target(shape);
        }
        let density = params.get(DENSITY);

        let [line_l, line_r] = &mut self.lines;
        let [smear_l, smear_r] = &mut self.smear;
        let [dc_l, dc_r] = &mut self.dc;

        for (n, (l, r)) in block.left.iter_mut().zip(block.right.iter_mut()).enumerate() {
            self.shape.advance();
            if self.counter == 0 {
                self.layout.update(self.shape.get(), density.at(n), self.sample_rate);
            }
            self.counter = (self.counter + 1) % CONTROL_INTERVAL;

            line_l.write(*l);
            line_r.write(*r);

            let mut early_l = 0.0;
            let mut early_r = 0.0;
            for i in 0..MAX_TAPS {
                let gain = self.layout.gains[i];
                if gain == 0.0 {
                    continue;
                }
                // Right channel reads slightly later for decorrelation.
                let tl = smear_l[i].process(line_l.read(self.layout.delays[i]), TAP_SMEAR[i]);
                let tr = smear_r[i].process(line_r.read(self.layout.delays[i] * 1.07), TAP_SMEAR[i]);
                early_l += tl * gain;
                early_r += tr * gain;
            }

            let level = lerp(0.25, 0.85, density.at(n));
            let out_l = *l + dc_l.process(early_l) * level;
            let out_r = *r + dc_r.process(early_r) * level;
            *l = out_l.clamp(-OUTPUT_CEILING, OUTPUT_CEILING);
            *r = out_r.clamp(-OUTPUT_CEILING, OUTPUT_CEILING);
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.smear = [[TapAllpass::default(); MAX_TAPS]; 2];
        for dc in &mut self.dc {
            dc.reset();
        }
        self.snap_shape = true;
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PARAMS;
    use monument_core::{ParamId, ParameterDistributor, ParameterTargets};

    fn run_with(stage: &mut Pillars, settings: &[(ParamId, f32)], left: &mut [f32], right: &mut [f32]) {
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
    fn neutral_shape_keeps_positions() {
        for &p in &TAP_POSITIONS {
            assert!((shape_position(p, 0.5) - p).abs() < 1e-6);
        }
    }

    #[test]
    fn shape_compresses_and_expands() {
        let p = 0.5;
        assert!(shape_position(p, 0.0) < p);
        assert!(shape_position(p, 1.0) > p);
        assert!(shape_position(1.0, 0.0) <= 1.0);
    }

    #[test]
    fn density_fades_in_taps() {
        assert_eq!(active_taps(0.0), 20.0);
        assert_eq!(active_taps(1.0), MAX_TAPS as f32);
        let mut sparse = TapLayout { delays: [0.0; MAX_TAPS], gains: [0.0; MAX_TAPS] };
        sparse.update(0.5, 0.0, 48000.0);
        assert!(sparse.gains[20..].iter().all(|g| *g == 0.0));
        let mut dense = sparse.clone();
        dense.update(0.5, 1.0, 48000.0);
        assert!(dense.gains.iter().all(|g| *g != 0.0));
    }

    #[test]
    fn tap_energy_is_capped() {
        let mut layout = TapLayout { delays: [0.0; MAX_TAPS], gains: [0.0; MAX_TAPS] };
        layout.update(0.5, 1.0, 48000.0);
        let energy: f32 = layout.gains.iter().map(|g| g * g).sum();
        assert!(sqrtf(energy) <= MAX_TAP_ENERGY + 1e-4);
    }

    #[test]
    fn taps_fit_the_buffer() {
        for sr in [44100.0, 48000.0, 96000.0, 192000.0] {
            let mut layout = TapLayout { delays: [0.0; MAX_TAPS], gains: [0.0; MAX_TAPS] };
            for shape in [0.0, 0.5, 1.0] {
                layout.update(shape, 1.0, sr);
                let cap = buffer_capacity(sr) as f32;
                assert!(layout.delays.iter().all(|d| d * 1.07 < cap - 2.0));
            }
        }
    }

    #[test]
    fn impulse_produces_reflections_within_window() {
        let mut stage = Pillars::new(48000.0);
        let mut l = vec![0.0; 4800];
        let mut r = vec![0.0; 4800];
        l[0] = 1.0;
        r[0] = 1.0;
        run_with(&mut stage, &[], &mut l, &mut r);

        let first = ms_to_samples(MIN_DELAY_MS, 48000.0) as usize;
        assert!(l[1..first - 1].iter().all(|v| v.abs() < 0.05), "nothing before the first tap");
        let late: f32 = l[first..].iter().map(|v| v * v).sum();
        assert!(late > 0.01, "reflections expected, energy {late}");
        assert!(l.iter().chain(&r).all(|v| v.abs() <= OUTPUT_CEILING));
    }

    #[test]
    fn reset_clears_buffer() {
        let mut stage = Pillars::new(48000.0);
        let mut l = vec![0.5; 512];
        let mut r = vec![0.5; 512];
        run_with(&mut stage, &[(DENSITY, 1.0)], &mut l, &mut r);
        stage.reset();
        let mut l = vec![0.0; 512];
        let mut r = vec![0.0; 512];
        run_with(&mut stage, &[], &mut l, &mut r);
        assert!(l.iter().chain(&r).all(|v| *v == 0.0));
    }

    #[test]
    fn shape_snaps_after_reset() {
        let mut stage = Pillars::new(48000.0);
        let mut l = vec![0.0; 256];
        let mut r = vec![0.0; 256];
        run_with(&mut stage, &[(PILLAR_SHAPE, 0.9)], &mut l, &mut r);
        run_with(&mut stage, &[(PILLAR_SHAPE, 0.1)], &mut l, &mut r);
        assert!(stage.shape.get() > 0.1, "glides while running");

        stage.reset();
        run_with(&mut stage, &[(PILLAR_SHAPE, 0.3)], &mut l, &mut r);
        assert!((stage.shape.get() - 0.3).abs() < 1e-6);
    }
}
