//! Slow modulated delay that ages the tail.
//!
//! Two LFOs a quarter cycle apart sweep a 15 ms delay per channel. `drift`
//! sets the sweep depth and the wet share, `warp` the rate.

use monument_core::{
    AudioBlock, BlockParams, DelayLine, Interpolation, Lfo, ProcessingStage, lerp, ms_to_samples,
    wet_dry_mix,
};

use crate::params::{DRIFT, WARP};

const BUFFER_MS: f32 = 50.0;
const BASE_DELAY_MS: f32 = 15.0;
const DEPTH_MS: f32 = 5.0;
const DEPTH_SCALE: (f32, f32) = (0.25, 1.2);
const RATE_HZ: (f32, f32) = (0.02, 0.2);
const MIX: (f32, f32) = (0.1, 0.4);
const CONTROL_INTERVAL: usize = 32;

/// Modulated delay stage.
#[derive(Debug, Clone)]
pub struct Weathering {
    lines: [DelayLine; 2],
    lfos: [Lfo; 2],
    base_delay: f32,
    max_depth: f32,
    counter: usize,
}

impl Weathering {
    /// Create at the slowest rate.
    pub fn new(sample_rate: f32) -> Self {
        let mut line = DelayLine::new(ms_to_samples(BUFFER_MS, sample_rate) as usize);
        line.set_interpolation(Interpolation::Linear);
        let left = Lfo::new(sample_rate, RATE_HZ.0);
        let mut right = Lfo::new(sample_rate, RATE_HZ.0);
        right.set_phase(0.25);
        Self {
            lines: [line.clone(), line],
            lfos: [left, right],
            base_delay: ms_to_samples(BASE_DELAY_MS, sample_rate),
            max_depth: ms_to_samples(DEPTH_MS, sample_rate),
            counter: 0,
        }
    }

    /// Sweep depth in samples for a `drift` value.
    pub fn depth_samples(&self, drift: f32) -> f32 {
        self.max_depth * lerp(DEPTH_SCALE.0, DEPTH_SCALE.1, drift.clamp(0.0, 1.0))
    }
}

impl ProcessingStage for Weathering {
    fn prepare(&mut self, sample_rate: f32, _max_block: usize, _channels: usize) {
        for line in &mut self.lines {
            line.resize(ms_to_samples(BUFFER_MS, sample_rate) as usize);
        }
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(sample_rate);
        }
        self.base_delay = ms_to_samples(BASE_DELAY_MS, sample_rate);
        self.max_depth = ms_to_samples(DEPTH_MS, sample_rate);
        self.reset();
    }

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let drift = params.get(DRIFT);
        let warp = params.get(WARP);

        for (n, (l, r)) in block.left.iter_mut().zip(block.right.iter_mut()).enumerate() {
            if self.counter == 0 {
                let rate = lerp(RATE_HZ.0, RATE_HZ.1, warp.at(n));
                for lfo in &mut self.lfos {
                    lfo.set_frequency(rate);
                }
            }
            self.counter = (self.counter + 1) % CONTROL_INTERVAL;

            let d = drift.at(n);
            let depth = self.depth_samples(d);
            let mix = lerp(MIX.0, MIX.1, d);
            let [line_l, line_r] = &mut self.lines;
            let [lfo_l, lfo_r] = &mut self.lfos;

            let wet_l = line_l.read(self.base_delay + lfo_l.advance() * depth);
            let wet_r = line_r.read(self.base_delay + lfo_r.advance() * depth);
            line_l.write(*l);
            line_r.write(*r);

            *l = wet_dry_mix(*l, wet_l, mix);
            *r = wet_dry_mix(*r, wet_r, mix);
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        let [left, right] = &mut self.lfos;
        left.reset();
        right.reset();
        right.set_phase(0.25);
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PARAMS;
    use monument_core::{ParameterDistributor, ParameterTargets, rms};

    fn run(stage: &mut Weathering, drift: f32, left: &mut [f32], right: &mut [f32]) {
        let targets = ParameterTargets::new(&PARAMS);
        targets.set_target(DRIFT, drift);
        let mut dist = ParameterDistributor::new(&PARAMS, 48000.0, left.len(), 4);
        dist.snap_to_targets(&targets);
        let params = dist.begin_block(&targets, left.len());
        stage.process(AudioBlock::new(left, right), &params);
    }

    #[test]
    fn sweep_fits_buffer() {
        let stage = Weathering::new(48000.0);
        let reach = stage.base_delay + stage.depth_samples(1.0);
        assert!(reach < ms_to_samples(BUFFER_MS, 48000.0) - 2.0);
        assert!(stage.base_delay - stage.depth_samples(1.0) > 0.0);
    }

    #[test]
    fn dry_passes_before_delay_fills() {
        let mut stage = Weathering::new(48000.0);
        let mut l = vec![0.5; 64];
        let mut r = vec![0.5; 64];
        run(&mut stage, 0.0, &mut l, &mut r);
        // Nothing has reached the tap yet, so output is the dry share.
        let expected = 0.5 * (1.0 - MIX.0);
        assert!((l[10] - expected).abs() < 1e-5, "{}", l[10]);
    }

    #[test]
    fn output_stays_bounded() {
        let mut stage = Weathering::new(48000.0);
        let mut l: Vec<f32> = (0..9600).map(|i| libm::sinf(i as f32 * 0.05)).collect();
        let mut r = l.clone();
        let in_rms = rms(&l);
        run(&mut stage, 1.0, &mut l, &mut r);
        assert!(rms(&l) <= in_rms * 1.05);
        assert!(l.iter().chain(&r).all(|v| v.is_finite() && v.abs() <= 1.0 + 1e-4));
    }
}
