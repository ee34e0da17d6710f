//! A hall whose walls give under pressure.
//!
//! Eight room modes of a 10 x 5 x 15 m hall ring as band-passes added on top
//! of the signal. Loud passages build internal pressure; the walls bow out
//! and every mode sags in pitch, then springs back over the recovery time
//! once the level falls. A slow sine breathes the mode Q.
//!
//! | Control | Source | Range |
//! |---------|--------|-------|
//! | Elasticity | `drift` | 0.5 - 1 |
//! | Recovery | `time` | 0.1 - 5 s |
//! | Absorption drift | `warp` | depth 0.3 - 1, rate 0.067 - 0.2 Hz |

use core::f32::consts::TAU;

use libm::{sinf, sqrtf};
use monument_core::{AudioBlock, Biquad, BiquadCoefficients, BlockParams, ProcessingStage, lerp};

use crate::params::{DRIFT, TIME, WARP};

/// Number of simulated room modes.
pub const MODES: usize = 8;

const ROOM_M: [f32; 3] = [10.0, 5.0, 15.0];
const MODE_INDICES: [[u8; 3]; MODES] = [
    [1, 0, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 1, 0],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
    [2, 0, 0],
];
const SPEED_OF_SOUND: f32 = 343.0;

const ELASTICITY: (f32, f32) = (0.5, 1.0);
const RECOVERY_S: (f32, f32) = (0.1, 5.0);
const DRIFT_DEPTH: (f32, f32) = (0.3, 1.0);
const DRIFT_RATE_HZ: (f32, f32) = (0.01, 0.2);
const NONLINEARITY: f32 = 0.3;
const PRESSURE_ALPHA: f32 = 0.1;
const MAX_DEFORMATION: f32 = 0.2;
const PITCH_RANGE: (f32, f32) = (0.7, 1.3);
const BASE_Q: f32 = 5.0;
const Q_RANGE: (f32, f32) = (1.0, 15.0);
const CONTROL_INTERVAL: usize = 256;

/// Axial, tangential and oblique mode frequency for one index triple.
fn mode_frequency(indices: [u8; 3]) -> f32 {
    let sum: f32 = indices
        .iter()
        .zip(ROOM_M)
        .map(|(&n, length)| {
            let k = n as f32 / length;
            k * k
        })
        .sum();
    0.5 * SPEED_OF_SOUND * sqrtf(sum)
}

/// Elastic room-mode stage.
#[derive(Debug, Clone)]
pub struct ElasticHallway {
    sample_rate: f32,
    base_hz: [f32; MODES],
    mode_gain: [f32; MODES],
    filters: [[Biquad; 2]; MODES],
    pressure: f32,
    deformation: f32,
    drift_phase: f32,
    energy: f32,
    energy_samples: usize,
    counter: usize,
}

impl ElasticHallway {
    /// Create with the walls at rest.
    pub fn new(sample_rate: f32) -> Self {
        let base_hz = MODE_INDICES.map(mode_frequency);
        let mut stage = Self {
            sample_rate,
            base_hz,
            // Low modes dominate.
            mode_gain: base_hz.map(|f| 0.15 / (1.0 + f / 500.0)),
            filters: core::array::from_fn(|_| [Biquad::default(), Biquad::default()]),
            pressure: 0.0,
            deformation: 0.0,
            drift_phase: 0.0,
            energy: 0.0,
            energy_samples: 0,
            counter: 0,
        };
        stage.retune(1.0, BASE_Q);
        stage
    }

    /// Current wall displacement, `-0.2..=0.2`.
    pub fn deformation(&self) -> f32 {
        self.deformation
    }

    /// Resting frequency of mode `index`.
    pub fn base_frequency(&self, index: usize) -> Option<f32> {
        self.base_hz.get(index).copied()
    }

    fn retune(&mut self, pitch: f32, q: f32) {
        for (pair, base) in self.filters.iter_mut().zip(self.base_hz) {
            let coeffs = BiquadCoefficients::bandpass(base * pitch, q, self.sample_rate);
            for f in pair {
                f.set_coefficients(coeffs);
            }
        }
    }

    fn control(&mut self, time: f32, drift: f32, warp: f32) {
        let rms = if self.energy_samples > 0 {
            sqrtf(self.energy / self.energy_samples as f32)
        } else {
            0.0
        };
        self.energy = 0.0;
        self.energy_samples = 0;

        let compressed = rms / (1.0 + NONLINEARITY * rms);
        let level = lerp(rms, compressed, NONLINEARITY);
        self.pressure += (level - self.pressure) * PRESSURE_ALPHA;

        let elasticity = lerp(ELASTICITY.0, ELASTICITY.1, drift.clamp(0.0, 1.0));
        let recovery_s = lerp(RECOVERY_S.0, RECOVERY_S.1, time.clamp(0.0, 1.0));
        let target = (self.pressure * elasticity * 2.0).clamp(-MAX_DEFORMATION, MAX_DEFORMATION);
        let rate = (CONTROL_INTERVAL as f32 / (recovery_s * self.sample_rate)).min(1.0);
        self.deformation = (self.deformation + (target - self.deformation) * rate)
            .clamp(-MAX_DEFORMATION, MAX_DEFORMATION);

        let warp = warp.clamp(0.0, 1.0);
        let depth = lerp(DRIFT_DEPTH.0, DRIFT_DEPTH.1, warp);
        let rate_hz = lerp(DRIFT_RATE_HZ.0, DRIFT_RATE_HZ.1, depth);
        self.drift_phase = (self.drift_phase + TAU * rate_hz * CONTROL_INTERVAL as f32 / self.sample_rate) % TAU;

        let pitch = (1.0 - self.deformation * elasticity * 0.5).clamp(PITCH_RANGE.0, PITCH_RANGE.1);
        let q = (BASE_Q * (1.0 + 0.3 * sinf(self.drift_phase) * depth)).clamp(Q_RANGE.0, Q_RANGE.1);
        self.retune(pitch, q);
    }
}

impl ProcessingStage for ElasticHallway {
    fn prepare(&mut self, sample_rate: f32, _max_block: usize, _channels: usize) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let time = params.get(TIME);
        let drift = params.get(DRIFT);
        let warp = params.get(WARP);

        for (n, (l, r)) in block.left.iter_mut().zip(block.right.iter_mut()).enumerate() {
            if self.counter == 0 {
                self.control(time.at(n), drift.at(n), warp.at(n));
            }
            self.counter = (self.counter + 1) % CONTROL_INTERVAL;

            self.energy += 0.5 * (*l * *l + *r * *r);
            self.energy_samples += 1;

            let (in_l, in_r) = (*l, *r);
            for ([fl, fr], gain) in self.filters.iter_mut().zip(self.mode_gain) {
                *l += fl.process(in_l) * gain;
                *r += fr.process(in_r) * gain;
            }
        }
    }

    fn reset(&mut self) {
        for pair in &mut self.filters {
            for f in pair {
                f.clear();
            }
        }
        self.pressure = 0.0;
        self.deformation = 0.0;
        self.drift_phase = 0.0;
        self.energy = 0.0;
        self.energy_samples = 0;
        self.counter = 0;
        self.retune(1.0, BASE_Q);
    }
}
