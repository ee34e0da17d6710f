//! Metallic tube network colouring the signal with pipe resonances.
//!
//! Between 5 and 16 tubes, each with a length and bore derived from a shared
//! base geometry. Every tube rings a band-pass at its fundamental
//! `c / 2L`. A fixed population of 64 rays wanders between neighbouring
//! tubes, losing energy to each tube's wall absorption; the share of ray
//! energy sitting in a tube sets how loud its resonance is.
//!
//! | Control | Source | Range |
//! |---------|--------|-------|
//! | Tube count | `density` | 5 - 16 |
//! | Resonance Q | `mass` | 1 - 10 |
//! | Ray coupling | `warp` | 0.3 - 0.9 |
//!
//! Rays move once per control interval, so the network evolves at the same
//! rate whatever the host block size.

use core::f32::consts::PI;

use libm::{cosf, expf, floorf, sinf};
use monument_core::{AudioBlock, Biquad, BiquadCoefficients, BlockParams, ProcessingStage, lerp};

use crate::params::{DENSITY, MASS, WARP};

/// Most tubes the network holds.
pub const MAX_TUBES: usize = 16;
/// Fewest tubes the network holds.
pub const MIN_TUBES: usize = 5;
const RAYS: usize = 64;

const SPEED_OF_SOUND: f32 = 343.0;
const BASE_LENGTH_M: f32 = 2.0;
const LENGTH_RANGE_M: (f32, f32) = (0.5, 10.0);
const BASE_BORE_MM: f32 = 25.0;
const BORE_RANGE_MM: (f32, f32) = (5.0, 50.0);
const RADIUS_VARIATION: f32 = 0.3;
const Q_RANGE: (f32, f32) = (1.0, 10.0);
const COUPLING: (f32, f32) = (0.3, 0.9);
const MAX_JUMP_CHANCE: f32 = 0.3;
const RELAUNCH_BELOW: f32 = 1e-3;
const TUBE_SHARE: f32 = 0.5;
const CONTROL_INTERVAL: usize = 256;
const DEFAULT_DENSITY: f32 = 0.545;
const DEFAULT_MASS: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
struct Geometry {
    length_m: f32,
    absorption_per_m: f32,
    fundamental_hz: f32,
}

/// Tube count for a normalized `density`.
pub fn tube_count(density: f32) -> usize {
    let span = (MAX_TUBES - MIN_TUBES) as f32;
    (MIN_TUBES + (density.clamp(0.0, 1.0) * span) as usize).min(MAX_TUBES)
}

fn geometry(index: usize, count: usize) -> Geometry {
    let angle = index as f32 * PI / count as f32;
    let length_m = (BASE_LENGTH_M * (1.0 + RADIUS_VARIATION * sinf(angle)))
        .clamp(LENGTH_RANGE_M.0, LENGTH_RANGE_M.1);
    let bore_mm = (BASE_BORE_MM * (1.0 + RADIUS_VARIATION * cosf(angle)))
        .clamp(BORE_RANGE_MM.0, BORE_RANGE_MM.1);
    Geometry {
        length_m,
        // Narrow bores lose more to the walls.
        absorption_per_m: 0.05 + (BORE_RANGE_MM.1 - bore_mm) / BORE_RANGE_MM.1 * 0.15,
        fundamental_hz: SPEED_OF_SOUND / (2.0 * length_m),
    }
}

/// Deterministic hash of a ray and the tube it sits in, in `[0, 1)`.
fn jump_dice(ray: usize, tube: usize) -> f32 {
    let x = sinf(ray as f32 * 12.9898 + tube as f32 * 78.233);
    x - floorf(x)
}

/// Tube resonator stage.
#[derive(Debug, Clone)]
pub struct TubeRayTracer {
    sample_rate: f32,
    count: usize,
    q: f32,
    tubes: [Geometry; MAX_TUBES],
    filters: [[Biquad; 2]; MAX_TUBES],
    weights: [f32; MAX_TUBES],
    weight_steps: [f32; MAX_TUBES],
    ray_energy: [f32; RAYS],
    ray_tube: [u8; RAYS],
    counter: usize,
}

impl TubeRayTracer {
    /// Create with the default ten-tube network.
    pub fn new(sample_rate: f32) -> Self {
        let mut stage = Self {
            sample_rate,
            count: MIN_TUBES,
            q: 0.0,
            tubes: [Geometry::default(); MAX_TUBES],
            filters: core::array::from_fn(|_| [Biquad::default(), Biquad::default()]),
            weights: [0.0; MAX_TUBES],
            weight_steps: [0.0; MAX_TUBES],
            ray_energy: [0.0; RAYS],
            ray_tube: [0; RAYS],
            counter: 0,
        };
        stage.reset();
        stage
    }

    /// Active tube count.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Fundamental of tube `index` in Hz, if active.
    pub fn fundamental_hz(&self, index: usize) -> Option<f32> {
        (index < self.count).then(|| self.tubes[index].fundamental_hz)
    }

    /// Current loudness share of each active tube. Sums to one once rays
    /// have been traced.
    pub fn energy_shares(&self) -> &[f32] {
        &self.weights[..self.count]
    }

    fn reconfigure(&mut self, count: usize) {
        let previous = self.count;
        self.count = count.clamp(MIN_TUBES, MAX_TUBES);
        for i in 0..self.count {
            self.tubes[i] = geometry(i, self.count);
        }
        for i in previous.min(self.count)..self.count.max(previous) {
            self.weights[i] = 0.0;
            for f in &mut self.filters[i] {
                f.clear();
            }
        }
        for tube in &mut self.ray_tube {
            *tube = (*tube as usize % self.count) as u8;
        }
        self.update_filters();
    }

    fn update_filters(&mut self) {
        for i in 0..self.count {
            let coeffs = BiquadCoefficients::bandpass(self.tubes[i].fundamental_hz, self.q, self.sample_rate);
            for f in &mut self.filters[i] {
                f.set_coefficients(coeffs);
            }
        }
    }

    fn control(&mut self, density: f32, mass: f32, warp: f32) {
        let count = tube_count(density);
        if count != self.count {
            self.reconfigure(count);
        }
        let q = lerp(Q_RANGE.0, Q_RANGE.1, mass.clamp(0.0, 1.0));
        if (q - self.q).abs() > 0.01 {
            self.q = q;
            self.update_filters();
        }
        self.trace(lerp(COUPLING.0, COUPLING.1, warp.clamp(0.0, 1.0)));
    }

    /// Move every ray once and retarget the tube weights.
    fn trace(&mut self, coupling: f32) {
        let count = self.count;
        let mut shares = [0.0f32; MAX_TUBES];
        let jump_chance = coupling * MAX_JUMP_CHANCE;

        for ray in 0..RAYS {
            let tube = self.ray_tube[ray] as usize % count;
            let geometry = self.tubes[tube];
            let energy = self.ray_energy[ray] * expf(-geometry.absorption_per_m * geometry.length_m);
            shares[tube] += energy;
            self.ray_energy[ray] = energy;

            let dice = jump_dice(ray, tube);
            if dice < jump_chance {
                let next = if dice < 0.5 * jump_chance { tube + count - 1 } else { tube + 1 };
                self.ray_tube[ray] = (next % count) as u8;
            }
        }

        let total: f32 = shares[..count].iter().sum();
        if total < RELAUNCH_BELOW {
            // Spent rays are relaunched where they are.
            self.ray_energy = [1.0 / RAYS as f32; RAYS];
        }
        let norm = if total > 0.0 { 1.0 / total } else { 0.0 };
        for i in 0..MAX_TUBES {
            let target = if i < count { shares[i] * norm } else { 0.0 };
            self.weight_steps[i] = (target - self.weights[i]) / CONTROL_INTERVAL as f32;
        }
    }
}

impl ProcessingStage for TubeRayTracer {
    fn prepare(&mut self, sample_rate: f32, _max_block: usize, _channels: usize) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let density = params.get(DENSITY);
        let mass = params.get(MASS);
        let warp = params.get(WARP);

        for (n, (l, r)) in block.left.iter_mut().zip(block.right.iter_mut()).enumerate() {
            if self.counter == 0 {
                self.control(density.at(n), mass.at(n), warp.at(n));
            }
            self.counter = (self.counter + 1) % CONTROL_INTERVAL;

            let mut tube_l = 0.0;
            let mut tube_r = 0.0;
            for i in 0..self.count {
                self.weights[i] += self.weight_steps[i];
                let [fl, fr] = &mut self.filters[i];
                tube_l += fl.process(*l) * self.weights[i];
                tube_r += fr.process(*r) * self.weights[i];
            }
            *l = (1.0 - TUBE_SHARE) * *l + TUBE_SHARE * tube_l;
            *r = (1.0 - TUBE_SHARE) * *r + TUBE_SHARE * tube_r;
        }
    }

    fn reset(&mut self) {
        self.q = lerp(Q_RANGE.0, Q_RANGE.1, DEFAULT_MASS);
        self.reconfigure(tube_count(DEFAULT_DENSITY));
        for pair in &mut self.filters {
            for f in pair {
                f.clear();
            }
        }
        for (ray, tube) in self.ray_tube.iter_mut().enumerate() {
            *tube = (ray % self.count) as u8;
        }
        self.ray_energy = [1.0 / RAYS as f32; RAYS];
        self.weights = [0.0; MAX_TUBES];
        self.weight_steps = [0.0; MAX_TUBES];
        self.counter = 0;
    }
}
