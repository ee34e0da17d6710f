//! Modulation sources.
//!
//! All sources update once per block. Continuous sources (attractor, LFOs)
//! advance by the block's duration; audio-derived ones measure the block.
//!
//! | Source | Channels | Range |
//! |--------|----------|-------|
//! | Chaos attractor | x, y, z | bipolar |
//! | Audio follower | 1 | unipolar |
//! | Brownian motion | 1 | bipolar |
//! | Envelope tracker | 1 | unipolar |
//! | LFO 1–4 | 1 | bipolar |

use libm::{expf, sqrtf};
use monument_core::{Lfo, TempoContext};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::connection::LfoSettings;

/// Number of LFOs.
pub const LFO_COUNT: usize = 4;

/// Identifies a modulation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Lorenz attractor.
    ChaosAttractor,
    /// RMS follower on the input.
    AudioFollower,
    /// Inertial bounded random walk.
    BrownianMotion,
    /// Attack/sustain/release-aware level tracker.
    EnvelopeTracker,
    /// LFO 1.
    Lfo1,
    /// LFO 2.
    Lfo2,
    /// LFO 3.
    Lfo3,
    /// LFO 4.
    Lfo4,
}

impl SourceId {
    /// Every source.
    pub const ALL: [SourceId; 8] = [
        SourceId::ChaosAttractor,
        SourceId::AudioFollower,
        SourceId::BrownianMotion,
        SourceId::EnvelopeTracker,
        SourceId::Lfo1,
        SourceId::Lfo2,
        SourceId::Lfo3,
        SourceId::Lfo4,
    ];

    /// Number of output channels.
    pub const fn channels(self) -> u8 {
        match self {
            SourceId::ChaosAttractor => 3,
            _ => 1,
        }
    }

    /// `true` if the source spans [-1, 1], `false` for [0, 1].
    pub const fn is_bipolar(self) -> bool {
        !matches!(self, SourceId::AudioFollower | SourceId::EnvelopeTracker)
    }

    /// LFO index, if this is an LFO.
    pub const fn lfo_index(self) -> Option<usize> {
        match self {
            SourceId::Lfo1 => Some(0),
            SourceId::Lfo2 => Some(1),
            SourceId::Lfo3 => Some(2),
            SourceId::Lfo4 => Some(3),
            _ => None,
        }
    }
}

/// Lorenz system, integrated with small Euler steps.
#[derive(Debug, Clone)]
pub struct ChaosAttractor {
    x: f32,
    y: f32,
    z: f32,
    out: [f32; 3],
}

impl ChaosAttractor {
    const SIGMA: f32 = 10.0;
    const RHO: f32 = 28.0;
    const BETA: f32 = 8.0 / 3.0;
    const DT: f32 = 0.001;
    const STEPS_PER_BLOCK: usize = 10;

    /// Start just off the origin.
    pub fn new() -> Self {
        Self { x: 0.1, y: 0.0, z: 0.0, out: [0.0; 3] }
    }

    /// Advance one block.
    pub fn update(&mut self) {
        for _ in 0..Self::STEPS_PER_BLOCK {
            let dx = Self::SIGMA * (self.y - self.x);
            let dy = self.x * (Self::RHO - self.z) - self.y;
            let dz = self.x * self.y - Self::BETA * self.z;
            self.x += dx * Self::DT;
            self.y += dy * Self::DT;
            self.z += dz * Self::DT;
        }
        // x, y live in about ±20; z in about 0..50.
        self.out = [
            (self.x / 20.0).clamp(-1.0, 1.0),
            (self.y / 20.0).clamp(-1.0, 1.0),
            ((self.z - 25.0) / 25.0).clamp(-1.0, 1.0),
        ];
    }

    /// Output of one axis (0 = x, 1 = y, 2 = z). Unknown axes read 0.
    pub fn value(&self, channel: u8) -> f32 {
        self.out.get(channel as usize).copied().unwrap_or(0.0)
    }

    /// Back to the initial condition.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ChaosAttractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Block-rate smoothing coefficient for a time constant.
#[inline]
pub(crate) fn block_coeff(block_len: usize, sample_rate: f32, time_s: f32) -> f32 {
    expf(-(block_len as f32) / (sample_rate * time_s))
}

/// Soft knee above 1: `1 - exp(-(x - 1)·k)`, clamped to [0, 1].
#[inline]
fn compress(x: f32, k: f32) -> f32 {
    let y = if x > 1.0 { 1.0 - expf(-(x - 1.0) * k) } else { x };
    y.clamp(0.0, 1.0)
}

/// Block RMS with 10 ms attack and 150 ms release, boosted and soft-limited.
#[derive(Debug, Clone, Default)]
pub struct AudioFollower {
    envelope: f32,
    value: f32,
}

impl AudioFollower {
    const ATTACK_S: f32 = 0.01;
    const RELEASE_S: f32 = 0.15;
    const GAIN: f32 = 2.0;

    /// Measure one stereo block.
    pub fn update(&mut self, left: &[f32], right: &[f32], sample_rate: f32) {
        let n = left.len() + right.len();
        if n == 0 {
            return;
        }
        let sum: f32 = left.iter().chain(right).map(|x| x * x).sum();
        if !sum.is_finite() {
            return;
        }
        let rms = sqrtf(sum / n as f32);
        let time = if rms > self.envelope { Self::ATTACK_S } else { Self::RELEASE_S };
        let coeff = block_coeff(left.len(), sample_rate, time);
        self.envelope = rms + coeff * (self.envelope - rms);
        self.value = compress(self.envelope * Self::GAIN, 1.0);
    }

    /// Current level in [0, 1].
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Clear.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Inertial random walk with elastic walls at ±1.
#[derive(Debug, Clone, Default)]
pub struct BrownianMotion {
    value: f32,
    velocity: f32,
}

impl BrownianMotion {
    const STEP: f32 = 0.03;
    const INERTIA: f32 = 0.65;

    /// Take one step.
    pub fn update<R: Rng>(&mut self, rng: &mut R) {
        let step: f32 = rng.random_range(-1.0..=1.0);
        self.velocity = self.velocity * Self::INERTIA + step * (1.0 - Self::INERTIA);
        self.value += self.velocity * Self::STEP;
        if self.value > 1.0 {
            self.value = 1.0 - (self.value - 1.0) * 0.5;
            self.velocity *= -0.5;
        } else if self.value < -1.0 {
            self.value = -1.0 + (-1.0 - self.value) * 0.5;
            self.velocity *= -0.5;
        }
        self.value = self.value.clamp(-1.0, 1.0);
    }

    /// Current position in [-1, 1].
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Back to the centre.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Where the tracked envelope is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopePhase {
    /// Level rising.
    Attack,
    /// Level holding.
    Sustain,
    /// Level falling or silent.
    #[default]
    Release,
}

/// Peak/RMS blend with phase-dependent response times.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeTracker {
    envelope: f32,
    value: f32,
    phase: EnvelopePhase,
}

impl EnvelopeTracker {
    const ATTACK_S: f32 = 0.005;
    const SUSTAIN_S: f32 = 0.02;
    const RELEASE_S: f32 = 0.3;
    const THRESHOLD: f32 = 0.01;
    const GAIN: f32 = 2.5;

    /// Measure one stereo block.
    pub fn update(&mut self, left: &[f32], right: &[f32], sample_rate: f32) {
        let n = left.len() + right.len();
        if n == 0 {
            return;
        }
        let mut peak = 0.0f32;
        let mut sum = 0.0;
        for x in left.iter().chain(right) {
            peak = peak.max(x.abs());
            sum += x * x;
        }
        if !sum.is_finite() {
            return;
        }
        let level = peak * 0.6 + sqrtf(sum / n as f32) * 0.4;

        let (phase, time) = if level > self.envelope + Self::THRESHOLD {
            (EnvelopePhase::Attack, Self::ATTACK_S)
        } else if level > Self::THRESHOLD && (level - self.envelope).abs() < Self::THRESHOLD {
            (EnvelopePhase::Sustain, Self::SUSTAIN_S)
        } else {
            (EnvelopePhase::Release, Self::RELEASE_S)
        };
        self.phase = phase;
        let coeff = block_coeff(left.len(), sample_rate, time);
        self.envelope = level + coeff * (self.envelope - level);
        self.value = compress(self.envelope * Self::GAIN, 0.5);
    }

    /// Current level in [0, 1].
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Phase detected on the last block.
    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Clear.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The fixed source bank.
#[derive(Debug, Clone)]
pub struct SourceBank {
    chaos: ChaosAttractor,
    follower: AudioFollower,
    brownian: BrownianMotion,
    tracker: EnvelopeTracker,
    lfos: [Lfo; LFO_COUNT],
    lfo_values: [f32; LFO_COUNT],
    sample_rate: f32,
}

impl SourceBank {
    /// Create at `sample_rate` with default LFO settings.
    pub fn new(sample_rate: f32) -> Self {
        let mut bank = Self {
            chaos: ChaosAttractor::new(),
            follower: AudioFollower::default(),
            brownian: BrownianMotion::default(),
            tracker: EnvelopeTracker::default(),
            lfos: core::array::from_fn(|_| Lfo::new(sample_rate, 1.0)),
            lfo_values: [0.0; LFO_COUNT],
            sample_rate,
        };
        for (i, lfo) in bank.lfos.iter_mut().enumerate() {
            lfo.set_seed(0x5eed_0000 + i as u32);
        }
        bank
    }

    /// Change sample rate, keeping state.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for lfo in &mut self.lfos {
            lfo.set_sample_rate(sample_rate);
        }
    }

    /// Advance every source by one block of `left`/`right`.
    pub fn update<R: Rng>(
        &mut self,
        left: &[f32],
        right: &[f32],
        lfo_settings: &[LfoSettings; LFO_COUNT],
        tempo: &TempoContext,
        rng: &mut R,
    ) {
        self.chaos.update();
        self.follower.update(left, right, self.sample_rate);
        self.brownian.update(rng);
        self.tracker.update(left, right, self.sample_rate);
        for ((lfo, value), settings) in self.lfos.iter_mut().zip(&mut self.lfo_values).zip(lfo_settings) {
            lfo.set_waveform(settings.shape);
            lfo.set_frequency(settings.rate.to_hz(tempo));
            *value = lfo.advance_by(left.len());
        }
    }

    /// Output of `source` on `channel`.
    pub fn value(&self, source: SourceId, channel: u8) -> f32 {
        match source {
            SourceId::ChaosAttractor => self.chaos.value(channel),
            SourceId::AudioFollower => self.follower.value(),
            SourceId::BrownianMotion => self.brownian.value(),
            SourceId::EnvelopeTracker => self.tracker.value(),
            SourceId::Lfo1 | SourceId::Lfo2 | SourceId::Lfo3 | SourceId::Lfo4 => source
                .lfo_index()
                .map(|i| self.lfo_values[i])
                .unwrap_or(0.0),
        }
    }

    /// Return every source to its initial state.
    pub fn reset(&mut self) {
        self.chaos.reset();
        self.follower.reset();
        self.brownian.reset();
        self.tracker.reset();
        for lfo in &mut self.lfos {
            lfo.reset();
        }
        self.lfo_values = [0.0; LFO_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn attractor_stays_bounded_and_moves() {
        let mut chaos = ChaosAttractor::new();
        let mut seen_x = Vec::new();
        for _ in 0..20_000 {
            chaos.update();
            for ch in 0..3 {
                assert!((-1.0..=1.0).contains(&chaos.value(ch)));
            }
            seen_x.push(chaos.value(0));
        }
        assert!(seen_x.iter().any(|x| *x > 0.2) && seen_x.iter().any(|x| *x < -0.2));
        assert_eq!(chaos.value(7), 0.0);
    }

    #[test]
    fn follower_tracks_level() {
        let mut f = AudioFollower::default();
        let loud = vec![0.4; 512];
        for _ in 0..50 {
            f.update(&loud, &loud, 48000.0);
        }
        assert!((f.value() - 0.8).abs() < 0.05, "{}", f.value());
        let silence = vec![0.0; 512];
        for _ in 0..200 {
            f.update(&silence, &silence, 48000.0);
        }
        assert!(f.value() < 0.01);
    }

    #[test]
    fn follower_soft_limits() {
        let mut f = AudioFollower::default();
        let hot = vec![4.0; 512];
        for _ in 0..50 {
            f.update(&hot, &hot, 48000.0);
        }
        assert!(f.value() <= 1.0);
        assert!(f.value() > 0.9);
    }

    #[test]
    fn brownian_is_bounded_and_seeded() {
        let walk = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut b = BrownianMotion::default();
            (0..10_000)
                .map(|_| {
                    b.update(&mut rng);
                    b.value()
                })
                .collect::<Vec<_>>()
        };
        let a = walk(7);
        assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(a, walk(7));
        assert_ne!(a, walk(8));
    }

    #[test]
    fn tracker_phases() {
        let mut t = EnvelopeTracker::default();
        let loud = vec![0.5; 512];
        t.update(&loud, &loud, 48000.0);
        assert_eq!(t.phase(), EnvelopePhase::Attack);
        for _ in 0..100 {
            t.update(&loud, &loud, 48000.0);
        }
        assert_eq!(t.phase(), EnvelopePhase::Sustain);
        let silence = vec![0.0; 512];
        t.update(&silence, &silence, 48000.0);
        assert_eq!(t.phase(), EnvelopePhase::Release);
        assert!((0.0..=1.0).contains(&t.value()));
    }

    #[test]
    fn channel_counts() {
        assert_eq!(SourceId::ChaosAttractor.channels(), 3);
        assert!(SourceId::ALL.iter().filter(|s| **s != SourceId::ChaosAttractor).all(|s| s.channels() == 1));
        assert!(!SourceId::AudioFollower.is_bipolar());
        assert!(SourceId::Lfo3.is_bipolar());
    }
}
