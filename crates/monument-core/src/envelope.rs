//! Envelope follower for tracking signal amplitude.
//!
//! Drives the audio-follower and envelope-tracker modulation sources and the
//! onset detector that retriggers the bloom envelope.

use libm::{expf, sqrtf};

/// How the follower measures level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionMode {
    /// Rectified peak level.
    #[default]
    Peak,
    /// Root-mean-square level (smoothed power, then square root).
    Rms,
}

/// Attack/release envelope follower.
///
/// ```rust
/// use monument_core::EnvelopeFollower;
///
/// let mut env = EnvelopeFollower::with_times(48000.0, 10.0, 150.0);
/// let mut level = 0.0;
/// for _ in 0..4800 {
///     level = env.process(0.5);
/// }
/// assert!((level - 0.5).abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    /// Smoothed level; power in RMS mode.
    state: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: f32,
    attack_ms: f32,
    release_ms: f32,
    mode: DetectionMode,
}

impl EnvelopeFollower {
    /// Create a follower with 10 ms attack and 100 ms release.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_times(sample_rate, 10.0, 100.0)
    }

    /// Create with specified attack and release times.
    pub fn with_times(sample_rate: f32, attack_ms: f32, release_ms: f32) -> Self {
        let mut follower = Self {
            state: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
            attack_ms: attack_ms.max(0.1),
            release_ms: release_ms.max(1.0),
            mode: DetectionMode::Peak,
        };
        follower.recalculate_coefficients();
        follower
    }

    /// Set the detection mode. Clears the state.
    pub fn set_mode(&mut self, mode: DetectionMode) {
        self.mode = mode;
        self.state = 0.0;
    }

    /// Set the attack time in milliseconds (at least 0.1).
    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms.max(0.1);
        self.recalculate_coefficients();
    }

    /// Set the release time in milliseconds (at least 1).
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.release_ms = release_ms.max(1.0);
        self.recalculate_coefficients();
    }

    /// Update sample rate and recalculate coefficients.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coefficients();
    }

    /// Process a sample and return the current level.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let detected = match self.mode {
            DetectionMode::Peak => input.abs(),
            DetectionMode::Rms => input * input,
        };
        let coeff = if detected > self.state {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.state = coeff * self.state + (1.0 - coeff) * detected;
        self.level()
    }

    /// Run a whole block and return the level at its end.
    pub fn process_block(&mut self, input: &[f32]) -> f32 {
        for &sample in input {
            self.process(sample);
        }
        self.level()
    }

    /// Current level without processing new input.
    #[inline]
    pub fn level(&self) -> f32 {
        match self.mode {
            DetectionMode::Peak => self.state,
            DetectionMode::Rms => sqrtf(self.state.max(0.0)),
        }
    }

    /// Reset the envelope to zero.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    fn recalculate_coefficients(&mut self) {
        // coeff = exp(-1 / (time_ms * sample_rate / 1000))
        self.attack_coeff = expf(-1.0 / (self.attack_ms * self.sample_rate / 1000.0));
        self.release_coeff = expf(-1.0 / (self.release_ms * self.sample_rate / 1000.0));
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new(48000.0)
    }
}
