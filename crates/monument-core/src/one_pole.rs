//! One-pole lowpass for damping, tilt splits and feedback taps.
//!
//! ```text
//! y[n] = x[n] + pole * (y[n-1] - x[n])
//!      = (1 - pole) * x[n] + pole * y[n-1]
//! ```
//!
//! The pole is either derived from a cutoff (`pole = exp(-2π f / fs)`) or set
//! directly, which is how the reverberation network maps its "mass" control
//! onto per-line damping. Unity DC gain for any pole in `[0, 1)`, so the
//! filter can sit inside a feedback loop without adding energy.
//!
//! ```rust
//! use monument_core::OnePole;
//!
//! let mut lp = OnePole::new(48000.0, 4000.0);
//! let filtered = lp.process(1.0);
//! assert!(filtered < 1.0);
//! ```

use crate::math::{flush_denormal, one_pole_coeff};

/// One-pole (6 dB/oct) lowpass filter.
///
/// # Invariants
///
/// - `pole` is always in `[0, 1)`
/// - `state` is flushed to zero below 1e-20
#[derive(Debug, Clone)]
pub struct OnePole {
    state: f32,
    pole: f32,
    sample_rate: f32,
}

/// Largest pole accepted; keeps the filter strictly stable.
const MAX_POLE: f32 = 0.9999;

impl OnePole {
    /// Create a lowpass with a cutoff in Hz.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        let mut filter = Self::from_pole(sample_rate, 0.0);
        filter.set_frequency(freq_hz);
        filter
    }

    /// Create a lowpass with an explicit pole (0 = pass-through).
    pub fn from_pole(sample_rate: f32, pole: f32) -> Self {
        Self {
            state: 0.0,
            pole: pole.clamp(0.0, MAX_POLE),
            sample_rate,
        }
    }

    /// Set the cutoff frequency.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        let nyquist = self.sample_rate * 0.5;
        self.pole = one_pole_coeff(freq_hz.clamp(1.0, nyquist), self.sample_rate).clamp(0.0, MAX_POLE);
    }

    /// Set the pole directly. Clamped to `[0, 0.9999]`.
    #[inline]
    pub fn set_pole(&mut self, pole: f32) {
        self.pole = pole.clamp(0.0, MAX_POLE);
    }

    /// Current pole.
    pub fn pole(&self) -> f32 {
        self.pole
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(input + self.pole * (self.state - input));
        self.state
    }

    /// Reset filter state to zero.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    /// Update sample rate. Call [`set_frequency`](Self::set_frequency) afterwards.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }
}
