//! Allpass diffuser for smearing transients before and after the network.
//!
//! Lattice form with a single coefficient `g`:
//!
//! ```text
//! w[n] = x[n] + g * w[n-D]
//! y[n] = w[n-D] - g * w[n]
//! ```
//!
//! Unity magnitude at every frequency for `|g| < 1`; only the phase is
//! smeared. The coefficient can be changed per block without clearing state.

use crate::delay::{DelayLine, Interpolation};
use crate::math::flush_denormal;

/// Largest coefficient magnitude accepted.
const MAX_COEFF: f32 = 0.95;

/// Allpass diffuser with a fixed delay length.
///
/// ```rust
/// use monument_core::AllpassFilter;
///
/// let mut diffuser = AllpassFilter::new(149);
/// diffuser.set_coefficient(0.5);
/// let out = diffuser.process(1.0);
/// assert!((out + 0.5).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    delay: DelayLine,
    length: usize,
    coeff: f32,
}

impl AllpassFilter {
    /// Create a diffuser delaying by `delay_samples` (at least 1).
    pub fn new(delay_samples: usize) -> Self {
        let length = delay_samples.max(1);
        let mut delay = DelayLine::new(length + 2);
        delay.set_interpolation(Interpolation::None);
        Self {
            delay,
            length,
            coeff: 0.5,
        }
    }

    /// Re-size to a new delay length and clear. Control context only.
    pub fn set_length(&mut self, delay_samples: usize) {
        self.length = delay_samples.max(1);
        self.delay.resize(self.length + 2);
    }

    /// Set the diffusion coefficient, clamped to `[-0.95, 0.95]`.
    #[inline]
    pub fn set_coefficient(&mut self, coeff: f32) {
        self.coeff = coeff.clamp(-MAX_COEFF, MAX_COEFF);
    }

    /// Current coefficient.
    #[inline]
    pub fn coefficient(&self) -> f32 {
        self.coeff
    }

    /// Process a single sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.delay.read((self.length - 1) as f32);
        let w = flush_denormal(input + self.coeff * delayed);
        self.delay.write(w);
        delayed - self.coeff * w
    }

    /// Clear the delay state.
    pub fn clear(&mut self) {
        self.delay.clear();
    }

    /// Delay length in samples.
    pub fn length(&self) -> usize {
        self.length
    }
}
