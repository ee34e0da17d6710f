//! DC blocking highpass for the network input and the wet output.
//!
//! `H(z) = (1 - z^-1) / (1 - R z^-1)` with `R = 1 - 2π fc / fs`. Long
//! feedback chains integrate any offset they are fed, so every path into and
//! out of the reverberation network passes through one of these.

use core::f32::consts::PI;

use crate::math::flush_denormal;

/// First-order DC blocker.
///
/// ```rust
/// use monument_core::DcBlocker;
///
/// let mut blocker = DcBlocker::new(48000.0);
/// let mut out = 0.0;
/// for _ in 0..48000 {
///     out = blocker.process(1.0);
/// }
/// assert!(out.abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct DcBlocker {
    coeff: f32,
    cutoff_hz: f32,
    x_prev: f32,
    y_prev: f32,
}

impl DcBlocker {
    /// Default cutoff in Hz, well below anything audible.
    pub const DEFAULT_CUTOFF_HZ: f32 = 7.0;

    /// Create a blocker with the default cutoff.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_cutoff(sample_rate, Self::DEFAULT_CUTOFF_HZ)
    }

    /// Create a blocker with an explicit cutoff.
    pub fn with_cutoff(sample_rate: f32, cutoff_hz: f32) -> Self {
        Self {
            coeff: Self::calculate_coeff(cutoff_hz, sample_rate),
            cutoff_hz,
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    /// `y[n] = x[n] - x[n-1] + R * y[n-1]`
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = flush_denormal(input - self.x_prev + self.coeff * self.y_prev);
        self.x_prev = input;
        self.y_prev = output;
        output
    }

    /// Filter a buffer in place.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Reset the filter state to zero.
    pub fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }

    /// Recompute R for a new sample rate, keeping the cutoff.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff = Self::calculate_coeff(self.cutoff_hz, sample_rate);
    }

    /// Current R coefficient.
    pub fn coeff(&self) -> f32 {
        self.coeff
    }

    fn calculate_coeff(cutoff_hz: f32, sample_rate: f32) -> f32 {
        (1.0 - (2.0 * PI * cutoff_hz / sample_rate)).clamp(0.9, 0.9999)
    }
}
