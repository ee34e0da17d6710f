//! Complementary one-pole spectral tilt.
//!
//! Splits the signal at a pivot frequency with a single one-pole lowpass and
//! recombines the two bands with independent gains:
//!
//! ```text
//! low  = LP(x)
//! high = x - low
//! y    = low_gain * low + high_gain * high
//! ```
//!
//! With both gains in `[0, 1]` the response magnitude never exceeds
//! `max(low_gain, high_gain)`, because the one-pole response lies inside the
//! disc of radius 1/2 centred on 1/2. That makes the filter safe to place
//! inside a feedback loop. `low_gain = 0` degenerates to a one-pole highpass
//! (low-end containment); `high_gain < 1` darkens.

use crate::math::flush_denormal;
use crate::math::one_pole_coeff;

/// Two-band tilt filter with non-amplifying gains.
///
/// ```rust
/// use monument_core::TiltFilter;
///
/// let mut tilt = TiltFilter::new(48000.0);
/// tilt.set_pivot(100.0);
/// tilt.set_gains(0.0, 1.0);
///
/// let mut out = 0.0;
/// for _ in 0..48000 {
///     out = tilt.process(1.0);
/// }
/// assert!(out.abs() < 1e-3, "DC is contained");
/// ```
#[derive(Debug, Clone)]
pub struct TiltFilter {
    sample_rate: f32,
    pole: f32,
    low_state: f32,
    low_gain: f32,
    high_gain: f32,
}

impl TiltFilter {
    /// Create a flat (unity) tilt with a 100 Hz pivot.
    pub fn new(sample_rate: f32) -> Self {
        let mut tilt = Self {
            sample_rate,
            pole: 0.0,
            low_state: 0.0,
            low_gain: 1.0,
            high_gain: 1.0,
        };
        tilt.set_pivot(100.0);
        tilt
    }

    /// Set the split frequency in Hz.
    pub fn set_pivot(&mut self, freq_hz: f32) {
        let nyquist = self.sample_rate * 0.5;
        self.pole = one_pole_coeff(freq_hz.clamp(1.0, nyquist), self.sample_rate);
    }

    /// Set band gains. Each is clamped to `[0, 1]`.
    pub fn set_gains(&mut self, low_gain: f32, high_gain: f32) {
        self.low_gain = low_gain.clamp(0.0, 1.0);
        self.high_gain = high_gain.clamp(0.0, 1.0);
    }

    /// Update the sample rate. Call [`set_pivot`](Self::set_pivot) afterwards.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.low_state = flush_denormal(input + self.pole * (self.low_state - input));
        let low = self.low_state;
        let high = input - low;
        self.low_gain * low + self.high_gain * high
    }

    /// Clear the filter state.
    pub fn reset(&mut self) {
        self.low_state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_peak(tilt: &mut TiltFilter, freq: f32) -> f32 {
        tilt.reset();
        let mut peak = 0.0f32;
        for i in 0..48000 {
            let x = libm::sinf(core::f32::consts::TAU * freq * i as f32 / 48000.0);
            let y = tilt.process(x);
            if i > 24000 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn unity_gains_are_transparent() {
        let mut tilt = TiltFilter::new(48000.0);
        for i in 0..100 {
            let x = (i as f32 * 0.37).sin();
            assert!((tilt.process(x) - x).abs() < 1e-5);
        }
    }

    #[test]
    fn never_amplifies() {
        let mut tilt = TiltFilter::new(48000.0);
        tilt.set_pivot(150.0);
        for (lo, hi) in [(0.0, 1.0), (1.0, 0.3), (0.5, 0.5), (0.2, 0.9)] {
            tilt.set_gains(lo, hi);
            for freq in [30.0, 150.0, 1000.0, 8000.0] {
                let peak = sine_peak(&mut tilt, freq);
                assert!(peak <= 1.0 + 1e-3, "gain {peak} at {freq} Hz ({lo}, {hi})");
            }
        }
    }

    #[test]
    fn gains_are_clamped() {
        let mut tilt = TiltFilter::new(48000.0);
        tilt.set_gains(3.0, -1.0);
        assert_eq!(tilt.low_gain, 1.0);
        assert_eq!(tilt.high_gain, 0.0);
    }
}
