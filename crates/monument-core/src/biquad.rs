//! Second-order IIR sections for the resonant stages.
//!
//! Coefficients follow the RBJ Audio EQ Cookbook and are computed off the
//! sample loop into a [`BiquadCoefficients`] value, then handed to any number
//! of [`Biquad`] states. Frequencies are clamped below Nyquist and Q is kept
//! positive, so every constructor yields a stable section.
//!
//! | Shape | Used by |
//! |-------|---------|
//! | Band-pass | Tube fundamentals, hallway room modes |
//! | All-pass | Spectral rotation cascade |
//! | Peaking | Paradox resonance |
//! | Low-pass | Drifting absorption |

use core::f32::consts::PI;
use libm::{cosf, powf, sinf};

const MIN_HZ: f32 = 10.0;
const MAX_NYQUIST_SHARE: f32 = 0.49;
const MIN_Q: f32 = 0.05;

/// Normalized Direct Form I coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

struct Prewarp {
    cos: f32,
    alpha: f32,
}

fn prewarp(frequency: f32, q: f32, sample_rate: f32) -> Prewarp {
    let nyquist_cap = sample_rate * MAX_NYQUIST_SHARE;
    let frequency = frequency.clamp(MIN_HZ, nyquist_cap.max(MIN_HZ));
    let omega = 2.0 * PI * frequency / sample_rate;
    Prewarp {
        cos: cosf(omega),
        alpha: sinf(omega) / (2.0 * q.max(MIN_Q)),
    }
}

impl BiquadCoefficients {
    /// Pass-through.
    pub const IDENTITY: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let inv = 1.0 / a0;
        Self { b0: b0 * inv, b1: b1 * inv, b2: b2 * inv, a1: a1 * inv, a2: a2 * inv }
    }

    /// Low-pass at `frequency`.
    pub fn lowpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let Prewarp { cos, alpha } = prewarp(frequency, q, sample_rate);
        let b1 = 1.0 - cos;
        Self::normalized(0.5 * b1, b1, 0.5 * b1, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
    }

    /// Band-pass with 0 dB peak gain at `frequency`.
    pub fn bandpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let Prewarp { cos, alpha } = prewarp(frequency, q, sample_rate);
        Self::normalized(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
    }

    /// All-pass with its 180 degree point at `frequency`.
    pub fn allpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let Prewarp { cos, alpha } = prewarp(frequency, q, sample_rate);
        Self::normalized(1.0 - alpha, -2.0 * cos, 1.0 + alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
    }

    /// Peaking EQ: `gain_db` of boost or cut around `frequency`.
    pub fn peaking(frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let Prewarp { cos, alpha } = prewarp(frequency, q, sample_rate);
        let a = powf(10.0, gain_db / 40.0);
        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos,
            1.0 - alpha / a,
        )
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Direct Form I biquad state.
///
/// ```rust
/// use monument_core::{Biquad, BiquadCoefficients};
///
/// let mut filter = Biquad::new(BiquadCoefficients::lowpass(1000.0, 0.707, 48000.0));
/// let mut y = 0.0;
/// for _ in 0..2000 {
///     y = filter.process(1.0);
/// }
/// assert!((y - 1.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// A section with the given coefficients and cleared history.
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self { coeffs, ..Self::default() }
    }

    /// Swap coefficients, keeping history.
    #[inline]
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = crate::math::flush_denormal(output);
        self.y1
    }

    /// Zero the history.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
