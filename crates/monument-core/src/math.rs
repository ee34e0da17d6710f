//! Mathematical utility functions for DSP.
//!
//! Common operations used throughout the signal path. Every function here is
//! allocation-free, branch-light and suitable for `no_std`.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//!
//! # Mapping
//!
//! - [`lerp`] - Map a normalized control onto a range
//! - [`wet_dry_mix`] - Crossfade between two signals
//! - [`ms_to_samples`] - Time conversion
//!
//! # Safety Valves
//!
//! - [`flush_denormal`] - Zero out denormal feedback state
//! - [`sanitize`] - Replace non-finite samples with silence

use libm::{expf, logf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use monument_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// Input is floored at 1e-10 so silence maps to -200 dB instead of -inf.
///
/// # Example
/// ```rust
/// use monument_core::linear_to_db;
///
/// assert!((linear_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Linear interpolation from `a` to `b` by `t`.
///
/// `t` is not clamped; callers pass normalized controls.
///
/// # Example
/// ```rust
/// use monument_core::lerp;
///
/// assert_eq!(lerp(0.35, 0.92, 0.0), 0.35);
/// assert!((lerp(0.35, 0.92, 1.0) - 0.92).abs() < 1e-6);
/// ```
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Flush denormal values to zero.
///
/// Recursive filters decaying toward silence produce subnormal floats that
/// are dramatically slower on most CPUs. Anything below 1e-20 is treated as 0.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Replace NaN and infinities with silence.
///
/// Used at stage boundaries as a last line of defense against pathological
/// feedback states. Finite values pass through untouched.
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

/// Sanitize a whole buffer in place. Returns `true` if anything was replaced.
pub fn sanitize_buffer(buffer: &mut [f32]) -> bool {
    let mut replaced = false;
    for sample in buffer.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
            replaced = true;
        }
    }
    replaced
}

/// Crossfade between dry and wet signals.
///
/// Equivalent to `dry * (1 - mix) + wet * mix` but uses one fewer multiply:
/// `dry + (wet - dry) * mix`.
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry + (wet - dry) * mix
}

/// Convert milliseconds to a (fractional) sample count.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * 0.001 * sample_rate
}

/// One-pole coefficient for a cutoff frequency: `exp(-2π f / fs)`.
///
/// Shared by the damping, tilt and feedback-tap filters so they agree on the
/// meaning of a cutoff.
#[inline]
pub fn one_pole_coeff(freq_hz: f32, sample_rate: f32) -> f32 {
    expf(-core::f32::consts::TAU * freq_hz / sample_rate)
}

/// Root-mean-square of a buffer. Empty input yields 0.
pub fn rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum: f32 = buffer.iter().map(|x| x * x).sum();
    libm::sqrtf(sum / buffer.len() as f32)
}
