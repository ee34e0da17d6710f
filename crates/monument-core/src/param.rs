//! Parameter handling with smoothing for zipper-free changes.
//!
//! Audio parameters need smooth transitions to avoid audible "zipper noise"
//! when values change. This module provides two smoothers:
//!
//! - [`SmoothedParam`] - Exponential (one-pole lowpass). Natural decay, used
//!   for modulation contributions and internal stage gains.
//! - [`LinearSmoothedParam`] - Constant-rate ramps that land exactly on the
//!   target after a known number of samples. Used by the
//!   [`ParameterDistributor`](crate::ParameterDistributor) and for crossfades.
//!
//! ## Usage
//!
//! ```rust
//! use monument_core::SmoothedParam;
//!
//! let mut gain = SmoothedParam::new(1.0);
//! gain.set_sample_rate(48000.0);
//! gain.set_smoothing_time_ms(10.0);
//!
//! gain.set_target(0.5);
//! for _ in 0..480 {
//!     let smoothed_gain = gain.advance();
//!     // Use smoothed_gain for processing...
//! #   let _ = smoothed_gain;
//! }
//! ```

use libm::expf;

/// A parameter with built-in exponential smoothing.
///
/// The "sample rate" is whatever rate [`advance`](Self::advance) is called
/// at. The modulation router, for instance, advances its smoothers once per
/// block and configures them with the block rate.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    /// Current smoothed value
    current: f32,
    /// Target value we're smoothing towards
    target: f32,
    /// Smoothing coefficient (1 = instant, toward 0 = very slow)
    coeff: f32,
    /// Update rate in Hz
    sample_rate: f32,
    /// Smoothing time in milliseconds
    smoothing_time_ms: f32,
}

impl SmoothedParam {
    /// Create a new smoothed parameter with initial value.
    ///
    /// Smoothing is disabled until a sample rate and smoothing time are set.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 48000.0,
            smoothing_time_ms: 0.0,
        }
    }

    /// Create a smoothed parameter with full configuration.
    ///
    /// # Arguments
    /// * `initial` - Initial parameter value
    /// * `sample_rate` - Rate at which [`advance`](Self::advance) is called
    /// * `smoothing_time_ms` - Time constant in milliseconds
    pub fn with_config(initial: f32, sample_rate: f32, smoothing_time_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.smoothing_time_ms = smoothing_time_ms;
        param.recalculate_coeff();
        param
    }

    /// Set the target value (parameter will smooth towards this).
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Set target and immediately snap to it (no smoothing).
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Update sample rate and recalculate smoothing coefficient.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Set smoothing time in milliseconds.
    pub fn set_smoothing_time_ms(&mut self, time_ms: f32) {
        self.smoothing_time_ms = time_ms;
        self.recalculate_coeff();
    }

    /// Smoothing time in milliseconds.
    pub fn smoothing_time_ms(&self) -> f32 {
        self.smoothing_time_ms
    }

    /// Get the next smoothed value (advances by one step).
    #[inline]
    pub fn advance(&mut self) -> f32 {
        // y[n] = y[n-1] + coeff * (target - y[n-1])
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Get the current smoothed value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Get the target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Check if the parameter has reached its target (within 1e-6).
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    /// Skip ahead to the target value immediately.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    /// `coeff = 1 - exp(-1 / (tau * rate))`, or 1.0 (instant) for zero time.
    ///
    /// After 5 tau the parameter is within 0.7 % of the target.
    fn recalculate_coeff(&mut self) {
        if self.smoothing_time_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.smoothing_time_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A parameter with linear smoothing (constant rate of change).
///
/// Every ramp takes exactly `ramp_samples` steps and the final step snaps to
/// the target, so after the ramp length the delivered value equals the
/// target bit-for-bit. Retargeting mid-ramp starts a fresh ramp from the
/// current value, so the value never jumps.
#[derive(Debug, Clone)]
pub struct LinearSmoothedParam {
    /// Current value
    current: f32,
    /// Target value
    target: f32,
    /// Increment per sample (can be positive or negative)
    increment: f32,
    /// Samples remaining until target reached
    samples_remaining: u32,
    /// Ramp length in samples for a full transition
    ramp_samples: u32,
}

impl LinearSmoothedParam {
    /// Create a new linear smoothed parameter that ramps over one sample.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            increment: 0.0,
            samples_remaining: 0,
            ramp_samples: 1,
        }
    }

    /// Create with a ramp length derived from sample rate and transition time.
    pub fn with_config(initial: f32, sample_rate: f32, transition_time_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.set_transition_time_ms(transition_time_ms, sample_rate);
        param
    }

    /// Set the target value, starting a ramp from the current value.
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;

        if self.ramp_samples <= 1 {
            // One-sample ramp: the next advance lands on the target.
            self.increment = target - self.current;
            self.samples_remaining = 1;
        } else {
            self.increment = (target - self.current) / self.ramp_samples as f32;
            self.samples_remaining = self.ramp_samples;
        }
    }

    /// Set value immediately.
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.increment = 0.0;
        self.samples_remaining = 0;
    }

    /// Set the ramp length from a transition time. Never shorter than one sample.
    pub fn set_transition_time_ms(&mut self, time_ms: f32, sample_rate: f32) {
        let samples = (time_ms.max(0.0) / 1000.0 * sample_rate) as u32;
        self.ramp_samples = samples.max(1);
    }

    /// Set the ramp length in samples directly. Never shorter than one sample.
    pub fn set_ramp_samples(&mut self, samples: u32) {
        self.ramp_samples = samples.max(1);
    }

    /// Ramp length in samples.
    pub fn ramp_samples(&self) -> u32 {
        self.ramp_samples
    }

    /// Get next smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.current += self.increment;
            self.samples_remaining -= 1;
            if self.samples_remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Write the next `out.len()` ramp values into `out`.
    pub fn fill(&mut self, out: &mut [f32]) {
        if self.samples_remaining == 0 {
            out.fill(self.current);
            return;
        }
        for sample in out.iter_mut() {
            *sample = self.advance();
        }
    }

    /// Advance by `count` samples without producing output.
    pub fn skip(&mut self, count: usize) -> f32 {
        let count = count.min(self.samples_remaining as usize) as u32;
        if count == 0 {
            return self.current;
        }
        self.samples_remaining -= count;
        if self.samples_remaining == 0 {
            self.current = self.target;
        } else {
            self.current += self.increment * count as f32;
        }
        self.current
    }

    /// Get current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Get target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Check if transition is complete.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.samples_remaining == 0
    }

    /// Snap to target immediately.
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
        self.increment = 0.0;
        self.samples_remaining = 0;
    }
}

impl Default for LinearSmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
