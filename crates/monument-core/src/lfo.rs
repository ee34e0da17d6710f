//! Low frequency oscillator for drift, weathering and modulation sources.
//!
//! Phase-accumulating, so it can be stepped one sample at a time inside a
//! stage or a whole block at once by the modulation router.

use core::f32::consts::TAU;
use libm::{floorf, sinf};

use crate::tempo::{NoteDivision, TempoContext};

/// LFO waveform type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoWaveform {
    /// Smooth sinusoid.
    #[default]
    Sine,
    /// Linear ramps up and down.
    Triangle,
    /// Rising ramp with a hard reset.
    Saw,
    /// Binary ±1.
    Square,
    /// A new random level every cycle.
    SampleAndHold,
}

/// How the LFO rate is specified.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LfoRate {
    /// Free-running frequency in Hz.
    Hz(f32),
    /// Locked to the host tempo.
    Sync(NoteDivision),
}

impl Default for LfoRate {
    fn default() -> Self {
        Self::Hz(1.0)
    }
}

impl LfoRate {
    /// Frequency in Hz under `tempo`. Synced rates fall back to 120 BPM when
    /// the tempo is unknown.
    pub fn to_hz(self, tempo: &TempoContext) -> f32 {
        match self {
            Self::Hz(hz) => hz.max(0.0),
            Self::Sync(division) => division.to_hz(tempo.bpm_or_default()),
        }
    }
}

/// Low frequency oscillator producing values in `[-1, 1]`.
///
/// ```rust
/// use monument_core::{Lfo, LfoWaveform};
///
/// let mut lfo = Lfo::new(48000.0, 2.0);
/// lfo.set_waveform(LfoWaveform::Triangle);
/// let value = lfo.advance();
/// assert!((-1.0..=1.0).contains(&value));
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
    waveform: LfoWaveform,
    sh_value: f32,
    /// Hash state for sample-and-hold levels.
    sh_seed: u32,
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new(48000.0, 1.0)
    }
}

impl Lfo {
    /// Create an LFO at `freq_hz`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: freq_hz / sample_rate,
            sample_rate,
            waveform: LfoWaveform::Sine,
            sh_value: 0.0,
            sh_seed: 0x9e37_79b9,
        }
    }

    /// Set frequency in Hz.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.phase_inc = freq_hz.max(0.0) / self.sample_rate;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    /// Set the waveform.
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> LfoWaveform {
        self.waveform
    }

    /// Seed the sample-and-hold sequence so separate instances differ.
    pub fn set_seed(&mut self, seed: u32) {
        self.sh_seed = seed | 1;
    }

    /// Set phase in cycles, wrapped to `[0, 1)`.
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase - floorf(phase);
    }

    /// Current phase in cycles.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Rewind to phase 0 and clear the held value.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.sh_value = 0.0;
    }

    /// Update sample rate, keeping the frequency.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let freq = self.frequency();
        self.sample_rate = sample_rate;
        self.set_frequency(freq);
    }

    /// Value at the current phase without advancing.
    #[inline]
    pub fn value(&self) -> f32 {
        match self.waveform {
            LfoWaveform::Sine => sinf(self.phase * TAU),
            LfoWaveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
            LfoWaveform::Saw => 2.0 * self.phase - 1.0,
            LfoWaveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::SampleAndHold => self.sh_value,
        }
    }

    /// Return the current value and advance one sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let output = self.value();
        self.step(self.phase_inc);
        output
    }

    /// Return the current value and advance by `samples` at once.
    pub fn advance_by(&mut self, samples: usize) -> f32 {
        let output = self.value();
        self.step(self.phase_inc * samples as f32);
        output
    }

    #[inline]
    fn step(&mut self, delta: f32) {
        self.phase += delta;
        if self.phase >= 1.0 {
            self.phase -= floorf(self.phase);
            self.next_held_value();
        }
    }

    fn next_held_value(&mut self) {
        // xorshift32
        let mut x = self.sh_seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.sh_seed = x;
        self.sh_value = (x as f32 / u32::MAX as f32) * 2.0 - 1.0;
    }
}
