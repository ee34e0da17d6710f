//! Fractional delay line for the reverberation network and modulated taps.
//!
//! A circular buffer sized once at prepare time to the largest delay it will
//! ever serve. Writes advance by whole samples; reads take a fractional delay
//! and interpolate, so slowly drifting delay lengths stay click-free.
//!
//! | User | Delay Range | Modulation |
//! |------|-------------|------------|
//! | FDN lines | 50 ms - 1.3 s | Drift (a few samples) |
//! | Diffusers | 3 - 8 ms | No |
//! | Pillar taps | 5 - 120 ms | No |
//! | Weathering | 8 - 40 ms | Yes (LFO) |

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Interpolation method for fractional delay reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Truncate to the nearest earlier sample.
    None,
    /// Linear interpolation between two samples.
    #[default]
    Linear,
}

/// Interpolated circular delay line.
///
/// `read(d)` returns the sample written `d` writes before the most recent
/// one, so `read(0.0)` is the last written sample. A network line that reads
/// before it writes therefore uses `read(length - 1.0)` for a loop of
/// `length` samples.
///
/// The buffer never reallocates after construction or [`resize`](Self::resize).
///
/// ```rust
/// use monument_core::DelayLine;
///
/// let mut line = DelayLine::new(64);
/// line.write(1.0);
/// for _ in 0..9 {
///     line.write(0.0);
/// }
/// assert_eq!(line.read(9.0), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    interpolation: Interpolation,
}

impl DelayLine {
    /// Creates a delay line holding `capacity` samples (at least 2).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(2)],
            write_pos: 0,
            interpolation: Interpolation::Linear,
        }
    }

    /// Re-size and clear. Control context only.
    pub fn resize(&mut self, capacity: usize) {
        self.buffer.clear();
        self.buffer.resize(capacity.max(2), 0.0);
        self.write_pos = 0;
    }

    /// Sets the interpolation method for fractional reads.
    pub fn set_interpolation(&mut self, interp: Interpolation) {
        self.interpolation = interp;
    }

    /// Reads a delayed sample. Delays beyond capacity are clamped.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay_clamped = delay_samples.clamp(0.0, (len - 2) as f32);

        let delay_int = delay_clamped as usize;
        let frac = delay_clamped - delay_int as f32;

        // Points `delay_int` samples before the last written one.
        let read_pos = (self.write_pos + len - delay_int - 1) % len;

        match self.interpolation {
            Interpolation::None => self.buffer[read_pos],

            Interpolation::Linear => {
                let next_pos = (read_pos + len - 1) % len;
                let a = self.buffer[read_pos];
                let b = self.buffer[next_pos];
                a + (b - a) * frac
            }
        }
    }

    /// Writes a sample and advances the write position.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Read at `delay_samples`, then write `sample`.
    #[inline]
    pub fn read_write(&mut self, sample: f32, delay_samples: f32) -> f32 {
        let output = self.read(delay_samples);
        self.write(sample);
        output
    }

    /// Zero the buffer and rewind.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Largest delay `read` honours without clamping.
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 2) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_basic() {
        let mut delay = DelayLine::new(10);
        for i in 1..=6 {
            delay.write(i as f32);
        }
        assert_eq!(delay.read(3.0), 3.0);
    }

    #[test]
    fn test_delay_interpolation() {
        let mut delay = DelayLine::new(10);
        for i in 0..4 {
            delay.write(i as f32);
        }
        let output = delay.read(1.5);
        assert!((output - 1.5).abs() < 0.01, "Expected ~1.5, got {output}");
    }

    #[test]
    fn test_delay_wrap() {
        let mut delay = DelayLine::new(4);
        for i in 1..=5 {
            delay.write(i as f32);
        }
        assert_eq!(delay.read(2.0), 3.0);
    }

    #[test]
    fn test_loop_length_read_before_write() {
        // A loop of length L reads `L - 1` before writing.
        let mut delay = DelayLine::new(32);
        let length = 7;
        let mut out = Vec::new();
        for n in 0..20 {
            let y = delay.read((length - 1) as f32);
            delay.write(if n == 0 { 1.0 } else { 0.0 });
            out.push(y);
        }
        assert_eq!(out[length], 1.0);
        assert_eq!(out.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn test_zero_capacity_is_usable() {
        let mut delay = DelayLine::new(0);
        delay.write(1.0);
        assert!(delay.read(100.0).is_finite());
    }

    #[test]
    fn test_none_interpolation_truncates() {
        let mut delay = DelayLine::new(16);
        delay.set_interpolation(Interpolation::None);
        for i in 0..5 {
            delay.write(i as f32);
        }
        assert_eq!(delay.read(1.7), 3.0);
    }

    #[test]
    fn test_resize_clears() {
        let mut delay = DelayLine::new(8);
        delay.write(1.0);
        delay.resize(16);
        assert_eq!(delay.capacity(), 16);
        assert_eq!(delay.read(0.0), 0.0);
    }
}
