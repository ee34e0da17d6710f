//! Host tempo and transport information for tempo-synced modulation rates.

use libm::floorf;

/// Musical note divisions for tempo sync.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoteDivision {
    /// Four bars of 4/4 (16 beats)
    FourBars,
    /// Two bars (8 beats)
    TwoBars,
    /// Whole note (4 beats)
    Whole,
    /// Half note (2 beats)
    Half,
    /// Quarter note (1 beat)
    #[default]
    Quarter,
    /// Eighth note (1/2 beat)
    Eighth,
    /// Sixteenth note (1/4 beat)
    Sixteenth,
    /// Dotted half note (3 beats)
    DottedHalf,
    /// Dotted quarter note (1.5 beats)
    DottedQuarter,
    /// Dotted eighth note (3/4 beat)
    DottedEighth,
    /// Triplet quarter note (2/3 beat)
    TripletQuarter,
    /// Triplet eighth note (1/3 beat)
    TripletEighth,
}

impl NoteDivision {
    /// All divisions, slowest first.
    pub const ALL: [NoteDivision; 12] = [
        NoteDivision::FourBars,
        NoteDivision::TwoBars,
        NoteDivision::Whole,
        NoteDivision::DottedHalf,
        NoteDivision::Half,
        NoteDivision::DottedQuarter,
        NoteDivision::Quarter,
        NoteDivision::TripletQuarter,
        NoteDivision::DottedEighth,
        NoteDivision::Eighth,
        NoteDivision::TripletEighth,
        NoteDivision::Sixteenth,
    ];

    /// Frequency in Hz at `bpm`.
    ///
    /// ```rust
    /// use monument_core::NoteDivision;
    ///
    /// assert!((NoteDivision::Quarter.to_hz(120.0) - 2.0).abs() < 0.001);
    /// assert!((NoteDivision::Eighth.to_hz(120.0) - 4.0).abs() < 0.001);
    /// ```
    pub fn to_hz(&self, bpm: f32) -> f32 {
        (bpm / 60.0) / self.beats()
    }

    /// Duration in milliseconds at `bpm`.
    pub fn to_ms(&self, bpm: f32) -> f32 {
        self.beats() * 60000.0 / bpm
    }

    /// Number of beats this division spans.
    pub fn beats(&self) -> f32 {
        match self {
            NoteDivision::FourBars => 16.0,
            NoteDivision::TwoBars => 8.0,
            NoteDivision::Whole => 4.0,
            NoteDivision::Half => 2.0,
            NoteDivision::Quarter => 1.0,
            NoteDivision::Eighth => 0.5,
            NoteDivision::Sixteenth => 0.25,
            NoteDivision::DottedHalf => 3.0,
            NoteDivision::DottedQuarter => 1.5,
            NoteDivision::DottedEighth => 0.75,
            NoteDivision::TripletQuarter => 2.0 / 3.0,
            NoteDivision::TripletEighth => 1.0 / 3.0,
        }
    }

    /// Stable label used in serialized connection sets.
    pub fn label(&self) -> &'static str {
        match self {
            NoteDivision::FourBars => "4/1",
            NoteDivision::TwoBars => "2/1",
            NoteDivision::Whole => "1/1",
            NoteDivision::Half => "1/2",
            NoteDivision::Quarter => "1/4",
            NoteDivision::Eighth => "1/8",
            NoteDivision::Sixteenth => "1/16",
            NoteDivision::DottedHalf => "1/2.",
            NoteDivision::DottedQuarter => "1/4.",
            NoteDivision::DottedEighth => "1/8.",
            NoteDivision::TripletQuarter => "1/4T",
            NoteDivision::TripletEighth => "1/8T",
        }
    }

    /// Inverse of [`label`](Self::label).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.label() == label)
    }
}

/// Tempo and transport snapshot supplied by the host once per block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoContext {
    /// Tempo in beats per minute. Zero or negative means unknown.
    pub bpm: f32,
    /// Whether the host transport is running.
    pub playing: bool,
    /// Position in beats since the transport started.
    pub beat_position: f64,
}

impl Default for TempoContext {
    fn default() -> Self {
        Self {
            bpm: Self::DEFAULT_BPM,
            playing: false,
            beat_position: 0.0,
        }
    }
}

impl TempoContext {
    /// Tempo assumed when the host reports none.
    pub const DEFAULT_BPM: f32 = 120.0;

    /// Build a context at beat 0.
    pub fn new(bpm: f32, playing: bool) -> Self {
        Self {
            bpm,
            playing,
            beat_position: 0.0,
        }
    }

    /// The host tempo, or [`DEFAULT_BPM`](Self::DEFAULT_BPM) if unknown.
    pub fn bpm_or_default(&self) -> f32 {
        if self.bpm.is_finite() && self.bpm > 0.0 {
            self.bpm.clamp(20.0, 999.0)
        } else {
            Self::DEFAULT_BPM
        }
    }

    /// Advance the beat position by `samples` if the transport is running.
    pub fn advance(&mut self, samples: usize, sample_rate: f32) {
        if self.playing && sample_rate > 0.0 {
            let beats = samples as f64 * f64::from(self.bpm_or_default()) / 60.0 / f64::from(sample_rate);
            self.beat_position += beats;
        }
    }

    /// Fractional position within the current beat, `[0, 1)`.
    pub fn beat_phase(&self) -> f32 {
        let pos = self.beat_position as f32;
        pos - floorf(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_division_ms() {
        assert!((NoteDivision::Quarter.to_ms(120.0) - 500.0).abs() < 0.1);
        assert!((NoteDivision::DottedEighth.to_ms(120.0) - 375.0).abs() < 0.1);
    }

    #[test]
    fn test_label_roundtrip() {
        for division in NoteDivision::ALL {
            assert_eq!(NoteDivision::from_label(division.label()), Some(division));
        }
        assert_eq!(NoteDivision::from_label("3/7"), None);
    }

    #[test]
    fn test_unknown_tempo_falls_back() {
        let ctx = TempoContext::new(0.0, true);
        assert_eq!(ctx.bpm_or_default(), 120.0);
        let ctx = TempoContext::new(f32::NAN, true);
        assert_eq!(ctx.bpm_or_default(), 120.0);
    }

    #[test]
    fn test_advance_only_when_playing() {
        let mut ctx = TempoContext::new(120.0, false);
        ctx.advance(48000, 48000.0);
        assert_eq!(ctx.beat_position, 0.0);
        ctx.playing = true;
        ctx.advance(48000, 48000.0);
        assert!((ctx.beat_position - 2.0).abs() < 1e-9);
    }
}
