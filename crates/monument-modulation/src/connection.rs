//! Connections from sources to parameters, and the sets that get published.

use libm::{powf, tanhf};
use monument_core::{LfoRate, LfoWaveform, NoteDivision, lerp};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::ModulationError;
use crate::sources::{LFO_COUNT, SourceId};

/// Maximum connections in one set.
pub const MAX_CONNECTIONS: usize = 64;

/// Allowed smoothing times in milliseconds.
pub const SMOOTHING_RANGE_MS: (f32, f32) = (20.0, 1000.0);

/// Smoothing time of a new connection.
pub const DEFAULT_SMOOTHING_MS: f32 = 200.0;

/// Transfer curve applied to the source value before depth scaling.
///
/// Curves act on the magnitude and keep the sign, so bipolar sources stay
/// symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Curve {
    /// Identity.
    #[default]
    Linear,
    /// Slow start: `x^e`, `e` from 1 to 4 with the amount.
    Exponential,
    /// Fast start: `1 - (1 - x)^e`.
    Logarithmic,
    /// Sigmoid through the midpoint, steeper with the amount.
    SCurve,
}

impl Curve {
    /// Shape `x` with `amount` in [0, 1]. Output magnitude never exceeds 1.
    pub fn apply(self, x: f32, amount: f32) -> f32 {
        let mag = x.abs().min(1.0);
        let amount = amount.clamp(0.0, 1.0);
        let shaped = match self {
            Curve::Linear => mag,
            Curve::Exponential => powf(mag, lerp(1.0, 4.0, amount)),
            Curve::Logarithmic => 1.0 - powf(1.0 - mag, lerp(1.0, 4.0, amount)),
            Curve::SCurve => {
                let k = lerp(0.5, 3.5, amount);
                let edge = tanhf(k);
                (tanhf(k * (2.0 * mag - 1.0)) + edge) / (2.0 * edge)
            }
        };
        shaped.copysign(x)
    }
}

/// One source-to-destination link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModulationConnection {
    /// Source.
    pub source: SourceId,
    /// Output channel of the source (only the attractor has more than one).
    #[serde(default)]
    pub channel: u8,
    /// Destination parameter id.
    pub destination: u32,
    /// Signed depth in [-1, 1].
    pub depth: f32,
    /// One-pole smoothing time in ms.
    #[serde(default = "default_smoothing")]
    pub smoothing_ms: f32,
    /// Chance per block that the contribution reaches the destination.
    #[serde(default = "default_probability")]
    pub probability: f32,
    /// Disabled connections glide to zero.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Transfer curve.
    #[serde(default)]
    pub curve: Curve,
    /// Curve amount in [0, 1].
    #[serde(default)]
    pub curve_amount: f32,
}

fn default_smoothing() -> f32 {
    DEFAULT_SMOOTHING_MS
}

fn default_probability() -> f32 {
    1.0
}

fn default_enabled() -> bool {
    true
}

impl ModulationConnection {
    /// A linear, always-on connection with default smoothing.
    pub fn new(source: SourceId, destination: u32, depth: f32) -> Self {
        Self {
            source,
            channel: 0,
            destination,
            depth,
            smoothing_ms: DEFAULT_SMOOTHING_MS,
            probability: 1.0,
            enabled: true,
            curve: Curve::Linear,
            curve_amount: 0.0,
        }
        .sanitized()
    }

    /// Select a source channel.
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Set the smoothing time.
    pub fn with_smoothing_ms(mut self, ms: f32) -> Self {
        self.smoothing_ms = ms;
        self.sanitized()
    }

    /// Set the per-block trigger probability.
    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self.sanitized()
    }

    /// Set the transfer curve.
    pub fn with_curve(mut self, curve: Curve, amount: f32) -> Self {
        self.curve = curve;
        self.curve_amount = amount;
        self.sanitized()
    }

    /// Enable or disable.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Clamp every numeric field into range. Non-finite values fall back to
    /// the neutral choice (zero depth, default smoothing, always-on, no
    /// curve amount).
    pub fn sanitized(mut self) -> Self {
        fn finite_or(x: f32, fallback: f32) -> f32 {
            if x.is_finite() { x } else { fallback }
        }
        self.depth = finite_or(self.depth, 0.0).clamp(-1.0, 1.0);
        self.smoothing_ms = finite_or(self.smoothing_ms, DEFAULT_SMOOTHING_MS)
            .clamp(SMOOTHING_RANGE_MS.0, SMOOTHING_RANGE_MS.1);
        self.probability = finite_or(self.probability, 1.0).clamp(0.0, 1.0);
        self.curve_amount = finite_or(self.curve_amount, 0.0).clamp(0.0, 1.0);
        self
    }

    /// Shaped, depth-scaled contribution for a raw source value.
    #[inline]
    pub fn contribution(&self, source_value: f32) -> f32 {
        self.curve.apply(source_value, self.curve_amount) * self.depth
    }

    /// Source, channel and destination. Two connections with the same key
    /// drive the same thing.
    #[inline]
    pub fn key(&self) -> (SourceId, u8, u32) {
        (self.source, self.channel, self.destination)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "NoteDivision", rename_all = "snake_case")]
enum NoteDivisionDef {
    FourBars,
    TwoBars,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    DottedHalf,
    DottedQuarter,
    DottedEighth,
    TripletQuarter,
    TripletEighth,
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "LfoRate", rename_all = "snake_case")]
enum LfoRateDef {
    Hz(f32),
    Sync(#[serde(with = "NoteDivisionDef")] NoteDivision),
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "LfoWaveform", rename_all = "snake_case")]
enum LfoWaveformDef {
    Sine,
    Triangle,
    Saw,
    Square,
    SampleAndHold,
}

/// Shape and rate of one LFO source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LfoSettings {
    /// Waveform.
    #[serde(with = "LfoWaveformDef")]
    pub shape: LfoWaveform,
    /// Free-running or tempo-synced rate.
    #[serde(with = "LfoRateDef")]
    pub rate: LfoRate,
}

impl LfoSettings {
    /// Factory settings for LFO 1–4: slow to moderate, different shapes.
    pub const DEFAULTS: [LfoSettings; LFO_COUNT] = [
        LfoSettings { shape: LfoWaveform::Sine, rate: LfoRate::Hz(0.05) },
        LfoSettings { shape: LfoWaveform::Triangle, rate: LfoRate::Hz(0.10) },
        LfoSettings { shape: LfoWaveform::Saw, rate: LfoRate::Hz(0.20) },
        LfoSettings { shape: LfoWaveform::Square, rate: LfoRate::Hz(0.35) },
    ];
}

/// How many connections [`ConnectionSet::randomize`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomDensity {
    /// Two or three shallow connections.
    Sparse,
    /// Four to eight.
    #[default]
    Balanced,
    /// Eight to twelve deep connections.
    Dense,
}

impl RandomDensity {
    fn count_range(self) -> (usize, usize) {
        match self {
            RandomDensity::Sparse => (2, 3),
            RandomDensity::Balanced => (4, 8),
            RandomDensity::Dense => (8, 12),
        }
    }

    fn depth_range(self) -> (f32, f32) {
        match self {
            RandomDensity::Sparse => (0.2, 0.4),
            RandomDensity::Balanced => (0.2, 0.6),
            RandomDensity::Dense => (0.4, 0.8),
        }
    }
}

/// An immutable-once-published group of connections plus LFO settings.
///
/// Built in the control context, then handed to
/// [`RouterHandle::publish`](crate::RouterHandle::publish).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConnectionSet")]
pub struct ConnectionSet {
    connections: Vec<ModulationConnection>,
    lfos: [LfoSettings; LFO_COUNT],
}

#[derive(Deserialize)]
struct RawConnectionSet {
    #[serde(default)]
    connections: Vec<ModulationConnection>,
    #[serde(default = "default_lfos")]
    lfos: [LfoSettings; LFO_COUNT],
}

fn default_lfos() -> [LfoSettings; LFO_COUNT] {
    LfoSettings::DEFAULTS
}

impl TryFrom<RawConnectionSet> for ConnectionSet {
    type Error = ModulationError;

    fn try_from(raw: RawConnectionSet) -> Result<Self, Self::Error> {
        let mut set = ConnectionSet { connections: Vec::new(), lfos: raw.lfos };
        for connection in raw.connections {
            set.push(connection)?;
        }
        Ok(set)
    }
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSet {
    /// Empty set with default LFOs.
    pub fn new() -> Self {
        Self { connections: Vec::with_capacity(MAX_CONNECTIONS), lfos: LfoSettings::DEFAULTS }
    }

    /// Append a connection (sanitized). Its index is its slot.
    pub fn push(&mut self, connection: ModulationConnection) -> Result<usize, ModulationError> {
        if self.connections.len() >= MAX_CONNECTIONS {
            return Err(ModulationError::TooManyConnections { max: MAX_CONNECTIONS });
        }
        if connection.channel >= connection.source.channels() {
            return Err(ModulationError::InvalidSourceChannel {
                source_id: connection.source,
                channel: connection.channel,
            });
        }
        self.connections.push(connection.sanitized());
        Ok(self.connections.len() - 1)
    }

    /// Remove and return the connection at `slot`. Later slots shift down.
    pub fn remove(&mut self, slot: usize) -> Option<ModulationConnection> {
        (slot < self.connections.len()).then(|| self.connections.remove(slot))
    }

    /// Connection at `slot`.
    pub fn get(&self, slot: usize) -> Option<&ModulationConnection> {
        self.connections.get(slot)
    }

    /// Mutable connection at `slot`. Re-sanitized on publish.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut ModulationConnection> {
        self.connections.get_mut(slot)
    }

    /// All connections in slot order.
    pub fn connections(&self) -> &[ModulationConnection] {
        &self.connections
    }

    /// Number of connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// `true` if there are no connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// LFO settings, one per LFO source.
    pub fn lfos(&self) -> &[LfoSettings; LFO_COUNT] {
        &self.lfos
    }

    /// Replace one LFO's settings. Out-of-range indices are ignored.
    pub fn set_lfo(&mut self, index: usize, settings: LfoSettings) {
        if let Some(slot) = self.lfos.get_mut(index) {
            *slot = settings;
        }
    }

    /// Check every destination against a parameter count and re-sanitize.
    pub fn validate(&mut self, param_count: usize) -> Result<(), ModulationError> {
        for connection in &mut self.connections {
            if connection.destination as usize >= param_count {
                return Err(ModulationError::UnknownDestination(connection.destination));
            }
            if connection.channel >= connection.source.channels() {
                return Err(ModulationError::InvalidSourceChannel {
                    source_id: connection.source,
                    channel: connection.channel,
                });
            }
            *connection = connection.sanitized();
        }
        Ok(())
    }

    /// A random set over `param_count` destinations, deterministic per seed.
    ///
    /// Duplicate (source, channel, destination) triples are skipped, so the
    /// set may come out smaller than drawn.
    pub fn randomize(density: RandomDensity, seed: u64, param_count: usize) -> Self {
        let mut set = Self::new();
        if param_count == 0 {
            return set;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (min_count, max_count) = density.count_range();
        let (min_depth, max_depth) = density.depth_range();
        let count = rng.random_range(min_count..=max_count);

        for _ in 0..count {
            let source = SourceId::ALL[rng.random_range(0..SourceId::ALL.len())];
            let channel = rng.random_range(0..source.channels());
            let destination = rng.random_range(0..param_count) as u32;
            if set.connections.iter().any(|c| c.key() == (source, channel, destination)) {
                continue;
            }
            let magnitude = rng.random_range(min_depth..=max_depth);
            let depth = if rng.random_bool(0.7) { magnitude } else { -magnitude };
            let connection = ModulationConnection::new(source, destination, depth)
                .with_channel(channel)
                .with_smoothing_ms(rng.random_range(100.0..=500.0));
            if set.push(connection).is_err() {
                break;
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_fix_endpoints_and_keep_sign() {
        for curve in [Curve::Linear, Curve::Exponential, Curve::Logarithmic, Curve::SCurve] {
            for amount in [0.0, 0.5, 1.0] {
                assert!(curve.apply(0.0, amount).abs() < 1e-6, "{curve:?}");
                assert!((curve.apply(1.0, amount) - 1.0).abs() < 1e-5, "{curve:?}");
                assert!((curve.apply(-1.0, amount) + 1.0).abs() < 1e-5, "{curve:?}");
                let mid = curve.apply(-0.3, amount);
                assert!(mid <= 0.0 && mid >= -1.0);
            }
        }
    }

    #[test]
    fn exponential_sags_logarithmic_bulges() {
        assert!(Curve::Exponential.apply(0.5, 1.0) < 0.5);
        assert!(Curve::Logarithmic.apply(0.5, 1.0) > 0.5);
        assert!(Curve::SCurve.apply(0.2, 1.0) < 0.2);
        assert!(Curve::SCurve.apply(0.8, 1.0) > 0.8);
    }

    #[test]
    fn connection_fields_are_clamped() {
        let c = ModulationConnection::new(SourceId::Lfo1, 0, 3.0)
            .with_smoothing_ms(1.0)
            .with_probability(f32::NAN)
            .with_curve(Curve::SCurve, -2.0);
        assert_eq!(c.depth, 1.0);
        assert_eq!(c.smoothing_ms, 20.0);
        assert_eq!(c.probability, 1.0);
        assert_eq!(c.curve_amount, 0.0);
        assert_eq!(ModulationConnection::new(SourceId::Lfo1, 0, f32::INFINITY).depth, 0.0);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut set = ConnectionSet::new();
        for i in 0..MAX_CONNECTIONS {
            assert_eq!(set.push(ModulationConnection::new(SourceId::Lfo2, 0, 0.1)), Ok(i));
        }
        assert_eq!(
            set.push(ModulationConnection::new(SourceId::Lfo2, 0, 0.1)),
            Err(ModulationError::TooManyConnections { max: MAX_CONNECTIONS })
        );
    }

    #[test]
    fn source_channels_are_checked() {
        let mut set = ConnectionSet::new();
        assert!(set.push(ModulationConnection::new(SourceId::ChaosAttractor, 0, 0.5).with_channel(2)).is_ok());
        assert!(matches!(
            set.push(ModulationConnection::new(SourceId::BrownianMotion, 0, 0.5).with_channel(1)),
            Err(ModulationError::InvalidSourceChannel { channel: 1, .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_destination() {
        let mut set = ConnectionSet::new();
        set.push(ModulationConnection::new(SourceId::Lfo1, 12, 0.5)).unwrap();
        assert_eq!(set.validate(12), Err(ModulationError::UnknownDestination(12)));
        assert_eq!(set.validate(13), Ok(()));
    }

    #[test]
    fn randomize_is_deterministic_and_in_range() {
        for density in [RandomDensity::Sparse, RandomDensity::Balanced, RandomDensity::Dense] {
            let a = ConnectionSet::randomize(density, 42, 12);
            assert_eq!(a, ConnectionSet::randomize(density, 42, 12));
            let (_, hi) = density.count_range();
            let (dmin, dmax) = density.depth_range();
            assert!(a.len() <= hi && !a.is_empty(), "{density:?}: {}", a.len());
            for c in a.connections() {
                assert!(c.destination < 12);
                assert!(c.depth.abs() >= dmin - 1e-6 && c.depth.abs() <= dmax + 1e-6);
                assert!((100.0..=500.0).contains(&c.smoothing_ms));
            }
        }
        assert!(ConnectionSet::randomize(RandomDensity::Dense, 1, 0).is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let mut set = ConnectionSet::randomize(RandomDensity::Dense, 9, 12);
        set.set_lfo(2, LfoSettings { shape: LfoWaveform::SampleAndHold, rate: LfoRate::Sync(NoteDivision::DottedEighth) });
        let json = serde_json::to_string(&set).unwrap();
        let back: ConnectionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn deserialize_enforces_capacity_and_clamps() {
        let one = r#"{"source":"lfo1","destination":3,"depth":9.0}"#;
        let json = format!(r#"{{"connections":[{one}]}}"#);
        let set: ConnectionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set.get(0).map(|c| c.depth), Some(1.0));
        assert_eq!(set.lfos(), &LfoSettings::DEFAULTS);

        let many = vec![one; MAX_CONNECTIONS + 1].join(",");
        let json = format!(r#"{{"connections":[{many}]}}"#);
        assert!(serde_json::from_str::<ConnectionSet>(&json).is_err());
    }
}
