//! Engine configuration.

use monument_core::graph::{DEFAULT_CROSSFADE_MS, MIN_CROSSFADE_MS};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Construction-time settings.
///
/// ```rust
/// use monument_engine::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{"sample_rate": 44100.0}"#).unwrap();
/// assert_eq!(config.max_block, 512);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Largest block the engine processes at once. Longer host blocks are
    /// split.
    pub max_block: usize,
    /// 1 (mono) or 2 (stereo).
    pub channels: usize,
    /// Full routing switch window (fade out plus fade in) in ms. At least
    /// [`MIN_CROSSFADE_MS`].
    pub crossfade_ms: f32,
    /// Settled blocks before a parameter lane is delivered as a constant.
    pub stable_blocks: u32,
    /// Seed for the stochastic modulation sources.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_block: 512,
            channels: 2,
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            stable_blocks: 4,
            seed: 0x4d4f_4e55,
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::InvalidConfig("sample rate must be positive"));
        }
        if self.max_block == 0 {
            return Err(EngineError::InvalidConfig("max block must be non-zero"));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(EngineError::InvalidConfig("channels must be 1 or 2"));
        }
        if !self.crossfade_ms.is_finite() || self.crossfade_ms < MIN_CROSSFADE_MS {
            return Err(EngineError::InvalidConfig("crossfade must be at least 1 ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            EngineConfig { sample_rate: 0.0, ..Default::default() },
            EngineConfig { sample_rate: f32::NAN, ..Default::default() },
            EngineConfig { max_block: 0, ..Default::default() },
            EngineConfig { channels: 3, ..Default::default() },
            EngineConfig { channels: 0, ..Default::default() },
            EngineConfig { crossfade_ms: -1.0, ..Default::default() },
            EngineConfig { crossfade_ms: 0.0, ..Default::default() },
            EngineConfig { crossfade_ms: 0.5, ..Default::default() },
            EngineConfig { crossfade_ms: f32::INFINITY, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))), "{config:?}");
        }
    }

    #[test]
    fn shortest_crossfade_is_accepted() {
        let config = EngineConfig { crossfade_ms: MIN_CROSSFADE_MS, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_round_trip() {
        let config = EngineConfig { channels: 1, seed: 99, ..Default::default() };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<EngineConfig>(&json).unwrap(), config);
    }
}
