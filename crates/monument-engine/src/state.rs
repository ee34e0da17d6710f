//! The opaque state blob.
//!
//! State is JSON so it survives parameter reordering and can be inspected:
//!
//! ```json
//! {
//!   "version": 1,
//!   "seed": 1297043029,
//!   "params": { "time": 0.55, "mass": 0.5 },
//!   "macros": { "material": 0.5 },
//!   "routing": { "type": "preset", "name": "traditional_cathedral" },
//!   "connections": { "connections": [], "lfos": [] }
//! }
//! ```
//!
//! Parameters and macros are keyed by their stable string ids. Unknown keys
//! are skipped and missing ones fall back to defaults, so older blobs load
//! into newer builds.

use std::collections::BTreeMap;

use monument_core::graph::{ParallelBranches, RouteStep, RoutingConfiguration, RoutingError, StageSlot};
use monument_modulation::ConnectionSet;
use monument_reverb::{RoutingPreset, StageKind};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Newest state format this build writes and reads.
pub const STATE_VERSION: u32 = 1;

/// What the engine is routed through: a named preset or a custom layout.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingSpec {
    /// One of the built-in routings.
    Preset(RoutingPreset),
    /// A caller-built configuration over the stage pool.
    Custom(RoutingConfiguration),
}

impl Default for RoutingSpec {
    fn default() -> Self {
        Self::Preset(RoutingPreset::default())
    }
}

impl From<RoutingPreset> for RoutingSpec {
    fn from(preset: RoutingPreset) -> Self {
        Self::Preset(preset)
    }
}

impl From<RoutingConfiguration> for RoutingSpec {
    fn from(config: RoutingConfiguration) -> Self {
        Self::Custom(config)
    }
}

impl RoutingSpec {
    /// Build and validate against the stage pool.
    pub fn build(&self) -> Result<RoutingConfiguration, RoutingError> {
        match self {
            Self::Preset(preset) => preset.build(),
            Self::Custom(config) => {
                config.validate(StageKind::COUNT)?;
                Ok(config.clone())
            }
        }
    }
}

/// One branch of a parallel step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchState {
    /// Stage name.
    pub stage: String,
    /// Branch gain.
    pub gain: f32,
}

/// Serialized [`RouteStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepState {
    /// See [`RouteStep::Series`].
    Series {
        /// Stage name.
        stage: String,
    },
    /// See [`RouteStep::Parallel`].
    Parallel {
        /// Branches.
        branches: Vec<BranchState>,
    },
    /// See [`RouteStep::ParallelMix`].
    ParallelMix {
        /// Branches.
        branches: Vec<BranchState>,
        /// Level of the bus kept under the branches.
        dry: f32,
    },
    /// See [`RouteStep::Feedback`].
    Feedback {
        /// Stage name.
        stage: String,
        /// Loop gain.
        gain: f32,
    },
    /// See [`RouteStep::Crossfeed`].
    Crossfeed {
        /// Amount.
        amount: f32,
    },
}

/// Serialized [`RoutingSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingState {
    /// A preset by name.
    Preset {
        /// Preset name.
        name: String,
    },
    /// A custom layout.
    Custom {
        /// Ordered steps.
        steps: Vec<StepState>,
        /// Names of bypassed stages.
        #[serde(default)]
        bypass: Vec<String>,
    },
}

fn stage_name(slot: StageSlot) -> String {
    StageKind::from_slot(slot).map_or_else(|| slot.to_string(), |kind| kind.name().to_owned())
}

fn stage_slot(name: &str) -> Result<StageSlot, EngineError> {
    StageKind::from_name(name)
        .map(StageKind::slot)
        .ok_or_else(|| EngineError::UnknownName { kind: "stage", name: name.to_owned() })
}

fn branch_states(branches: &ParallelBranches) -> Vec<BranchState> {
    branches.iter().map(|(slot, gain)| BranchState { stage: stage_name(slot), gain }).collect()
}

fn branch_slots(branches: &[BranchState]) -> Result<Vec<(StageSlot, f32)>, EngineError> {
    branches.iter().map(|b| Ok((stage_slot(&b.stage)?, b.gain))).collect()
}

impl From<&RoutingSpec> for RoutingState {
    fn from(spec: &RoutingSpec) -> Self {
        match spec {
            RoutingSpec::Preset(preset) => Self::Preset { name: preset.name().to_owned() },
            RoutingSpec::Custom(config) => Self::Custom {
                steps: config
                    .steps()
                    .iter()
                    .map(|step| match *step {
                        RouteStep::Series(slot) => StepState::Series { stage: stage_name(slot) },
                        RouteStep::Parallel(branches) => StepState::Parallel { branches: branch_states(&branches) },
                        RouteStep::ParallelMix { branches, dry } => {
                            StepState::ParallelMix { branches: branch_states(&branches), dry }
                        }
                        RouteStep::Feedback { stage, gain } => {
                            StepState::Feedback { stage: stage_name(stage), gain }
                        }
                        RouteStep::Crossfeed(amount) => StepState::Crossfeed { amount },
                    })
                    .collect(),
                bypass: StageKind::ALL
                    .into_iter()
                    .filter(|kind| config.is_bypassed(kind.slot()))
                    .map(|kind| kind.name().to_owned())
                    .collect(),
            },
        }
    }
}

impl TryFrom<&RoutingState> for RoutingSpec {
    type Error = EngineError;

    fn try_from(state: &RoutingState) -> Result<Self, Self::Error> {
        match state {
            RoutingState::Preset { name } => RoutingPreset::from_name(name)
                .map(RoutingSpec::Preset)
                .ok_or_else(|| EngineError::UnknownName { kind: "routing preset", name: name.clone() }),
            RoutingState::Custom { steps, bypass } => {
                let mut builder = RoutingConfiguration::builder();
                for step in steps {
                    builder = match step {
                        StepState::Series { stage } => builder.series(stage_slot(stage)?),
                        StepState::Parallel { branches } => builder.parallel(&branch_slots(branches)?),
                        StepState::ParallelMix { branches, dry } => {
                            builder.parallel_mix(&branch_slots(branches)?, *dry)
                        }
                        StepState::Feedback { stage, gain } => builder.feedback(stage_slot(stage)?, *gain),
                        StepState::Crossfeed { amount } => builder.crossfeed(*amount),
                    };
                }
                for name in bypass {
                    builder = builder.bypass(stage_slot(name)?);
                }
                Ok(RoutingSpec::Custom(builder.build(StageKind::COUNT)?))
            }
        }
    }
}

/// Everything needed to reproduce the engine's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    /// Format version.
    pub version: u32,
    /// Modulation RNG seed.
    pub seed: u64,
    /// Parameter targets by string id.
    pub params: BTreeMap<String, f32>,
    /// Macro positions by string id.
    pub macros: BTreeMap<String, f32>,
    /// Active routing.
    pub routing: RoutingState,
    /// Published modulation connections and LFO settings.
    pub connections: ConnectionSet,
}

impl EngineState {
    /// Encode as JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode JSON bytes and check the version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let state: Self = serde_json::from_slice(bytes)?;
        if state.version > STATE_VERSION {
            return Err(EngineError::VersionMismatch { found: state.version, supported: STATE_VERSION });
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom() -> RoutingConfiguration {
        RoutingConfiguration::builder()
            .series(StageKind::Foundation.slot())
            .parallel(&[(StageKind::Chambers.slot(), 0.6), (StageKind::Pillars.slot(), 0.4)])
            .feedback(StageKind::Weathering.slot(), 0.2)
            .crossfeed(0.1)
            .series(StageKind::Facade.slot())
            .bypass(StageKind::Weathering.slot())
            .build(StageKind::COUNT)
            .unwrap()
    }

    #[test]
    fn dry_share_survives_a_round_trip() {
        let config = RoutingConfiguration::builder()
            .series(StageKind::Foundation.slot())
            .parallel_mix(&[(StageKind::Tubes.slot(), 0.5), (StageKind::ElasticHallway.slot(), 0.5)], 0.3)
            .series(StageKind::Facade.slot())
            .build(StageKind::COUNT)
            .unwrap();
        let spec = RoutingSpec::Custom(config);
        let state = RoutingState::from(&spec);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"step\":\"parallel_mix\""), "{json}");
        assert!(json.contains("\"stage\":\"tubes\""), "{json}");
        let back: RoutingState = serde_json::from_str(&json).unwrap();
        assert_eq!(RoutingSpec::try_from(&back).unwrap(), spec);
    }

    #[test]
    fn presets_round_trip_by_name() {
        for preset in RoutingPreset::ALL {
            let spec = RoutingSpec::Preset(preset);
            let state = RoutingState::from(&spec);
            assert_eq!(RoutingSpec::try_from(&state).unwrap(), spec);
        }
    }

    #[test]
    fn custom_routing_round_trips() {
        let spec = RoutingSpec::Custom(custom());
        let state = RoutingState::from(&spec);
        let json = serde_json::to_string(&state).unwrap();
        let back: RoutingState = serde_json::from_str(&json).unwrap();
        assert_eq!(RoutingSpec::try_from(&back).unwrap(), spec);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let state = RoutingState::Preset { name: "basilica".into() };
        assert!(matches!(RoutingSpec::try_from(&state), Err(EngineError::UnknownName { .. })));

        let state = RoutingState::Custom {
            steps: vec![StepState::Series { stage: "crypt".into() }],
            bypass: vec![],
        };
        assert!(matches!(RoutingSpec::try_from(&state), Err(EngineError::UnknownName { .. })));
    }

    #[test]
    fn invalid_custom_routing_is_rejected() {
        let state = RoutingState::Custom {
            steps: vec![
                StepState::Series { stage: "pillars".into() },
                StepState::Series { stage: "pillars".into() },
            ],
            bypass: vec![],
        };
        assert!(matches!(
            RoutingSpec::try_from(&state),
            Err(EngineError::Routing(RoutingError::DuplicateStage(_)))
        ));
    }

    #[test]
    fn newer_version_is_refused() {
        let state = EngineState {
            version: STATE_VERSION + 1,
            seed: 0,
            params: BTreeMap::new(),
            macros: BTreeMap::new(),
            routing: RoutingState::from(&RoutingSpec::default()),
            connections: ConnectionSet::new(),
        };
        let bytes = serde_json::to_vec(&state).unwrap();
        assert!(matches!(
            EngineState::from_bytes(&bytes),
            Err(EngineError::VersionMismatch { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(EngineState::from_bytes(b"not json"), Err(EngineError::StateDecode(_))));
    }
}
