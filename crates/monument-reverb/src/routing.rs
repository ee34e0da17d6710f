//! Named routings over the stage pool.

use monument_core::graph::{RoutingConfiguration, RoutingError};

use crate::stage::StageKind;

/// A named routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoutingPreset {
    /// The classic chain: Foundation, Pillars, Chambers, Weathering,
    /// Buttress, Facade.
    #[default]
    TraditionalCathedral,
    /// Early reflections straight into the tube network; no late field.
    MetallicGranular,
    /// Early reflections fed back into themselves, then the elastic hall,
    /// the core and the alien stage.
    ElasticFeedback,
    /// The core, the tubes and the elastic hall run side by side after the
    /// early reflections and are summed.
    ParallelWorlds,
    /// The alien stage recirculates the tail through itself.
    ShimmerInfinity,
    /// Alien and tube colouring ahead of the core.
    ImpossibleChaos,
    /// Elastic hall and modulation ahead of the core with a touch of
    /// crossfeed on the tail.
    OrganicBreathing,
    /// Early reflections only; no late field.
    MinimalSparse,
}

impl RoutingPreset {
    /// Every preset.
    pub const ALL: [RoutingPreset; 8] = [
        RoutingPreset::TraditionalCathedral,
        RoutingPreset::MetallicGranular,
        RoutingPreset::ElasticFeedback,
        RoutingPreset::ParallelWorlds,
        RoutingPreset::ShimmerInfinity,
        RoutingPreset::ImpossibleChaos,
        RoutingPreset::OrganicBreathing,
        RoutingPreset::MinimalSparse,
    ];

    /// Stable name.
    pub const fn name(self) -> &'static str {
        match self {
            RoutingPreset::TraditionalCathedral => "traditional_cathedral",
            RoutingPreset::MetallicGranular => "metallic_granular",
            RoutingPreset::ElasticFeedback => "elastic_feedback",
            RoutingPreset::ParallelWorlds => "parallel_worlds",
            RoutingPreset::ShimmerInfinity => "shimmer_infinity",
            RoutingPreset::ImpossibleChaos => "impossible_chaos",
            RoutingPreset::OrganicBreathing => "organic_breathing",
            RoutingPreset::MinimalSparse => "minimal_sparse",
        }
    }

    /// Inverse of [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Build the configuration. Presets are valid by construction; the
    /// `Result` is the builder's.
    pub fn build(self) -> Result<RoutingConfiguration, RoutingError> {
        use StageKind::*;

        let builder = RoutingConfiguration::builder()
            .series(Foundation.slot())
            .series(Pillars.slot());
        let builder = match self {
            RoutingPreset::TraditionalCathedral => builder
                .series(Chambers.slot())
                .series(Weathering.slot())
                .series(Buttress.slot()),
            RoutingPreset::MetallicGranular => builder.series(Tubes.slot()),
            RoutingPreset::ElasticFeedback => RoutingConfiguration::builder()
                .series(Foundation.slot())
                .feedback(Pillars.slot(), 0.3)
                .series(ElasticHallway.slot())
                .series(Chambers.slot())
                .series(AlienAmplification.slot()),
            RoutingPreset::ParallelWorlds => builder.parallel(&[
                (Chambers.slot(), 0.33),
                (Tubes.slot(), 0.33),
                (ElasticHallway.slot(), 0.34),
            ]),
            RoutingPreset::ShimmerInfinity => builder
                .series(Chambers.slot())
                .feedback(AlienAmplification.slot(), 0.4),
            RoutingPreset::ImpossibleChaos => builder
                .series(AlienAmplification.slot())
                .series(Tubes.slot())
                .series(Chambers.slot()),
            RoutingPreset::OrganicBreathing => builder
                .series(ElasticHallway.slot())
                .series(Weathering.slot())
                .series(Chambers.slot())
                .crossfeed(0.25),
            RoutingPreset::MinimalSparse => builder,
        };
        builder.series(Facade.slot()).build(StageKind::COUNT)
    }
}
