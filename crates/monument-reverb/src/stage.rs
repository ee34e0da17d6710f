//! The closed set of stages a routing can reference.
//!
//! One instance of each kind lives in the graph's pool at the slot given by
//! [`StageKind::slot`]. Dispatch is a `match`, not a vtable: the set is known
//! up front and every variant is prepared before audio starts.

use monument_core::graph::StageSlot;
use monument_core::{AudioBlock, BlockParams, ProcessingStage};

use crate::{
    AlienAmplification, Buttress, ElasticHallway, Facade, Foundation, Pillars, ReverberationCore,
    TubeRayTracer, Weathering,
};

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

/// Stage identity. Discriminants are pool slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StageKind {
    /// Input conditioning.
    Foundation = 0,
    /// Early reflections.
    Pillars = 1,
    /// The feedback delay network.
    Chambers = 2,
    /// Slow modulated delay.
    Weathering = 3,
    /// Resonant tube network.
    Tubes = 4,
    /// Pressure-dependent room modes.
    ElasticHallway = 5,
    /// Phase rotation, paradox resonance, drifting absorption.
    AlienAmplification = 6,
    /// Soft containment.
    Buttress = 7,
    /// Air, width, mix.
    Facade = 8,
}

impl StageKind {
    /// Every kind, in slot order.
    pub const ALL: [StageKind; 9] = [
        StageKind::Foundation,
        StageKind::Pillars,
        StageKind::Chambers,
        StageKind::Weathering,
        StageKind::Tubes,
        StageKind::ElasticHallway,
        StageKind::AlienAmplification,
        StageKind::Buttress,
        StageKind::Facade,
    ];

    /// Pool size.
    pub const COUNT: usize = Self::ALL.len();

    /// Slot in the graph pool.
    #[inline]
    pub const fn slot(self) -> StageSlot {
        StageSlot(self as u8)
    }

    /// Kind stored at a slot.
    pub fn from_slot(slot: StageSlot) -> Option<Self> {
        Self::ALL.get(slot.index()).copied()
    }

    /// Lowercase name, stable across versions.
    pub const fn name(self) -> &'static str {
        match self {
            StageKind::Foundation => "foundation",
            StageKind::Pillars => "pillars",
            StageKind::Chambers => "chambers",
            StageKind::Weathering => "weathering",
            StageKind::Tubes => "tubes",
            StageKind::ElasticHallway => "elastic_hallway",
            StageKind::AlienAmplification => "alien_amplification",
            StageKind::Buttress => "buttress",
            StageKind::Facade => "facade",
        }
    }

    /// Inverse of [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A pool stage.
#[derive(Debug, Clone)]
pub enum Stage {
    /// See [`Foundation`].
    Foundation(Foundation),
    /// See [`Pillars`].
    Pillars(Pillars),
    /// See [`ReverberationCore`].
    Chambers(Box<ReverberationCore>),
    /// See [`Weathering`].
    Weathering(Weathering),
    /// See [`TubeRayTracer`].
    Tubes(Box<TubeRayTracer>),
    /// See [`ElasticHallway`].
    ElasticHallway(ElasticHallway),
    /// See [`AlienAmplification`].
    AlienAmplification(AlienAmplification),
    /// See [`Buttress`].
    Buttress(Buttress),
    /// See [`Facade`].
    Facade(Facade),
}

impl Stage {
    /// Construct a fresh stage of `kind`.
    pub fn new(kind: StageKind, sample_rate: f32, max_block: usize) -> Self {
        match kind {
            StageKind::Foundation => Stage::Foundation(Foundation::new(sample_rate)),
            StageKind::Pillars => Stage::Pillars(Pillars::new(sample_rate)),
            StageKind::Chambers => Stage::Chambers(Box::new(ReverberationCore::new(sample_rate))),
            StageKind::Weathering => Stage::Weathering(Weathering::new(sample_rate)),
            StageKind::Tubes => Stage::Tubes(Box::new(TubeRayTracer::new(sample_rate))),
            StageKind::ElasticHallway => Stage::ElasticHallway(ElasticHallway::new(sample_rate)),
            StageKind::AlienAmplification => Stage::AlienAmplification(AlienAmplification::new(sample_rate)),
            StageKind::Buttress => Stage::Buttress(Buttress::new()),
            StageKind::Facade => Stage::Facade(Facade::new(sample_rate, max_block)),
        }
    }

    /// The full pool in slot order.
    pub fn pool(sample_rate: f32, max_block: usize) -> Vec<Stage> {
        StageKind::ALL.into_iter().map(|k| Stage::new(k, sample_rate, max_block)).collect()
    }

    /// This stage's kind.
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Foundation(_) => StageKind::Foundation,
            Stage::Pillars(_) => StageKind::Pillars,
            Stage::Chambers(_) => StageKind::Chambers,
            Stage::Weathering(_) => StageKind::Weathering,
            Stage::Tubes(_) => StageKind::Tubes,
            Stage::ElasticHallway(_) => StageKind::ElasticHallway,
            Stage::AlienAmplification(_) => StageKind::AlienAmplification,
            Stage::Buttress(_) => StageKind::Buttress,
            Stage::Facade(_) => StageKind::Facade,
        }
    }

    /// The reverberation core, if this is the Chambers stage.
    pub fn as_chambers_mut(&mut self) -> Option<&mut ReverberationCore> {
        match self {
            Stage::Chambers(core) => Some(&mut **core),
            _ => None,
        }
    }

    /// The reverberation core, if this is the Chambers stage.
    pub fn as_chambers(&self) -> Option<&ReverberationCore> {
        match self {
            Stage::Chambers(core) => Some(&**core),
            _ => None,
        }
    }

    /// The output stage, if this is Facade.
    pub fn as_facade_mut(&mut self) -> Option<&mut Facade> {
        match self {
            Stage::Facade(facade) => Some(facade),
            _ => None,
        }
    }

    /// The input stage, if this is Foundation.
    pub fn as_foundation_mut(&mut self) -> Option<&mut Foundation> {
        match self {
            Stage::Foundation(foundation) => Some(foundation),
            _ => None,
        }
    }

    /// The tube network, if this is the Tubes stage.
    pub fn as_tubes(&self) -> Option<&TubeRayTracer> {
        match self {
            Stage::Tubes(tubes) => Some(&**tubes),
            _ => None,
        }
    }

    /// The saturation stage, if this is Buttress.
    pub fn as_buttress_mut(&mut self) -> Option<&mut Buttress> {
        match self {
            Stage::Buttress(buttress) => Some(buttress),
            _ => None,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $s:ident => $body:expr) => {
        match $self {
            Stage::Foundation($s) => $body,
            Stage::Pillars($s) => $body,
            Stage::Chambers($s) => $body,
            Stage::Weathering($s) => $body,
            Stage::Tubes($s) => $body,
            Stage::ElasticHallway($s) => $body,
            Stage::AlienAmplification($s) => $body,
            Stage::Buttress($s) => $body,
            Stage::Facade($s) => $body,
        }
    };
}

impl ProcessingStage for Stage {
    fn prepare(&mut self, sample_rate: f32, max_block: usize, channels: usize) {
        dispatch!(self, s => s.prepare(sample_rate, max_block, channels));
    }

    #[inline]
    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        dispatch!(self, s => s.process(block, params));
    }

    fn reset(&mut self) {
        dispatch!(self, s => s.reset());
    }

    fn latency_samples(&self) -> usize {
        dispatch!(self, s => s.latency_samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_in_slot_order() {
        let pool = Stage::pool(48000.0, 256);
        assert_eq!(pool.len(), StageKind::COUNT);
        for (i, stage) in pool.iter().enumerate() {
            assert_eq!(stage.kind().slot().index(), i);
            assert_eq!(StageKind::from_slot(StageSlot(i as u8)), Some(stage.kind()));
        }
        assert_eq!(StageKind::from_slot(StageSlot(StageKind::COUNT as u8)), None);
    }

    #[test]
    fn names_round_trip() {
        for kind in StageKind::ALL {
            assert_eq!(StageKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StageKind::from_name("nave"), None);
    }

    #[test]
    fn accessors_match_variant() {
        let mut pool = Stage::pool(48000.0, 256);
        assert!(pool[StageKind::Chambers.slot().index()].as_chambers_mut().is_some());
        assert!(pool[StageKind::Facade.slot().index()].as_facade_mut().is_some());
        assert!(pool[StageKind::Foundation.slot().index()].as_chambers_mut().is_none());
        assert!(pool[StageKind::Tubes.slot().index()].as_tubes().is_some());
    }

    #[test]
    fn slots_follow_signal_order() {
        let slots: Vec<u8> = StageKind::ALL.iter().map(|k| k.slot().0).collect();
        assert_eq!(slots, (0..StageKind::COUNT as u8).collect::<Vec<_>>());
        assert_eq!(StageKind::Tubes.slot(), StageSlot(4));
        assert_eq!(StageKind::Facade.slot(), StageSlot(8));
    }

    #[test]
    fn all_stages_are_zero_latency() {
        let pool = Stage::pool(48000.0, 256);
        assert!(pool.iter().all(|s| s.latency_samples() == 0));
    }
}
