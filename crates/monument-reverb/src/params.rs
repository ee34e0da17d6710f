//! Parameter table for the monument reverb.
//!
//! Every parameter is normalized to `[0, 1]`. Identifiers are stable across
//! versions: saved state stores values by `string_id`, hosts address them by
//! [`ParamId`].

use monument_core::{ParamDescriptor, ParamId};

/// Feedback amount (decay length).
pub const TIME: ParamId = ParamId(0);
/// Per-line high-frequency damping ("darkness").
pub const MASS: ParamId = ParamId(1);
/// Diffusion strength, input gain and early-reflection density.
pub const DENSITY: ParamId = ParamId(2);
/// Plateau envelope on the late field.
pub const BLOOM: ParamId = ParamId(3);
/// High-shelf brightness at the output.
pub const AIR: ParamId = ParamId(4);
/// Stereo width.
pub const WIDTH: ParamId = ParamId(5);
/// Wet/dry balance.
pub const MIX: ParamId = ParamId(6);
/// Feedback-matrix blend (Hadamard to Householder).
pub const WARP: ParamId = ParamId(7);
/// Slow delay-length modulation.
pub const DRIFT: ParamId = ParamId(8);
/// Low-end containment inside the loop.
pub const GRAVITY: ParamId = ParamId(9);
/// Early-reflection spacing (compressed to expanded).
pub const PILLAR_SHAPE: ParamId = ParamId(10);
/// Infinite sustain (stepped, on at `>= 0.5`).
pub const FREEZE: ParamId = ParamId(11);

/// Number of parameters.
pub const PARAM_COUNT: usize = 12;

/// Descriptor table, indexed by `ParamId::index()`.
pub static PARAMS: [ParamDescriptor; PARAM_COUNT] = [
    ParamDescriptor::normalized(TIME, "Time", "Time", "time", 0.55, 40.0),
    ParamDescriptor::normalized(MASS, "Mass", "Mass", "mass", 0.5, 60.0),
    ParamDescriptor::normalized(DENSITY, "Density", "Dens", "density", 0.5, 30.0),
    ParamDescriptor::normalized(BLOOM, "Bloom", "Bloom", "bloom", 0.5, 40.0),
    ParamDescriptor::normalized(AIR, "Air", "Air", "air", 0.5, 30.0),
    ParamDescriptor::normalized(WIDTH, "Width", "Width", "width", 0.5, 30.0),
    ParamDescriptor::normalized(MIX, "Mix", "Mix", "mix", 0.5, 20.0),
    ParamDescriptor::normalized(WARP, "Warp", "Warp", "warp", 0.0, 80.0),
    ParamDescriptor::normalized(DRIFT, "Drift", "Drift", "drift", 0.0, 80.0),
    ParamDescriptor::normalized(GRAVITY, "Gravity", "Grav", "gravity", 0.5, 80.0),
    ParamDescriptor::normalized(PILLAR_SHAPE, "Pillar Shape", "Shape", "pillar_shape", 0.5, 40.0),
    ParamDescriptor::stepped(FREEZE, "Freeze", "Frz", "freeze", 0.0),
];

/// Look up a descriptor by its stable string id.
pub fn by_string_id(string_id: &str) -> Option<&'static ParamDescriptor> {
    PARAMS.iter().find(|d| d.string_id == string_id)
}

/// Look up a descriptor by id.
pub fn descriptor(id: ParamId) -> Option<&'static ParamDescriptor> {
    PARAMS.get(id.index())
}
