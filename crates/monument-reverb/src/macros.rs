//! Macro controls: a handful of high-level knobs blended onto the base
//! parameters.
//!
//! Every macro has a neutral default. The summed distance from neutral sets
//! a global influence `1 - exp(-4·Σ|Δ|)`: zero when every macro sits at its
//! default, saturating toward one as they move. Each macro-controlled
//! parameter is then `user + (derived - user)·influence`.
//!
//! ```rust
//! use monument_reverb::macros::{MacroBlender, MacroValues};
//! use monument_reverb::params::{PARAMS, PARAM_COUNT};
//!
//! let user: [f32; PARAM_COUNT] = core::array::from_fn(|i| PARAMS[i].default);
//! let out = MacroBlender::blend(&MacroValues::default(), &user);
//! assert_eq!(out, user);
//! ```

use libm::expf;
use monument_core::{ParamDescriptor, ParamId, lerp};

use crate::params::{
    AIR, BLOOM, DENSITY, DRIFT, GRAVITY, MASS, PARAM_COUNT, PARAMS, TIME, WARP,
};

/// Material: stone-like density and long, dark decays.
pub const MATERIAL: ParamId = ParamId(0);
/// Topology: how far the feedback matrix warps.
pub const TOPOLOGY: ParamId = ParamId(1);
/// Viscosity: thickness of the air; darker, shorter.
pub const VISCOSITY: ParamId = ParamId(2);
/// Evolution: bloom and slow movement.
pub const EVOLUTION: ParamId = ParamId(3);
/// Chaos: irregular motion.
pub const CHAOS: ParamId = ParamId(4);
/// Elasticity: loosens the low-end containment.
pub const ELASTICITY: ParamId = ParamId(5);

/// Number of macros.
pub const MACRO_COUNT: usize = 6;

/// Macro table. Macros are applied at block rate; the base parameters they
/// drive carry their own smoothing.
pub static MACROS: [ParamDescriptor; MACRO_COUNT] = [
    ParamDescriptor::normalized(MATERIAL, "Material", "Matl", "material", 0.5, 0.0),
    ParamDescriptor::normalized(TOPOLOGY, "Topology", "Topo", "topology", 0.5, 0.0),
    ParamDescriptor::normalized(VISCOSITY, "Viscosity", "Visc", "viscosity", 0.5, 0.0),
    ParamDescriptor::normalized(EVOLUTION, "Evolution", "Evol", "evolution", 0.5, 0.0),
    ParamDescriptor::normalized(CHAOS, "Chaos", "Chaos", "chaos", 0.0, 0.0),
    ParamDescriptor::normalized(ELASTICITY, "Elasticity", "Elast", "elasticity", 0.0, 0.0),
];

const INFLUENCE_RATE: f32 = 4.0;

/// A full set of macro positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroValues(pub [f32; MACRO_COUNT]);

impl Default for MacroValues {
    fn default() -> Self {
        Self(core::array::from_fn(|i| MACROS[i].default))
    }
}

impl MacroValues {
    /// Value of one macro. Unknown ids read as 0.
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.0.get(id.index()).copied().unwrap_or(0.0)
    }

    /// Set one macro, clamped to [0, 1]. Non-finite values become the
    /// macro's default.
    pub fn set(&mut self, id: ParamId, value: f32) {
        if let Some(slot) = self.0.get_mut(id.index()) {
            *slot = if value.is_finite() { value.clamp(0.0, 1.0) } else { MACROS[id.index()].default };
        }
    }
}

/// Macro-derived targets and the influence they are applied with. Computed
/// once per block, applied per parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroBlend {
    influence: f32,
    derived: [Option<f32>; PARAM_COUNT],
}

impl MacroBlend {
    /// Global influence in `[0, 1)`.
    #[inline]
    pub fn influence(&self) -> f32 {
        self.influence
    }

    /// Macro-derived target for a parameter, or `None` if no macro drives it.
    #[inline]
    pub fn derived(&self, id: ParamId) -> Option<f32> {
        self.derived.get(id.index()).copied().flatten()
    }

    /// Blend a user value for `id`. Parameters without a macro pass through.
    #[inline]
    pub fn apply(&self, id: ParamId, user: f32) -> f32 {
        match self.derived(id) {
            Some(derived) => (user + (derived - user) * self.influence).clamp(0.0, 1.0),
            None => user,
        }
    }
}

/// Weighted combination of two macro opinions around a neutral base.
#[inline]
fn combine(base: f32, a: f32, wa: f32, b: f32, wb: f32) -> f32 {
    let total = wa + wb;
    (base + (a - base) * wa / total + (b - base) * wb / total).clamp(0.0, 1.0)
}

/// Pure mapping from macros to base-parameter targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroBlender;

impl MacroBlender {
    /// Influence for a macro set: `1 - exp(-4·Σ|macro - default|)`.
    pub fn influence(macros: &MacroValues) -> f32 {
        let total: f32 = macros
            .0
            .iter()
            .zip(&MACROS)
            .map(|(v, desc)| (v - desc.default).abs())
            .sum();
        1.0 - expf(-INFLUENCE_RATE * total)
    }

    /// Derived targets plus influence.
    pub fn compute(macros: &MacroValues) -> MacroBlend {
        let material = macros.get(MATERIAL);
        let topology = macros.get(TOPOLOGY);
        let viscosity = macros.get(VISCOSITY);
        let evolution = macros.get(EVOLUTION);
        let chaos = macros.get(CHAOS);
        let elasticity = macros.get(ELASTICITY);

        let mut derived = [None; PARAM_COUNT];
        let default = |id: ParamId| PARAMS[id.index()].default;

        derived[TIME.index()] = Some(combine(
            default(TIME),
            lerp(0.3, 0.8, material),
            0.6,
            lerp(0.6, 0.4, viscosity),
            0.4,
        ));
        derived[MASS.index()] = Some(combine(
            default(MASS),
            lerp(0.2, 0.9, material),
            0.7,
            lerp(0.0, 0.3, viscosity),
            0.3,
        ));
        derived[DENSITY.index()] = Some(lerp(0.25, 0.95, material));
        derived[BLOOM.index()] = Some(evolution);
        derived[AIR.index()] = Some(lerp(0.8, 0.2, viscosity));
        derived[WARP.index()] =
            Some(combine(default(WARP), topology, 0.75, lerp(0.0, 0.3, chaos), 0.25));
        derived[DRIFT.index()] = Some(
            (0.5 * lerp(0.0, 0.4, topology)
                + 0.3 * lerp(0.0, 0.35, evolution)
                + 0.2 * lerp(0.0, 0.5, chaos))
            .clamp(0.0, 1.0),
        );
        derived[GRAVITY.index()] = Some(lerp(0.5, 0.2, elasticity));

        MacroBlend { influence: Self::influence(macros), derived }
    }

    /// Blend a full user parameter vector. Deterministic and side-effect free.
    pub fn blend(macros: &MacroValues, user: &[f32; PARAM_COUNT]) -> [f32; PARAM_COUNT] {
        let blend = Self::compute(macros);
        core::array::from_fn(|i| blend.apply(PARAMS[i].id, user[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FREEZE, MIX, PILLAR_SHAPE, WIDTH};

    fn user() -> [f32; PARAM_COUNT] {
        core::array::from_fn(|i| (i as f32 * 0.071 + 0.1).fract())
    }

    #[test]
    fn neutral_macros_leave_user_values() {
        let u = user();
        assert_eq!(MacroBlender::influence(&MacroValues::default()), 0.0);
        assert_eq!(MacroBlender::blend(&MacroValues::default(), &u), u);
    }

    #[test]
    fn influence_grows_and_saturates() {
        let mut m = MacroValues::default();
        m.set(MATERIAL, 0.6);
        let small = MacroBlender::influence(&m);
        m.set(MATERIAL, 1.0);
        let large = MacroBlender::influence(&m);
        assert!(small > 0.0 && large > small && large < 1.0);

        let all_max = MacroValues([1.0; MACRO_COUNT]);
        assert!(MacroBlender::influence(&all_max) > 0.999);
    }

    #[test]
    fn unmapped_parameters_pass_through() {
        let u = user();
        let out = MacroBlender::blend(&MacroValues([1.0; MACRO_COUNT]), &u);
        for id in [WIDTH, MIX, PILLAR_SHAPE, FREEZE] {
            assert_eq!(out[id.index()], u[id.index()]);
        }
    }

    #[test]
    fn material_lengthens_and_darkens() {
        let u: [f32; PARAM_COUNT] = core::array::from_fn(|i| PARAMS[i].default);
        let mut m = MacroValues::default();
        m.set(MATERIAL, 1.0);
        let out = MacroBlender::blend(&m, &u);
        assert!(out[TIME.index()] > u[TIME.index()]);
        assert!(out[MASS.index()] > u[MASS.index()]);
        assert!(out[DENSITY.index()] > u[DENSITY.index()]);
    }

    #[test]
    fn elasticity_loosens_gravity() {
        let blend = MacroBlender::compute(&MacroValues([0.5, 0.5, 0.5, 0.5, 0.0, 1.0]));
        assert!((blend.derived(GRAVITY).unwrap_or(1.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn deterministic() {
        let m = MacroValues([0.1, 0.9, 0.3, 0.7, 0.4, 0.2]);
        let u = user();
        assert_eq!(MacroBlender::blend(&m, &u), MacroBlender::blend(&m, &u));
    }

    #[test]
    fn outputs_in_range() {
        for &v in &[0.0, 0.25, 0.5, 0.75, 1.0] {
            let m = MacroValues([v; MACRO_COUNT]);
            for x in MacroBlender::blend(&m, &user()) {
                assert!((0.0..=1.0).contains(&x));
            }
        }
    }

    #[test]
    fn non_finite_macro_becomes_default() {
        let mut m = MacroValues::default();
        m.set(CHAOS, f32::NAN);
        assert_eq!(m.get(CHAOS), 0.0);
        m.set(ParamId(99), 1.0);
        assert_eq!(m, MacroValues::default());
    }
}
