//! Parameter metadata for host integration.
//!
//! Every engine parameter lives on the normalized range `[0, 1]`. A
//! [`ParamDescriptor`] carries what a host wrapper needs to expose it
//! (stable id, display names, default) plus the smoothing time the
//! [`ParameterDistributor`](crate::ParameterDistributor) ramps it with.
//!
//! # Example
//!
//! ```rust
//! use monument_core::{ParamDescriptor, ParamFlags, ParamId};
//!
//! const TIME: ParamDescriptor = ParamDescriptor::normalized(ParamId(0), "Time", "Time", "time", 0.55, 40.0);
//!
//! assert_eq!(TIME.clamp(1.5), 1.0);
//! assert!(TIME.flags.contains(ParamFlags::AUTOMATABLE));
//! ```

/// Stable numeric parameter identifier.
///
/// Used as the index into distributor lanes and as the key for host
/// automation and state blobs. Once assigned, a `ParamId` must never change
/// for a given parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub u32);

impl ParamId {
    /// Lane index for this id.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parameter capability flags for host communication.
///
/// Use [`union`](Self::union) to combine.
///
/// ```rust
/// use monument_core::ParamFlags;
///
/// let flags = ParamFlags::AUTOMATABLE.union(ParamFlags::STEPPED);
/// assert!(flags.contains(ParamFlags::STEPPED));
/// assert!(!flags.contains(ParamFlags::MODULATABLE));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamFlags(u8);

impl ParamFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Host can automate this parameter.
    pub const AUTOMATABLE: Self = Self(1 << 0);
    /// Parameter has discrete steps and is never ramped.
    pub const STEPPED: Self = Self(1 << 1);
    /// Parameter accepts modulation-router offsets.
    pub const MODULATABLE: Self = Self(1 << 2);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for ParamFlags {
    fn default() -> Self {
        Self::AUTOMATABLE
    }
}

/// Describes one normalized parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Stable identifier; also the distributor lane index.
    pub id: ParamId,
    /// Full display name (e.g. "Time").
    pub name: &'static str,
    /// Short name, at most 8 characters, for hardware displays.
    pub short_name: &'static str,
    /// Stable string key used in state blobs.
    pub string_id: &'static str,
    /// Default normalized value.
    pub default: f32,
    /// Ramp length used by the distributor. Zero means the value steps.
    pub smoothing_ms: f32,
    /// Capability flags.
    pub flags: ParamFlags,
}

impl ParamDescriptor {
    /// A continuous, automatable, modulatable parameter on `[0, 1]`.
    pub const fn normalized(
        id: ParamId,
        name: &'static str,
        short_name: &'static str,
        string_id: &'static str,
        default: f32,
        smoothing_ms: f32,
    ) -> Self {
        Self {
            id,
            name,
            short_name,
            string_id,
            default,
            smoothing_ms,
            flags: ParamFlags::AUTOMATABLE.union(ParamFlags::MODULATABLE),
        }
    }

    /// A stepped (switch-like) parameter: no ramp, no modulation.
    pub const fn stepped(
        id: ParamId,
        name: &'static str,
        short_name: &'static str,
        string_id: &'static str,
        default: f32,
    ) -> Self {
        Self {
            id,
            name,
            short_name,
            string_id,
            default,
            smoothing_ms: 0.0,
            flags: ParamFlags::AUTOMATABLE.union(ParamFlags::STEPPED),
        }
    }

    /// Lower bound of the normalized range.
    pub const MIN: f32 = 0.0;
    /// Upper bound of the normalized range.
    pub const MAX: f32 = 1.0;

    /// Clamp a requested value into range. Non-finite input maps to the default.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(Self::MIN, Self::MAX)
        } else {
            self.default
        }
    }

    /// Whether the modulation router may offset this parameter.
    #[inline]
    pub fn is_modulatable(&self) -> bool {
        self.flags.contains(ParamFlags::MODULATABLE)
    }

    /// Whether the parameter steps instead of ramping.
    #[inline]
    pub fn is_stepped(&self) -> bool {
        self.flags.contains(ParamFlags::STEPPED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESC: ParamDescriptor =
        ParamDescriptor::normalized(ParamId(3), "Bloom", "Bloom", "bloom", 0.5, 40.0);

    #[test]
    fn clamp_bounds_and_non_finite() {
        assert_eq!(DESC.clamp(-0.2), 0.0);
        assert_eq!(DESC.clamp(2.0), 1.0);
        assert_eq!(DESC.clamp(0.3), 0.3);
        assert_eq!(DESC.clamp(f32::NAN), 0.5);
        assert_eq!(DESC.clamp(f32::INFINITY), 0.5);
    }

    #[test]
    fn stepped_has_no_smoothing() {
        let freeze = ParamDescriptor::stepped(ParamId(11), "Freeze", "Freeze", "freeze", 0.0);
        assert!(freeze.is_stepped());
        assert!(!freeze.is_modulatable());
        assert_eq!(freeze.smoothing_ms, 0.0);
    }

    #[test]
    fn flags_union() {
        assert!(DESC.is_modulatable());
        assert!(DESC.flags.contains(ParamFlags::AUTOMATABLE));
        assert!(ParamFlags::NONE.union(ParamFlags::STEPPED).contains(ParamFlags::STEPPED));
    }
}
