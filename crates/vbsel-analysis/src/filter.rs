//! Kinematic and working-point filtering of object collections.

use serde::{Deserialize, Serialize};

use vbsel_core::{FlagMask, ObjectCollection, ObjectFlags, PhysicalObject};

/// Threshold cut applied to one object.
///
/// `pt_min` and `eta_max` are strict bounds (`pt > pt_min`,
/// `|eta| < eta_max`). An `eta_max` of zero disables the eta cut, so a cut
/// with both bounds zero selects on flags only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectCut {
    /// Minimum transverse momentum (GeV).
    #[serde(default)]
    pub pt_min: f64,
    /// Maximum |eta|; `0` means no cut.
    #[serde(default)]
    pub eta_max: f64,
    /// Working-point requirement.
    #[serde(default)]
    pub flags: FlagMask,
}

impl ObjectCut {
    /// Kinematic cut without flag requirement.
    pub const fn kinematic(pt_min: f64, eta_max: f64) -> Self {
        Self { pt_min, eta_max, flags: FlagMask::NONE }
    }

    /// Kinematic cut requiring every flag in `flags`.
    pub const fn with_flags(pt_min: f64, eta_max: f64, flags: ObjectFlags) -> Self {
        Self { pt_min, eta_max, flags: FlagMask::all(flags) }
    }

    /// Replace the flag requirement.
    pub const fn mask(mut self, flags: FlagMask) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the kinematic window alone accepts `obj`.
    pub fn in_window(&self, obj: &PhysicalObject) -> bool {
        obj.pt() > self.pt_min && (self.eta_max <= 0.0 || obj.eta().abs() < self.eta_max)
    }

    /// Whether `obj` passes the full cut.
    pub fn accepts(&self, obj: &PhysicalObject) -> bool {
        self.in_window(obj) && self.flags.matches(obj.flags())
    }
}

/// Survivors of `cut`, in input order.
pub fn filter_objects(collection: &ObjectCollection, cut: &ObjectCut) -> ObjectCollection {
    collection.iter().filter(|o| cut.accepts(o)).copied().collect()
}

/// Number of objects passing `cut`.
pub fn count_objects(collection: &ObjectCollection, cut: &ObjectCut) -> usize {
    collection.iter().filter(|o| cut.accepts(o)).count()
}

/// Scalar pt sum of the first `max_n` objects (all when `None`).
pub fn sum_pt(collection: &ObjectCollection, max_n: Option<usize>) -> f64 {
    let n = max_n.unwrap_or(collection.len());
    collection.iter().take(n).map(PhysicalObject::pt).sum()
}

/// Whether any object inside the kinematic window lacks `quality`.
///
/// This is an event-level gate: one bad object vetoes the whole event.
pub fn has_bad_object(
    collection: &ObjectCollection,
    pt_min: f64,
    eta_max: f64,
    quality: ObjectFlags,
) -> bool {
    let window = ObjectCut::kinematic(pt_min, eta_max);
    collection.iter().any(|o| window.in_window(o) && !o.pass(quality))
}
