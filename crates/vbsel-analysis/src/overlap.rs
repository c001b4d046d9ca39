//! Overlap removal between object collections.
//!
//! Removal is one-sided: [`remove_overlap`] drops objects from the primary
//! collection that sit within a cone of any secondary object, and never
//! touches the secondary. A sequence of such calls is expressed as an
//! ordered plan of [`OverlapStep`]s executed by [`resolve_overlaps`]; each
//! step sees the output of all earlier steps.

use serde::{Deserialize, Serialize};

use vbsel_core::{
    Error, FlagMask, ObjectCollection, ObjectFlags, ObjectKind, PhysicalObject, Result,
};

/// Which object of a pair drives a pt-dependent cone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConeReference {
    /// The candidate being considered for removal.
    Primary,
    /// The object it is compared against.
    Secondary,
}

/// Cone size for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiusRule {
    /// Constant ΔR.
    Fixed(f64),
    /// `min(max, offset + scale / pt)` with pt taken from `reference`.
    ShrinkingCone {
        /// Object whose pt sets the cone.
        reference: ConeReference,
        /// Upper bound on the cone.
        max: f64,
        /// Constant term.
        offset: f64,
        /// Coefficient of `1/pt` (GeV).
        scale: f64,
    },
}

impl RadiusRule {
    /// The `min(0.4, 0.04 + 10/pt)` lepton cone.
    pub const fn lepton_cone(reference: ConeReference) -> Self {
        RadiusRule::ShrinkingCone { reference, max: 0.4, offset: 0.04, scale: 10.0 }
    }

    /// Cone radius for the pair `(primary, secondary)`.
    pub fn radius(&self, primary: &PhysicalObject, secondary: &PhysicalObject) -> f64 {
        match *self {
            RadiusRule::Fixed(r) => r,
            RadiusRule::ShrinkingCone { reference, max, offset, scale } => {
                let pt = match reference {
                    ConeReference::Primary => primary.pt(),
                    ConeReference::Secondary => secondary.pt(),
                };
                if pt > 0.0 { max.min(offset + scale / pt) } else { max }
            }
        }
    }
}

/// Condition under which a close pair is *not* treated as an overlap.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapVeto {
    /// Every close pair overlaps.
    #[default]
    None,
    /// The primary survives when its flags match the mask.
    PrimaryHas(FlagMask),
    /// The primary survives against secondaries whose flags match the mask.
    SecondaryHas(FlagMask),
}

impl OverlapVeto {
    /// Whether the pair is spared.
    pub fn spares(&self, primary: &PhysicalObject, secondary: &PhysicalObject) -> bool {
        match self {
            OverlapVeto::None => false,
            OverlapVeto::PrimaryHas(mask) => mask.matches(primary.flags()),
            OverlapVeto::SecondaryHas(mask) => mask.matches(secondary.flags()),
        }
    }
}

/// Primary objects that survive comparison against every secondary object.
///
/// A primary is dropped as soon as one secondary lies strictly inside the
/// cone and the veto does not spare the pair. Input order is preserved.
pub fn remove_overlap(
    primary: &ObjectCollection,
    secondary: &ObjectCollection,
    radius: &RadiusRule,
    veto: &OverlapVeto,
) -> ObjectCollection {
    primary
        .iter()
        .filter(|p| {
            !secondary
                .iter()
                .any(|s| p.delta_r(s) < radius.radius(p, s) && !veto.spares(p, s))
        })
        .copied()
        .collect()
}

/// One entry of an overlap plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlapStep {
    /// Collection objects are removed from.
    pub primary: ObjectKind,
    /// Collection compared against.
    pub secondary: ObjectKind,
    /// Cone size.
    pub radius: RadiusRule,
    /// Exemption rule.
    #[serde(default)]
    pub veto: OverlapVeto,
}

impl OverlapStep {
    /// Reject self-overlap and non-positive fixed cones.
    pub fn validate(&self) -> Result<()> {
        if self.primary == self.secondary {
            return Err(Error::Config(format!(
                "overlap step compares {} with itself",
                self.primary.as_str()
            )));
        }
        match self.radius {
            RadiusRule::Fixed(r) if !(r.is_finite() && r > 0.0) => {
                Err(Error::Config(format!("overlap radius must be positive, got {r}")))
            }
            RadiusRule::ShrinkingCone { max, .. } if !(max.is_finite() && max > 0.0) => {
                Err(Error::Config(format!("overlap cone maximum must be positive, got {max}")))
            }
            _ => Ok(()),
        }
    }
}

/// Collections per object kind, updated in place by [`resolve_overlaps`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSet {
    /// Electrons.
    pub electrons: ObjectCollection,
    /// Muons.
    pub muons: ObjectCollection,
    /// Taus.
    pub taus: ObjectCollection,
    /// Jets.
    pub jets: ObjectCollection,
}

impl ObjectSet {
    /// Collection for `kind`.
    pub fn get(&self, kind: ObjectKind) -> &ObjectCollection {
        match kind {
            ObjectKind::Electrons => &self.electrons,
            ObjectKind::Muons => &self.muons,
            ObjectKind::Taus => &self.taus,
            ObjectKind::Jets => &self.jets,
        }
    }

    fn slot(&mut self, kind: ObjectKind) -> &mut ObjectCollection {
        match kind {
            ObjectKind::Electrons => &mut self.electrons,
            ObjectKind::Muons => &mut self.muons,
            ObjectKind::Taus => &mut self.taus,
            ObjectKind::Jets => &mut self.jets,
        }
    }
}

/// Run `plan` in order over `objects`.
pub fn resolve_overlaps(plan: &[OverlapStep], objects: &mut ObjectSet) {
    for step in plan {
        let kept = remove_overlap(
            objects.get(step.primary),
            objects.get(step.secondary),
            &step.radius,
            &step.veto,
        );
        *objects.slot(step.primary) = kept;
    }
}

/// The standard five-step lepton/jet disambiguation.
pub fn default_plan() -> Vec<OverlapStep> {
    use ObjectKind::{Electrons, Jets, Muons};
    vec![
        OverlapStep {
            primary: Electrons,
            secondary: Muons,
            radius: RadiusRule::Fixed(0.01),
            veto: OverlapVeto::None,
        },
        OverlapStep {
            primary: Jets,
            secondary: Electrons,
            radius: RadiusRule::Fixed(0.2),
            veto: OverlapVeto::PrimaryHas(FlagMask::all(ObjectFlags::BTAG77_MV2C10)),
        },
        OverlapStep {
            primary: Electrons,
            secondary: Jets,
            radius: RadiusRule::lepton_cone(ConeReference::Primary),
            veto: OverlapVeto::None,
        },
        OverlapStep {
            primary: Jets,
            secondary: Muons,
            radius: RadiusRule::lepton_cone(ConeReference::Secondary),
            veto: OverlapVeto::PrimaryHas(FlagMask::not(ObjectFlags::LESS_THAN_3_TRACKS)),
        },
        OverlapStep {
            primary: Muons,
            secondary: Jets,
            radius: RadiusRule::lepton_cone(ConeReference::Primary),
            veto: OverlapVeto::None,
        },
    ]
}
