//! Per-event data model.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::flags::ObjectFlags;
use crate::vector::FourVector;

/// Placeholder for quantities that are undefined because a required
/// collection is too short. Keeps every emitted row the same width.
pub const SENTINEL: f64 = -999.0;

/// Kind of reconstructed object; also names the overlap-removal roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Electrons.
    Electrons,
    /// Muons.
    Muons,
    /// Hadronically decaying taus.
    Taus,
    /// Jets.
    Jets,
}

impl ObjectKind {
    /// Lowercase plural name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Electrons => "electrons",
            ObjectKind::Muons => "muons",
            ObjectKind::Taus => "taus",
            ObjectKind::Jets => "jets",
        }
    }
}

/// One reconstructed object: a four-vector plus its working-point flags.
///
/// Immutable once read from the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ObjectRecord", into = "ObjectRecord")]
pub struct PhysicalObject {
    p4: FourVector,
    flags: ObjectFlags,
}

/// Serialized form of a [`PhysicalObject`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectRecord {
    pt: f64,
    eta: f64,
    phi: f64,
    #[serde(default)]
    m: f64,
    #[serde(default)]
    flags: ObjectFlags,
}

impl TryFrom<ObjectRecord> for PhysicalObject {
    type Error = String;

    /// Negative pt would otherwise come back positive from the four-vector.
    fn try_from(r: ObjectRecord) -> Result<Self, String> {
        if !(r.pt.is_finite() && r.pt >= 0.0) {
            return Err(format!("object pt must be finite and non-negative, got {}", r.pt));
        }
        if !(r.eta.is_finite() && r.phi.is_finite() && r.m.is_finite()) {
            return Err(format!("object eta/phi/m must be finite, got {}/{}/{}", r.eta, r.phi, r.m));
        }
        Ok(PhysicalObject::new(r.pt, r.eta, r.phi, r.m, r.flags))
    }
}

impl From<PhysicalObject> for ObjectRecord {
    fn from(o: PhysicalObject) -> Self {
        ObjectRecord { pt: o.pt(), eta: o.eta(), phi: o.phi(), m: o.m(), flags: o.flags }
    }
}

impl PhysicalObject {
    /// Create an object from `(pt, eta, phi, m)` in GeV.
    pub fn new(pt: f64, eta: f64, phi: f64, m: f64, flags: ObjectFlags) -> Self {
        Self { p4: FourVector::from_pt_eta_phi_m(pt, eta, phi, m), flags }
    }

    /// Four-momentum.
    pub fn p4(&self) -> &FourVector {
        &self.p4
    }

    /// Working-point flags.
    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    /// Whether every bit of `flag` is set.
    pub fn pass(&self, flag: ObjectFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.p4.pt()
    }

    /// Pseudorapidity.
    pub fn eta(&self) -> f64 {
        self.p4.eta()
    }

    /// Azimuth.
    pub fn phi(&self) -> f64 {
        self.p4.phi()
    }

    /// Mass.
    pub fn m(&self) -> f64 {
        self.p4.m()
    }

    /// Angular separation to another object.
    pub fn delta_r(&self, other: &PhysicalObject) -> f64 {
        self.p4.delta_r(&other.p4)
    }

    /// Invariant mass of the pair `(self, other)`.
    pub fn pair_mass(&self, other: &PhysicalObject) -> f64 {
        (self.p4 + other.p4).m()
    }
}

/// Objects of one kind, ordered by descending transverse momentum.
///
/// Leading/subleading accessors rely on that order, and every filter and
/// overlap step keeps the relative order of survivors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectCollection(Vec<PhysicalObject>);

impl ObjectCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sort `objects` by descending pt (stable) and wrap them.
    pub fn from_unsorted(mut objects: Vec<PhysicalObject>) -> Self {
        objects.sort_by(|a, b| b.pt().total_cmp(&a.pt()));
        Self(objects)
    }

    /// Wrap objects that the caller guarantees are already in order.
    ///
    /// Used for subsequences of an ordered collection and for the lepton
    /// aggregate, which is a concatenation by flavour and deliberately not
    /// re-sorted.
    pub fn from_ordered(objects: Vec<PhysicalObject>) -> Self {
        Self(objects)
    }

    /// Whether pt is non-increasing along the collection.
    ///
    /// Ties are compared with a relative tolerance of 1e-9: pt is recomputed
    /// from the stored components and equal inputs may differ in the last bit.
    pub fn is_pt_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0].pt() >= w[1].pt() - 1e-9 * w[1].pt().abs())
    }

    /// Concatenate collections in the given order without re-sorting.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a ObjectCollection>) -> Self {
        Self(parts.into_iter().flat_map(|c| c.0.iter().copied()).collect())
    }

    /// Pt of the object at `index`, or [`SENTINEL`] when out of range.
    pub fn pt_at(&self, index: usize) -> f64 {
        self.0.get(index).map_or(SENTINEL, PhysicalObject::pt)
    }

    /// Eta of the object at `index`, or [`SENTINEL`] when out of range.
    pub fn eta_at(&self, index: usize) -> f64 {
        self.0.get(index).map_or(SENTINEL, PhysicalObject::eta)
    }

    /// Phi of the object at `index`, or [`SENTINEL`] when out of range.
    pub fn phi_at(&self, index: usize) -> f64 {
        self.0.get(index).map_or(SENTINEL, PhysicalObject::phi)
    }

    /// Underlying objects.
    pub fn as_slice(&self) -> &[PhysicalObject] {
        &self.0
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<PhysicalObject> {
        self.0
    }
}

impl Deref for ObjectCollection {
    type Target = [PhysicalObject];

    fn deref(&self) -> &[PhysicalObject] {
        &self.0
    }
}

impl FromIterator<PhysicalObject> for ObjectCollection {
    /// Collects in iteration order; callers feed subsequences of an
    /// ordered collection.
    fn from_iter<I: IntoIterator<Item = PhysicalObject>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ObjectCollection {
    type Item = &'a PhysicalObject;
    type IntoIter = std::slice::Iter<'a, PhysicalObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Missing transverse momentum: magnitude and azimuth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissingEnergy {
    /// Magnitude (GeV).
    pub et: f64,
    /// Azimuth.
    pub phi: f64,
}

impl MissingEnergy {
    /// Create from magnitude and azimuth.
    pub fn new(et: f64, phi: f64) -> Self {
        Self { et, phi }
    }

    /// x component.
    pub fn px(&self) -> f64 {
        self.et * self.phi.cos()
    }

    /// y component.
    pub fn py(&self) -> f64 {
        self.et * self.phi.sin()
    }

    /// Massless transverse four-vector pointing along the MET.
    pub fn p4(&self) -> FourVector {
        FourVector::new(self.px(), self.py(), 0.0, self.et.abs())
    }
}

/// Everything the event source supplies for one collision event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventRecord {
    /// Electron candidates, pt-ordered.
    #[serde(default)]
    pub electrons: ObjectCollection,
    /// Muon candidates, pt-ordered.
    #[serde(default)]
    pub muons: ObjectCollection,
    /// Tau candidates, pt-ordered.
    #[serde(default)]
    pub taus: ObjectCollection,
    /// Jet candidates, pt-ordered.
    #[serde(default)]
    pub jets: ObjectCollection,
    /// Missing transverse momentum.
    #[serde(default)]
    pub met: MissingEnergy,
    /// Generator-level filter MET.
    #[serde(default)]
    pub gen_met: f64,
    /// Generator-level filter HT.
    #[serde(default)]
    pub gen_ht: f64,
    /// Process (MC channel) identifier.
    #[serde(default)]
    pub process_id: i64,
    /// Per-event weights; the first one is the nominal MC weight.
    #[serde(default)]
    pub weights: Vec<f64>,
}

impl EventRecord {
    /// Collection for one object kind.
    pub fn collection(&self, kind: ObjectKind) -> &ObjectCollection {
        match kind {
            ObjectKind::Electrons => &self.electrons,
            ObjectKind::Muons => &self.muons,
            ObjectKind::Taus => &self.taus,
            ObjectKind::Jets => &self.jets,
        }
    }

    /// Nominal event weight: the first weight, or 1 when none is given.
    pub fn weight(&self) -> f64 {
        self.weights.first().copied().unwrap_or(1.0)
    }

    /// First object kind whose collection is not pt-ordered, if any.
    pub fn unsorted_collection(&self) -> Option<ObjectKind> {
        [ObjectKind::Electrons, ObjectKind::Muons, ObjectKind::Taus, ObjectKind::Jets]
            .into_iter()
            .find(|k| !self.collection(*k).is_pt_sorted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn jet(pt: f64) -> PhysicalObject {
        PhysicalObject::new(pt, 0.0, 0.0, 0.0, ObjectFlags::EMPTY)
    }

    #[test]
    fn from_unsorted_orders_by_descending_pt() {
        let c = ObjectCollection::from_unsorted(vec![jet(20.0), jet(50.0), jet(35.0)]);
        assert!(c.is_pt_sorted());
        assert_relative_eq!(c.pt_at(0), 50.0, epsilon = 1e-9);
        assert_relative_eq!(c.pt_at(2), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn out_of_range_accessors_use_sentinel() {
        let c = ObjectCollection::from_unsorted(vec![jet(40.0)]);
        assert_eq!(c.pt_at(1), SENTINEL);
        assert_eq!(c.eta_at(5), SENTINEL);
        assert_eq!(ObjectCollection::new().phi_at(0), SENTINEL);
    }

    #[test]
    fn concat_keeps_part_order() {
        let a = ObjectCollection::from_unsorted(vec![jet(10.0)]);
        let b = ObjectCollection::from_unsorted(vec![jet(90.0), jet(30.0)]);
        let c = ObjectCollection::concat([&a, &b]);
        assert_eq!(c.len(), 3);
        assert_relative_eq!(c.pt_at(0), 10.0, epsilon = 1e-9);
        assert_relative_eq!(c.pt_at(1), 90.0, epsilon = 1e-9);
        assert!(!c.is_pt_sorted());
    }

    #[test]
    fn negative_pt_is_rejected() {
        let err = serde_json::from_str::<PhysicalObject>(r#"{"pt":-40,"eta":0.1,"phi":0.2}"#)
            .unwrap_err();
        assert!(err.to_string().contains("non-negative"), "{err}");
        let ok: PhysicalObject = serde_json::from_str(r#"{"pt":0,"eta":0.1,"phi":0.2}"#).unwrap();
        assert_eq!(ok.pt(), 0.0);
    }

    #[test]
    fn event_record_from_json() {
        let json = r#"{
            "jets": [{"pt": 100.0, "eta": 0.5, "phi": 1.0, "m": 10.0, "flags": ["BTag77MV2c10"]}],
            "met": {"et": 50.0, "phi": 0.5},
            "process_id": 364100,
            "weights": [0.75, 1.1]
        }"#;
        let ev: EventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(ev.jets.len(), 1);
        assert!(ev.jets[0].pass(ObjectFlags::BTAG77_MV2C10));
        assert_relative_eq!(ev.jets[0].pt(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(ev.jets[0].m(), 10.0, epsilon = 1e-6);
        assert!(ev.electrons.is_empty());
        assert_eq!(ev.weight(), 0.75);
        assert_eq!(ev.process_id, 364100);
    }

    #[test]
    fn missing_weights_default_to_unity() {
        let ev = EventRecord::default();
        assert_eq!(ev.weight(), 1.0);
    }

    #[test]
    fn unsorted_collection_is_reported() {
        let mut ev = EventRecord::default();
        ev.muons = ObjectCollection::from_ordered(vec![jet(10.0), jet(20.0)]);
        assert_eq!(ev.unsorted_collection(), Some(ObjectKind::Muons));
    }

    #[test]
    fn met_components() {
        let met = MissingEnergy::new(50.0, 0.5);
        assert_relative_eq!(met.px().hypot(met.py()), 50.0, epsilon = 1e-12);
        assert_relative_eq!(met.p4().phi(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(met.p4().m(), 0.0, epsilon = 1e-6);
    }

    proptest! {
        #[test]
        fn from_unsorted_is_always_sorted(pts in proptest::collection::vec(0.1f64..500.0, 0..20)) {
            let c = ObjectCollection::from_unsorted(pts.iter().map(|&p| jet(p)).collect());
            prop_assert!(c.is_pt_sorted());
            prop_assert_eq!(c.len(), pts.len());
        }
    }
}
