//! Composite kinematic quantities.
//!
//! Every function is pure. Quantities that need more objects than the
//! input provides return [`SENTINEL`].

use vbsel_core::{FourVector, MissingEnergy, ObjectCollection, ObjectFlags, PhysicalObject, SENTINEL};

/// Transverse mass of `obj` against the missing momentum.
///
/// `mT = sqrt(2 · pt · MET · (1 − cos Δφ))`, clamped at zero.
pub fn calc_mt(obj: &FourVector, met: &MissingEnergy) -> f64 {
    let dphi = obj.phi() - met.phi;
    (2.0 * obj.pt() * met.et * (1.0 - dphi.cos())).max(0.0).sqrt()
}

/// Smallest transverse mass among the first `max_n` objects (all when `None`).
pub fn calc_mt_min(objects: &ObjectCollection, met: &MissingEnergy, max_n: Option<usize>) -> f64 {
    let n = max_n.unwrap_or(objects.len());
    objects.iter().take(n).map(|o| calc_mt(o.p4(), met)).reduce(f64::min).unwrap_or(SENTINEL)
}

/// Contransverse mass of a pair.
///
/// `mCT² = (Et₁ + Et₂)² − (px₁ − px₂)² − (py₁ − py₂)²`; the root of the
/// absolute value is returned.
pub fn calc_mct(a: &FourVector, b: &FourVector) -> f64 {
    let et = a.et() + b.et();
    let dx = a.px - b.px;
    let dy = a.py - b.py;
    (et * et - dx * dx - dy * dy).abs().sqrt()
}

/// Minimum `|Δφ|` between the missing momentum and the first `n` objects.
pub fn min_dphi(met: &MissingEnergy, objects: &ObjectCollection, n: usize) -> f64 {
    let met_p4 = met.p4();
    objects
        .iter()
        .take(n)
        .map(|o| o.p4().delta_phi(&met_p4).abs())
        .reduce(f64::min)
        .unwrap_or(SENTINEL)
}

/// Same-flavour dilepton candidate.
///
/// Exactly two electrons and no muons pairs the electrons; exactly two
/// muons and no electrons pairs the muons. Any other combination yields
/// the null vector, whose pt, phi and mass all read as zero.
pub fn reconstruct_dilepton(electrons: &ObjectCollection, muons: &ObjectCollection) -> FourVector {
    match (electrons.as_slice(), muons.as_slice()) {
        ([a, b], []) | ([], [a, b]) => *a.p4() + *b.p4(),
        _ => FourVector::ZERO,
    }
}

/// Magnitude of the transverse sum of the missing momentum and `system`.
pub fn recoil_magnitude(met: &MissingEnergy, system: &FourVector) -> f64 {
    (met.px() + system.px).hypot(met.py() + system.py)
}

/// Truth flavour label of a jet: 5 (b), 4 (c), 15 (tau) or 0.
///
/// Flags are checked in that order.
pub fn jet_flavor(jet: &PhysicalObject) -> i64 {
    if jet.pass(ObjectFlags::TRUE_B_JET) {
        5
    } else if jet.pass(ObjectFlags::TRUE_C_JET) {
        4
    } else if jet.pass(ObjectFlags::TRUE_TAU) {
        15
    } else {
        0
    }
}

/// `ΔR` between objects `i` and `k`, or [`SENTINEL`] if either is missing.
pub fn delta_r_at(objects: &ObjectCollection, i: usize, k: usize) -> f64 {
    match (objects.get(i), objects.get(k)) {
        (Some(a), Some(b)) => a.delta_r(b),
        _ => SENTINEL,
    }
}

/// Invariant mass of the two leading objects, or [`SENTINEL`].
pub fn leading_pair_mass(objects: &ObjectCollection) -> f64 {
    match objects.as_slice() {
        [a, b, ..] => a.pair_mass(b),
        _ => SENTINEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn obj(pt: f64, eta: f64, phi: f64) -> PhysicalObject {
        PhysicalObject::new(pt, eta, phi, 0.0, ObjectFlags::EMPTY)
    }

    fn coll(objs: Vec<PhysicalObject>) -> ObjectCollection {
        ObjectCollection::from_unsorted(objs)
    }

    #[test]
    fn transverse_mass() {
        let met = MissingEnergy::new(50.0, 0.0);
        // Back to back: 2 * 100 * 50 * 2
        let back = FourVector::from_pt_eta_phi_m(100.0, 0.3, PI, 0.0);
        assert_relative_eq!(calc_mt(&back, &met), 20000.0_f64.sqrt(), epsilon = 1e-9);
        // Collinear: zero
        let along = FourVector::from_pt_eta_phi_m(100.0, 0.3, 0.0, 0.0);
        assert_relative_eq!(calc_mt(&along, &met), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn transverse_mass_minimum() {
        let met = MissingEnergy::new(50.0, 0.0);
        let c = coll(vec![obj(100.0, 0.0, PI / 2.0), obj(60.0, 0.0, 0.1)]);
        let expected = calc_mt(c[1].p4(), &met);
        assert_relative_eq!(calc_mt_min(&c, &met, None), expected, epsilon = 1e-12);
        assert_relative_eq!(calc_mt_min(&c, &met, Some(1)), calc_mt(c[0].p4(), &met), epsilon = 1e-12);
        assert_eq!(calc_mt_min(&ObjectCollection::new(), &met, None), SENTINEL);
    }

    #[test]
    fn contransverse_mass_of_back_to_back_massless_pair() {
        // For massless back-to-back objects with equal pt: mCT² = (2pt)² − (2pt)² = 0.
        let a = FourVector::from_pt_eta_phi_m(80.0, 0.0, 0.0, 0.0);
        let b = FourVector::from_pt_eta_phi_m(80.0, 0.0, PI, 0.0);
        assert_relative_eq!(calc_mct(&a, &b), 0.0, epsilon = 1e-3);
        // Collinear massless pair: mCT = 2 sqrt(pt1 pt2).
        let c = FourVector::from_pt_eta_phi_m(90.0, 0.0, 0.0, 0.0);
        let d = FourVector::from_pt_eta_phi_m(40.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(calc_mct(&c, &d), 2.0 * (90.0_f64 * 40.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn dphi_minimum_over_leading() {
        let met = MissingEnergy::new(50.0, 0.5);
        let c = coll(vec![obj(100.0, 0.0, 2.5), obj(80.0, 0.0, 0.7), obj(60.0, 0.0, 0.55)]);
        assert_relative_eq!(min_dphi(&met, &c, 1), 2.0, epsilon = 1e-9);
        assert_relative_eq!(min_dphi(&met, &c, 2), 0.2, epsilon = 1e-9);
        assert_relative_eq!(min_dphi(&met, &c, 4), 0.05, epsilon = 1e-9);
        assert_eq!(min_dphi(&met, &ObjectCollection::new(), 4), SENTINEL);
    }

    #[test]
    fn dphi_wraps() {
        let met = MissingEnergy::new(50.0, 3.0);
        let c = coll(vec![obj(100.0, 0.0, -3.0)]);
        assert_relative_eq!(min_dphi(&met, &c, 1), 2.0 * PI - 6.0, epsilon = 1e-9);
    }

    #[test]
    fn dilepton_same_flavour_only() {
        let e = coll(vec![obj(50.0, 0.1, 0.0), obj(40.0, -0.4, 2.0)]);
        let mu = coll(vec![obj(30.0, 0.2, 1.0)]);
        let none = ObjectCollection::new();

        let z = reconstruct_dilepton(&e, &none);
        assert_relative_eq!(z.m(), e[0].pair_mass(&e[1]), epsilon = 1e-9);

        let z = reconstruct_dilepton(&none, &e);
        assert_relative_eq!(z.m(), e[0].pair_mass(&e[1]), epsilon = 1e-9);

        let one_e = coll(vec![obj(50.0, 0.1, 0.0)]);
        let cross = reconstruct_dilepton(&one_e, &mu);
        assert_eq!(cross, FourVector::ZERO);
        assert_eq!((cross.pt(), cross.phi(), cross.m()), (0.0, 0.0, 0.0));

        assert_eq!(reconstruct_dilepton(&e, &mu), FourVector::ZERO);
    }

    #[test]
    fn recoil() {
        let met = MissingEnergy::new(50.0, 0.0);
        assert_relative_eq!(recoil_magnitude(&met, &FourVector::ZERO), 50.0, epsilon = 1e-12);
        let z = FourVector::from_pt_eta_phi_m(30.0, 1.0, PI / 2.0, 91.0);
        assert_relative_eq!(recoil_magnitude(&met, &z), 3400.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn flavour_priority() {
        let f = |flags| PhysicalObject::new(40.0, 0.0, 0.0, 0.0, flags);
        assert_eq!(jet_flavor(&f(ObjectFlags::TRUE_B_JET | ObjectFlags::TRUE_C_JET)), 5);
        assert_eq!(jet_flavor(&f(ObjectFlags::TRUE_C_JET | ObjectFlags::TRUE_TAU)), 4);
        assert_eq!(jet_flavor(&f(ObjectFlags::TRUE_TAU)), 15);
        assert_eq!(jet_flavor(&f(ObjectFlags::BTAG77_MV2C10)), 0);
    }

    #[test]
    fn pair_helpers() {
        let c = coll(vec![obj(50.0, 0.0, 0.0), obj(40.0, 0.3, 0.4)]);
        assert_relative_eq!(delta_r_at(&c, 0, 1), 0.5, epsilon = 1e-9);
        assert_eq!(delta_r_at(&c, 0, 2), SENTINEL);
        assert_eq!(leading_pair_mass(&coll(vec![obj(50.0, 0.0, 0.0)])), SENTINEL);
    }

    #[test]
    fn pure_functions_are_repeatable() {
        let met = MissingEnergy::new(73.0, -1.2);
        let c = coll(vec![obj(120.0, 0.2, 0.3), obj(90.0, -1.0, 2.9), obj(35.0, 2.0, -2.0)]);
        let first = (calc_mt_min(&c, &met, None), calc_mct(c[0].p4(), c[1].p4()), min_dphi(&met, &c, 4));
        let second = (calc_mt_min(&c, &met, None), calc_mct(c[0].p4(), c[1].p4()), min_dphi(&met, &c, 4));
        assert_eq!(first.0.to_bits(), second.0.to_bits());
        assert_eq!(first.1.to_bits(), second.1.to_bits());
        assert_eq!(first.2.to_bits(), second.2.to_bits());
    }
}
