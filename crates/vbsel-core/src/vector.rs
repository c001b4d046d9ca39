//! Lorentz four-vectors in collider coordinates.
//!
//! Components are stored in Cartesian form `(px, py, pz, E)` in GeV. The
//! detector-friendly accessors (`pt`, `eta`, `phi`, `m`) follow the ROOT
//! `TLorentzVector` conventions so derived quantities match reference output:
//! a zero vector reports `phi = 0` and `eta = 0`, and a space-like vector
//! reports a negative mass.

use std::f64::consts::PI;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Wrap an azimuthal angle into `[-π, π)`.
pub fn wrap_phi(mut x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    while x >= PI {
        x -= 2.0 * PI;
    }
    while x < -PI {
        x += 2.0 * PI;
    }
    x
}

/// A Lorentz four-vector `(px, py, pz, E)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FourVector {
    /// x component of the momentum.
    pub px: f64,
    /// y component of the momentum.
    pub py: f64,
    /// z component of the momentum (beam axis).
    pub pz: f64,
    /// Energy.
    pub e: f64,
}

impl FourVector {
    /// The null vector.
    pub const ZERO: FourVector = FourVector { px: 0.0, py: 0.0, pz: 0.0, e: 0.0 };

    /// Build from Cartesian components.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Build from transverse momentum, pseudorapidity, azimuth and mass.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        let pt = pt.abs();
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        let e = if m >= 0.0 { (p2 + m * m).sqrt() } else { (p2 - m * m).max(0.0).sqrt() };
        Self { px, py, pz, e }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Magnitude of the three-momentum.
    pub fn p(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// Pseudorapidity. `0` for the null vector, `±1e10` along the beam axis.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt > 0.0 {
            return (self.pz / pt).asinh();
        }
        if self.pz == 0.0 { 0.0 } else { 1e10_f64.copysign(self.pz) }
    }

    /// Azimuthal angle in `(-π, π]`; `0` when the transverse momentum vanishes.
    pub fn phi(&self) -> f64 {
        if self.px == 0.0 && self.py == 0.0 { 0.0 } else { self.py.atan2(self.px) }
    }

    /// Squared invariant mass `E² − p²`.
    pub fn m2(&self) -> f64 {
        self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz)
    }

    /// Invariant mass (negative for space-like vectors).
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 < 0.0 { -(-m2).sqrt() } else { m2.sqrt() }
    }

    /// Transverse energy `E · pt / |p|`.
    pub fn et(&self) -> f64 {
        let pt2 = self.px * self.px + self.py * self.py;
        let et2 = if pt2 == 0.0 { 0.0 } else { self.e * self.e * pt2 / (pt2 + self.pz * self.pz) };
        if self.e < 0.0 { -et2.sqrt() } else { et2.sqrt() }
    }

    /// Signed azimuthal separation `φ(self) − φ(other)` wrapped into `[-π, π)`.
    pub fn delta_phi(&self, other: &FourVector) -> f64 {
        wrap_phi(self.phi() - other.phi())
    }

    /// Angular separation `ΔR = √(Δη² + Δφ²)`.
    pub fn delta_r(&self, other: &FourVector) -> f64 {
        let deta = self.eta() - other.eta();
        deta.hypot(self.delta_phi(other))
    }
}

impl Add for FourVector {
    type Output = FourVector;

    fn add(self, rhs: FourVector) -> FourVector {
        FourVector {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e: self.e + rhs.e,
        }
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, rhs: FourVector) {
        *self = *self + rhs;
    }
}

impl Sum for FourVector {
    fn sum<I: Iterator<Item = FourVector>>(iter: I) -> Self {
        iter.fold(FourVector::ZERO, |acc, v| acc + v)
    }
}
