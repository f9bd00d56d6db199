//! Lattice primitives for 3D (and reduced 2D) photonic crystals.
//!
//! Reciprocal vectors follow the plane-wave convention `Ri · Gj = δij`
//! (no factor of 2π), so wavevectors are measured in units of 2π/a and
//! operator eigenvalues are (ωa/2πc)².

use serde::{Deserialize, Serialize};

use crate::error::MaxwellError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lattice3D {
    pub r1: [f64; 3],
    pub r2: [f64; 3],
    pub r3: [f64; 3],
}

impl Lattice3D {
    pub fn cubic(a: f64) -> Self {
        Self::orthorhombic(a, a, a)
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self {
            r1: [a, 0.0, 0.0],
            r2: [0.0, b, 0.0],
            r3: [0.0, 0.0, c],
        }
    }

    /// In-plane hexagonal lattice with a unit out-of-plane vector.
    pub fn hexagonal(a: f64) -> Self {
        Self {
            r1: [a, 0.0, 0.0],
            r2: [0.5 * a, 0.5 * 3f64.sqrt() * a, 0.0],
            r3: [0.0, 0.0, 1.0],
        }
    }

    pub fn from_vectors(r1: [f64; 3], r2: [f64; 3], r3: [f64; 3]) -> Self {
        Self { r1, r2, r3 }
    }

    /// Signed cell volume `r1 · (r2 × r3)`.
    pub fn volume(&self) -> f64 {
        dot(self.r1, cross(self.r2, self.r3))
    }

    pub fn reciprocal(&self) -> Result<ReciprocalLattice3D, MaxwellError> {
        let vol = self.volume();
        let extent = norm(self.r1) * norm(self.r2) * norm(self.r3);
        if !(vol.abs() > f64::EPSILON * extent) {
            return Err(MaxwellError::invalid(
                "lattice vectors are linearly dependent",
            ));
        }
        let inv = 1.0 / vol;
        Ok(ReciprocalLattice3D {
            g1: scale(cross(self.r2, self.r3), inv),
            g2: scale(cross(self.r3, self.r1), inv),
            g3: scale(cross(self.r1, self.r2), inv),
        })
    }

    pub fn fractional_to_cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for c in 0..3 {
            out[c] = self.r1[c] * frac[0] + self.r2[c] * frac[1] + self.r3[c] * frac[2];
        }
        out
    }

    pub fn cartesian_to_fractional(&self, cart: [f64; 3]) -> Result<[f64; 3], MaxwellError> {
        let g = self.reciprocal()?;
        Ok([dot(g.g1, cart), dot(g.g2, cart), dot(g.g3, cart)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReciprocalLattice3D {
    pub g1: [f64; 3],
    pub g2: [f64; 3],
    pub g3: [f64; 3],
}

impl ReciprocalLattice3D {
    /// Cartesian vector of reduced coordinates `k` in this basis.
    pub fn to_cartesian(&self, k: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for c in 0..3 {
            out[c] = self.g1[c] * k[0] + self.g2[c] * k[1] + self.g3[c] * k[2];
        }
        out
    }
}

#[inline]
pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}
