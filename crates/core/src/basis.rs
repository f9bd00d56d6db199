//! k+G transverse basis and the Bloch context.
//!
//! For every local grid point with centered lattice indices `(n1, n2, n3)`
//! the wavevector `q = k + n1 G1 + n2 G2 + n3 G3` is stored as its length
//! plus two unit vectors `m`, `n` with `m × n = q / |q|`. A divergence-free
//! field is then `H = h_m m + h_n n`.
//!
//! Construction:
//!
//! - generic `q`: `n = ẑ × q / |ẑ × q|`, `m = n × q / |q|`;
//! - `q ∥ ẑ`: `n = ŷ`, `m = ±x̂` (sign of `q_z`);
//! - `q = 0`: `m = -ẑ`, `n = ŷ`, the limit of an in-plane `q → 0` along +x̂.
//!
//! For in-plane `q` this gives `m = -ẑ` at every point, so the `m`
//! coefficient is H_z (TE) and the `n` coefficient is in-plane H (TM).
//! Each entry depends only on `(k, G1, G2, G3)` and the global indices, so
//! every process computes bit-identical values for the points it owns.

use log::debug;

use crate::error::MaxwellError;
use crate::grid::GridGeometry;
use crate::lattice::{cross, dot, ReciprocalLattice3D};
use crate::polarization::Polarization;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KPlusG {
    pub kmag: f64,
    pub m: [f64; 3],
    pub n: [f64; 3],
}

impl KPlusG {
    pub fn new(q: [f64; 3]) -> Self {
        let normsqr = dot(q, q);
        if normsqr == 0.0 {
            return Self {
                kmag: 0.0,
                m: [0.0, 0.0, -1.0],
                n: [0.0, 1.0, 0.0],
            };
        }
        let kmag = normsqr.sqrt();
        let unit = [q[0] / kmag, q[1] / kmag, q[2] / kmag];

        let n = if q[0] == 0.0 && q[1] == 0.0 {
            [0.0, 1.0, 0.0]
        } else {
            normalized(cross([0.0, 0.0, 1.0], q))
        };
        let m = normalized(cross(n, unit));
        Self { kmag, m, n }
    }

    /// Unit vector along `k+G`, `m × n`.
    pub fn direction(&self) -> [f64; 3] {
        cross(self.m, self.n)
    }
}

fn normalized(v: [f64; 3]) -> [f64; 3] {
    let inv = 1.0 / dot(v, v).sqrt();
    [v[0] * inv, v[1] * inv, v[2] * inv]
}

/// Centered lattice index: `i >= max(1, n/2)` wraps to `i - n`.
#[inline]
pub fn centered_index(i: usize, n: usize) -> i64 {
    let cut = (n / 2).max(1);
    if i >= cut {
        i as i64 - n as i64
    } else {
        i as i64
    }
}

/// Per-point k+G data for the local slab.
#[derive(Debug, Clone)]
pub struct KPlusGBasis {
    entries: Vec<KPlusG>,
    normsqr: Vec<f64>,
}

impl KPlusGBasis {
    pub fn compute(
        geometry: &GridGeometry,
        reciprocal: &ReciprocalLattice3D,
        k_cartesian: [f64; 3],
    ) -> Self {
        let ReciprocalLattice3D { g1, g2, g3 } = *reciprocal;
        let mut entries = Vec::with_capacity(geometry.local_n);
        let mut normsqr = Vec::with_capacity(geometry.local_n);
        for i in 0..geometry.local_n {
            let [x, y, z] = geometry.local_coords(i);
            let n1 = centered_index(x, geometry.nx) as f64;
            let n2 = centered_index(y, geometry.ny) as f64;
            let n3 = centered_index(z, geometry.nz) as f64;
            let mut q = [0.0; 3];
            for c in 0..3 {
                q[c] = k_cartesian[c] + (g1[c] * n1 + g2[c] * n2 + g3[c] * n3);
            }
            normsqr.push(dot(q, q));
            entries.push(KPlusG::new(q));
        }
        Self { entries, normsqr }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KPlusG] {
        &self.entries
    }

    /// `|k+G|²` per local point.
    pub fn normsqr(&self) -> &[f64] {
        &self.normsqr
    }
}

/// Current wavevector, polarization and the basis derived from them.
///
/// Passed by reference into every operator call; a new k-point means a
/// fresh (or fully updated) context, never a partially updated one.
#[derive(Debug, Clone)]
pub struct BlochContext {
    reciprocal: ReciprocalLattice3D,
    k_reduced: [f64; 3],
    k_cartesian: [f64; 3],
    polarization: Polarization,
    basis: KPlusGBasis,
}

impl BlochContext {
    /// `k` is given in reduced coordinates of `reciprocal`.
    pub fn new(
        geometry: &GridGeometry,
        reciprocal: ReciprocalLattice3D,
        k: [f64; 3],
        polarization: Polarization,
    ) -> Result<Self, MaxwellError> {
        let k_cartesian = reciprocal.to_cartesian(k);
        validate_polarization(geometry, &reciprocal, k_cartesian, polarization)?;
        let basis = KPlusGBasis::compute(geometry, &reciprocal, k_cartesian);
        debug!("bloch context at k = {k:?} (cartesian {k_cartesian:?}), {polarization}");
        Ok(Self {
            reciprocal,
            k_reduced: k,
            k_cartesian,
            polarization,
            basis,
        })
    }

    /// Moves to a new k-point, recomputing the whole basis. On error the
    /// context is left unchanged.
    pub fn update_k(&mut self, geometry: &GridGeometry, k: [f64; 3]) -> Result<(), MaxwellError> {
        let k_cartesian = self.reciprocal.to_cartesian(k);
        validate_polarization(geometry, &self.reciprocal, k_cartesian, self.polarization)?;
        self.basis = KPlusGBasis::compute(geometry, &self.reciprocal, k_cartesian);
        self.k_reduced = k;
        self.k_cartesian = k_cartesian;
        debug!("updated k to {k:?} (cartesian {k_cartesian:?})");
        Ok(())
    }

    pub fn set_polarization(
        &mut self,
        geometry: &GridGeometry,
        polarization: Polarization,
    ) -> Result<(), MaxwellError> {
        validate_polarization(geometry, &self.reciprocal, self.k_cartesian, polarization)?;
        self.polarization = polarization;
        Ok(())
    }

    pub fn k(&self) -> [f64; 3] {
        self.k_reduced
    }

    pub fn k_cartesian(&self) -> [f64; 3] {
        self.k_cartesian
    }

    pub fn is_zero_k(&self) -> bool {
        self.k_cartesian == [0.0; 3]
    }

    pub fn polarization(&self) -> Polarization {
        self.polarization
    }

    pub fn reciprocal(&self) -> &ReciprocalLattice3D {
        &self.reciprocal
    }

    pub fn basis(&self) -> &KPlusGBasis {
        &self.basis
    }
}

fn validate_polarization(
    geometry: &GridGeometry,
    reciprocal: &ReciprocalLattice3D,
    k_cartesian: [f64; 3],
    polarization: Polarization,
) -> Result<(), MaxwellError> {
    if !polarization.is_constrained() {
        return Ok(());
    }
    if !geometry.is_2d() {
        return Err(MaxwellError::invalid(format!(
            "{polarization} polarization requires nz = 1, grid is {}x{}x{}",
            geometry.nx, geometry.ny, geometry.nz
        )));
    }
    if k_cartesian[2] != 0.0 || reciprocal.g1[2] != 0.0 || reciprocal.g2[2] != 0.0 {
        return Err(MaxwellError::invalid(format!(
            "{polarization} polarization requires an in-plane wavevector and lattice"
        )));
    }
    Ok(())
}
