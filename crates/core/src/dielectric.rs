//! Dielectric sampling, MPB-style interface averaging and tensor inversion.
//!
//! A user-supplied [`DielectricFunction`] is sampled on an oversampling
//! sub-mesh centred on every coarse grid point. The averaged (or, at
//! interfaces, anisotropically smoothed) tensor is inverted in closed form
//! and stored as the per-point ε⁻¹ used by the operator.

use log::{debug, info};
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::Collective;
use crate::error::MaxwellError;
use crate::grid::GridGeometry;
use crate::lattice::Lattice3D;

// ============================================================================
// Symmetric 3×3 tensors
// ============================================================================

/// Upper triangle of a real symmetric 3×3 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SymmetricMatrix {
    pub m00: f64,
    pub m01: f64,
    pub m02: f64,
    pub m11: f64,
    pub m12: f64,
    pub m22: f64,
}

impl SymmetricMatrix {
    pub fn new(m00: f64, m01: f64, m02: f64, m11: f64, m12: f64, m22: f64) -> Self {
        Self {
            m00,
            m01,
            m02,
            m11,
            m12,
            m22,
        }
    }

    pub fn isotropic(value: f64) -> Self {
        Self::new(value, 0.0, 0.0, value, 0.0, value)
    }

    pub fn diagonal(d: [f64; 3]) -> Self {
        Self::new(d[0], 0.0, 0.0, d[1], 0.0, d[2])
    }

    /// Projector `v vᵀ` onto a unit vector.
    pub fn projector(v: [f64; 3]) -> Self {
        Self::new(
            v[0] * v[0],
            v[0] * v[1],
            v[0] * v[2],
            v[1] * v[1],
            v[1] * v[2],
            v[2] * v[2],
        )
    }

    pub fn trace(&self) -> f64 {
        self.m00 + self.m11 + self.m22
    }

    pub fn determinant(&self) -> f64 {
        self.m00 * (self.m11 * self.m22 - self.m12 * self.m12)
            - self.m01 * (self.m01 * self.m22 - self.m12 * self.m02)
            + self.m02 * (self.m01 * self.m12 - self.m11 * self.m02)
    }

    pub fn is_finite(&self) -> bool {
        [self.m00, self.m01, self.m02, self.m11, self.m12, self.m22]
            .iter()
            .all(|v| v.is_finite())
    }

    fn max_abs(&self) -> f64 {
        [self.m00, self.m01, self.m02, self.m11, self.m12, self.m22]
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()))
    }

    /// Sylvester's criterion on the leading minors, with a relative floor on
    /// the determinant to reject near-singular tensors.
    pub fn is_positive_definite(&self) -> bool {
        let scale = self.max_abs();
        let minor2 = self.m00 * self.m11 - self.m01 * self.m01;
        self.is_finite()
            && self.m00 > 0.0
            && minor2 > 0.0
            && self.determinant() > SINGULAR_TOLERANCE * scale * scale * scale
    }

    /// Closed-form inverse via the adjugate; `None` unless positive-definite.
    pub fn invert(&self) -> Option<Self> {
        if !self.is_positive_definite() {
            return None;
        }
        let det_inv = 1.0 / self.determinant();
        Some(Self::new(
            (self.m11 * self.m22 - self.m12 * self.m12) * det_inv,
            (self.m02 * self.m12 - self.m01 * self.m22) * det_inv,
            (self.m01 * self.m12 - self.m02 * self.m11) * det_inv,
            (self.m00 * self.m22 - self.m02 * self.m02) * det_inv,
            (self.m01 * self.m02 - self.m00 * self.m12) * det_inv,
            (self.m00 * self.m11 - self.m01 * self.m01) * det_inv,
        ))
    }

    pub fn scaled(&self, s: f64) -> Self {
        Self::new(
            self.m00 * s,
            self.m01 * s,
            self.m02 * s,
            self.m11 * s,
            self.m12 * s,
            self.m22 * s,
        )
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::new(
            self.m00 + other.m00,
            self.m01 + other.m01,
            self.m02 + other.m02,
            self.m11 + other.m11,
            self.m12 + other.m12,
            self.m22 + other.m22,
        )
    }

    pub fn mul_vec(&self, v: [f64; 3]) -> [f64; 3] {
        [
            self.m00 * v[0] + self.m01 * v[1] + self.m02 * v[2],
            self.m01 * v[0] + self.m11 * v[1] + self.m12 * v[2],
            self.m02 * v[0] + self.m12 * v[1] + self.m22 * v[2],
        ]
    }

    #[inline]
    pub fn mul_complex(&self, v: [Complex64; 3]) -> [Complex64; 3] {
        [
            v[0] * self.m00 + v[1] * self.m01 + v[2] * self.m02,
            v[0] * self.m01 + v[1] * self.m11 + v[2] * self.m12,
            v[0] * self.m02 + v[1] * self.m12 + v[2] * self.m22,
        ]
    }
}

const SINGULAR_TOLERANCE: f64 = 1e-12;

// ============================================================================
// User dielectric functions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DielectricValue {
    Scalar(f64),
    Tensor(SymmetricMatrix),
}

impl From<f64> for DielectricValue {
    fn from(value: f64) -> Self {
        DielectricValue::Scalar(value)
    }
}

impl From<SymmetricMatrix> for DielectricValue {
    fn from(value: SymmetricMatrix) -> Self {
        DielectricValue::Tensor(value)
    }
}

/// Pure ε(r) in cartesian coordinates. Called many times per grid point,
/// possibly from several threads.
pub trait DielectricFunction: Sync {
    fn epsilon(&self, r: [f64; 3]) -> DielectricValue;

    /// ε at fractional coordinates `frac` of `lattice`. The sampler calls
    /// this for every sub-sample; functions that already work in lattice
    /// coordinates override it to skip the cartesian round trip.
    fn epsilon_in_cell(&self, lattice: &Lattice3D, frac: [f64; 3]) -> DielectricValue {
        self.epsilon(lattice.fractional_to_cartesian(frac))
    }
}

impl<F> DielectricFunction for F
where
    F: Fn([f64; 3]) -> DielectricValue + Sync,
{
    fn epsilon(&self, r: [f64; 3]) -> DielectricValue {
        self(r)
    }
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DielectricOptions {
    /// Oversampling sub-mesh per coarse point; clamped to 1 along
    /// dimensions of size 1.
    pub mesh_size: [usize; 3],
    pub interface_smoothing: bool,
    pub interface_tolerance: f64,
}

impl Default for DielectricOptions {
    fn default() -> Self {
        Self {
            mesh_size: [1, 1, 1],
            interface_smoothing: true,
            interface_tolerance: 1e-6,
        }
    }
}

impl DielectricOptions {
    pub fn effective_mesh(&self, geometry: &GridGeometry) -> [usize; 3] {
        let dims = geometry.dims();
        let mut mesh = [1; 3];
        for d in 0..3 {
            mesh[d] = if dims[d] == 1 {
                1
            } else {
                self.mesh_size[d].max(1)
            };
        }
        mesh
    }

    pub fn tolerance(&self) -> f64 {
        self.interface_tolerance.max(1e-12)
    }
}

// ============================================================================
// Tensor field
// ============================================================================

/// Per-point inverse dielectric tensors for the local slab.
#[derive(Debug, Clone)]
pub struct DielectricTensorField {
    eps_inv: Vec<SymmetricMatrix>,
    eps_mean: f64,
    eps_inv_mean: f64,
}

struct PointSample {
    eps_inv: SymmetricMatrix,
    eps_avg: f64,
    smoothed: bool,
}

impl DielectricTensorField {
    /// Samples `epsilon` over the local slab. The means are reduced over all
    /// processes through `collective`, so every process must call this.
    pub fn sample<F, C>(
        geometry: &GridGeometry,
        lattice: &Lattice3D,
        epsilon: &F,
        opts: &DielectricOptions,
        collective: &C,
    ) -> Result<Self, MaxwellError>
    where
        F: DielectricFunction + ?Sized,
        C: Collective + ?Sized,
    {
        let mesh = opts.effective_mesh(geometry);
        debug!(
            "sampling dielectric on {} local points with sub-mesh {:?}",
            geometry.local_n, mesh
        );

        let samples = (0..geometry.local_n)
            .into_par_iter()
            .map(|i| sample_point(geometry, lattice, epsilon, opts, mesh, i))
            .collect::<Result<Vec<_>, _>>()?;

        let mut eps_sum = 0.0;
        let mut eps_inv_sum = 0.0;
        let mut smoothed = 0usize;
        let mut eps_inv = Vec::with_capacity(samples.len());
        for sample in samples {
            eps_sum += sample.eps_avg;
            eps_inv_sum += sample.eps_inv.trace() / 3.0;
            smoothed += usize::from(sample.smoothed);
            eps_inv.push(sample.eps_inv);
        }

        let total = geometry.n as f64;
        let eps_mean = collective.all_reduce_sum(eps_sum) / total;
        let eps_inv_mean = collective.all_reduce_sum(eps_inv_sum) / total;
        info!(
            "dielectric sampled: mean eps = {eps_mean:.6}, mean inverse eps = {eps_inv_mean:.6}, {smoothed} locally smoothed points"
        );

        Ok(Self {
            eps_inv,
            eps_mean,
            eps_inv_mean,
        })
    }

    pub fn len(&self) -> usize {
        self.eps_inv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eps_inv.is_empty()
    }

    pub fn eps_inv(&self) -> &[SymmetricMatrix] {
        &self.eps_inv
    }

    /// Mean of trace(ε)/3 over the whole grid, before inversion.
    pub fn eps_mean(&self) -> f64 {
        self.eps_mean
    }

    /// Mean of trace(ε⁻¹)/3 over the whole grid.
    pub fn eps_inv_mean(&self) -> f64 {
        self.eps_inv_mean
    }
}

#[inline]
fn sub_offset(index: usize, mesh: usize) -> f64 {
    (index as f64 + 0.5) / mesh as f64 - 0.5
}

fn physical_error(point: [usize; 3], reason: String) -> MaxwellError {
    MaxwellError::PhysicalModel { point, reason }
}

fn sample_point<F>(
    geometry: &GridGeometry,
    lattice: &Lattice3D,
    epsilon: &F,
    opts: &DielectricOptions,
    mesh: [usize; 3],
    i: usize,
) -> Result<PointSample, MaxwellError>
where
    F: DielectricFunction + ?Sized,
{
    let point = geometry.local_coords(i);
    let dims = geometry.dims();
    let center_frac = [
        point[0] as f64 / dims[0] as f64,
        point[1] as f64 / dims[1] as f64,
        point[2] as f64 / dims[2] as f64,
    ];
    let center = lattice.fractional_to_cartesian(center_frac);
    let count = (mesh[0] * mesh[1] * mesh[2]) as f64;

    let mut tensor_sum = SymmetricMatrix::default();
    let mut scalar_sum = 0.0;
    let mut inv_sum = 0.0;
    let mut moment = [0.0; 3];
    let mut eps_min = f64::MAX;
    let mut eps_max = f64::MIN;
    let mut any_tensor = false;

    for a in 0..mesh[0] {
        for b in 0..mesh[1] {
            for c in 0..mesh[2] {
                let frac = [
                    (point[0] as f64 + sub_offset(a, mesh[0])) / dims[0] as f64,
                    (point[1] as f64 + sub_offset(b, mesh[1])) / dims[1] as f64,
                    (point[2] as f64 + sub_offset(c, mesh[2])) / dims[2] as f64,
                ];
                let r = lattice.fractional_to_cartesian(frac);
                match epsilon.epsilon_in_cell(lattice, frac) {
                    DielectricValue::Scalar(eps) => {
                        if !(eps.is_finite() && eps > 0.0) {
                            return Err(physical_error(
                                point,
                                format!("permittivity must be positive and finite, got {eps}"),
                            ));
                        }
                        scalar_sum += eps;
                        inv_sum += 1.0 / eps;
                        eps_min = eps_min.min(eps);
                        eps_max = eps_max.max(eps);
                        for d in 0..3 {
                            moment[d] += eps * (r[d] - center[d]);
                        }
                        tensor_sum = tensor_sum.add(&SymmetricMatrix::isotropic(eps));
                    }
                    DielectricValue::Tensor(eps) => {
                        if !eps.is_finite() {
                            return Err(physical_error(
                                point,
                                "permittivity tensor has non-finite entries".to_string(),
                            ));
                        }
                        any_tensor = true;
                        tensor_sum = tensor_sum.add(&eps);
                    }
                }
            }
        }
    }

    let eps_avg_tensor = tensor_sum.scaled(1.0 / count);
    let eps_avg = eps_avg_tensor.trace() / 3.0;

    let mut smoothed = false;
    let eps_eff = if any_tensor || !opts.interface_smoothing {
        eps_avg_tensor
    } else if (eps_max - eps_min) > opts.tolerance() {
        smoothed = true;
        let mean = scalar_sum / count;
        let harmonic = count / inv_sum;
        let moment_norm = (moment[0] * moment[0] + moment[1] * moment[1] + moment[2] * moment[2]).sqrt();
        let moment_scale = mean * count * cell_extent(lattice, dims);
        if moment_scale > 0.0 && moment_norm / moment_scale > opts.tolerance() {
            let normal = [
                moment[0] / moment_norm,
                moment[1] / moment_norm,
                moment[2] / moment_norm,
            ];
            anisotropic_tensor(normal, mean, harmonic)
        } else {
            SymmetricMatrix::isotropic(harmonic)
        }
    } else {
        eps_avg_tensor
    };

    let eps_inv = eps_eff.invert().ok_or_else(|| {
        physical_error(
            point,
            format!("dielectric tensor {eps_eff:?} is not positive-definite"),
        )
    })?;

    Ok(PointSample {
        eps_inv,
        eps_avg,
        smoothed,
    })
}

/// Largest coarse-cell edge, used to normalize the first moment.
fn cell_extent(lattice: &Lattice3D, dims: [usize; 3]) -> f64 {
    let len = |v: [f64; 3]| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    (len(lattice.r1) / dims[0] as f64)
        .max(len(lattice.r2) / dims[1] as f64)
        .max(len(lattice.r3) / dims[2] as f64)
}

/// ε_eff = ⟨ε⟩ (I − P) + ⟨ε⁻¹⟩⁻¹ P with P the projector on the interface
/// normal: fields along the normal see the harmonic mean.
fn anisotropic_tensor(normal: [f64; 3], mean: f64, harmonic: f64) -> SymmetricMatrix {
    let p = SymmetricMatrix::projector(normal);
    SymmetricMatrix::isotropic(mean).add(&p.scaled(harmonic - mean))
}
