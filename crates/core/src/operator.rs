//! The Maxwell operator engine: curl ε⁻¹ curl, its diagonal preconditioner
//! and the polarization constraint.
//!
//! # Algorithm
//!
//! For a trial block in the transverse basis, band batches of at most
//! `num_fft_bands` columns are processed as follows:
//!
//! 1. `E = i (k+G) × H`. With `m × n = q̂` this is
//!    `i |k+G| (h_m n − h_n m)`, written as three cartesian components.
//! 2. Inverse transform to real space, multiply by ε⁻¹ (and 1/N).
//! 3. Forward transform back to reciprocal space.
//! 4. Second curl projected on `(m, n)`:
//!    `out_m = −i |k+G| n·E`, `out_n = i |k+G| m·E`.
//!
//! Step 4 is the adjoint of step 1 and the unnormalized transforms are
//! adjoint to each other, so the operator is Hermitian positive
//! semi-definite on transverse fields.

use log::trace;
use num_complex::Complex64;

use crate::backend::TransformBridge;
use crate::basis::BlochContext;
use crate::dielectric::DielectricTensorField;
use crate::error::MaxwellError;
use crate::field::{FieldBlock, TRANSVERSE_COMPONENTS};
use crate::grid::GridGeometry;
use crate::maxwell::MaxwellData;
use crate::preconditioner::diagonal_precondition;

/// Uniform `apply(X) -> Y` contract shared by the base and target operators.
pub trait BlockOperator {
    /// Writes `op(xin)` into `xout`. `is_current_eigenvector` flags a
    /// converged eigenvector; it only affects bookkeeping, never the result.
    fn apply(
        &mut self,
        xin: &FieldBlock,
        xout: &mut FieldBlock,
        is_current_eigenvector: bool,
    ) -> Result<(), MaxwellError>;
}

pub trait BlockPreconditioner {
    /// Writes an approximate inverse of `(op − λ_b)` applied to `xin` into
    /// `xout`. `y` is the current eigenvector block (unused by the diagonal
    /// preconditioners); `eigenvals` holds one Ritz value per band of `xin`.
    fn precondition(
        &mut self,
        xin: &FieldBlock,
        xout: &mut FieldBlock,
        y: &FieldBlock,
        eigenvals: Option<&[f64]>,
    ) -> Result<(), MaxwellError>;
}

pub trait BlockConstraint {
    /// Projects `x` onto the allowed subspace in place. Idempotent.
    fn constrain(&self, x: &mut FieldBlock) -> Result<(), MaxwellError>;
}

/// Counters exposed by the operator side channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorStats {
    pub applications: u64,
    pub eigenvector_applications: u64,
    pub columns: u64,
}

/// curl ε⁻¹ curl for one k-point and one dielectric.
pub struct MaxwellOperator<'a, T: TransformBridge> {
    data: &'a mut MaxwellData<T>,
    bloch: &'a BlochContext,
    dielectric: &'a DielectricTensorField,
}

impl<'a, T: TransformBridge> MaxwellOperator<'a, T> {
    pub fn new(
        data: &'a mut MaxwellData<T>,
        bloch: &'a BlochContext,
        dielectric: &'a DielectricTensorField,
    ) -> Result<Self, MaxwellError> {
        let local_n = data.geometry().local_n;
        if bloch.basis().len() != local_n {
            return Err(MaxwellError::invalid(format!(
                "k+G basis covers {} points, engine slab has {local_n}",
                bloch.basis().len()
            )));
        }
        if dielectric.len() != local_n {
            return Err(MaxwellError::invalid(format!(
                "dielectric covers {} points, engine slab has {local_n}",
                dielectric.len()
            )));
        }
        Ok(Self {
            data,
            bloch,
            dielectric,
        })
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.data.geometry()
    }

    pub fn bloch(&self) -> &BlochContext {
        self.bloch
    }

    pub fn dielectric(&self) -> &DielectricTensorField {
        self.dielectric
    }

    pub fn stats(&self) -> OperatorStats {
        self.data.stats()
    }

    /// Zeroes the DC coefficients at k = 0, removing the constant modes
    /// from the search space.
    pub fn zero_k_constraint(&self, x: &mut FieldBlock) -> Result<(), MaxwellError> {
        self.check_block(x)?;
        if !self.bloch.is_zero_k() || !self.geometry().owns_origin() {
            return Ok(());
        }
        for c in 0..TRANSVERSE_COMPONENTS {
            for b in 0..x.p() {
                x.set(0, c, b, Complex64::default());
            }
        }
        Ok(())
    }

    /// Number of exact zero-frequency (constant-field) modes at this k.
    pub fn zero_k_num_const_bands(&self) -> usize {
        if !self.bloch.is_zero_k() {
            0
        } else if self.bloch.polarization().is_constrained() {
            1
        } else {
            TRANSVERSE_COMPONENTS
        }
    }

    /// Overwrites the leading columns of `x` with the normalized constant
    /// modes (unit DC coefficient, zero elsewhere). Returns how many
    /// columns were set.
    pub fn zero_k_set_const_bands(&self, x: &mut FieldBlock) -> Result<usize, MaxwellError> {
        self.check_block(x)?;
        let count = self.zero_k_num_const_bands().min(x.p());
        if count == 0 {
            return Ok(0);
        }
        let components: &[usize] = match self.bloch.polarization().excluded_component() {
            Some(0) => &[1],
            Some(_) => &[0],
            None => &[0, 1],
        };
        for (b, &component) in components.iter().take(count).enumerate() {
            for point in 0..x.local_n() {
                for c in 0..TRANSVERSE_COMPONENTS {
                    x.set(point, c, b, Complex64::default());
                }
            }
            if self.geometry().owns_origin() {
                x.set(0, component, b, Complex64::new(1.0, 0.0));
            }
        }
        Ok(count)
    }

    pub(crate) fn check_block(&self, x: &FieldBlock) -> Result<(), MaxwellError> {
        let geometry = self.geometry();
        if x.local_n() != geometry.local_n {
            return Err(MaxwellError::invalid(format!(
                "field block has {} points, engine slab has {}",
                x.local_n(),
                geometry.local_n
            )));
        }
        if x.p() > geometry.num_bands {
            return Err(MaxwellError::invalid(format!(
                "field block has {} bands, engine was created for {}",
                x.p(),
                geometry.num_bands
            )));
        }
        Ok(())
    }

    pub(crate) fn check_pair(&self, xin: &FieldBlock, xout: &FieldBlock) -> Result<(), MaxwellError> {
        self.check_block(xin)?;
        if !xin.same_shape(xout) {
            return Err(MaxwellError::invalid(format!(
                "input block is {}x{}, output block is {}x{}",
                xin.local_n(),
                xin.p(),
                xout.local_n(),
                xout.p()
            )));
        }
        Ok(())
    }

    pub(crate) fn eps_inv_mean(&self) -> f64 {
        self.dielectric.eps_inv_mean()
    }
}

impl<T: TransformBridge> BlockOperator for MaxwellOperator<'_, T> {
    fn apply(
        &mut self,
        xin: &FieldBlock,
        xout: &mut FieldBlock,
        is_current_eigenvector: bool,
    ) -> Result<(), MaxwellError> {
        self.check_pair(xin, xout)?;
        if is_current_eigenvector {
            trace!("operator applied to {} converged eigenvector column(s)", xin.p());
        }
        self.data.record_application(xin.p(), is_current_eigenvector);

        let geometry = *self.data.geometry();
        let basis = self.bloch.basis().entries();
        let eps_inv = self.dielectric.eps_inv();
        let p = xin.p();
        let scale = 1.0 / geometry.n as f64;
        let (fft_data, bridge) = self.data.fft_parts();

        let mut band_start = 0;
        while band_start < p {
            let cur = geometry.num_fft_bands.min(p - band_start);
            let howmany = 3 * cur;
            // the bridge sees the padded slab; only the first local_n points carry data
            let buf = &mut fft_data[..geometry.alloc_n * howmany];

            // curl: transverse (m, n) → cartesian
            for (i, kpg) in basis.iter().enumerate() {
                let factor = Complex64::new(0.0, kpg.kmag);
                for b in 0..cur {
                    let hm = xin.get(i, 0, band_start + b);
                    let hn = xin.get(i, 1, band_start + b);
                    for c in 0..3 {
                        buf[(i * 3 + c) * cur + b] = factor * (hm * kpg.n[c] - hn * kpg.m[c]);
                    }
                }
            }

            bridge.inverse(buf, howmany);

            for (i, tensor) in eps_inv.iter().enumerate() {
                for b in 0..cur {
                    let base = i * 3 * cur + b;
                    let e = tensor.mul_complex([buf[base], buf[base + cur], buf[base + 2 * cur]]);
                    buf[base] = e[0] * scale;
                    buf[base + cur] = e[1] * scale;
                    buf[base + 2 * cur] = e[2] * scale;
                }
            }

            bridge.forward(buf, howmany);

            // curl again, projected back onto (m, n)
            for (i, kpg) in basis.iter().enumerate() {
                let factor = Complex64::new(0.0, kpg.kmag);
                for b in 0..cur {
                    let base = i * 3 * cur + b;
                    let e = [buf[base], buf[base + cur], buf[base + 2 * cur]];
                    let m_dot = e[0] * kpg.m[0] + e[1] * kpg.m[1] + e[2] * kpg.m[2];
                    let n_dot = e[0] * kpg.n[0] + e[1] * kpg.n[1] + e[2] * kpg.n[2];
                    xout.set(i, 0, band_start + b, -factor * n_dot);
                    xout.set(i, 1, band_start + b, factor * m_dot);
                }
            }

            band_start += cur;
        }
        Ok(())
    }
}

impl<T: TransformBridge> BlockPreconditioner for MaxwellOperator<'_, T> {
    fn precondition(
        &mut self,
        xin: &FieldBlock,
        xout: &mut FieldBlock,
        _y: &FieldBlock,
        eigenvals: Option<&[f64]>,
    ) -> Result<(), MaxwellError> {
        self.check_pair(xin, xout)?;
        let eps_inv_mean = self.eps_inv_mean();
        diagonal_precondition(
            xin,
            xout,
            self.bloch.basis().normsqr(),
            eigenvals,
            |normsqr| normsqr * eps_inv_mean,
        )
    }
}

impl<T: TransformBridge> BlockConstraint for MaxwellOperator<'_, T> {
    fn constrain(&self, x: &mut FieldBlock) -> Result<(), MaxwellError> {
        self.check_block(x)?;
        let polarization = self.bloch.polarization();
        let Some(component) = polarization.excluded_component() else {
            return Ok(());
        };
        if !self.geometry().is_2d() {
            return Err(MaxwellError::invalid(format!(
                "{polarization} constraint requested on a 3D grid"
            )));
        }
        for point in 0..x.local_n() {
            for b in 0..x.p() {
                x.set(point, component, b, Complex64::default());
            }
        }
        Ok(())
    }
}
