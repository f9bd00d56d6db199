//! Target-frequency variant for interior eigenvalues.
//!
//! With `σ = ω_t²` the wrapped operator is `(A − σ)²`: Hermitian positive
//! semi-definite, with the same eigenvectors as `A` and eigenvalues
//! `(λ − σ)²`, so a solver that converges to the smallest eigenvalues finds
//! the modes of `A` nearest the target frequency. `ω_t = 0` reduces to `A`.

use log::debug;

use crate::backend::TransformBridge;
use crate::error::MaxwellError;
use crate::field::FieldBlock;
use crate::operator::{BlockConstraint, BlockOperator, BlockPreconditioner, MaxwellOperator};
use crate::preconditioner::diagonal_precondition;

pub struct TargetOperator<'a, T: TransformBridge> {
    base: MaxwellOperator<'a, T>,
    target_frequency: f64,
    scratch: FieldBlock,
}

impl<'a, T: TransformBridge> TargetOperator<'a, T> {
    pub fn new(base: MaxwellOperator<'a, T>, target_frequency: f64) -> Result<Self, MaxwellError> {
        if !(target_frequency.is_finite() && target_frequency >= 0.0) {
            return Err(MaxwellError::invalid(format!(
                "target frequency must be finite and non-negative, got {target_frequency}"
            )));
        }
        let geometry = base.geometry();
        let scratch = FieldBlock::zeros(geometry.local_n, geometry.num_bands);
        debug!("target operator at frequency {target_frequency}");
        Ok(Self {
            base,
            target_frequency,
            scratch,
        })
    }

    pub fn target_frequency(&self) -> f64 {
        self.target_frequency
    }

    /// σ = ω_t².
    pub fn shift(&self) -> f64 {
        self.target_frequency * self.target_frequency
    }

    pub fn base(&self) -> &MaxwellOperator<'a, T> {
        &self.base
    }

    /// Releases the scratch block and hands back the base operator.
    pub fn destroy(self) -> MaxwellOperator<'a, T> {
        self.base
    }
}

impl<T: TransformBridge> BlockOperator for TargetOperator<'_, T> {
    fn apply(
        &mut self,
        xin: &FieldBlock,
        xout: &mut FieldBlock,
        is_current_eigenvector: bool,
    ) -> Result<(), MaxwellError> {
        let sigma = self.shift();
        if sigma == 0.0 {
            return self.base.apply(xin, xout, is_current_eigenvector);
        }
        self.base.check_pair(xin, xout)?;

        // Reuse the num_bands-wide scratch when the block matches it.
        let mut t = if self.scratch.p() == xin.p() {
            std::mem::replace(&mut self.scratch, FieldBlock::zeros(0, 0))
        } else {
            FieldBlock::zeros(xin.local_n(), xin.p())
        };
        let result = shifted_square(&mut self.base, xin, &mut t, xout, sigma, is_current_eigenvector);
        if t.p() == self.base.geometry().num_bands {
            self.scratch = t;
        }
        result
    }
}

/// `xout = (A − σ)² xin`, with `t` receiving `(A − σ) xin`.
fn shifted_square<T: TransformBridge>(
    base: &mut MaxwellOperator<'_, T>,
    xin: &FieldBlock,
    t: &mut FieldBlock,
    xout: &mut FieldBlock,
    sigma: f64,
    is_current_eigenvector: bool,
) -> Result<(), MaxwellError> {
    base.apply(xin, t, is_current_eigenvector)?;
    t.axpby(1.0, -sigma, xin);
    base.apply(t, xout, false)?;
    xout.axpby(1.0, -sigma, t);
    Ok(())
}

impl<T: TransformBridge> BlockPreconditioner for TargetOperator<'_, T> {
    fn precondition(
        &mut self,
        xin: &FieldBlock,
        xout: &mut FieldBlock,
        _y: &FieldBlock,
        eigenvals: Option<&[f64]>,
    ) -> Result<(), MaxwellError> {
        self.base.check_pair(xin, xout)?;
        let sigma = self.shift();
        let eps_inv_mean = self.base.eps_inv_mean();
        diagonal_precondition(
            xin,
            xout,
            self.base.bloch().basis().normsqr(),
            eigenvals,
            |normsqr| {
                let d = normsqr * eps_inv_mean - sigma;
                d * d
            },
        )
    }
}

impl<T: TransformBridge> BlockConstraint for TargetOperator<'_, T> {
    fn constrain(&self, x: &mut FieldBlock) -> Result<(), MaxwellError> {
        self.base.constrain(x)
    }
}
