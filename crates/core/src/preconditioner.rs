//! Diagonal preconditioners shared by the base and target operators.
//!
//! The operator is approximated per plane wave by a scalar `s(|k+G|²)`
//! (`|k+G|² ⟨ε⁻¹⟩` for the base operator). With Ritz estimates the
//! preconditioner applies `1 / (d + copysign(PRECOND_MIN_DENOM, d))` where
//! `d = s − λ_b`, which stays bounded when `s` crosses `λ_b`. Without
//! estimates it applies `1 / s`, or the identity where `s = 0` (the DC mode
//! at k = 0). Cost is O(N) with no transforms.

use crate::error::MaxwellError;
use crate::field::{FieldBlock, TRANSVERSE_COMPONENTS};

/// Smallest magnitude allowed in a shifted denominator.
pub const PRECOND_MIN_DENOM: f64 = 5e-3;

#[inline]
pub fn shifted_inverse(s: f64, eigenval: Option<f64>) -> f64 {
    match eigenval {
        Some(lambda) => {
            let d = s - lambda;
            1.0 / (d + PRECOND_MIN_DENOM.copysign(d))
        }
        None => {
            if s != 0.0 {
                1.0 / s
            } else {
                1.0
            }
        }
    }
}

pub(crate) fn diagonal_precondition<F>(
    xin: &FieldBlock,
    xout: &mut FieldBlock,
    normsqr: &[f64],
    eigenvals: Option<&[f64]>,
    diagonal: F,
) -> Result<(), MaxwellError>
where
    F: Fn(f64) -> f64,
{
    let p = xin.p();
    if let Some(eigs) = eigenvals {
        if eigs.len() < p {
            return Err(MaxwellError::invalid(format!(
                "{} eigenvalue estimates for {p} bands",
                eigs.len()
            )));
        }
    }
    for (point, &kpg2) in normsqr.iter().enumerate().take(xin.local_n()) {
        let s = diagonal(kpg2);
        for b in 0..p {
            let factor = shifted_inverse(s, eigenvals.map(|e| e[b]));
            for c in 0..TRANSVERSE_COMPONENTS {
                xout.set(point, c, b, xin.get(point, c, b) * factor);
            }
        }
    }
    Ok(())
}
