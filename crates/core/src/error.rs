//! Error taxonomy for the operator engine.
//!
//! None of these errors is transient. They all stem from a structural
//! misconfiguration or from a physically invalid material model, and are
//! detected during setup (grid creation, k-update, dielectric sampling) or
//! as shape mismatches on the hot path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaxwellError {
    /// A buffer or transform plan could not be constructed.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// The dielectric model is degenerate at a grid point.
    #[error("invalid dielectric at grid point {point:?}: {reason}")]
    PhysicalModel { point: [usize; 3], reason: String },

    /// Caller programming error (wrong shapes, polarization in 3D, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl MaxwellError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MaxwellError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn allocation(msg: impl Into<String>) -> Self {
        MaxwellError::Allocation(msg.into())
    }
}
