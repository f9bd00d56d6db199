//! Plane-wave Maxwell operator engine for photonic band structures.
//!
//! The crate provides the pieces an external block eigensolver calls
//! repeatedly: the operator curl ε⁻¹ curl on transverse trial vectors, a
//! diagonal preconditioner, a TE/TM polarization constraint and a
//! target-frequency variant. Fourier transforms are delegated to a
//! [`backend::TransformBridge`].
//!
//! Typical setup:
//!
//! ```ignore
//! let mut data = MaxwellData::create([32, 32, 1], 8, 4, &planner)?;
//! let reciprocal = lattice.reciprocal()?;
//! let bloch = BlochContext::new(data.geometry(), reciprocal, k, Polarization::TE)?;
//! let eps = data.sample_dielectric(&lattice, &geometry, &DielectricOptions::default())?;
//! let mut op = data.operator(&bloch, &eps)?;
//! op.apply(&x, &mut ax, false)?;
//! ```

pub mod backend;
pub mod basis;
pub mod config;
pub mod dielectric;
pub mod error;
pub mod field;
pub mod geometry;
pub mod grid;
pub mod lattice;
pub mod maxwell;
pub mod operator;
pub mod polarization;
pub mod preconditioner;
pub mod target;

pub use error::MaxwellError;


#[cfg(test)]
mod _tests_config;
#[cfg(test)]
mod _tests_lattice;
