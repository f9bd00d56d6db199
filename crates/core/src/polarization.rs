//! Polarization modes (TE/TM/unconstrained).

use serde::{Deserialize, Serialize};

/// TE keeps only the `m` (H_z) component, TM only the `n` (in-plane H)
/// component. Meaningful only for `nz == 1` with an in-plane wavevector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarization {
    TE,
    TM,
    #[default]
    None,
}

impl Polarization {
    pub fn is_constrained(self) -> bool {
        !matches!(self, Polarization::None)
    }

    /// Transverse component index zeroed by the constraint, if any.
    pub(crate) fn excluded_component(self) -> Option<usize> {
        match self {
            Polarization::TE => Some(1),
            Polarization::TM => Some(0),
            Polarization::None => None,
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::TE => write!(f, "TE"),
            Polarization::TM => write!(f, "TM"),
            Polarization::None => write!(f, "NONE"),
        }
    }
}
