//! Geometry descriptions (background plus periodic inclusions).
//!
//! Inclusions are placed in fractional coordinates of the lattice and
//! tested with the minimum-image convention, so an object near a cell face
//! also covers the neighbouring image. Later inclusions take precedence.

use serde::{Deserialize, Serialize};

use crate::dielectric::{DielectricFunction, DielectricValue};
use crate::lattice::Lattice3D;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Inclusion {
    Sphere {
        center: [f64; 3],
        radius: f64,
        eps: f64,
    },
    /// Infinite cylinder along z.
    Cylinder {
        center: [f64; 3],
        radius: f64,
        eps: f64,
    },
    /// Layer `lower <= s < upper` along fractional axis `axis` (0, 1 or 2).
    Layer {
        axis: usize,
        lower: f64,
        upper: f64,
        eps: f64,
    },
}

impl Inclusion {
    pub fn eps(&self) -> f64 {
        match self {
            Inclusion::Sphere { eps, .. }
            | Inclusion::Cylinder { eps, .. }
            | Inclusion::Layer { eps, .. } => *eps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry3D {
    pub lattice: Lattice3D,
    #[serde(default = "default_eps_bg")]
    pub eps_bg: f64,
    #[serde(default)]
    pub inclusions: Vec<Inclusion>,
}

fn default_eps_bg() -> f64 {
    1.0
}

impl Geometry3D {
    pub fn uniform(lattice: Lattice3D, eps: f64) -> Self {
        Self {
            lattice,
            eps_bg: eps,
            inclusions: Vec::new(),
        }
    }

    /// Two-layer stack along `r1`: `eps_a` for `0 <= s < fraction`, `eps_b`
    /// elsewhere.
    pub fn bilayer(lattice: Lattice3D, eps_a: f64, eps_b: f64, fraction: f64) -> Self {
        Self {
            lattice,
            eps_bg: eps_b,
            inclusions: vec![Inclusion::Layer {
                axis: 0,
                lower: 0.0,
                upper: fraction,
                eps: eps_a,
            }],
        }
    }

    pub fn relative_permittivity_at_fractional(&self, frac: [f64; 3]) -> f64 {
        let wrapped = [wrap_unit(frac[0]), wrap_unit(frac[1]), wrap_unit(frac[2])];
        self.inclusions
            .iter()
            .rev()
            .find(|inc| self.contains(inc, wrapped))
            .map(Inclusion::eps)
            .unwrap_or(self.eps_bg)
    }

    fn contains(&self, inclusion: &Inclusion, frac: [f64; 3]) -> bool {
        match inclusion {
            Inclusion::Sphere { center, radius, .. } => {
                let d = self.min_image(frac, *center, [true, true, true]);
                d[0] * d[0] + d[1] * d[1] + d[2] * d[2] <= radius * radius
            }
            Inclusion::Cylinder { center, radius, .. } => {
                let d = self.min_image(frac, *center, [true, true, false]);
                d[0] * d[0] + d[1] * d[1] <= radius * radius
            }
            Inclusion::Layer {
                axis, lower, upper, ..
            } => {
                let s = frac[(*axis).min(2)];
                s >= *lower && s < *upper
            }
        }
    }

    /// Cartesian separation to the nearest periodic image of `center`,
    /// restricted to the flagged axes.
    fn min_image(&self, frac: [f64; 3], center: [f64; 3], axes: [bool; 3]) -> [f64; 3] {
        let mut delta = [0.0; 3];
        for d in 0..3 {
            if axes[d] {
                let mut diff = frac[d] - center[d];
                diff -= diff.round();
                delta[d] = diff;
            }
        }
        self.lattice.fractional_to_cartesian(delta)
    }
}

impl DielectricFunction for Geometry3D {
    fn epsilon(&self, r: [f64; 3]) -> DielectricValue {
        // A degenerate lattice yields NaN, which the sampler rejects.
        match self.lattice.cartesian_to_fractional(r) {
            Ok(frac) => DielectricValue::Scalar(self.relative_permittivity_at_fractional(frac)),
            Err(_) => DielectricValue::Scalar(f64::NAN),
        }
    }

    fn epsilon_in_cell(&self, lattice: &Lattice3D, frac: [f64; 3]) -> DielectricValue {
        if *lattice == self.lattice {
            DielectricValue::Scalar(self.relative_permittivity_at_fractional(frac))
        } else {
            self.epsilon(lattice.fractional_to_cartesian(frac))
        }
    }
}

fn wrap_unit(s: f64) -> f64 {
    let w = s - s.floor();
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}
