//! Engine configuration loaded from TOML.
//!
//! # File Format
//!
//! ```toml
//! polarization = "TE"
//!
//! [grid]
//! size = [32, 32, 1]
//! num_bands = 8
//! num_fft_bands = 4
//!
//! [dielectric]
//! mesh_size = [3, 3, 1]
//! interface_smoothing = true
//!
//! [target]
//! frequency = 0.35
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dielectric::DielectricOptions;
use crate::error::MaxwellError;
use crate::polarization::Polarization;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub size: [usize; 3],
    #[serde(default = "default_num_bands")]
    pub num_bands: usize,
    /// Bands per transform batch; defaults to `num_bands`.
    #[serde(default)]
    pub num_fft_bands: Option<usize>,
}

fn default_num_bands() -> usize {
    8
}

impl GridConfig {
    pub fn effective_num_fft_bands(&self) -> usize {
        self.num_fft_bands.unwrap_or(self.num_bands)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub frequency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxwellConfig {
    pub grid: GridConfig,
    #[serde(default)]
    pub polarization: Polarization,
    #[serde(default)]
    pub dielectric: DielectricOptions,
    #[serde(default)]
    pub target: Option<TargetConfig>,
}

impl MaxwellConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), MaxwellError> {
        let [nx, ny, nz] = self.grid.size;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(MaxwellError::invalid(format!(
                "grid size must be non-zero, got {:?}",
                self.grid.size
            )));
        }
        if self.grid.num_bands == 0 || self.grid.effective_num_fft_bands() == 0 {
            return Err(MaxwellError::invalid("band counts must be non-zero"));
        }
        if self.dielectric.mesh_size.contains(&0) {
            return Err(MaxwellError::invalid("dielectric mesh_size entries must be >= 1"));
        }
        if self.polarization.is_constrained() && nz != 1 {
            return Err(MaxwellError::invalid(format!(
                "{} polarization requires nz = 1",
                self.polarization
            )));
        }
        if let Some(target) = &self.target {
            if !(target.frequency.is_finite() && target.frequency >= 0.0) {
                return Err(MaxwellError::invalid(format!(
                    "target frequency must be finite and non-negative, got {}",
                    target.frequency
                )));
            }
        }
        Ok(())
    }

    pub fn target_frequency(&self) -> Option<f64> {
        self.target.as_ref().map(|t| t.frequency)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] MaxwellError),
}
