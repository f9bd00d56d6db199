#![cfg(test)]

use super::_tests_support::NaivePlanner;
use super::config::{ConfigError, MaxwellConfig};
use super::error::MaxwellError;
use super::maxwell::MaxwellData;
use super::polarization::Polarization;

const FULL: &str = r#"
polarization = "TE"

[grid]
size = [16, 8, 1]
num_bands = 6
num_fft_bands = 4

[dielectric]
mesh_size = [3, 3, 1]
interface_smoothing = false

[target]
frequency = 0.35
"#;

#[test]
fn parses_full_config() {
    let config = MaxwellConfig::from_toml_str(FULL).unwrap();
    assert_eq!(config.grid.size, [16, 8, 1]);
    assert_eq!(config.grid.num_bands, 6);
    assert_eq!(config.grid.effective_num_fft_bands(), 4);
    assert_eq!(config.polarization, Polarization::TE);
    assert_eq!(config.dielectric.mesh_size, [3, 3, 1]);
    assert!(!config.dielectric.interface_smoothing);
    assert_eq!(config.target_frequency(), Some(0.35));
}

#[test]
fn minimal_config_uses_defaults() {
    let config = MaxwellConfig::from_toml_str("[grid]\nsize = [4, 4, 4]\n").unwrap();
    assert_eq!(config.grid.num_bands, 8);
    assert_eq!(config.grid.effective_num_fft_bands(), 8);
    assert_eq!(config.polarization, Polarization::None);
    assert_eq!(config.dielectric.mesh_size, [1, 1, 1]);
    assert!(config.dielectric.interface_smoothing);
    assert_eq!(config.target_frequency(), None);
}

#[test]
fn polarization_in_3d_is_rejected() {
    let text = "polarization = \"TM\"\n[grid]\nsize = [4, 4, 4]\n";
    let err = MaxwellConfig::from_toml_str(text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid(MaxwellError::InvalidConfiguration(_))
    ));
}

#[test]
fn invalid_values_are_rejected() {
    for text in [
        "[grid]\nsize = [0, 4, 4]\n",
        "[grid]\nsize = [4, 4, 4]\nnum_bands = 0\n",
        "[grid]\nsize = [4, 4, 4]\nnum_fft_bands = 0\n",
        "[grid]\nsize = [4, 4, 4]\n[dielectric]\nmesh_size = [0, 1, 1]\n",
        "[grid]\nsize = [4, 4, 4]\n[target]\nfrequency = -0.1\n",
    ] {
        let err = MaxwellConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "accepted {text:?}");
    }
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = MaxwellConfig::from_toml_str("[grid\nsize = 3").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
    let err = MaxwellConfig::from_toml_str("polarization = \"XY\"\n[grid]\nsize = [1, 1, 1]\n")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = MaxwellConfig::from_path("/nonexistent/mpb3d/config.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn engine_is_created_from_config() {
    let config = MaxwellConfig::from_toml_str(FULL).unwrap();
    let data = MaxwellData::from_config(&config, &NaivePlanner).unwrap();
    let geom = data.geometry();
    assert_eq!(geom.dims(), [16, 8, 1]);
    assert_eq!(geom.num_bands, 6);
    assert_eq!(geom.num_fft_bands, 4);
}
