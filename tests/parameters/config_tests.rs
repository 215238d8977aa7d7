//! Tests for configuration files.

use tempfile::tempdir;
use xrffit_rs::config::{BackgroundMethod, XrfConfig};
use xrffit_rs::error::XrfError;

#[test]
fn test_config_file_round_trip() {
    let mut config = XrfConfig::new()
        .with_incident_energy(12.5)
        .with_background(BackgroundMethod::Snip { width: 4.0 })
        .with_energy_range(1.0, 11.0);
    config.identify.threshold_sigma = 4.0;

    let dir = tempdir().unwrap();
    let path = dir.path().join("xrf.json");
    config.save_json(&path).unwrap();
    let loaded = XrfConfig::load_json(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_background_method_json() {
    let config = XrfConfig::from_json(r#"{"fit": {"background": {"method": "linear"}}}"#).unwrap();
    assert_eq!(config.fit.background, BackgroundMethod::Linear);

    let config =
        XrfConfig::from_json(r#"{"fit": {"background": {"method": "snip", "width": 2.0}}}"#)
            .unwrap();
    assert_eq!(config.fit.background, BackgroundMethod::Snip { width: 2.0 });
}

#[test]
fn test_invalid_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"energy_range": {"low": 8.0, "high": 2.0}}"#).unwrap();
    assert!(matches!(
        XrfConfig::load_json(&path),
        Err(XrfError::InvalidConfig(_))
    ));

    assert!(matches!(
        XrfConfig::load_json(dir.path().join("missing.json")),
        Err(XrfError::Io(_))
    ));
}
