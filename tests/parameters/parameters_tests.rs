//! Tests for FitParameters in the context of a spectrum model.

use crate::test_helpers::synthetic_spectrum;
use tempfile::tempdir;
use xrffit_rs::config::{BackgroundMethod, XrfConfig};
use xrffit_rs::fit::FitSolver;
use xrffit_rs::lines::LineTable;
use xrffit_rs::parameters::{FitParameters, ParamKind};

#[test]
fn test_default_parameters_layout() {
    let config = XrfConfig::new()
        .with_background(BackgroundMethod::Linear)
        .with_incident_energy(11.0);
    let solver = FitSolver::new(config).unwrap();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0)]);
    let groups = LineTable::global().resolve(&["Fe", "Cu"]).unwrap();
    let params = solver.default_parameters(&spectrum, &groups).unwrap();

    assert_eq!(
        params.names(),
        vec![
            "Fe_K_area",
            "Fe_K_delta_center",
            "Cu_K_area",
            "Cu_K_delta_center",
            "e_offset",
            "e_linear",
            "e_quadratic",
            "fwhm_offset",
            "fwhm_fanoprime",
            "bkg_const",
            "bkg_linear",
            "elastic_area",
            "compton_area",
        ]
    );
    assert_eq!(params.get("Fe_K_area").unwrap().kind(), ParamKind::Amplitude);
    assert_eq!(params.get("elastic_area").unwrap().kind(), ParamKind::Scatter);
    for param in params.iter() {
        let value = param.value();
        assert!(value >= param.min() && value <= param.max(), "{}", param.name());
    }
    // Cu is absent from the spectrum but still starts above zero.
    assert!(params.value("Cu_K_area").unwrap() >= 1.0);
}

#[test]
fn test_parameters_file_round_trip() {
    let solver = FitSolver::new(XrfConfig::new()).unwrap();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0)]);
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let mut params = solver.default_parameters(&spectrum, &groups).unwrap();
    params.set_vary("fwhm_fanoprime", false).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("params.json");
    params.save_json(&path).unwrap();
    let loaded = FitParameters::load_json(&path).unwrap();

    assert_eq!(loaded, params);
    assert!(loaded.get("Fe_K_area").unwrap().max().is_infinite());
    assert!(!loaded.get("fwhm_fanoprime").unwrap().vary());
}

#[test]
fn test_out_of_bounds_json_is_rejected() {
    let json = r#"{"params": [
        {"name": "Fe_K_area", "kind": "amplitude", "value": -3.0, "bounds": {"min": 0.0}}
    ]}"#;
    assert!(FitParameters::from_json(json).is_err());
}
