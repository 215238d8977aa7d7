//! Levenberg-Marquardt refinement of spectrum parameters.

use crate::test_helpers::{noisy_spectrum, synthetic_spectrum};
use approx::assert_relative_eq;
use xrffit_rs::config::{BackgroundMethod, XrfConfig};
use xrffit_rs::fit::{FitSolver, FitStrategy};
use xrffit_rs::lines::LineTable;
use xrffit_rs::lm::ConvergenceStatus;

fn linear_background_solver() -> FitSolver {
    FitSolver::new(XrfConfig::new().with_background(BackgroundMethod::Linear)).unwrap()
}

#[test]
fn test_recovers_synthetic_areas() {
    let solver = linear_background_solver();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0), ("Cu_K", 1500.0)]);
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let start = solver.default_parameters(&spectrum, &groups).unwrap();

    let result = solver.fit(&spectrum, &groups, &start).unwrap();
    assert_relative_eq!(result.area("Fe_K").unwrap(), 3000.0, max_relative = 1e-3);
    assert_relative_eq!(result.area("Cu_K").unwrap(), 1500.0, max_relative = 1e-3);
    assert_relative_eq!(result.params.value("bkg_const").unwrap(), 20.0, max_relative = 1e-2);
    assert!(result.r_squared > 0.999, "{}", result);
}

#[test]
fn test_noisy_fit_has_uncertainties() {
    let solver = linear_background_solver();
    let spectrum = noisy_spectrum(20.0, &[("Fe_K", 5000.0)], 3);
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let mut start = solver.default_parameters(&spectrum, &groups).unwrap();
    // Two peaks cannot pin down a quadratic calibration.
    start.set_vary("e_quadratic", false).unwrap();

    let result = solver.fit(&spectrum, &groups, &start).unwrap();
    let fe = result.element("Fe_K").unwrap();
    let stderr = fe.stderr.expect("area uncertainty");
    assert!(stderr > 0.0);
    // Poisson-limited: within a few standard errors of the truth.
    assert!((fe.area - 5000.0).abs() < 5.0 * stderr + 100.0, "{}", result);
    assert!(result.reduced_chi_square > 0.5 && result.reduced_chi_square < 2.0);
}

#[test]
fn test_fit_stays_inside_bounds() {
    let solver = linear_background_solver();
    let spectrum = noisy_spectrum(20.0, &[("Fe_K", 5000.0)], 5);
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let mut start = solver.default_parameters(&spectrum, &groups).unwrap();
    start.set_value("Fe_K_area", 500.0).unwrap();
    start.set_bounds("Fe_K_area", 0.0, 1000.0).unwrap();
    start.set_bounds("fwhm_offset", 0.09, 0.11).unwrap();

    let result = solver.fit(&spectrum, &groups, &start).unwrap();
    for param in result.params.iter() {
        assert!(
            param.value() >= param.min() && param.value() <= param.max(),
            "{} = {} outside [{}, {}]",
            param.name(),
            param.value(),
            param.min(),
            param.max()
        );
    }
    assert!(result.area("Fe_K").unwrap() > 500.0);
}

#[test]
fn test_fixed_parameters_are_unchanged() {
    let solver = linear_background_solver();
    let spectrum = noisy_spectrum(20.0, &[("Fe_K", 5000.0), ("Cu_K", 1500.0)], 9);
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let mut start = solver.default_parameters(&spectrum, &groups).unwrap();
    start.set_value("Cu_K_area", 1234.5).unwrap();
    start.set_vary("Cu_K_area", false).unwrap();
    start.set_value("e_offset", 0.003).unwrap();
    start.set_vary("e_offset", false).unwrap();

    let result = solver.fit(&spectrum, &groups, &start).unwrap();
    assert_eq!(result.params.value("Cu_K_area").unwrap(), 1234.5);
    assert_eq!(result.params.value("e_offset").unwrap(), 0.003);
    assert!(result.params.get("Cu_K_area").unwrap().stderr().is_none());
    assert_ne!(
        result.params.value("Fe_K_area").unwrap(),
        start.value("Fe_K_area").unwrap()
    );
}

#[test]
fn test_iteration_cap_returns_flagged_result() {
    let mut config = XrfConfig::new().with_background(BackgroundMethod::Linear);
    config.solver.max_iterations = 1;
    let solver = FitSolver::new(config).unwrap();
    let spectrum = noisy_spectrum(20.0, &[("Fe_K", 5000.0)], 1);
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let mut start = solver.default_parameters(&spectrum, &groups).unwrap();
    start.set_value("Fe_K_area", 10.0).unwrap();

    let result = solver.fit(&spectrum, &groups, &start).unwrap();
    assert!(!result.converged);
    assert_eq!(result.status, ConvergenceStatus::MaxIterationsReached);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_sequential_strategies() {
    let solver = linear_background_solver();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0), ("Cu_K", 1500.0)]);
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let start = solver.default_parameters(&spectrum, &groups).unwrap();

    let strategies = [FitStrategy::linear(), FitStrategy::free_all()];
    let result = solver
        .fit_with_strategies(&spectrum, &groups, &start, &strategies)
        .unwrap();
    assert_relative_eq!(result.area("Fe_K").unwrap(), 3000.0, max_relative = 1e-3);
    assert_relative_eq!(result.area("Cu_K").unwrap(), 1500.0, max_relative = 1e-3);
    assert_eq!(result.params.varying_count(), start.varying_count());
}

#[test]
fn test_auto_fit_finds_and_fits() {
    let solver = linear_background_solver();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 4000.0)]);
    let (identification, result) = solver.auto_fit(&spectrum).unwrap();
    assert_eq!(identification.group_names(), vec!["Fe_K"]);
    assert_relative_eq!(result.area("Fe_K").unwrap(), 4000.0, max_relative = 1e-2);
}

#[test]
fn test_result_json() {
    let solver = linear_background_solver();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0)]).with_label("scan_001");
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let start = solver.default_parameters(&spectrum, &groups).unwrap();
    let result = solver.fit(&spectrum, &groups, &start).unwrap();

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["label"], "scan_001");
    assert_eq!(json["elements"][0]["group"], "Fe_K");
    assert_eq!(json["model"]["data"].as_array().map(Vec::len), Some(spectrum.len()));
}
