//! Forward calculation without optimization.

use crate::test_helpers::{synthetic_counts, synthetic_spectrum};
use approx::assert_relative_eq;
use rayon::prelude::*;
use xrffit_rs::config::{BackgroundMethod, XrfConfig};
use xrffit_rs::fit::FitSolver;
use xrffit_rs::lines::LineTable;

#[test]
fn test_forward_is_deterministic() {
    let solver = FitSolver::new(XrfConfig::new()).unwrap();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 5000.0), ("Cu_K", 800.0)]);
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let params = solver.default_parameters(&spectrum, &groups).unwrap();

    let first = solver.forward(&spectrum, &groups, &params).unwrap();
    let second = solver.forward(&spectrum, &groups, &params).unwrap();
    assert_eq!(first, second);

    // Same answer from many threads at once.
    let runs: Vec<_> = (0..8)
        .into_par_iter()
        .map(|_| solver.forward(&spectrum, &groups, &params).unwrap())
        .collect();
    assert!(runs.iter().all(|run| *run == first));
}

#[test]
fn test_forward_matches_independent_synthesis() {
    let config = XrfConfig::new().with_background(BackgroundMethod::None);
    let solver = FitSolver::new(config).unwrap();
    let expected = synthetic_counts(0.0, &[("Fe_K", 5000.0)]);
    let spectrum = synthetic_spectrum(0.0, &[("Fe_K", 5000.0)]);
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();

    let mut params = solver.default_parameters(&spectrum, &groups).unwrap();
    params.set_value("Fe_K_area", 5000.0).unwrap();
    let model = solver.forward(&spectrum, &groups, &params).unwrap();

    for (m, e) in model.iter().zip(expected.iter()) {
        assert_relative_eq!(*m, *e, epsilon = 1e-6, max_relative = 1e-6);
    }
}

#[test]
fn test_components_sum_to_model() {
    let mut config = XrfConfig::new().with_incident_energy(12.0);
    config.detector.escape_ratio = 0.01;
    let solver = FitSolver::new(config).unwrap();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 5000.0)]);
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();

    let model = solver.model(&spectrum, &groups).unwrap();
    let params = model.default_parameters().unwrap();
    let total = model.evaluate(&params).unwrap();
    let components = model.evaluate_components(&params).unwrap();

    let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Fe_K", "elastic", "compton", "background"]);
    let sum = components
        .iter()
        .fold(ndarray::Array1::<f64>::zeros(total.len()), |acc, c| acc + &c.counts);
    for (s, t) in sum.iter().zip(total.iter()) {
        assert_relative_eq!(*s, *t, epsilon = 1e-9);
    }
}

#[test]
fn test_roi_sums_track_peak_areas() {
    let solver = FitSolver::new(XrfConfig::new()).unwrap();
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let spectrum = synthetic_spectrum(0.0, &[("Fe_K", 4000.0), ("Cu_K", 1000.0)]);

    let sums = solver.roi_sums(&spectrum, &groups).unwrap();
    let names: Vec<&str> = sums.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Fe_K", "Cu_K"]);
    // ±2σ holds about 95% of the strongest line; Ka2 adds to it.
    assert!(sums[0].counts > 0.9 * 4000.0 && sums[0].counts < 1.6 * 4000.0);
    assert!(sums[1].counts > 0.9 * 1000.0 && sums[1].counts < 1.6 * 1000.0);
    assert!(sums[0].low < 6.40384 && sums[0].high > 6.40384);
}
