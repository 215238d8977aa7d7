//! Linear area fits against the full optimizer.

use crate::test_helpers::{calibration, init_tracing, noisy_spectrum, synthetic_spectrum, CHANNELS};
use approx::assert_relative_eq;
use xrffit_rs::config::{BackgroundMethod, XrfConfig};
use xrffit_rs::error::XrfError;
use xrffit_rs::fit::{BatchItem, FitSolver};
use xrffit_rs::lines::LineTable;
use xrffit_rs::parameters::FitParameters;

fn solver() -> FitSolver {
    FitSolver::new(XrfConfig::new().with_background(BackgroundMethod::Linear)).unwrap()
}

#[test]
fn test_linear_areas_match_optimizer() {
    init_tracing();
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 3000.0), ("Cu_K", 1500.0)]);

    let start = solver.default_parameters(&spectrum, &groups).unwrap();
    let optimized = solver.fit(&spectrum, &groups, &start).unwrap();
    assert!(optimized.converged);

    let model = solver
        .linear_model(calibration(), CHANNELS, &groups, &FitParameters::new())
        .unwrap();
    let outcomes = solver.fit_batch_linear(&model, &[BatchItem::new(spectrum)]);
    let linear = outcomes[0].result.as_ref().unwrap();

    for group in ["Fe_K", "Cu_K"] {
        assert_relative_eq!(
            linear.area(group).unwrap(),
            optimized.area(group).unwrap(),
            max_relative = 2e-3
        );
    }
    assert!(linear.r_squared > 0.999);
}

#[test]
fn test_absent_element_is_not_negative() {
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K", "Zn_K"]).unwrap();
    let model = solver
        .linear_model(calibration(), CHANNELS, &groups, &FitParameters::new())
        .unwrap();

    let items: Vec<BatchItem> = (0..4)
        .map(|seed| BatchItem::new(noisy_spectrum(20.0, &[("Fe_K", 3000.0)], seed)))
        .collect();
    for outcome in solver.fit_batch_linear(&model, &items) {
        let result = outcome.result.unwrap();
        assert!(result.area("Zn_K").unwrap() >= 0.0);
        assert_relative_eq!(result.area("Fe_K").unwrap(), 3000.0, max_relative = 0.08);
    }
}

#[test]
fn test_linear_batch_isolates_failures() {
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let model = solver
        .linear_model(calibration(), CHANNELS, &groups, &FitParameters::new())
        .unwrap();

    let mut items: Vec<BatchItem> = (0..4)
        .map(|seed| {
            let spectrum = noisy_spectrum(20.0, &[("Fe_K", 2000.0)], seed)
                .with_label(format!("pixel_{}", seed));
            BatchItem::new(spectrum)
        })
        .collect();
    items[1].spectrum.counts[50] = f64::NAN;
    items[2].spectrum.counts.truncate(CHANNELS - 100);

    let outcomes = solver.fit_batch_linear(&model, &items);
    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[3].label.as_deref(), Some("pixel_3"));
    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1].error(), Some(XrfError::MalformedSpectrum(_))));
    assert!(matches!(outcomes[2].error(), Some(XrfError::DimensionMismatch(_))));
    assert!(outcomes[3].is_ok());
}

#[test]
fn test_item_incident_energy_adds_scatter() {
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let model = solver
        .linear_model(calibration(), CHANNELS, &groups, &FitParameters::new())
        .unwrap();
    assert!(!model.names().iter().any(|name| name == "elastic"));

    let spectrum = noisy_spectrum(20.0, &[("Fe_K", 2000.0)], 3);
    let items = vec![
        BatchItem::new(spectrum.clone()),
        BatchItem::new(spectrum).with_incident_energy(10.0),
    ];
    let outcomes = solver.fit_batch_linear(&model, &items);
    let plain = outcomes[0].result.as_ref().unwrap();
    let scattered = outcomes[1].result.as_ref().unwrap();
    assert!(plain.element("elastic").is_none());
    assert!(scattered.element("elastic").is_some());
    assert!(scattered.element("compton").is_some());
}
