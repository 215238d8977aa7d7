//! Batch fitting isolates failures per item.

use crate::test_helpers::{calibration, init_tracing, noisy_spectrum, synthetic_counts};
use approx::assert_relative_eq;
use xrffit_rs::config::{BackgroundMethod, XrfConfig};
use xrffit_rs::error::XrfError;
use xrffit_rs::fit::{BatchItem, FitSolver};
use xrffit_rs::lines::LineTable;
use xrffit_rs::parameters::FitParameters;
use xrffit_rs::spectrum::{RawSpectrum, Spectrum};

fn solver() -> FitSolver {
    FitSolver::new(XrfConfig::new().with_background(BackgroundMethod::Linear)).unwrap()
}

fn items(n: usize) -> Vec<BatchItem> {
    (0..n)
        .map(|i| {
            let spectrum = noisy_spectrum(20.0, &[("Fe_K", 2000.0 + 500.0 * i as f64)], i as u64)
                .with_label(format!("scan_{:03}", i));
            BatchItem::new(spectrum)
        })
        .collect()
}

#[test]
fn test_malformed_item_fails_alone() {
    init_tracing();
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();

    for bad in [0, 2, 4] {
        let mut batch = items(5);
        batch[bad].spectrum.counts[100] = f64::NAN;

        let outcomes = solver.fit_batch(&batch, &groups, &FitParameters::new());
        assert_eq!(outcomes.len(), 5);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert_eq!(outcome.label.as_deref(), Some(format!("scan_{:03}", i).as_str()));
            if i == bad {
                assert!(matches!(outcome.error(), Some(XrfError::MalformedSpectrum(_))));
            } else {
                assert!(outcome.is_ok(), "item {} failed: {:?}", i, outcome.error());
            }
        }
    }
}

#[test]
fn test_batch_matches_single_fits() {
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let batch = items(3);

    let outcomes = solver.fit_batch(&batch, &groups, &FitParameters::new());
    for (item, outcome) in batch.iter().zip(&outcomes) {
        let spectrum = item.spectrum.clone().validate().unwrap();
        let start = solver.default_parameters(&spectrum, &groups).unwrap();
        let single = solver.fit(&spectrum, &groups, &start).unwrap();
        let batched = outcome.result.as_ref().unwrap();
        assert_eq!(batched.label, single.label);
        assert_relative_eq!(
            batched.area("Fe_K").unwrap(),
            single.area("Fe_K").unwrap(),
            max_relative = 1e-12
        );
    }
}

#[test]
fn test_template_fixes_parameters_for_every_item() {
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let spectrum = noisy_spectrum(20.0, &[("Fe_K", 3000.0)], 17);
    let mut template = solver.default_parameters(&spectrum, &groups).unwrap();
    template.set_value("fwhm_offset", 0.105).unwrap();
    template.set_vary("fwhm_offset", false).unwrap();
    // Only the width is shared; the areas come from each item.
    let template = FitParameters::from_json(&format!(
        r#"{{"params": [{}]}}"#,
        serde_json::to_string(template.get("fwhm_offset").unwrap()).unwrap()
    ))
    .unwrap();

    let outcomes = solver.fit_batch(&items(3), &groups, &template);
    for outcome in outcomes {
        let result = outcome.result.unwrap();
        assert_eq!(result.params.value("fwhm_offset").unwrap(), 0.105);
        assert!(!result.params.get("fwhm_offset").unwrap().vary());
    }
}

#[test]
fn test_incident_energy_per_item() {
    let solver = solver();
    let groups = LineTable::global().resolve(&["Fe_K"]).unwrap();
    let counts = synthetic_counts(20.0, &[("Fe_K", 3000.0)]);
    let raw = RawSpectrum::new(counts.to_vec(), calibration());

    let batch = vec![
        BatchItem::new(raw.clone()),
        BatchItem::new(raw.clone()).with_incident_energy(10.0),
        BatchItem::new(raw).with_incident_energy(-1.0),
    ];
    let outcomes = solver.fit_batch(&batch, &groups, &FitParameters::new());

    let plain = outcomes[0].result.as_ref().unwrap();
    assert!(plain.params.get("elastic_area").is_none());
    let scatter = outcomes[1].result.as_ref().unwrap();
    assert!(scatter.params.get("elastic_area").is_some());
    assert!(matches!(outcomes[2].error(), Some(XrfError::InvalidConfig(_))));
}

#[test]
fn test_batch_item_json() {
    let spectrum = Spectrum::new(synthetic_counts(5.0, &[]), calibration()).unwrap();
    let item = BatchItem::new(spectrum).with_incident_energy(12.0);
    let json = serde_json::to_string(&item).unwrap();
    let back: BatchItem = serde_json::from_str(&json).unwrap();
    assert_eq!(back, item);
}
