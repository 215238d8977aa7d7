//! A spectrum holding one element must identify exactly that element.

use crate::test_helpers::{init_tracing, noisy_spectrum, synthetic_spectrum};
use ndarray::Array1;
use xrffit_rs::config::{DetectorConfig, XrfConfig};
use xrffit_rs::identify::ElementIdentifier;
use xrffit_rs::lines::{LineFamily, LineKind, LineTable};
use xrffit_rs::model::Resolution;
use xrffit_rs::spectrum::{Calibration, Spectrum};

/// One Gaussian of the given height on a flat background, 0-20 keV.
fn single_line_spectrum(energy: f64, height: f64) -> Spectrum {
    let detector = DetectorConfig::default();
    let resolution = Resolution::new(detector.fwhm_offset, detector.fwhm_fanoprime, detector.epsilon);
    let sigma = resolution.sigma(energy);
    let counts = Array1::from_shape_fn(2000, |ch| {
        let x = (ch as f64 * 0.01 - energy) / sigma;
        20.0 + height * (-0.5 * x * x).exp()
    });
    Spectrum::new(counts, Calibration::linear(0.0, 0.01).unwrap()).unwrap()
}

#[test]
fn test_single_fe_peak_identifies_fe() {
    init_tracing();
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 5000.0)]);
    let identification = ElementIdentifier::new(&XrfConfig::new())
        .identify(&spectrum)
        .unwrap();

    assert_eq!(identification.group_names(), vec!["Fe_K"]);
    assert!(identification.unassigned_peaks.is_empty());
    assert!(identification.scatter_peaks.is_empty());

    let strongest = identification
        .peaks
        .iter()
        .max_by(|a, b| a.net_counts.total_cmp(&b.net_counts))
        .unwrap();
    assert!((strongest.energy - 6.4).abs() < 0.02);
}

#[test]
fn test_single_fe_peak_with_counting_noise() {
    let mut config = XrfConfig::new();
    config.identify.threshold_sigma = 5.0;
    config.identify.min_net_counts = 50.0;

    for seed in [7, 11, 42] {
        let spectrum = noisy_spectrum(20.0, &[("Fe_K", 5000.0)], seed);
        let identification = ElementIdentifier::new(&config).identify(&spectrum).unwrap();
        assert_eq!(identification.group_names(), vec!["Fe_K"], "seed {}", seed);
    }
}

#[test]
fn test_single_ka_peak_sweep() {
    init_tracing();
    let identifier = ElementIdentifier::new(&XrfConfig::new());
    let mut checked = 0;
    for group in LineTable::global().groups() {
        if group.family() != LineFamily::K {
            continue;
        }
        let Some(ka1) = group.lines().iter().find(|l| l.kind == LineKind::Ka1) else {
            continue;
        };
        if !(1.0..=19.0).contains(&ka1.energy) {
            continue;
        }
        let identification = identifier
            .identify(&single_line_spectrum(ka1.energy, 500.0))
            .unwrap();
        assert_eq!(
            identification.group_names(),
            vec![group.name()],
            "single peak at {} keV",
            ka1.energy
        );
        checked += 1;
    }
    // Na through Mo
    assert!(checked >= 30, "only {} groups checked", checked);
}

#[test]
fn test_empty_window_is_malformed() {
    let spectrum = synthetic_spectrum(20.0, &[]);
    let config = XrfConfig::new().with_energy_range(30.0, 40.0);
    assert!(ElementIdentifier::new(&config).identify(&spectrum).is_err());
}

#[test]
fn test_identification_serializes() {
    let spectrum = synthetic_spectrum(20.0, &[("Fe_K", 5000.0)]);
    let identification = ElementIdentifier::new(&XrfConfig::new())
        .identify(&spectrum)
        .unwrap();
    let json = serde_json::to_value(&identification).unwrap();
    assert!(json["peaks"].as_array().map_or(false, |p| !p.is_empty()));
}
