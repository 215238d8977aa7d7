//! Default parameter set of a [`SpectrumModel`].

use ndarray::Array1;

use super::{
    area_name, delta_center_name, Resolution, SpectrumModel, BKG_CONST, BKG_LINEAR,
    COMPTON_AREA, ELASTIC_AREA, E_LINEAR, E_OFFSET, E_QUADRATIC, FWHM_FANOPRIME, FWHM_OFFSET,
};
use crate::config::BackgroundMethod;
use crate::error::Result;
use crate::lines::LineGroup;
use crate::model::compton_energy;
use crate::parameters::{FitParameter, FitParameters, ParamKind};

/// Share of a Gaussian's area within ±FWHM of its center.
const FWHM_AREA_FRACTION: f64 = 0.9815;

/// Smallest starting area. Amplitudes start strictly above their lower
/// bound, where the bounds transform has a zero derivative.
const MIN_START_AREA: f64 = 1.0;

/// Relative bounds of the linear calibration term.
const LINEAR_CALIBRATION_RANGE: f64 = 0.02;

/// Bounds of the calibration offset (keV).
const OFFSET_CALIBRATION_RANGE: f64 = 0.1;

/// Largest energy change the quadratic term may cause over the window (keV).
const QUADRATIC_CALIBRATION_RANGE: f64 = 0.02;

impl SpectrumModel {
    fn net_counts(&self) -> Array1<f64> {
        (&self.observed - &self.background_estimate).mapv(|v| v.max(0.0))
    }

    fn detector_resolution(&self) -> Resolution {
        Resolution::new(
            self.detector.fwhm_offset,
            self.detector.fwhm_fanoprime,
            self.detector.epsilon,
        )
    }

    /// Net counts within ±FWHM of `energy`, corrected for the tails.
    fn peak_counts(&self, net: &Array1<f64>, energies: &Array1<f64>, energy: f64) -> f64 {
        let reach = self.detector_resolution().fwhm(energy);
        let sum: f64 = energies
            .iter()
            .zip(net.iter())
            .filter(|(e, _)| (**e - energy).abs() <= reach)
            .map(|(_, n)| n)
            .sum();
        sum / FWHM_AREA_FRACTION
    }

    /// Starting area of a group from the counts around its primary line.
    fn estimate_group_area(&self, group: &LineGroup, net: &Array1<f64>, energies: &Array1<f64>) -> f64 {
        let (low, high) = self.energy_range();
        let Some(primary) = group.primary_line(low, high) else {
            return MIN_START_AREA;
        };
        let reach = self.detector_resolution().fwhm(primary.energy);
        // Lines close to the primary land in the same window.
        let overlapping: f64 = group
            .lines()
            .iter()
            .filter(|l| (l.energy - primary.energy).abs() <= reach)
            .map(|l| l.weight)
            .sum();
        let counts = self.peak_counts(net, energies, primary.energy);
        (counts / overlapping.max(primary.weight)).max(MIN_START_AREA)
    }

    /// Least-squares line through the background estimate.
    fn background_line(&self, energies: &Array1<f64>) -> (f64, f64) {
        let n = energies.len() as f64;
        let mean_e = energies.sum() / n;
        let mean_b = self.background_estimate.sum() / n;
        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (e, b) in energies.iter().zip(self.background_estimate.iter()) {
            sxy += (e - mean_e) * (b - mean_b);
            sxx += (e - mean_e) * (e - mean_e);
        }
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        (mean_b - slope * mean_e, slope)
    }

    /// The parameter set this model evaluates, with starting values
    /// estimated from the observed counts.
    ///
    /// Per line group `X_F`: `X_F_area` (free, `[0, inf)`) and
    /// `X_F_delta_center` (fixed, `±max_center_shift`); per pile-up peak
    /// `<pileup>_area` (free, `[0, inf)`). Globals: the three
    /// calibration terms and the two width terms (free, bounded around the
    /// measured calibration and the detector configuration), plus
    /// `bkg_const`/`bkg_linear` for a linear background and
    /// `elastic_area`/`compton_area` when an incident energy is set.
    pub fn default_parameters(&self) -> Result<FitParameters> {
        let net = self.net_counts();
        let energies = self.nominal_energies();
        let mut params = FitParameters::new();

        let shift = self.fit.max_center_shift;
        for group in &self.groups {
            let area = self.estimate_group_area(group, &net, &energies);
            params.add_param_with_bounds(
                &area_name(group.name()),
                ParamKind::Amplitude,
                area,
                0.0,
                f64::INFINITY,
            )?;
            params.add(
                FitParameter::with_bounds(
                    &delta_center_name(group.name()),
                    ParamKind::EnergyShift,
                    0.0,
                    -shift,
                    shift,
                )?
                .fixed(),
            )?;
        }
        for pileup in &self.pileups {
            let area = self
                .peak_counts(&net, &energies, pileup.energy())
                .max(MIN_START_AREA);
            params.add_param_with_bounds(
                &area_name(pileup.name()),
                ParamKind::Amplitude,
                area,
                0.0,
                f64::INFINITY,
            )?;
        }

        let cal = self.calibration;
        params.add_param_with_bounds(
            E_OFFSET,
            ParamKind::Calibration,
            cal.offset,
            cal.offset - OFFSET_CALIBRATION_RANGE,
            cal.offset + OFFSET_CALIBRATION_RANGE,
        )?;
        params.add_param_with_bounds(
            E_LINEAR,
            ParamKind::Calibration,
            cal.linear,
            cal.linear * (1.0 - LINEAR_CALIBRATION_RANGE),
            cal.linear * (1.0 + LINEAR_CALIBRATION_RANGE),
        )?;
        let last = self.channels.last().copied().unwrap_or(1.0).max(1.0);
        let quadratic_range = QUADRATIC_CALIBRATION_RANGE / (last * last);
        params.add_param_with_bounds(
            E_QUADRATIC,
            ParamKind::Calibration,
            cal.quadratic,
            cal.quadratic - quadratic_range,
            cal.quadratic + quadratic_range,
        )?;

        let offset = self.detector.fwhm_offset;
        params.add_param_with_bounds(
            FWHM_OFFSET,
            ParamKind::Width,
            offset,
            0.5 * offset,
            (2.0 * offset).max(0.01),
        )?;
        let fano = self.detector.fwhm_fanoprime;
        params.add_param_with_bounds(
            FWHM_FANOPRIME,
            ParamKind::Width,
            fano,
            0.0,
            (2.0 * fano).max(0.01),
        )?;

        if self.fit.background == BackgroundMethod::Linear {
            let (constant, slope) = self.background_line(&energies);
            params.add(FitParameter::new(BKG_CONST, ParamKind::Background, constant))?;
            params.add(FitParameter::new(BKG_LINEAR, ParamKind::Background, slope))?;
        }

        if let Some(incident) = self.scatter.incident_energy {
            let elastic = self.peak_counts(&net, &energies, incident).max(MIN_START_AREA);
            let compton_center = compton_energy(incident, self.scatter.compton_angle);
            let compton = self
                .peak_counts(&net, &energies, compton_center)
                .max(MIN_START_AREA);
            params.add_param_with_bounds(ELASTIC_AREA, ParamKind::Scatter, elastic, 0.0, f64::INFINITY)?;
            params.add_param_with_bounds(COMPTON_AREA, ParamKind::Scatter, compton, 0.0, f64::INFINITY)?;
        }

        Ok(params)
    }
}
