//! Linear fits of peak areas with fixed peak shapes.
//!
//! Every component of the forward model is rendered once at unit area; a
//! spectrum is then fitted as a non-negative combination of those columns.
//! Calibration, widths and line positions come from a parameter template and
//! are not refined, which makes this the per-pixel mode for maps and scans.
//!
//! Background handling follows the configured method: `Snip` subtracts each
//! item's own SNIP estimate before the solve, `Linear` adds a constant column
//! and `None` fits the peaks alone.

use ndarray::{s, Array1, Array2};
use rayon::prelude::*;
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info, warn};

use super::batch::{BatchItem, BatchOutcome};
use super::result::{r_squared, ElementFit};
use super::FitSolver;
use crate::config::{BackgroundMethod, XrfConfig};
use crate::error::{Result, XrfError};
use crate::lines::LineGroup;
use crate::model::{Resolution, SpectrumModel};
use crate::parameters::{FitParameters, ParamKind};
use crate::spectrum::{snip_background, Calibration, Spectrum};
use crate::utils::nnls::nnls_normal;

/// Name of the constant background column.
pub const CONSTANT_BACKGROUND: &str = "background";

/// Component matrix of one channel layout, shared by every spectrum fitted
/// with it.
#[derive(Debug, Clone)]
pub struct LinearModel {
    names: Vec<String>,
    /// channels x components
    matrix: Array2<f64>,
    gram: Array2<f64>,
    window: Range<usize>,
    channels: usize,
    calibration: Calibration,
    energies: Array1<f64>,
    config: XrfConfig,
    groups: Vec<LineGroup>,
    template: FitParameters,
}

impl LinearModel {
    /// Render the unit-area components for spectra of `channels` channels
    /// under `calibration`. Non-area parameters take their values from
    /// `template` where it names them.
    pub fn new(
        calibration: Calibration,
        channels: usize,
        groups: &[LineGroup],
        config: &XrfConfig,
        template: &FitParameters,
    ) -> Result<Self> {
        let reference = Spectrum::new(Array1::zeros(channels), calibration)?;
        let model = SpectrumModel::new(&reference, groups.to_vec(), config)?;
        let mut params = model.default_parameters()?;
        params.overlay(template);
        for param in params.iter_mut() {
            if matches!(param.kind(), ParamKind::Amplitude | ParamKind::Scatter) {
                param.set_value(1.0)?;
            }
        }

        let mut columns: Vec<(String, Array1<f64>)> = model
            .evaluate_components(&params)?
            .into_iter()
            .filter(|component| component.name != CONSTANT_BACKGROUND)
            .map(|component| (component.name, component.counts))
            .collect();
        if matches!(config.fit.background, BackgroundMethod::Linear) {
            columns.push((CONSTANT_BACKGROUND.to_string(), Array1::ones(model.len())));
        }

        let mut matrix = Array2::zeros((model.len(), columns.len()));
        for (j, (_, counts)) in columns.iter().enumerate() {
            matrix.column_mut(j).assign(counts);
        }
        let gram = matrix.t().dot(&matrix);
        debug!(
            channels = model.len(),
            components = columns.len(),
            "linear component matrix built"
        );

        Ok(Self {
            names: columns.into_iter().map(|(name, _)| name).collect(),
            matrix,
            gram,
            window: model.window(),
            channels,
            calibration,
            energies: model.nominal_energies(),
            config: config.clone(),
            groups: groups.to_vec(),
            template: template.clone(),
        })
    }

    /// Column names, in matrix order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The unit-area components, one column each.
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Same model at another incident energy.
    pub fn with_incident_energy(&self, energy: f64) -> Result<Self> {
        let config = self.config.clone().with_incident_energy(energy);
        config.validate()?;
        Self::new(self.calibration, self.channels, &self.groups, &config, &self.template)
    }

    /// Areas of every component in `spectrum`, all non-negative.
    pub fn fit(&self, spectrum: &Spectrum) -> Result<LinearFitResult> {
        if spectrum.len() != self.channels {
            return Err(XrfError::DimensionMismatch(format!(
                "spectrum has {} channels, linear model expects {}",
                spectrum.len(),
                self.channels
            )));
        }
        if *spectrum.calibration() != self.calibration {
            return Err(XrfError::MalformedSpectrum(format!(
                "calibration {:?} differs from the linear model's {:?}",
                spectrum.calibration(),
                self.calibration
            )));
        }

        let observed = spectrum.counts().slice(s![self.window.clone()]).to_owned();
        let mut background = match self.config.fit.background {
            BackgroundMethod::Snip { width } => {
                let detector = &self.config.detector;
                let resolution =
                    Resolution::new(detector.fwhm_offset, detector.fwhm_fanoprime, detector.epsilon);
                snip_background(spectrum.counts().view(), &self.calibration, &resolution, width)
                    .slice(s![self.window.clone()])
                    .to_owned()
            }
            BackgroundMethod::Linear | BackgroundMethod::None => Array1::zeros(observed.len()),
        };

        let rhs = self.matrix.t().dot(&(&observed - &background));
        let areas = nnls_normal(&self.gram, &rhs)?;
        let model = self.matrix.dot(&areas) + &background;

        let mut components = Vec::with_capacity(self.names.len());
        for (name, &area) in self.names.iter().zip(areas.iter()) {
            if name == CONSTANT_BACKGROUND {
                background += area;
            } else {
                components.push(ElementFit {
                    group: name.clone(),
                    area,
                    stderr: None,
                });
            }
        }

        let residual_sum_squares = observed
            .iter()
            .zip(model.iter())
            .map(|(y, f)| (y - f).powi(2))
            .sum();
        Ok(LinearFitResult {
            label: spectrum.label().map(str::to_string),
            r_squared: r_squared(&observed, &model),
            elements: components,
            energies: self.energies.clone(),
            observed,
            model,
            background,
            residual_sum_squares,
        })
    }
}

/// Areas from a linear fit. Line groups and pile-ups come first, then
/// `elastic` and `compton` when scatter is modeled; a constant background is
/// folded into `background`.
#[derive(Debug, Clone, Serialize)]
pub struct LinearFitResult {
    pub label: Option<String>,
    pub elements: Vec<ElementFit>,
    pub energies: Array1<f64>,
    pub observed: Array1<f64>,
    pub model: Array1<f64>,
    pub background: Array1<f64>,
    /// Unweighted sum of squared residuals.
    pub residual_sum_squares: f64,
    pub r_squared: f64,
}

impl LinearFitResult {
    pub fn element(&self, group: &str) -> Option<&ElementFit> {
        self.elements.iter().find(|e| e.group == group)
    }

    pub fn area(&self, group: &str) -> Option<f64> {
        self.element(group).map(|e| e.area)
    }
}

impl FitSolver {
    /// Linear model for spectra of `channels` channels under `calibration`.
    pub fn linear_model(
        &self,
        calibration: Calibration,
        channels: usize,
        groups: &[LineGroup],
        template: &FitParameters,
    ) -> Result<LinearModel> {
        LinearModel::new(calibration, channels, groups, &self.config, template)
    }

    /// Fit the areas of every item with one shared component matrix.
    ///
    /// Items with their own incident energy get a matrix of their own. An
    /// item whose channel count or calibration differs from `model` fails
    /// alone.
    pub fn fit_batch_linear(
        &self,
        model: &LinearModel,
        items: &[BatchItem],
    ) -> Vec<BatchOutcome<LinearFitResult>> {
        info!(
            items = items.len(),
            components = model.names().len(),
            "linear batch fit started"
        );
        let outcomes: Vec<BatchOutcome<LinearFitResult>> = items
            .par_iter()
            .enumerate()
            .map(|(index, item)| {
                let result = fit_linear_item(model, item);
                if let Err(err) = &result {
                    warn!(index, error = %err, "batch item failed");
                }
                BatchOutcome {
                    index,
                    label: item.spectrum.label.clone(),
                    result,
                }
            })
            .collect();
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(items = outcomes.len(), failed, "linear batch fit finished");
        outcomes
    }
}

fn fit_linear_item(model: &LinearModel, item: &BatchItem) -> Result<LinearFitResult> {
    let spectrum = item.spectrum.clone().validate()?;
    match item.incident_energy {
        Some(energy) if model.config.scatter.incident_energy != Some(energy) => {
            model.with_incident_energy(energy)?.fit(&spectrum)
        }
        _ => model.fit(&spectrum),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::LineTable;
    use approx::assert_relative_eq;

    fn calibration() -> Calibration {
        Calibration::linear(0.0, 0.01).unwrap()
    }

    fn groups() -> Vec<LineGroup> {
        LineTable::global().resolve(&["Fe_K", "Cu_K"]).unwrap()
    }

    /// Spectrum rendered by the same forward model.
    fn rendered(config: &XrfConfig, fe: f64, cu: f64, constant: f64) -> Spectrum {
        let flat = Spectrum::new(Array1::zeros(1200), calibration()).unwrap();
        let model = SpectrumModel::new(&flat, groups(), config).unwrap();
        let mut params = model.default_parameters().unwrap();
        params.set_value("Fe_K_area", fe).unwrap();
        params.set_value("Cu_K_area", cu).unwrap();
        let counts = model.evaluate(&params).unwrap() + constant;
        Spectrum::new(counts, calibration()).unwrap()
    }

    #[test]
    fn test_recovers_rendered_areas() {
        let config = XrfConfig::new().with_background(BackgroundMethod::None);
        let model =
            LinearModel::new(calibration(), 1200, &groups(), &config, &FitParameters::new()).unwrap();
        assert_eq!(model.names(), &["Fe_K".to_string(), "Cu_K".to_string()]);

        let result = model.fit(&rendered(&config, 3000.0, 1200.0, 0.0)).unwrap();
        assert_relative_eq!(result.area("Fe_K").unwrap(), 3000.0, max_relative = 1e-9);
        assert_relative_eq!(result.area("Cu_K").unwrap(), 1200.0, max_relative = 1e-9);
        assert_relative_eq!(result.r_squared, 1.0, epsilon = 1e-12);
        assert!(result.element("Fe_K").unwrap().stderr.is_none());
    }

    #[test]
    fn test_constant_background_column() {
        let config = XrfConfig::new().with_background(BackgroundMethod::Linear);
        let model =
            LinearModel::new(calibration(), 1200, &groups(), &config, &FitParameters::new()).unwrap();
        assert_eq!(model.names().last().map(String::as_str), Some(CONSTANT_BACKGROUND));

        let none = XrfConfig::new().with_background(BackgroundMethod::None);
        let result = model.fit(&rendered(&none, 3000.0, 0.0, 15.0)).unwrap();
        assert_relative_eq!(result.area("Fe_K").unwrap(), 3000.0, max_relative = 1e-9);
        assert!(result.area("Cu_K").unwrap().abs() < 1e-6);
        assert!(result.area(CONSTANT_BACKGROUND).is_none());
        assert!(result.background.iter().all(|&b| (b - 15.0).abs() < 1e-9));
    }

    #[test]
    fn test_snip_background_is_subtracted() {
        let config = XrfConfig::new();
        let model =
            LinearModel::new(calibration(), 1200, &groups(), &config, &FitParameters::new()).unwrap();
        let none = XrfConfig::new().with_background(BackgroundMethod::None);
        let spectrum = rendered(&none, 3000.0, 1000.0, 20.0);

        let result = model.fit(&spectrum).unwrap();
        assert!(result.elements.iter().all(|e| e.area >= 0.0));
        let detector = &config.detector;
        let resolution =
            Resolution::new(detector.fwhm_offset, detector.fwhm_fanoprime, detector.epsilon);
        let BackgroundMethod::Snip { width } = config.fit.background else {
            panic!("default background is SNIP");
        };
        let expected = snip_background(spectrum.counts().view(), &calibration(), &resolution, width);
        assert_eq!(result.background, expected);
    }

    #[test]
    fn test_layout_mismatch() {
        let config = XrfConfig::new().with_background(BackgroundMethod::None);
        let model =
            LinearModel::new(calibration(), 1200, &groups(), &config, &FitParameters::new()).unwrap();
        let short = Spectrum::new(Array1::zeros(800), calibration()).unwrap();
        assert!(matches!(model.fit(&short), Err(XrfError::DimensionMismatch(_))));

        let other = Calibration::linear(0.1, 0.01).unwrap();
        let shifted = Spectrum::new(Array1::zeros(1200), other).unwrap();
        assert!(matches!(model.fit(&shifted), Err(XrfError::MalformedSpectrum(_))));
    }
}
