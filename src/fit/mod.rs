//! Spectrum fitting.
//!
//! [`FitSolver`] evaluates the forward model (preview) and refines the free
//! parameters with Levenberg-Marquardt (optimization). Fixed parameters never
//! enter the optimizer vector, and bounded parameters are optimized through
//! their bounds transform, so results always lie inside the declared bounds.
//!
//! # Example
//!
//! ```
//! use ndarray::Array1;
//! use xrffit_rs::config::{BackgroundMethod, XrfConfig};
//! use xrffit_rs::fit::FitSolver;
//! use xrffit_rs::lines::LineTable;
//! use xrffit_rs::spectrum::{Calibration, Spectrum};
//!
//! let config = XrfConfig::new().with_background(BackgroundMethod::None);
//! let solver = FitSolver::new(config).unwrap();
//! let cal = Calibration::linear(0.0, 0.01).unwrap();
//! let flat = Spectrum::new(Array1::from_elem(1000, 2.0), cal).unwrap();
//! let groups = LineTable::global().resolve(&["Fe"]).unwrap();
//!
//! let mut params = solver.default_parameters(&flat, &groups).unwrap();
//! params.set_value("Fe_K_area", 4000.0).unwrap();
//! let synthetic = solver.forward(&flat, &groups, &params).unwrap();
//! assert_eq!(synthetic.len(), 1000);
//! ```

pub mod batch;
pub mod linear;
pub mod objective;
pub mod result;
pub mod strategy;

use ndarray::Array1;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::XrfConfig;
use crate::error::{Result, XrfError};
use crate::identify::{ElementIdentifier, Identification};
use crate::lines::LineGroup;
use crate::lm::LevenbergMarquardt;
use crate::model::{area_name, Resolution, SpectrumModel};
use crate::parameters::FitParameters;
use crate::spectrum::{Roi, RoiSum, Spectrum};
use crate::uncertainty::parameter_stderr;

pub use batch::{BatchItem, BatchOutcome};
pub use linear::{LinearFitResult, LinearModel};
pub use objective::SpectrumObjective;
pub use result::{ElementFit, FitResult};
pub use strategy::FitStrategy;

/// Forward calculation and fitting of spectra under one configuration.
#[derive(Debug, Clone)]
pub struct FitSolver {
    config: XrfConfig,
    optimizer: LevenbergMarquardt,
}

impl FitSolver {
    /// Create a solver; the configuration is validated here.
    pub fn new(config: XrfConfig) -> Result<Self> {
        config.validate()?;
        let optimizer = LevenbergMarquardt::with_config(config.solver.clone());
        Ok(Self { config, optimizer })
    }

    pub fn config(&self) -> &XrfConfig {
        &self.config
    }

    /// Forward model of `spectrum` with the given line groups.
    pub fn model(&self, spectrum: &Spectrum, groups: &[LineGroup]) -> Result<SpectrumModel> {
        SpectrumModel::new(spectrum, groups.to_vec(), &self.config)
    }

    /// Starting parameters for `groups` on `spectrum`.
    pub fn default_parameters(&self, spectrum: &Spectrum, groups: &[LineGroup]) -> Result<FitParameters> {
        self.model(spectrum, groups)?.default_parameters()
    }

    /// Modeled counts for `params`, without optimization.
    pub fn forward(
        &self,
        spectrum: &Spectrum,
        groups: &[LineGroup],
        params: &FitParameters,
    ) -> Result<Array1<f64>> {
        self.model(spectrum, groups)?.evaluate(params)
    }

    /// Refine the free parameters of `params` against `spectrum`.
    pub fn fit(&self, spectrum: &Spectrum, groups: &[LineGroup], params: &FitParameters) -> Result<FitResult> {
        let model = self.model(spectrum, groups)?;
        let mut result = self.fit_model(&model, params)?;
        result.label = spectrum.label().map(str::to_string);
        Ok(result)
    }

    /// Run one optimizer pass per strategy, each starting from the values
    /// the previous pass reached. The result carries the vary flags of
    /// `params`.
    ///
    /// A parameter's standard error comes from the last pass that left it
    /// free, so parameters fixed by the final strategy keep the error of an
    /// earlier pass.
    pub fn fit_with_strategies(
        &self,
        spectrum: &Spectrum,
        groups: &[LineGroup],
        params: &FitParameters,
        strategies: &[FitStrategy],
    ) -> Result<FitResult> {
        let model = self.model(spectrum, groups)?;
        let mut result = self.fit_model_with_strategies(&model, params, strategies)?;
        result.label = spectrum.label().map(str::to_string);
        Ok(result)
    }

    /// Counts in a ±2σ window around the strongest line of each group, with
    /// the configured detector resolution.
    pub fn roi_sums(&self, spectrum: &Spectrum, groups: &[LineGroup]) -> Result<Vec<RoiSum>> {
        let detector = &self.config.detector;
        let resolution = Resolution::new(detector.fwhm_offset, detector.fwhm_fanoprime, detector.epsilon);
        let rois = groups
            .iter()
            .map(|group| Roi::around_group(group, &resolution))
            .collect::<Result<Vec<_>>>()?;
        spectrum.roi_sums(&rois)
    }

    /// Identify the elements in `spectrum`, then fit them from default
    /// starting values.
    pub fn auto_fit(&self, spectrum: &Spectrum) -> Result<(Identification, FitResult)> {
        let identification = ElementIdentifier::new(&self.config).identify(spectrum)?;
        let groups = identification.line_groups();
        let params = self.default_parameters(spectrum, &groups)?;
        let result = self.fit(spectrum, &groups, &params)?;
        Ok((identification, result))
    }

    pub(crate) fn fit_model_with_strategies(
        &self,
        model: &SpectrumModel,
        params: &FitParameters,
        strategies: &[FitStrategy],
    ) -> Result<FitResult> {
        if strategies.is_empty() {
            return Err(XrfError::InvalidConfig(
                "at least one fit strategy is required".to_string(),
            ));
        }

        let mut current = params.clone();
        let mut iterations = 0;
        let mut func_evals = 0;
        let mut stderr: HashMap<String, Option<f64>> = HashMap::new();
        let mut last = None;
        for strategy in strategies {
            info!(strategy = %strategy.name, "fit pass");
            let pass = self.fit_model(model, &strategy.apply(&current))?;
            current.update_values_from(&pass.params);
            for param in pass.params.iter().filter(|p| p.vary()) {
                stderr.insert(param.name().to_string(), param.stderr());
            }
            iterations += pass.iterations;
            func_evals += pass.func_evals;
            last = Some(pass);
        }

        let mut result = last.ok_or_else(|| XrfError::InvalidConfig("no fit pass ran".to_string()))?;
        for param in current.iter_mut() {
            param.set_stderr(stderr.get(param.name()).copied().flatten());
        }
        result.params = current;
        result.iterations = iterations;
        result.func_evals = func_evals;
        Ok(result)
    }

    /// Optimize the free parameters of `params` for a prepared model.
    pub fn fit_model(&self, model: &SpectrumModel, params: &FitParameters) -> Result<FitResult> {
        let free = params.varying_count();
        info!(
            groups = model.groups().len(),
            channels = model.len(),
            free,
            "fit started"
        );

        let objective = SpectrumObjective::new(model, params.clone());
        let initial = objective.initial_internal()?;
        let outcome = self.optimizer.minimize(&objective, initial)?;

        let mut fitted = objective.parameters_at(&outcome.params)?;
        let n_data = model.len();
        let chi_square = outcome.cost;
        let reduced_chi_square = chi_square / n_data.saturating_sub(free).max(1) as f64;

        if self.config.fit.uncertainties && free > 0 {
            let stderr = parameter_stderr(&fitted.varying(), &outcome.jacobian, reduced_chi_square)?;
            fitted.set_varying_stderr(&stderr)?;
        }

        let counts = model.evaluate(&fitted)?;
        let background = model.background(&fitted)?;
        let observed = model.observed().clone();
        let residuals = &counts - &observed;

        let elements = model
            .groups()
            .iter()
            .map(|group| group.name())
            .chain(model.pileups().iter().map(|pileup| pileup.name()))
            .map(|name| {
                let param = fitted.get(&area_name(name));
                ElementFit {
                    group: name.to_string(),
                    area: param.map(|p| p.value()).unwrap_or(0.0),
                    stderr: param.and_then(|p| p.stderr()),
                }
            })
            .collect();

        let converged = outcome.success();
        if converged {
            info!(
                iterations = outcome.iterations,
                reduced_chi_square,
                "fit converged"
            );
        } else {
            warn!(
                iterations = outcome.iterations,
                status = %outcome.status,
                "fit did not converge"
            );
        }

        Ok(FitResult {
            label: None,
            elements,
            params: fitted,
            energies: model.nominal_energies(),
            r_squared: result::r_squared(&observed, &counts),
            observed,
            model: counts,
            background,
            residuals,
            chi_square,
            reduced_chi_square,
            iterations: outcome.iterations,
            func_evals: outcome.func_evals,
            converged,
            status: outcome.status,
            message: outcome.message,
        })
    }
}
