//! Weighted residual of a spectrum fit, as a [`Problem`] over the internal
//! variables of the free parameters.

use ndarray::Array1;

use crate::error::Result;
use crate::model::SpectrumModel;
use crate::parameters::FitParameters;
use crate::problem::Problem;

/// `w * (model - observed)` with `w = 1 / sqrt(c_weight + |observed|)`.
pub struct SpectrumObjective<'a> {
    model: &'a SpectrumModel,
    params: FitParameters,
    weights: Array1<f64>,
}

impl<'a> SpectrumObjective<'a> {
    /// The free parameters of `params` become the optimizer variables; the
    /// rest keep their values.
    pub fn new(model: &'a SpectrumModel, params: FitParameters) -> Self {
        let c_weight = model.fit_config().c_weight;
        let weights = model.observed().mapv(|y| 1.0 / (c_weight + y.abs()).sqrt());
        Self {
            model,
            params,
            weights,
        }
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn parameters(&self) -> &FitParameters {
        &self.params
    }

    /// Optimizer starting point.
    pub fn initial_internal(&self) -> Result<Array1<f64>> {
        Ok(Array1::from(self.params.varying_internal_values()?))
    }

    /// Full parameter set at an optimizer position.
    pub fn parameters_at(&self, internal: &Array1<f64>) -> Result<FitParameters> {
        let mut params = self.params.clone();
        params.update_from_internal(&internal.to_vec())?;
        Ok(params)
    }

    /// Weighted residual of a complete parameter set.
    pub fn weighted_residuals(&self, params: &FitParameters) -> Result<Array1<f64>> {
        let model = self.model.evaluate(params)?;
        Ok((model - self.model.observed()) * &self.weights)
    }
}

impl Problem for SpectrumObjective<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let full = self.parameters_at(params)?;
        self.weighted_residuals(&full)
    }

    fn parameter_count(&self) -> usize {
        self.params.varying_count()
    }

    fn residual_count(&self) -> usize {
        self.model.len()
    }
}
