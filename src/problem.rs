//! Problem definition trait.
//!
//! A `Problem` is a nonlinear least-squares residual function over an
//! unconstrained parameter vector. The spectrum fit implements it over the
//! internal (bounds-transformed) variables of its free parameters.

use crate::error::Result;
use ndarray::{Array1, Array2};

/// A nonlinear least squares problem.
///
/// The optimizer minimizes the sum of squares of [`Problem::eval`].
pub trait Problem: Sync {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of `residual_count()` residuals, or an error if the evaluation fails
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix (residuals x parameters) at the given parameters.
    ///
    /// Only called when [`Problem::has_custom_jacobian`] returns true; otherwise
    /// the optimizer uses finite differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Whether `jacobian` is analytical.
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Sum of squared residuals.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}
