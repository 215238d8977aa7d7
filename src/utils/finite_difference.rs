//! Finite difference Jacobians.
//!
//! Forward differences, one residual evaluation per parameter. The parallel
//! variant evaluates the columns on the rayon pool.

use crate::error::{Result, XrfError};
use crate::problem::Problem;
use ndarray::{Array1, Array2};
use rayon::prelude::*;

/// Default relative step size for finite differences.
const DEFAULT_EPSILON: f64 = 1e-8;

fn step_size(value: f64, eps: f64) -> f64 {
    eps * value.abs().max(1.0)
}

fn base_residuals(problem: &dyn Problem, params: &Array1<f64>) -> Result<Array1<f64>> {
    let residuals = problem.eval(params)?;
    if residuals.len() != problem.residual_count() {
        return Err(XrfError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            problem.residual_count(),
            residuals.len()
        )));
    }
    Ok(residuals)
}

fn column(
    problem: &dyn Problem,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    j: usize,
    eps: f64,
) -> Result<Array1<f64>> {
    let mut perturbed = params.clone();
    let h = step_size(params[j], eps);
    perturbed[j] += h;
    let shifted = problem.eval(&perturbed)?;
    if shifted.len() != residuals.len() {
        return Err(XrfError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            residuals.len(),
            shifted.len()
        )));
    }
    Ok((shifted - residuals) / h)
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// J[i,j] = d residual[i] / d param[j].
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - Relative step size (optional)
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let residuals = base_residuals(problem, params)?;
    let mut jac = Array2::zeros((residuals.len(), params.len()));
    for j in 0..params.len() {
        let col = column(problem, params, &residuals, j, eps)?;
        jac.column_mut(j).assign(&col);
    }
    Ok(jac)
}

/// Same as [`jacobian`], with the columns computed in parallel.
pub fn jacobian_parallel(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let residuals = base_residuals(problem, params)?;
    let columns: Result<Vec<Array1<f64>>> = (0..params.len())
        .into_par_iter()
        .map(|j| column(problem, params, &residuals, j, eps))
        .collect();

    let mut jac = Array2::zeros((residuals.len(), params.len()));
    for (j, col) in columns?.into_iter().enumerate() {
        jac.column_mut(j).assign(&col);
    }
    Ok(jac)
}
