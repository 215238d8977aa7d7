//! # Covariance Matrix Calculations
//!
//! For a least-squares fit the covariance of the optimizer variables is
//! estimated as
//!
//! ```text
//! covar = redchi * inv(J^T J)
//! ```
//!
//! where `J` is the Jacobian of the residuals and `redchi` is the reduced
//! chi-square. The optimizer works in internal (bounds-transformed) variables,
//! so standard errors of the parameters themselves are propagated through the
//! derivative of the transform.

use ndarray::{Array1, Array2};

use crate::error::{Result, XrfError};
use crate::lm::step::{cholesky, cholesky_solve};
use crate::parameters::FitParameter;
use crate::utils::matrix_convert::{faer_to_ndarray, ndarray_to_faer};

/// Relative column norm below which a Jacobian column is treated as flat.
const FLAT_COLUMN: f64 = 1e-10;

/// Invert a symmetric positive-definite matrix through its Cholesky factor.
fn invert_spd(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let l = cholesky(a).ok_or(XrfError::SingularMatrix)?;
    let mut inverse = Array2::zeros((n, n));
    for i in 0..n {
        let mut e = Array1::zeros(n);
        e[i] = 1.0;
        inverse.column_mut(i).assign(&cholesky_solve(&l, &e));
    }
    Ok(inverse)
}

/// Calculate the covariance matrix from a Jacobian.
///
/// Returns `SingularMatrix` when `J^T J` is not positive definite.
pub fn calculate_covariance(jacobian: &Array2<f64>, redchi: f64) -> Result<Array2<f64>> {
    let j = ndarray_to_faer(jacobian);
    let jtj = faer_to_ndarray(&(j.transpose() * j.as_ref()));
    Ok(invert_spd(&jtj)? * redchi)
}

/// Square roots of the diagonal; non-positive entries give zero.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}

/// Standard errors of the free parameters.
///
/// # Arguments
///
/// * `free` - The free parameters, in optimizer order, at their fitted values
/// * `jacobian` - Jacobian of the residuals w.r.t. the internal variables
/// * `redchi` - Reduced chi-square of the fit
///
/// # Returns
///
/// One entry per free parameter. Parameters whose Jacobian column is flat
/// (typically pinned at a bound) get `None`, as do all parameters when the
/// remaining system is singular.
pub fn parameter_stderr(
    free: &[&FitParameter],
    jacobian: &Array2<f64>,
    redchi: f64,
) -> Result<Vec<Option<f64>>> {
    if free.len() != jacobian.ncols() {
        return Err(XrfError::DimensionMismatch(format!(
            "{} free parameters but the Jacobian has {} columns",
            free.len(),
            jacobian.ncols()
        )));
    }

    let norms: Vec<f64> = jacobian
        .columns()
        .into_iter()
        .map(|c| c.dot(&c).sqrt())
        .collect();
    let largest = norms.iter().cloned().fold(0.0, f64::max);
    let active: Vec<usize> = (0..norms.len())
        .filter(|&i| norms[i] > FLAT_COLUMN * largest && norms[i] > 0.0)
        .collect();

    let mut stderr = vec![None; free.len()];
    if active.is_empty() || !redchi.is_finite() {
        return Ok(stderr);
    }

    let reduced = Array2::from_shape_fn((jacobian.nrows(), active.len()), |(r, c)| {
        jacobian[[r, active[c]]]
    });
    let covar = match calculate_covariance(&reduced, redchi) {
        Ok(covar) => covar,
        Err(XrfError::SingularMatrix) => return Ok(stderr),
        Err(err) => return Err(err),
    };

    let internal_errors = standard_errors_from_covariance(&covar);
    for (k, &i) in active.iter().enumerate() {
        if !internal_errors[k].is_finite() {
            continue;
        }
        let param = free[i];
        let internal = param.to_internal()?;
        let scale = param.bounds_transform().derivative(internal).abs();
        stderr[i] = Some(scale * internal_errors[k]);
    }
    Ok(stderr)
}
