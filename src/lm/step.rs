//! Step calculation for the Levenberg-Marquardt solver.
//!
//! The step solves `(J^T J + lambda D) step = -J^T r` with Marquardt's
//! scaling `D = diag(J^T J)`. Cholesky is tried first; the QR path solves the
//! equivalent augmented least-squares problem `[J; sqrt(lambda D)] step = [-r; 0]`.

use super::config::DecompositionMethod;
use ndarray::{Array1, Array2};

/// Floor for the scaling diagonal, keeps parameters with a flat residual
/// surface damped.
const MIN_DIAGONAL: f64 = 1e-12;

fn scaling(jtj: &Array2<f64>) -> Array1<f64> {
    Array1::from_shape_fn(jtj.nrows(), |i| jtj[[i, i]].max(MIN_DIAGONAL))
}

/// In-place Cholesky factorization. Returns the lower factor, or `None` if
/// the matrix is not positive definite.
pub(crate) fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = a.clone();
    for k in 0..n {
        for j in 0..k {
            l[[k, k]] -= l[[k, j]] * l[[k, j]];
        }
        if !(l[[k, k]] > 0.0) || !l[[k, k]].is_finite() {
            return None;
        }
        let akk = l[[k, k]].sqrt();
        l[[k, k]] = akk;
        for i in k + 1..n {
            for j in 0..k {
                l[[i, k]] -= l[[i, j]] * l[[k, j]];
            }
            l[[i, k]] /= akk;
        }
    }
    for i in 0..n {
        for j in i + 1..n {
            l[[i, j]] = 0.0;
        }
    }
    Some(l)
}

/// Solve `L L^T x = b` for a lower-triangular factor `L`.
pub(crate) fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = b.clone();
    for i in 0..n {
        for j in 0..i {
            y[i] -= l[[i, j]] * y[j];
        }
        y[i] /= l[[i, i]];
    }
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = y[i];
        for j in (i + 1)..n {
            x[i] -= l[[j, i]] * x[j];
        }
        x[i] /= l[[i, i]];
    }
    x
}

fn solve_cholesky(jtj: &Array2<f64>, jtr: &Array1<f64>, lambda: f64) -> Option<Array1<f64>> {
    let d = scaling(jtj);
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        a[[i, i]] += lambda * d[i];
    }
    let l = cholesky(&a)?;
    Some(-cholesky_solve(&l, jtr))
}

/// Least-squares solve of the augmented system with modified Gram-Schmidt.
fn solve_qr(
    jacobian: &Array2<f64>,
    residuals: &Array1<f64>,
    jtj: &Array2<f64>,
    lambda: f64,
) -> Option<Array1<f64>> {
    let (m, n) = jacobian.dim();
    let d = scaling(jtj);

    let mut q = Array2::zeros((m + n, n));
    q.slice_mut(ndarray::s![..m, ..]).assign(jacobian);
    for i in 0..n {
        q[[m + i, i]] = (lambda * d[i]).sqrt();
    }
    let mut rhs = Array1::zeros(m + n);
    rhs.slice_mut(ndarray::s![..m]).assign(&(-residuals));

    let mut r = Array2::zeros((n, n));
    for j in 0..n {
        for k in 0..j {
            let dot = q.column(k).dot(&q.column(j));
            r[[k, j]] = dot;
            let qk = q.column(k).to_owned();
            q.column_mut(j).scaled_add(-dot, &qk);
        }
        let norm = q.column(j).dot(&q.column(j)).sqrt();
        if !(norm > 1e-300) {
            return None;
        }
        r[[j, j]] = norm;
        q.column_mut(j).mapv_inplace(|v| v / norm);
    }

    let qtb = q.t().dot(&rhs);
    let mut x = Array1::zeros(n);
    for j in (0..n).rev() {
        let mut value = qtb[j];
        for k in (j + 1)..n {
            value -= r[[j, k]] * x[k];
        }
        x[j] = value / r[[j, j]];
    }
    x.iter().all(|v: &f64| v.is_finite()).then_some(x)
}

/// Compute the damped step, or `None` if the system could not be solved.
///
/// # Arguments
///
/// * `jacobian` - The Jacobian at the current position
/// * `residuals` - The residuals at the current position
/// * `jtj` - `J^T J`
/// * `jtr` - `J^T r`
/// * `lambda` - The damping parameter
/// * `method` - Decomposition to use
pub fn damped_step(
    jacobian: &Array2<f64>,
    residuals: &Array1<f64>,
    jtj: &Array2<f64>,
    jtr: &Array1<f64>,
    lambda: f64,
    method: DecompositionMethod,
) -> Option<Array1<f64>> {
    match method {
        DecompositionMethod::Cholesky => solve_cholesky(jtj, jtr, lambda),
        DecompositionMethod::QR => solve_qr(jacobian, residuals, jtj, lambda),
        DecompositionMethod::Auto => solve_cholesky(jtj, jtr, lambda)
            .or_else(|| solve_qr(jacobian, residuals, jtj, lambda)),
    }
}
