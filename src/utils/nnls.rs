//! Non-negative least squares.
//!
//! Lawson-Hanson active-set method: minimize `|A x - b|^2` subject to
//! `x >= 0`. It works on the normal equations `G = A^T A`, `c = A^T b`, so a
//! design matrix shared by many right-hand sides is reduced once.

use ndarray::{Array1, Array2};

use crate::error::{Result, XrfError};
use crate::lm::step::{cholesky, cholesky_solve};

/// Outer iterations allowed per unknown.
const MAX_ITERATIONS_PER_UNKNOWN: usize = 3;

/// Relative size of a gradient entry that still counts as positive.
const GRADIENT_TOLERANCE: f64 = 1e-12;

/// Unconstrained solution on the passive set; zero elsewhere.
fn passive_solution(gram: &Array2<f64>, rhs: &Array1<f64>, passive: &[bool]) -> Result<Array1<f64>> {
    let index: Vec<usize> = (0..passive.len()).filter(|&i| passive[i]).collect();
    let sub = Array2::from_shape_fn((index.len(), index.len()), |(r, c)| gram[[index[r], index[c]]]);
    let sub_rhs = Array1::from_shape_fn(index.len(), |r| rhs[index[r]]);
    let l = cholesky(&sub).ok_or(XrfError::SingularMatrix)?;
    let solved = cholesky_solve(&l, &sub_rhs);

    let mut z = Array1::zeros(passive.len());
    for (k, &i) in index.iter().enumerate() {
        z[i] = solved[k];
    }
    Ok(z)
}

/// NNLS from the normal equations `gram = A^T A`, `rhs = A^T b`.
///
/// Returns `SingularMatrix` when the columns selected into the solution are
/// linearly dependent.
pub fn nnls_normal(gram: &Array2<f64>, rhs: &Array1<f64>) -> Result<Array1<f64>> {
    let n = rhs.len();
    if gram.nrows() != n || gram.ncols() != n {
        return Err(XrfError::DimensionMismatch(format!(
            "Gram matrix is {}x{} but the right-hand side has {} entries",
            gram.nrows(),
            gram.ncols(),
            n
        )));
    }

    let tol = GRADIENT_TOLERANCE * rhs.iter().fold(f64::MIN_POSITIVE, |m, v| m.max(v.abs()));
    let mut x = Array1::zeros(n);
    let mut passive = vec![false; n];

    for _ in 0..MAX_ITERATIONS_PER_UNKNOWN * n.max(1) {
        let gradient = rhs - &gram.dot(&x);
        let entering = (0..n)
            .filter(|&j| !passive[j] && gradient[j] > tol)
            .max_by(|&a, &b| gradient[a].total_cmp(&gradient[b]));
        let Some(entering) = entering else {
            return Ok(x);
        };
        passive[entering] = true;

        loop {
            let z = passive_solution(gram, rhs, &passive)?;
            let blocking = (0..n)
                .filter(|&i| passive[i] && z[i] <= 0.0)
                .map(|i| (i, x[i] / (x[i] - z[i])))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((leaving, alpha)) = blocking else {
                x = z;
                break;
            };

            x = &x + &((&z - &x) * alpha);
            x[leaving] = 0.0;
            for i in 0..n {
                if passive[i] && x[i] <= 0.0 {
                    passive[i] = false;
                    x[i] = 0.0;
                }
            }
        }
    }

    Err(XrfError::FunctionEvaluation(
        "non-negative least squares did not converge".to_string(),
    ))
}
