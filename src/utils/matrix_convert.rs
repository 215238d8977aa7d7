//! Conversions between ndarray and faer.
//!
//! Model code works with ndarray; the dense normal-equation products in the
//! optimizer and the covariance calculation run on faer matrices.

use faer::{Col, Mat};
use ndarray::{Array1, Array2};

/// Convert an ndarray Array2 to a faer Mat.
pub fn ndarray_to_faer(arr: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a faer Mat to an ndarray Array2.
pub fn faer_to_ndarray(mat: &Mat<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Convert an ndarray Array1 to a faer Col.
pub fn ndarray_vec_to_faer(arr: &Array1<f64>) -> Col<f64> {
    Col::from_fn(arr.len(), |i| arr[i])
}

/// Convert a faer Col to an ndarray Array1.
pub fn faer_vec_to_ndarray(col: &Col<f64>) -> Array1<f64> {
    Array1::from_shape_fn(col.nrows(), |i| col[i])
}

/// `(J^T J, J^T r)` computed with faer.
pub fn normal_equations(jacobian: &Array2<f64>, residuals: &Array1<f64>) -> (Array2<f64>, Array1<f64>) {
    let j = ndarray_to_faer(jacobian);
    let r = ndarray_vec_to_faer(residuals);
    let jtj: Mat<f64> = j.transpose() * j.as_ref();
    let jtr: Col<f64> = j.transpose() * r.as_ref();
    (faer_to_ndarray(&jtj), faer_vec_to_ndarray(&jtr))
}
