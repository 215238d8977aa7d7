//! Numerical helpers shared by the optimizer, the uncertainty estimate and
//! the linear area fit.

pub mod finite_difference;
pub mod matrix_convert;
pub mod nnls;

pub use finite_difference::{jacobian, jacobian_parallel};
pub use matrix_convert::{
    faer_to_ndarray, faer_vec_to_ndarray, ndarray_to_faer, ndarray_vec_to_faer, normal_equations,
};
pub use nnls::nnls_normal;
