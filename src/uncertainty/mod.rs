//! # Uncertainty Calculation
//!
//! Standard errors of fitted parameters from the Jacobian at the solution,
//! in the lmfit manner: covariance scaled by the reduced chi-square, then
//! propagated through the bounds transform of each parameter.

mod covariance;

pub use covariance::{calculate_covariance, parameter_stderr, standard_errors_from_covariance};
