//! Levenberg-Marquardt algorithm implementation.
//!
//! The solver works on any [`Problem`](crate::problem::Problem) and minimizes
//! the sum of squared residuals over an unconstrained parameter vector. Bounds
//! are handled one level up, by the parameter transform in
//! [`crate::parameters`].

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::{DecompositionMethod, SolverConfig};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
