//! Configuration options for the Levenberg-Marquardt solver.

use crate::error::{Result, XrfError};
use serde::{Deserialize, Serialize};

/// Method for solving the damped normal equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionMethod {
    /// Cholesky factorization of `J^T J + lambda D`.
    Cholesky,
    /// QR factorization of the augmented system `[J; sqrt(lambda D)]`.
    QR,
    /// Cholesky, falling back to QR when the matrix is not positive definite.
    #[default]
    Auto,
}

/// Configuration options for the Levenberg-Marquardt solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of iterations. Default: 100
    pub max_iterations: usize,

    /// Tolerance for the relative decrease of the cost. Default: 1e-5
    pub ftol: f64,

    /// Tolerance for the relative parameter change. Default: 1e-8
    pub xtol: f64,

    /// Tolerance for the gradient norm. Default: 1e-10
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e10
    pub max_lambda: f64,

    /// Relative step of the finite-difference Jacobian. Default: 1e-8
    pub fd_epsilon: f64,

    /// Evaluate Jacobian columns on the rayon pool. Default: false
    pub parallel_jacobian: bool,

    /// Method to use for solving the linear system. Default: Auto
    pub decomposition_method: DecompositionMethod,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-5,
            xtol: 1e-8,
            gtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e10,
            fd_epsilon: 1e-8,
            parallel_jacobian: false,
            decomposition_method: DecompositionMethod::default(),
        }
    }
}

impl SolverConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    pub fn with_parallel_jacobian(mut self, parallel: bool) -> Self {
        self.parallel_jacobian = parallel;
        self
    }

    pub fn with_decomposition_method(mut self, method: DecompositionMethod) -> Self {
        self.decomposition_method = method;
        self
    }

    /// Check tolerances and damping settings.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("solver.ftol", self.ftol),
            ("solver.xtol", self.xtol),
            ("solver.gtol", self.gtol),
            ("solver.fd_epsilon", self.fd_epsilon),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value >= 0.0) {
                return Err(XrfError::InvalidConfig(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.fd_epsilon == 0.0 {
            return Err(XrfError::InvalidConfig(
                "solver.fd_epsilon must be positive".to_string(),
            ));
        }
        if !(self.min_lambda > 0.0
            && self.min_lambda <= self.initial_lambda
            && self.initial_lambda <= self.max_lambda
            && self.max_lambda.is_finite())
        {
            return Err(XrfError::InvalidConfig(format!(
                "solver lambda settings must satisfy 0 < min ({}) <= initial ({}) <= max ({})",
                self.min_lambda, self.initial_lambda, self.max_lambda
            )));
        }
        if !(self.lambda_up_factor > 1.0 && self.lambda_down_factor > 0.0 && self.lambda_down_factor < 1.0) {
            return Err(XrfError::InvalidConfig(
                "solver lambda factors must satisfy up > 1 and 0 < down < 1".to_string(),
            ));
        }
        Ok(())
    }
}
