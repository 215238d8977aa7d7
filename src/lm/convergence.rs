//! Convergence criteria for the solver.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Possible convergence states of a solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// The solver is still running.
    Running,

    /// Converged due to a small parameter change.
    ParameterConvergence,

    /// Converged due to a small relative decrease of the cost.
    FunctionValueConvergence,

    /// Converged due to a small gradient.
    GradientConvergence,

    /// Nothing to optimize: every parameter is fixed.
    NoFreeParameters,

    /// Stopped at the iteration cap.
    MaxIterationsReached,

    /// Stopped because the residuals became non-finite.
    NumericalError,
}

impl ConvergenceStatus {
    /// Returns true if the run has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the run has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::NoFreeParameters
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "still running",
            ConvergenceStatus::ParameterConvergence => "converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "converged: small cost change",
            ConvergenceStatus::GradientConvergence => "converged: small gradient",
            ConvergenceStatus::NoFreeParameters => "no free parameters",
            ConvergenceStatus::MaxIterationsReached => "terminated: maximum iterations reached",
            ConvergenceStatus::NumericalError => "terminated: numerical error",
        }
    }
}

impl fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Criteria for deciding when an accepted step ends the run.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance for the relative parameter change.
    pub xtol: f64,

    /// Tolerance for the relative cost decrease.
    pub ftol: f64,

    /// Tolerance for the gradient norm.
    pub gtol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            xtol: 1e-8,
            ftol: 1e-5,
            gtol: 1e-10,
            max_iterations: 100,
        }
    }
}

impl ConvergenceCriteria {
    pub fn new(xtol: f64, ftol: f64, gtol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            gtol,
            max_iterations,
        }
    }

    /// Largest parameter change relative to `max(|x|, 1)`.
    pub fn relative_change(params: &Array1<f64>, new_params: &Array1<f64>) -> f64 {
        new_params
            .iter()
            .zip(params.iter())
            .map(|(a, b)| (a - b).abs() / b.abs().max(1.0))
            .fold(0.0, f64::max)
    }

    /// Status after an accepted step.
    ///
    /// # Arguments
    ///
    /// * `params` - Parameters before the step
    /// * `new_params` - Parameters after the step
    /// * `cost` - Cost before the step
    /// * `new_cost` - Cost after the step
    /// * `gradient_norm` - Norm of `J^T r` before the step
    /// * `iterations` - Number of accepted steps so far, including this one
    pub fn check(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        cost: f64,
        new_cost: f64,
        gradient_norm: f64,
        iterations: usize,
    ) -> ConvergenceStatus {
        if gradient_norm < self.gtol {
            return ConvergenceStatus::GradientConvergence;
        }

        if Self::relative_change(params, new_params) < self.xtol {
            return ConvergenceStatus::ParameterConvergence;
        }

        let cost_change = (cost - new_cost).abs() / cost.max(f64::MIN_POSITIVE);
        if cost_change < self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        if iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }

        ConvergenceStatus::Running
    }
}
