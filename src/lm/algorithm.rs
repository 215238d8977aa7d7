//! Implementation of the Levenberg-Marquardt algorithm.

use ndarray::{Array1, Array2};
use std::fmt;
use tracing::debug;

use crate::error::{Result, XrfError};
use crate::problem::Problem;
use crate::utils::finite_difference;
use crate::utils::matrix_convert::normal_equations;

use super::config::SolverConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::step::damped_step;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values (best found, also when not converged)
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of residual evaluations
    pub func_evals: usize,

    /// Why the run stopped
    pub status: ConvergenceStatus,

    /// A message describing the result
    pub message: String,

    /// The Jacobian at the solution
    pub jacobian: Array2<f64>,
}

impl LmResult {
    pub fn success(&self) -> bool {
        self.status.is_converged()
    }
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success())?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: SolverConfig,
}

impl LevenbergMarquardt {
    /// Create an optimizer with the given configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn jacobian<P: Problem>(&self, problem: &P, params: &Array1<f64>) -> Result<Array2<f64>> {
        if problem.has_custom_jacobian() {
            problem.jacobian(params)
        } else if self.config.parallel_jacobian {
            finite_difference::jacobian_parallel(problem, params, Some(self.config.fd_epsilon))
        } else {
            finite_difference::jacobian(problem, params, Some(self.config.fd_epsilon))
        }
    }

    fn finish<P: Problem>(
        &self,
        problem: &P,
        params: Array1<f64>,
        residuals: Array1<f64>,
        cost: f64,
        iterations: usize,
        func_evals: usize,
        status: ConvergenceStatus,
        message: String,
    ) -> Result<LmResult> {
        let jacobian = if params.is_empty() {
            Array2::zeros((residuals.len(), 0))
        } else {
            self.jacobian(problem, &params)?
        };
        debug!(
            iterations,
            func_evals,
            cost,
            status = %status,
            "Levenberg-Marquardt finished"
        );
        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals: func_evals + jacobian.ncols(),
            status,
            message,
            jacobian,
        })
    }

    /// Minimize the sum of squared residuals of `problem`.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Starting point
    ///
    /// # Returns
    ///
    /// * `Ok(LmResult)` with the best parameters found. A run that hits the
    ///   iteration cap is not an error; check `status`.
    /// * `Err` if the problem cannot be evaluated at the starting point.
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(XrfError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let criteria = ConvergenceCriteria::new(
            self.config.xtol,
            self.config.ftol,
            self.config.gtol,
            self.config.max_iterations,
        );

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut func_evals = 1;
        let mut cost = sum_of_squares(&residuals);

        if !cost.is_finite() {
            return self.finish(
                problem,
                params,
                residuals,
                cost,
                0,
                func_evals,
                ConvergenceStatus::NumericalError,
                "Non-finite residuals at the starting point".to_string(),
            );
        }

        if n_params == 0 {
            return self.finish(
                problem,
                params,
                residuals,
                cost,
                0,
                func_evals,
                ConvergenceStatus::NoFreeParameters,
                "All parameters are fixed".to_string(),
            );
        }

        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;

        loop {
            if iterations >= self.config.max_iterations {
                let message = format!(
                    "Maximum iterations ({}) reached",
                    self.config.max_iterations
                );
                return self.finish(
                    problem,
                    params,
                    residuals,
                    cost,
                    iterations,
                    func_evals,
                    ConvergenceStatus::MaxIterationsReached,
                    message,
                );
            }

            let jacobian = self.jacobian(problem, &params)?;
            func_evals += n_params;
            let (jtj, jtr) = normal_equations(&jacobian, &residuals);

            let gradient_norm = jtr.dot(&jtr).sqrt();
            if gradient_norm < self.config.gtol {
                let message = format!(
                    "Gradient convergence: ||g|| = {:.2e} < {:.2e}",
                    gradient_norm, self.config.gtol
                );
                return self.finish(
                    problem,
                    params,
                    residuals,
                    cost,
                    iterations,
                    func_evals,
                    ConvergenceStatus::GradientConvergence,
                    message,
                );
            }

            // Raise the damping until a step lowers the cost.
            loop {
                let step = damped_step(
                    &jacobian,
                    &residuals,
                    &jtj,
                    &jtr,
                    lambda,
                    self.config.decomposition_method,
                );

                let accepted = match step {
                    Some(step) => {
                        let new_params = &params + &step;
                        func_evals += 1;
                        match problem.eval(&new_params) {
                            Ok(new_residuals) => {
                                let new_cost = sum_of_squares(&new_residuals);
                                if new_cost.is_finite() && new_cost < cost {
                                    Some((new_params, new_residuals, new_cost))
                                } else {
                                    None
                                }
                            }
                            Err(err) => {
                                debug!(error = %err, lambda, "trial step rejected");
                                None
                            }
                        }
                    }
                    None => None,
                };

                match accepted {
                    Some((new_params, new_residuals, new_cost)) => {
                        iterations += 1;
                        let status = criteria.check(
                            &params,
                            &new_params,
                            cost,
                            new_cost,
                            gradient_norm,
                            iterations,
                        );
                        debug!(iteration = iterations, cost = new_cost, lambda, "step accepted");

                        params = new_params;
                        residuals = new_residuals;
                        let previous_cost = cost;
                        cost = new_cost;
                        lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);

                        if status.is_terminated() {
                            let message = match status {
                                ConvergenceStatus::MaxIterationsReached => format!(
                                    "Maximum iterations ({}) reached",
                                    self.config.max_iterations
                                ),
                                ConvergenceStatus::FunctionValueConvergence => format!(
                                    "Cost convergence: |df|/f = {:.2e} < {:.2e}",
                                    (previous_cost - cost) / previous_cost,
                                    self.config.ftol
                                ),
                                other => other.description().to_string(),
                            };
                            return self.finish(
                                problem, params, residuals, cost, iterations, func_evals, status,
                                message,
                            );
                        }
                        break;
                    }
                    None => {
                        if lambda >= self.config.max_lambda {
                            // Even a vanishing gradient step does not lower the cost.
                            return self.finish(
                                problem,
                                params,
                                residuals,
                                cost,
                                iterations,
                                func_evals,
                                ConvergenceStatus::FunctionValueConvergence,
                                "Cost cannot be reduced further".to_string(),
                            );
                        }
                        lambda = (lambda * self.config.lambda_up_factor).min(self.config.max_lambda);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// y = a * exp(-b * x)
    struct ExponentialDecay {
        x: Array1<f64>,
        y: Array1<f64>,
    }

    impl ExponentialDecay {
        fn new(a: f64, b: f64) -> Self {
            let x = Array1::linspace(0.0, 5.0, 40);
            let y = x.mapv(|x| a * (-b * x).exp());
            Self { x, y }
        }
    }

    impl Problem for ExponentialDecay {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(self.x.mapv(|x| params[0] * (-params[1] * x).exp()) - &self.y)
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.x.len()
        }
    }

    #[test]
    fn test_exponential_fit() {
        let problem = ExponentialDecay::new(3.0, 0.8);
        let lm = LevenbergMarquardt::default();
        let result = lm.minimize(&problem, array![1.0, 0.3]).unwrap();
        assert!(result.success(), "{}", result);
        assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(result.params[1], 0.8, epsilon = 1e-4);
        assert_eq!(result.jacobian.shape(), &[40, 2]);
    }

    #[test]
    fn test_parallel_jacobian_and_qr() {
        let problem = ExponentialDecay::new(2.0, 1.5);
        let config = SolverConfig::default()
            .with_parallel_jacobian(true)
            .with_decomposition_method(super::super::config::DecompositionMethod::QR);
        let result = LevenbergMarquardt::with_config(config)
            .minimize(&problem, array![1.0, 1.0])
            .unwrap();
        assert!(result.success());
        assert_relative_eq!(result.params[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(result.params[1], 1.5, epsilon = 1e-4);
    }

    #[test]
    fn test_iteration_cap_returns_best_found() {
        let problem = ExponentialDecay::new(3.0, 0.8);
        let start = array![0.5, 2.0];
        let start_cost = problem.eval_cost(&start).unwrap();
        let lm = LevenbergMarquardt::with_config(SolverConfig::default().with_max_iterations(1));
        let result = lm.minimize(&problem, start).unwrap();
        assert_eq!(result.status, ConvergenceStatus::MaxIterationsReached);
        assert!(!result.success());
        assert!(result.cost < start_cost);
    }

    #[test]
    fn test_dimension_mismatch() {
        let problem = ExponentialDecay::new(1.0, 1.0);
        let lm = LevenbergMarquardt::default();
        assert!(matches!(
            lm.minimize(&problem, array![1.0]),
            Err(XrfError::DimensionMismatch(_))
        ));
    }
}
