//! Results of a spectrum fit.

use ndarray::Array1;
use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::lm::ConvergenceStatus;
use crate::parameters::FitParameters;

/// Fitted area of one line group or pile-up peak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementFit {
    /// Line group or pile-up name, e.g. `Fe_K`, `Si_K-Si_K`.
    pub group: String,
    /// Integrated counts of the group's strongest line.
    pub area: f64,
    pub stderr: Option<f64>,
}

/// Outcome of one solver run. A run that hit the iteration cap is still a
/// result, with `converged == false` and the best parameters found.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub label: Option<String>,
    pub elements: Vec<ElementFit>,
    /// Final values of every parameter, free and fixed.
    pub params: FitParameters,
    /// Nominal channel energies of the fitted window (keV).
    pub energies: Array1<f64>,
    pub observed: Array1<f64>,
    pub model: Array1<f64>,
    pub background: Array1<f64>,
    /// `model - observed`
    pub residuals: Array1<f64>,
    /// Weighted sum of squared residuals.
    pub chi_square: f64,
    pub reduced_chi_square: f64,
    pub r_squared: f64,
    pub iterations: usize,
    pub func_evals: usize,
    pub converged: bool,
    pub status: ConvergenceStatus,
    pub message: String,
}

impl FitResult {
    pub fn element(&self, group: &str) -> Option<&ElementFit> {
        self.elements.iter().find(|e| e.group == group)
    }

    /// Fitted area of a line group.
    pub fn area(&self, group: &str) -> Option<f64> {
        self.element(group).map(|e| e.area)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Coefficient of determination of `model` against `observed`.
pub(crate) fn r_squared(observed: &Array1<f64>, model: &Array1<f64>) -> f64 {
    let mean = observed.mean().unwrap_or(0.0);
    let ss_res: f64 = observed
        .iter()
        .zip(model.iter())
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            writeln!(f, "Fit result for {}:", label)?;
        } else {
            writeln!(f, "Fit result:")?;
        }
        writeln!(f, "  Converged: {} ({})", self.converged, self.message)?;
        writeln!(f, "  Iterations: {}, function evaluations: {}", self.iterations, self.func_evals)?;
        writeln!(
            f,
            "  Chi-square: {:.4e}, reduced: {:.4}, R^2: {:.5}",
            self.chi_square, self.reduced_chi_square, self.r_squared
        )?;
        for element in &self.elements {
            match element.stderr {
                Some(stderr) => writeln!(f, "  {:<10} {:>14.3} +/- {:.3}", element.group, element.area, stderr)?,
                None => writeln!(f, "  {:<10} {:>14.3}", element.group, element.area)?,
            }
        }
        Ok(())
    }
}
