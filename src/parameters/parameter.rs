//! A single named fit parameter.
//!
//! A `FitParameter` is a scalar with bounds, a free/fixed flag and a kind.
//! Its value is kept inside the bounds at all times: `set_value` rejects
//! out-of-range values and `set_bounds` clamps the current value.

use crate::parameters::bounds::{Bounds, BoundsError, BoundsTransform};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    #[error("Parameter '{name}' not found")]
    NotFound { name: String },

    #[error("Parameter '{name}' already exists")]
    Duplicate { name: String },

    #[error("Parameter name must not be empty")]
    EmptyName,
}

/// What a parameter controls in the spectrum model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Integrated area of a line group.
    Amplitude,
    /// Shift of a line group's center energy (keV).
    EnergyShift,
    /// Detector resolution terms.
    Width,
    /// Polynomial background coefficient.
    Background,
    /// Energy calibration terms.
    Calibration,
    /// Elastic or Compton scatter area.
    Scatter,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Amplitude => "amplitude",
            ParamKind::EnergyShift => "energy shift",
            ParamKind::Width => "width",
            ParamKind::Background => "background",
            ParamKind::Calibration => "calibration",
            ParamKind::Scatter => "scatter",
        };
        f.write_str(name)
    }
}

/// A named fit parameter.
///
/// `vary == true` means the optimizer may change it ("free"); `false` means
/// it is user-locked ("fixed") and comes back from a fit unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterRepr")]
pub struct FitParameter {
    name: String,
    kind: ParamKind,
    value: f64,
    init_value: f64,
    vary: bool,
    bounds: Bounds,
    stderr: Option<f64>,
}

#[derive(Deserialize)]
struct ParameterRepr {
    name: String,
    kind: ParamKind,
    value: f64,
    #[serde(default)]
    init_value: Option<f64>,
    #[serde(default = "default_vary")]
    vary: bool,
    #[serde(default)]
    bounds: Bounds,
    #[serde(default)]
    stderr: Option<f64>,
}

fn default_vary() -> bool {
    true
}

impl TryFrom<ParameterRepr> for FitParameter {
    type Error = ParameterError;

    fn try_from(repr: ParameterRepr) -> Result<Self, Self::Error> {
        let mut param = FitParameter::with_bounds(
            &repr.name,
            repr.kind,
            repr.value,
            repr.bounds.min,
            repr.bounds.max,
        )?;
        repr.bounds.check(repr.value)?;
        if let Some(init) = repr.init_value {
            param.init_value = init;
        }
        param.vary = repr.vary;
        param.stderr = repr.stderr;
        Ok(param)
    }
}

impl FitParameter {
    /// Create an unbounded, free parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use xrffit_rs::parameters::{FitParameter, ParamKind};
    ///
    /// let param = FitParameter::new("e_offset", ParamKind::Calibration, 0.01);
    /// assert_eq!(param.name(), "e_offset");
    /// assert!(param.vary());
    /// ```
    pub fn new(name: &str, kind: ParamKind, value: f64) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value,
            init_value: value,
            vary: true,
            bounds: Bounds::unbounded(),
            stderr: None,
        }
    }

    /// Create a free parameter with bounds. The value is clamped into `[min, max]`.
    pub fn with_bounds(
        name: &str,
        kind: ParamKind,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<Self, ParameterError> {
        if name.is_empty() {
            return Err(ParameterError::EmptyName);
        }
        if !value.is_finite() {
            return Err(BoundsError::NonFiniteValue.into());
        }
        let bounds = Bounds::new(min, max)?;
        let value = bounds.clamp(value);
        Ok(Self {
            name: name.to_string(),
            kind,
            value,
            init_value: value,
            vary: true,
            bounds,
            stderr: None,
        })
    }

    /// Builder form of `set_vary(false)`.
    pub fn fixed(mut self) -> Self {
        self.vary = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value. Values outside the bounds are rejected and leave the
    /// parameter untouched.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        self.bounds.check(value)?;
        self.value = value;
        Ok(())
    }

    pub fn init_value(&self) -> f64 {
        self.init_value
    }

    /// Reset to the initial value, clamped into the current bounds.
    pub fn reset(&mut self) {
        self.value = self.bounds.clamp(self.init_value);
        self.stderr = None;
    }

    pub fn vary(&self) -> bool {
        self.vary
    }

    pub fn set_vary(&mut self, vary: bool) {
        self.vary = vary;
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    /// Replace the bounds, clamping the current value into them.
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        self.value = bounds.clamp(self.value);
        Ok(())
    }

    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    pub fn set_stderr(&mut self, stderr: Option<f64>) {
        self.stderr = stderr;
    }

    pub fn bounds_transform(&self) -> BoundsTransform {
        BoundsTransform::new(self.bounds)
    }

    /// Internal (unbounded) optimizer variable for the current value.
    pub fn to_internal(&self) -> Result<f64, ParameterError> {
        Ok(self.bounds_transform().to_internal(self.value)?)
    }

    /// Parameter value for an internal optimizer variable. Always inside bounds.
    pub fn from_internal(&self, internal: f64) -> f64 {
        self.bounds_transform().to_external(internal)
    }
}
