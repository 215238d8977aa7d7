//! Ordered collection of fit parameters.
//!
//! `FitParameters` keeps insertion order, so the optimizer vector built from
//! the free parameters has a stable layout between calls. It also owns the
//! mapping between that vector (internal, unbounded variables) and the
//! parameter values (external, bounded).

use crate::error::{Result as XrfResult, XrfError};
use crate::parameters::parameter::{FitParameter, ParamKind, ParameterError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::warn;

/// A named, ordered set of parameters for one fit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "ParametersRepr", into = "ParametersRepr")]
pub struct FitParameters {
    params: Vec<FitParameter>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct ParametersRepr {
    params: Vec<FitParameter>,
}

impl TryFrom<ParametersRepr> for FitParameters {
    type Error = ParameterError;

    fn try_from(repr: ParametersRepr) -> Result<Self, Self::Error> {
        let mut params = FitParameters::new();
        for param in repr.params {
            params.add(param)?;
        }
        Ok(params)
    }
}

impl From<FitParameters> for ParametersRepr {
    fn from(params: FitParameters) -> Self {
        ParametersRepr {
            params: params.params,
        }
    }
}

impl PartialEq for FitParameters {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl FitParameters {
    /// Create an empty collection.
    ///
    /// # Examples
    ///
    /// ```
    /// use xrffit_rs::parameters::{FitParameters, ParamKind};
    ///
    /// let mut params = FitParameters::new();
    /// params.add_param_with_bounds("Fe_K_area", ParamKind::Amplitude, 100.0, 0.0, f64::INFINITY).unwrap();
    /// assert_eq!(params.len(), 1);
    /// assert_eq!(params.value("Fe_K_area").unwrap(), 100.0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. Names must be unique.
    pub fn add(&mut self, param: FitParameter) -> Result<(), ParameterError> {
        if self.index.contains_key(param.name()) {
            return Err(ParameterError::Duplicate {
                name: param.name().to_string(),
            });
        }
        self.index.insert(param.name().to_string(), self.params.len());
        self.params.push(param);
        Ok(())
    }

    /// Add a free, bounded parameter.
    pub fn add_param_with_bounds(
        &mut self,
        name: &str,
        kind: ParamKind,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), ParameterError> {
        self.add(FitParameter::with_bounds(name, kind, value, min, max)?)
    }

    pub fn get(&self, name: &str) -> Option<&FitParameter> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FitParameter> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.params[i]),
            None => None,
        }
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut FitParameter, ParameterError> {
        self.get_mut(name).ok_or_else(|| ParameterError::NotFound {
            name: name.to_string(),
        })
    }

    /// Current value of a parameter.
    pub fn value(&self, name: &str) -> Result<f64, ParameterError> {
        self.get(name)
            .map(FitParameter::value)
            .ok_or_else(|| ParameterError::NotFound {
                name: name.to_string(),
            })
    }

    /// Set a parameter's value. Out-of-bounds values are rejected.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.require_mut(name)?.set_value(value)
    }

    /// Mark a parameter free (`true`) or fixed (`false`).
    pub fn set_vary(&mut self, name: &str, vary: bool) -> Result<(), ParameterError> {
        self.require_mut(name)?.set_vary(vary);
        Ok(())
    }

    pub fn set_bounds(&mut self, name: &str, min: f64, max: f64) -> Result<(), ParameterError> {
        self.require_mut(name)?.set_bounds(min, max)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.params.iter().map(FitParameter::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FitParameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FitParameter> {
        self.params.iter_mut()
    }

    /// Parameters the optimizer may change, in collection order.
    pub fn varying(&self) -> Vec<&FitParameter> {
        self.params.iter().filter(|p| p.vary()).collect()
    }

    pub fn fixed(&self) -> Vec<&FitParameter> {
        self.params.iter().filter(|p| !p.vary()).collect()
    }

    pub fn varying_count(&self) -> usize {
        self.params.iter().filter(|p| p.vary()).count()
    }

    /// Internal optimizer vector for the free parameters.
    pub fn varying_internal_values(&self) -> Result<Vec<f64>, ParameterError> {
        self.params
            .iter()
            .filter(|p| p.vary())
            .map(FitParameter::to_internal)
            .collect()
    }

    /// Write an internal optimizer vector back into the free parameters.
    ///
    /// Fixed parameters are not touched. Every resulting value lies inside
    /// its bounds because the transform maps onto the bounded interval.
    pub fn update_from_internal(&mut self, values: &[f64]) -> XrfResult<()> {
        let expected = self.varying_count();
        if values.len() != expected {
            return Err(XrfError::DimensionMismatch(format!(
                "expected {} internal values for free parameters, got {}",
                expected,
                values.len()
            )));
        }
        for (param, &internal) in self.params.iter_mut().filter(|p| p.vary()).zip(values) {
            if !internal.is_finite() {
                return Err(XrfError::FunctionEvaluation(format!(
                    "non-finite optimizer value for '{}'",
                    param.name()
                )));
            }
            let external = param.from_internal(internal);
            param.set_value(external)?;
        }
        Ok(())
    }

    /// Set standard errors of the free parameters, in collection order.
    /// Fixed parameters get `None`.
    pub fn set_varying_stderr(&mut self, stderr: &[Option<f64>]) -> XrfResult<()> {
        if stderr.len() != self.varying_count() {
            return Err(XrfError::DimensionMismatch(format!(
                "expected {} standard errors, got {}",
                self.varying_count(),
                stderr.len()
            )));
        }
        let mut free = stderr.iter();
        for param in &mut self.params {
            if param.vary() {
                param.set_stderr(free.next().copied().flatten());
            } else {
                param.set_stderr(None);
            }
        }
        Ok(())
    }

    /// Reset every parameter to its initial value.
    pub fn reset(&mut self) {
        for param in &mut self.params {
            param.reset();
        }
    }

    /// Copy values of same-named parameters from `other`, clamped into this
    /// collection's bounds. Parameters missing from `other`, or whose source
    /// value is not finite, are left alone.
    pub fn update_values_from(&mut self, other: &FitParameters) {
        for param in &mut self.params {
            let Some(source) = other.get(param.name()) else {
                continue;
            };
            let value = param.bounds().clamp(source.value());
            if let Err(err) = param.set_value(value) {
                warn!(parameter = param.name(), error = %err, "value not copied");
            }
        }
    }

    /// Replace same-named parameters with clones of those in `template`.
    ///
    /// Values, bounds and vary flags all come from the template. Names the
    /// template does not know keep their current definition, and template
    /// entries absent here are ignored.
    pub fn overlay(&mut self, template: &FitParameters) {
        for param in &mut self.params {
            if let Some(source) = template.get(param.name()) {
                *param = source.clone();
            }
        }
    }

    pub fn to_json(&self) -> XrfResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> XrfResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> XrfResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load from a JSON file written by [`FitParameters::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> XrfResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
