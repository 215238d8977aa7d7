//! Parameter bounds and the bounded/unbounded variable transform.
//!
//! The optimizer works on unconstrained internal variables. Each fit parameter
//! maps its internal variable into `[min, max]` with the Minuit-style transforms
//! below, so no optimizer step can carry a parameter outside its bounds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Non-finite parameter value is not allowed")]
    NonFiniteValue,
}

/// Closed interval a parameter value must stay inside.
///
/// Infinite ends mean "unbounded on that side". In JSON an infinite end is
/// written as `null`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Serialize, Deserialize)]
struct BoundsRepr {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

impl Serialize for Bounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BoundsRepr {
            min: self.has_lower_bound().then_some(self.min),
            max: self.has_upper_bound().then_some(self.max),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = BoundsRepr::deserialize(deserializer)?;
        let min = repr.min.unwrap_or(f64::NEG_INFINITY);
        let max = repr.max.unwrap_or(f64::INFINITY);
        Bounds::new(min, max).map_err(serde::de::Error::custom)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Bounds {
    /// Create bounds `[min, max]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use xrffit_rs::parameters::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert!(bounds.contains(5.0));
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// `[min, +inf)`
    pub fn at_least(min: f64) -> Self {
        Self {
            min,
            max: f64::INFINITY,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Check that `value` is finite and inside the bounds.
    pub fn check(&self, value: f64) -> Result<(), BoundsError> {
        if !value.is_finite() {
            return Err(BoundsError::NonFiniteValue);
        }
        if !self.contains(value) {
            return Err(BoundsError::ValueOutsideBounds {
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Minuit-style mapping between an internal (unbounded) optimizer variable
/// and an external (bounded) parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// Map an internal variable to a parameter value inside the bounds.
    pub fn to_external(&self, internal: f64) -> f64 {
        let Bounds { min, max } = self.bounds;
        let external = match (self.bounds.has_lower_bound(), self.bounds.has_upper_bound()) {
            (false, false) => internal,
            (true, false) => min - 1.0 + (internal * internal + 1.0).sqrt(),
            (false, true) => max + 1.0 - (internal * internal + 1.0).sqrt(),
            (true, true) => min + (internal.sin() + 1.0) * (max - min) / 2.0,
        };
        // Rounding in the trig/sqrt forms can land one ulp outside.
        self.bounds.clamp(external)
    }

    /// Map a parameter value to its internal variable.
    pub fn to_internal(&self, external: f64) -> Result<f64, BoundsError> {
        self.bounds.check(external)?;
        let Bounds { min, max } = self.bounds;
        let internal = match (self.bounds.has_lower_bound(), self.bounds.has_upper_bound()) {
            (false, false) => external,
            (true, false) => ((external - min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((max - external + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                if max == min {
                    0.0
                } else {
                    (2.0 * (external - min) / (max - min) - 1.0).clamp(-1.0, 1.0).asin()
                }
            }
        };
        Ok(internal)
    }

    /// d(external)/d(internal) at the given internal value.
    pub fn derivative(&self, internal: f64) -> f64 {
        let Bounds { min, max } = self.bounds;
        match (self.bounds.has_lower_bound(), self.bounds.has_upper_bound()) {
            (false, false) => 1.0,
            (true, false) => internal / (internal * internal + 1.0).sqrt(),
            (false, true) => -internal / (internal * internal + 1.0).sqrt(),
            (true, true) => internal.cos() * (max - min) / 2.0,
        }
    }
}
