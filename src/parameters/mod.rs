//! # Parameter System
//!
//! Named, bounded fit parameters.
//!
//! - [`FitParameter`]: a scalar with bounds, a free/fixed flag and a [`ParamKind`]
//! - [`FitParameters`]: an ordered collection that maps free parameters to and
//!   from the optimizer's internal vector
//! - [`Bounds`] and [`BoundsTransform`]: keep values inside their bounds while
//!   the optimizer works on unbounded variables
//!
//! ```rust
//! use xrffit_rs::parameters::{FitParameters, ParamKind};
//!
//! let mut params = FitParameters::new();
//! params.add_param_with_bounds("Ca_K_area", ParamKind::Amplitude, 50.0, 0.0, f64::INFINITY).unwrap();
//! params.add_param_with_bounds("fwhm_offset", ParamKind::Width, 0.1, 0.05, 0.3).unwrap();
//!
//! // Lock the detector width ("advanced mode")
//! params.set_vary("fwhm_offset", false).unwrap();
//! assert_eq!(params.varying_count(), 1);
//!
//! // Out-of-bounds values are rejected
//! assert!(params.set_value("Ca_K_area", -1.0).is_err());
//! ```

pub mod bounds;
pub mod parameter;
pub mod parameters;

pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use parameter::{FitParameter, ParamKind, ParameterError};
pub use parameters::FitParameters;
