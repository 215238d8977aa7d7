//! # xrffit-rs
//!
//! `xrffit-rs` fits X-ray fluorescence spectra. It covers:
//! - automatic identification of the elements present in a spectrum
//! - a forward model of Gaussian fluorescence lines, detector escape peaks,
//!   elastic and Compton scatter and a continuum background
//! - bounded Levenberg-Marquardt refinement of line areas, energy calibration
//!   and detector resolution, with standard errors from the covariance matrix
//! - batch fitting of many spectra in parallel, by full refinement or by a
//!   fast non-negative linear fit of the areas
//! - pile-up peaks and region-of-interest sums
//! - a preview session that recomputes the model on every parameter change
//!
//! ## Basic Usage
//!
//! ```
//! use ndarray::Array1;
//! use xrffit_rs::{Calibration, FitSolver, Spectrum, XrfConfig};
//!
//! let solver = FitSolver::new(XrfConfig::new()).unwrap();
//! let cal = Calibration::linear(0.0, 0.01).unwrap();
//! let spectrum = Spectrum::new(Array1::from_elem(1200, 20.0), cal).unwrap();
//!
//! // A flat spectrum contains no elements; the fit still runs on what was found.
//! let (identification, _result) = solver.auto_fit(&spectrum).unwrap();
//! assert!(identification.is_empty());
//! ```

pub mod config;
pub mod error;
pub mod fit;
pub mod identify;
pub mod lines;
pub mod lm;
pub mod model;
pub mod parameters;
pub mod preview;
pub mod problem;
pub mod spectrum;
pub mod uncertainty;
pub mod utils;

pub use config::XrfConfig;
pub use error::{Result, XrfError};
pub use fit::{BatchItem, BatchOutcome, FitResult, FitSolver, FitStrategy, LinearFitResult, LinearModel};
pub use identify::{ElementIdentifier, Identification};
pub use lines::{LineGroup, LineTable};
pub use lm::LevenbergMarquardt;
pub use model::SpectrumModel;
pub use parameters::{FitParameter, FitParameters, ParamKind};
pub use preview::PreviewSession;
pub use problem::Problem;
pub use spectrum::{Calibration, RawSpectrum, Spectrum};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
