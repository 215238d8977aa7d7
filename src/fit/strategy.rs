//! Fit strategies: which parameter kinds an optimizer pass may change.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XrfError};
use crate::parameters::{FitParameters, ParamKind};

/// One optimizer pass of a sequential fit.
///
/// A parameter is free during the pass when it is free in the parameter set
/// *and* its kind is listed here, so parameters the user fixed stay fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStrategy {
    pub name: String,
    pub free_kinds: Vec<ParamKind>,
}

impl FitStrategy {
    pub fn new(name: &str, free_kinds: &[ParamKind]) -> Self {
        Self {
            name: name.to_string(),
            free_kinds: free_kinds.to_vec(),
        }
    }

    /// Line and scatter areas only.
    pub fn linear() -> Self {
        Self::new("linear", &[ParamKind::Amplitude, ParamKind::Scatter])
    }

    /// Areas and energy calibration.
    pub fn free_energy() -> Self {
        Self::new(
            "free_energy",
            &[ParamKind::Amplitude, ParamKind::Scatter, ParamKind::Calibration],
        )
    }

    /// Areas, calibration, peak width and background.
    pub fn free_all() -> Self {
        Self::new(
            "free_all",
            &[
                ParamKind::Amplitude,
                ParamKind::Scatter,
                ParamKind::Calibration,
                ParamKind::Width,
                ParamKind::Background,
            ],
        )
    }

    /// A built-in strategy by name.
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::linear()),
            "free_energy" => Ok(Self::free_energy()),
            "free_all" => Ok(Self::free_all()),
            other => Err(XrfError::InvalidConfig(format!(
                "unknown fit strategy '{}'",
                other
            ))),
        }
    }

    pub fn allows(&self, kind: ParamKind) -> bool {
        self.free_kinds.contains(&kind)
    }

    /// Copy of `params` with the vary flags of this pass.
    pub fn apply(&self, params: &FitParameters) -> FitParameters {
        let mut pass = params.clone();
        for param in pass.iter_mut() {
            let vary = param.vary() && self.allows(param.kind());
            param.set_vary(vary);
        }
        pass
    }
}
