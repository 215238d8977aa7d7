//! Configuration for identification and fitting.
//!
//! All sections have defaults, so a JSON file only needs the keys it changes:
//!
//! ```
//! use xrffit_rs::config::XrfConfig;
//!
//! let config = XrfConfig::from_json(r#"{"scatter": {"incident_energy": 12.0}}"#).unwrap();
//! assert_eq!(config.scatter.incident_energy, Some(12.0));
//! assert_eq!(config.solver.max_iterations, 100);
//! ```

use crate::error::{Result, XrfError};
use crate::lines::LineTable;
use crate::lm::SolverConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Detector response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Electronic noise contribution to the FWHM (keV). Default: 0.1
    pub fwhm_offset: f64,
    /// Fano-factor term of the width. Default: 0.114
    pub fwhm_fanoprime: f64,
    /// Energy to create one electron-hole pair (keV). Default: 2.96e-3 (Si)
    pub epsilon: f64,
    /// Si escape peak intensity relative to its parent line. Default: 0 (off)
    pub escape_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fwhm_offset: 0.1,
            fwhm_fanoprime: 0.114,
            epsilon: 2.96e-3,
            escape_ratio: 0.0,
        }
    }
}

/// Elastic and Compton scattering of the incident beam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    /// Incident beam energy (keV). `None` disables the scatter peaks.
    pub incident_energy: Option<f64>,
    /// Scattering angle in degrees. Default: 90
    pub compton_angle: f64,
    /// Compton peak width relative to the detector width. Default: 1.5
    pub compton_fwhm_corr: f64,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            incident_energy: None,
            compton_angle: 90.0,
            compton_fwhm_corr: 1.5,
        }
    }
}

/// Element identification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Net counts must exceed this many standard deviations of the background. Default: 3
    pub threshold_sigma: f64,
    /// Minimum net counts for a significant peak. Default: 10
    pub min_net_counts: f64,
    /// Matching tolerance as a fraction of the local FWHM. Default: 0.5
    pub tolerance_fwhm: f64,
    /// Lower limit of the matching tolerance (keV). Default: 0.02
    pub min_tolerance_kev: f64,
    /// Minimum matched fraction of a group's in-range line weight. Default: 0.5
    pub min_consistency: f64,
    /// SNIP window for the noise model, in units of the local FWHM. Default: 3
    pub background_width: f64,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: 3.0,
            min_net_counts: 10.0,
            tolerance_fwhm: 0.5,
            min_tolerance_kev: 0.02,
            min_consistency: 0.5,
            background_width: 3.0,
        }
    }
}

/// How the continuum under the peaks is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BackgroundMethod {
    /// SNIP clipping of the observed data; `width` scales the clipping window
    /// in units of the local FWHM.
    Snip { width: f64 },
    /// Free `bkg_const + bkg_linear * E` terms.
    Linear,
    /// No background.
    None,
}

impl Default for BackgroundMethod {
    fn default() -> Self {
        BackgroundMethod::Snip { width: 3.0 }
    }
}

/// Energy window (keV) used for identification and fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyRange {
    pub low: f64,
    pub high: f64,
}

/// Fit model options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub background: BackgroundMethod,
    /// Added to |y| in the weights `1 / sqrt(c_weight + |y|)`. Default: 1
    pub c_weight: f64,
    /// Half-width of the `*_delta_center` bounds (keV). Default: 0.05
    pub max_center_shift: f64,
    /// Compute parameter standard errors after the fit. Default: true
    pub uncertainties: bool,
    /// Pile-up peaks to model, e.g. `Si_K-Si_K`. Default: none
    pub pileups: Vec<String>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            background: BackgroundMethod::default(),
            c_weight: 1.0,
            max_center_shift: 0.05,
            uncertainties: true,
            pileups: Vec::new(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrfConfig {
    pub detector: DetectorConfig,
    pub scatter: ScatterConfig,
    pub identify: IdentifyConfig,
    pub fit: FitConfig,
    pub solver: SolverConfig,
    /// Restrict identification and fitting to this window.
    pub energy_range: Option<EnergyRange>,
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(XrfError::InvalidConfig(format!(
            "{} must be positive and finite, got {}",
            name, value
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(XrfError::InvalidConfig(format!(
            "{} must be non-negative and finite, got {}",
            name, value
        )))
    }
}

impl XrfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_incident_energy(mut self, energy: f64) -> Self {
        self.scatter.incident_energy = Some(energy);
        self
    }

    pub fn with_background(mut self, background: BackgroundMethod) -> Self {
        self.fit.background = background;
        self
    }

    pub fn with_energy_range(mut self, low: f64, high: f64) -> Self {
        self.energy_range = Some(EnergyRange { low, high });
        self
    }

    pub fn with_escape_ratio(mut self, ratio: f64) -> Self {
        self.detector.escape_ratio = ratio;
        self
    }

    pub fn with_pileup(mut self, name: &str) -> Self {
        self.fit.pileups.push(name.to_string());
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        non_negative("detector.fwhm_offset", self.detector.fwhm_offset)?;
        non_negative("detector.fwhm_fanoprime", self.detector.fwhm_fanoprime)?;
        positive("detector.epsilon", self.detector.epsilon)?;
        non_negative("detector.escape_ratio", self.detector.escape_ratio)?;
        if self.detector.fwhm_offset == 0.0 && self.detector.fwhm_fanoprime == 0.0 {
            return Err(XrfError::InvalidConfig(
                "detector width terms cannot both be zero".to_string(),
            ));
        }

        if let Some(energy) = self.scatter.incident_energy {
            positive("scatter.incident_energy", energy)?;
        }
        if !self.scatter.compton_angle.is_finite() {
            return Err(XrfError::InvalidConfig(
                "scatter.compton_angle must be finite".to_string(),
            ));
        }
        positive("scatter.compton_fwhm_corr", self.scatter.compton_fwhm_corr)?;

        non_negative("identify.threshold_sigma", self.identify.threshold_sigma)?;
        non_negative("identify.min_net_counts", self.identify.min_net_counts)?;
        positive("identify.tolerance_fwhm", self.identify.tolerance_fwhm)?;
        non_negative("identify.min_tolerance_kev", self.identify.min_tolerance_kev)?;
        positive("identify.background_width", self.identify.background_width)?;
        if !(0.0..=1.0).contains(&self.identify.min_consistency) {
            return Err(XrfError::InvalidConfig(format!(
                "identify.min_consistency must be in [0, 1], got {}",
                self.identify.min_consistency
            )));
        }

        if let BackgroundMethod::Snip { width } = self.fit.background {
            positive("fit.background.width", width)?;
        }
        positive("fit.c_weight", self.fit.c_weight)?;
        positive("fit.max_center_shift", self.fit.max_center_shift)?;
        for name in &self.fit.pileups {
            LineTable::global().pileup(name)?;
        }

        if let Some(range) = self.energy_range {
            if !(range.low.is_finite() && range.high.is_finite() && range.low < range.high) {
                return Err(XrfError::InvalidConfig(format!(
                    "energy_range must satisfy low < high, got [{}, {}]",
                    range.low, range.high
                )));
            }
        }

        self.solver.validate()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: XrfConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: XrfConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
