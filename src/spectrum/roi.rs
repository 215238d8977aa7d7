//! Region-of-interest sums.
//!
//! The quick alternative to fitting: total counts in an energy window around
//! an element's strongest line. The default window is ±2σ of the detector
//! response at that line.

use serde::{Deserialize, Serialize};

use super::Spectrum;
use crate::error::{Result, XrfError};
use crate::lines::LineGroup;
use crate::model::Resolution;

/// Half-width of a default ROI, in standard deviations of the line.
pub const ROI_WIDTH_SIGMA: f64 = 2.0;

/// Named energy window (keV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl Roi {
    pub fn new(name: &str, low: f64, high: f64) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(XrfError::InvalidConfig(format!(
                "ROI {} must satisfy low < high, got [{}, {}]",
                name, low, high
            )));
        }
        Ok(Self {
            name: name.to_string(),
            low,
            high,
        })
    }

    /// Window of ±[`ROI_WIDTH_SIGMA`] σ around the strongest line of `group`.
    pub fn around_group(group: &LineGroup, resolution: &Resolution) -> Result<Self> {
        let line = group.primary_line(0.0, f64::INFINITY).ok_or_else(|| {
            XrfError::UnknownElement(format!("{} has no lines", group.name()))
        })?;
        let half = ROI_WIDTH_SIGMA * resolution.sigma(line.energy);
        Self::new(group.name(), line.energy - half, line.energy + half)
    }
}

/// Counts of one ROI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiSum {
    pub name: String,
    pub low: f64,
    pub high: f64,
    pub counts: f64,
}

impl Spectrum {
    /// Total counts of the channels with energy in `[low, high]` (keV).
    pub fn window_sum(&self, low: f64, high: f64) -> Result<f64> {
        let window = self.channel_window(low, high)?;
        Ok(self.counts.slice(ndarray::s![window]).sum())
    }

    /// Sum every ROI. A window with no channels inside the spectrum is an
    /// error.
    pub fn roi_sums(&self, rois: &[Roi]) -> Result<Vec<RoiSum>> {
        rois.iter()
            .map(|roi| {
                Ok(RoiSum {
                    name: roi.name.clone(),
                    low: roi.low,
                    high: roi.high,
                    counts: self.window_sum(roi.low, roi.high)?,
                })
            })
            .collect()
    }
}
