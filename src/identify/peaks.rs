//! Detection of significant peaks above the SNIP continuum.

use ndarray::Array1;
use serde::Serialize;
use std::ops::Range;

use crate::config::IdentifyConfig;
use crate::model::Resolution;
use crate::spectrum::{snip_background, Spectrum};

/// A significant local maximum of the net counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    /// Channel of the maximum.
    pub channel: usize,
    /// Energy after parabolic refinement (keV).
    pub energy: f64,
    /// Counts above the background at the maximum.
    pub net_counts: f64,
    /// `net_counts` in units of the Poisson noise of the background.
    pub significance: f64,
}

/// Net counts and their noise, channel by channel.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    pub background: Array1<f64>,
    pub net: Array1<f64>,
    pub sigma: Array1<f64>,
}

impl NoiseModel {
    /// SNIP background with Poisson noise `sqrt(max(bg, 1))`.
    pub fn estimate(spectrum: &Spectrum, resolution: &Resolution, width: f64) -> Self {
        let background = snip_background(
            spectrum.counts().view(),
            spectrum.calibration(),
            resolution,
            width,
        );
        let net = spectrum.counts() - &background;
        let sigma = background.mapv(|b| b.max(1.0).sqrt());
        Self {
            background,
            net,
            sigma,
        }
    }
}

/// Vertex offset of the parabola through three points, within ±0.5 channel.
fn parabolic_offset(left: f64, center: f64, right: f64) -> f64 {
    let denom = left - 2.0 * center + right;
    if denom < 0.0 {
        (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

/// Find significant local maxima inside `window`.
///
/// A channel is significant when its net counts reach both
/// `threshold_sigma` noise units and `min_net_counts`. It is a peak when
/// no channel within half a FWHM has higher net counts; among equal values
/// the first channel wins.
pub fn find_peaks(
    spectrum: &Spectrum,
    window: Range<usize>,
    resolution: &Resolution,
    config: &IdentifyConfig,
) -> Vec<Peak> {
    let noise = NoiseModel::estimate(spectrum, resolution, config.background_width);
    let calibration = spectrum.calibration();
    let net = &noise.net;

    let mut peaks = Vec::new();
    for i in window.clone() {
        let value = net[i];
        let significance = value / noise.sigma[i];
        if value < config.min_net_counts || significance < config.threshold_sigma {
            continue;
        }

        let channel = i as f64;
        let half = (0.5 * resolution.fwhm(calibration.energy(channel)) / calibration.slope(channel))
            .round()
            .max(1.0) as usize;
        let lo = i.saturating_sub(half).max(window.start);
        let hi = (i + half).min(window.end - 1);
        let is_max = (lo..i).all(|j| net[j] < value) && (i + 1..=hi).all(|j| net[j] <= value);
        if !is_max {
            continue;
        }

        let offset = if i > window.start && i + 1 < window.end {
            parabolic_offset(net[i - 1], value, net[i + 1])
        } else {
            0.0
        };
        peaks.push(Peak {
            channel: i,
            energy: calibration.energy(channel + offset),
            net_counts: value,
            significance,
        });
    }
    peaks
}
