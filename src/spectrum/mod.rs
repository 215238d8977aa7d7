//! Measured spectra and their energy calibration.
//!
//! A [`Spectrum`] is validated once at construction and never changes size
//! afterwards; every transformation (trimming, summing) returns a new value.
//! [`RawSpectrum`] is the unchecked form, used where a malformed input must be
//! reported per item instead of rejected up front (batch fitting).

pub mod background;
pub mod roi;

use crate::error::{Result, XrfError};
use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub use background::snip_background;
pub use roi::{Roi, RoiSum};

/// Quadratic channel-to-energy calibration, `E(ch) = offset + linear*ch + quadratic*ch^2` (keV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub offset: f64,
    pub linear: f64,
    #[serde(default)]
    pub quadratic: f64,
}

impl Calibration {
    /// Quadratic calibration. The linear term must be positive.
    pub fn new(offset: f64, linear: f64, quadratic: f64) -> Result<Self> {
        let calibration = Self {
            offset,
            linear,
            quadratic,
        };
        if !(offset.is_finite() && linear.is_finite() && quadratic.is_finite()) {
            return Err(XrfError::MalformedSpectrum(format!(
                "non-finite calibration {:?}",
                calibration
            )));
        }
        if linear <= 0.0 {
            return Err(XrfError::MalformedSpectrum(format!(
                "calibration linear term must be positive, got {}",
                linear
            )));
        }
        Ok(calibration)
    }

    pub fn linear(offset: f64, linear: f64) -> Result<Self> {
        Self::new(offset, linear, 0.0)
    }

    /// Energy (keV) at a (possibly fractional) channel.
    #[inline]
    pub fn energy(&self, channel: f64) -> f64 {
        self.offset + channel * (self.linear + channel * self.quadratic)
    }

    /// Energy width of one channel at `channel`.
    #[inline]
    pub fn slope(&self, channel: f64) -> f64 {
        self.linear + 2.0 * self.quadratic * channel
    }

    /// Fractional channel at which `energy` falls.
    pub fn channel(&self, energy: f64) -> f64 {
        let c = self.offset - energy;
        if self.quadratic.abs() < 1e-15 {
            return -c / self.linear;
        }
        // Root on the increasing branch, written to avoid cancellation.
        let disc = (self.linear * self.linear - 4.0 * self.quadratic * c).max(0.0);
        (-2.0 * c) / (self.linear + disc.sqrt())
    }

    /// Energies of channels `0..len`.
    pub fn energies(&self, len: usize) -> Array1<f64> {
        Array1::from_shape_fn(len, |i| self.energy(i as f64))
    }

    /// Energy must increase strictly over channels `0..len`.
    fn check_monotonic(&self, len: usize) -> Result<()> {
        let last = len.saturating_sub(1) as f64;
        if self.slope(0.0) <= 0.0 || self.slope(last) <= 0.0 {
            return Err(XrfError::MalformedSpectrum(format!(
                "calibration is not increasing over {} channels",
                len
            )));
        }
        Ok(())
    }

    /// Calibration of a sub-range starting at channel `start`, giving the
    /// same energies for the same physical channels.
    fn shifted(&self, start: usize) -> Self {
        let s = start as f64;
        Self {
            offset: self.energy(s),
            linear: self.slope(s),
            quadratic: self.quadratic,
        }
    }
}

/// Unvalidated spectrum input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpectrum {
    pub counts: Vec<f64>,
    pub calibration: Calibration,
    #[serde(default = "default_live_time")]
    pub live_time: f64,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_live_time() -> f64 {
    1.0
}

impl RawSpectrum {
    pub fn new(counts: Vec<f64>, calibration: Calibration) -> Self {
        Self {
            counts,
            calibration,
            live_time: 1.0,
            label: None,
        }
    }

    /// Check the input and build a [`Spectrum`].
    pub fn validate(self) -> Result<Spectrum> {
        let calibration = Calibration::new(
            self.calibration.offset,
            self.calibration.linear,
            self.calibration.quadratic,
        )?;
        let mut spectrum = Spectrum::new(Array1::from(self.counts), calibration)?;
        spectrum = spectrum.with_live_time(self.live_time)?;
        spectrum.label = self.label;
        Ok(spectrum)
    }
}

impl From<Spectrum> for RawSpectrum {
    fn from(spectrum: Spectrum) -> Self {
        Self {
            counts: spectrum.counts.to_vec(),
            calibration: spectrum.calibration,
            live_time: spectrum.live_time,
            label: spectrum.label,
        }
    }
}

impl TryFrom<RawSpectrum> for Spectrum {
    type Error = XrfError;

    fn try_from(raw: RawSpectrum) -> Result<Self> {
        raw.validate()
    }
}

/// A validated, immutable spectrum: one count value per detector channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectrum", into = "RawSpectrum")]
pub struct Spectrum {
    counts: Array1<f64>,
    calibration: Calibration,
    live_time: f64,
    label: Option<String>,
}

impl Spectrum {
    /// Build a spectrum from channel counts.
    ///
    /// # Errors
    ///
    /// `MalformedSpectrum` if `counts` is empty, holds negative or non-finite
    /// values, or the calibration is not increasing over the channel range.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use xrffit_rs::spectrum::{Calibration, Spectrum};
    ///
    /// let cal = Calibration::linear(0.0, 0.01).unwrap();
    /// let spectrum = Spectrum::new(array![1.0, 5.0, 2.0], cal).unwrap();
    /// assert_eq!(spectrum.len(), 3);
    /// assert!(Spectrum::new(array![1.0, f64::NAN], cal).is_err());
    /// ```
    pub fn new(counts: Array1<f64>, calibration: Calibration) -> Result<Self> {
        if counts.is_empty() {
            return Err(XrfError::MalformedSpectrum(
                "spectrum has no channels".to_string(),
            ));
        }
        if let Some((i, &c)) = counts
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_finite() || **c < 0.0)
        {
            return Err(XrfError::MalformedSpectrum(format!(
                "channel {} has invalid count {}",
                i, c
            )));
        }
        calibration.check_monotonic(counts.len())?;
        Ok(Self {
            counts,
            calibration,
            live_time: 1.0,
            label: None,
        })
    }

    /// Build a spectrum from parallel energy and count arrays on a uniform grid.
    pub fn from_energy_counts(energies: &[f64], counts: &[f64]) -> Result<Self> {
        if energies.len() != counts.len() {
            return Err(XrfError::MalformedSpectrum(format!(
                "{} energies but {} counts",
                energies.len(),
                counts.len()
            )));
        }
        if energies.len() < 2 {
            return Err(XrfError::MalformedSpectrum(
                "at least two (energy, count) pairs are needed to derive a calibration"
                    .to_string(),
            ));
        }
        let n = energies.len();
        let step = (energies[n - 1] - energies[0]) / (n - 1) as f64;
        let tolerance = 1e-6 * step.abs().max(f64::MIN_POSITIVE);
        for (i, window) in energies.windows(2).enumerate() {
            let deviation = ((window[1] - window[0]) - step).abs();
            if deviation.is_nan() || deviation > tolerance {
                return Err(XrfError::MalformedSpectrum(format!(
                    "energy grid is not uniform at index {}",
                    i + 1
                )));
            }
        }
        let calibration = Calibration::linear(energies[0], step)?;
        Self::new(Array1::from(counts.to_vec()), calibration)
    }

    pub fn with_live_time(mut self, live_time: f64) -> Result<Self> {
        if !(live_time.is_finite() && live_time > 0.0) {
            return Err(XrfError::MalformedSpectrum(format!(
                "live time must be positive, got {}",
                live_time
            )));
        }
        self.live_time = live_time;
        Ok(self)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Always false: an empty spectrum cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn counts(&self) -> &Array1<f64> {
        &self.counts
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn live_time(&self) -> f64 {
        self.live_time
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn energies(&self) -> Array1<f64> {
        self.calibration.energies(self.len())
    }

    pub fn energy(&self, channel: usize) -> f64 {
        self.calibration.energy(channel as f64)
    }

    /// Energy of the first and last channel.
    pub fn energy_range(&self) -> (f64, f64) {
        (self.energy(0), self.energy(self.len() - 1))
    }

    /// Nearest channel to `energy`, if inside the spectrum.
    pub fn channel_at(&self, energy: f64) -> Option<usize> {
        let channel = self.calibration.channel(energy).round();
        (channel >= 0.0 && channel < self.len() as f64).then_some(channel as usize)
    }

    /// Counts per unit live time.
    pub fn normalized_counts(&self) -> Array1<f64> {
        &self.counts / self.live_time
    }

    pub fn total_counts(&self) -> f64 {
        self.counts.sum()
    }

    /// Channels whose energy lies in `[low, high]` (keV).
    pub fn channel_window(&self, low: f64, high: f64) -> Result<Range<usize>> {
        let start = (0..self.len()).find(|&i| self.energy(i) >= low);
        let end = (0..self.len()).rev().find(|&i| self.energy(i) <= high);
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Ok(start..end + 1),
            _ => Err(XrfError::MalformedSpectrum(format!(
                "no channels between {} and {} keV",
                low, high
            ))),
        }
    }

    /// Restrict to channels with energy in `[low, high]` (keV).
    ///
    /// The returned spectrum reports the same energy for every kept channel.
    pub fn trim(&self, low: f64, high: f64) -> Result<Spectrum> {
        let window = self.channel_window(low, high)?;
        Ok(Spectrum {
            counts: self.counts.slice(s![window.clone()]).to_owned(),
            calibration: self.calibration.shifted(window.start),
            live_time: self.live_time,
            label: self.label.clone(),
        })
    }

    /// Channel-wise sum of spectra sharing length and calibration.
    /// Live times add up.
    pub fn sum(spectra: &[Spectrum]) -> Result<Spectrum> {
        let first = spectra.first().ok_or_else(|| {
            XrfError::MalformedSpectrum("cannot sum an empty list of spectra".to_string())
        })?;
        let mut counts = first.counts.clone();
        let mut live_time = first.live_time;
        for other in &spectra[1..] {
            if other.len() != first.len() {
                return Err(XrfError::DimensionMismatch(format!(
                    "cannot sum spectra with {} and {} channels",
                    first.len(),
                    other.len()
                )));
            }
            if other.calibration != first.calibration {
                return Err(XrfError::MalformedSpectrum(
                    "cannot sum spectra with different calibrations".to_string(),
                ));
            }
            counts += &other.counts;
            live_time += other.live_time;
        }
        Ok(Spectrum {
            counts,
            calibration: first.calibration,
            live_time,
            label: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn cal() -> Calibration {
        Calibration::new(0.1, 0.01, 1e-7).unwrap()
    }

    #[test]
    fn test_calibration_round_trip() {
        let cal = cal();
        for ch in [0.0, 10.0, 512.5, 2047.0] {
            assert_relative_eq!(cal.channel(cal.energy(ch)), ch, epsilon = 1e-8);
        }
        let linear = Calibration::linear(0.0, 0.02).unwrap();
        assert_relative_eq!(linear.channel(1.0), 50.0);
        assert!(Calibration::linear(0.0, 0.0).is_err());
        assert!(Calibration::new(f64::NAN, 0.01, 0.0).is_err());
    }

    #[test]
    fn test_validation() {
        let cal = cal();
        assert!(matches!(
            Spectrum::new(Array1::zeros(0), cal),
            Err(XrfError::MalformedSpectrum(_))
        ));
        assert!(Spectrum::new(array![1.0, -2.0], cal).is_err());
        assert!(Spectrum::new(array![1.0, f64::INFINITY], cal).is_err());

        let decreasing = Calibration::new(0.0, 0.01, -1e-4).unwrap();
        assert!(Spectrum::new(Array1::ones(200), decreasing).is_err());

        let spectrum = Spectrum::new(array![0.0, 3.0], cal).unwrap();
        assert!(spectrum.clone().with_live_time(0.0).is_err());
        assert_eq!(spectrum.with_live_time(2.0).unwrap().live_time(), 2.0);
    }

    #[test]
    fn test_from_energy_counts() {
        let energies: Vec<f64> = (0..100).map(|i| 1.0 + 0.01 * i as f64).collect();
        let counts = vec![1.0; 100];
        let spectrum = Spectrum::from_energy_counts(&energies, &counts).unwrap();
        assert_relative_eq!(spectrum.calibration().linear, 0.01, epsilon = 1e-12);
        assert_relative_eq!(spectrum.energy(50), 1.5, epsilon = 1e-12);

        let mut uneven = energies.clone();
        uneven[40] += 0.004;
        assert!(Spectrum::from_energy_counts(&uneven, &counts).is_err());
        assert!(Spectrum::from_energy_counts(&energies, &counts[..10]).is_err());
        assert!(Spectrum::from_energy_counts(&[1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_trim_preserves_energies() {
        let counts = Array1::from_shape_fn(1000, |i| i as f64);
        let spectrum = Spectrum::new(counts, cal()).unwrap().with_label("px");
        let trimmed = spectrum.trim(2.0, 5.0).unwrap();
        assert!(trimmed.energy(0) >= 2.0);
        assert!(trimmed.energy(trimmed.len() - 1) <= 5.0);

        let start = spectrum.channel_at(trimmed.energy(0)).unwrap();
        for k in [0, 17, trimmed.len() - 1] {
            assert_relative_eq!(trimmed.energy(k), spectrum.energy(start + k), epsilon = 1e-12);
            assert_eq!(trimmed.counts()[k], spectrum.counts()[start + k]);
        }
        assert_eq!(trimmed.label(), Some("px"));
        assert!(spectrum.trim(50.0, 60.0).is_err());
    }

    #[test]
    fn test_sum_and_normalize() {
        let cal = cal();
        let a = Spectrum::new(array![1.0, 2.0, 3.0], cal).unwrap();
        let b = Spectrum::new(array![4.0, 5.0, 6.0], cal)
            .unwrap()
            .with_live_time(3.0)
            .unwrap();
        let total = Spectrum::sum(&[a.clone(), b]).unwrap();
        assert_eq!(total.counts(), &array![5.0, 7.0, 9.0]);
        assert_eq!(total.live_time(), 4.0);
        assert_eq!(total.normalized_counts(), array![1.25, 1.75, 2.25]);

        let short = Spectrum::new(array![1.0], cal).unwrap();
        assert!(matches!(
            Spectrum::sum(&[a, short]),
            Err(XrfError::DimensionMismatch(_))
        ));
        assert!(Spectrum::sum(&[]).is_err());
    }

    #[test]
    fn test_raw_spectrum_json() {
        let json = r#"{"counts":[1.0,2.0],"calibration":{"offset":0.0,"linear":0.01}}"#;
        let spectrum: Spectrum = serde_json::from_str(json).unwrap();
        assert_eq!(spectrum.live_time(), 1.0);

        let bad = r#"{"counts":[],"calibration":{"offset":0.0,"linear":0.01}}"#;
        assert!(serde_json::from_str::<Spectrum>(bad).is_err());

        let raw = RawSpectrum::new(vec![1.0, f64::NAN], Calibration { offset: 0.0, linear: 0.01, quadratic: 0.0 });
        assert!(matches!(raw.validate(), Err(XrfError::MalformedSpectrum(_))));
    }
}
