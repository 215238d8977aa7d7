//! Forward model of an XRF spectrum.
//!
//! A [`SpectrumModel`] binds a measured spectrum (optionally restricted to an
//! energy window), the active line groups and the detector description. Given
//! a [`FitParameters`] set it renders the modeled counts per channel:
//!
//! - one Gaussian per emission line, `X_F_area * weight` integrated counts,
//!   shifted by `X_F_delta_center`
//! - Si escape peaks of those lines when `escape_ratio > 0`
//! - one Gaussian per configured pile-up peak, `<pileup>_area` counts
//! - elastic and Compton scatter peaks when an incident energy is set
//! - the background (fixed SNIP estimate or free linear terms)
//!
//! The channel energies come from the `e_offset`, `e_linear` and
//! `e_quadratic` parameters on every evaluation, so calibration can be
//! refined by the fit. Evaluation has no side effects.

pub mod lineshape;
mod template;

use ndarray::{s, Array1};
use serde::Serialize;
use std::ops::Range;

use crate::config::{BackgroundMethod, DetectorConfig, FitConfig, ScatterConfig, XrfConfig};
use crate::error::{Result, XrfError};
use crate::lines::{LineGroup, LineTable, PileupPeak};
use crate::parameters::FitParameters;
use crate::spectrum::{snip_background, Calibration, Spectrum};

pub use lineshape::{compton_energy, gaussian, EnergyAxis, Resolution};

pub const E_OFFSET: &str = "e_offset";
pub const E_LINEAR: &str = "e_linear";
pub const E_QUADRATIC: &str = "e_quadratic";
pub const FWHM_OFFSET: &str = "fwhm_offset";
pub const FWHM_FANOPRIME: &str = "fwhm_fanoprime";
pub const BKG_CONST: &str = "bkg_const";
pub const BKG_LINEAR: &str = "bkg_linear";
pub const ELASTIC_AREA: &str = "elastic_area";
pub const COMPTON_AREA: &str = "compton_area";

/// Name of the area parameter of a line group, e.g. `Fe_K_area`.
pub fn area_name(group: &str) -> String {
    format!("{}_area", group)
}

/// Name of the energy-shift parameter of a line group.
pub fn delta_center_name(group: &str) -> String {
    format!("{}_delta_center", group)
}

/// One additive part of the modeled spectrum, for plotting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComponent {
    /// Line group or pile-up name, `elastic`, `compton` or `background`.
    pub name: String,
    pub counts: Array1<f64>,
}

/// Forward model bound to one spectrum.
#[derive(Debug, Clone)]
pub struct SpectrumModel {
    groups: Vec<LineGroup>,
    pileups: Vec<PileupPeak>,
    window: Range<usize>,
    channels: Vec<f64>,
    observed: Array1<f64>,
    calibration: Calibration,
    detector: DetectorConfig,
    scatter: ScatterConfig,
    fit: FitConfig,
    /// SNIP estimate of the observed continuum, used for starting values.
    background_estimate: Array1<f64>,
    fixed_background: Option<Array1<f64>>,
}

impl SpectrumModel {
    /// Build the model of `spectrum` with the given line groups.
    ///
    /// The configured energy range selects the channels; an empty window is
    /// `MalformedSpectrum`. The SNIP background is computed here, once, over
    /// the whole spectrum.
    pub fn new(spectrum: &Spectrum, groups: Vec<LineGroup>, config: &XrfConfig) -> Result<Self> {
        let window = match config.energy_range {
            Some(range) => spectrum.channel_window(range.low, range.high)?,
            None => 0..spectrum.len(),
        };
        let detector = config.detector.clone();
        let resolution = Resolution::new(
            detector.fwhm_offset,
            detector.fwhm_fanoprime,
            detector.epsilon,
        );
        let snip_width = match config.fit.background {
            BackgroundMethod::Snip { width } => width,
            BackgroundMethod::Linear | BackgroundMethod::None => config.identify.background_width,
        };
        let background_estimate = snip_background(
            spectrum.counts().view(),
            spectrum.calibration(),
            &resolution,
            snip_width,
        )
        .slice(s![window.clone()])
        .to_owned();
        let fixed_background = matches!(config.fit.background, BackgroundMethod::Snip { .. })
            .then(|| background_estimate.clone());
        let pileups = config
            .fit
            .pileups
            .iter()
            .map(|name| LineTable::global().pileup(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            groups,
            pileups,
            channels: window.clone().map(|ch| ch as f64).collect(),
            observed: spectrum.counts().slice(s![window.clone()]).to_owned(),
            window,
            calibration: *spectrum.calibration(),
            detector,
            scatter: config.scatter.clone(),
            fit: config.fit.clone(),
            background_estimate,
            fixed_background,
        })
    }

    pub fn groups(&self) -> &[LineGroup] {
        &self.groups
    }

    pub fn pileups(&self) -> &[PileupPeak] {
        &self.pileups
    }

    /// Number of modeled channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels of the source spectrum covered by the model.
    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    /// Observed counts inside the window.
    pub fn observed(&self) -> &Array1<f64> {
        &self.observed
    }

    /// Channel energies under the measured calibration.
    pub fn nominal_energies(&self) -> Array1<f64> {
        self.channels
            .iter()
            .map(|&ch| self.calibration.energy(ch))
            .collect()
    }

    /// Nominal energy range covered by the model.
    pub fn energy_range(&self) -> (f64, f64) {
        let first = self.channels.first().copied().unwrap_or(0.0);
        let last = self.channels.last().copied().unwrap_or(0.0);
        (self.calibration.energy(first), self.calibration.energy(last))
    }

    pub fn fit_config(&self) -> &FitConfig {
        &self.fit
    }

    pub fn fixed_background(&self) -> Option<&Array1<f64>> {
        self.fixed_background.as_ref()
    }

    fn axis(&self, params: &FitParameters) -> Result<EnergyAxis> {
        let offset = params.value(E_OFFSET)?;
        let linear = params.value(E_LINEAR)?;
        let quadratic = params.value(E_QUADRATIC)?;
        let energies: Vec<f64> = self
            .channels
            .iter()
            .map(|&ch| offset + ch * (linear + ch * quadratic))
            .collect();
        let slopes: Vec<f64> = self
            .channels
            .iter()
            .map(|&ch| linear + 2.0 * quadratic * ch)
            .collect();
        if slopes.iter().any(|&s| !(s > 0.0)) {
            return Err(XrfError::FunctionEvaluation(format!(
                "calibration ({}, {}, {}) is not increasing over the fitted channels",
                offset, linear, quadratic
            )));
        }
        Ok(EnergyAxis { energies, slopes })
    }

    fn resolution(&self, params: &FitParameters) -> Result<Resolution> {
        let resolution = Resolution::new(
            params.value(FWHM_OFFSET)?,
            params.value(FWHM_FANOPRIME)?,
            self.detector.epsilon,
        );
        if !(resolution.fwhm_offset > 0.0 || resolution.fanoprime > 0.0) {
            return Err(XrfError::FunctionEvaluation(
                "both peak width terms are zero".to_string(),
            ));
        }
        Ok(resolution)
    }

    /// Add one line group's peaks (and their escape peaks) to `out`.
    fn render_group(
        &self,
        group: &LineGroup,
        params: &FitParameters,
        axis: &EnergyAxis,
        resolution: &Resolution,
        out: &mut [f64],
    ) -> Result<()> {
        let area = params.value(&area_name(group.name()))?;
        let shift = params.value(&delta_center_name(group.name()))?;
        let escape_ratio = self.detector.escape_ratio;
        for line in group.lines() {
            let center = line.energy + shift;
            let line_area = area * line.weight;
            axis.add_peak(out, center, resolution.sigma(center), line_area);
            if escape_ratio > 0.0 && line.energy > lineshape::SI_K_EDGE {
                let escape = center - lineshape::SI_ESCAPE_ENERGY;
                axis.add_peak(out, escape, resolution.sigma(escape), line_area * escape_ratio);
            }
        }
        Ok(())
    }

    fn render_pileup(
        &self,
        pileup: &PileupPeak,
        params: &FitParameters,
        axis: &EnergyAxis,
        resolution: &Resolution,
        out: &mut [f64],
    ) -> Result<()> {
        let area = params.value(&area_name(pileup.name()))?;
        let center = pileup.energy();
        axis.add_peak(out, center, resolution.sigma(center), area);
        Ok(())
    }

    /// Elastic and Compton peaks, in that order, if an incident energy is set.
    fn render_scatter(
        &self,
        params: &FitParameters,
        axis: &EnergyAxis,
        resolution: &Resolution,
    ) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
        let Some(incident) = self.scatter.incident_energy else {
            return Ok(None);
        };
        let mut elastic = vec![0.0; axis.len()];
        axis.add_peak(
            &mut elastic,
            incident,
            resolution.sigma(incident),
            params.value(ELASTIC_AREA)?,
        );

        let mut compton = vec![0.0; axis.len()];
        let center = compton_energy(incident, self.scatter.compton_angle);
        axis.add_peak(
            &mut compton,
            center,
            resolution.sigma(center) * self.scatter.compton_fwhm_corr,
            params.value(COMPTON_AREA)?,
        );
        Ok(Some((elastic, compton)))
    }

    fn render_background(&self, params: &FitParameters, axis: &EnergyAxis) -> Result<Array1<f64>> {
        match self.fit.background {
            BackgroundMethod::Snip { .. } => Ok(self
                .fixed_background
                .clone()
                .unwrap_or_else(|| Array1::zeros(self.len()))),
            BackgroundMethod::Linear => {
                let constant = params.value(BKG_CONST)?;
                let slope = params.value(BKG_LINEAR)?;
                Ok(axis.energies.iter().map(|&e| constant + slope * e).collect())
            }
            BackgroundMethod::None => Ok(Array1::zeros(self.len())),
        }
    }

    /// Background part of the model at `params`.
    pub fn background(&self, params: &FitParameters) -> Result<Array1<f64>> {
        let axis = self.axis(params)?;
        self.render_background(params, &axis)
    }

    /// Modeled counts per channel.
    pub fn evaluate(&self, params: &FitParameters) -> Result<Array1<f64>> {
        let axis = self.axis(params)?;
        let resolution = self.resolution(params)?;

        let mut total = vec![0.0; self.len()];
        for group in &self.groups {
            self.render_group(group, params, &axis, &resolution, &mut total)?;
        }
        for pileup in &self.pileups {
            self.render_pileup(pileup, params, &axis, &resolution, &mut total)?;
        }
        if let Some((elastic, compton)) = self.render_scatter(params, &axis, &resolution)? {
            for ((t, e), c) in total.iter_mut().zip(&elastic).zip(&compton) {
                *t += e + c;
            }
        }
        let model = Array1::from(total) + self.render_background(params, &axis)?;
        if model.iter().any(|v| !v.is_finite()) {
            return Err(XrfError::FunctionEvaluation(
                "model produced non-finite counts".to_string(),
            ));
        }
        Ok(model)
    }

    /// Per-group, pile-up, scatter and background parts, in that order; they
    /// sum to [`Self::evaluate`].
    pub fn evaluate_components(&self, params: &FitParameters) -> Result<Vec<ModelComponent>> {
        let axis = self.axis(params)?;
        let resolution = self.resolution(params)?;

        let mut components = Vec::with_capacity(self.groups.len() + self.pileups.len() + 3);
        for group in &self.groups {
            let mut counts = vec![0.0; self.len()];
            self.render_group(group, params, &axis, &resolution, &mut counts)?;
            components.push(ModelComponent {
                name: group.name().to_string(),
                counts: Array1::from(counts),
            });
        }
        for pileup in &self.pileups {
            let mut counts = vec![0.0; self.len()];
            self.render_pileup(pileup, params, &axis, &resolution, &mut counts)?;
            components.push(ModelComponent {
                name: pileup.name().to_string(),
                counts: Array1::from(counts),
            });
        }
        if let Some((elastic, compton)) = self.render_scatter(params, &axis, &resolution)? {
            components.push(ModelComponent {
                name: "elastic".to_string(),
                counts: Array1::from(elastic),
            });
            components.push(ModelComponent {
                name: "compton".to_string(),
                counts: Array1::from(compton),
            });
        }
        components.push(ModelComponent {
            name: "background".to_string(),
            counts: self.render_background(params, &axis)?,
        });
        Ok(components)
    }
}
