//! Batch fitting of many spectra with one element set.
//!
//! Items are fitted in parallel on the rayon pool. Each item is validated
//! and fitted on its own; a malformed spectrum or a failed fit is recorded in
//! that item's outcome and the rest of the batch carries on.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{FitResult, FitSolver, FitStrategy};
use crate::error::{Result, XrfError};
use crate::lines::LineGroup;
use crate::model::SpectrumModel;
use crate::parameters::FitParameters;
use crate::spectrum::RawSpectrum;

/// One spectrum of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub spectrum: RawSpectrum,
    /// Incident energy of this item (keV), e.g. one step of a XANES scan.
    /// Overrides the configured value.
    #[serde(default)]
    pub incident_energy: Option<f64>,
}

impl BatchItem {
    pub fn new(spectrum: impl Into<RawSpectrum>) -> Self {
        Self {
            spectrum: spectrum.into(),
            incident_energy: None,
        }
    }

    pub fn with_incident_energy(mut self, energy: f64) -> Self {
        self.incident_energy = Some(energy);
        self
    }
}

/// Outcome of one batch item, in input order.
#[derive(Debug)]
pub struct BatchOutcome<T = FitResult> {
    pub index: usize,
    pub label: Option<String>,
    pub result: Result<T>,
}

impl<T> BatchOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&XrfError> {
        self.result.as_ref().err()
    }
}

impl FitSolver {
    /// Fit every item with the same line groups.
    ///
    /// Starting parameters of each item are its default parameters with the
    /// same-named entries of `template` laid over them, so the template can
    /// fix or seed any subset.
    pub fn fit_batch(
        &self,
        items: &[BatchItem],
        groups: &[LineGroup],
        template: &FitParameters,
    ) -> Vec<BatchOutcome> {
        self.fit_batch_with_strategies(items, groups, template, &[])
    }

    /// [`FitSolver::fit_batch`] with a sequence of strategy passes per item.
    /// An empty `strategies` slice runs a single plain fit.
    pub fn fit_batch_with_strategies(
        &self,
        items: &[BatchItem],
        groups: &[LineGroup],
        template: &FitParameters,
        strategies: &[FitStrategy],
    ) -> Vec<BatchOutcome> {
        info!(items = items.len(), groups = groups.len(), "batch fit started");
        let outcomes: Vec<BatchOutcome> = items
            .par_iter()
            .enumerate()
            .map(|(index, item)| {
                let result = self.fit_item(item, groups, template, strategies);
                if let Err(err) = &result {
                    warn!(index, error = %err, "batch item failed");
                }
                BatchOutcome {
                    index,
                    label: item.spectrum.label.clone(),
                    result,
                }
            })
            .collect();
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(items = outcomes.len(), failed, "batch fit finished");
        outcomes
    }

    fn fit_item(
        &self,
        item: &BatchItem,
        groups: &[LineGroup],
        template: &FitParameters,
        strategies: &[FitStrategy],
    ) -> Result<FitResult> {
        let spectrum = item.spectrum.clone().validate()?;
        let mut config = self.config.clone();
        if let Some(energy) = item.incident_energy {
            config = config.with_incident_energy(energy);
            config.validate()?;
        }
        let model = SpectrumModel::new(&spectrum, groups.to_vec(), &config)?;
        let mut params = model.default_parameters()?;
        params.overlay(template);

        let mut result = if strategies.is_empty() {
            self.fit_model(&model, &params)?
        } else {
            self.fit_model_with_strategies(&model, &params, strategies)?
        };
        result.label = spectrum.label().map(str::to_string);
        Ok(result)
    }
}
