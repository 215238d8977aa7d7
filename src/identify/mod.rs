//! Automatic element identification.
//!
//! Significant peaks are matched against the reference line table. A line
//! group becomes a candidate when its strongest in-range line sits on a peak;
//! candidates are then chosen greedily until every explainable peak is
//! covered:
//!
//! 1. most still-uncovered peaks
//! 2. higher element support: an L or M group is only as credible as the
//!    element's K and L groups whose primary lines fall in range and also
//!    sit on peaks
//! 3. higher consistency (share of in-range line weight that matched)
//! 4. better proximity of the matched lines
//! 5. lower atomic number
//!
//! A peak that several equally good groups could explain is reported as an
//! [`AmbiguousMatch`]. A spectrum without significant peaks yields an empty
//! identification.

pub mod peaks;

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::{DetectorConfig, IdentifyConfig, ScatterConfig, XrfConfig};
use crate::error::Result;
use crate::lines::{LineGroup, LineTable};
use crate::model::{compton_energy, Resolution};
use crate::spectrum::Spectrum;

pub use peaks::{find_peaks, NoiseModel, Peak};

/// A selected line group and how well it matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateGroup {
    pub group: LineGroup,
    /// Share of the element's expected families (this one included) whose
    /// primary line matched a peak, in `(0, 1]`.
    pub support: f64,
    /// Matched share of the in-range line weight, in `[0, 1]`.
    pub consistency: f64,
    /// Mean of `1 - |dE| / tol` over matched lines, in `[0, 1]`.
    pub proximity: f64,
    /// Energies of the peaks the group's lines matched.
    pub peaks: Vec<f64>,
}

impl CandidateGroup {
    pub fn name(&self) -> &str {
        self.group.name()
    }
}

/// A peak explained equally well by more than one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousMatch {
    pub peak_energy: f64,
    pub chosen: String,
    pub alternatives: Vec<String>,
}

/// Outcome of [`ElementIdentifier::identify`].
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Identification {
    /// Selected groups, in selection order.
    pub groups: Vec<CandidateGroup>,
    /// Every significant peak found.
    pub peaks: Vec<Peak>,
    /// Peaks attributed to elastic or Compton scattering.
    pub scatter_peaks: Vec<Peak>,
    /// Fluorescence peaks no selected group explains.
    pub unassigned_peaks: Vec<Peak>,
    pub ambiguities: Vec<AmbiguousMatch>,
}

impl Identification {
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name()).collect()
    }

    /// The selected groups, ready to pass to the fit.
    pub fn line_groups(&self) -> Vec<LineGroup> {
        self.groups.iter().map(|g| g.group.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Internal candidate before selection.
struct Candidate<'t> {
    group: &'t LineGroup,
    support: f64,
    consistency: f64,
    proximity: f64,
    covered: BTreeSet<usize>,
}

/// Proposes line groups for a spectrum.
#[derive(Debug, Clone)]
pub struct ElementIdentifier<'t> {
    table: &'t LineTable,
    config: IdentifyConfig,
    detector: DetectorConfig,
    scatter: ScatterConfig,
    energy_range: Option<(f64, f64)>,
}

impl ElementIdentifier<'static> {
    /// Identifier over the built-in line table.
    pub fn new(config: &XrfConfig) -> Self {
        Self::with_table(LineTable::global(), config)
    }
}

impl<'t> ElementIdentifier<'t> {
    pub fn with_table(table: &'t LineTable, config: &XrfConfig) -> Self {
        Self {
            table,
            config: config.identify.clone(),
            detector: config.detector.clone(),
            scatter: config.scatter.clone(),
            energy_range: config.energy_range.map(|r| (r.low, r.high)),
        }
    }

    fn resolution(&self) -> Resolution {
        Resolution::new(
            self.detector.fwhm_offset,
            self.detector.fwhm_fanoprime,
            self.detector.epsilon,
        )
    }

    /// Matching tolerance at `energy` (keV).
    pub fn tolerance(&self, energy: f64) -> f64 {
        (self.config.tolerance_fwhm * self.resolution().fwhm(energy)).max(self.config.min_tolerance_kev)
    }

    fn is_scatter(&self, peak: &Peak) -> bool {
        let Some(incident) = self.scatter.incident_energy else {
            return false;
        };
        let compton = compton_energy(incident, self.scatter.compton_angle);
        [incident, compton]
            .iter()
            .any(|&e| (peak.energy - e).abs() <= self.tolerance(e))
    }

    /// Closest peak within tolerance of `energy`, with its distance.
    fn closest_peak(&self, peaks: &[Peak], candidates: &[usize], energy: f64) -> Option<(usize, f64)> {
        let tol = self.tolerance(energy);
        candidates
            .iter()
            .map(|&i| (i, (peaks[i].energy - energy).abs()))
            .filter(|&(_, distance)| distance <= tol)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Share of the element's K/L groups above `group` whose primary line
    /// is expected and matched, counting `group` itself as matched. A
    /// primary line is expected when it lies in range and, with a known
    /// incident energy, below it.
    fn element_support(
        &self,
        group: &LineGroup,
        peaks: &[Peak],
        fluorescence: &[usize],
        low: f64,
        high: f64,
    ) -> f64 {
        let limit = self.scatter.incident_energy.map_or(high, |e| high.min(e));
        let (expected, seen) = self
            .table
            .element_groups(group.element())
            .into_iter()
            .filter(|other| other.family() < group.family())
            .filter_map(|other| other.primary_line(low, limit))
            .fold((1usize, 1usize), |(expected, seen), line| {
                let hit = self.closest_peak(peaks, fluorescence, line.energy).is_some();
                (expected + 1, seen + usize::from(hit))
            });
        seen as f64 / expected as f64
    }

    fn candidate<'a>(
        &self,
        group: &'a LineGroup,
        peaks: &[Peak],
        fluorescence: &[usize],
        low: f64,
        high: f64,
    ) -> Option<Candidate<'a>> {
        let primary = group.primary_line(low, high)?;
        self.closest_peak(peaks, fluorescence, primary.energy)?;

        let mut total_weight = 0.0;
        let mut matched_weight = 0.0;
        let mut proximity = 0.0;
        let mut matched = 0usize;
        let mut covered = BTreeSet::new();
        for line in group.lines_in_range(low, high) {
            total_weight += line.weight;
            if let Some((peak, distance)) = self.closest_peak(peaks, fluorescence, line.energy) {
                matched_weight += line.weight;
                proximity += 1.0 - distance / self.tolerance(line.energy);
                matched += 1;
                covered.insert(peak);
            }
        }

        let consistency = matched_weight / total_weight;
        if consistency < self.config.min_consistency {
            debug!(group = group.name(), consistency, "candidate rejected");
            return None;
        }
        Some(Candidate {
            group,
            support: self.element_support(group, peaks, fluorescence, low, high),
            consistency,
            proximity: proximity / matched as f64,
            covered,
        })
    }

    /// Identify the line groups present in `spectrum`.
    pub fn identify(&self, spectrum: &Spectrum) -> Result<Identification> {
        let window = match self.energy_range {
            Some((low, high)) => spectrum.channel_window(low, high)?,
            None => 0..spectrum.len(),
        };
        let low = spectrum.energy(window.start);
        let high = spectrum.energy(window.end - 1);

        let peaks = find_peaks(spectrum, window, &self.resolution(), &self.config);
        let (scatter, fluorescence): (Vec<usize>, Vec<usize>) =
            (0..peaks.len()).partition(|&i| self.is_scatter(&peaks[i]));

        let mut candidates: Vec<Candidate> = self
            .table
            .groups_in_range(low, high)
            .into_iter()
            .filter_map(|g| self.candidate(g, &peaks, &fluorescence, low, high))
            .collect();

        let mut uncovered: BTreeSet<usize> = fluorescence.iter().copied().collect();
        let mut selected = Vec::new();
        let mut ambiguities = Vec::new();

        loop {
            let coverage = |c: &Candidate| c.covered.intersection(&uncovered).count();
            let best = candidates
                .iter()
                .enumerate()
                .filter(|(_, c)| coverage(c) > 0)
                .max_by(|(_, a), (_, b)| {
                    coverage(a)
                        .cmp(&coverage(b))
                        .then(a.support.total_cmp(&b.support))
                        .then(a.consistency.total_cmp(&b.consistency))
                        .then(a.proximity.total_cmp(&b.proximity))
                        .then(b.group.z().cmp(&a.group.z()))
                })
                .map(|(i, _)| i);
            let Some(best) = best else {
                break;
            };

            let chosen = candidates.swap_remove(best);
            let newly: Vec<usize> = chosen.covered.intersection(&uncovered).copied().collect();
            let best_coverage = newly.len();
            for &peak in &newly {
                let alternatives: Vec<String> = candidates
                    .iter()
                    .filter(|c| coverage(c) == best_coverage && c.covered.contains(&peak))
                    .map(|c| c.group.name().to_string())
                    .collect();
                if !alternatives.is_empty() {
                    warn!(
                        peak_energy = peaks[peak].energy,
                        chosen = chosen.group.name(),
                        ?alternatives,
                        "ambiguous element match"
                    );
                    ambiguities.push(AmbiguousMatch {
                        peak_energy: peaks[peak].energy,
                        chosen: chosen.group.name().to_string(),
                        alternatives,
                    });
                }
            }
            for peak in &newly {
                uncovered.remove(peak);
            }

            selected.push(CandidateGroup {
                group: chosen.group.clone(),
                support: chosen.support,
                consistency: chosen.consistency,
                proximity: chosen.proximity,
                peaks: chosen.covered.iter().map(|&i| peaks[i].energy).collect(),
            });
        }

        let identification = Identification {
            groups: selected,
            scatter_peaks: scatter.iter().map(|&i| peaks[i]).collect(),
            unassigned_peaks: uncovered.iter().map(|&i| peaks[i]).collect(),
            peaks,
            ambiguities,
        };
        info!(
            peaks = identification.peaks.len(),
            groups = ?identification.group_names(),
            unassigned = identification.unassigned_peaks.len(),
            "element identification finished"
        );
        Ok(identification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::{ElementLine, LineFamily, LineKind};
    use crate::spectrum::Calibration;
    use ndarray::Array1;

    fn spectrum_with_peaks(peaks: &[(f64, f64)]) -> Spectrum {
        let cal = Calibration::linear(0.0, 0.01).unwrap();
        let res = Resolution::new(0.1, 0.114, 2.96e-3);
        let counts = Array1::from_shape_fn(1200, |i| {
            let e = i as f64 * 0.01;
            20.0 + peaks
                .iter()
                .map(|&(center, height)| {
                    let x = (e - center) / res.sigma(center);
                    height * (-0.5 * x * x).exp()
                })
                .sum::<f64>()
        });
        Spectrum::new(counts, cal).unwrap()
    }

    fn single_line_group(element: &'static str, z: u32, energy: f64) -> LineGroup {
        LineGroup::new(
            element,
            z,
            LineFamily::K,
            vec![ElementLine {
                element,
                z,
                kind: LineKind::Ka1,
                energy,
                weight: 1.0,
            }],
        )
        .unwrap()
    }

    fn group(element: &'static str, z: u32, family: LineFamily, lines: &[(LineKind, f64, f64)]) -> LineGroup {
        let lines = lines
            .iter()
            .map(|&(kind, energy, weight)| ElementLine {
                element,
                z,
                kind,
                energy,
                weight,
            })
            .collect();
        LineGroup::new(element, z, family, lines).unwrap()
    }

    /// `Aa_K` has an unmatched Kb; `Bb_M` matches perfectly but `Bb_L` sits
    /// in range at 9 keV.
    fn shell_table() -> LineTable {
        LineTable::from_groups(vec![
            group("Aa", 16, LineFamily::K, &[(LineKind::Ka1, 5.0, 1.0), (LineKind::Kb1, 5.6, 0.2)]),
            group("Bb", 82, LineFamily::L, &[(LineKind::La1, 9.0, 1.0)]),
            group("Bb", 82, LineFamily::M, &[(LineKind::Ma1, 5.0, 1.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_m_group_needs_its_l_lines() {
        let table = shell_table();
        let spectrum = spectrum_with_peaks(&[(5.0, 300.0)]);
        let identification = ElementIdentifier::with_table(&table, &XrfConfig::new())
            .identify(&spectrum)
            .unwrap();

        assert_eq!(identification.group_names(), vec!["Aa_K"]);
        assert_eq!(identification.groups[0].support, 1.0);
        assert_eq!(identification.ambiguities.len(), 1);
        assert_eq!(identification.ambiguities[0].alternatives, vec!["Bb_M".to_string()]);
    }

    #[test]
    fn test_m_group_chosen_when_l_lines_present() {
        let table = shell_table();
        let spectrum = spectrum_with_peaks(&[(5.0, 300.0), (9.0, 300.0)]);
        let identification = ElementIdentifier::with_table(&table, &XrfConfig::new())
            .identify(&spectrum)
            .unwrap();

        let mut names = identification.group_names();
        names.sort_unstable();
        assert_eq!(names, vec!["Bb_L", "Bb_M"]);
        assert!(identification.unassigned_peaks.is_empty());
    }

    #[test]
    fn test_incident_energy_limits_expected_lines() {
        // Below 9 keV excitation the missing Bb_L peak is no evidence.
        let table = shell_table();
        let spectrum = spectrum_with_peaks(&[(5.0, 300.0)]);
        let config = XrfConfig::new().with_incident_energy(8.0);
        let identification = ElementIdentifier::with_table(&table, &config)
            .identify(&spectrum)
            .unwrap();
        assert_eq!(identification.group_names(), vec!["Bb_M"]);
    }

    #[test]
    fn test_flat_spectrum_gives_empty_set() {
        let spectrum = spectrum_with_peaks(&[]);
        let identification = ElementIdentifier::new(&XrfConfig::new())
            .identify(&spectrum)
            .unwrap();
        assert!(identification.is_empty());
        assert!(identification.peaks.is_empty());
    }

    #[test]
    fn test_tie_goes_to_lower_z_and_is_reported() {
        let table = LineTable::from_groups(vec![
            single_line_group("Bb", 40, 5.0),
            single_line_group("Aa", 30, 5.0),
        ])
        .unwrap();
        let spectrum = spectrum_with_peaks(&[(5.0, 200.0)]);
        let identification = ElementIdentifier::with_table(&table, &XrfConfig::new())
            .identify(&spectrum)
            .unwrap();

        assert_eq!(identification.group_names(), vec!["Aa_K"]);
        assert_eq!(identification.ambiguities.len(), 1);
        assert_eq!(identification.ambiguities[0].chosen, "Aa_K");
        assert_eq!(identification.ambiguities[0].alternatives, vec!["Bb_K".to_string()]);
    }

    #[test]
    fn test_scatter_peak_not_assigned() {
        let table = LineTable::from_groups(vec![single_line_group("Aa", 30, 10.0)]).unwrap();
        let spectrum = spectrum_with_peaks(&[(10.0, 300.0)]);
        let config = XrfConfig::new().with_incident_energy(10.0);
        let identification = ElementIdentifier::with_table(&table, &config)
            .identify(&spectrum)
            .unwrap();
        assert!(identification.is_empty());
        assert_eq!(identification.scatter_peaks.len(), 1);
        assert!(identification.unassigned_peaks.is_empty());
    }

    #[test]
    fn test_unexplained_peak_is_unassigned() {
        let table = LineTable::from_groups(vec![single_line_group("Aa", 30, 5.0)]).unwrap();
        let spectrum = spectrum_with_peaks(&[(5.0, 200.0), (9.0, 200.0)]);
        let identification = ElementIdentifier::with_table(&table, &XrfConfig::new())
            .identify(&spectrum)
            .unwrap();
        assert_eq!(identification.group_names(), vec!["Aa_K"]);
        assert_eq!(identification.unassigned_peaks.len(), 1);
        assert!((identification.unassigned_peaks[0].energy - 9.0).abs() < 0.01);
    }
}
