//! Line shapes and detector response.
//!
//! Every peak is a Gaussian of unit area scaled by its integrated counts.
//! The width grows with energy as
//!
//! ```text
//! sigma^2(E) = (fwhm_offset / 2.3548)^2 + E * epsilon * fwhm_fanoprime
//! ```
//!
//! FWHM = 2 * sqrt(2 * ln(2)) * sigma ≈ 2.3548 * sigma

use std::f64::consts::PI;

/// FWHM / sigma of a Gaussian.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// Energy lost to a Si Kα photon leaving the detector (keV).
pub const SI_ESCAPE_ENERGY: f64 = 1.73998;

/// Si K edge (keV). Only lines above it produce escape peaks.
pub const SI_K_EDGE: f64 = 1.839;

/// Electron rest energy (keV).
pub const ELECTRON_REST_ENERGY: f64 = 511.0;

/// Peaks are evaluated out to this many standard deviations.
const CUTOFF_SIGMA: f64 = 6.0;

/// Energy-dependent detector resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub fwhm_offset: f64,
    pub fanoprime: f64,
    pub epsilon: f64,
}

impl Resolution {
    pub fn new(fwhm_offset: f64, fanoprime: f64, epsilon: f64) -> Self {
        Self {
            fwhm_offset,
            fanoprime,
            epsilon,
        }
    }

    /// Standard deviation of a peak at `energy` (keV).
    pub fn sigma(&self, energy: f64) -> f64 {
        let noise = self.fwhm_offset / FWHM_PER_SIGMA;
        (noise * noise + energy.max(0.0) * self.epsilon * self.fanoprime).sqrt()
    }

    pub fn fwhm(&self, energy: f64) -> f64 {
        FWHM_PER_SIGMA * self.sigma(energy)
    }
}

/// Unit-area Gaussian density.
pub fn gaussian(x: f64, center: f64, sigma: f64) -> f64 {
    let arg = (x - center) / sigma;
    (-0.5 * arg * arg).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Energy of the Compton-scattered incident beam at `angle_deg`.
pub fn compton_energy(incident: f64, angle_deg: f64) -> f64 {
    let cos = angle_deg.to_radians().cos();
    incident / (1.0 + incident / ELECTRON_REST_ENERGY * (1.0 - cos))
}

/// Channel energy grid of one evaluation.
#[derive(Debug, Clone)]
pub struct EnergyAxis {
    /// Energy at each channel, strictly increasing.
    pub energies: Vec<f64>,
    /// dE/dch at each channel.
    pub slopes: Vec<f64>,
}

impl EnergyAxis {
    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    /// Add a peak of `area` integrated counts to `out`.
    ///
    /// Counts per channel are `area * slope * pdf(E)`, so the peak sums to
    /// `area` when it lies well inside the axis.
    pub fn add_peak(&self, out: &mut [f64], center: f64, sigma: f64, area: f64) {
        if area == 0.0 || !(sigma > 0.0) {
            return;
        }
        let lo = self
            .energies
            .partition_point(|&e| e < center - CUTOFF_SIGMA * sigma);
        let hi = self
            .energies
            .partition_point(|&e| e <= center + CUTOFF_SIGMA * sigma);
        for i in lo..hi {
            out[i] += area * self.slopes[i] * gaussian(self.energies[i], center, sigma);
        }
    }
}
