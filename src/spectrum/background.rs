//! SNIP background estimation.
//!
//! Statistics-sensitive non-linear iterative peak clipping: the counts are
//! smoothed, compressed with `ln(ln(y + 1) + 1)`, and each channel is
//! repeatedly replaced by the mean of its two neighbours at distance `w` when
//! that mean is lower. `w` starts at `width * FWHM(E)` in channels and shrinks
//! by sqrt(2) until it drops below half a channel.

use crate::model::lineshape::Resolution;
use crate::spectrum::Calibration;
use ndarray::{Array1, ArrayView1, Zip};

const SMOOTH_WIDTH: usize = 5;
const FULL_WIDTH_PASSES: usize = 2;
const DECREASE_FACTOR: f64 = std::f64::consts::SQRT_2;
const WIDTH_THRESHOLD: f64 = 0.5;

/// Boxcar average over `SMOOTH_WIDTH` channels; the window shrinks at the edges.
fn smooth(counts: ArrayView1<f64>) -> Array1<f64> {
    let n = counts.len();
    let half = SMOOTH_WIDTH / 2;
    Array1::from_shape_fn(n, |i| {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n - 1);
        let window = counts.slice(ndarray::s![lo..=hi]);
        window.sum() / window.len() as f64
    })
}

/// One clipping pass with per-channel half-window `window`.
fn clip(background: &mut Array1<f64>, window: &Array1<f64>) {
    let n = background.len();
    let last = (n - 1) as isize;
    let previous = background.clone();
    Zip::indexed(background)
        .and(window)
        .for_each(|i, value, &w| {
            let w = w as isize;
            let lo = (i as isize - w).clamp(0, last) as usize;
            let hi = (i as isize + w).clamp(0, last) as usize;
            let mean = 0.5 * (previous[lo] + previous[hi]);
            if *value > mean {
                *value = mean;
            }
        });
}

/// Estimate the continuum under the peaks of `counts`.
///
/// # Arguments
///
/// * `counts` - Channel counts (non-negative)
/// * `calibration` - Channel-to-energy calibration
/// * `resolution` - Detector resolution, sets the clipping window
/// * `width` - Clipping window in units of the local FWHM
///
/// # Returns
///
/// A non-negative background of the same length as `counts`.
pub fn snip_background(
    counts: ArrayView1<f64>,
    calibration: &Calibration,
    resolution: &Resolution,
    width: f64,
) -> Array1<f64> {
    let n = counts.len();
    if n == 0 {
        return Array1::zeros(0);
    }

    let mut background = smooth(counts).mapv(|y| (y.max(0.0) + 1.0).ln().ln_1p());

    let mut window = Array1::from_shape_fn(n, |i| {
        let channel = i as f64;
        let energy = calibration.energy(channel);
        width * resolution.fwhm(energy.max(0.0)) / calibration.slope(channel)
    });

    for _ in 0..FULL_WIDTH_PASSES {
        clip(&mut background, &window);
    }

    let mut max_width = window.fold(0.0_f64, |acc, &w| acc.max(w));
    while max_width >= WIDTH_THRESHOLD {
        clip(&mut background, &window);
        window.mapv_inplace(|w| w / DECREASE_FACTOR);
        max_width /= DECREASE_FACTOR;
    }

    background.mapv(|b| {
        let value = b.exp_m1().exp() - 1.0;
        if value.is_finite() {
            value.max(0.0)
        } else {
            0.0
        }
    })
}
