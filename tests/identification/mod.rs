//! Element identification on synthetic spectra.

pub mod single_peak;
