//! Forward calculation, optimization, batch and linear fitting.

pub mod batch;
pub mod forward;
pub mod linear;
pub mod optimization;
