//! Parameter sets and configuration files.

pub mod config_tests;
pub mod parameters_tests;
