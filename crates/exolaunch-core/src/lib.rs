//! Ensemble configuration for exolaunch.
//!
//! Loads per-ensemble YAML files and merges them with the decoded ensemble
//! parameters into the parameter set the templates are rendered with.

pub mod config;
pub mod lists;
pub mod params;

pub use config::{ConfigError, EnsembleConfig, REQUIRED_KEYS, discover, expand_tilde};
pub use params::{ensemble_params, merge_params};
