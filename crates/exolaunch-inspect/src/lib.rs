//! Diagnostics for Chroma two-point correlator output.
//!
//! Correlators are stored per operator as `(ncfg, Lt)` arrays after the
//! source positions have been shifted to `t = 0` and averaged.

pub mod correlator;
pub mod h5;
pub mod plot;

pub use correlator::{
    InspectError, SourceSet, average_sources, config_average, fold, roll_left, stack_configs,
    tsrc_index,
};
pub use h5::{DEFAULT_CHANNEL, DEFAULT_TSRC_SPACING, LoadOptions, load_operators};
pub use plot::plot_correlator;
