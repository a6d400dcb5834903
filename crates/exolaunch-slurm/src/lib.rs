//! Slurm batch script support for exolaunch.
//!
//! Renders the `#SBATCH` header that precedes every generated job script.

pub mod directives;

pub use directives::{SlurmDirectives, SlurmError};
