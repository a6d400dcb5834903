//! Job generation for exolaunch.
//!
//! Turns an ensemble configuration and a list of Chroma tasks into input
//! files and Slurm scripts on disk.

pub mod binned;
pub mod clean;
pub mod context;
pub mod contractions;
pub mod generate;
pub mod task;

pub use binned::{BinnedOptions, CfgGroup, cfg_groups, generate_binned};
pub use clean::{CleanKind, clean};
pub use contractions::{ContractionsConfig, generate_contractions};
pub use generate::{DATA_DIRS, GenerateOptions, GenerateSummary, create_data_dirs, generate};
pub use task::{Flavor, Inverter, RunKind, RunObject, Task, TaskError, expand_tasks, parse_tasks};
