//! Shared parsing utilities for exolaunch.
//!
//! Ensemble tag decoding, configuration id ranges and Slurm walltimes.

pub mod ensemble;
pub mod time;

pub use ensemble::{
    EnsembleError, EnsembleParams, EnsembleRegistry, GaugeLocation, parse_ensemble, parse_long_form,
};
pub use time::{format_walltime, parse_walltime, walltime_from_minutes};

/// Zero-padded configuration id as it appears in directory and file names.
pub fn pad_cfg_id(cfg: u32) -> String {
    format!("{:02}", cfg)
}

/// Half-open range of configuration ids, `start..end` in steps of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgRange {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl CfgRange {
    pub fn new(start: u32, end: u32, step: u32) -> Result<Self, String> {
        if step == 0 {
            return Err("cfg step must be positive".to_string());
        }
        if start > end {
            return Err(format!("cfg range start {} is past its end {}", start, end));
        }
        Ok(Self { start, end, step })
    }

    /// Iterate the configuration ids.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        (self.start..self.end).step_by(self.step as usize)
    }

    pub fn len(&self) -> usize {
        self.ids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl std::str::FromStr for CfgRange {
    type Err = String;

    /// Parse `start:end[:step]` (step defaults to 1).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(':').collect();
        let num = |f: &str| {
            f.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid cfg range {}: {}", s, e))
        };
        match fields.as_slice() {
            [start, end] => Self::new(num(start)?, num(end)?, 1),
            [start, end, step] => Self::new(num(start)?, num(end)?, num(step)?),
            _ => Err(format!(
                "Expected start:end[:step], got {} fields: {}",
                fields.len(),
                s
            )),
        }
    }
}
