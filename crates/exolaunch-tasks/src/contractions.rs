//! Slurm array jobs for the CPU contraction step.

use crate::generate::{GenerateSummary, write_file};
use crate::task::TaskError;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, NaiveDate};
use exolaunch_render::{Params, Renderer};
use exolaunch_slurm::SlurmDirectives;
use serde::Deserialize;
use serde_yaml::Value;

/// Modules loaded when the environment section lists none.
pub const DEFAULT_MODULES: &[&str] = &[
    "Stages/2025 GCCcore/.13.3.0",
    "Python/3.12.3",
    "h5py",
    "GCC",
    "OpenMPI",
    "PyYAML",
    "sympy",
];

/// Contraction driver run for each configuration.
pub const DEFAULT_SCRIPT: &str = "/p/scratch/exotichadrons/exotraction/src/two_pt_corr.py";

/// Contraction input: `slurm`, `environment` and `parameters` sections.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractionsConfig {
    pub slurm: SlurmDirectives,
    pub environment: Environment,
    pub parameters: ContractionParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Environment {
    pub omp_num_threads: u32,
    pub virtual_env: String,
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractionParams {
    pub ens: String,
    pub flavor: String,
    pub irrep: String,
    pub num_configs: u32,
    pub num_vecs: u32,
    pub lt: u32,
    pub cfg_step: u32,
    pub start_cfg: u32,
    pub end_cfg: u32,
    pub ntsrc: u32,
    /// Configurations skipped by the array job
    #[serde(default)]
    pub invalid_cfgs: Vec<u32>,
    #[serde(default = "default_script")]
    pub script: String,
}

fn default_modules() -> Vec<String> {
    DEFAULT_MODULES.iter().map(|m| m.to_string()).collect()
}

fn default_script() -> String {
    DEFAULT_SCRIPT.to_string()
}

impl ContractionsConfig {
    pub fn load(path: &Utf8Path) -> Result<Self, TaskError> {
        let content = std::fs::read_to_string(path).map_err(TaskError::io(path))?;
        serde_yaml::from_str(&content).map_err(|source| TaskError::Yaml {
            path: path.to_owned(),
            source,
        })
    }

    fn params(&self) -> Result<Params, TaskError> {
        let env = &self.environment;
        let p = &self.parameters;
        let invalid: Vec<String> = p.invalid_cfgs.iter().map(u32::to_string).collect();

        let mut params = Params::new();
        params.insert("slurm_header".into(), Value::from(self.slurm.render()?));
        params.insert("modules".into(), Value::from(env.modules.clone()));
        params.insert("omp_num_threads".into(), Value::from(env.omp_num_threads));
        params.insert("virtual_env".into(), Value::from(env.virtual_env.as_str()));
        for (key, value) in [
            ("num_configs", p.num_configs),
            ("num_vecs", p.num_vecs),
            ("lt", p.lt),
            ("cfg_step", p.cfg_step),
            ("start_cfg", p.start_cfg),
            ("end_cfg", p.end_cfg),
            ("ntsrc", p.ntsrc),
        ] {
            params.insert(key.into(), Value::from(value));
        }
        params.insert("ens".into(), Value::from(p.ens.as_str()));
        params.insert("flavor".into(), Value::from(p.flavor.as_str()));
        params.insert("irrep".into(), Value::from(p.irrep.as_str()));
        params.insert("invalid_cfgs".into(), Value::from(invalid.join(" ")));
        params.insert("script".into(), Value::from(p.script.as_str()));
        Ok(params)
    }
}

/// Write `out_root/run_<ens>/run_<day>_<flavor>_<irrep>.sh`.
///
/// `date` supplies the day of month in the file name.
pub fn generate_contractions(
    config: &ContractionsConfig,
    renderer: &Renderer,
    out_root: &Utf8Path,
    date: NaiveDate,
    overwrite: bool,
) -> Result<Utf8PathBuf, TaskError> {
    let p = &config.parameters;
    let path = out_root.join(format!("run_{}", p.ens)).join(format!(
        "run_{}_{}_{}.sh",
        date.day(),
        p.flavor,
        p.irrep
    ));

    let script = renderer.render_config("contractions.sh", &config.params()?)?;
    let mut summary = GenerateSummary::default();
    write_file(&path, &script, overwrite, &mut summary)?;
    if summary.written.is_empty() {
        tracing::warn!("{} exists; pass overwrite to replace it", path);
    } else {
        tracing::info!("Wrote contraction script {}", path);
    }
    Ok(path)
}
