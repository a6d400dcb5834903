//! Per-configuration render contexts.

use crate::task::{Flavor, Task, TaskError};
use camino::{Utf8Path, Utf8PathBuf};
use exolaunch_core::{EnsembleConfig, lists};
use exolaunch_parsers::pad_cfg_id;
use exolaunch_render::{Params, display};
use exolaunch_slurm::SlurmDirectives;
use serde_yaml::Value;

/// Directory for Chroma's own XML output and job logs.
pub const CHROMA_OUT_DIR: &str = "chroma_out";

fn text(params: &Params, key: &str) -> Option<String> {
    params.get(key).and_then(display)
}

fn number(params: &Params, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

/// A count that must fit a Slurm directive.
fn count(params: &Params, task: &Task, key: &str) -> Result<Option<u32>, TaskError> {
    number(params, key)
        .map(|n| {
            u32::try_from(n).map_err(|_| {
                TaskError::InvalidOption(format!("{} = {} is out of range for {}", key, n, task))
            })
        })
        .transpose()
}

fn require(params: &Params, task: &Task, key: &str) -> Result<String, TaskError> {
    text(params, key).ok_or_else(|| TaskError::MissingParameter {
        task: task.to_string(),
        name: key.to_string(),
    })
}

/// Merged parameters plus everything specific to one task and configuration.
///
/// `nvec` replaces the eigenvector counts (`num_vecs_perams`, `meson_nvec`)
/// when given.
pub fn cfg_context(
    base: &Params,
    config: &EnsembleConfig,
    task: &Task,
    cfg: u32,
    nvec: Option<u32>,
) -> Result<Params, TaskError> {
    let mut params = base.clone();
    let cfg_id = pad_cfg_id(cfg);
    params.insert("cfg".into(), Value::from(cfg));
    params.insert("cfg_id".into(), Value::from(cfg_id.as_str()));
    if let Some(nvec) = nvec {
        params.insert("num_vecs_perams".into(), Value::from(nvec));
        params.insert("meson_nvec".into(), Value::from(nvec));
    }

    let cfg_path = require(&params, task, "cfg_path")?;
    let cfg_name = require(&params, task, "cfg_name")?;
    let gauge_file = Utf8Path::new(&cfg_path).join(format!("{}{}.lime", cfg_name, cfg));
    params.insert("gauge_file".into(), Value::from(gauge_file.as_str()));

    let colorvec_file = config
        .eigs_dir()
        .join(format!("colorvec_{}_cfg{}.sdb", config.ens_short, cfg_id));
    params.insert("colorvec_file".into(), Value::from(colorvec_file.as_str()));

    let data_dir = config.data_path.join(task.data_dir());
    match task {
        Task::Eigs => {}
        Task::Peram { inverter, flavor } => {
            params.insert("inverter_type".into(), Value::from(inverter.as_str()));
            params.insert("flavor".into(), Value::from(flavor.as_str()));
            let label = require(&params, task, flavor.label_key())?;
            params.insert("mass_label".into(), Value::from(label));
            let mass = quark_mass(&params, task, *flavor)?;
            params.insert("quark_mass".into(), Value::from(mass));

            let nvec = require(&params, task, "num_vecs_perams")?;
            let peram_file = data_dir.join(format!(
                "{}{}_{}_cfg{}.sdb",
                flavor.peram_prefix(),
                inverter.file_infix(),
                nvec,
                cfg_id
            ));
            params.insert("peram_file".into(), Value::from(peram_file.as_str()));
        }
        Task::Meson | Task::Meson2 => {
            if *task == Task::Meson2 {
                let window = |key: &str| {
                    number(&params, key).ok_or_else(|| TaskError::MissingParameter {
                        task: task.to_string(),
                        name: key.to_string(),
                    })
                };
                let (min, max) = (window("mom2_min")?, window("mom2_max")?);
                let moms = lists::momenta_in_window(
                    u32::try_from(min).unwrap_or(u32::MAX),
                    u32::try_from(max).unwrap_or(u32::MAX),
                );
                params.insert("momentum_list".into(), Value::from(moms));
            }
            let nvec = require(&params, task, "meson_nvec")?;
            let meson_file = data_dir.join(format!("{}-{}_cfg{}.sdb", task, nvec, cfg_id));
            params.insert("meson_file".into(), Value::from(meson_file.as_str()));
        }
        Task::Disco => {
            let mass = quark_mass(&params, task, Flavor::Light)?;
            params.insert("quark_mass".into(), Value::from(mass));
            let disco_file = data_dir.join(format!("disco_cfg{}.sdb", cfg_id));
            params.insert("disco_file".into(), Value::from(disco_file.as_str()));
        }
    }

    Ok(params)
}

/// Bare quark mass for a flavour: an explicit `prop_mass_<flavor>` key, or
/// the ensemble's mass (the light mass enters with a minus sign).
fn quark_mass(params: &Params, task: &Task, flavor: Flavor) -> Result<String, TaskError> {
    if let Some(mass) = text(params, flavor.mass_key()) {
        return Ok(mass);
    }
    let mass = text(params, flavor.ensemble_key()).ok_or_else(|| TaskError::MissingParameter {
        task: task.to_string(),
        name: flavor.mass_key().to_string(),
    })?;
    Ok(match flavor {
        Flavor::Light => format!("-{}", mass),
        Flavor::Strange | Flavor::Charm => mass,
    })
}

/// Slurm resources for a task, read from `<prefix>_slurm_nodes`,
/// `<prefix>_tasks_node(s)`, `<prefix>_num_gpu`, `<prefix>_chroma_minutes`,
/// `account` and `partition`.
pub fn directives(
    params: &Params,
    task: &Task,
    job_name: &str,
    log_dir: &Utf8Path,
) -> Result<SlurmDirectives, TaskError> {
    let prefix = task.resource_prefix();
    let key = |suffix: &str| format!("{}_{}", prefix, suffix);

    let mut directives = SlurmDirectives::new(job_name)
        .nodes(nodes(params, task)?)
        .ntasks_per_node(tasks_per_node(params, task)?)
        .output(log_dir.join(format!("{}.%j.out", job_name)).into_string());
    if let Some(account) = text(params, "account") {
        directives = directives.account(account);
    }
    if let Some(partition) = text(params, "partition") {
        directives = directives.partition(partition);
    }
    if let Some(gpus) = count(params, task, &key("num_gpu"))? {
        directives = directives.gpus_per_node(gpus);
    }
    if let Some(minutes) = number(params, &key("chroma_minutes")) {
        directives = directives.minutes(minutes);
    }
    Ok(directives)
}

fn nodes(params: &Params, task: &Task) -> Result<u32, TaskError> {
    let key = format!("{}_slurm_nodes", task.resource_prefix());
    Ok(count(params, task, &key)?.unwrap_or(1))
}

fn tasks_per_node(params: &Params, task: &Task) -> Result<u32, TaskError> {
    let prefix = task.resource_prefix();
    for suffix in ["tasks_node", "tasks_nodes", "tasks_per_node"] {
        if let Some(n) = count(params, task, &format!("{}_{}", prefix, suffix))? {
            return Ok(n);
        }
    }
    Ok(1)
}

/// Files a single Chroma invocation reads and writes.
#[derive(Debug, Clone)]
pub struct JobFiles {
    pub ini_file: Utf8PathBuf,
    pub out_xml: Utf8PathBuf,
    pub log_file: Utf8PathBuf,
}

impl JobFiles {
    /// Output XML and log named after the input file, under `chroma_out`.
    pub fn for_input(config: &EnsembleConfig, ini_file: Utf8PathBuf) -> Self {
        let out_dir = config.data_path.join(CHROMA_OUT_DIR);
        let stem = ini_file
            .file_name()
            .and_then(|name| name.strip_suffix(".ini.xml"))
            .unwrap_or("chroma")
            .to_string();
        Self {
            out_xml: out_dir.join(format!("{}.out.xml", stem)),
            log_file: out_dir.join(format!("{}.log", stem)),
            ini_file,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_yaml::Mapping::new();
        map.insert("ini_file".into(), Value::from(self.ini_file.as_str()));
        map.insert("out_xml".into(), Value::from(self.out_xml.as_str()));
        map.insert("log_file".into(), Value::from(self.log_file.as_str()));
        Value::Mapping(map)
    }
}

/// Context for a task's batch script.
pub fn script_context(
    mut params: Params,
    config: &EnsembleConfig,
    task: &Task,
    files: &JobFiles,
    run_dir: &Utf8Path,
    job_name: &str,
) -> Result<Params, TaskError> {
    let log_dir = config.data_path.join(CHROMA_OUT_DIR);
    let header = directives(&params, task, job_name, &log_dir)?.render()?;
    let ranks = nodes(&params, task)?.saturating_mul(tasks_per_node(&params, task)?);

    params.insert("slurm_header".into(), Value::from(header));
    params.insert("ranks".into(), Value::from(ranks));
    params.insert("run_dir".into(), Value::from(run_dir.as_str()));
    params.insert("ini_file".into(), Value::from(files.ini_file.as_str()));
    params.insert("out_xml".into(), Value::from(files.out_xml.as_str()));
    params.insert("log_file".into(), Value::from(files.log_file.as_str()));
    if let Some(geometry) = params.get(&format!("{}_chroma_geometry", task.resource_prefix())) {
        params.insert("chroma_geometry".into(), geometry.clone());
    }
    Ok(params)
}
