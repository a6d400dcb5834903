//! Chroma task kinds and the files each one produces.

use camino::Utf8PathBuf;
use exolaunch_core::ConfigError;
use exolaunch_render::RenderError;
use exolaunch_slurm::SlurmError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid task '{0}': expected eigs, peram_<mg|clover>_<light|strange|charm>, meson, meson2 or disco")]
    InvalidTask(String),
    #[error("Task {task} cannot be binned; only perambulator and meson tasks can")]
    NotBinnable { task: String },
    #[error("Task {task} requires parameter '{name}' which was not provided")]
    MissingParameter { task: String, name: String },
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("IO error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parse error in {path}: {source}")]
    Yaml {
        path: Utf8PathBuf,
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Slurm(#[from] SlurmError),
}

impl TaskError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> TaskError {
        let path = path.into();
        move |source| TaskError::Io { path, source }
    }
}

/// Solver used for the perambulator inversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inverter {
    Multigrid,
    Clover,
}

impl Inverter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Inverter::Multigrid => "mg",
            Inverter::Clover => "clover",
        }
    }

    /// Infix in perambulator file names keeping the two solvers' outputs apart.
    pub fn file_infix(&self) -> &'static str {
        match self {
            Inverter::Multigrid => "",
            Inverter::Clover => "_clover",
        }
    }
}

/// Quark flavour a perambulator is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    Light,
    Strange,
    Charm,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Light => "light",
            Flavor::Strange => "strange",
            Flavor::Charm => "charm",
        }
    }

    /// Key holding the Chroma mass label for this flavour.
    pub fn label_key(&self) -> &'static str {
        match self {
            Flavor::Light => "prop_mass_light_label",
            Flavor::Strange => "prop_mass_strange_label",
            Flavor::Charm => "prop_mass_charm_label",
        }
    }

    /// Key that may override the bare quark mass.
    pub fn mass_key(&self) -> &'static str {
        match self {
            Flavor::Light => "prop_mass_light",
            Flavor::Strange => "prop_mass_strange",
            Flavor::Charm => "prop_mass_charm",
        }
    }

    /// Ensemble parameter the bare mass is taken from otherwise.
    pub(crate) fn ensemble_key(&self) -> &'static str {
        match self {
            Flavor::Light => "mud",
            Flavor::Strange => "ms",
            Flavor::Charm => "mc",
        }
    }

    /// Output basename prefix of the perambulator files.
    pub fn peram_prefix(&self) -> &'static str {
        match self {
            Flavor::Light => "peram",
            Flavor::Strange => "peram_strange",
            Flavor::Charm => "peram_charm",
        }
    }
}

/// A Chroma measurement to generate jobs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Distillation basis
    Eigs,
    Peram { inverter: Inverter, flavor: Flavor },
    Meson,
    /// Meson elementals over a p^2 window
    Meson2,
    /// Disconnected loops
    Disco,
}

impl Task {
    /// Directory under the launch path holding this task's files.
    pub fn launch_dir(&self) -> &'static str {
        match self {
            Task::Eigs => "ini-eigs",
            Task::Peram { flavor: Flavor::Light, .. } => "ini-perams",
            Task::Peram { flavor: Flavor::Strange, .. } => "ini-perams-strange",
            Task::Peram { flavor: Flavor::Charm, .. } => "ini-perams-charm",
            Task::Meson => "ini-meson",
            Task::Meson2 => "ini-meson2",
            Task::Disco => "ini-disco",
        }
    }

    /// Directory under the data path receiving this task's output.
    pub fn data_dir(&self) -> &'static str {
        match self {
            Task::Eigs => "eigs_sdb",
            Task::Peram { flavor: Flavor::Light, .. } => "perams_sdb",
            Task::Peram { flavor: Flavor::Strange, .. } => "perams_strange_sdb",
            Task::Peram { flavor: Flavor::Charm, .. } => "perams_charm_sdb",
            Task::Meson => "meson_sdb",
            Task::Meson2 => "meson2_sdb",
            Task::Disco => "disco_sdb",
        }
    }

    /// Prefix of the Slurm resource keys (`<prefix>_slurm_nodes`, ...).
    pub fn resource_prefix(&self) -> &'static str {
        match self {
            Task::Eigs => "eigs",
            Task::Peram { .. } => "prop",
            Task::Meson | Task::Meson2 => "meson",
            Task::Disco => "disco",
        }
    }

    fn template_stem(&self) -> &'static str {
        match self {
            Task::Eigs => "eigs",
            Task::Peram { .. } => "peram",
            Task::Meson => "meson",
            Task::Meson2 => "meson2",
            Task::Disco => "disco",
        }
    }

    pub fn xml_template(&self) -> String {
        format!("{}.xml", self.template_stem())
    }

    pub fn script_template(&self) -> String {
        format!("{}.sh", self.template_stem())
    }

    /// Template for grouped multi-GPU scripts, if the task supports them.
    pub fn binned_template(&self) -> Option<&'static str> {
        match self {
            Task::Peram { .. } => Some("peram_binned.sh"),
            Task::Meson => Some("meson_binned.sh"),
            _ => None,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Peram { inverter, flavor } => {
                write!(f, "peram_{}_{}", inverter.as_str(), flavor.as_str())
            }
            other => f.write_str(other.template_stem()),
        }
    }
}

impl FromStr for Task {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TaskError::InvalidTask(s.to_string());
        match s {
            "eigs" => return Ok(Task::Eigs),
            "meson" => return Ok(Task::Meson),
            "meson2" => return Ok(Task::Meson2),
            "disco" => return Ok(Task::Disco),
            _ => {}
        }

        let rest = s.strip_prefix("peram_").ok_or_else(invalid)?;
        let (inverter, flavor) = rest.split_once('_').ok_or_else(invalid)?;
        let inverter = match inverter {
            "mg" => Inverter::Multigrid,
            "clover" => Inverter::Clover,
            _ => return Err(invalid()),
        };
        let flavor = match flavor {
            "light" => Flavor::Light,
            "strange" => Flavor::Strange,
            "charm" => Flavor::Charm,
            _ => return Err(invalid()),
        };
        Ok(Task::Peram { inverter, flavor })
    }
}

/// Parse task names, dropping repeats but keeping first-seen order.
pub fn parse_tasks<S: AsRef<str>>(names: &[S]) -> Result<Vec<Task>, TaskError> {
    let mut tasks = Vec::new();
    for name in names {
        let task: Task = name.as_ref().parse()?;
        if !tasks.contains(&task) {
            tasks.push(task);
        }
    }
    Ok(tasks)
}

/// Which of a task's two files a run object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    /// Chroma input XML
    Xml,
    /// Slurm batch script
    Script,
}

/// One generated file per configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunObject {
    pub task: Task,
    pub kind: RunKind,
}

impl RunObject {
    pub fn template_id(&self) -> String {
        match self.kind {
            RunKind::Xml => self.task.xml_template(),
            RunKind::Script => self.task.script_template(),
        }
    }

    /// File name for a (zero-padded) configuration id.
    pub fn file_name(&self, cfg_id: &str) -> String {
        match self.kind {
            RunKind::Xml => xml_file_name(&self.task, cfg_id),
            RunKind::Script => format!("{}_cfg{}.sh", self.task, cfg_id),
        }
    }
}

pub(crate) fn xml_file_name(task: &Task, cfg_id: &str) -> String {
    format!("{}_cfg{}.ini.xml", task, cfg_id)
}

/// Each task as its XML followed by its script, without repeats.
pub fn expand_tasks(tasks: &[Task]) -> Vec<RunObject> {
    let mut objects = Vec::new();
    for task in tasks {
        for kind in [RunKind::Xml, RunKind::Script] {
            let object = RunObject { task: *task, kind };
            if !objects.contains(&object) {
                objects.push(object);
            }
        }
    }
    objects
}
