//! `#SBATCH` directive blocks.

use exolaunch_parsers::{format_walltime, parse_walltime};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlurmError {
    #[error("Invalid walltime '{0}': expected D-HH:MM:SS, HH:MM:SS, MM:SS or minutes")]
    InvalidWalltime(String),
    #[error("Job name must not be empty")]
    EmptyJobName,
}

/// Resources and bookkeeping requested from Slurm for one job.
///
/// Unset fields are left out of the rendered header so the cluster default
/// applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlurmDirectives {
    pub job_name: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(default)]
    pub ntasks_per_node: Option<u32>,
    #[serde(default)]
    pub cpus_per_task: Option<u32>,
    #[serde(default)]
    pub gpus_per_node: Option<u32>,
    /// Walltime as written by the user; a bare number means minutes
    #[serde(default, deserialize_with = "walltime_text")]
    pub time: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Job array range, e.g. `0-39%8`
    #[serde(default)]
    pub array: Option<String>,
}

impl SlurmDirectives {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            ..Self::default()
        }
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn nodes(mut self, nodes: u32) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn ntasks_per_node(mut self, ntasks: u32) -> Self {
        self.ntasks_per_node = Some(ntasks);
        self
    }

    pub fn cpus_per_task(mut self, cpus: u32) -> Self {
        self.cpus_per_task = Some(cpus);
        self
    }

    pub fn gpus_per_node(mut self, gpus: u32) -> Self {
        self.gpus_per_node = Some(gpus);
        self
    }

    /// Walltime given in minutes.
    pub fn minutes(mut self, minutes: u64) -> Self {
        self.time = Some(exolaunch_parsers::walltime_from_minutes(minutes));
        self
    }

    pub fn time(mut self, walltime: impl Into<String>) -> Self {
        self.time = Some(walltime.into());
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn array(mut self, array: impl Into<String>) -> Self {
        self.array = Some(array.into());
        self
    }

    /// Render the `#SBATCH` lines, without a trailing newline.
    ///
    /// The walltime is normalized to `[D-]HH:MM:SS`.
    pub fn render(&self) -> Result<String, SlurmError> {
        if self.job_name.trim().is_empty() {
            return Err(SlurmError::EmptyJobName);
        }

        let time = match &self.time {
            Some(raw) => {
                let duration =
                    parse_walltime(raw).ok_or_else(|| SlurmError::InvalidWalltime(raw.clone()))?;
                Some(format_walltime(duration.as_secs()))
            }
            None => None,
        };

        let mut lines = vec![format!("#SBATCH --job-name={}", self.job_name)];
        let mut push = |flag: &str, value: Option<String>| {
            if let Some(value) = value {
                lines.push(format!("#SBATCH --{}={}", flag, value));
            }
        };
        push("account", self.account.clone());
        push("partition", self.partition.clone());
        push("nodes", self.nodes.map(|n| n.to_string()));
        push(
            "ntasks-per-node",
            self.ntasks_per_node.map(|n| n.to_string()),
        );
        push("cpus-per-task", self.cpus_per_task.map(|n| n.to_string()));
        push("gpus-per-node", self.gpus_per_node.map(|n| n.to_string()));
        push("time", time);
        push("output", self.output.clone());
        push("error", self.error.clone());
        push("array", self.array.clone());

        Ok(lines.join("\n"))
    }
}

fn walltime_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Minutes(u64),
        Text(String),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Minutes(m) => m.to_string(),
        Raw::Text(s) => s,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_full_header() {
        let header = SlurmDirectives::new("peram_cfg11")
            .account("exotichadrons")
            .partition("booster")
            .nodes(1)
            .ntasks_per_node(4)
            .gpus_per_node(4)
            .minutes(90)
            .output("peram_cfg11.%j.out")
            .render()
            .unwrap();

        assert_eq!(
            header,
            "#SBATCH --job-name=peram_cfg11\n\
             #SBATCH --account=exotichadrons\n\
             #SBATCH --partition=booster\n\
             #SBATCH --nodes=1\n\
             #SBATCH --ntasks-per-node=4\n\
             #SBATCH --gpus-per-node=4\n\
             #SBATCH --time=01:30:00\n\
             #SBATCH --output=peram_cfg11.%j.out"
        );
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let header = SlurmDirectives::new("eigs").render().unwrap();
        assert_eq!(header, "#SBATCH --job-name=eigs");
    }

    #[test]
    fn test_walltime_is_normalized() {
        let header = SlurmDirectives::new("j").time("2-4").render().unwrap();
        assert!(header.ends_with("--time=2-04:00:00"));
    }

    #[test]
    fn test_invalid_walltime() {
        assert_eq!(
            SlurmDirectives::new("j").time("soon").render(),
            Err(SlurmError::InvalidWalltime("soon".to_string()))
        );
    }

    #[test]
    fn test_empty_job_name() {
        assert_eq!(
            SlurmDirectives::new(" ").render(),
            Err(SlurmError::EmptyJobName)
        );
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = "job_name: contract\naccount: exotichadrons\nnodes: 1\ncpus_per_task: 32\n\
                    time: 120\noutput: out_%A_%a.log\npartition: batch\narray: 0-39\n\
                    ntasks_per_node: 1\n";
        let directives: SlurmDirectives = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(directives.time.as_deref(), Some("120"));
        assert_eq!(directives.array.as_deref(), Some("0-39"));
        let header = directives.render().unwrap();
        assert!(header.contains("#SBATCH --time=02:00:00"));
        assert!(header.contains("#SBATCH --array=0-39"));
    }
}
