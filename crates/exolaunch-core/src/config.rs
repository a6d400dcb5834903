//! Per-ensemble YAML configuration files.

use camino::{Utf8Path, Utf8PathBuf};
use exolaunch_parsers::{CfgRange, EnsembleError, EnsembleParams, EnsembleRegistry};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Keys every ensemble file must define.
pub const REQUIRED_KEYS: &[&str] = &["cfg_i", "cfg_f", "cfg_d", "data_path", "launch_path"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parse error in {path}: {source}")]
    Yaml {
        path: Utf8PathBuf,
        source: serde_yaml::Error,
    },
    #[error("{path} is missing required key '{key}'")]
    MissingKey { path: Utf8PathBuf, key: String },
    #[error("Invalid configuration in {path}: {message}")]
    Invalid { path: Utf8PathBuf, message: String },
    #[error("Configuration directory not found: {0}")]
    NotFound(Utf8PathBuf),
    #[error(transparent)]
    Ensemble(#[from] EnsembleError),
}

/// One ensemble's job-generation settings.
///
/// Keys not modelled here are kept in `extra` and handed to the templates
/// unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    /// File the configuration was read from
    #[serde(skip)]
    pub source: Utf8PathBuf,

    /// Ensemble short tag (the file stem)
    #[serde(skip)]
    pub ens_short: String,

    /// First configuration id
    pub cfg_i: u32,

    /// End of the configuration range (exclusive)
    pub cfg_f: u32,

    /// Configuration id step
    pub cfg_d: u32,

    /// Root for Chroma output (SDB/HDF5 files)
    pub data_path: Utf8PathBuf,

    /// Root for generated input files and scripts
    pub launch_path: Utf8PathBuf,

    /// Where the distillation basis is read from, if not under `data_path`
    #[serde(default)]
    pub eigs_path: Option<Utf8PathBuf>,

    /// Gauge configuration directory
    #[serde(default)]
    pub cfg_path: Option<String>,

    /// Gauge configuration file stem
    #[serde(default)]
    pub cfg_name: Option<String>,

    #[serde(default)]
    pub prop_mass_light_label: Option<String>,

    #[serde(default)]
    pub prop_mass_strange_label: Option<String>,

    #[serde(default)]
    pub prop_mass_charm_label: Option<String>,

    /// Additional short tag -> long form entries
    #[serde(default)]
    pub ensembles: BTreeMap<String, String>,

    /// Everything else, passed through to the templates
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl EnsembleConfig {
    /// Load an ensemble file. The ensemble tag is taken from the file stem.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let ens_short = path.file_stem().unwrap_or_default();
        Self::parse(ens_short, path, &content)
    }

    /// Parse ensemble YAML text.
    pub fn parse(ens_short: &str, path: &Utf8Path, content: &str) -> Result<Self, ConfigError> {
        let yaml_err = |source: serde_yaml::Error| ConfigError::Yaml {
            path: path.to_owned(),
            source,
        };

        let mut mapping: Mapping = serde_yaml::from_str(content).map_err(yaml_err)?;
        flatten_paths_section(&mut mapping, path);

        for key in REQUIRED_KEYS {
            if !mapping.contains_key(*key) {
                return Err(ConfigError::MissingKey {
                    path: path.to_owned(),
                    key: key.to_string(),
                });
            }
        }

        let mut config: EnsembleConfig =
            serde_yaml::from_value(Value::Mapping(mapping)).map_err(yaml_err)?;
        config.source = path.to_owned();
        config.ens_short = ens_short.to_string();
        config.expand_paths();
        config.validate()?;

        tracing::debug!(
            "Loaded {} from {}: cfgs {}..{} step {}",
            config.ens_short,
            path,
            config.cfg_i,
            config.cfg_f,
            config.cfg_d
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            path: self.source.clone(),
            message,
        };
        if self.cfg_d == 0 {
            return Err(invalid("cfg_d must be positive".to_string()));
        }
        if self.cfg_i > self.cfg_f {
            return Err(invalid(format!(
                "cfg_i ({}) is greater than cfg_f ({})",
                self.cfg_i, self.cfg_f
            )));
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        self.data_path = expand_tilde(self.data_path.as_str());
        self.launch_path = expand_tilde(self.launch_path.as_str());
        if let Some(eigs) = &self.eigs_path {
            self.eigs_path = Some(expand_tilde(eigs.as_str()));
        }
        if let Some(cfg_path) = &self.cfg_path {
            self.cfg_path = Some(expand_tilde(cfg_path).into_string());
        }
    }

    /// Configuration ids to generate jobs for.
    pub fn cfg_range(&self) -> CfgRange {
        CfgRange {
            start: self.cfg_i,
            end: self.cfg_f,
            step: self.cfg_d,
        }
    }

    /// Builtin ensembles plus those declared in this file.
    pub fn registry(&self) -> EnsembleRegistry {
        let mut registry = EnsembleRegistry::new();
        for (tag, long_form) in &self.ensembles {
            registry.insert(tag.clone(), long_form.clone());
        }
        registry
    }

    /// Decode this file's ensemble tag.
    pub fn ensemble(&self) -> Result<EnsembleParams, ConfigError> {
        Ok(self.registry().parse(&self.ens_short)?)
    }

    /// Directory holding the distillation basis.
    pub fn eigs_dir(&self) -> Utf8PathBuf {
        self.eigs_path
            .clone()
            .unwrap_or_else(|| self.data_path.join("eigs_sdb"))
    }

    /// A passthrough key as an integer.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }
}

/// Move the entries of a nested `paths:` mapping to the top level.
fn flatten_paths_section(mapping: &mut Mapping, path: &Utf8Path) {
    let Some(Value::Mapping(paths)) = mapping.remove("paths") else {
        return;
    };
    for (key, value) in paths {
        if mapping.contains_key(&key) {
            tracing::warn!(
                "{}: key {:?} given both at top level and under paths; using paths",
                path,
                key.as_str().unwrap_or_default()
            );
        }
        mapping.insert(key, value);
    }
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(path: &str) -> Utf8PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Utf8PathBuf::from(path),
    };
    match std::env::var("HOME") {
        Ok(home) => Utf8PathBuf::from(format!("{}{}", home.trim_end_matches('/'), rest)),
        Err(_) => {
            tracing::warn!("HOME is not set; leaving {} unexpanded", path);
            Utf8PathBuf::from(path)
        }
    }
}

/// Recursively find ensemble files (`*.yml`, `*.yaml`) under a directory, sorted.
pub fn discover(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::NotFound(dir.to_owned()));
    }

    let mut found = Vec::new();
    let mut pending = vec![dir.to_owned()];
    while let Some(current) = pending.pop() {
        let entries = current.read_dir_utf8().map_err(|source| ConfigError::Io {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: current.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path.to_owned());
            } else if matches!(path.extension(), Some("yml" | "yaml")) {
                found.push(path.to_owned());
            }
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = "\
cfg_i: 11
cfg_f: 51
cfg_d: 10
data_path: /scratch/a085m300
launch_path: /scratch/a085m300/launch
";

    fn parse(content: &str) -> Result<EnsembleConfig, ConfigError> {
        EnsembleConfig::parse("a085m300", Utf8Path::new("a085m300.yml"), content)
    }

    #[test]
    fn test_parse_minimal() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.ens_short, "a085m300");
        let ids: Vec<u32> = config.cfg_range().ids().collect();
        assert_eq!(ids, vec![11, 21, 31, 41]);
        assert_eq!(config.data_path, "/scratch/a085m300");
        assert_eq!(config.eigs_dir(), "/scratch/a085m300/eigs_sdb");
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_extra_keys_pass_through() {
        let content = format!(
            "{}decay_dir: 3\nLinkSmearingType: STOUT_SMEAR\nphase: [0, 0, 0]\n",
            MINIMAL
        );
        let config = parse(&content).unwrap();
        assert_eq!(config.get_u64("decay_dir"), Some(3));
        assert_eq!(
            config.extra.get("LinkSmearingType").and_then(Value::as_str),
            Some("STOUT_SMEAR")
        );
        assert!(config.extra.get("phase").is_some_and(Value::is_sequence));
    }

    #[test]
    fn test_missing_required_key() {
        let err = parse("cfg_i: 0\ncfg_f: 10\ncfg_d: 1\ndata_path: /d\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKey { ref key, .. } if key == "launch_path"
        ));
    }

    #[test]
    fn test_invalid_ranges() {
        let zero_step = MINIMAL.replace("cfg_d: 10", "cfg_d: 0");
        assert!(matches!(parse(&zero_step), Err(ConfigError::Invalid { .. })));
        let backwards = MINIMAL.replace("cfg_f: 51", "cfg_f: 5");
        assert!(matches!(parse(&backwards), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_paths_section_is_flattened() {
        let content = "\
cfg_i: 0
cfg_f: 4
cfg_d: 2
paths:
  data_path: /data/ens
  launch_path: /launch/ens
  cfg_path: /gauge/ens
";
        let config = parse(content).unwrap();
        assert_eq!(config.launch_path, "/launch/ens");
        assert_eq!(config.cfg_path.as_deref(), Some("/gauge/ens"));
        assert!(!config.extra.contains_key("paths"));
    }

    #[test]
    fn test_tilde_expansion() {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/".to_string());
        let config = parse(&MINIMAL.replace("/scratch/a085m300/launch", "~/launch")).unwrap();
        assert_eq!(
            config.launch_path,
            Utf8PathBuf::from(format!("{}/launch", home.trim_end_matches('/')))
        );
        assert_eq!(expand_tilde("~user/x"), "~user/x");
        assert_eq!(expand_tilde("/abs/~"), "/abs/~");
    }

    #[test]
    fn test_custom_ensemble() {
        let content = format!(
            "{}ensembles:\n  mytest: b3.57_ms-0.007_mud-0.044_s16t32-000\n",
            MINIMAL
        );
        let config =
            EnsembleConfig::parse("mytest", Utf8Path::new("mytest.yml"), &content).unwrap();
        let params = config.ensemble().unwrap();
        assert_eq!(params.lattice_length, 16);
        assert_eq!(params.lattice_time, 32);
    }

    #[test]
    fn test_unknown_ensemble() {
        let config = EnsembleConfig::parse("nope", Utf8Path::new("nope.yml"), MINIMAL).unwrap();
        assert!(matches!(
            config.ensemble(),
            Err(ConfigError::Ensemble(EnsembleError::UnknownEnsemble(_)))
        ));
    }

    #[test]
    fn test_load_and_discover() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("a085m300.yml"), MINIMAL).unwrap();
        std::fs::write(root.join("nested/a125m280.yaml"), MINIMAL).unwrap();
        std::fs::write(root.join("notes.txt"), "ignored").unwrap();

        let files = discover(&root).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a085m300.yml"));
        assert!(files[1].ends_with("nested/a125m280.yaml"));

        let config = EnsembleConfig::load(&files[1]).unwrap();
        assert_eq!(config.ens_short, "a125m280");
        assert_eq!(config.source, files[1]);
    }

    #[test]
    fn test_discover_missing_dir() {
        assert!(matches!(
            discover(Utf8Path::new("/nonexistent/ensembles")),
            Err(ConfigError::NotFound(_))
        ));
    }
}
