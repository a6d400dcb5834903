//! Grouped scripts that run several configurations on one multi-GPU node.

use crate::context::{CHROMA_OUT_DIR, JobFiles, cfg_context, directives};
use crate::generate::{GenerateSummary, create_data_dirs, write_file};
use crate::task::{Task, TaskError};
use camino::Utf8PathBuf;
use exolaunch_core::{EnsembleConfig, merge_params};
use exolaunch_parsers::pad_cfg_id;
use exolaunch_render::Renderer;
use serde_yaml::Value;

/// GPUs on a node when none are configured.
pub const DEFAULT_DEVICES: &[u32] = &[0, 1, 2, 3];

#[derive(Debug, Clone)]
pub struct BinnedOptions {
    /// Configurations per script
    pub group_size: usize,
    /// GPU indices, one per configuration of a group
    pub devices: Vec<u32>,
    /// Eigenvector counts to generate scripts for
    pub num_vecs: Vec<u32>,
    pub overwrite: bool,
}

impl Default for BinnedOptions {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_DEVICES.len(),
            devices: DEFAULT_DEVICES.to_vec(),
            num_vecs: Vec::new(),
            overwrite: false,
        }
    }
}

/// Consecutive configurations handled by one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgGroup {
    pub start: u32,
    pub end: u32,
    pub ids: Vec<u32>,
}

impl CfgGroup {
    pub fn name(&self) -> String {
        format!("cfgs_{}-{}", self.start, self.end)
    }
}

fn slurm_count(directive: &str, n: usize) -> Result<u32, TaskError> {
    u32::try_from(n)
        .map_err(|_| TaskError::InvalidOption(format!("--{} = {} is out of range", directive, n)))
}

/// Split configuration ids into groups of at most `group_size`.
pub fn cfg_groups(ids: impl IntoIterator<Item = u32>, group_size: usize) -> Vec<CfgGroup> {
    let ids: Vec<u32> = ids.into_iter().collect();
    ids.chunks(group_size.max(1))
        .filter_map(|chunk| {
            Some(CfgGroup {
                start: *chunk.first()?,
                end: *chunk.last()?,
                ids: chunk.to_vec(),
            })
        })
        .collect()
}

/// Generate one script per configuration group and eigenvector count.
///
/// Scripts go to `launch_path/cfgs_<start>-<end>/numvec<n>/<task>_<n>_cfgs_<start>-<end>.sh`
/// next to the Chroma inputs they run, which carry the eigenvector count
/// in place of the ensemble default.
pub fn generate_binned(
    config: &EnsembleConfig,
    renderer: &Renderer,
    tasks: &[Task],
    options: &BinnedOptions,
) -> Result<GenerateSummary, TaskError> {
    if options.num_vecs.is_empty() {
        return Err(TaskError::InvalidOption(
            "at least one eigenvector count is required".to_string(),
        ));
    }
    if options.group_size == 0 || options.group_size > options.devices.len() {
        return Err(TaskError::InvalidOption(format!(
            "group size {} needs between 1 and {} devices",
            options.group_size,
            options.devices.len()
        )));
    }
    let binned: Vec<(&Task, &str)> = tasks
        .iter()
        .map(|task| {
            task.binned_template()
                .map(|id| (task, id))
                .ok_or_else(|| TaskError::NotBinnable {
                    task: task.to_string(),
                })
        })
        .collect::<Result<_, _>>()?;

    let ensemble = config.ensemble()?;
    let base = merge_params(config, &ensemble)?;
    create_data_dirs(&config.data_path)?;
    let log_dir = config.data_path.join(CHROMA_OUT_DIR);

    let mut summary = GenerateSummary::default();
    for group in cfg_groups(config.cfg_range().ids(), options.group_size) {
        let group_dir = config.launch_path.join(group.name());
        tracing::info!("Creating scripts for configuration group {}", group_dir);

        for &nvec in &options.num_vecs {
            let nvec_dir = group_dir.join(format!("numvec{}", nvec));

            for &(task, template_id) in &binned {
                let mut jobs = Vec::new();
                for (&cfg, &device) in group.ids.iter().zip(&options.devices) {
                    let ctx = cfg_context(&base, config, task, cfg, Some(nvec))?;
                    let ini_file: Utf8PathBuf = nvec_dir.join(format!(
                        "{}_{}_cfg{}.ini.xml",
                        task,
                        nvec,
                        pad_cfg_id(cfg)
                    ));
                    let xml = renderer.render_config(&task.xml_template(), &ctx)?;
                    write_file(&ini_file, &xml, options.overwrite, &mut summary)?;

                    let mut job = JobFiles::for_input(config, ini_file).to_value();
                    if let Value::Mapping(map) = &mut job {
                        map.insert("cfg".into(), Value::from(cfg));
                        map.insert("device".into(), Value::from(device));
                    }
                    jobs.push(job);
                }

                let script_name = format!("{}_{}_{}", task, nvec, group.name());
                let job_name = format!("{}_{}", config.ens_short, script_name);
                let header = directives(&base, task, &job_name, &log_dir)?
                    .nodes(1)
                    .ntasks_per_node(slurm_count("ntasks-per-node", jobs.len())?)
                    .gpus_per_node(slurm_count("gpus-per-node", options.devices.len())?)
                    .render()?;

                let mut ctx = cfg_context(&base, config, task, group.start, Some(nvec))?;
                ctx.insert("slurm_header".into(), Value::from(header));
                ctx.insert("nvec".into(), Value::from(nvec));
                ctx.insert("cfg_group_start".into(), Value::from(group.start));
                ctx.insert("cfg_group_end".into(), Value::from(group.end));
                ctx.insert("cfg_ids".into(), Value::from(group.ids.clone()));
                ctx.insert("cfg_ids_and_devices".into(), Value::Sequence(jobs));
                let geometry_key = format!("{}_chroma_geometry", task.resource_prefix());
                if let Some(geometry) = base.get(&geometry_key) {
                    ctx.insert("chroma_geometry".into(), geometry.clone());
                }

                let script = renderer.render_config(template_id, &ctx)?;
                let path = nvec_dir.join(format!("{}.sh", script_name));
                write_file(&path, &script, options.overwrite, &mut summary)?;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Flavor, Inverter};
    use camino::Utf8Path;
    use tempfile::TempDir;

    #[test]
    fn test_cfg_groups() {
        let groups = cfg_groups((11..101).step_by(10), 4);
        assert_eq!(groups.len(), 3);
        assert_eq!(
            groups[0],
            CfgGroup {
                start: 11,
                end: 41,
                ids: vec![11, 21, 31, 41]
            }
        );
        assert_eq!(groups[2].ids, vec![91]);
        assert_eq!(groups[2].name(), "cfgs_91-91");
        assert!(cfg_groups(Vec::new(), 4).is_empty());
    }

    fn setup() -> (TempDir, EnsembleConfig) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let content = format!(
            "data_path: {}\nlaunch_path: {}\n\
             cfg_i: 11\ncfg_f: 61\ncfg_d: 10\ncfg_path: /gauge\n\
             Frequency: 1\nmeson_t_back: 0\ndecay_dir: 3\nt_start: 0\n\
             meson_chroma_max_tslices_in_contraction: 1\nmeson_zphases: [0.0, 2.0]\n\
             LinkSmearingType: STOUT_SMEAR\nlink_smear_fact: 0.1\nlink_smear_num: 10\n\
             no_smear_dir: 3\n\
             omp_threads: 8\nsuperbblas_threads: 8\ncode_dir: /opt/chroma/bin\n\
             meson_chroma_geometry: [1, 1, 1, 1]\nmeson_chroma_minutes: 30\n",
            root.join("data"),
            root.join("launch"),
        );
        let config =
            EnsembleConfig::parse("a085m300", Utf8Path::new("a085m300.yml"), &content).unwrap();
        (temp, config)
    }

    #[test]
    fn test_generate_binned_meson() {
        let (_temp, config) = setup();
        let renderer = Renderer::builtin().unwrap();
        let options = BinnedOptions {
            num_vecs: vec![32, 64],
            ..BinnedOptions::default()
        };
        let summary = generate_binned(&config, &renderer, &[Task::Meson], &options).unwrap();

        // cfgs 11..61 step 10 -> groups [11..41] and [51]; 5 inputs + 2 scripts per nvec
        assert_eq!(summary.written.len(), 14);

        let script_path = config
            .launch_path
            .join("cfgs_11-41/numvec32/meson_32_cfgs_11-41.sh");
        let script = std::fs::read_to_string(&script_path).unwrap();
        assert!(script.contains("#SBATCH --gpus-per-node=4"));
        assert!(script.contains("CUDA_VISIBLE_DEVICES=3 "));
        assert_eq!(script.matches("srun").count(), 4);
        assert!(script.trim_end().ends_with("wait"));

        let xml_path = config
            .launch_path
            .join("cfgs_11-41/numvec32/meson_32_cfg21.ini.xml");
        let xml = std::fs::read_to_string(&xml_path).unwrap();
        assert!(xml.contains("<num_vecs>32</num_vecs>"));
        assert!(xml.contains("meson-32_cfg21.sdb"));
    }

    #[test]
    fn test_binned_rejects_other_tasks() {
        let (_temp, config) = setup();
        let renderer = Renderer::builtin().unwrap();
        let options = BinnedOptions {
            num_vecs: vec![32],
            ..BinnedOptions::default()
        };
        assert!(matches!(
            generate_binned(&config, &renderer, &[Task::Eigs], &options),
            Err(TaskError::NotBinnable { .. })
        ));

        let too_big = BinnedOptions {
            group_size: 8,
            ..options.clone()
        };
        let peram = Task::Peram {
            inverter: Inverter::Multigrid,
            flavor: Flavor::Light,
        };
        assert!(matches!(
            generate_binned(&config, &renderer, &[peram], &too_big),
            Err(TaskError::InvalidOption(_))
        ));
    }
}
