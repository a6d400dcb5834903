//! Per-configuration Chroma inputs and batch scripts.

use crate::context::{JobFiles, cfg_context, script_context};
use crate::task::{RunKind, Task, TaskError, expand_tasks};
use camino::{Utf8Path, Utf8PathBuf};
use exolaunch_core::{EnsembleConfig, merge_params};
use exolaunch_parsers::pad_cfg_id;
use exolaunch_render::{Params, Renderer};

/// Output directories created under the data path.
pub const DATA_DIRS: &[&str] = &[
    "eigs_sdb",
    "perams_sdb",
    "meson_sdb",
    "meson2_sdb",
    "chroma_out",
    "perams_charm_sdb",
    "perams_strange_sdb",
    "disco_sdb",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Replace files that already exist
    pub overwrite: bool,
}

/// What a generation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub written: Vec<Utf8PathBuf>,
    pub skipped: Vec<Utf8PathBuf>,
}

impl GenerateSummary {
    pub fn extend(&mut self, other: GenerateSummary) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
    }
}

/// Create the data directories Chroma writes into.
pub fn create_data_dirs(data_path: &Utf8Path) -> Result<(), TaskError> {
    for dir in DATA_DIRS {
        let path = data_path.join(dir);
        std::fs::create_dir_all(&path).map_err(TaskError::io(&path))?;
    }
    tracing::debug!("Ensured data directories under {}", data_path);
    Ok(())
}

/// Write `content` to `path` unless it exists and `overwrite` is off.
pub(crate) fn write_file(
    path: &Utf8Path,
    content: &str,
    overwrite: bool,
    summary: &mut GenerateSummary,
) -> Result<(), TaskError> {
    if path.exists() && !overwrite {
        tracing::info!("Skipping {} (exists)", path);
        summary.skipped.push(path.to_owned());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    std::fs::write(path, content).map_err(TaskError::io(path))?;
    tracing::debug!("Wrote {}", path);
    summary.written.push(path.to_owned());
    Ok(())
}

/// Generate the Chroma input and Slurm script of every task for every
/// configuration of an ensemble.
///
/// Files land in `launch_path/<task dir>/cnfg<NN>/`.
pub fn generate(
    config: &EnsembleConfig,
    renderer: &Renderer,
    tasks: &[Task],
    options: GenerateOptions,
) -> Result<GenerateSummary, TaskError> {
    let ensemble = config.ensemble()?;
    let base = merge_params(config, &ensemble)?;
    create_data_dirs(&config.data_path)?;

    let objects = expand_tasks(tasks);
    let mut summary = GenerateSummary::default();

    for cfg in config.cfg_range().ids() {
        tracing::info!(
            "Creating {} files for {} cfg {}",
            objects.len(),
            config.ens_short,
            cfg
        );
        let cfg_id = pad_cfg_id(cfg);

        for object in &objects {
            let task = &object.task;
            let dir = config
                .launch_path
                .join(task.launch_dir())
                .join(format!("cnfg{}", cfg_id));
            let path = dir.join(object.file_name(&cfg_id));
            if path.exists() && !options.overwrite {
                tracing::info!("Skipping {} (exists)", path);
                summary.skipped.push(path);
                continue;
            }

            let ctx = cfg_context(&base, config, task, cfg, None)?;
            let ctx = match object.kind {
                RunKind::Xml => ctx,
                RunKind::Script => {
                    let ini_file = dir.join(crate::task::xml_file_name(task, &cfg_id));
                    let files = JobFiles::for_input(config, ini_file);
                    let job_name = format!("{}_{}_cfg{}", config.ens_short, task, cfg_id);
                    script_context(ctx, config, task, &files, &dir, &job_name)?
                }
            };
            let content = render(renderer, &object.template_id(), &ctx)?;
            write_file(&path, &content, options.overwrite, &mut summary)?;
        }
    }

    tracing::info!(
        "{}: wrote {} files, skipped {}",
        config.ens_short,
        summary.written.len(),
        summary.skipped.len()
    );
    Ok(summary)
}

fn render(renderer: &Renderer, id: &str, ctx: &Params) -> Result<String, TaskError> {
    Ok(renderer.render_config(id, ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Flavor, Inverter};
    use exolaunch_render::RenderError;
    use tempfile::TempDir;

    const ENSEMBLE: &str = "\
cfg_i: 11
cfg_f: 31
cfg_d: 10
cfg_path: /gauge
Frequency: 1
max_nvec: 64
decay_dir: 3
t_start: 0
LinkSmearingType: STOUT_SMEAR
link_smear_fact: 0.1
link_smear_num: 10
no_smear_dir: 3
omp_threads: 8
superbblas_threads: 8
code_dir: /opt/chroma/bin
eigs_chroma_geometry: [1, 1, 1, 4]
eigs_slurm_nodes: 1
eigs_tasks_node: 4
eigs_chroma_minutes: 60
";

    const EIGS: &[Task] = &[Task::Eigs];

    const MEASUREMENTS: &str = "\
prop_mass_strange_label: S-0.007
num_tsrc: 4
prop_t_back: 0
num_tries: 1
max_rhs: 8
prop_zphases: [0.0, 2.0]
prop_clov_coeff: 1.2
rho: 0.125
precision: '1e-8'
max_iter: 500
prop_chroma_geometry: [1, 1, 2, 2]
prop_slurm_nodes: 2
prop_tasks_node: 4
meson_t_back: 0
meson_chroma_max_tslices_in_contraction: 1
meson_zphases: [0.0, 2.0]
meson_chroma_geometry: [1, 1, 1, 2]
meson_tasks_node: 2
mom2_min: 1
mom2_max: 1
disco_max_rhs: 4
disco_probing_displacement: 2
disco_probing_power: 8
disco_noise_vectors: 1
disco_max_colors: 3325
disco_max_colors_at_once: 256
disco_chroma_geometry: [2, 2, 2, 2]
disco_slurm_nodes: 4
disco_tasks_node: 4
";

    fn setup(extra: &str) -> (TempDir, EnsembleConfig) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let content = format!(
            "data_path: {}\nlaunch_path: {}\n{}{}",
            root.join("data"),
            root.join("launch"),
            ENSEMBLE,
            extra
        );
        let config =
            EnsembleConfig::parse("a085m300", &root.join("a085m300.yml"), &content).unwrap();
        (temp, config)
    }

    #[test]
    fn test_generate_eigs() {
        let (_temp, config) = setup("");
        let renderer = Renderer::builtin().unwrap();
        let summary = generate(&config, &renderer, EIGS, GenerateOptions::default()).unwrap();

        assert_eq!(summary.written.len(), 4);
        assert!(summary.skipped.is_empty());
        for dir in DATA_DIRS {
            assert!(config.data_path.join(dir).is_dir());
        }

        let xml_path = config
            .launch_path
            .join("ini-eigs/cnfg11/eigs_cfg11.ini.xml");
        let xml = std::fs::read_to_string(&xml_path).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<nrow>32 32 32 64</nrow>"));
        assert!(xml.contains(
            "<cfg_file>/gauge/b3.57_ms-0.007_mud-0.044_s32t64-000-n_cfg_11.lime</cfg_file>"
        ));

        let sh_path = config.launch_path.join("ini-eigs/cnfg21/eigs_cfg21.sh");
        let sh = std::fs::read_to_string(&sh_path).unwrap();
        assert!(sh.starts_with("#!/bin/bash\n#SBATCH --job-name=a085m300_eigs_cfg21"));
        assert!(sh.contains("srun -n 4 /opt/chroma/bin/chroma"));
        assert!(sh.contains("-geom 1 1 1 4"));
        let ini_file = config
            .launch_path
            .join("ini-eigs/cnfg21/eigs_cfg21.ini.xml");
        assert!(sh.contains(&format!("-i {} ", ini_file)));
    }

    fn section<'a>(xml: &'a str, tag: &str) -> &'a str {
        let open = format!("<{}>", tag);
        let start = xml.find(&open).unwrap() + open.len();
        let end = xml.find(&format!("</{}>", tag)).unwrap();
        &xml[start..end]
    }

    #[test]
    fn test_generate_every_task() {
        let (_temp, config) = setup(MEASUREMENTS);
        let config = EnsembleConfig {
            cfg_f: 21,
            ..config
        };
        let renderer = Renderer::builtin().unwrap();
        let peram_mg = Task::Peram {
            inverter: Inverter::Multigrid,
            flavor: Flavor::Light,
        };
        let peram_clover = Task::Peram {
            inverter: Inverter::Clover,
            flavor: Flavor::Strange,
        };
        let tasks = [
            Task::Eigs,
            peram_mg,
            peram_clover,
            Task::Meson,
            Task::Meson2,
            Task::Disco,
        ];
        let summary = generate(&config, &renderer, &tasks, GenerateOptions::default()).unwrap();
        assert_eq!(summary.written.len(), 12);
        let read = |rel: &str| std::fs::read_to_string(config.launch_path.join(rel)).unwrap();

        let mg = read("ini-perams/cnfg11/peram_mg_light_cfg11.ini.xml");
        assert!(mg.contains("<invType>MGPROTON</invType>"));
        assert!(!mg.contains("BICGSTAB_INVERTER"));
        assert!(mg.contains("<mass_label>U-0.044</mass_label>"));
        assert!(mg.contains("<Mass>-0.044</Mass>"));
        assert!(mg.contains("<t_sources>0 16 32 48</t_sources>"));
        let mg_file = config.data_path.join("perams_sdb/peram_64_cfg11.sdb");
        assert!(mg.contains(&format!("<prop_op_file>{}</prop_op_file>", mg_file)));

        let clover = read("ini-perams-strange/cnfg11/peram_clover_strange_cfg11.ini.xml");
        assert!(clover.contains("<invType>BICGSTAB_INVERTER</invType>"));
        assert!(clover.contains("<RsdBiCGStab>1e-8</RsdBiCGStab>"));
        assert!(!clover.contains("MGPROTON"));
        assert!(clover.contains("<mass_label>S-0.007</mass_label>"));
        assert!(clover.contains("<t_sources>0 16 32 48</t_sources>"));
        let clover_file = config
            .data_path
            .join("perams_strange_sdb/peram_strange_clover_64_cfg11.sdb");
        assert!(clover.contains(&format!("<prop_op_file>{}</prop_op_file>", clover_file)));

        let meson = read("ini-meson/cnfg11/meson_cfg11.ini.xml");
        assert_eq!(section(&meson, "mom_list").matches("<elem>").count(), 19);
        let meson2 = read("ini-meson2/cnfg11/meson2_cfg11.ini.xml");
        let window = section(&meson2, "mom_list");
        assert_eq!(window.matches("<elem>").count(), 6);
        assert!(!window.contains("<elem>0 0 0</elem>"));
        assert!(meson2.contains("meson2_sdb/meson2-64_cfg11.sdb"));

        let disco = read("ini-disco/cnfg11/disco_cfg11.ini.xml");
        assert!(disco.contains("<num_color_parts>13</num_color_parts>"));
        assert!(disco.contains("<t_sources>0 1 2 3 "));
        assert!(disco.contains("<Mass>-0.044</Mass>"));
        assert!(disco.contains("disco_sdb/disco_cfg11.sdb"));

        for (script, ranks, geom) in [
            ("ini-eigs/cnfg11/eigs_cfg11.sh", 4, "1 1 1 4"),
            ("ini-perams/cnfg11/peram_mg_light_cfg11.sh", 8, "1 1 2 2"),
            ("ini-perams-strange/cnfg11/peram_clover_strange_cfg11.sh", 8, "1 1 2 2"),
            ("ini-meson/cnfg11/meson_cfg11.sh", 2, "1 1 1 2"),
            ("ini-meson2/cnfg11/meson2_cfg11.sh", 2, "1 1 1 2"),
            ("ini-disco/cnfg11/disco_cfg11.sh", 16, "2 2 2 2"),
        ] {
            let sh = read(script);
            assert!(sh.contains(&format!("srun -n {} ", ranks)), "{}", script);
            assert!(sh.contains(&format!("-geom {} ", geom)), "{}", script);
        }
    }

    #[test]
    fn test_existing_files_are_skipped_unless_overwrite() {
        let (_temp, config) = setup("");
        let renderer = Renderer::builtin().unwrap();
        generate(&config, &renderer, EIGS, GenerateOptions::default()).unwrap();

        let again = generate(&config, &renderer, EIGS, GenerateOptions::default()).unwrap();
        assert!(again.written.is_empty());
        assert_eq!(again.skipped.len(), 4);

        let overwrite = GenerateOptions { overwrite: true };
        let forced = generate(&config, &renderer, EIGS, overwrite);
        assert_eq!(forced.unwrap().written.len(), 4);
    }

    #[test]
    fn test_missing_template_parameter_fails() {
        let (_temp, config) = setup("");
        let renderer = Renderer::builtin().unwrap();
        let defaults = GenerateOptions::default();
        let err = generate(&config, &renderer, &[Task::Disco], defaults).unwrap_err();
        assert!(matches!(err, TaskError::Render(RenderError::MissingParameter { .. })));
    }

    #[test]
    fn test_empty_range_writes_nothing() {
        let (_temp, config) = setup("");
        let config = EnsembleConfig {
            cfg_f: config.cfg_i,
            ..config
        };
        let renderer = Renderer::builtin().unwrap();
        let summary = generate(&config, &renderer, EIGS, GenerateOptions::default()).unwrap();
        assert_eq!(summary, GenerateSummary::default());
    }
}
