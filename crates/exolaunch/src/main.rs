//! exolaunch - Chroma input and Slurm script generator for lattice QCD ensembles.

mod logging;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use exolaunch_audit::{AuditKind, AuditOptions, ReportStore, audit, parse_kinds};
use exolaunch_cli::{
    AuditArgs, BinnedArgs, CleanArgs, Cli, Command, ContractionsArgs, EnsembleArgs, GenerateArgs,
    InspectArgs, SourceArgs,
};
use exolaunch_core::{EnsembleConfig, discover, ensemble_params};
use exolaunch_inspect::{
    InspectError, LoadOptions, config_average, fold, load_operators, plot_correlator,
};
use exolaunch_parsers::EnsembleRegistry;
use exolaunch_render::Renderer;
use exolaunch_tasks::{
    BinnedOptions, CleanKind, ContractionsConfig, GenerateOptions, GenerateSummary, clean, generate,
    generate_binned, generate_contractions, parse_tasks,
};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde_yaml::Value;

fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Binned(args) => run_binned(args),
        Command::Contractions(args) => run_contractions(args),
        Command::Clean(args) => run_clean(args),
        Command::Audit(args) => run_audit(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Ensemble(args) => run_ensemble(args),
    }
}

fn renderer(templates: Option<&Utf8Path>) -> Result<Renderer> {
    match templates {
        Some(dir) => Renderer::with_overrides(dir),
        None => Renderer::builtin(),
    }
    .into_diagnostic()
}

/// Expand directories to the ensemble files they contain.
fn load_configs(source: &SourceArgs) -> Result<Vec<EnsembleConfig>> {
    let mut files = Vec::new();
    for path in &source.configs {
        if path.is_dir() {
            files.extend(discover(path).into_diagnostic()?);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        miette::bail!("no ensemble files found");
    }

    files
        .iter()
        .map(|path| {
            EnsembleConfig::load(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("loading {}", path))
        })
        .collect()
}

fn report(summary: &GenerateSummary) {
    println!(
        "Wrote {} files, skipped {} existing",
        summary.written.len(),
        summary.skipped.len()
    );
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let renderer = renderer(args.source.templates.as_deref())?;
    let tasks = parse_tasks(&args.tasks).into_diagnostic()?;
    let options = GenerateOptions {
        overwrite: args.source.overwrite,
    };

    let mut total = GenerateSummary::default();
    for config in load_configs(&args.source)? {
        let summary = generate(&config, &renderer, &tasks, options)
            .into_diagnostic()
            .wrap_err_with(|| format!("generating {}", config.ens_short))?;
        total.extend(summary);
    }
    report(&total);
    Ok(())
}

fn run_binned(args: BinnedArgs) -> Result<()> {
    let renderer = renderer(args.source.templates.as_deref())?;
    let tasks = parse_tasks(&args.tasks).into_diagnostic()?;
    let options = BinnedOptions {
        group_size: args.group_size,
        devices: args.devices,
        num_vecs: args.num_vecs,
        overwrite: args.source.overwrite,
    };

    let mut total = GenerateSummary::default();
    for config in load_configs(&args.source)? {
        let summary = generate_binned(&config, &renderer, &tasks, &options)
            .into_diagnostic()
            .wrap_err_with(|| format!("generating binned scripts for {}", config.ens_short))?;
        total.extend(summary);
    }
    report(&total);
    Ok(())
}

fn run_contractions(args: ContractionsArgs) -> Result<()> {
    let renderer = renderer(args.templates.as_deref())?;
    let config = ContractionsConfig::load(&args.input).into_diagnostic()?;
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let path = generate_contractions(&config, &renderer, &args.out_dir, date, args.overwrite)
        .into_diagnostic()?;
    println!("{}", path);
    Ok(())
}

fn run_clean(args: CleanArgs) -> Result<()> {
    let kind: CleanKind = args.kind.parse().into_diagnostic()?;
    let removed = clean(kind, &args.base).into_diagnostic()?;
    println!("Removed {} {} files", removed.len(), kind.prefix());
    Ok(())
}

fn run_audit(args: AuditArgs) -> Result<()> {
    let (data_path, cfgs) = match &args.config {
        Some(path) => {
            let config = EnsembleConfig::load(path).into_diagnostic()?;
            (
                args.data_path.clone().unwrap_or(config.data_path.clone()),
                args.cfgs.unwrap_or(config.cfg_range()),
            )
        }
        None => match (args.data_path.clone(), args.cfgs) {
            (Some(data_path), Some(cfgs)) => (data_path, cfgs),
            _ => miette::bail!("--data-path and --cfgs are required without --config"),
        },
    };
    let kinds = parse_kinds(&args.kind).map_err(|e| miette::miette!("{}", e))?;

    let mut options = AuditOptions::new(data_path.clone(), args.num_vecs, cfgs);
    options.per_nvec_dirs = args.per_nvec_dirs;
    for (kind, dir) in [
        (AuditKind::Meson, args.meson_dir),
        (AuditKind::Peram, args.peram_dir),
        (AuditKind::PeramStrange, args.peram_strange_dir),
    ] {
        if let Some(dir) = dir {
            options.overrides.insert(kind, dir);
        }
    }

    let report = audit(&kinds, &options);
    if args.json {
        println!("{}", report.to_json().into_diagnostic()?);
    } else {
        print!("{}", report.to_text());
    }

    if args.save {
        let store = ReportStore::new(&data_path);
        if let Some(previous) = store.load().into_diagnostic()? {
            tracing::info!(
                "Previous audit at {}: {} missing, now {}",
                previous.generated_at,
                previous.missing_count(),
                report.missing_count()
            );
        }
        store.save(&report).into_diagnostic()?;
        tracing::info!("Saved report to {}", store.path());
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let options = LoadOptions {
        channel: args.channel,
        tsrc_spacing: args.tsrc_spacing,
    };
    let mut operators = load_operators(&args.file, &options)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", args.file))?;

    let selected = match args.operator {
        Some(op) => {
            let data = operators
                .remove(&op)
                .ok_or_else(|| InspectError::UnknownOperator(op.clone()))
                .into_diagnostic()?;
            vec![(op, data)]
        }
        None => operators.into_iter().collect(),
    };

    if let Some(dir) = &args.plot_dir {
        std::fs::create_dir_all(dir).into_diagnostic()?;
    }

    for (op, data) in selected {
        let data = if args.fold {
            fold(&data).into_diagnostic()?
        } else {
            data
        };
        let avg = config_average(&data).into_diagnostic()?;

        println!("# {} ({} configurations)", op, data.nrows());
        for (t, value) in avg.iter().enumerate() {
            println!("{:>3} {:.8e}", t, value);
        }

        if let Some(dir) = &args.plot_dir {
            let path: Utf8PathBuf = dir.join(format!("{}.svg", op));
            plot_correlator(&path, &op, &avg).into_diagnostic()?;
        }
    }
    Ok(())
}

fn run_ensemble(args: EnsembleArgs) -> Result<()> {
    let registry = match &args.config {
        Some(path) => EnsembleConfig::load(path).into_diagnostic()?.registry(),
        None => EnsembleRegistry::new(),
    };
    let ensemble = registry.parse(&args.tag).into_diagnostic()?;

    let mut params = ensemble_params(&ensemble);
    if let Some(long_form) = registry.long_form(&args.tag) {
        params.insert("long_form".into(), Value::from(long_form));
    }
    let location = ensemble.gauge_location();
    params.insert("cfg_path".into(), Value::from(location.cfg_path));
    params.insert("cfg_name".into(), Value::from(location.cfg_name));

    let text = if args.json {
        serde_json::to_string_pretty(&params).into_diagnostic()?
    } else {
        serde_yaml::to_string(&params).into_diagnostic()?
    };
    println!("{}", text.trim_end());
    Ok(())
}
