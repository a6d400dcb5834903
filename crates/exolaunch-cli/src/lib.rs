//! CLI argument parsing for exolaunch.

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use exolaunch_parsers::CfgRange;

#[derive(Parser, Debug)]
#[command(name = "exolaunch")]
#[command(about = "Generate Chroma inputs and Slurm scripts for lattice QCD ensembles")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write per-configuration Chroma inputs and Slurm scripts
    Generate(GenerateArgs),

    /// Write multi-GPU scripts running several configurations each
    Binned(BinnedArgs),

    /// Write the Slurm array script for the contraction step
    Contractions(ContractionsArgs),

    /// Remove generated inputs and scripts of one kind
    Clean(CleanArgs),

    /// List missing SDB and HDF5 output files
    Audit(AuditArgs),

    /// Average, fold and plot correlators from an HDF5 file
    Inspect(InspectArgs),

    /// Print the parameters decoded from an ensemble tag
    Ensemble(EnsembleArgs),
}

/// Ensemble files and templates shared by the generating commands.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Ensemble YAML files, or directories searched for them
    #[arg(required = true)]
    pub configs: Vec<Utf8PathBuf>,

    /// Directory of `<id>.j2` templates overriding the builtin ones
    #[arg(long)]
    pub templates: Option<Utf8PathBuf>,

    /// Replace files that already exist
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Tasks to generate (eigs, peram_<mg|clover>_<flavor>, meson, meson2, disco)
    #[arg(long, short, value_delimiter = ',', default_value = "eigs,peram_mg_light,meson")]
    pub tasks: Vec<String>,
}

#[derive(Args, Debug)]
pub struct BinnedArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Tasks to generate (peram_* or meson)
    #[arg(long, short, value_delimiter = ',', default_value = "meson")]
    pub tasks: Vec<String>,

    /// Eigenvector counts, one script set each
    #[arg(long, value_delimiter = ',', required = true)]
    pub num_vecs: Vec<u32>,

    /// Configurations per script
    #[arg(long, default_value = "4")]
    pub group_size: usize,

    /// GPU indices assigned to the configurations of a group
    #[arg(long, value_delimiter = ',', default_value = "0,1,2,3")]
    pub devices: Vec<u32>,
}

#[derive(Args, Debug)]
pub struct ContractionsArgs {
    /// Contraction YAML with slurm, environment and parameters sections
    pub input: Utf8PathBuf,

    /// Directory receiving `run_<ens>/`
    #[arg(long, default_value = ".")]
    pub out_dir: Utf8PathBuf,

    /// Date used in the script name (YYYY-MM-DD, default today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Directory of `<id>.j2` templates overriding the builtin ones
    #[arg(long)]
    pub templates: Option<Utf8PathBuf>,

    /// Replace the script if it exists
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// File kind (eigs, peram, peramclov, meson, meson2, disco)
    pub kind: String,

    /// Directory holding the `cnfg*` directories
    #[arg(long, default_value = ".")]
    pub base: Utf8PathBuf,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Ensemble YAML supplying the data path and configuration range
    #[arg(long, required_unless_present_all = ["data_path", "cfgs"])]
    pub config: Option<Utf8PathBuf>,

    /// Root of the output tree
    #[arg(long)]
    pub data_path: Option<Utf8PathBuf>,

    /// Configuration ids as start:end[:step] (end excluded)
    #[arg(long)]
    pub cfgs: Option<CfgRange>,

    /// Eigenvector counts to check
    #[arg(long, value_delimiter = ',', required = true)]
    pub num_vecs: Vec<u32>,

    /// File type (meson, peram, peram_strange or all)
    #[arg(long = "type", default_value = "all")]
    pub kind: String,

    /// Files are stored under `numvec<n>/` subdirectories
    #[arg(long)]
    pub per_nvec_dirs: bool,

    /// Directory of meson files
    #[arg(long)]
    pub meson_dir: Option<Utf8PathBuf>,

    /// Directory of light perambulator files
    #[arg(long)]
    pub peram_dir: Option<Utf8PathBuf>,

    /// Directory of strange perambulator files
    #[arg(long)]
    pub peram_strange_dir: Option<Utf8PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Keep the report in `<data path>/.exolaunch/audit.json`
    #[arg(long)]
    pub save: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Correlator file
    pub file: Utf8PathBuf,

    /// Operator to show (default: all)
    #[arg(long)]
    pub operator: Option<String>,

    /// Channel group under each operator
    #[arg(long, default_value = "meson1_light_light")]
    pub channel: String,

    /// Time slices between source positions
    #[arg(long, default_value = "4")]
    pub tsrc_spacing: usize,

    /// Fold the correlator about Lt/2
    #[arg(long)]
    pub fold: bool,

    /// Directory receiving one `<operator>.svg` plot per operator
    #[arg(long)]
    pub plot_dir: Option<Utf8PathBuf>,
}

#[derive(Args, Debug)]
pub struct EnsembleArgs {
    /// Short ensemble tag, e.g. a085m300
    pub tag: String,

    /// Ensemble YAML whose `ensembles:` mapping extends the builtin tags
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,

    /// Print JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}
