use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "AWSEM CLI - Evaluate the AWSEM coarse-grained backbone potential on protein structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate per-term energies and forces for every model of a PDB file.
    Evaluate(EvaluateArgs),
    /// Tabulate the fragment-memory library into fm_table.energy and fm_table.force.
    BuildTable(BuildTableArgs),
}

/// Input locations shared by every subcommand. Each one overrides the config file.
#[derive(Args, Debug, Clone)]
pub struct ParameterArgs {
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the coefficient file (e.g., fix_backbone_coeff.data).
    #[arg(long, value_name = "PATH")]
    pub coefficients: Option<PathBuf>,

    /// Override the sequence file.
    #[arg(long, value_name = "PATH")]
    pub sequence: Option<PathBuf>,

    /// Override the directory holding gamma.dat, burial_gamma.dat and the other fixed tables.
    #[arg(long, value_name = "DIR")]
    pub param_dir: Option<PathBuf>,

    /// Override the directory where fragment-memory table files are read and written.
    #[arg(long, value_name = "DIR")]
    pub table_dir: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S parameters.param-dir=params
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Path to the input structure (PDB with CA, CB and O atoms; one frame per MODEL).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    #[command(flatten)]
    pub parameters: ParameterArgs,

    /// Override the energy log path.
    #[arg(short = 'e', long, value_name = "PATH")]
    pub energy_log: Option<PathBuf>,

    /// Do not write an energy log, even if the config file names one.
    #[arg(long, conflicts_with = "energy_log")]
    pub no_energy_log: bool,
}

/// Arguments for the `build-table` subcommand.
#[derive(Args, Debug)]
pub struct BuildTableArgs {
    #[command(flatten)]
    pub parameters: ParameterArgs,
}
