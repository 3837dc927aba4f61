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
    author = "EssDyn Developers",
    version,
    about = "EssDyn CLI - Extracts the essential dynamics of a biomolecule from a molecular-dynamics trajectory: mass-weighted superposition, covariance accumulation, and ranked eigenpairs.",
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
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the dominant modes of motion from a trajectory.
    Analyze(AnalyzeArgs),
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    // --- Core Arguments ---
    /// Path to the trajectory CSV (one frame per row, coordinates interleaved
    /// as x1,y1,z1,x2,...).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub trajectory: PathBuf,

    /// Path to the per-atom masses CSV (one mass per row, topology order).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub masses: PathBuf,

    /// Optional reference structure CSV (a single frame row). Defaults to the
    /// first trajectory frame.
    #[arg(short, long, value_name = "PATH")]
    pub reference: Option<PathBuf>,

    // --- Outputs ---
    /// Output path for the ranked eigenvalues CSV.
    #[arg(long, value_name = "PATH", default_value = "eigenvalues.csv")]
    pub eigenvalues_out: PathBuf,

    /// Output path for the eigenvector matrix CSV (3N rows, one column per
    /// eigenpair, largest first).
    #[arg(long, value_name = "PATH", default_value = "eigenvectors.csv")]
    pub eigenvectors_out: PathBuf,

    /// Optional output path for the trajectory conformation closest to the
    /// average structure.
    #[arg(long, value_name = "PATH")]
    pub closest_out: Option<PathBuf>,

    // --- Tuning ---
    /// Number of eigenpairs to compute.
    #[arg(short = 'k', long, value_name = "NUM")]
    pub eigenpairs: Option<usize>,

    /// Free-memory budget for matrices and frame buffering, in mebibytes.
    #[arg(long, value_name = "MIB")]
    pub memory_budget_mib: Option<u64>,

    /// Continue past a failed memory admission check instead of aborting.
    #[arg(long)]
    pub memory_override: bool,

    /// Number of worker threads for the covariance reduction.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Directory for spill files. Defaults to a temporary directory removed
    /// on exit.
    #[arg(long, value_name = "PATH")]
    pub scratch_dir: Option<PathBuf>,

    /// Optional TOML configuration file; command-line flags take precedence
    /// over its values.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
