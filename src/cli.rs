use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::LATEST_FILE;

#[derive(Parser, Debug)]
#[command(
    name = "benchgate",
    version,
    about = "Benchmark baseline vs enhanced pipeline variants and gate CI on speedup regressions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Gate(GateArgs),
    Manifest(ManifestArgs),
    Latest(LatestArgs),
    Trend(TrendArgs),
    Summarize(SummarizeArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GateArgs {
    #[arg(long)]
    pub images: PathBuf,

    #[arg(long, default_value = "benchmark")]
    pub identity: String,

    #[arg(long, default_value_t = 3)]
    pub repeat: usize,

    #[arg(long, default_value_t = false)]
    pub scope_restricted: bool,

    #[arg(long, default_value_t = false)]
    pub no_reverse_lookup: bool,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, default_value = "exports")]
    pub export_root: PathBuf,

    #[arg(long)]
    pub history_path: Option<PathBuf>,

    #[arg(long, default_value = LATEST_FILE)]
    pub latest_path: PathBuf,

    #[arg(long, default_value_t = false)]
    pub skip_latest: bool,

    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    #[arg(long)]
    pub min_speedup: Option<f64>,

    #[arg(long, default_value_t = false)]
    pub allow_regression: bool,

    #[arg(long)]
    pub pipeline_program: PathBuf,

    #[arg(long = "pipeline-arg", allow_hyphen_values = true)]
    pub pipeline_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ManifestArgs {
    #[arg(long)]
    pub run_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct LatestArgs {
    #[arg(long, default_value = "exports")]
    pub export_root: PathBuf,

    #[arg(long, default_value = LATEST_FILE)]
    pub latest_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct TrendArgs {
    #[arg(long, default_value = "exports")]
    pub export_root: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, default_value = "category")]
    pub category_field: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "exports")]
    pub export_root: PathBuf,

    #[arg(long, default_value = LATEST_FILE)]
    pub latest_path: PathBuf,
}
