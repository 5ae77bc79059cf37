use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::evaluation::DEFAULT_WORKERS;

pub const DEFAULT_CACHE_ROOT: &str = ".cache/docrank";

#[derive(Parser, Debug)]
#[command(
    name = "docrank",
    version,
    about = "Fused document retrieval with gated weight tuning"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank chunks for one query.
    Query(QueryArgs),
    /// Run the evaluation set through the pipeline and gate the result.
    Evaluate(EvaluateArgs),
    /// Grid-search weights and optionally apply the winner.
    Tune(TuneArgs),
    /// Merge a weight patch into the configuration artifact.
    Apply(ApplyArgs),
    Status(StatusArgs),
}

/// Locations shared by every command; all default under `--cache-root`.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub config_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    #[arg(long = "cases")]
    pub cases_path: PathBuf,

    #[arg(long = "gold")]
    pub gold_path: Option<PathBuf>,

    #[arg(long = "legacy-gold")]
    pub legacy_gold_path: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub query: String,

    #[arg(long)]
    pub tag: Option<String>,

    /// Overrides the tag's shortlist size.
    #[arg(long)]
    pub shortlist: Option<usize>,

    /// Overrides the tag's final result count.
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long)]
    pub baseline_path: Option<PathBuf>,

    /// Write the result as the new baseline when the gate passes.
    #[arg(long, default_value_t = false)]
    pub promote_baseline: bool,

    #[arg(long)]
    pub min_micro: Option<f64>,

    #[arg(long)]
    pub min_tag: Option<f64>,

    #[arg(long)]
    pub max_regression: Option<f64>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TuneArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// YAML or JSON mapping of parameter name to candidate values.
    #[arg(long)]
    pub grid_path: Option<PathBuf>,

    /// `name=v1,v2,...`; may be repeated.
    #[arg(long = "param")]
    pub params: Vec<String>,

    #[arg(long)]
    pub tag: Option<String>,

    #[arg(long, default_value_t = 0.0)]
    pub min_delta: f64,

    #[arg(long, default_value_t = 0.0)]
    pub min_tag_hit: f64,

    #[arg(long, default_value_t = false)]
    pub apply: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// YAML or JSON weight patch, e.g. `{w_vec: 1.2, per_file_cap: 1}`.
    #[arg(long)]
    pub weights_path: PathBuf,

    #[arg(long)]
    pub tag: Option<String>,

    #[arg(long, default_value_t = 0.0)]
    pub min_delta: f64,

    #[arg(long)]
    pub baseline_score: f64,

    #[arg(long)]
    pub candidate_score: f64,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub baseline_path: Option<PathBuf>,
}
