use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ecotune",
    version,
    about = "Search predator/prey ecosystem parameters for long-lived, balanced populations"
)]
pub struct Cli {
    /// Default tracing directive when RUST_LOG is unset (e.g. info, debug, ecotune_sim=trace).
    #[arg(long, global = true, env = "ECOTUNE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the evolution-strategy search and write the best configuration.
    Optimize(OptimizeArgs),
    /// Run one headless episode and write its telemetry.
    Run(RunArgs),
    /// List the searchable parameters and the locked fields.
    Params,
}

#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    /// Base configuration JSON (defaults when omitted).
    #[arg(long, env = "ECOTUNE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tick cap per episode.
    #[arg(long, env = "ECOTUNE_MAX_TICKS", default_value_t = 3_000_000)]
    pub max_ticks: u64,

    /// Episodes per evaluation; seed i is i*1000+42.
    #[arg(long, env = "ECOTUNE_SEEDS", default_value_t = 3)]
    pub seeds: usize,

    /// Evaluation budget.
    #[arg(long, env = "ECOTUNE_MAX_EVALS", default_value_t = 200)]
    pub max_evals: usize,

    /// Candidates per generation (0 = 4 + floor(3 ln n)).
    #[arg(long, env = "ECOTUNE_POPULATION", default_value_t = 0)]
    pub population: usize,

    /// Directory for optimize_log.csv, best_config.json, and hall_of_fame.json.
    #[arg(long, env = "ECOTUNE_OUTPUT")]
    pub output: PathBuf,

    /// Initial step size in normalized coordinates.
    #[arg(long, env = "ECOTUNE_SIGMA", default_value_t = 0.3)]
    pub sigma: f64,

    /// Seed for the search's own sampling.
    #[arg(long, env = "ECOTUNE_SEARCH_SEED", default_value_t = 1)]
    pub search_seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration JSON (defaults when omitted).
    #[arg(long, env = "ECOTUNE_CONFIG")]
    pub config: Option<PathBuf>,

    /// World seed; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this many ticks.
    #[arg(long, default_value_t = 36_000)]
    pub max_ticks: u64,

    /// Directory for telemetry.csv, bookmarks.csv, config.json, and hall_of_fame.json.
    #[arg(long)]
    pub output: PathBuf,

    /// Archived hall of fame used to reseed collapsing populations.
    #[arg(long)]
    pub hall_of_fame: Option<PathBuf>,
}
