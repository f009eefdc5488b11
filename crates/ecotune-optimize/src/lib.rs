//! Parameter search for ecotune ecosystems.
//!
//! A [`FitnessEvaluator`] turns a raw parameter vector into a scalar fitness by running one
//! episode per seed through any [`EpisodeFactory`](ecotune_core::EpisodeFactory). The
//! [`OptimizationDriver`] feeds a [`Minimizer`] from that evaluator and writes the run's
//! artifacts. The best evaluation seen so far lives on a [`BestRunTracker`] worker thread.

pub mod artifacts;
pub mod driver;
pub mod evaluator;
pub mod minimizer;
pub mod quality;
pub mod tracker;

use ecotune_core::{ConfigError, ParamError};
use thiserror::Error;

pub use artifacts::{ArtifactError, BEST_CONFIG_FILE, EVAL_LOG_FILE, EvalLog, format_duration};
pub use driver::{OptimizationDriver, OptimizationOutcome};
pub use evaluator::{
    Evaluation, EvaluatorSettings, ExtinctionCause, FitnessEvaluator, RunResult, SeedResult,
    default_seeds, fitness,
};
pub use minimizer::{Minimizer, SeparableEs, default_population};
pub use quality::{QualityBreakdown, quality};
pub use tracker::{BestRunTracker, TrackerSnapshot};

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("at least one evaluation seed is required")]
    NoSeeds,
    #[error("failed to spawn best-run tracker: {0}")]
    Tracker(#[source] std::io::Error),
}
