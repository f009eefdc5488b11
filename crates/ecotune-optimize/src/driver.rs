//! Sequential optimization loop: ask the minimizer, evaluate, log, and persist the incumbent.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ecotune_core::episode::EpisodeFactory;
use ecotune_core::SimConfig;
use tracing::{error, info, warn};

use crate::artifacts::{self, EVAL_LOG_FILE, EvalLog, format_duration};
use crate::evaluator::{FitnessEvaluator, QUALITY_BONUS};
use crate::minimizer::Minimizer;
use crate::OptimizeError;

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub evaluations: usize,
    /// `f64::INFINITY` when nothing was evaluated.
    pub best_fitness: f64,
    /// Raw (clamped) parameter values.
    pub best_params: Vec<f64>,
    pub best_config: SimConfig,
    pub elapsed: Duration,
    pub best_config_path: Option<PathBuf>,
    pub hall_of_fame_path: Option<PathBuf>,
}

pub struct OptimizationDriver<F: EpisodeFactory> {
    evaluator: FitnessEvaluator<F>,
    max_evals: usize,
    output_dir: PathBuf,
}

impl<F: EpisodeFactory> OptimizationDriver<F> {
    #[must_use]
    pub fn new(evaluator: FitnessEvaluator<F>, max_evals: usize, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            evaluator,
            max_evals,
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn evaluator(&self) -> &FitnessEvaluator<F> {
        &self.evaluator
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Normalized default vector; the usual starting mean for a minimizer.
    pub fn initial_point(&self) -> Result<Vec<f64>, OptimizeError> {
        let space = self.evaluator.space();
        Ok(space.normalize(&space.default_vector())?)
    }

    /// Run until `max_evals` evaluations. Candidates are normalized coordinates; only full
    /// generations are reported back to the minimizer.
    pub fn run<M: Minimizer>(&mut self, minimizer: &mut M) -> Result<OptimizationOutcome, OptimizeError> {
        fs::create_dir_all(&self.output_dir).map_err(artifacts::ArtifactError::from)?;
        let space = self.evaluator.space().clone();
        let mut log = EvalLog::create(self.output_dir.join(EVAL_LOG_FILE), space.names())?;
        let dt = self.evaluator.base_config().physics.dt;

        info!(
            dimension = space.dimension(),
            population = minimizer.population_size(),
            max_evals = self.max_evals,
            seeds = self.evaluator.seeds().len(),
            max_ticks = self.evaluator.max_ticks(),
            output = %self.output_dir.display(),
            "starting optimization"
        );

        let start = Instant::now();
        let mut evaluations = 0usize;
        let mut incumbent: Option<(Vec<f64>, f64)> = None;

        while evaluations < self.max_evals {
            let candidates = minimizer.ask();
            if candidates.is_empty() {
                warn!("minimizer produced an empty generation; stopping");
                break;
            }
            let mut fitness = Vec::with_capacity(candidates.len());
            for candidate in &candidates {
                if evaluations >= self.max_evals {
                    break;
                }
                let raw = space.clamp(&space.denormalize(candidate)?)?;
                let value = self.evaluator.evaluate(&raw);
                evaluations += 1;
                fitness.push(value);

                if incumbent.as_ref().is_none_or(|(_, best)| value < *best) {
                    incumbent = Some((raw.clone(), value));
                }
                if let Err(err) = log.append(evaluations, value, &raw) {
                    error!(%err, eval = evaluations, "failed to append evaluation log row");
                }

                let best = incumbent.as_ref().map_or(value, |(_, best)| *best);
                let quality = self.evaluator.last_quality();
                let survival_sec = -value / (1.0 + QUALITY_BONUS * quality) * dt;
                let elapsed = start.elapsed();
                let remaining = elapsed.div_f64(evaluations as f64)
                    * (self.max_evals - evaluations) as u32;
                info!(
                    eval = evaluations,
                    max_evals = self.max_evals,
                    survived_sec = survival_sec.round(),
                    quality = %format!("{quality:.2}"),
                    best = best.round(),
                    elapsed = %format_duration(elapsed),
                    eta = %format_duration(remaining),
                    "evaluation complete"
                );
            }
            if fitness.len() == candidates.len() {
                minimizer.tell(&candidates, &fitness);
            }
        }

        let (best_params, best_fitness) = match incumbent {
            Some(best) => best,
            None => match minimizer.best() {
                Some((point, value)) => (space.clamp(&space.denormalize(&point)?)?, value),
                None => (space.default_vector(), f64::INFINITY),
            },
        };

        let mut best_config = self.evaluator.base_config().clone();
        space.apply_to_config(&mut best_config, &best_params)?;

        let best_config_path = match artifacts::write_best_config(&self.output_dir, &best_config) {
            Ok(path) => Some(path),
            Err(err) => {
                error!(%err, "failed to write best config");
                None
            }
        };
        let hall_of_fame_path = match self.evaluator.best_hall_of_fame() {
            Some(hall) => match artifacts::write_hall_of_fame(&self.output_dir, &hall) {
                Ok(path) => Some(path),
                Err(err) => {
                    error!(%err, "failed to write hall of fame");
                    None
                }
            },
            None => None,
        };

        let elapsed = start.elapsed();
        info!(
            evaluations,
            best_fitness,
            elapsed = %format_duration(elapsed),
            "optimization complete"
        );
        for (name, value) in space.names().zip(&best_params) {
            info!(param = name, value = %format!("{value:.6}"), "best parameter");
        }

        Ok(OptimizationOutcome {
            evaluations,
            best_fitness,
            best_params,
            best_config,
            elapsed,
            best_config_path,
            hall_of_fame_path,
        })
    }
}
