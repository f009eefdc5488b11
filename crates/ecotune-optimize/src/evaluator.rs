//! Scores a parameter vector by running one episode per seed and measuring survival.

use std::sync::mpsc;

use ecotune_core::episode::{Episode, EpisodeError, EpisodeFactory, StatsCallback};
use ecotune_core::kind::Kind;
use ecotune_core::params::{ParamError, ParameterSpace};
use ecotune_core::telemetry::{HallOfFame, WindowStats};
use ecotune_core::SimConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::quality::quality;
use crate::tracker::BestRunTracker;
use crate::OptimizeError;

/// Quality bonus scale: a perfect ecosystem adds 20% to survival.
pub const QUALITY_BONUS: f64 = 0.2;

/// Knobs for the episode loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSettings {
    /// Stats window forced onto every episode.
    pub stats_window_sec: f64,
    /// Extinction checks start after this much simulated time.
    pub warmup_sec: f64,
    /// Populations below this count are functionally extinct once the grace period elapses.
    pub min_viable_pop: usize,
    pub extinction_grace_sec: f64,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            stats_window_sec: 10.0,
            warmup_sec: 5.0,
            min_viable_pop: 3,
            extinction_grace_sec: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtinctionCause {
    /// The kind reached zero.
    Hard(Kind),
    /// The kind stayed below the viable population for the whole grace period.
    Functional(Kind),
}

impl ExtinctionCause {
    #[must_use]
    pub const fn kind(self) -> Kind {
        match self {
            Self::Hard(kind) | Self::Functional(kind) => kind,
        }
    }
}

/// Outcome of stepping one episode.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub survival_ticks: u64,
    /// `None` when the episode reached the tick cap.
    pub extinction: Option<ExtinctionCause>,
    pub windows: Vec<WindowStats>,
    pub hall_of_fame: HallOfFame,
}

#[derive(Debug, Clone)]
pub struct SeedResult {
    pub seed: u64,
    pub fitness: f64,
    pub quality: f64,
    pub survival_ticks: u64,
    pub extinction: Option<ExtinctionCause>,
    /// `None` when the episode could not be created.
    pub hall_of_fame: Option<HallOfFame>,
}

/// Aggregate over every seed of one evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Mean seed fitness; lower is better.
    pub fitness: f64,
    pub quality: f64,
    pub seeds: Vec<SeedResult>,
}

impl Evaluation {
    /// Seed with the lowest individual fitness; the first one wins ties.
    #[must_use]
    pub fn best_seed(&self) -> Option<&SeedResult> {
        self.seeds.iter().fold(None, |best: Option<&SeedResult>, seed| match best {
            Some(current) if current.fitness <= seed.fitness => Some(current),
            _ => Some(seed),
        })
    }

    /// Mean survival in seconds given the timestep.
    #[must_use]
    pub fn mean_survival_sec(&self, dt: f64) -> f64 {
        if self.seeds.is_empty() {
            return 0.0;
        }
        let ticks: u64 = self.seeds.iter().map(|seed| seed.survival_ticks).sum();
        ticks as f64 / self.seeds.len() as f64 * dt
    }
}

/// `-(survival_ticks * (1 + 0.2 * quality))`; lower is better.
#[must_use]
pub fn fitness(survival_ticks: u64, quality: f64) -> f64 {
    -(survival_ticks as f64 * (1.0 + QUALITY_BONUS * quality))
}

/// Seeds used by the command line: `i * 1000 + 42`.
#[must_use]
pub fn default_seeds(count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| i * 1000 + 42).collect()
}

pub struct FitnessEvaluator<F: EpisodeFactory> {
    factory: F,
    space: ParameterSpace,
    base: SimConfig,
    max_ticks: u64,
    seeds: Vec<u64>,
    settings: EvaluatorSettings,
    tracker: BestRunTracker,
}

impl<F: EpisodeFactory> std::fmt::Debug for FitnessEvaluator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitnessEvaluator")
            .field("dimension", &self.space.dimension())
            .field("max_ticks", &self.max_ticks)
            .field("seeds", &self.seeds)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<F: EpisodeFactory> FitnessEvaluator<F> {
    /// Validates the base config and the default episode config before any episode runs.
    pub fn new(
        factory: F,
        space: ParameterSpace,
        base: SimConfig,
        max_ticks: u64,
        seeds: Vec<u64>,
        settings: EvaluatorSettings,
    ) -> Result<Self, OptimizeError> {
        if seeds.is_empty() {
            return Err(OptimizeError::NoSeeds);
        }
        base.validate()?;
        space.validate()?;
        let tracker = BestRunTracker::spawn().map_err(OptimizeError::Tracker)?;
        let evaluator = Self {
            factory,
            space,
            base,
            max_ticks,
            seeds,
            settings,
            tracker,
        };
        evaluator
            .episode_config(&evaluator.space.default_vector())?
            .validate()?;
        Ok(evaluator)
    }

    #[must_use]
    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    #[must_use]
    pub fn base_config(&self) -> &SimConfig {
        &self.base
    }

    #[must_use]
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    #[must_use]
    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    /// Base config with `raw` applied, the evaluator's stats window, and population rescue off.
    pub fn episode_config(&self, raw: &[f64]) -> Result<SimConfig, ParamError> {
        let mut config = self.base.clone();
        self.space.apply_to_config(&mut config, raw)?;
        config.telemetry.stats_window_sec = self.settings.stats_window_sec;
        config.hall_of_fame.reseed_enabled = false;
        config.population.respawn_enabled = false;
        Ok(config)
    }

    /// Mean fitness over all seeds; lower is better. A vector of the wrong dimension scores 0,
    /// the same as an immediate extinction.
    pub fn evaluate(&self, raw: &[f64]) -> f64 {
        match self.evaluate_detailed(raw) {
            Ok(evaluation) => evaluation.fitness,
            Err(err) => {
                error!(%err, "evaluation rejected");
                0.0
            }
        }
    }

    /// Run every seed in parallel, aggregate, and offer the result to the best-run tracker.
    pub fn evaluate_detailed(&self, raw: &[f64]) -> Result<Evaluation, OptimizeError> {
        let config = self.episode_config(raw)?;

        let seeds: Vec<SeedResult> = self
            .seeds
            .par_iter()
            .map(|&seed| self.score_seed(seed, &config))
            .collect();

        let n = seeds.len() as f64;
        let evaluation = Evaluation {
            fitness: seeds.iter().map(|seed| seed.fitness).sum::<f64>() / n,
            quality: seeds.iter().map(|seed| seed.quality).sum::<f64>() / n,
            seeds,
        };

        let donor = evaluation
            .best_seed()
            .and_then(|seed| seed.hall_of_fame.clone());
        self.tracker
            .offer(evaluation.fitness, evaluation.quality, donor);
        Ok(evaluation)
    }

    fn score_seed(&self, seed: u64, config: &SimConfig) -> SeedResult {
        match self.run_seed(seed, config) {
            Ok(run) => {
                let quality = quality(&run.windows);
                let fitness = fitness(run.survival_ticks, quality);
                debug!(
                    seed,
                    survival_ticks = run.survival_ticks,
                    extinction = ?run.extinction,
                    windows = run.windows.len(),
                    quality,
                    fitness,
                    "episode finished"
                );
                SeedResult {
                    seed,
                    fitness,
                    quality,
                    survival_ticks: run.survival_ticks,
                    extinction: run.extinction,
                    hall_of_fame: Some(run.hall_of_fame),
                }
            }
            Err(err) => {
                warn!(seed, %err, "episode could not be created; scoring as immediate extinction");
                SeedResult {
                    seed,
                    fitness: 0.0,
                    quality: 0.0,
                    survival_ticks: 0,
                    extinction: None,
                    hall_of_fame: None,
                }
            }
        }
    }

    /// Step one episode until extinction or the tick cap.
    pub fn run_seed(&self, seed: u64, config: &SimConfig) -> Result<RunResult, EpisodeError> {
        let (tx, rx) = mpsc::channel::<WindowStats>();
        let on_stats: StatsCallback = Box::new(move |stats: &WindowStats| {
            let _ = tx.send(stats.clone());
        });
        let mut episode = self.factory.new_episode(seed, config, Some(on_stats))?;

        let warmup_ticks = config.ticks_for(self.settings.warmup_sec);
        let grace_ticks = config.ticks_for(self.settings.extinction_grace_sec);
        let min_viable = self.settings.min_viable_pop;
        // Consecutive checked ticks spent below the viable population, per kind.
        let mut below_ticks = [0_u64; 2];

        let mut survival_ticks = self.max_ticks;
        let mut extinction = None;
        while episode.tick() < self.max_ticks {
            episode.step();
            let tick = episode.tick();
            if tick < warmup_ticks {
                continue;
            }

            let counts = Kind::ALL.map(|kind| episode.population(kind));
            if let Some(kind) = Kind::ALL.into_iter().find(|kind| counts[kind.index()] == 0) {
                survival_ticks = tick;
                extinction = Some(ExtinctionCause::Hard(kind));
                break;
            }

            for kind in Kind::ALL {
                let below = &mut below_ticks[kind.index()];
                if counts[kind.index()] < min_viable {
                    *below += 1;
                } else {
                    *below = 0;
                }
            }
            let expired = Kind::ALL.into_iter().find(|kind| {
                let below = below_ticks[kind.index()];
                below > 0 && below >= grace_ticks
            });
            if let Some(kind) = expired {
                survival_ticks = tick;
                extinction = Some(ExtinctionCause::Functional(kind));
                break;
            }
        }

        let hall_of_fame = episode.hall_of_fame();
        drop(episode);
        let windows = rx.try_iter().collect();
        Ok(RunResult {
            survival_ticks,
            extinction,
            windows,
            hall_of_fame,
        })
    }

    /// Hall of fame donated by the best evaluation so far.
    #[must_use]
    pub fn best_hall_of_fame(&self) -> Option<HallOfFame> {
        self.tracker
            .snapshot()
            .and_then(|snapshot| snapshot.best_hall_of_fame)
    }

    /// Lowest mean fitness seen; infinite before the first evaluation.
    #[must_use]
    pub fn best_fitness(&self) -> f64 {
        self.tracker
            .snapshot()
            .map_or(f64::INFINITY, |snapshot| snapshot.best_fitness)
    }

    /// Mean quality of the most recent evaluation.
    #[must_use]
    pub fn last_quality(&self) -> f64 {
        self.tracker
            .snapshot()
            .map_or(0.0, |snapshot| snapshot.last_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fitness_rewards_survival_then_quality() {
        assert_eq!(fitness(0, 1.0), 0.0);
        assert_eq!(fitness(1000, 0.0), -1000.0);
        assert!((fitness(1000, 1.0) + 1200.0).abs() < 1e-9);
        assert!(fitness(2000, 0.0) < fitness(1000, 1.0));
    }

    #[test]
    fn default_seeds_follow_cli_schedule() {
        assert_eq!(default_seeds(3), vec![42, 1042, 2042]);
        assert!(default_seeds(0).is_empty());
    }

    #[test]
    fn best_seed_prefers_first_on_tie() {
        let seed = |seed, fitness| SeedResult {
            seed,
            fitness,
            quality: 0.0,
            survival_ticks: 0,
            extinction: None,
            hall_of_fame: None,
        };
        let evaluation = Evaluation {
            fitness: 0.0,
            quality: 0.0,
            seeds: vec![seed(1, -5.0), seed(2, -9.0), seed(3, -9.0)],
        };
        assert_eq!(evaluation.best_seed().map(|s| s.seed), Some(2));
    }
}
