//! Black-box minimizers driven by an ask/tell loop.

use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::warn;

pub const MIN_SIGMA: f64 = 1e-10;
pub const MAX_SIGMA: f64 = 10.0;
const MIN_VARIANCE: f64 = 1e-12;
const MAX_VARIANCE: f64 = 1e6;

/// Ask/tell interface for derivative-free minimization.
pub trait Minimizer {
    /// Sample the next generation.
    fn ask(&mut self) -> Vec<Vec<f64>>;

    /// Report fitness (lower is better) for candidates returned by [`ask`](Self::ask).
    fn tell(&mut self, candidates: &[Vec<f64>], fitness: &[f64]);

    /// Best candidate told so far.
    fn best(&self) -> Option<(Vec<f64>, f64)>;

    /// Candidates per generation.
    fn population_size(&self) -> usize;
}

/// `4 + floor(3 ln n)`, the usual offspring count for an `n`-dimensional problem.
#[must_use]
pub fn default_population(dimension: usize) -> usize {
    4 + (3.0 * (dimension.max(1) as f64).ln()).floor() as usize
}

/// Evolution strategy with a diagonal covariance and cumulative step-size adaptation.
#[derive(Debug, Clone)]
pub struct SeparableEs {
    mean: Vec<f64>,
    initial_mean: Vec<f64>,
    sigma: f64,
    initial_sigma: f64,
    /// Per-coordinate variances.
    variances: Vec<f64>,
    sigma_path: Vec<f64>,
    weights: Vec<f64>,
    lambda: usize,
    mu_eff: f64,
    c_sigma: f64,
    d_sigma: f64,
    c_diag: f64,
    chi_n: f64,
    generation: u64,
    best: Option<(Vec<f64>, f64)>,
    rng: SmallRng,
}

impl SeparableEs {
    #[must_use]
    pub fn new(mean: Vec<f64>, sigma: f64, seed: u64) -> Self {
        let lambda = default_population(mean.len());
        Self::build(mean, sigma, seed, lambda)
    }

    /// Override the offspring count; values below 2 are raised to 2.
    #[must_use]
    pub fn with_population(self, lambda: usize) -> Self {
        let seed_rng = self.rng;
        let mut rebuilt = Self::build(self.initial_mean, self.initial_sigma, 0, lambda.max(2));
        rebuilt.rng = seed_rng;
        rebuilt
    }

    fn build(mean: Vec<f64>, sigma: f64, seed: u64, lambda: usize) -> Self {
        let n = mean.len().max(1) as f64;
        let mu = (lambda / 2).max(1);
        let raw: Vec<f64> = (0..mu)
            .map(|i| (mu as f64 + 0.5).ln() - ((i + 1) as f64).ln())
            .collect();
        let total: f64 = raw.iter().sum();
        let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_sigma = (mu_eff + 2.0) / (n + mu_eff + 5.0);
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (n + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let c_diag = ((n + 2.0) / 3.0
            * (2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((n + 2.0).powi(2) + mu_eff)))
            .clamp(0.0, 1.0);
        let chi_n = n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n * n));
        let sigma = sanitize_sigma(sigma);

        Self {
            variances: vec![1.0; mean.len()],
            sigma_path: vec![0.0; mean.len()],
            initial_mean: mean.clone(),
            mean,
            sigma,
            initial_sigma: sigma,
            weights,
            lambda,
            mu_eff,
            c_sigma,
            d_sigma,
            c_diag,
            chi_n,
            generation: 0,
            best: None,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn mu_eff(&self) -> f64 {
        self.mu_eff
    }

    fn scale(&self, i: usize) -> f64 {
        self.sigma * self.variances[i].sqrt()
    }

    fn is_degenerate(&self) -> bool {
        !self.sigma.is_finite()
            || self.mean.iter().any(|v| !v.is_finite())
            || self.variances.iter().any(|v| !v.is_finite())
    }

    /// Restart from the best known point (or the initial mean) with the initial step size.
    fn reset(&mut self) {
        warn!(
            generation = self.generation,
            sigma = self.sigma,
            "minimizer state diverged; restarting"
        );
        self.mean = self
            .best
            .as_ref()
            .map_or_else(|| self.initial_mean.clone(), |(point, _)| point.clone());
        self.sigma = self.initial_sigma;
        self.variances.fill(1.0);
        self.sigma_path.fill(0.0);
    }
}

fn sanitize_sigma(sigma: f64) -> f64 {
    if sigma.is_finite() {
        sigma.clamp(MIN_SIGMA, MAX_SIGMA)
    } else {
        0.3
    }
}

/// NaN ranks last.
fn rank_key(fitness: f64) -> OrderedFloat<f64> {
    OrderedFloat(if fitness.is_nan() { f64::INFINITY } else { fitness })
}

impl Minimizer for SeparableEs {
    fn ask(&mut self) -> Vec<Vec<f64>> {
        if self.is_degenerate() {
            self.reset();
        }
        let scales: Vec<f64> = (0..self.mean.len()).map(|i| self.scale(i)).collect();
        let mean = &self.mean;
        let rng = &mut self.rng;
        (0..self.lambda)
            .map(|_| {
                mean.iter()
                    .zip(&scales)
                    .map(|(m, s)| {
                        let z: f64 = StandardNormal.sample(&mut *rng);
                        m + s * z
                    })
                    .collect()
            })
            .collect()
    }

    fn tell(&mut self, candidates: &[Vec<f64>], fitness: &[f64]) {
        let n = self.mean.len();
        if candidates.is_empty()
            || candidates.len() != fitness.len()
            || candidates.iter().any(|c| c.len() != n)
        {
            warn!(
                candidates = candidates.len(),
                fitness = fitness.len(),
                "ignoring malformed generation"
            );
            return;
        }

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by_key(|&k| rank_key(fitness[k]));

        let leader = order[0];
        if !fitness[leader].is_nan()
            && self
                .best
                .as_ref()
                .is_none_or(|(_, best)| fitness[leader] < *best)
        {
            self.best = Some((candidates[leader].clone(), fitness[leader]));
        }

        let scales: Vec<f64> = (0..n).map(|i| self.scale(i)).collect();
        let selected: Vec<(f64, &Vec<f64>)> = self
            .weights
            .iter()
            .zip(order.iter().map(|&k| &candidates[k]))
            .map(|(&w, c)| (w, c))
            .collect();
        let total_weight: f64 = selected.iter().map(|(w, _)| w).sum();

        let mut new_mean = vec![0.0; n];
        let mut z_weighted = vec![0.0; n];
        let mut z_sq_weighted = vec![0.0; n];
        for (w, candidate) in &selected {
            let w = w / total_weight;
            for i in 0..n {
                let z = (candidate[i] - self.mean[i]) / scales[i];
                new_mean[i] += w * candidate[i];
                z_weighted[i] += w * z;
                z_sq_weighted[i] += w * z * z;
            }
        }

        let path_gain = (self.c_sigma * (2.0 - self.c_sigma) * self.mu_eff).sqrt();
        for (p, z) in self.sigma_path.iter_mut().zip(&z_weighted) {
            *p = (1.0 - self.c_sigma) * *p + path_gain * z;
        }
        let path_norm = self.sigma_path.iter().map(|p| p * p).sum::<f64>().sqrt();
        self.sigma *= ((self.c_sigma / self.d_sigma) * (path_norm / self.chi_n - 1.0)).exp();
        self.sigma = self.sigma.clamp(MIN_SIGMA, MAX_SIGMA);

        for (variance, z_sq) in self.variances.iter_mut().zip(&z_sq_weighted) {
            *variance = ((1.0 - self.c_diag) * *variance + self.c_diag * *variance * z_sq)
                .clamp(MIN_VARIANCE, MAX_VARIANCE);
        }

        self.mean = new_mean;
        self.generation += 1;
        if self.is_degenerate() {
            self.reset();
        }
    }

    fn best(&self) -> Option<(Vec<f64>, f64)> {
        self.best.clone()
    }

    fn population_size(&self) -> usize {
        self.lambda
    }
}
