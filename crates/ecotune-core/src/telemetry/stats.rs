//! Per-window statistics record and the distribution helpers used to build it.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Aggregated statistics for one fixed-duration window of simulated time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub window_start_tick: u64,
    pub window_end_tick: u64,
    pub sim_time_sec: f64,

    pub prey_count: usize,
    pub pred_count: usize,

    pub prey_births: u32,
    pub pred_births: u32,
    pub prey_deaths: u32,
    pub pred_deaths: u32,

    pub bites_attempted: u32,
    pub bites_hit: u32,
    pub kills: u32,
    pub bites_blocked_digest: u32,
    pub bites_missed_refugia: u32,
    pub hit_rate: f64,
    pub kill_rate: f64,

    pub prey_energy_mean: f64,
    pub prey_energy_p10: f64,
    pub prey_energy_p50: f64,
    pub prey_energy_p90: f64,

    pub pred_energy_mean: f64,
    pub pred_energy_p10: f64,
    pub pred_energy_p50: f64,
    pub pred_energy_p90: f64,

    /// Mean resource level under prey positions at window end.
    pub mean_resource_at_prey: f64,

    pub total_resource: f64,
    pub total_detritus: f64,
    pub total_organisms: f64,
    pub heat_loss_accum: f64,
    pub energy_input: f64,

    pub diet_mean: f64,
    pub diet_std: f64,
    pub diet_p10: f64,
    pub diet_p50: f64,
    pub diet_p90: f64,

    pub active_clades: usize,
}

impl WindowStats {
    /// Emit the headline fields as one structured `info` event.
    pub fn log(&self) {
        info!(
            window_end = self.window_end_tick,
            sim_time = self.sim_time_sec,
            prey = self.prey_count,
            pred = self.pred_count,
            prey_births = self.prey_births,
            pred_births = self.pred_births,
            prey_deaths = self.prey_deaths,
            pred_deaths = self.pred_deaths,
            bites_attempted = self.bites_attempted,
            bites_hit = self.bites_hit,
            kills = self.kills,
            hit_rate = self.hit_rate,
            kill_rate = self.kill_rate,
            prey_energy_p50 = self.prey_energy_p50,
            pred_energy_p50 = self.pred_energy_p50,
            resource_util = self.mean_resource_at_prey,
            active_clades = self.active_clades,
            "stats",
        );
    }
}

/// Linearly interpolated percentile of an ascending slice; `p` is clamped to `[0, 1]`.
///
/// Returns 0 for an empty slice.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 1.0 {
        return sorted[n - 1];
    }

    let idx = p * (n - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = lo + 1;
    if hi >= n {
        return sorted[n - 1];
    }
    let frac = idx - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Energy distribution summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergySummary {
    pub mean: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

/// Mean and p10/p50/p90 of `values` (all zero when empty).
#[must_use]
pub fn energy_summary(values: &[f64]) -> EnergySummary {
    if values.is_empty() {
        return EnergySummary::default();
    }
    let sorted = sorted_copy(values);
    EnergySummary {
        mean: mean(values),
        p10: percentile(&sorted, 0.10),
        p50: percentile(&sorted, 0.50),
        p90: percentile(&sorted, 0.90),
    }
}

/// Diet distribution summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DietSummary {
    pub mean: f64,
    pub std: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

/// Mean, population standard deviation, and p10/p50/p90 of `values`.
#[must_use]
pub fn diet_summary(values: &[f64]) -> DietSummary {
    if values.is_empty() {
        return DietSummary::default();
    }
    let mu = mean(values);
    let variance = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / values.len() as f64;
    let sorted = sorted_copy(values);
    DietSummary {
        mean: mu,
        std: variance.sqrt(),
        p10: percentile(&sorted, 0.10),
        p50: percentile(&sorted, 0.50),
        p90: percentile(&sorted, 0.90),
    }
}
