//! Ecosystem quality score in `[0, 1]` computed from an episode's window stream.

use ecotune_core::telemetry::WindowStats;

const WEIGHT_RATIO: f64 = 0.30;
const WEIGHT_STABILITY: f64 = 0.25;
const WEIGHT_ENERGY: f64 = 0.25;
const WEIGHT_HUNTING: f64 = 0.20;

/// Leading windows ignored while populations establish.
pub const WARMUP_WINDOWS: usize = 3;
/// Windows where either population is below this are ignored.
pub const MIN_POPULATION: usize = 3;

const TARGET_PREY_PER_PRED: f64 = 10.0;
const TARGET_ENERGY_P50: f64 = 0.40;
const ENERGY_TOLERANCE: f64 = 0.20;
const TARGET_HIT_RATE: f64 = 0.15;
const HIT_RATE_TOLERANCE: f64 = 0.12;
const BITES_PER_PRED_SCALE: f64 = 3.0;

/// Per-component scores behind [`quality`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityBreakdown {
    pub ratio: f64,
    pub stability: f64,
    pub energy: f64,
    pub hunting: f64,
    /// Windows that passed the warm-up and population filters.
    pub valid_windows: usize,
}

impl QualityBreakdown {
    /// Weighted sum clamped to `[0, 1]`.
    #[must_use]
    pub fn score(&self) -> f64 {
        (WEIGHT_RATIO * self.ratio
            + WEIGHT_STABILITY * self.stability
            + WEIGHT_ENERGY * self.energy
            + WEIGHT_HUNTING * self.hunting)
            .clamp(0.0, 1.0)
    }
}

/// Quality of an episode: population ratio, stability, energy health, and hunting activity.
/// Returns 0 when no window survives the filters.
#[must_use]
pub fn quality(windows: &[WindowStats]) -> f64 {
    breakdown(windows).score()
}

#[must_use]
pub fn breakdown(windows: &[WindowStats]) -> QualityBreakdown {
    let valid: Vec<&WindowStats> = windows
        .iter()
        .skip(WARMUP_WINDOWS)
        .filter(|w| w.prey_count >= MIN_POPULATION && w.pred_count >= MIN_POPULATION)
        .collect();
    if valid.is_empty() {
        return QualityBreakdown::default();
    }

    let mut ratio_sum = 0.0;
    let mut energy_sum = 0.0;
    let mut hunt_sum = 0.0;
    let mut hunt_windows = 0usize;
    for window in &valid {
        let prey = window.prey_count as f64;
        let pred = window.pred_count as f64;

        let log_err = (prey / pred / TARGET_PREY_PER_PRED).ln();
        ratio_sum += (-log_err * log_err).exp();

        energy_sum += (energy_health(window.prey_energy_p50)
            + energy_health(window.pred_energy_p50))
            / 2.0;

        if window.bites_attempted > 0 {
            let hit_score = gaussian(window.hit_rate, TARGET_HIT_RATE, HIT_RATE_TOLERANCE);
            let bites_per_pred = f64::from(window.bites_attempted) / pred;
            let activity = 1.0 - (-bites_per_pred / BITES_PER_PRED_SCALE).exp();
            hunt_sum += 0.6 * hit_score + 0.4 * activity;
            hunt_windows += 1;
        }
    }

    let n = valid.len() as f64;
    let stability = if valid.len() >= 2 {
        let prey: Vec<f64> = valid.iter().map(|w| w.prey_count as f64).collect();
        let pred: Vec<f64> = valid.iter().map(|w| w.pred_count as f64).collect();
        let (cv_prey, cv_pred) = (coefficient_of_variation(&prey), coefficient_of_variation(&pred));
        (-(cv_prey * cv_prey + cv_pred * cv_pred)).exp()
    } else {
        0.0
    };

    QualityBreakdown {
        ratio: ratio_sum / n,
        stability,
        energy: energy_sum / n,
        hunting: if hunt_windows > 0 {
            hunt_sum / hunt_windows as f64
        } else {
            0.0
        },
        valid_windows: valid.len(),
    }
}

fn gaussian(x: f64, centre: f64, width: f64) -> f64 {
    let z = (x - centre) / width;
    (-z * z).exp()
}

fn energy_health(p50: f64) -> f64 {
    gaussian(p50, TARGET_ENERGY_P50, ENERGY_TOLERANCE)
}

/// Population standard deviation over mean; 0 for empty input or zero mean.
#[must_use]
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(prey: usize, pred: usize) -> WindowStats {
        WindowStats {
            prey_count: prey,
            pred_count: pred,
            prey_energy_p50: 0.4,
            pred_energy_p50: 0.4,
            bites_attempted: 300,
            bites_hit: 45,
            hit_rate: 0.15,
            ..WindowStats::default()
        }
    }

    #[test]
    fn warmup_only_streams_score_zero() {
        assert_eq!(quality(&[]), 0.0);
        assert_eq!(quality(&vec![window(100, 10); WARMUP_WINDOWS]), 0.0);
    }

    #[test]
    fn ideal_steady_state_scores_near_one() {
        let windows = vec![window(100, 10); 10];
        let parts = breakdown(&windows);
        assert_eq!(parts.valid_windows, 7);
        assert!((parts.ratio - 1.0).abs() < 1e-12);
        assert!((parts.stability - 1.0).abs() < 1e-12);
        assert!((parts.energy - 1.0).abs() < 1e-12);
        assert!(parts.hunting > 0.99);
        assert!(quality(&windows) > 0.99);
    }

    #[test]
    fn sparse_populations_are_filtered() {
        let mut windows = vec![window(100, 10); WARMUP_WINDOWS];
        windows.push(window(100, 2));
        windows.push(window(2, 10));
        assert_eq!(breakdown(&windows).valid_windows, 0);
        assert_eq!(quality(&windows), 0.0);
    }

    #[test]
    fn single_valid_window_has_no_stability_credit() {
        let mut windows = vec![window(100, 10); WARMUP_WINDOWS];
        windows.push(window(100, 10));
        let parts = breakdown(&windows);
        assert_eq!(parts.valid_windows, 1);
        assert_eq!(parts.stability, 0.0);
        assert!((quality(&windows) - (1.0 - WEIGHT_STABILITY) - 0.0).abs() < 0.01);
    }

    #[test]
    fn skewed_ratio_is_penalised() {
        let balanced = vec![window(100, 10); 6];
        let skewed = vec![window(1000, 10); 6];
        assert!(quality(&skewed) < quality(&balanced));
    }

    #[test]
    fn cv_handles_degenerate_input() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
        assert!((coefficient_of_variation(&[1.0, 3.0]) - 0.5).abs() < 1e-12);
    }
}
