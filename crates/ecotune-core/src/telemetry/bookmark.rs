//! Rolling-history detection of notable transitions in the window stream.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::info;

use crate::config::{
    BookmarkConfig, ForageBreakthroughConfig, HuntBreakthroughConfig, PredatorRecoveryConfig,
    PreyCrashConfig, StableEcosystemConfig,
};
use crate::telemetry::stats::WindowStats;

/// Smallest history the detector keeps; the stability rule looks back four windows.
pub const MIN_HISTORY: usize = 5;

const BREAKTHROUGH_MIN_HISTORY: usize = 3;
const STABILITY_LOOKBACK: usize = 4;

/// Category of a detected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkKind {
    HuntBreakthrough,
    ForageBreakthrough,
    PredatorRecovery,
    PreyCrash,
    StableEcosystem,
}

impl BookmarkKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HuntBreakthrough => "hunt_breakthrough",
            Self::ForageBreakthrough => "forage_breakthrough",
            Self::PredatorRecovery => "predator_recovery",
            Self::PreyCrash => "prey_crash",
            Self::StableEcosystem => "stable_ecosystem",
        }
    }
}

impl fmt::Display for BookmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fact asserted about one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub kind: BookmarkKind,
    pub tick: u64,
    pub description: String,
}

impl Bookmark {
    pub fn log(&self) {
        info!(
            kind = self.kind.name(),
            tick = self.tick,
            description = %self.description,
            "bookmark"
        );
    }
}

/// Flags hunting and foraging breakthroughs, predator recoveries, prey crashes, and sustained
/// stability from consecutive [`WindowStats`] records.
///
/// Every rule compares the incoming window against the history recorded *before* it. The
/// running predator minimum and prey peak are updated only after the rules have run.
#[derive(Debug, Clone)]
pub struct BookmarkDetector {
    config: BookmarkConfig,
    capacity: usize,
    history: VecDeque<WindowStats>,
    pred_min: usize,
    prey_peak: usize,
    stable_windows: u32,
}

impl BookmarkDetector {
    /// Create a detector retaining `history` windows (raised to [`MIN_HISTORY`]).
    #[must_use]
    pub fn new(history: usize, config: BookmarkConfig) -> Self {
        let capacity = history.max(MIN_HISTORY);
        Self {
            config,
            capacity,
            history: VecDeque::with_capacity(capacity),
            pred_min: 0,
            prey_peak: 0,
            stable_windows: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Running minimum predator count (0 until the first window is seen).
    #[must_use]
    pub fn predator_minimum(&self) -> usize {
        self.pred_min
    }

    #[must_use]
    pub fn prey_peak(&self) -> usize {
        self.prey_peak
    }

    /// Evaluate all rules against `stats`, then fold it into the history.
    pub fn check(&mut self, stats: &WindowStats) -> Vec<Bookmark> {
        let mut bookmarks = Vec::new();

        if !self.history.is_empty() {
            bookmarks.extend(self.hunt_breakthrough(stats));
            bookmarks.extend(self.forage_breakthrough(stats));
            bookmarks.extend(self.predator_recovery(stats));
            bookmarks.extend(self.prey_crash(stats));
            bookmarks.extend(self.stable_ecosystem(stats));
        }

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(stats.clone());

        if stats.pred_count < self.pred_min || self.pred_min == 0 {
            self.pred_min = stats.pred_count;
        }
        if stats.prey_count > self.prey_peak {
            self.prey_peak = stats.prey_count;
        }

        bookmarks
    }

    fn hunt_breakthrough(&self, stats: &WindowStats) -> Option<Bookmark> {
        let HuntBreakthroughConfig {
            multiplier,
            min_kills,
        } = self.config.hunt_breakthrough;
        if self.history.len() < BREAKTHROUGH_MIN_HISTORY {
            return None;
        }

        let (kills, hits) = self.history.iter().fold((0u64, 0u64), |(k, h), w| {
            (k + u64::from(w.kills), h + u64::from(w.bites_hit))
        });
        if hits == 0 || stats.bites_hit == 0 {
            return None;
        }
        let average = kills as f64 / hits as f64;
        if average == 0.0 {
            return None;
        }

        let current = stats.kill_rate;
        (current > average * multiplier && stats.kills >= min_kills).then(|| Bookmark {
            kind: BookmarkKind::HuntBreakthrough,
            tick: stats.window_end_tick,
            description: format!(
                "Kill rate {current:.2} is {:.1}x average ({average:.2})",
                current / average
            ),
        })
    }

    fn forage_breakthrough(&self, stats: &WindowStats) -> Option<Bookmark> {
        let ForageBreakthroughConfig {
            multiplier,
            min_resource,
        } = self.config.forage_breakthrough;
        if self.history.len() < BREAKTHROUGH_MIN_HISTORY {
            return None;
        }

        let average = self
            .history
            .iter()
            .map(|w| w.mean_resource_at_prey)
            .sum::<f64>()
            / self.history.len() as f64;
        if average == 0.0 {
            return None;
        }

        let current = stats.mean_resource_at_prey;
        (current > average * multiplier && current > min_resource).then(|| Bookmark {
            kind: BookmarkKind::ForageBreakthrough,
            tick: stats.window_end_tick,
            description: format!(
                "Resource util {current:.2} is {:.1}x average ({average:.2})",
                current / average
            ),
        })
    }

    fn predator_recovery(&mut self, stats: &WindowStats) -> Option<Bookmark> {
        let PredatorRecoveryConfig {
            min_population,
            recovery_multiplier,
            min_final,
        } = self.config.predator_recovery;
        if self.pred_min == 0 || self.pred_min > min_population {
            return None;
        }

        let threshold = self.pred_min * recovery_multiplier;
        if stats.pred_count >= threshold && stats.pred_count >= min_final {
            let previous = std::mem::replace(&mut self.pred_min, stats.pred_count);
            return Some(Bookmark {
                kind: BookmarkKind::PredatorRecovery,
                tick: stats.window_end_tick,
                description: format!(
                    "Predator population recovered from {previous} to {}",
                    stats.pred_count
                ),
            });
        }
        None
    }

    fn prey_crash(&mut self, stats: &WindowStats) -> Option<Bookmark> {
        let PreyCrashConfig {
            drop_fraction,
            min_drop,
        } = self.config.prey_crash;
        if self.prey_peak == 0 {
            return None;
        }

        let drop = 1.0 - stats.prey_count as f64 / self.prey_peak as f64;
        if drop > drop_fraction && stats.prey_count + min_drop < self.prey_peak {
            let peak = std::mem::replace(&mut self.prey_peak, stats.prey_count);
            return Some(Bookmark {
                kind: BookmarkKind::PreyCrash,
                tick: stats.window_end_tick,
                description: format!(
                    "Prey crashed {:.0}% from peak {peak} to {}",
                    drop * 100.0,
                    stats.prey_count
                ),
            });
        }
        None
    }

    fn stable_ecosystem(&mut self, stats: &WindowStats) -> Option<Bookmark> {
        let StableEcosystemConfig {
            min_prey,
            min_pred,
            cv_threshold,
            stable_windows,
        } = self.config.stable_ecosystem;

        if stats.prey_count < min_prey || stats.pred_count < min_pred {
            self.stable_windows = 0;
            return None;
        }
        if self.history.len() < STABILITY_LOOKBACK {
            return None;
        }

        let recent = self.history.range(self.history.len() - STABILITY_LOOKBACK..);
        let (prey, pred): (Vec<f64>, Vec<f64>) = recent
            .map(|w| (w.prey_count as f64, w.pred_count as f64))
            .unzip();
        let prey_cv2 = squared_cv(&prey);
        let pred_cv2 = squared_cv(&pred);

        if prey_cv2 < cv_threshold && pred_cv2 < cv_threshold {
            self.stable_windows = self.stable_windows.saturating_add(1);
        } else {
            self.stable_windows = 0;
        }

        // Equality, not `>=`: one bookmark per streak.
        (self.stable_windows == stable_windows).then(|| Bookmark {
            kind: BookmarkKind::StableEcosystem,
            tick: stats.window_end_tick,
            description: format!(
                "Stable ecosystem with {} prey, {} predators over {stable_windows}+ windows",
                stats.prey_count, stats.pred_count
            ),
        })
    }
}

/// Population variance over squared mean; 0 when the mean is 0.
fn squared_cv(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    variance / (mean * mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(tick: u64, prey: usize, pred: usize) -> WindowStats {
        WindowStats {
            window_end_tick: tick,
            prey_count: prey,
            pred_count: pred,
            ..WindowStats::default()
        }
    }

    fn hunting(tick: u64, kills: u32, hits: u32) -> WindowStats {
        WindowStats {
            kills,
            bites_hit: hits,
            bites_attempted: hits * 2,
            kill_rate: f64::from(kills) / f64::from(hits),
            ..window(tick, 100, 10)
        }
    }

    fn kinds(bookmarks: &[Bookmark]) -> Vec<BookmarkKind> {
        bookmarks.iter().map(|b| b.kind).collect()
    }

    fn detector() -> BookmarkDetector {
        BookmarkDetector::new(10, BookmarkConfig::default())
    }

    #[test]
    fn history_is_at_least_five() {
        assert_eq!(BookmarkDetector::new(1, BookmarkConfig::default()).capacity(), 5);
        assert_eq!(detector().capacity(), 10);
    }

    #[test]
    fn hunt_breakthrough_fires_above_twice_average() {
        let mut det = detector();
        for i in 0..5 {
            assert!(!kinds(&det.check(&hunting(i, 2, 10))).contains(&BookmarkKind::HuntBreakthrough));
        }
        let fired = det.check(&hunting(5, 8, 10));
        assert!(kinds(&fired).contains(&BookmarkKind::HuntBreakthrough));

        let mut det = detector();
        for i in 0..5 {
            det.check(&hunting(i, 2, 10));
        }
        let quiet = det.check(&hunting(5, 3, 10));
        assert!(!kinds(&quiet).contains(&BookmarkKind::HuntBreakthrough));
    }

    #[test]
    fn hunt_breakthrough_needs_three_samples_and_hits() {
        let mut det = detector();
        det.check(&hunting(0, 2, 10));
        det.check(&hunting(1, 2, 10));
        assert!(!kinds(&det.check(&hunting(2, 9, 10))).contains(&BookmarkKind::HuntBreakthrough));

        let mut det = detector();
        for i in 0..4 {
            det.check(&window(i, 100, 10));
        }
        // No hits anywhere in history: abstain instead of dividing by zero.
        assert!(!kinds(&det.check(&hunting(4, 8, 10))).contains(&BookmarkKind::HuntBreakthrough));
    }

    #[test]
    fn forage_breakthrough() {
        let mut det = detector();
        for i in 0..4 {
            let stats = WindowStats {
                mean_resource_at_prey: 0.2,
                ..window(i, 100, 10)
            };
            det.check(&stats);
        }
        let burst = WindowStats {
            mean_resource_at_prey: 0.5,
            ..window(4, 100, 10)
        };
        assert!(kinds(&det.check(&burst)).contains(&BookmarkKind::ForageBreakthrough));

        let mut det = detector();
        for i in 0..4 {
            let stats = WindowStats {
                mean_resource_at_prey: 0.1,
                ..window(i, 100, 10)
            };
            det.check(&stats);
        }
        // Above twice the average but under the absolute floor.
        let small = WindowStats {
            mean_resource_at_prey: 0.25,
            ..window(4, 100, 10)
        };
        assert!(!kinds(&det.check(&small)).contains(&BookmarkKind::ForageBreakthrough));
    }

    #[test]
    fn prey_crash_fires_once_per_peak() {
        let mut det = detector();
        det.check(&window(0, 80, 5));
        det.check(&window(1, 100, 5));
        let crash = det.check(&window(2, 50, 5));
        assert_eq!(kinds(&crash), vec![BookmarkKind::PreyCrash]);
        assert_eq!(det.prey_peak(), 50);
        assert!(det.check(&window(3, 50, 5)).is_empty());
    }

    #[test]
    fn small_absolute_drop_is_not_a_crash() {
        let mut det = detector();
        det.check(&window(0, 20, 5));
        assert!(!kinds(&det.check(&window(1, 11, 5))).contains(&BookmarkKind::PreyCrash));
    }

    #[test]
    fn predator_recovery_is_one_shot() {
        let mut det = detector();
        det.check(&window(0, 100, 2));
        assert!(det.check(&window(1, 100, 4)).is_empty());
        let fired = det.check(&window(2, 100, 6));
        assert_eq!(kinds(&fired), vec![BookmarkKind::PredatorRecovery]);
        assert_eq!(det.predator_minimum(), 6);
        assert!(
            !kinds(&det.check(&window(3, 100, 20))).contains(&BookmarkKind::PredatorRecovery)
        );
    }

    #[test]
    fn extrema_update_after_rules() {
        let mut det = detector();
        det.check(&window(0, 40, 8));
        assert_eq!(det.predator_minimum(), 8);
        assert_eq!(det.prey_peak(), 40);
        det.check(&window(1, 60, 3));
        assert_eq!(det.predator_minimum(), 3);
        assert_eq!(det.prey_peak(), 60);
    }

    #[test]
    fn stable_ecosystem_fires_exactly_once_per_streak() {
        let mut det = detector();
        let mut fired_at = Vec::new();
        for i in 0..15 {
            let bookmarks = det.check(&window(i, 100, 10));
            if kinds(&bookmarks).contains(&BookmarkKind::StableEcosystem) {
                fired_at.push(i);
            }
        }
        // Counting starts once four windows of history exist (check #4), so the fifth
        // consecutive stable window is check #8.
        assert_eq!(fired_at, vec![8]);

        // Dropping below the floor resets the streak; a fresh streak fires again once the
        // crashed window has left the four-window lookback.
        det.check(&window(15, 2, 10));
        let mut refired_at = Vec::new();
        for i in 16..30 {
            let bookmarks = det.check(&window(i, 100, 10));
            if kinds(&bookmarks).contains(&BookmarkKind::StableEcosystem) {
                refired_at.push(i);
            }
        }
        assert_eq!(refired_at, vec![24]);
    }

    #[test]
    fn volatile_populations_are_not_stable() {
        let mut det = detector();
        for i in 0..12 {
            let prey = if i % 2 == 0 { 40 } else { 160 };
            let bookmarks = det.check(&window(i, prey, 10));
            assert!(!kinds(&bookmarks).contains(&BookmarkKind::StableEcosystem));
        }
    }

    #[test]
    fn first_window_never_fires() {
        let mut det = detector();
        assert!(det.check(&hunting(0, 10, 10)).is_empty());
        assert_eq!(det.history_len(), 1);
    }

    #[test]
    fn squared_cv_handles_zero_mean() {
        assert_eq!(squared_cv(&[0.0, 0.0, 0.0, 0.0]), 0.0);
        assert!((squared_cv(&[1.0, 3.0]) - 0.25).abs() < 1e-12);
    }
}
