//! Event accumulator that closes fixed-length windows into [`WindowStats`] records.

use crate::kind::Kind;
use crate::telemetry::stats::{WindowStats, diet_summary, energy_summary};

/// Reason a bite never landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The biter was still digesting its previous meal.
    Digesting,
    /// The target sat inside a refuge and the bite missed.
    Refugia,
}

/// Energy pool totals sampled at flush time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyPools {
    pub total_resource: f64,
    pub total_detritus: f64,
    pub total_organisms: f64,
    pub heat_loss_accum: f64,
    pub energy_input: f64,
}

/// Population snapshot handed to [`WindowedStatsCollector::flush`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushInput<'a> {
    pub prey_count: usize,
    pub pred_count: usize,
    pub prey_energies: &'a [f64],
    pub pred_energies: &'a [f64],
    pub diets: &'a [f64],
    pub mean_resource_at_prey: f64,
    pub active_clades: usize,
    pub pools: EnergyPools,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    births: [u32; 2],
    deaths: [u32; 2],
    bites_attempted: u32,
    bites_hit: u32,
    kills: u32,
    bites_blocked_digest: u32,
    bites_missed_refugia: u32,
}

/// Accumulates simulation events and periodically emits a [`WindowStats`] record.
#[derive(Debug, Clone)]
pub struct WindowedStatsCollector {
    window_ticks: u64,
    dt: f64,
    window_start: u64,
    counters: Counters,
}

impl WindowedStatsCollector {
    /// Create a collector whose windows span `window_sec` of simulated time at timestep `dt`.
    /// The window length is floored to whole ticks and never shorter than one tick.
    #[must_use]
    pub fn new(window_sec: f64, dt: f64) -> Self {
        let ticks = if dt > 0.0 && window_sec > 0.0 {
            (window_sec / dt + 1e-9).floor() as u64
        } else {
            0
        };
        Self {
            window_ticks: ticks.max(1),
            dt,
            window_start: 0,
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub const fn window_ticks(&self) -> u64 {
        self.window_ticks
    }

    #[must_use]
    pub const fn window_start(&self) -> u64 {
        self.window_start
    }

    pub fn record_birth(&mut self, kind: Kind) {
        self.counters.births[kind.index()] += 1;
    }

    pub fn record_death(&mut self, kind: Kind) {
        self.counters.deaths[kind.index()] += 1;
    }

    pub fn record_bite_attempt(&mut self) {
        self.counters.bites_attempted += 1;
    }

    pub fn record_bite_hit(&mut self) {
        self.counters.bites_hit += 1;
    }

    pub fn record_kill(&mut self) {
        self.counters.kills += 1;
    }

    pub fn record_bite_blocked(&mut self, reason: BlockReason) {
        match reason {
            BlockReason::Digesting => self.counters.bites_blocked_digest += 1,
            BlockReason::Refugia => self.counters.bites_missed_refugia += 1,
        }
    }

    /// True once a full window has elapsed since the last flush.
    #[must_use]
    pub fn should_flush(&self, current_tick: u64) -> bool {
        current_tick.saturating_sub(self.window_start) >= self.window_ticks
    }

    /// Close the current window, returning its record and resetting every counter.
    pub fn flush(&mut self, current_tick: u64, input: FlushInput<'_>) -> WindowStats {
        let counters = std::mem::take(&mut self.counters);
        let hit_rate = ratio(counters.bites_hit, counters.bites_attempted);
        let kill_rate = ratio(counters.kills, counters.bites_hit);
        let prey_energy = energy_summary(input.prey_energies);
        let pred_energy = energy_summary(input.pred_energies);
        let diet = diet_summary(input.diets);

        let stats = WindowStats {
            window_start_tick: self.window_start,
            window_end_tick: current_tick,
            sim_time_sec: current_tick as f64 * self.dt,

            prey_count: input.prey_count,
            pred_count: input.pred_count,

            prey_births: counters.births[Kind::Prey.index()],
            pred_births: counters.births[Kind::Predator.index()],
            prey_deaths: counters.deaths[Kind::Prey.index()],
            pred_deaths: counters.deaths[Kind::Predator.index()],

            bites_attempted: counters.bites_attempted,
            bites_hit: counters.bites_hit,
            kills: counters.kills,
            bites_blocked_digest: counters.bites_blocked_digest,
            bites_missed_refugia: counters.bites_missed_refugia,
            hit_rate,
            kill_rate,

            prey_energy_mean: prey_energy.mean,
            prey_energy_p10: prey_energy.p10,
            prey_energy_p50: prey_energy.p50,
            prey_energy_p90: prey_energy.p90,

            pred_energy_mean: pred_energy.mean,
            pred_energy_p10: pred_energy.p10,
            pred_energy_p50: pred_energy.p50,
            pred_energy_p90: pred_energy.p90,

            mean_resource_at_prey: input.mean_resource_at_prey,

            total_resource: input.pools.total_resource,
            total_detritus: input.pools.total_detritus,
            total_organisms: input.pools.total_organisms,
            heat_loss_accum: input.pools.heat_loss_accum,
            energy_input: input.pools.energy_input,

            diet_mean: diet.mean,
            diet_std: diet.std,
            diet_p10: diet.p10,
            diet_p50: diet.p50,
            diet_p90: diet.p90,

            active_clades: input.active_clades,
        };

        self.window_start = current_tick;
        stats
    }
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        f64::from(numerator) / f64::from(denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_length_is_floored_and_at_least_one() {
        assert_eq!(WindowedStatsCollector::new(10.0, 1.0 / 60.0).window_ticks(), 600);
        assert_eq!(WindowedStatsCollector::new(0.01, 1.0).window_ticks(), 1);
        assert_eq!(WindowedStatsCollector::new(2.5, 1.0).window_ticks(), 2);
    }

    #[test]
    fn flush_boundary() {
        let mut collector = WindowedStatsCollector::new(10.0, 1.0);
        assert!(!collector.should_flush(9));
        assert!(collector.should_flush(10));
        collector.flush(10, FlushInput::default());
        assert!(!collector.should_flush(19));
        assert!(collector.should_flush(20));
    }

    #[test]
    fn flush_computes_rates_and_resets() {
        let mut collector = WindowedStatsCollector::new(1.0, 0.5);
        collector.record_birth(Kind::Prey);
        collector.record_birth(Kind::Prey);
        collector.record_birth(Kind::Predator);
        collector.record_death(Kind::Predator);
        for _ in 0..4 {
            collector.record_bite_attempt();
        }
        collector.record_bite_hit();
        collector.record_bite_hit();
        collector.record_kill();
        collector.record_bite_blocked(BlockReason::Digesting);
        collector.record_bite_blocked(BlockReason::Refugia);
        collector.record_bite_blocked(BlockReason::Refugia);

        let prey = [0.2, 0.4, 0.6];
        let stats = collector.flush(
            2,
            FlushInput {
                prey_count: 3,
                pred_count: 1,
                prey_energies: &prey,
                pred_energies: &[0.8],
                ..FlushInput::default()
            },
        );

        assert_eq!(stats.window_start_tick, 0);
        assert_eq!(stats.window_end_tick, 2);
        assert!((stats.sim_time_sec - 1.0).abs() < 1e-12);
        assert_eq!(stats.prey_births, 2);
        assert_eq!(stats.pred_births, 1);
        assert_eq!(stats.pred_deaths, 1);
        assert_eq!(stats.bites_blocked_digest, 1);
        assert_eq!(stats.bites_missed_refugia, 2);
        assert!((stats.hit_rate - 0.5).abs() < 1e-12);
        assert!((stats.kill_rate - 0.5).abs() < 1e-12);
        assert!((stats.prey_energy_p50 - 0.4).abs() < 1e-12);
        assert!((stats.pred_energy_mean - 0.8).abs() < 1e-12);

        let next = collector.flush(4, FlushInput::default());
        assert_eq!(next.window_start_tick, 2);
        assert_eq!(next.prey_births, 0);
        assert_eq!(next.bites_attempted, 0);
        assert_eq!(next.hit_rate, 0.0);
        assert_eq!(next.kill_rate, 0.0);
    }

    #[test]
    fn zero_denominators_yield_zero_rates() {
        let mut collector = WindowedStatsCollector::new(1.0, 1.0);
        collector.record_kill();
        let stats = collector.flush(1, FlushInput::default());
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.kill_rate, 0.0);
    }
}
