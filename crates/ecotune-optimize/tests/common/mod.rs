//! Scripted episodes for exercising the evaluator without a real engine.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ecotune_core::brain::BrainWeights;
use ecotune_core::config::SimConfig;
use ecotune_core::episode::{Episode, EpisodeError, EpisodeFactory, StatsCallback};
use ecotune_core::kind::{Archetype, Kind};
use ecotune_core::telemetry::{HallEntry, HallOfFame, WindowStats};

/// `[prey, predators]` alive after `tick` steps.
pub type Script = fn(seed: u64, config: &SimConfig, tick: u64) -> [usize; 2];

pub fn steady(_seed: u64, _config: &SimConfig, _tick: u64) -> [usize; 2] {
    [100, 10]
}

pub struct ScriptedFactory {
    script: Script,
    configs: Arc<Mutex<Vec<SimConfig>>>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            configs: Arc::default(),
        }
    }

    /// Configs passed to `new_episode`, in creation order.
    pub fn configs(&self) -> Arc<Mutex<Vec<SimConfig>>> {
        Arc::clone(&self.configs)
    }
}

impl EpisodeFactory for ScriptedFactory {
    type Episode = ScriptedEpisode;

    fn new_episode(
        &self,
        seed: u64,
        config: &SimConfig,
        on_stats: Option<StatsCallback>,
    ) -> Result<ScriptedEpisode, EpisodeError> {
        config.validate()?;
        self.configs
            .lock()
            .expect("configs lock")
            .push(config.clone());
        Ok(ScriptedEpisode {
            seed,
            config: config.clone(),
            script: self.script,
            tick: 0,
            window_ticks: config.ticks_for(config.telemetry.stats_window_sec).max(1),
            on_stats,
        })
    }
}

pub struct ScriptedEpisode {
    seed: u64,
    config: SimConfig,
    script: Script,
    tick: u64,
    window_ticks: u64,
    on_stats: Option<StatsCallback>,
}

impl ScriptedEpisode {
    fn counts(&self) -> [usize; 2] {
        (self.script)(self.seed, &self.config, self.tick)
    }
}

impl Episode for ScriptedEpisode {
    fn step(&mut self) {
        self.tick += 1;
        if self.tick.is_multiple_of(self.window_ticks) {
            let [prey, pred] = self.counts();
            let bites = 30 * pred as u32;
            let stats = WindowStats {
                window_start_tick: self.tick - self.window_ticks,
                window_end_tick: self.tick,
                prey_count: prey,
                pred_count: pred,
                bites_attempted: bites,
                bites_hit: bites * 15 / 100,
                hit_rate: if bites > 0 { 0.15 } else { 0.0 },
                prey_energy_p50: 0.4,
                pred_energy_p50: 0.4,
                ..WindowStats::default()
            };
            if let Some(callback) = self.on_stats.as_mut() {
                callback(&stats);
            }
        }
    }

    fn tick(&self) -> u64 {
        self.tick
    }

    fn population(&self, kind: Kind) -> usize {
        self.counts()[kind.index()]
    }

    /// One grazer entry tagged with the seed and the configured base cost.
    fn hall_of_fame(&self) -> HallOfFame {
        let mut hall = HallOfFame::new(4, self.seed);
        hall.insert(
            Archetype::Grazer,
            HallEntry {
                weights: BrainWeights::zeros(2, 2, 1),
                fitness: self.config.energy.base_cost * 1000.0,
                entity_id: self.seed as u32,
                children: 0,
                kills: 0,
                survival_sec: self.tick as f32 / 60.0,
                foraging: 0.0,
                clade_id: self.seed,
                founder: Archetype::Grazer,
                diet: 0.0,
            },
        );
        hall
    }
}

/// Entity id of the single scripted hall entry.
pub fn donor_id(hall: &HallOfFame) -> Option<u32> {
    hall.entries(Archetype::Grazer)
        .first()
        .map(|entry| entry.entity_id)
}
