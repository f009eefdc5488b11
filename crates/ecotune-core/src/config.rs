//! Simulation configuration shared by the engine, the evaluator, and the CLI.
//!
//! Every section derives `Default` and is marked `#[serde(default)]`, so a partial JSON document
//! merges over the built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::kind::Archetype;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Fixed-timestep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Seconds of simulated time per tick.
    pub dt: f64,
    /// Edge length of spatial index buckets.
    pub grid_cell_size: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            grid_cell_size: 64.0,
        }
    }
}

/// World extents and the resource field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    /// Size of one resource cell in world units.
    pub resource_cell_size: f32,
    /// Initial fraction of capacity seeded into each resource cell.
    pub initial_resource: f32,
    /// Maximum resource a cell holds.
    pub resource_capacity: f32,
    /// Logistic regrowth rate per second.
    pub resource_regrowth: f32,
    /// Diffusion coefficient in `[0, 0.25]` applied per tick.
    pub resource_diffusion: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            resource_cell_size: 16.0,
            initial_resource: 0.6,
            resource_capacity: 1.0,
            resource_regrowth: 0.08,
            resource_diffusion: 0.02,
        }
    }
}

/// Population seeding, caps, and the emergency respawn rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub initial_prey: usize,
    pub initial_pred: usize,
    pub max_prey: usize,
    pub max_pred: usize,
    /// Random respawn when the total population falls under `respawn_threshold`.
    pub respawn_enabled: bool,
    pub respawn_threshold: usize,
    pub respawn_count: usize,
    pub predator_spawn_chance: f32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial_prey: 160,
            initial_pred: 20,
            max_prey: 2000,
            max_pred: 500,
            respawn_enabled: true,
            respawn_threshold: 10,
            respawn_count: 5,
            predator_spawn_chance: 0.2,
        }
    }
}

/// Unified energy economics shared by both kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Metabolic drain per second, scaled by the archetype metabolic rate.
    pub base_cost: f32,
    /// Drain per second at full speed.
    pub move_cost: f32,
    /// Drain per second at full thrust change.
    pub accel_cost: f32,
    /// Energy a feeder can extract per second (grazing) or per bite fraction (hunting).
    pub feeding_rate: f32,
    /// Fraction of extracted energy that is assimilated.
    pub feeding_efficiency: f32,
    /// Digestion seconds per unit of assimilated prey energy.
    pub cooldown_factor: f32,
    /// Energy a bite removes from its target.
    pub bite_size: f32,
    /// Energy spent per bite attempt.
    pub bite_cost: f32,
    /// Reach of a bite in world units.
    pub bite_range: f32,
    pub initial_energy: f32,
    pub max_energy: f32,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            base_cost: 0.007,
            move_cost: 0.035,
            accel_cost: 0.012,
            feeding_rate: 0.06,
            feeding_efficiency: 0.80,
            cooldown_factor: 1.5,
            bite_size: 0.3,
            bite_cost: 0.005,
            bite_range: 14.0,
            initial_energy: 0.6,
            max_energy: 1.0,
        }
    }
}

/// Reproduction thresholds, cooldowns, and offspring placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    pub prey_threshold: f32,
    pub pred_threshold: f32,
    /// Seconds before a newborn may reproduce.
    pub maturity_age: f32,
    pub prey_cooldown: f32,
    pub pred_cooldown: f32,
    /// Symmetric jitter in seconds added to every cooldown.
    pub cooldown_jitter: f32,
    /// Fraction of energy the parent keeps.
    pub parent_energy_split: f32,
    pub spawn_offset: f32,
    /// Max heading deviation of offspring in radians.
    pub heading_jitter: f32,
    /// Soft cap: reproduction probability is `k / (k + count)`.
    pub prey_density_k: f32,
    pub pred_density_k: f32,
    /// Seconds a newborn predator must wait before biting.
    pub newborn_hunt_cooldown: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            prey_threshold: 0.50,
            pred_threshold: 0.85,
            maturity_age: 2.0,
            prey_cooldown: 8.0,
            pred_cooldown: 12.0,
            cooldown_jitter: 3.0,
            parent_energy_split: 0.55,
            spawn_offset: 15.0,
            heading_jitter: 0.25,
            prey_density_k: 200.0,
            pred_density_k: 300.0,
            newborn_hunt_cooldown: 2.0,
        }
    }
}

/// Protected band along the top edge of the world where bites may miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefugiaConfig {
    /// Probability that a bite on prey inside a refuge misses.
    pub strength: f32,
    /// Fraction of the world height covered by refugia.
    pub band_fraction: f32,
}

impl Default for RefugiaConfig {
    fn default() -> Self {
        Self {
            strength: 0.5,
            band_fraction: 0.2,
        }
    }
}

/// Carcass recycling into the resource field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetritusConfig {
    /// Fraction of unassimilated prey energy and carcass residue left as detritus.
    pub carcass_fraction: f32,
    /// Fraction of detritus decaying per second.
    pub decay_rate: f32,
    /// Fraction of decayed detritus returned as resource; the rest is heat.
    pub decay_efficiency: f32,
}

impl Default for DetritusConfig {
    fn default() -> Self {
        Self {
            carcass_fraction: 0.70,
            decay_rate: 0.05,
            decay_efficiency: 0.50,
        }
    }
}

/// Per-archetype locomotion and metabolism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeConfig {
    pub metabolic_rate: f32,
    /// 0 = pure grazer, 1 = pure hunter.
    pub diet: f32,
    pub max_speed: f32,
    pub max_turn_rate: f32,
    pub vision_range: f32,
}

impl Default for ArchetypeConfig {
    fn default() -> Self {
        Self {
            metabolic_rate: 1.0,
            diet: 0.0,
            max_speed: 60.0,
            max_turn_rate: 3.0,
            vision_range: 90.0,
        }
    }
}

/// Archetype table indexed by [`Archetype`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypesConfig {
    pub grazer: ArchetypeConfig,
    pub hunter: ArchetypeConfig,
}

impl Default for ArchetypesConfig {
    fn default() -> Self {
        Self {
            grazer: ArchetypeConfig::default(),
            hunter: ArchetypeConfig {
                metabolic_rate: 0.75,
                diet: 1.0,
                max_speed: 75.0,
                max_turn_rate: 3.5,
                vision_range: 120.0,
            },
        }
    }
}

impl ArchetypesConfig {
    #[must_use]
    pub fn get(&self, archetype: Archetype) -> &ArchetypeConfig {
        match archetype {
            Archetype::Grazer => &self.grazer,
            Archetype::Hunter => &self.hunter,
        }
    }
}

/// Brain mutation applied to offspring and hall-of-fame reseeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub rate: f32,
    pub sigma: f32,
    pub big_rate: f32,
    pub big_sigma: f32,
    pub weight_limit: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            rate: 0.05,
            sigma: 0.15,
            big_rate: 0.005,
            big_sigma: 0.8,
            weight_limit: 4.0,
        }
    }
}

/// Telemetry windowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Simulated seconds per stats window.
    pub stats_window_sec: f64,
    /// Number of windows retained by the bookmark detector.
    pub bookmark_history: usize,
    /// Emit one `info` event per flushed window.
    pub log_windows: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            stats_window_sec: 10.0,
            bookmark_history: 10,
            log_windows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntBreakthroughConfig {
    pub multiplier: f64,
    pub min_kills: u32,
}

impl Default for HuntBreakthroughConfig {
    fn default() -> Self {
        Self {
            multiplier: 2.0,
            min_kills: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForageBreakthroughConfig {
    pub multiplier: f64,
    pub min_resource: f64,
}

impl Default for ForageBreakthroughConfig {
    fn default() -> Self {
        Self {
            multiplier: 2.0,
            min_resource: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorRecoveryConfig {
    pub min_population: usize,
    pub recovery_multiplier: usize,
    pub min_final: usize,
}

impl Default for PredatorRecoveryConfig {
    fn default() -> Self {
        Self {
            min_population: 3,
            recovery_multiplier: 3,
            min_final: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreyCrashConfig {
    /// Fractional drop from the running peak, e.g. 0.3 for 30%.
    pub drop_fraction: f64,
    pub min_drop: usize,
}

impl Default for PreyCrashConfig {
    fn default() -> Self {
        Self {
            drop_fraction: 0.30,
            min_drop: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StableEcosystemConfig {
    pub min_prey: usize,
    pub min_pred: usize,
    /// Squared coefficient of variation threshold.
    pub cv_threshold: f64,
    pub stable_windows: u32,
}

impl Default for StableEcosystemConfig {
    fn default() -> Self {
        Self {
            min_prey: 10,
            min_pred: 3,
            cv_threshold: 0.04,
            stable_windows: 5,
        }
    }
}

/// Bookmark detection thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkConfig {
    pub hunt_breakthrough: HuntBreakthroughConfig,
    pub forage_breakthrough: ForageBreakthroughConfig,
    pub predator_recovery: PredatorRecoveryConfig,
    pub prey_crash: PreyCrashConfig,
    pub stable_ecosystem: StableEcosystemConfig,
}

/// Hall-of-fame admission thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HallEntryCriteria {
    pub min_children: u32,
    pub min_survival_sec: f32,
    pub min_kills: u32,
    pub min_foraging: f32,
}

impl Default for HallEntryCriteria {
    fn default() -> Self {
        Self {
            min_children: 1,
            min_survival_sec: 20.0,
            min_kills: 2,
            min_foraging: 1.0,
        }
    }
}

/// Weights of the hall-of-fame fitness score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HallFitnessWeights {
    pub children: f32,
    pub survival: f32,
    pub kills: f32,
    pub forage: f32,
}

impl Default for HallFitnessWeights {
    fn default() -> Self {
        Self {
            children: 1.0,
            survival: 0.05,
            kills: 2.0,
            forage: 0.5,
        }
    }
}

/// Hall-of-fame archive and reseeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HallOfFameConfig {
    pub max_size: usize,
    /// Respawn kinds below `reseed_threshold` from archived lineages.
    pub reseed_enabled: bool,
    pub reseed_threshold: usize,
    pub reseed_count: usize,
    pub reseed_energy: f32,
    pub entry: HallEntryCriteria,
    pub fitness: HallFitnessWeights,
}

impl Default for HallOfFameConfig {
    fn default() -> Self {
        Self {
            max_size: 30,
            reseed_enabled: true,
            reseed_threshold: 4,
            reseed_count: 3,
            reseed_energy: 0.6,
            entry: HallEntryCriteria::default(),
            fitness: HallFitnessWeights::default(),
        }
    }
}

/// Complete simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub world: WorldConfig,
    pub population: PopulationConfig,
    pub energy: EnergyConfig,
    pub reproduction: ReproductionConfig,
    pub refugia: RefugiaConfig,
    pub detritus: DetritusConfig,
    pub archetypes: ArchetypesConfig,
    pub mutation: MutationConfig,
    pub telemetry: TelemetryConfig,
    pub bookmarks: BookmarkConfig,
    pub hall_of_fame: HallOfFameConfig,
}

impl SimConfig {
    /// Load configuration from a JSON file, or the defaults when `path` is `None`. The result is
    /// validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_json_str(&fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Number of ticks covering `seconds` of simulated time (floored).
    #[must_use]
    pub fn ticks_for(&self, seconds: f64) -> u64 {
        if self.physics.dt <= 0.0 || seconds <= 0.0 {
            return 0;
        }
        // Tolerate representation error so that e.g. 5 s at 1/60 s yields 300, not 299.
        (seconds / self.physics.dt + 1e-9).floor() as u64
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.physics.dt > 0.0 && self.physics.dt.is_finite()) {
            return Err(ConfigError::Invalid("physics.dt must be positive"));
        }
        if self.physics.grid_cell_size <= 0.0 {
            return Err(ConfigError::Invalid("physics.grid_cell_size must be positive"));
        }
        if self.world.width <= 0.0 || self.world.height <= 0.0 {
            return Err(ConfigError::Invalid("world dimensions must be positive"));
        }
        if self.world.resource_cell_size <= 0.0 {
            return Err(ConfigError::Invalid(
                "world.resource_cell_size must be positive",
            ));
        }
        if self.world.resource_capacity <= 0.0 {
            return Err(ConfigError::Invalid(
                "world.resource_capacity must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.world.initial_resource) {
            return Err(ConfigError::Invalid(
                "world.initial_resource must be in [0, 1]",
            ));
        }
        if self.world.resource_regrowth < 0.0
            || !(0.0..=0.25).contains(&self.world.resource_diffusion)
        {
            return Err(ConfigError::Invalid(
                "resource regrowth must be non-negative and diffusion in [0, 0.25]",
            ));
        }
        if self.energy.base_cost < 0.0
            || self.energy.move_cost < 0.0
            || self.energy.accel_cost < 0.0
            || self.energy.feeding_rate < 0.0
            || self.energy.bite_size < 0.0
            || self.energy.bite_cost < 0.0
            || self.energy.bite_range <= 0.0
            || self.energy.max_energy <= 0.0
        {
            return Err(ConfigError::Invalid(
                "energy costs must be non-negative, bite range and max energy positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.energy.feeding_efficiency)
            || !(0.0..=1.0).contains(&self.reproduction.parent_energy_split)
            || !(0.0..=1.0).contains(&self.refugia.strength)
            || !(0.0..=1.0).contains(&self.refugia.band_fraction)
            || !(0.0..=1.0).contains(&self.detritus.carcass_fraction)
            || !(0.0..=1.0).contains(&self.detritus.decay_efficiency)
        {
            return Err(ConfigError::Invalid(
                "efficiencies, fractions, and strengths must lie in [0, 1]",
            ));
        }
        if self.reproduction.prey_density_k <= 0.0 || self.reproduction.pred_density_k <= 0.0 {
            return Err(ConfigError::Invalid("density soft caps must be positive"));
        }
        if self.telemetry.stats_window_sec <= 0.0 {
            return Err(ConfigError::Invalid(
                "telemetry.stats_window_sec must be positive",
            ));
        }
        if self.hall_of_fame.max_size == 0 {
            return Err(ConfigError::Invalid("hall_of_fame.max_size must be non-zero"));
        }
        for archetype in Archetype::ALL {
            let settings = self.archetypes.get(archetype);
            if settings.metabolic_rate < 0.0
                || settings.max_speed <= 0.0
                || settings.vision_range <= 0.0
            {
                return Err(ConfigError::Invalid(
                    "archetype metabolic rate must be non-negative, speed and vision positive",
                ));
            }
        }
        Ok(())
    }
}
