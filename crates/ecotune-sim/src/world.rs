//! Reference predator/prey world advanced by a fixed, staged tick pipeline.

use std::collections::HashSet;
use std::f32::consts::{PI, TAU};
use std::fmt;

use ecotune_core::brain::BrainWeights;
use ecotune_core::config::{ConfigError, ReproductionConfig, SimConfig};
use ecotune_core::episode::{Episode, EpisodeError, EpisodeFactory, StatsCallback};
use ecotune_core::kind::{Archetype, Kind};
use ecotune_core::telemetry::{
    BlockReason, Bookmark, BookmarkDetector, EnergyPools, FlushInput, HallOfFame,
    LifetimeTracker, WindowStats, WindowedStatsCollector,
};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::arena::{OrganismArena, OrganismData, OrganismId, OrganismMap, Position};
use crate::grid::{FieldRates, ResourceField};
use crate::index::{IndexError, NeighborhoodIndex, UniformGridIndex, toroidal_delta};

/// Sensor inputs: resource, energy, nearest-other proximity, bearing sin/cos, crowding,
/// in-refuge flag, bias.
pub const INPUT_SIZE: usize = 8;
pub const HIDDEN_SIZE: usize = 8;
/// Actuator outputs: thrust, turn, bite intent.
pub const OUTPUT_SIZE: usize = 3;

/// Same-kind neighbours that saturate the crowding sensor.
const CROWDING_SATURATION: f32 = 10.0;
/// Decorrelates the hall-of-fame sampler from the world stream.
const HALL_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Errors raised while constructing a world.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid world configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("spatial index error: {0}")]
    Index(#[from] IndexError),
}

impl From<WorldError> for EpisodeError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::Config(inner) => EpisodeError::Config(inner),
            WorldError::InvalidConfig(msg) | WorldError::Index(IndexError::InvalidConfig(msg)) => {
                EpisodeError::Config(ConfigError::Invalid(msg))
            }
        }
    }
}

/// Per-organism state outside the hot columns.
#[derive(Debug, Clone)]
pub struct OrganismRuntime {
    pub entity_id: u32,
    pub archetype: Archetype,
    /// 0 = pure grazer, 1 = pure hunter.
    pub diet: f32,
    pub clade_id: u64,
    pub brain: BrainWeights,
    pub sensors: [f32; INPUT_SIZE],
    pub outputs: [f32; OUTPUT_SIZE],
    /// Seconds until the organism may reproduce again.
    pub repro_cooldown: f32,
    /// Seconds until the organism may bite again after a kill.
    pub digest_cooldown: f32,
    /// Seconds until a newborn predator may hunt.
    pub hunt_cooldown: f32,
    pub last_thrust: f32,
}

impl OrganismRuntime {
    fn new(archetype: Archetype, diet: f32, clade_id: u64, brain: BrainWeights) -> Self {
        Self {
            entity_id: 0,
            archetype,
            diet,
            clade_id,
            brain,
            sensors: [0.0; INPUT_SIZE],
            outputs: [0.0; OUTPUT_SIZE],
            repro_cooldown: 0.0,
            digest_cooldown: 0.0,
            hunt_cooldown: 0.0,
            last_thrust: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpawnCause {
    Founder,
    Birth,
    Respawn,
    Reseed,
}

#[derive(Debug)]
struct SpawnOrder {
    data: OrganismData,
    runtime: OrganismRuntime,
}

/// Summary of one completed tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    pub tick: u64,
    pub births: usize,
    pub deaths: usize,
    /// Set when this tick closed a stats window.
    pub window: Option<WindowStats>,
}

/// Predator/prey ecosystem on a toroidal resource field.
pub struct EcosystemWorld {
    config: SimConfig,
    dt: f32,
    tick: u64,
    rng: SmallRng,
    arena: OrganismArena,
    runtime: OrganismMap<OrganismRuntime>,
    index: UniformGridIndex,
    field: ResourceField,
    collector: WindowedStatsCollector,
    detector: BookmarkDetector,
    lifetimes: LifetimeTracker,
    hall_of_fame: HallOfFame,
    pending_deaths: Vec<OrganismId>,
    pending_spawns: Vec<SpawnOrder>,
    next_entity_id: u32,
    next_clade_id: u64,
    empty_hall_warned: [bool; 2],
    bookmarks: Vec<Bookmark>,
    on_stats: Option<StatsCallback>,
}

impl fmt::Debug for EcosystemWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcosystemWorld")
            .field("tick", &self.tick)
            .field("prey", &self.arena.count(Kind::Prey))
            .field("pred", &self.arena.count(Kind::Predator))
            .field("hall_entries", &self.hall_of_fame.total_entries())
            .finish()
    }
}

impl EcosystemWorld {
    /// Validate `config` and seed the founding populations.
    pub fn new(seed: u64, config: SimConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let rates = FieldRates {
            capacity: config.world.resource_capacity,
            regrowth: config.world.resource_regrowth,
            diffusion: config.world.resource_diffusion,
            decay_rate: config.detritus.decay_rate.max(0.0),
            decay_efficiency: config.detritus.decay_efficiency,
        };
        let field = ResourceField::new(
            config.world.width,
            config.world.height,
            config.world.resource_cell_size,
            config.world.initial_resource,
            rates,
        )?;
        let index = UniformGridIndex::new(
            config.physics.grid_cell_size,
            config.world.width,
            config.world.height,
        )?;
        let capacity = (config.population.initial_prey + config.population.initial_pred) * 2;
        let mut world = Self {
            dt: config.physics.dt as f32,
            tick: 0,
            rng: SmallRng::seed_from_u64(seed),
            arena: OrganismArena::with_capacity(capacity),
            runtime: OrganismMap::new(),
            index,
            field,
            collector: WindowedStatsCollector::new(
                config.telemetry.stats_window_sec,
                config.physics.dt,
            ),
            detector: BookmarkDetector::new(
                config.telemetry.bookmark_history,
                config.bookmarks.clone(),
            ),
            lifetimes: LifetimeTracker::new(),
            hall_of_fame: HallOfFame::from_config(&config.hall_of_fame, seed ^ HALL_SEED_SALT),
            pending_deaths: Vec::new(),
            pending_spawns: Vec::new(),
            next_entity_id: 1,
            next_clade_id: 1,
            empty_hall_warned: [false; 2],
            bookmarks: Vec::new(),
            on_stats: None,
            config,
        };
        world.seed_population();
        Ok(world)
    }

    /// Replace the archive used for admission and reseeding, keeping this world's entry rules.
    #[must_use]
    pub fn with_hall_of_fame(mut self, hall_of_fame: HallOfFame) -> Self {
        let rules = &self.config.hall_of_fame;
        self.hall_of_fame = hall_of_fame.with_rules(rules.entry.clone(), rules.fitness.clone());
        self
    }

    /// Install the callback invoked once per completed stats window.
    pub fn set_stats_callback(&mut self, on_stats: Option<StatsCallback>) {
        self.on_stats = on_stats;
    }

    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn population(&self, kind: Kind) -> usize {
        self.arena.count(kind)
    }

    #[must_use]
    pub fn arena(&self) -> &OrganismArena {
        &self.arena
    }

    pub fn runtime(&self, id: OrganismId) -> Option<&OrganismRuntime> {
        self.runtime.get(id)
    }

    #[must_use]
    pub fn field(&self) -> &ResourceField {
        &self.field
    }

    #[must_use]
    pub fn lifetimes(&self) -> &LifetimeTracker {
        &self.lifetimes
    }

    #[must_use]
    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    /// Bookmarks detected since the last call.
    pub fn take_bookmarks(&mut self) -> Vec<Bookmark> {
        std::mem::take(&mut self.bookmarks)
    }

    /// Advance the world by one fixed timestep.
    pub fn step(&mut self) -> TickEvents {
        self.stage_aging();
        self.field.step(self.dt);
        self.stage_sense();
        self.stage_think();
        self.stage_move();
        self.stage_forage();
        self.stage_hunt();
        let deaths = self.stage_death_cleanup();
        self.stage_reproduction();
        let mut births = self.stage_spawn_commit();
        births += self.stage_respawn();
        self.tick += 1;
        let window = self.stage_telemetry();
        TickEvents {
            tick: self.tick,
            births,
            deaths,
            window,
        }
    }

    fn seed_population(&mut self) {
        let energy = self.config.energy.initial_energy;
        for kind in Kind::ALL {
            let count = match kind {
                Kind::Prey => self.config.population.initial_prey,
                Kind::Predator => self.config.population.initial_pred,
            };
            for _ in 0..count {
                let order = self.random_order(kind, energy, None);
                self.commit(order, SpawnCause::Founder);
            }
        }
        debug!(
            prey = self.arena.count(Kind::Prey),
            pred = self.arena.count(Kind::Predator),
            "seeded founders"
        );
    }

    fn max_population(&self, kind: Kind) -> usize {
        match kind {
            Kind::Prey => self.config.population.max_prey,
            Kind::Predator => self.config.population.max_pred,
        }
    }

    fn next_clade(&mut self) -> u64 {
        let clade = self.next_clade_id;
        self.next_clade_id += 1;
        clade
    }

    /// A founder-like organism at a random position in a fresh clade.
    fn random_order(&mut self, kind: Kind, energy: f32, brain: Option<BrainWeights>) -> SpawnOrder {
        let archetype = kind.founder();
        let diet = self.config.archetypes.get(archetype).diet;
        let position = Position::new(
            self.rng.random_range(0.0..self.config.world.width),
            self.rng.random_range(0.0..self.config.world.height),
        );
        let heading = self.rng.random_range(-PI..PI);
        let brain = brain.unwrap_or_else(|| {
            BrainWeights::random(&mut self.rng, INPUT_SIZE, HIDDEN_SIZE, OUTPUT_SIZE)
        });
        let clade_id = self.next_clade();
        SpawnOrder {
            data: OrganismData {
                position,
                heading,
                speed: 0.0,
                energy,
                age_ticks: 0,
                kind,
            },
            runtime: OrganismRuntime::new(archetype, diet, clade_id, brain),
        }
    }

    fn commit(&mut self, order: SpawnOrder, cause: SpawnCause) -> OrganismId {
        let SpawnOrder { data, mut runtime } = order;
        runtime.entity_id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        self.lifetimes.register(
            runtime.entity_id,
            self.tick,
            runtime.clade_id,
            runtime.archetype,
            runtime.diet,
        );
        self.lifetimes.update_energy(runtime.entity_id, data.energy);
        if cause != SpawnCause::Founder {
            self.collector.record_birth(data.kind);
        }
        let id = self.arena.insert(data);
        self.runtime.insert(id, runtime);
        id
    }

    fn stage_aging(&mut self) {
        for age in self.arena.columns_mut().ages_mut() {
            *age = age.saturating_add(1);
        }
        let dt = self.dt;
        for runtime in self.runtime.values_mut() {
            runtime.repro_cooldown = (runtime.repro_cooldown - dt).max(0.0);
            runtime.digest_cooldown = (runtime.digest_cooldown - dt).max(0.0);
            runtime.hunt_cooldown = (runtime.hunt_cooldown - dt).max(0.0);
        }
    }

    fn stage_sense(&mut self) {
        if self.arena.is_empty() {
            return;
        }
        let columns = self.arena.columns();
        if self.index.rebuild(columns.positions()).is_err() {
            return;
        }
        let positions = columns.positions();
        let headings = columns.headings();
        let energies = columns.energies();
        let kinds = columns.kinds();
        let index = &self.index;
        let field = &self.field;
        let width = self.config.world.width;
        let height = self.config.world.height;
        let capacity = self.config.world.resource_capacity;
        let max_energy = self.config.energy.max_energy;
        let refuge_edge = self.config.refugia.band_fraction * height;
        let vision = Kind::ALL.map(|kind| self.config.archetypes.get(kind.founder()).vision_range);

        let sensors: Vec<[f32; INPUT_SIZE]> = (0..positions.len())
            .into_par_iter()
            .map(|idx| {
                let kind = kinds[idx];
                let range = vision[kind.index()];
                let here = positions[idx];
                let mut nearest: Option<(f32, usize)> = None;
                let mut crowd = 0usize;
                index.neighbors_within(idx, range * range, &mut |other, dist_sq| {
                    if kinds[other] == kind {
                        crowd += 1;
                        return;
                    }
                    let dist_sq = dist_sq.into_inner();
                    if nearest.is_none_or(|(best, _)| dist_sq < best) {
                        nearest = Some((dist_sq, other));
                    }
                });

                let mut sensors = [0.0f32; INPUT_SIZE];
                sensors[0] = (field.sample(here) / capacity).clamp(0.0, 1.0);
                sensors[1] = (energies[idx] / max_energy).clamp(0.0, 1.0);
                if let Some((dist_sq, other)) = nearest {
                    let dx = toroidal_delta(here.x, positions[other].x, width);
                    let dy = toroidal_delta(here.y, positions[other].y, height);
                    let bearing = dy.atan2(dx) - headings[idx];
                    sensors[2] = (1.0 - dist_sq.sqrt() / range).clamp(0.0, 1.0);
                    sensors[3] = bearing.sin();
                    sensors[4] = bearing.cos();
                }
                sensors[5] = (crowd as f32 / CROWDING_SATURATION).min(1.0);
                sensors[6] = if here.y < refuge_edge { 1.0 } else { 0.0 };
                sensors[7] = 1.0;
                sensors
            })
            .collect();

        for (idx, id) in self.arena.handles().iter().enumerate() {
            if let Some(runtime) = self.runtime.get_mut(*id) {
                runtime.sensors = sensors[idx];
            }
        }
    }

    fn stage_think(&mut self) {
        let mut batch: Vec<&mut OrganismRuntime> = self.runtime.values_mut().collect();
        batch.par_iter_mut().for_each(|runtime| {
            let mut outputs = [0.0f32; OUTPUT_SIZE];
            runtime.brain.forward(&runtime.sensors, &mut outputs);
            runtime.outputs = outputs;
        });
    }

    fn stage_move(&mut self) {
        let dt = self.dt;
        let width = self.config.world.width;
        let height = self.config.world.height;
        let energy = &self.config.energy;
        let (base_cost, move_cost, accel_cost) =
            (energy.base_cost, energy.move_cost, energy.accel_cost);
        let archetypes = Kind::ALL.map(|kind| self.config.archetypes.get(kind.founder()).clone());
        let handles = self.arena.handles().to_vec();
        let columns = self.arena.columns_mut();
        let mut heat = 0.0f32;

        for (idx, id) in handles.iter().enumerate() {
            let Some(runtime) = self.runtime.get_mut(*id) else {
                continue;
            };
            let settings = &archetypes[columns.kinds()[idx].index()];
            let thrust = ((runtime.outputs[0] + 1.0) * 0.5).clamp(0.0, 1.0);
            let turn = runtime.outputs[1].clamp(-1.0, 1.0);

            let heading = wrap_angle(columns.headings()[idx] + turn * settings.max_turn_rate * dt);
            let speed = thrust * settings.max_speed;
            let position = columns.positions()[idx];
            columns.headings_mut()[idx] = heading;
            columns.speeds_mut()[idx] = speed;
            columns.positions_mut()[idx] = Position::new(
                wrap_position(position.x + heading.cos() * speed * dt, width),
                wrap_position(position.y + heading.sin() * speed * dt, height),
            );

            let drain = (base_cost * settings.metabolic_rate + move_cost * thrust) * dt
                + accel_cost * (thrust - runtime.last_thrust).abs();
            runtime.last_thrust = thrust;
            let energy = &mut columns.energies_mut()[idx];
            heat += drain.min(energy.max(0.0));
            *energy -= drain;
            if *energy <= 0.0 {
                *energy = 0.0;
                self.pending_deaths.push(*id);
            }
        }
        self.field.add_heat(heat);
    }

    fn stage_forage(&mut self) {
        let rate = self.config.energy.feeding_rate * self.dt;
        let efficiency = self.config.energy.feeding_efficiency;
        let max_energy = self.config.energy.max_energy;
        let handles = self.arena.handles().to_vec();
        let columns = self.arena.columns_mut();
        let mut heat = 0.0f32;

        for (idx, id) in handles.iter().enumerate() {
            let energy = columns.energies()[idx];
            if columns.kinds()[idx] != Kind::Prey || energy <= 0.0 {
                continue;
            }
            let Some(runtime) = self.runtime.get(*id) else {
                continue;
            };
            let appetite = rate * (1.0 - runtime.diet).clamp(0.0, 1.0);
            let headroom = (max_energy - energy).max(0.0) / efficiency.max(f32::EPSILON);
            let want = appetite.min(headroom);
            if want <= 0.0 {
                continue;
            }
            let taken = self.field.graze(columns.positions()[idx], want);
            let gain = taken * efficiency;
            heat += taken - gain;
            let updated = (energy + gain).min(max_energy);
            columns.energies_mut()[idx] = updated;
            self.lifetimes.record_forage(runtime.entity_id, gain);
            self.lifetimes.update_energy(runtime.entity_id, updated);
        }
        self.field.add_heat(heat);
    }

    fn stage_hunt(&mut self) {
        if self.arena.count(Kind::Predator) == 0 || self.arena.count(Kind::Prey) == 0 {
            return;
        }
        if self.index.rebuild(self.arena.columns().positions()).is_err() {
            return;
        }
        let handles = self.arena.handles().to_vec();
        let kinds = self.arena.columns().kinds().to_vec();
        let positions = self.arena.columns().positions().to_vec();
        let mut energies = self.arena.columns().energies().to_vec();

        let energy = &self.config.energy;
        let range_sq = energy.bite_range * energy.bite_range;
        let (bite_size, bite_cost, efficiency, max_energy, cooldown_factor) = (
            energy.bite_size,
            energy.bite_cost,
            energy.feeding_efficiency,
            energy.max_energy,
            energy.cooldown_factor,
        );
        let carcass_fraction = self.config.detritus.carcass_fraction;
        let refuge_edge = self.config.refugia.band_fraction * self.config.world.height;
        let refuge_strength = self.config.refugia.strength;
        let mut heat = 0.0f32;

        for idx in 0..handles.len() {
            if kinds[idx] != Kind::Predator || energies[idx] <= 0.0 {
                continue;
            }
            let Some(hunter) = self.runtime.get_mut(handles[idx]) else {
                continue;
            };
            if hunter.outputs[2] <= 0.0 || hunter.hunt_cooldown > 0.0 {
                continue;
            }
            if hunter.digest_cooldown > 0.0 {
                self.collector.record_bite_blocked(BlockReason::Digesting);
                continue;
            }

            let mut target: Option<(f32, usize)> = None;
            self.index.neighbors_within(idx, range_sq, &mut |other, dist_sq| {
                if kinds[other] != Kind::Prey || energies[other] <= 0.0 {
                    return;
                }
                let dist_sq = dist_sq.into_inner();
                if target.is_none_or(|(best, _)| dist_sq < best) {
                    target = Some((dist_sq, other));
                }
            });
            let Some((_, prey)) = target else {
                continue;
            };

            let hunter_id = hunter.entity_id;
            self.collector.record_bite_attempt();
            self.lifetimes.record_bite_attempt(hunter_id);
            heat += bite_cost.min(energies[idx]);
            energies[idx] -= bite_cost;
            if energies[idx] <= 0.0 {
                energies[idx] = 0.0;
                self.pending_deaths.push(handles[idx]);
                continue;
            }
            if positions[prey].y < refuge_edge && self.rng.random::<f32>() < refuge_strength {
                self.collector.record_bite_blocked(BlockReason::Refugia);
                continue;
            }

            self.collector.record_bite_hit();
            self.lifetimes.record_bite_hit(hunter_id);
            let taken = bite_size.min(energies[prey]);
            energies[prey] -= taken;
            let assimilated = taken * efficiency * hunter.diet.clamp(0.0, 1.0);
            let absorbed = assimilated.min((max_energy - energies[idx]).max(0.0));
            energies[idx] += absorbed;
            let waste = taken - absorbed;
            let carcass = waste * carcass_fraction;
            self.field.deposit_detritus(positions[prey], carcass);
            heat += waste - carcass;
            self.lifetimes.update_energy(hunter_id, energies[idx]);

            if energies[prey] <= 0.0 {
                energies[prey] = 0.0;
                self.collector.record_kill();
                self.lifetimes.record_kill(hunter_id);
                hunter.digest_cooldown = cooldown_factor * absorbed;
                self.pending_deaths.push(handles[prey]);
            }
        }

        self.arena
            .columns_mut()
            .energies_mut()
            .copy_from_slice(&energies);
        self.field.add_heat(heat);
    }

    fn stage_death_cleanup(&mut self) -> usize {
        if self.pending_deaths.is_empty() {
            return 0;
        }
        let dead: HashSet<OrganismId> = self.pending_deaths.drain(..).collect();
        let dt = self.config.physics.dt;
        let carcass_fraction = self.config.detritus.carcass_fraction;
        let mut heat = 0.0f32;

        for idx in 0..self.arena.len() {
            let id = self.arena.handles()[idx];
            if !dead.contains(&id) {
                continue;
            }
            let data = self.arena.columns().snapshot(idx);
            self.collector.record_death(data.kind);
            if let Some(runtime) = self.runtime.remove(id) {
                self.lifetimes
                    .update_survival(runtime.entity_id, self.tick, dt);
                if let Some(stats) = self.lifetimes.remove(runtime.entity_id) {
                    self.hall_of_fame
                        .consider(&runtime.brain, &stats, runtime.entity_id);
                }
            }
            let residue = data.energy.max(0.0);
            let carcass = residue * carcass_fraction;
            self.field.deposit_detritus(data.position, carcass);
            heat += residue - carcass;
        }
        self.field.add_heat(heat);
        self.arena.remove_many(&dead)
    }

    fn stage_reproduction(&mut self) {
        let handles = self.arena.handles().to_vec();
        if handles.is_empty() {
            return;
        }
        let repro: ReproductionConfig = self.config.reproduction.clone();
        let maturity_ticks = self.config.ticks_for(f64::from(repro.maturity_age));
        let width = self.config.world.width;
        let height = self.config.world.height;
        let caps = Kind::ALL.map(|kind| self.max_population(kind));
        let mut counts = Kind::ALL.map(|kind| self.arena.count(kind));

        for (idx, id) in handles.iter().enumerate() {
            let parent = self.arena.columns().snapshot(idx);
            let slot = parent.kind.index();
            let (threshold, cooldown, density_k) = match parent.kind {
                Kind::Prey => (repro.prey_threshold, repro.prey_cooldown, repro.prey_density_k),
                Kind::Predator => (repro.pred_threshold, repro.pred_cooldown, repro.pred_density_k),
            };
            if parent.energy < threshold
                || parent.age_ticks < maturity_ticks
                || counts[slot] >= caps[slot]
            {
                continue;
            }
            let Some(runtime) = self.runtime.get_mut(*id) else {
                continue;
            };
            if runtime.repro_cooldown > 0.0 {
                continue;
            }
            let chance = density_k / (density_k + counts[slot] as f32);
            if self.rng.random::<f32>() >= chance {
                continue;
            }

            let child_energy = parent.energy * (1.0 - repro.parent_energy_split);
            self.arena.columns_mut().energies_mut()[idx] =
                parent.energy * repro.parent_energy_split;
            let jitter = if repro.cooldown_jitter > 0.0 {
                self.rng
                    .random_range(-repro.cooldown_jitter..repro.cooldown_jitter)
            } else {
                0.0
            };
            runtime.repro_cooldown = (cooldown + jitter).max(0.0);

            let angle = self.rng.random_range(-PI..PI);
            let heading_offset = if repro.heading_jitter > 0.0 {
                self.rng
                    .random_range(-repro.heading_jitter..repro.heading_jitter)
            } else {
                0.0
            };
            let mut brain = runtime.brain.clone();
            brain.mutate(&mut self.rng, &self.config.mutation);
            let mut child = OrganismRuntime::new(
                runtime.archetype,
                runtime.diet,
                runtime.clade_id,
                brain,
            );
            if parent.kind == Kind::Predator {
                child.hunt_cooldown = repro.newborn_hunt_cooldown;
            }
            self.lifetimes.record_child(runtime.entity_id);

            self.pending_spawns.push(SpawnOrder {
                data: OrganismData {
                    position: Position::new(
                        wrap_position(parent.position.x + angle.cos() * repro.spawn_offset, width),
                        wrap_position(parent.position.y + angle.sin() * repro.spawn_offset, height),
                    ),
                    heading: wrap_angle(parent.heading + heading_offset),
                    speed: 0.0,
                    energy: child_energy,
                    age_ticks: 0,
                    kind: parent.kind,
                },
                runtime: child,
            });
            counts[slot] += 1;
        }
    }

    fn stage_spawn_commit(&mut self) -> usize {
        let orders = std::mem::take(&mut self.pending_spawns);
        let births = orders.len();
        for order in orders {
            self.commit(order, SpawnCause::Birth);
        }
        births
    }

    fn stage_respawn(&mut self) -> usize {
        let mut spawned = 0;
        let population = &self.config.population;
        if population.respawn_enabled && self.arena.len() < population.respawn_threshold {
            let (count, chance) = (population.respawn_count, population.predator_spawn_chance);
            let energy = self.config.energy.initial_energy;
            for _ in 0..count {
                let kind = if self.rng.random::<f32>() < chance {
                    Kind::Predator
                } else {
                    Kind::Prey
                };
                if self.arena.count(kind) >= self.max_population(kind) {
                    continue;
                }
                let order = self.random_order(kind, energy, None);
                self.commit(order, SpawnCause::Respawn);
                spawned += 1;
            }
            debug!(tick = self.tick, spawned, "respawned random organisms");
        }

        let reseed = &self.config.hall_of_fame;
        if reseed.reseed_enabled {
            let (threshold, count, energy) =
                (reseed.reseed_threshold, reseed.reseed_count, reseed.reseed_energy);
            for kind in Kind::ALL {
                if self.arena.count(kind) >= threshold {
                    continue;
                }
                for _ in 0..count {
                    if self.arena.count(kind) >= self.max_population(kind) {
                        break;
                    }
                    let brain = self.reseed_brain(kind);
                    let order = self.random_order(kind, energy, Some(brain));
                    self.commit(order, SpawnCause::Reseed);
                    spawned += 1;
                }
                debug!(tick = self.tick, kind = kind.name(), "reseeded from hall of fame");
            }
        }
        spawned
    }

    /// A mutated archived brain for `kind`, or random weights when none is usable.
    fn reseed_brain(&mut self, kind: Kind) -> BrainWeights {
        let archetype = kind.founder();
        match self.hall_of_fame.sample(archetype) {
            Some(mut brain) if brain.has_shape(INPUT_SIZE, HIDDEN_SIZE, OUTPUT_SIZE) => {
                brain.mutate(&mut self.rng, &self.config.mutation);
                brain
            }
            sampled => {
                if !self.empty_hall_warned[kind.index()] {
                    self.empty_hall_warned[kind.index()] = true;
                    warn!(
                        archetype = archetype.name(),
                        archived = sampled.is_some(),
                        "no usable archived brain; reseeding with random weights"
                    );
                }
                BrainWeights::random(&mut self.rng, INPUT_SIZE, HIDDEN_SIZE, OUTPUT_SIZE)
            }
        }
    }

    fn stage_telemetry(&mut self) -> Option<WindowStats> {
        if !self.collector.should_flush(self.tick) {
            return None;
        }
        let columns = self.arena.columns();
        let mut prey_energies = Vec::with_capacity(self.arena.count(Kind::Prey));
        let mut pred_energies = Vec::with_capacity(self.arena.count(Kind::Predator));
        let mut resource_at_prey = 0.0f64;
        for ((kind, energy), position) in columns
            .kinds()
            .iter()
            .zip(columns.energies())
            .zip(columns.positions())
        {
            match kind {
                Kind::Prey => {
                    prey_energies.push(f64::from(*energy));
                    resource_at_prey += f64::from(self.field.sample(*position));
                }
                Kind::Predator => pred_energies.push(f64::from(*energy)),
            }
        }
        let diets: Vec<f64> = self
            .arena
            .handles()
            .iter()
            .filter_map(|id| self.runtime.get(*id))
            .map(|runtime| f64::from(runtime.diet))
            .collect();
        let mean_resource_at_prey = if prey_energies.is_empty() {
            0.0
        } else {
            resource_at_prey / prey_energies.len() as f64
        };
        let pools = EnergyPools {
            total_resource: self.field.total_resource(),
            total_detritus: self.field.total_detritus(),
            total_organisms: prey_energies.iter().chain(&pred_energies).sum(),
            heat_loss_accum: self.field.heat_loss(),
            energy_input: self.field.energy_input(),
        };

        let stats = self.collector.flush(
            self.tick,
            FlushInput {
                prey_count: prey_energies.len(),
                pred_count: pred_energies.len(),
                prey_energies: &prey_energies,
                pred_energies: &pred_energies,
                diets: &diets,
                mean_resource_at_prey,
                active_clades: self.lifetimes.active_clade_count(),
                pools,
            },
        );
        let log_windows = self.config.telemetry.log_windows;
        if log_windows {
            stats.log();
        }
        for bookmark in self.detector.check(&stats) {
            if log_windows {
                bookmark.log();
            }
            self.bookmarks.push(bookmark);
        }
        if let Some(on_stats) = self.on_stats.as_mut() {
            on_stats(&stats);
        }
        Some(stats)
    }
}

impl Episode for EcosystemWorld {
    fn step(&mut self) {
        EcosystemWorld::step(self);
    }

    fn tick(&self) -> u64 {
        self.tick
    }

    fn population(&self, kind: Kind) -> usize {
        self.arena.count(kind)
    }

    fn hall_of_fame(&self) -> HallOfFame {
        self.hall_of_fame.clone()
    }
}

/// Builds [`EcosystemWorld`] episodes, optionally preloading an archived hall of fame.
#[derive(Debug, Clone, Default)]
pub struct WorldFactory {
    preload: Option<HallOfFame>,
}

impl WorldFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every episode starts from a copy of `hall_of_fame`.
    #[must_use]
    pub fn with_hall_of_fame(hall_of_fame: HallOfFame) -> Self {
        Self {
            preload: Some(hall_of_fame),
        }
    }
}

impl EpisodeFactory for WorldFactory {
    type Episode = EcosystemWorld;

    fn new_episode(
        &self,
        seed: u64,
        config: &SimConfig,
        on_stats: Option<StatsCallback>,
    ) -> Result<EcosystemWorld, EpisodeError> {
        let mut world = EcosystemWorld::new(seed, config.clone())?;
        if let Some(hall_of_fame) = &self.preload {
            world = world.with_hall_of_fame(hall_of_fame.clone());
        }
        world.set_stats_callback(on_stats);
        Ok(world)
    }
}

fn wrap_position(value: f32, extent: f32) -> f32 {
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs.
    if wrapped >= extent { 0.0 } else { wrapped }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
