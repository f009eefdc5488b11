//! Bounded, per-archetype archive of successful lineages.
//!
//! Each archetype owns one hall sorted by descending fitness and capped at `max_size`. Halls are
//! addressed by [`Archetype`]; archetype names appear only in the JSON document, where each key
//! is an archetype name mapping to that hall's entries.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::brain::BrainWeights;
use crate::config::{HallEntryCriteria, HallFitnessWeights, HallOfFameConfig};
use crate::kind::Archetype;
use crate::telemetry::lifetime::LifetimeStats;

/// Candidates drawn per tournament.
pub const TOURNAMENT_SIZE: usize = 3;

/// Capacity used when loading a document whose halls are all smaller than this.
pub const DEFAULT_LOAD_CAPACITY: usize = 30;

#[derive(Debug, Error)]
pub enum HallOfFameError {
    #[error("hall of fame I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("hall of fame JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// One archived individual.
#[derive(Debug, Clone, PartialEq)]
pub struct HallEntry {
    pub weights: BrainWeights,
    pub fitness: f32,
    pub entity_id: u32,
    pub children: u32,
    pub kills: u32,
    pub survival_sec: f32,
    pub foraging: f32,
    pub clade_id: u64,
    pub founder: Archetype,
    pub diet: f32,
}

/// Size and best fitness of one hall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HallSummary {
    pub archetype: Archetype,
    pub size: usize,
    pub top_fitness: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    entity_id: u32,
    fitness: f32,
    children: u32,
    kills: u32,
    survival_sec: f32,
    foraging: f32,
    clade_id: u64,
    founder_archetype: String,
    diet: f32,
    brain: BrainWeights,
}

#[derive(Debug, Clone)]
pub struct HallOfFame {
    halls: [Vec<HallEntry>; Archetype::COUNT],
    max_size: usize,
    entry: HallEntryCriteria,
    fitness: HallFitnessWeights,
    rng: SmallRng,
}

impl HallOfFame {
    /// Empty archive with default admission rules. `max_size` is raised to at least 1.
    #[must_use]
    pub fn new(max_size: usize, seed: u64) -> Self {
        Self {
            halls: std::array::from_fn(|_| Vec::new()),
            max_size: max_size.max(1),
            entry: HallEntryCriteria::default(),
            fitness: HallFitnessWeights::default(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Empty archive using the capacity and admission rules from `config`.
    #[must_use]
    pub fn from_config(config: &HallOfFameConfig, seed: u64) -> Self {
        Self::new(config.max_size, seed).with_rules(config.entry.clone(), config.fitness.clone())
    }

    #[must_use]
    pub fn with_rules(mut self, entry: HallEntryCriteria, fitness: HallFitnessWeights) -> Self {
        self.entry = entry;
        self.fitness = fitness;
        self
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Offer a dead organism for admission. Returns whether it was archived.
    pub fn consider(
        &mut self,
        weights: &BrainWeights,
        stats: &LifetimeStats,
        entity_id: u32,
    ) -> bool {
        if !self.meets_entry_criteria(stats) {
            return false;
        }
        let entry = HallEntry {
            weights: weights.clone(),
            fitness: self.score(stats),
            entity_id,
            children: stats.children,
            kills: stats.kills,
            survival_sec: stats.survival_sec,
            foraging: stats.total_foraged,
            clade_id: stats.clade_id,
            founder: stats.founder,
            diet: stats.birth_diet,
        };
        self.insert(stats.founder, entry)
    }

    fn meets_entry_criteria(&self, stats: &LifetimeStats) -> bool {
        if stats.children >= self.entry.min_children {
            return true;
        }
        if stats.survival_sec < self.entry.min_survival_sec {
            return false;
        }
        if stats.is_predatory() {
            stats.kills >= self.entry.min_kills
        } else {
            stats.total_foraged >= self.entry.min_foraging
        }
    }

    fn score(&self, stats: &LifetimeStats) -> f32 {
        let weights = &self.fitness;
        let achievement = if stats.is_predatory() {
            stats.kills as f32 * weights.kills
        } else {
            stats.total_foraged * weights.forage
        };
        stats.children as f32 * weights.children + stats.survival_sec * weights.survival + achievement
    }

    /// Insert keeping descending fitness order; equal fitness goes after existing entries.
    /// Returns false when a full hall would place the entry past its capacity.
    pub fn insert(&mut self, archetype: Archetype, entry: HallEntry) -> bool {
        let max_size = self.max_size;
        let hall = &mut self.halls[archetype.index()];
        let idx = hall.partition_point(|existing| existing.fitness >= entry.fitness);
        if hall.len() >= max_size && idx >= max_size {
            return false;
        }
        hall.insert(idx, entry);
        hall.truncate(max_size);
        true
    }

    /// Tournament selection: the fittest of [`TOURNAMENT_SIZE`] uniform draws (with
    /// replacement), or `None` when the hall is empty.
    pub fn sample(&mut self, archetype: Archetype) -> Option<BrainWeights> {
        let hall = &self.halls[archetype.index()];
        if hall.is_empty() {
            return None;
        }
        let mut best: Option<&HallEntry> = None;
        for _ in 0..TOURNAMENT_SIZE.min(hall.len()) {
            let candidate = &hall[self.rng.random_range(0..hall.len())];
            if best.is_none_or(|current| candidate.fitness > current.fitness) {
                best = Some(candidate);
            }
        }
        best.map(|entry| entry.weights.clone())
    }

    #[must_use]
    pub fn size(&self, archetype: Archetype) -> usize {
        self.halls[archetype.index()].len()
    }

    /// Highest archived fitness, or 0 for an empty hall.
    #[must_use]
    pub fn top_fitness(&self, archetype: Archetype) -> f32 {
        self.halls[archetype.index()]
            .first()
            .map_or(0.0, |entry| entry.fitness)
    }

    #[must_use]
    pub fn entries(&self, archetype: Archetype) -> &[HallEntry] {
        &self.halls[archetype.index()]
    }

    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.halls.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn stats(&self) -> Vec<HallSummary> {
        Archetype::ALL
            .into_iter()
            .map(|archetype| HallSummary {
                archetype,
                size: self.size(archetype),
                top_fitness: self.top_fitness(archetype),
            })
            .collect()
    }

    /// Serialize as a pretty JSON object keyed by archetype name.
    pub fn to_json_string(&self) -> Result<String, HallOfFameError> {
        let document: BTreeMap<&str, Vec<EntryRecord>> = Archetype::ALL
            .into_iter()
            .map(|archetype| {
                let records = self.halls[archetype.index()]
                    .iter()
                    .map(|entry| EntryRecord {
                        entity_id: entry.entity_id,
                        fitness: entry.fitness,
                        children: entry.children,
                        kills: entry.kills,
                        survival_sec: entry.survival_sec,
                        foraging: entry.foraging,
                        clade_id: entry.clade_id,
                        founder_archetype: entry.founder.name().to_owned(),
                        diet: entry.diet,
                        brain: entry.weights.clone(),
                    })
                    .collect();
                (archetype.name(), records)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Rebuild an archive from JSON. Capacity is the larger of [`DEFAULT_LOAD_CAPACITY`] and the
    /// largest hall in the document; unknown hall names are skipped with a warning.
    pub fn from_json_str(raw: &str, seed: u64) -> Result<Self, HallOfFameError> {
        let document: BTreeMap<String, Vec<EntryRecord>> = serde_json::from_str(raw)?;
        let max_size = document
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(DEFAULT_LOAD_CAPACITY);
        let mut hall_of_fame = Self::new(max_size, seed);

        for (name, records) in document {
            let Some(archetype) = Archetype::from_name(&name) else {
                warn!(archetype = %name, "hall_of_fame_load: unknown archetype, skipping");
                continue;
            };
            for record in records {
                let founder = Archetype::from_name(&record.founder_archetype).unwrap_or(archetype);
                hall_of_fame.insert(
                    archetype,
                    HallEntry {
                        weights: record.brain,
                        fitness: record.fitness,
                        entity_id: record.entity_id,
                        children: record.children,
                        kills: record.kills,
                        survival_sec: record.survival_sec,
                        foraging: record.foraging,
                        clade_id: record.clade_id,
                        founder,
                        diet: record.diet,
                    },
                );
            }
        }
        Ok(hall_of_fame)
    }

    pub fn save(&self, path: &Path) -> Result<(), HallOfFameError> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn load(path: &Path, seed: u64) -> Result<Self, HallOfFameError> {
        Self::from_json_str(&fs::read_to_string(path)?, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fitness: f32, founder: Archetype) -> HallEntry {
        HallEntry {
            weights: BrainWeights::zeros(2, 2, 1),
            fitness,
            entity_id: fitness as u32,
            children: 1,
            kills: 0,
            survival_sec: 10.0,
            foraging: 0.5,
            clade_id: 3,
            founder,
            diet: 0.0,
        }
    }

    fn fitnesses(hall: &HallOfFame, archetype: Archetype) -> Vec<f32> {
        hall.entries(archetype).iter().map(|e| e.fitness).collect()
    }

    #[test]
    fn capped_insertion_keeps_the_best() {
        let mut hall = HallOfFame::new(2, 1);
        assert!(hall.insert(Archetype::Grazer, entry(5.0, Archetype::Grazer)));
        assert!(hall.insert(Archetype::Grazer, entry(3.0, Archetype::Grazer)));
        assert!(hall.insert(Archetype::Grazer, entry(8.0, Archetype::Grazer)));
        assert!(!hall.insert(Archetype::Grazer, entry(1.0, Archetype::Grazer)));
        assert_eq!(fitnesses(&hall, Archetype::Grazer), vec![8.0, 5.0]);
        assert_eq!(hall.size(Archetype::Hunter), 0);
        assert_eq!(hall.top_fitness(Archetype::Grazer), 8.0);
        assert_eq!(hall.top_fitness(Archetype::Hunter), 0.0);
    }

    #[test]
    fn equal_fitness_does_not_displace_full_hall() {
        let mut hall = HallOfFame::new(2, 1);
        hall.insert(Archetype::Hunter, entry(4.0, Archetype::Hunter));
        hall.insert(Archetype::Hunter, entry(2.0, Archetype::Hunter));
        assert!(!hall.insert(Archetype::Hunter, entry(2.0, Archetype::Hunter)));
        assert!(hall.insert(Archetype::Hunter, entry(4.0, Archetype::Hunter)));
        assert_eq!(fitnesses(&hall, Archetype::Hunter), vec![4.0, 4.0]);
    }

    #[test]
    fn consider_applies_entry_criteria_and_weights() {
        let mut hall = HallOfFame::new(10, 1);
        let weights = BrainWeights::zeros(1, 1, 1);

        let mut hunter = LifetimeStats::new(0, 1, Archetype::Hunter, 1.0);
        hunter.survival_sec = 30.0;
        hunter.kills = 1;
        assert!(!hall.consider(&weights, &hunter, 1));
        hunter.kills = 2;
        assert!(hall.consider(&weights, &hunter, 1));
        // 30 * 0.05 + 2 * 2
        assert!((hall.top_fitness(Archetype::Hunter) - 5.5).abs() < 1e-6);

        let mut grazer = LifetimeStats::new(0, 2, Archetype::Grazer, 0.0);
        grazer.children = 2;
        grazer.total_foraged = 4.0;
        assert!(hall.consider(&weights, &grazer, 2));
        // 2 * 1 + 0 * 0.05 + 4 * 0.5
        assert!((hall.top_fitness(Archetype::Grazer) - 4.0).abs() < 1e-6);

        let idle = LifetimeStats::new(0, 3, Archetype::Grazer, 0.0);
        assert!(!hall.consider(&weights, &idle, 3));
    }

    #[test]
    fn sample_returns_copies_and_none_when_empty() {
        let mut hall = HallOfFame::new(5, 42);
        assert!(hall.sample(Archetype::Grazer).is_none());

        let mut best = entry(9.0, Archetype::Grazer);
        best.weights.b2[0] = 1.5;
        hall.insert(Archetype::Grazer, best);
        let mut sampled = hall.sample(Archetype::Grazer).expect("one entry");
        assert_eq!(sampled.b2[0], 1.5);
        sampled.b2[0] = -3.0;
        assert_eq!(hall.entries(Archetype::Grazer)[0].weights.b2[0], 1.5);
    }

    #[test]
    fn json_round_trip_is_bit_exact() -> Result<(), HallOfFameError> {
        let mut hall = HallOfFame::new(5, 7);
        let mut rng = SmallRng::seed_from_u64(3);
        for (i, fitness) in [1.0f32 / 3.0, 2.718_281_7, 0.1].into_iter().enumerate() {
            let mut e = entry(fitness, Archetype::Hunter);
            e.weights = BrainWeights::random(&mut rng, 3, 4, 2);
            e.kills = i as u32;
            e.clade_id = u64::MAX - i as u64;
            e.diet = 0.9;
            hall.insert(Archetype::Hunter, e);
        }
        hall.insert(Archetype::Grazer, entry(1.25, Archetype::Grazer));

        let restored = HallOfFame::from_json_str(&hall.to_json_string()?, 7)?;
        for archetype in Archetype::ALL {
            let original = hall.entries(archetype);
            let loaded = restored.entries(archetype);
            assert_eq!(original.len(), loaded.len());
            for (a, b) in original.iter().zip(loaded) {
                assert_eq!(a.fitness.to_bits(), b.fitness.to_bits());
                assert_eq!(a, b);
            }
        }
        assert_eq!(restored.max_size(), DEFAULT_LOAD_CAPACITY);
        Ok(())
    }

    #[test]
    fn load_skips_unknown_halls_and_falls_back_on_founder() -> Result<(), HallOfFameError> {
        let brain = serde_json::to_value(BrainWeights::zeros(1, 1, 1))?;
        let record = |fitness: f32, founder: &str| {
            serde_json::json!({
                "entity_id": 1, "fitness": fitness, "children": 0, "kills": 0,
                "survival_sec": 0.0, "foraging": 0.0, "clade_id": 0,
                "founder_archetype": founder, "diet": 0.0, "brain": brain.clone(),
            })
        };
        let document = serde_json::json!({
            "omnivore": [record(9.0, "omnivore")],
            "grazer": [record(2.0, "mystery"), record(3.0, "grazer")],
        });
        let hall = HallOfFame::from_json_str(&document.to_string(), 1)?;
        assert_eq!(hall.total_entries(), 2);
        assert_eq!(fitnesses(&hall, Archetype::Grazer), vec![3.0, 2.0]);
        assert!(
            hall.entries(Archetype::Grazer)
                .iter()
                .all(|e| e.founder == Archetype::Grazer)
        );
        Ok(())
    }

    #[test]
    fn large_documents_raise_capacity() -> Result<(), HallOfFameError> {
        let mut hall = HallOfFame::new(40, 1);
        for i in 0..40 {
            hall.insert(Archetype::Grazer, entry(i as f32, Archetype::Grazer));
        }
        let restored = HallOfFame::from_json_str(&hall.to_json_string()?, 1)?;
        assert_eq!(restored.max_size(), 40);
        assert_eq!(restored.size(Archetype::Grazer), 40);
        Ok(())
    }

    #[test]
    fn save_and_load_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hall_of_fame.json");
        let mut hall = HallOfFame::new(3, 1);
        hall.insert(Archetype::Hunter, entry(6.0, Archetype::Hunter));
        hall.save(&path)?;
        let loaded = HallOfFame::load(&path, 1)?;
        assert_eq!(fitnesses(&loaded, Archetype::Hunter), vec![6.0]);
        assert!(matches!(
            HallOfFame::load(&dir.path().join("missing.json"), 1),
            Err(HallOfFameError::Io(_))
        ));
        Ok(())
    }
}
