//! Per-organism lifetime accounting used for hall-of-fame admission.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::kind::Archetype;

/// Statistics accumulated over one organism's life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub birth_tick: u64,
    pub survival_sec: f32,
    pub clade_id: u64,
    pub founder: Archetype,
    pub birth_diet: f32,
    pub bites_attempted: u32,
    pub bites_hit: u32,
    pub kills: u32,
    pub children: u32,
    pub peak_energy: f32,
    /// Cumulative energy gained from grazing.
    pub total_foraged: f32,
}

impl LifetimeStats {
    #[must_use]
    pub fn new(birth_tick: u64, clade_id: u64, founder: Archetype, birth_diet: f32) -> Self {
        Self {
            birth_tick,
            survival_sec: 0.0,
            clade_id,
            founder,
            birth_diet,
            bites_attempted: 0,
            bites_hit: 0,
            kills: 0,
            children: 0,
            peak_energy: 0.0,
            total_foraged: 0.0,
        }
    }

    /// Predatory lineages are judged on kills rather than foraging.
    #[must_use]
    pub fn is_predatory(&self) -> bool {
        self.birth_diet >= 0.5
    }
}

/// Lifetime statistics for every living organism, keyed by entity id.
///
/// Recording against an unknown id is a no-op so callers never need to check registration.
#[derive(Debug, Clone, Default)]
pub struct LifetimeTracker {
    stats: HashMap<u32, LifetimeStats>,
}

impl LifetimeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        entity_id: u32,
        birth_tick: u64,
        clade_id: u64,
        founder: Archetype,
        diet: f32,
    ) {
        self.stats.insert(
            entity_id,
            LifetimeStats::new(birth_tick, clade_id, founder, diet),
        );
    }

    #[must_use]
    pub fn get(&self, entity_id: u32) -> Option<&LifetimeStats> {
        self.stats.get(&entity_id)
    }

    /// Stop tracking an organism and hand back its final record.
    pub fn remove(&mut self, entity_id: u32) -> Option<LifetimeStats> {
        self.stats.remove(&entity_id)
    }

    pub fn record_bite_attempt(&mut self, entity_id: u32) {
        if let Some(stats) = self.stats.get_mut(&entity_id) {
            stats.bites_attempted += 1;
        }
    }

    pub fn record_bite_hit(&mut self, entity_id: u32) {
        if let Some(stats) = self.stats.get_mut(&entity_id) {
            stats.bites_hit += 1;
        }
    }

    pub fn record_kill(&mut self, entity_id: u32) {
        if let Some(stats) = self.stats.get_mut(&entity_id) {
            stats.kills += 1;
        }
    }

    pub fn record_child(&mut self, parent_id: u32) {
        if let Some(stats) = self.stats.get_mut(&parent_id) {
            stats.children += 1;
        }
    }

    pub fn record_forage(&mut self, entity_id: u32, amount: f32) {
        if let Some(stats) = self.stats.get_mut(&entity_id) {
            stats.total_foraged += amount;
        }
    }

    pub fn update_energy(&mut self, entity_id: u32, energy: f32) {
        if let Some(stats) = self.stats.get_mut(&entity_id) {
            stats.peak_energy = stats.peak_energy.max(energy);
        }
    }

    pub fn update_survival(&mut self, entity_id: u32, current_tick: u64, dt: f64) {
        if let Some(stats) = self.stats.get_mut(&entity_id) {
            stats.survival_sec = (current_tick.saturating_sub(stats.birth_tick) as f64 * dt) as f32;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Number of distinct clades among tracked organisms.
    #[must_use]
    pub fn active_clade_count(&self) -> usize {
        self.stats
            .values()
            .map(|stats| stats.clade_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_only_registered_entities() {
        let mut tracker = LifetimeTracker::new();
        tracker.register(1, 10, 7, Archetype::Hunter, 1.0);
        tracker.record_bite_attempt(1);
        tracker.record_bite_hit(1);
        tracker.record_kill(1);
        tracker.record_child(1);
        tracker.record_kill(99);
        tracker.update_energy(1, 0.7);
        tracker.update_energy(1, 0.4);
        tracker.update_survival(1, 130, 0.5);

        let stats = tracker.remove(1).expect("registered");
        assert_eq!((stats.bites_attempted, stats.bites_hit, stats.kills), (1, 1, 1));
        assert_eq!(stats.children, 1);
        assert_eq!(stats.peak_energy, 0.7);
        assert_eq!(stats.survival_sec, 60.0);
        assert!(stats.is_predatory());
        assert!(tracker.is_empty());
    }

    #[test]
    fn counts_distinct_clades() {
        let mut tracker = LifetimeTracker::new();
        tracker.register(1, 0, 1, Archetype::Grazer, 0.0);
        tracker.register(2, 0, 1, Archetype::Grazer, 0.0);
        tracker.register(3, 0, 2, Archetype::Hunter, 1.0);
        tracker.record_forage(2, 0.25);
        assert_eq!(tracker.active_clade_count(), 2);
        assert_eq!(tracker.get(2).map(|s| s.total_foraged), Some(0.25));
        assert!(!tracker.get(1).is_some_and(LifetimeStats::is_predatory));
    }
}
