//! Dense organism storage with generational handles.

use ecotune_core::kind::Kind;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use std::collections::HashSet;

new_key_type! {
    /// Stable handle for organisms backed by a generational slot map.
    pub struct OrganismId;
}

/// Side data keyed by organism handle.
pub type OrganismMap<T> = SecondaryMap<OrganismId, T>;

/// World-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Scalar fields of one organism, as stored in the hot columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrganismData {
    pub position: Position,
    pub heading: f32,
    /// Current speed in world units per second.
    pub speed: f32,
    pub energy: f32,
    pub age_ticks: u64,
    pub kind: Kind,
}

/// Per-organism columns for hot-path iteration.
#[derive(Debug, Default)]
pub struct OrganismColumns {
    positions: Vec<Position>,
    headings: Vec<f32>,
    speeds: Vec<f32>,
    energies: Vec<f32>,
    ages: Vec<u64>,
    kinds: Vec<Kind>,
}

impl OrganismColumns {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            headings: Vec::with_capacity(capacity),
            speeds: Vec::with_capacity(capacity),
            energies: Vec::with_capacity(capacity),
            ages: Vec::with_capacity(capacity),
            kinds: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, organism: OrganismData) {
        self.positions.push(organism.position);
        self.headings.push(organism.heading);
        self.speeds.push(organism.speed);
        self.energies.push(organism.energy);
        self.ages.push(organism.age_ticks);
        self.kinds.push(organism.kind);
        self.debug_assert_coherent();
    }

    fn swap_remove(&mut self, index: usize) -> OrganismData {
        let removed = OrganismData {
            position: self.positions.swap_remove(index),
            heading: self.headings.swap_remove(index),
            speed: self.speeds.swap_remove(index),
            energy: self.energies.swap_remove(index),
            age_ticks: self.ages.swap_remove(index),
            kind: self.kinds.swap_remove(index),
        };
        self.debug_assert_coherent();
        removed
    }

    fn move_row(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.positions[to] = self.positions[from];
        self.headings[to] = self.headings[from];
        self.speeds[to] = self.speeds[from];
        self.energies[to] = self.energies[from];
        self.ages[to] = self.ages[from];
        self.kinds[to] = self.kinds[from];
    }

    fn truncate(&mut self, len: usize) {
        self.positions.truncate(len);
        self.headings.truncate(len);
        self.speeds.truncate(len);
        self.energies.truncate(len);
        self.ages.truncate(len);
        self.kinds.truncate(len);
        self.debug_assert_coherent();
    }

    #[must_use]
    pub fn snapshot(&self, index: usize) -> OrganismData {
        OrganismData {
            position: self.positions[index],
            heading: self.headings[index],
            speed: self.speeds[index],
            energy: self.energies[index],
            age_ticks: self.ages[index],
            kind: self.kinds[index],
        }
    }

    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    #[must_use]
    pub fn headings(&self) -> &[f32] {
        &self.headings
    }

    pub fn headings_mut(&mut self) -> &mut [f32] {
        &mut self.headings
    }

    #[must_use]
    pub fn speeds(&self) -> &[f32] {
        &self.speeds
    }

    pub fn speeds_mut(&mut self) -> &mut [f32] {
        &mut self.speeds
    }

    #[must_use]
    pub fn energies(&self) -> &[f32] {
        &self.energies
    }

    pub fn energies_mut(&mut self) -> &mut [f32] {
        &mut self.energies
    }

    #[must_use]
    pub fn ages(&self) -> &[u64] {
        &self.ages
    }

    pub fn ages_mut(&mut self) -> &mut [u64] {
        &mut self.ages
    }

    #[must_use]
    pub fn kinds(&self) -> &[Kind] {
        &self.kinds
    }

    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.positions.len(), self.headings.len());
        debug_assert_eq!(self.positions.len(), self.speeds.len());
        debug_assert_eq!(self.positions.len(), self.energies.len());
        debug_assert_eq!(self.positions.len(), self.ages.len());
        debug_assert_eq!(self.positions.len(), self.kinds.len());
    }
}

/// Dense SoA storage with generational handles and live per-kind counts.
#[derive(Debug, Default)]
pub struct OrganismArena {
    slots: SlotMap<OrganismId, usize>,
    handles: Vec<OrganismId>,
    columns: OrganismColumns,
    counts: [usize; 2],
}

impl OrganismArena {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            columns: OrganismColumns::with_capacity(capacity),
            counts: [0; 2],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Live organisms of `kind`.
    #[must_use]
    pub fn count(&self, kind: Kind) -> usize {
        self.counts[kind.index()]
    }

    /// Handles in dense iteration order.
    #[must_use]
    pub fn handles(&self) -> &[OrganismId] {
        &self.handles
    }

    #[must_use]
    pub fn columns(&self) -> &OrganismColumns {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut OrganismColumns {
        &mut self.columns
    }

    #[must_use]
    pub fn index_of(&self, id: OrganismId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: OrganismId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn insert(&mut self, organism: OrganismData) -> OrganismId {
        let index = self.columns.len();
        self.counts[organism.kind.index()] += 1;
        self.columns.push(organism);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id`, moving the last row into its slot.
    pub fn remove(&mut self, id: OrganismId) -> Option<OrganismData> {
        let index = self.slots.remove(id)?;
        let removed = self.columns.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);
        if index < self.handles.len() {
            let moved = self.handles[index];
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }
        self.counts[removed.kind.index()] -= 1;
        Some(removed)
    }

    /// Remove every organism in `dead`, preserving the order of survivors.
    pub fn remove_many(&mut self, dead: &HashSet<OrganismId>) -> usize {
        if dead.is_empty() {
            return 0;
        }
        let mut write = 0;
        for read in 0..self.handles.len() {
            let id = self.handles[read];
            if dead.contains(&id) {
                self.slots.remove(id);
                self.counts[self.columns.kinds[read].index()] -= 1;
                continue;
            }
            if write != read {
                self.handles[write] = id;
                self.columns.move_row(read, write);
            }
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = write;
            }
            write += 1;
        }
        let removed = self.handles.len().saturating_sub(write);
        self.handles.truncate(write);
        self.columns.truncate(write);
        removed
    }

    #[must_use]
    pub fn snapshot(&self, id: OrganismId) -> Option<OrganismData> {
        let index = self.index_of(id)?;
        Some(self.columns.snapshot(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organism(seed: u32, kind: Kind) -> OrganismData {
        OrganismData {
            position: Position::new(seed as f32, seed as f32 + 1.0),
            heading: seed as f32 * 0.5,
            speed: 1.0,
            energy: 0.5,
            age_ticks: u64::from(seed),
            kind,
        }
    }

    #[test]
    fn insert_allocates_unique_handles_and_counts() {
        let mut arena = OrganismArena::default();
        let a = arena.insert(organism(0, Kind::Prey));
        let b = arena.insert(organism(1, Kind::Predator));
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.count(Kind::Prey), 1);
        assert_eq!(arena.count(Kind::Predator), 1);
    }

    #[test]
    fn remove_keeps_dense_storage_coherent() {
        let mut arena = OrganismArena::default();
        let a = arena.insert(organism(0, Kind::Prey));
        let b = arena.insert(organism(1, Kind::Prey));
        let c = arena.insert(organism(2, Kind::Predator));

        let removed = arena.remove(b).expect("organism removed");
        assert_eq!(removed.age_ticks, 1);
        assert!(arena.contains(a) && arena.contains(c) && !arena.contains(b));
        assert_eq!(arena.index_of(c), Some(1));
        assert_eq!(
            arena.snapshot(c).map(|o| o.position),
            Some(Position::new(2.0, 3.0))
        );
        assert_eq!(arena.count(Kind::Prey), 1);

        let d = arena.insert(organism(3, Kind::Prey));
        assert_ne!(b, d, "generational handles are not reused immediately");
    }

    #[test]
    fn remove_many_preserves_order() {
        let mut arena = OrganismArena::default();
        let ids: Vec<_> = (0..5)
            .map(|i| arena.insert(organism(i, if i % 2 == 0 { Kind::Prey } else { Kind::Predator })))
            .collect();
        let dead: HashSet<_> = [ids[1], ids[2]].into_iter().collect();
        assert_eq!(arena.remove_many(&dead), 2);
        assert_eq!(arena.handles(), &[ids[0], ids[3], ids[4]]);
        assert_eq!(arena.columns().ages(), &[0, 3, 4]);
        assert_eq!(arena.index_of(ids[4]), Some(2));
        assert_eq!(arena.count(Kind::Prey), 2);
        assert_eq!(arena.count(Kind::Predator), 1);
    }
}
