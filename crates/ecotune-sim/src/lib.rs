//! Reference predator/prey engine for ecotune.
//!
//! [`EcosystemWorld`] advances a toroidal world of grazers and hunters through a staged tick
//! pipeline and implements [`ecotune_core::Episode`]. [`WorldFactory`] builds independent worlds
//! for the evaluator.

pub mod arena;
pub mod grid;
pub mod index;
pub mod world;

pub use arena::{OrganismArena, OrganismData, OrganismId, Position};
pub use grid::{FieldRates, ResourceField, ScalarGrid};
pub use index::{IndexError, NeighborhoodIndex, UniformGridIndex};
pub use world::{
    EcosystemWorld, HIDDEN_SIZE, INPUT_SIZE, OUTPUT_SIZE, OrganismRuntime, TickEvents, WorldError,
    WorldFactory,
};
