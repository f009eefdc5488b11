//! Contract between the optimization harness and a simulation engine.

use thiserror::Error;

use crate::config::{ConfigError, SimConfig};
use crate::kind::Kind;
use crate::telemetry::{HallOfFame, WindowStats};

/// Invoked once per completed stats window.
pub type StatsCallback = Box<dyn FnMut(&WindowStats) + Send>;

#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("episode configuration rejected: {0}")]
    Config(#[from] ConfigError),
}

/// One running simulation. Dropping the episode disposes of it.
pub trait Episode {
    /// Advance one fixed timestep.
    fn step(&mut self);

    /// Ticks completed so far.
    fn tick(&self) -> u64;

    fn population(&self, kind: Kind) -> usize;

    /// Snapshot of the episode's hall of fame.
    fn hall_of_fame(&self) -> HallOfFame;
}

/// Builds independent episodes; shared across worker threads.
pub trait EpisodeFactory: Send + Sync {
    type Episode: Episode;

    fn new_episode(
        &self,
        seed: u64,
        config: &SimConfig,
        on_stats: Option<StatsCallback>,
    ) -> Result<Self::Episode, EpisodeError>;
}
