//! Core types shared across the ecotune workspace: simulation configuration, the bounded search
//! space, telemetry (windowed stats, bookmarks, hall of fame), and the episode contract engines
//! implement.

pub mod brain;
pub mod config;
pub mod episode;
pub mod kind;
pub mod params;
pub mod telemetry;

pub use brain::BrainWeights;
pub use config::{ConfigError, SimConfig};
pub use episode::{Episode, EpisodeError, EpisodeFactory, StatsCallback};
pub use kind::{Archetype, Kind};
pub use params::{ParamError, ParamSpec, ParameterSpace};
pub use telemetry::{
    Bookmark, BookmarkDetector, BookmarkKind, HallOfFame, WindowStats, WindowedStatsCollector,
};
