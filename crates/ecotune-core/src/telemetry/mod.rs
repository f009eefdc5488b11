//! Windowed statistics, bookmark detection, lifetime tracking, and the hall of fame.

pub mod bookmark;
pub mod collector;
pub mod hall_of_fame;
pub mod lifetime;
pub mod output;
pub mod stats;

pub use bookmark::{Bookmark, BookmarkDetector, BookmarkKind};
pub use collector::{BlockReason, EnergyPools, FlushInput, WindowedStatsCollector};
pub use hall_of_fame::{HallEntry, HallOfFame, HallOfFameError, HallSummary};
pub use lifetime::{LifetimeStats, LifetimeTracker};
pub use output::{OutputError, OutputSink};
pub use stats::{DietSummary, EnergySummary, WindowStats, diet_summary, energy_summary, percentile};
