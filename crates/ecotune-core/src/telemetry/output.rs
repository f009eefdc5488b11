//! File sinks for single-run experiment output.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{ConfigError, SimConfig};
use crate::telemetry::bookmark::Bookmark;
use crate::telemetry::hall_of_fame::{HallOfFame, HallOfFameError};
use crate::telemetry::stats::WindowStats;

pub const TELEMETRY_FILE: &str = "telemetry.csv";
pub const BOOKMARKS_FILE: &str = "bookmarks.csv";
pub const CONFIG_FILE: &str = "config.json";
pub const HALL_OF_FAME_FILE: &str = "hall_of_fame.json";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    HallOfFame(#[from] HallOfFameError),
}

/// Writes `telemetry.csv`, `bookmarks.csv`, `config.json`, and `hall_of_fame.json` into one
/// directory. CSV headers are emitted with the first row.
pub struct OutputSink {
    dir: PathBuf,
    telemetry: csv::Writer<File>,
    bookmarks: csv::Writer<File>,
    windows_written: usize,
    bookmarks_written: usize,
}

impl OutputSink {
    /// Create the directory (and parents) and open both CSV streams.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, OutputError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let telemetry = csv::Writer::from_path(dir.join(TELEMETRY_FILE))?;
        let bookmarks = csv::Writer::from_path(dir.join(BOOKMARKS_FILE))?;
        Ok(Self {
            dir,
            telemetry,
            bookmarks,
            windows_written: 0,
            bookmarks_written: 0,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn windows_written(&self) -> usize {
        self.windows_written
    }

    #[must_use]
    pub fn bookmarks_written(&self) -> usize {
        self.bookmarks_written
    }

    pub fn write_config(&self, config: &SimConfig) -> Result<(), OutputError> {
        config.save(&self.dir.join(CONFIG_FILE))?;
        Ok(())
    }

    pub fn write_window(&mut self, stats: &WindowStats) -> Result<(), OutputError> {
        self.telemetry.serialize(stats)?;
        self.windows_written += 1;
        Ok(())
    }

    pub fn write_bookmark(&mut self, bookmark: &Bookmark) -> Result<(), OutputError> {
        self.bookmarks.serialize(bookmark)?;
        self.bookmarks_written += 1;
        Ok(())
    }

    pub fn write_hall_of_fame(&self, hall_of_fame: &HallOfFame) -> Result<(), OutputError> {
        hall_of_fame.save(&self.dir.join(HALL_OF_FAME_FILE))?;
        Ok(())
    }

    /// Flush both CSV streams to disk.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.telemetry.flush()?;
        self.bookmarks.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::bookmark::BookmarkKind;

    #[test]
    fn writes_all_artifacts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("run");
        let mut sink = OutputSink::create(&out)?;

        for tick in [600, 1200] {
            sink.write_window(&WindowStats {
                window_end_tick: tick,
                prey_count: 50,
                pred_count: 5,
                ..WindowStats::default()
            })?;
        }
        sink.write_bookmark(&Bookmark {
            kind: BookmarkKind::PreyCrash,
            tick: 1200,
            description: "Prey crashed 50% from peak 100 to 50".into(),
        })?;
        sink.write_config(&SimConfig::default())?;
        sink.write_hall_of_fame(&HallOfFame::new(4, 0))?;
        sink.flush()?;
        assert_eq!(sink.windows_written(), 2);

        let mut reader = csv::Reader::from_path(out.join(TELEMETRY_FILE))?;
        let headers = reader.headers()?.clone();
        assert!(headers.iter().any(|h| h == "prey_count"));
        let rows: Vec<WindowStats> = reader.deserialize().collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].window_end_tick, 1200);

        let bookmarks = fs::read_to_string(out.join(BOOKMARKS_FILE))?;
        assert!(bookmarks.starts_with("kind,tick,description"));
        assert!(bookmarks.contains("prey_crash,1200,"));

        assert_eq!(SimConfig::load(Some(&out.join(CONFIG_FILE)))?, SimConfig::default());
        assert_eq!(HallOfFame::load(&out.join(HALL_OF_FAME_FILE), 0)?.total_entries(), 0);
        Ok(())
    }
}
