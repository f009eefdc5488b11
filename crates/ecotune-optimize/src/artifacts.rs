//! Files produced by an optimization run.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ecotune_core::config::ConfigError;
use ecotune_core::telemetry::{HallOfFame, HallOfFameError};
use ecotune_core::SimConfig;
use thiserror::Error;

pub const EVAL_LOG_FILE: &str = "optimize_log.csv";
pub const BEST_CONFIG_FILE: &str = "best_config.json";
pub use ecotune_core::telemetry::output::HALL_OF_FAME_FILE;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("evaluation log write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("artifact JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    HallOfFame(#[from] HallOfFameError),
    #[error("expected {expected} parameter values, got {actual}")]
    RowWidth { expected: usize, actual: usize },
}

/// Append-only CSV of every evaluation: `eval, fitness, <parameter names>`. Each row is flushed
/// as soon as it is written so a killed run leaves a usable log.
pub struct EvalLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    width: usize,
    rows: usize,
}

impl EvalLog {
    pub fn create<'a>(
        path: impl AsRef<Path>,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ArtifactError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::Writer::from_path(&path)?;
        let mut header = vec!["eval", "fitness"];
        header.extend(names);
        writer.write_record(&header)?;
        writer.flush()?;
        Ok(Self {
            path,
            writer,
            width: header.len() - 2,
            rows: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written after the header.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn append(&mut self, eval: usize, fitness: f64, values: &[f64]) -> Result<(), ArtifactError> {
        if values.len() != self.width {
            return Err(ArtifactError::RowWidth {
                expected: self.width,
                actual: values.len(),
            });
        }
        let mut record = Vec::with_capacity(values.len() + 2);
        record.push(eval.to_string());
        record.push(format!("{fitness:.6}"));
        record.extend(values.iter().map(|value| format!("{value:.6}")));
        self.writer.write_record(&record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

impl std::fmt::Debug for EvalLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalLog")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

pub fn write_best_config(dir: &Path, config: &SimConfig) -> Result<PathBuf, ArtifactError> {
    let path = dir.join(BEST_CONFIG_FILE);
    config.save(&path)?;
    Ok(path)
}

pub fn write_hall_of_fame(dir: &Path, hall_of_fame: &HallOfFame) -> Result<PathBuf, ArtifactError> {
    let path = dir.join(HALL_OF_FAME_FILE);
    hall_of_fame.save(&path)?;
    Ok(path)
}

/// `1h02m03s`, or `2m03s` under an hour. Rounded to the nearest second.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = (duration.as_secs_f64()).round() as u64;
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes:02}m{seconds:02}s")
    } else {
        format!("{minutes}m{seconds:02}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_log_writes_header_and_fixed_precision_rows() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(EVAL_LOG_FILE);
        let mut log = EvalLog::create(&path, ["a", "b"])?;
        log.append(1, -1234.5, &[0.1, 2.0])?;
        assert_eq!(log.rows(), 1);

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["eval,fitness,a,b", "1,-1234.500000,0.100000,2.000000"]);
        Ok(())
    }

    #[test]
    fn eval_log_rejects_wrong_width() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut log = EvalLog::create(dir.path().join(EVAL_LOG_FILE), ["a"])?;
        assert!(log.append(1, 0.0, &[1.0, 2.0]).is_err());
        assert_eq!(log.rows(), 0);
        Ok(())
    }

    #[test]
    fn best_config_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut config = SimConfig::default();
        config.energy.base_cost = 0.011;
        let path = write_best_config(dir.path(), &config)?;
        let loaded = SimConfig::load(Some(&path))?;
        assert_eq!(loaded.energy.base_cost, 0.011);
        Ok(())
    }

    #[test]
    fn durations_format_like_a_clock() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0m00s");
        assert_eq!(format_duration(Duration::from_millis(65_400)), "1m05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h02m03s");
    }
}
