//! Metrics writers.

use super::record::Metrics;
use crate::{Error, ErrorContext, Result};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;

/// Destination for cumulative metrics snapshots.
pub trait MetricsWriter: Send + Sync {
    fn write_metrics(&self, id: &str, metrics: &Metrics) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Emits one structured `tracing` event per snapshot.
#[derive(Debug, Clone)]
pub struct LogMetricsWriter {
    level: Level,
}

impl LogMetricsWriter {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn from_level_str(level: &str) -> Result<Self> {
        let level = level.parse::<Level>().map_err(|e| {
            Error::configuration_with_context(
                format!("invalid log level '{}'", level),
                ErrorContext::new()
                    .with_field_path("metrics.log_level")
                    .with_details(e.to_string())
                    .with_source("log_metrics_writer"),
            )
        })?;
        Ok(Self::new(level))
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LogMetricsWriter {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

macro_rules! metrics_event {
    ($level:expr, $id:expr, $m:expr) => {
        tracing::event!(
            $level,
            model_id = $id,
            attempted = $m.attempted_request_count,
            successful = $m.successful_response_count,
            failed = $m.failed_response_count,
            cached = $m.cached_responses,
            retries = $m.retries,
            total_tokens = $m.total_tokens,
            total_cost = $m.total_cost,
            compute_duration_seconds = $m.compute_duration_seconds,
            "llm metrics"
        )
    };
}

impl MetricsWriter for LogMetricsWriter {
    fn write_metrics(&self, id: &str, metrics: &Metrics) -> Result<()> {
        // event! needs a constant level
        match self.level {
            Level::ERROR => metrics_event!(Level::ERROR, id, metrics),
            Level::WARN => metrics_event!(Level::WARN, id, metrics),
            Level::INFO => metrics_event!(Level::INFO, id, metrics),
            Level::DEBUG => metrics_event!(Level::DEBUG, id, metrics),
            _ => metrics_event!(Level::TRACE, id, metrics),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Serialize)]
struct MetricsLine<'a> {
    id: &'a str,
    metrics: &'a Metrics,
}

/// Appends `{"id": ..., "metrics": {...}}` lines to a timestamped file.
///
/// The file is created lazily under `base_dir` (itself created if missing)
/// on the first write.
pub struct FileMetricsWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileMetricsWriter {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = base_dir.as_ref().join(format!("{}.jsonl", stamp));
        Self::with_path(path)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?)
    }
}

impl MetricsWriter for FileMetricsWriter {
    fn write_metrics(&self, id: &str, metrics: &Metrics) -> Result<()> {
        let mut line = serde_json::to_vec(&MetricsLine { id, metrics })?;
        line.push(b'\n');

        let mut guard = self.file.lock().map_err(|_| {
            Error::metrics_with_context(
                "metrics file lock poisoned",
                ErrorContext::new().with_source("file_metrics_writer"),
            )
        })?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&line)?;
            file.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_writer_levels() {
        assert_eq!(LogMetricsWriter::from_level_str("debug").unwrap().level(), Level::DEBUG);
        assert!(LogMetricsWriter::from_level_str("loud").is_err());
        let w = LogMetricsWriter::default();
        assert!(w.write_metrics("openai/gpt-4o", &Metrics::default()).is_ok());
    }

    #[test]
    fn test_file_writer_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileMetricsWriter::new(dir.path().join("metrics"));
        let m = Metrics {
            attempted_request_count: 2,
            ..Default::default()
        };
        writer.write_metrics("openai/gpt-4o", &m).unwrap();
        writer.write_metrics("openai/gpt-4o", &m).unwrap();

        assert!(writer.path().starts_with(dir.path().join("metrics")));
        let content = fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "openai/gpt-4o");
        assert_eq!(first["metrics"]["attempted_request_count"], 2);
    }
}
