use super::models::{AggregateResult, SanitizationProfile};
use super::path_utils;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;

/*
 * The run-log sink: receives one immutable record per completed run. The
 * engine only ever writes; reading historical runs back is a presentation
 * concern that lives outside the core. Sink failures are the caller's to
 * log and swallow; a run must never fail because its audit line could not
 * be persisted.
 */

const RUN_LOG_FILENAME: &str = "run_log.jsonl";

#[derive(Debug)]
pub enum RunLogError {
    Io(io::Error),
    Serialization(serde_json::Error),
    NoDataDirectory,
}

impl From<io::Error> for RunLogError {
    fn from(err: io::Error) -> Self {
        RunLogError::Io(err)
    }
}

impl From<serde_json::Error> for RunLogError {
    fn from(err: serde_json::Error) -> Self {
        RunLogError::Serialization(err)
    }
}

impl std::fmt::Display for RunLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunLogError::Io(e) => write!(f, "Run log I/O error: {e}"),
            RunLogError::Serialization(e) => write!(f, "Run log serialization error: {e}"),
            RunLogError::NoDataDirectory => {
                write!(f, "Could not determine data directory for the run log")
            }
        }
    }
}

impl std::error::Error for RunLogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunLogError::Io(e) => Some(e),
            RunLogError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunLogError>;

/*
 * One immutable record per completed run: the profile used, the run's time
 * bracket, every outcome line (item name plus status) and the byte total.
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    pub started_at: String,
    pub finished_at: String,
    pub profile: SanitizationProfile,
    pub lines: Vec<String>,
    pub total_bytes_freed: u64,
}

impl RunRecord {
    pub fn from_result(profile: SanitizationProfile, result: &AggregateResult) -> Self {
        let started_at = result
            .started_at()
            .format(&Rfc3339)
            .unwrap_or_else(|_| result.started_at().to_string());
        let finished_at = result
            .finished_at()
            .format(&Rfc3339)
            .unwrap_or_else(|_| result.finished_at().to_string());
        RunRecord {
            started_at,
            finished_at,
            profile,
            lines: result.lines().to_vec(),
            total_bytes_freed: result.total_bytes_freed(),
        }
    }
}

pub trait RunLogSinkOperations: Send + Sync {
    fn record_run(&self, record: &RunRecord) -> Result<()>;
}

/*
 * File-backed sink: appends one JSON object per line to `run_log.jsonl` in
 * the application's local data directory.
 */
pub struct JsonlRunLogSink {
    log_path: PathBuf,
}

impl JsonlRunLogSink {
    pub fn new(log_path: PathBuf) -> Self {
        JsonlRunLogSink { log_path }
    }

    pub fn for_app(app_name: &str) -> Result<Self> {
        let data_dir =
            path_utils::get_base_app_data_local_dir(app_name).ok_or(RunLogError::NoDataDirectory)?;
        Ok(JsonlRunLogSink::new(data_dir.join(RUN_LOG_FILENAME)))
    }
}

impl RunLogSinkOperations for JsonlRunLogSink {
    fn record_run(&self, record: &RunRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        log::debug!(
            "RunLog: Recorded run of {} lines to {:?}.",
            record.lines.len(),
            self.log_path
        );
        Ok(())
    }
}

/*
 * Discarding sink, for callers that cannot or do not want to persist run
 * history (and for tests that need a sink but not its side effects).
 */
pub struct NullRunLogSink {}

impl NullRunLogSink {
    pub fn new() -> Self {
        NullRunLogSink {}
    }
}

impl Default for NullRunLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLogSinkOperations for NullRunLogSink {
    fn record_run(&self, _record: &RunRecord) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::WipeOutcome;
    use std::fs;
    use tempfile::tempdir;
    use time::OffsetDateTime;

    fn sample_record(name: &str, bytes: u64) -> RunRecord {
        let mut outcome = WipeOutcome::new();
        outcome.record_erased(name, bytes);
        let result = AggregateResult::new(
            outcome,
            OffsetDateTime::from_unix_timestamp(100).unwrap(),
            OffsetDateTime::from_unix_timestamp(160).unwrap(),
        );
        RunRecord::from_result(SanitizationProfile::ThreePassOverwrite, &result)
    }

    #[test]
    fn test_record_run_appends_one_json_line_per_run() {
        // Arrange
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("run_log.jsonl");
        let sink = JsonlRunLogSink::new(log_path.clone());

        // Act
        sink.record_run(&sample_record("first.bin", 4096)).unwrap();
        sink.record_run(&sample_record("second.bin", 100)).unwrap();

        // Assert
        let content = fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: RunRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.lines, vec!["Archivo: first.bin (4.00 KB)"]);
        assert_eq!(first.total_bytes_freed, 4096);
        assert_eq!(first.profile, SanitizationProfile::ThreePassOverwrite);
        assert_eq!(first.started_at, "1970-01-01T00:01:40Z");
        assert_eq!(first.finished_at, "1970-01-01T00:02:40Z");

        let second: RunRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.total_bytes_freed, 100);
    }

    #[test]
    fn test_record_run_fails_on_unwritable_path() {
        let sink = JsonlRunLogSink::new(PathBuf::from(
            "/this/path/should/not/exist/run_log.jsonl",
        ));
        let result = sink.record_run(&sample_record("x", 1));
        assert!(matches!(result, Err(RunLogError::Io(_))));
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = NullRunLogSink::new();
        assert!(sink.record_run(&sample_record("x", 1)).is_ok());
    }
}
