// Report module - in-process event buffer for one test run

use crate::event::ScoutEvent;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name of the event log inside a report directory
pub const EVENT_LOG_FILE: &str = "event-log.ndjson";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report has already been concluded")]
    Concluded,

    #[error("event log already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to write event log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read event log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed event at {}:{line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Ordered, append-only log of the events of one run
#[derive(Debug, Default)]
pub struct ScoutReport {
    events: Vec<ScoutEvent>,
    concluded: bool,
}

impl ScoutReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Never fails; events after `conclude` are dropped.
    pub fn log_event(&mut self, event: ScoutEvent) {
        if self.concluded {
            debug!(action = %event.action(), "Dropping event logged after report conclusion");
            return;
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[ScoutEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    /// Write all buffered events as NDJSON to `<root>/event-log.ndjson`
    pub fn save(&self, root: &Path) -> Result<PathBuf, ReportError> {
        if self.concluded {
            return Err(ReportError::Concluded);
        }

        let path = root.join(EVENT_LOG_FILE);
        if path.exists() {
            return Err(ReportError::AlreadyExists(path));
        }

        let write_err = |source| ReportError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(root).map_err(write_err)?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_err)?;
        let mut writer = BufWriter::new(file);

        let mut written = 0usize;
        for event in &self.events {
            match serde_json::to_string(event) {
                Ok(line) => {
                    writeln!(writer, "{}", line).map_err(write_err)?;
                    written += 1;
                }
                Err(e) => warn!(action = %event.action(), "Skipping unserializable event: {}", e),
            }
        }
        writer.flush().map_err(write_err)?;

        info!("Saved {} events to {}", written, path.display());
        Ok(path)
    }

    /// Release buffered events. Safe to call any number of times.
    pub fn conclude(&mut self) {
        if self.concluded {
            return;
        }
        debug!("Concluding report with {} buffered events", self.events.len());
        self.events = Vec::new();
        self.concluded = true;
    }

    /// Save the report, then conclude it on every exit path
    pub fn save_and_conclude(&mut self, root: &Path) -> Result<PathBuf, ReportError> {
        let guard = ConcludeGuard(self);
        guard.0.save(root)
    }
}

/// Concludes the wrapped report when dropped, including during unwinding
struct ConcludeGuard<'a>(&'a mut ScoutReport);

impl Drop for ConcludeGuard<'_> {
    fn drop(&mut self) {
        self.0.conclude();
    }
}

/// Parse a saved event log back into events, preserving line order
pub fn read_event_log(path: &Path) -> Result<Vec<ScoutEvent>, ReportError> {
    let read_err = |source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(read_err)?);
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(read_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|source| ReportError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EnvironmentMetadata, EventAction};
    use std::sync::Arc;

    fn event(action: EventAction) -> ScoutEvent {
        ScoutEvent::new(action, "run-1", Arc::new(EnvironmentMetadata::default()))
    }

    #[test]
    fn test_log_event_preserves_order() {
        let mut report = ScoutReport::new();
        report.log_event(event(EventAction::RunBegin));
        report.log_event(event(EventAction::TestBegin));

        let actions: Vec<_> = report.events().iter().map(|e| e.action()).collect();
        assert_eq!(actions, vec![EventAction::RunBegin, EventAction::TestBegin]);
    }

    #[test]
    fn test_conclude_is_idempotent() {
        let mut report = ScoutReport::new();
        report.log_event(event(EventAction::RunBegin));
        report.conclude();
        report.conclude();

        assert!(report.is_concluded());
        assert!(report.is_empty());
    }

    #[test]
    fn test_events_after_conclude_are_dropped() {
        let mut report = ScoutReport::new();
        report.conclude();
        report.log_event(event(EventAction::RunBegin));
        assert!(report.is_empty());
    }

    #[test]
    fn test_save_after_conclude_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut report = ScoutReport::new();
        report.conclude();
        assert!(matches!(report.save(dir.path()), Err(ReportError::Concluded)));
    }

    #[test]
    fn test_save_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = ScoutReport::new();
        report.save(dir.path()).unwrap();

        let err = report.save(dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::AlreadyExists(_)));
    }
}
