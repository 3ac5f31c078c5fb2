// Reporter module - runner adapters translating lifecycle callbacks into Scout events

pub mod mocha;
pub mod playwright;

pub use mocha::{MochaLifecycle, MochaPayload, ScoutMochaReporter};
pub use playwright::{PlaywrightLifecycle, PlaywrightPayload, ScoutPlaywrightReporter};

use crate::config;
use crate::event::{
    EnvironmentMetadata, EventAction, EventError, ScoutEvent, environment_metadata,
    generate_test_run_id,
};
use crate::report::{ReportError, ScoutReport};
use serde::{Deserialize, Deserializer};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Span, error, info, info_span};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unknown {runner} lifecycle event '{name}'")]
    UnknownLifecycle { runner: &'static str, name: String },

    #[error("invalid payload for '{lifecycle}': {source}")]
    Payload {
        lifecycle: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Error object as reported by a test runner
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunnerError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

impl RunnerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            stack: None,
        }
    }
}

/// Map an optional runner error onto the event error record
pub(crate) fn event_error(err: Option<&RunnerError>) -> Option<EventError> {
    err.and_then(|e| EventError::from_parts(e.message.clone(), e.stack.clone()))
}

/// Read a runner duration as whole milliseconds.
///
/// Runners report fractional durations; any JSON number is rounded, and a
/// value that is not a finite number is treated as absent.
pub(crate) fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|ms| ms.is_finite())
        .map(|ms| ms.max(0.0).round() as u64))
}

/// Suite title used when a test has no (titled) parent suite
pub const UNKNOWN_SUITE: &str = "unknown";

/// Options shared by every runner adapter
#[derive(Debug, Clone, Default)]
pub struct ReporterOptions {
    /// Root directory under which `scout-<runId>` report directories are written
    pub output_path: Option<PathBuf>,
    /// Environment metadata override; defaults to the process-wide capture
    pub environment: Option<Arc<EnvironmentMetadata>>,
}

/// A translator from one test runner's lifecycle model into Scout events
pub trait RunnerAdapter {
    type Lifecycle: FromStr<Err = AdapterError> + Copy + Eq + Hash + std::fmt::Debug;
    type Payload;

    /// Run state shared by all adapters
    fn core(&self) -> &ReporterCore;

    /// Handle one lifecycle callback
    fn dispatch(
        &mut self,
        lifecycle: Self::Lifecycle,
        payload: Self::Payload,
    ) -> Result<(), AdapterError>;

    /// Decode the native payload shape expected for `lifecycle`
    fn parse_payload(
        lifecycle: Self::Lifecycle,
        value: serde_json::Value,
    ) -> Result<Self::Payload, AdapterError>;

    /// Handle a callback identified by the runner's own event name
    fn dispatch_named(&mut self, name: &str, payload: Self::Payload) -> Result<(), AdapterError> {
        let lifecycle: Self::Lifecycle = name.parse()?;
        self.dispatch(lifecycle, payload)
    }

    /// Identifier shared by every event of this run
    fn run_id(&self) -> &str {
        self.core().run_id()
    }

    /// Directory this run's event log is saved to
    fn report_root_path(&self) -> PathBuf {
        self.core().report_root_path()
    }

    fn report(&self) -> &ScoutReport {
        self.core().report()
    }

    /// Whether the run-end callback has been handled
    fn is_finished(&self) -> bool {
        self.core().is_finished()
    }
}

/// State shared by the runner adapters: run identity, environment and event buffer
#[derive(Debug)]
pub struct ReporterCore {
    run_id: String,
    environment: Arc<EnvironmentMetadata>,
    report: ScoutReport,
    output_root: PathBuf,
    span: Span,
    finished: bool,
}

impl ReporterCore {
    pub fn new(options: ReporterOptions) -> Self {
        let run_id = generate_test_run_id();
        let span = info_span!("scout_reporter", run_id = %run_id);
        span.in_scope(|| info!("Scout test run ID: {}", run_id));

        Self {
            environment: options.environment.unwrap_or_else(environment_metadata),
            output_root: options
                .output_path
                .unwrap_or_else(config::default_output_root),
            report: ScoutReport::new(),
            run_id,
            span,
            finished: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn report(&self) -> &ScoutReport {
        &self.report
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Directory this run's event log is saved to
    pub fn report_root_path(&self) -> PathBuf {
        self.output_root.join(format!("scout-{}", self.run_id))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Start an event of this run
    pub fn event(&self, action: EventAction) -> ScoutEvent {
        ScoutEvent::new(action, self.run_id.clone(), Arc::clone(&self.environment))
    }

    pub fn log_event(&mut self, event: ScoutEvent) {
        self.report.log_event(event);
    }

    /// Save the buffered events and release them, whatever the save outcome
    pub fn finish(&mut self) -> Result<PathBuf, ReportError> {
        self.finished = true;
        let root = self.report_root_path();
        let result = self.report.save_and_conclude(&root);
        if let Err(e) = &result {
            error!("Failed to save Scout report to {}: {}", root.display(), e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_root_path_uses_run_id() {
        let core = ReporterCore::new(ReporterOptions {
            output_path: Some(PathBuf::from("/tmp/scout")),
            environment: None,
        });
        let expected = PathBuf::from("/tmp/scout").join(format!("scout-{}", core.run_id()));
        assert_eq!(core.report_root_path(), expected);
    }

    #[test]
    fn test_events_share_run_id() {
        let core = ReporterCore::new(ReporterOptions::default());
        let a = core.event(EventAction::RunBegin);
        let b = core.event(EventAction::RunEnd);
        assert_eq!(a.test_run.id, core.run_id());
        assert_eq!(a.test_run.id, b.test_run.id);
    }

    #[test]
    fn test_event_error_skips_empty_runner_error() {
        assert!(event_error(None).is_none());
        assert!(event_error(Some(&RunnerError::default())).is_none());

        let err = event_error(Some(&RunnerError::new("boom"))).unwrap();
        assert_eq!(err.message.as_deref(), Some("boom"));
        assert!(err.stack_trace.is_none());
    }

    #[derive(Debug, Deserialize)]
    struct Timed {
        #[serde(default, deserialize_with = "lenient_millis")]
        duration: Option<u64>,
    }

    #[test]
    fn test_lenient_millis_rounds_fractional_durations() {
        let parse = |json: &str| serde_json::from_str::<Timed>(json).unwrap().duration;

        assert_eq!(parse(r#"{"duration": 10}"#), Some(10));
        assert_eq!(parse(r#"{"duration": 1234.567}"#), Some(1235));
        assert_eq!(parse(r#"{"duration": -3.2}"#), Some(0));
        assert_eq!(parse(r#"{"duration": "soon"}"#), None);
        assert_eq!(parse(r#"{"duration": null}"#), None);
        assert_eq!(parse("{}"), None);
    }
}
