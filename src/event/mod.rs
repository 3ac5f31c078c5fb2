// Event module - canonical shape of a reportable test-run occurrence

pub mod environment;
pub mod id;

pub use environment::{CiMetadata, EnvironmentMetadata, HostMetadata, environment_metadata};
pub use id::{full_title, generate_test_run_id, test_id_for_title};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Closed vocabulary of event actions shared by every runner adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    RunBegin,
    RunEnd,
    SuiteBegin,
    SuiteEnd,
    TestBegin,
    TestEnd,
    StepBegin,
    StepEnd,
    HookBegin,
    HookEnd,
    Pending,
    Retry,
    Error,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunBegin => "run_begin",
            Self::RunEnd => "run_end",
            Self::SuiteBegin => "suite_begin",
            Self::SuiteEnd => "suite_end",
            Self::TestBegin => "test_begin",
            Self::TestEnd => "test_end",
            Self::StepBegin => "step_begin",
            Self::StepEnd => "step_end",
            Self::HookBegin => "hook_begin",
            Self::HookEnd => "hook_end",
            Self::Pending => "pending",
            Self::Retry => "retry",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of the suite containing a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteType {
    Root,
    Suite,
    Project,
    File,
    Describe,
}

/// Outcome of a test, a step or a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    #[serde(rename = "timedOut", alias = "timedout")]
    TimedOut,
    Skipped,
    Interrupted,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::TimedOut => "timedOut",
            Self::Skipped => "skipped",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    /// Total run duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteInfo {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SuiteType,
    /// Set on hook events, for the hook running within this suite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookInfo>,
}

impl SuiteInfo {
    pub fn new(title: impl Into<String>, kind: SuiteType) -> Self {
        Self {
            title: title.into(),
            kind,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: HookInfo) -> Self {
        self.hook = Some(hook);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// Free-form annotation attached to a test by the runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepInfo>,
}

impl TestInfo {
    /// Build test metadata, deriving the id from the full hierarchical title
    pub fn new(full_title: &str, title: impl Into<String>) -> Self {
        Self {
            id: test_id_for_title(full_title),
            title: title.into(),
            tags: Vec::new(),
            annotations: Vec::new(),
            expected_status: None,
            status: None,
            duration: None,
            step: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl EventError {
    /// Returns `None` when neither message nor stack trace is known
    pub fn from_parts(message: Option<String>, stack_trace: Option<String>) -> Option<Self> {
        if message.is_none() && stack_trace.is_none() {
            return None;
        }
        Some(Self {
            message,
            stack_trace,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub action: EventAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EventError>,
}

/// A single reportable occurrence during a test run
///
/// Every event carries the run and environment. `suite`, `test` and
/// `event.error` are only present when the originating callback has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutEvent {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub environment: Arc<EnvironmentMetadata>,
    pub test_run: TestRunInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<SuiteInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestInfo>,
    pub event: EventInfo,
}

impl ScoutEvent {
    /// Start an event for `action` stamped with the current time
    pub fn new(
        action: EventAction,
        run_id: impl Into<String>,
        environment: Arc<EnvironmentMetadata>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            environment,
            test_run: TestRunInfo {
                id: run_id.into(),
                status: None,
                duration: None,
            },
            suite: None,
            test: None,
            event: EventInfo {
                action,
                error: None,
            },
        }
    }

    pub fn action(&self) -> EventAction {
        self.event.action
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        if let Some(ts) = timestamp {
            self.timestamp = ts;
        }
        self
    }

    pub fn with_suite(mut self, suite: SuiteInfo) -> Self {
        self.suite = Some(suite);
        self
    }

    pub fn with_test(mut self, test: TestInfo) -> Self {
        self.test = Some(test);
        self
    }

    pub fn with_error(mut self, error: Option<EventError>) -> Self {
        self.event.error = error;
        self
    }

    pub fn with_run_outcome(mut self, status: TestStatus, duration: u64) -> Self {
        self.test_run.status = Some(status);
        self.test_run.duration = Some(duration);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Arc<EnvironmentMetadata> {
        Arc::new(EnvironmentMetadata::default())
    }

    #[test]
    fn test_action_serializes_snake_case() {
        let json = serde_json::to_string(&EventAction::StepBegin).unwrap();
        assert_eq!(json, "\"step_begin\"");
        assert_eq!(EventAction::RunEnd.to_string(), "run_end");
    }

    #[test]
    fn test_error_absent_when_empty() {
        assert!(EventError::from_parts(None, None).is_none());

        let event = ScoutEvent::new(EventAction::TestEnd, "run-1", env())
            .with_error(EventError::from_parts(None, None));
        let value = serde_json::to_value(&event).unwrap();
        assert!(value["event"].get("error").is_none());
    }

    #[test]
    fn test_event_layout() {
        let event = ScoutEvent::new(EventAction::TestBegin, "run-1", env())
            .with_suite(SuiteInfo::new("A", SuiteType::Suite))
            .with_test(TestInfo::new("A B", "B"));

        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("@timestamp").is_some());
        assert_eq!(value["test_run"]["id"], "run-1");
        assert_eq!(value["suite"]["type"], "suite");
        assert_eq!(value["test"]["id"], test_id_for_title("A B"));
        assert_eq!(value["event"]["action"], "test_begin");
        assert!(value["test"].get("status").is_none());
    }

    #[test]
    fn test_status_accepts_runner_spelling() {
        let status: TestStatus = serde_json::from_str("\"timedOut\"").unwrap();
        assert_eq!(status, TestStatus::TimedOut);
        let status: TestStatus = serde_json::from_str("\"timedout\"").unwrap();
        assert_eq!(status, TestStatus::TimedOut);
    }
}
