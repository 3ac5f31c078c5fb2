// Mocha-style runner adapter

use super::{
    AdapterError, ReporterCore, ReporterOptions, RunnerAdapter, RunnerError, UNKNOWN_SUITE,
    event_error, lenient_millis,
};
use crate::event::{
    EventAction, HookInfo, ScoutEvent, SuiteInfo, SuiteType, TestInfo, TestStatus, full_title,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, trace, warn};

/// Lifecycle events emitted by a mocha runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MochaLifecycle {
    Start,
    End,
    Suite,
    SuiteEnd,
    Test,
    TestEnd,
    Hook,
    HookEnd,
    Pending,
    Retry,
    Fail,
}

impl MochaLifecycle {
    pub const ALL: [MochaLifecycle; 11] = [
        Self::Start,
        Self::End,
        Self::Suite,
        Self::SuiteEnd,
        Self::Test,
        Self::TestEnd,
        Self::Hook,
        Self::HookEnd,
        Self::Pending,
        Self::Retry,
        Self::Fail,
    ];

    /// Event name as emitted by the runner
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Suite => "suite",
            Self::SuiteEnd => "suite end",
            Self::Test => "test",
            Self::TestEnd => "test end",
            Self::Hook => "hook",
            Self::HookEnd => "hook end",
            Self::Pending => "pending",
            Self::Retry => "retry",
            Self::Fail => "fail",
        }
    }
}

impl FromStr for MochaLifecycle {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.name() == s)
            .ok_or_else(|| AdapterError::UnknownLifecycle {
                runner: "mocha",
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MochaSuite {
    #[serde(default)]
    pub title: String,
    /// Titles from the outermost suite down to this one
    #[serde(default)]
    pub title_path: Vec<String>,
    #[serde(default)]
    pub root: bool,
}

impl MochaSuite {
    pub fn full_title(&self) -> String {
        if self.title_path.is_empty() {
            full_title(&[&self.title])
        } else {
            full_title(&self.title_path)
        }
    }

    fn info(&self) -> SuiteInfo {
        SuiteInfo::new(self.full_title(), SuiteType::Suite)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnableType {
    #[default]
    Test,
    Hook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnableState {
    Passed,
    Failed,
    Pending,
}

/// A mocha test or hook
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MochaRunnable {
    #[serde(default, rename = "type")]
    pub kind: RunnableType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent: Option<MochaSuite>,
    #[serde(default)]
    pub state: Option<RunnableState>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub err: Option<RunnerError>,
}

impl MochaRunnable {
    pub fn test(title: impl Into<String>, parent: Option<MochaSuite>) -> Self {
        Self {
            title: title.into(),
            parent,
            ..Self::default()
        }
    }

    pub fn full_title(&self) -> String {
        match &self.parent {
            Some(parent) => full_title(&[parent.full_title(), self.title.clone()]),
            None => full_title(&[&self.title]),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.state == Some(RunnableState::Passed)
    }

    /// Containing suite, falling back to the unknown suite
    fn suite_info(&self) -> SuiteInfo {
        let kind = match &self.parent {
            Some(parent) if parent.root => SuiteType::Root,
            _ => SuiteType::Suite,
        };
        let title = self
            .parent
            .as_ref()
            .map(MochaSuite::full_title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_SUITE.to_string());
        SuiteInfo::new(title, kind)
    }

    fn test_info(&self) -> TestInfo {
        TestInfo::new(&self.full_title(), self.title.clone())
    }
}

/// Aggregate counters exposed by the runner at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MochaStats {
    #[serde(default)]
    pub suites: u64,
    #[serde(default)]
    pub tests: u64,
    #[serde(default)]
    pub passes: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub failures: u64,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub duration: Option<u64>,
}

/// Native payload delivered with a mocha lifecycle callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MochaPayload {
    None,
    Suite(MochaSuite),
    Runnable(MochaRunnable),
    Stats(MochaStats),
}

type Translate = fn(&ReporterCore, &MochaPayload) -> Option<ScoutEvent>;

/// Scout reporter for mocha-style runners
#[derive(Debug)]
pub struct ScoutMochaReporter {
    core: ReporterCore,
    handlers: HashMap<MochaLifecycle, Translate>,
}

impl ScoutMochaReporter {
    pub fn new(options: ReporterOptions) -> Self {
        let handlers: HashMap<MochaLifecycle, Translate> = HashMap::from([
            (MochaLifecycle::Start, on_run_start as Translate),
            (MochaLifecycle::End, on_run_end as Translate),
            (MochaLifecycle::Suite, on_suite_start as Translate),
            (MochaLifecycle::SuiteEnd, on_suite_end as Translate),
            (MochaLifecycle::Test, on_test_start as Translate),
            (MochaLifecycle::TestEnd, on_test_end as Translate),
            (MochaLifecycle::Hook, on_hook_start as Translate),
            (MochaLifecycle::HookEnd, on_hook_end as Translate),
            (MochaLifecycle::Pending, on_test_pending as Translate),
            (MochaLifecycle::Retry, on_test_retry as Translate),
            (MochaLifecycle::Fail, on_fail as Translate),
        ]);

        Self {
            core: ReporterCore::new(options),
            handlers,
        }
    }
}

impl RunnerAdapter for ScoutMochaReporter {
    type Lifecycle = MochaLifecycle;
    type Payload = MochaPayload;

    fn core(&self) -> &ReporterCore {
        &self.core
    }

    fn dispatch(
        &mut self,
        lifecycle: MochaLifecycle,
        payload: MochaPayload,
    ) -> Result<(), AdapterError> {
        let span = self.core.span().clone();
        let _enter = span.enter();

        if self.core.is_finished() {
            warn!("Ignoring mocha '{}' event received after the run ended", lifecycle.name());
            return Ok(());
        }

        let Some(translate) = self.handlers.get(&lifecycle).copied() else {
            trace!("No handler for mocha '{}' event", lifecycle.name());
            return Ok(());
        };

        match translate(&self.core, &payload) {
            Some(event) => self.core.log_event(event),
            None => debug!("Mocha '{}' event produced no Scout event", lifecycle.name()),
        }

        if lifecycle == MochaLifecycle::End {
            self.core.finish()?;
        }
        Ok(())
    }

    fn parse_payload(
        lifecycle: MochaLifecycle,
        value: serde_json::Value,
    ) -> Result<MochaPayload, AdapterError> {
        let wrap = |source| AdapterError::Payload {
            lifecycle: lifecycle.name().to_string(),
            source,
        };

        let payload = match lifecycle {
            MochaLifecycle::Start => MochaPayload::None,
            MochaLifecycle::End if value.is_null() => MochaPayload::Stats(MochaStats::default()),
            // The run must still end (and save) when its stats are unreadable
            MochaLifecycle::End => match serde_json::from_value(value) {
                Ok(stats) => MochaPayload::Stats(stats),
                Err(e) => {
                    warn!("Unreadable mocha run stats ({}); the run is recorded as failed", e);
                    MochaPayload::None
                }
            },
            MochaLifecycle::Suite | MochaLifecycle::SuiteEnd => {
                MochaPayload::Suite(serde_json::from_value(value).map_err(wrap)?)
            }
            _ => MochaPayload::Runnable(serde_json::from_value(value).map_err(wrap)?),
        };
        Ok(payload)
    }
}

fn unexpected(expected: &str, payload: &MochaPayload) -> Option<ScoutEvent> {
    warn!("Expected a {} payload, got {:?}; event skipped", expected, payload);
    None
}

fn on_run_start(core: &ReporterCore, _payload: &MochaPayload) -> Option<ScoutEvent> {
    Some(core.event(EventAction::RunBegin))
}

fn on_run_end(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let (status, duration) = match payload {
        MochaPayload::Stats(stats) if stats.failures == 0 => (TestStatus::Passed, stats.duration),
        MochaPayload::Stats(stats) => (TestStatus::Failed, stats.duration),
        other => {
            warn!("Run ended without stats ({:?}); assuming failure", other);
            (TestStatus::Failed, None)
        }
    };
    Some(core.event(EventAction::RunEnd).with_run_outcome(status, duration.unwrap_or(0)))
}

fn suite_event(
    core: &ReporterCore,
    action: EventAction,
    payload: &MochaPayload,
) -> Option<ScoutEvent> {
    let MochaPayload::Suite(suite) = payload else {
        return unexpected("suite", payload);
    };
    // The root suite is already covered by run_begin/run_end
    if suite.root {
        return None;
    }
    Some(core.event(action).with_suite(suite.info()))
}

fn on_suite_start(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    suite_event(core, EventAction::SuiteBegin, payload)
}

fn on_suite_end(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    suite_event(core, EventAction::SuiteEnd, payload)
}

fn on_test_start(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let MochaPayload::Runnable(test) = payload else {
        return unexpected("test", payload);
    };
    Some(
        core.event(EventAction::TestBegin)
            .with_suite(test.suite_info())
            .with_test(test.test_info()),
    )
}

fn on_test_end(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let MochaPayload::Runnable(test) = payload else {
        return unexpected("test", payload);
    };
    let mut info = test.test_info();
    info.status = Some(if test.is_passed() {
        TestStatus::Passed
    } else {
        TestStatus::Failed
    });
    info.duration = test.duration;

    Some(
        core.event(EventAction::TestEnd)
            .with_suite(test.suite_info())
            .with_test(info)
            .with_error(event_error(test.err.as_ref())),
    )
}

fn on_test_pending(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let MochaPayload::Runnable(test) = payload else {
        return unexpected("test", payload);
    };
    let mut info = test.test_info();
    info.status = Some(TestStatus::Skipped);

    Some(
        core.event(EventAction::Pending)
            .with_suite(test.suite_info())
            .with_test(info),
    )
}

fn on_test_retry(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let MochaPayload::Runnable(test) = payload else {
        return unexpected("test", payload);
    };
    let mut info = test.test_info();
    info.status = Some(TestStatus::Failed);
    info.duration = test.duration;

    Some(
        core.event(EventAction::Retry)
            .with_suite(test.suite_info())
            .with_test(info)
            .with_error(event_error(test.err.as_ref())),
    )
}

fn hook_event(core: &ReporterCore, action: EventAction, hook: &MochaRunnable) -> ScoutEvent {
    let suite = hook.suite_info().with_hook(HookInfo {
        title: hook.title.clone(),
        duration: hook.duration,
    });
    core.event(action).with_suite(suite)
}

fn on_hook_start(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let MochaPayload::Runnable(hook) = payload else {
        return unexpected("hook", payload);
    };
    Some(hook_event(core, EventAction::HookBegin, hook))
}

fn on_hook_end(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let MochaPayload::Runnable(hook) = payload else {
        return unexpected("hook", payload);
    };
    Some(hook_event(core, EventAction::HookEnd, hook).with_error(event_error(hook.err.as_ref())))
}

fn on_fail(core: &ReporterCore, payload: &MochaPayload) -> Option<ScoutEvent> {
    let MochaPayload::Runnable(runnable) = payload else {
        return unexpected("runnable", payload);
    };
    // Test failures are reported by 'test end'; only hook failures need their own event
    if runnable.kind != RunnableType::Hook {
        return None;
    }
    Some(
        hook_event(core, EventAction::Error, runnable)
            .with_error(event_error(runnable.err.as_ref())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_names_round_trip() {
        for lifecycle in MochaLifecycle::ALL {
            assert_eq!(lifecycle.name().parse::<MochaLifecycle>().unwrap(), lifecycle);
        }
        assert!("test begin".parse::<MochaLifecycle>().is_err());
    }

    #[test]
    fn test_full_title_includes_parents() {
        let parent = MochaSuite {
            title: "B".to_string(),
            title_path: vec!["A".to_string(), "B".to_string()],
            root: false,
        };
        let test = MochaRunnable::test("does it", Some(parent));
        assert_eq!(test.full_title(), "A B does it");
    }

    #[test]
    fn test_suite_defaults_to_unknown() {
        let test = MochaRunnable::test("orphan", None);
        let suite = test.suite_info();
        assert_eq!(suite.title, UNKNOWN_SUITE);
        assert_eq!(suite.kind, SuiteType::Suite);

        let root = MochaSuite {
            root: true,
            ..MochaSuite::default()
        };
        let suite = MochaRunnable::test("top level", Some(root)).suite_info();
        assert_eq!(suite.title, UNKNOWN_SUITE);
        assert_eq!(suite.kind, SuiteType::Root);
    }

    #[test]
    fn test_mismatched_payload_is_skipped() {
        let core = ReporterCore::new(ReporterOptions::default());
        assert!(on_test_start(&core, &MochaPayload::None).is_none());
    }

    #[test]
    fn test_fail_only_reports_hooks() {
        let core = ReporterCore::new(ReporterOptions::default());
        let mut runnable = MochaRunnable::test("t", None);
        runnable.err = Some(RunnerError::new("boom"));
        assert!(on_fail(&core, &MochaPayload::Runnable(runnable.clone())).is_none());

        runnable.kind = RunnableType::Hook;
        let event = on_fail(&core, &MochaPayload::Runnable(runnable)).unwrap();
        assert_eq!(event.action(), EventAction::Error);
        assert_eq!(event.event.error.unwrap().message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_parse_payload_shapes() {
        let payload = ScoutMochaReporter::parse_payload(
            MochaLifecycle::TestEnd,
            serde_json::json!({"title": "x", "state": "passed", "duration": 10}),
        )
        .unwrap();
        let MochaPayload::Runnable(test) = payload else {
            panic!("expected runnable payload");
        };
        assert!(test.is_passed());
        assert_eq!(test.duration, Some(10));

        let null = serde_json::Value::Null;
        let payload = ScoutMochaReporter::parse_payload(MochaLifecycle::End, null).unwrap();
        assert_eq!(payload, MochaPayload::Stats(MochaStats::default()));
    }

    #[test]
    fn test_fractional_durations_are_rounded() {
        let payload = ScoutMochaReporter::parse_payload(
            MochaLifecycle::TestEnd,
            serde_json::json!({"title": "x", "state": "passed", "duration": 12.5}),
        )
        .unwrap();
        let MochaPayload::Runnable(test) = payload else {
            panic!("expected runnable payload");
        };
        assert_eq!(test.duration, Some(13));

        let payload = ScoutMochaReporter::parse_payload(
            MochaLifecycle::End,
            serde_json::json!({"failures": 0, "duration": 12.5}),
        )
        .unwrap();
        let MochaPayload::Stats(stats) = payload else {
            panic!("expected stats payload");
        };
        assert_eq!(stats.duration, Some(13));
    }

    #[test]
    fn test_unreadable_run_stats_still_end_the_run() {
        let payload = ScoutMochaReporter::parse_payload(
            MochaLifecycle::End,
            serde_json::json!({"failures": "many"}),
        )
        .unwrap();
        assert_eq!(payload, MochaPayload::None);

        let core = ReporterCore::new(ReporterOptions::default());
        let event = on_run_end(&core, &payload).unwrap();
        assert_eq!(event.action(), EventAction::RunEnd);
        assert_eq!(event.test_run.status, Some(TestStatus::Failed));
    }
}
