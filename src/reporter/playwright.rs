// Playwright-style runner adapter

use super::{
    AdapterError, ReporterCore, ReporterOptions, RunnerAdapter, RunnerError, UNKNOWN_SUITE,
    event_error, lenient_millis,
};
use crate::event::{
    Annotation, EventAction, ScoutEvent, StepInfo, SuiteInfo, SuiteType, TestInfo, TestStatus,
    full_title,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, trace, warn};

/// Reporter callbacks invoked by a playwright runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaywrightLifecycle {
    Begin,
    TestBegin,
    StepBegin,
    StepEnd,
    TestEnd,
    End,
    Error,
    Exit,
}

impl PlaywrightLifecycle {
    pub const ALL: [PlaywrightLifecycle; 8] = [
        Self::Begin,
        Self::TestBegin,
        Self::StepBegin,
        Self::StepEnd,
        Self::TestEnd,
        Self::End,
        Self::Error,
        Self::Exit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Begin => "onBegin",
            Self::TestBegin => "onTestBegin",
            Self::StepBegin => "onStepBegin",
            Self::StepEnd => "onStepEnd",
            Self::TestEnd => "onTestEnd",
            Self::End => "onEnd",
            Self::Error => "onError",
            Self::Exit => "onExit",
        }
    }
}

impl FromStr for PlaywrightLifecycle {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.name() == s)
            .ok_or_else(|| AdapterError::UnknownLifecycle {
                runner: "playwright",
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwSuite {
    #[serde(default)]
    pub title_path: Vec<String>,
    #[serde(rename = "type", default = "describe_suite")]
    pub kind: SuiteType,
}

fn describe_suite() -> SuiteType {
    SuiteType::Describe
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwTestCase {
    pub title: String,
    #[serde(default)]
    pub title_path: Vec<String>,
    #[serde(default)]
    pub parent: Option<PwSuite>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub expected_status: Option<TestStatus>,
}

impl PwTestCase {
    pub fn full_title(&self) -> String {
        if !self.title_path.is_empty() {
            return full_title(&self.title_path);
        }
        match &self.parent {
            Some(parent) => full_title(&[full_title(&parent.title_path), self.title.clone()]),
            None => full_title(&[&self.title]),
        }
    }

    /// Containing suite, falling back to the unknown suite
    fn suite_info(&self) -> SuiteInfo {
        let Some(parent) = &self.parent else {
            return SuiteInfo::new(UNKNOWN_SUITE, SuiteType::Root);
        };
        let title = full_title(&parent.title_path);
        if title.is_empty() {
            SuiteInfo::new(UNKNOWN_SUITE, parent.kind)
        } else {
            SuiteInfo::new(title, parent.kind)
        }
    }

    fn test_info(&self) -> TestInfo {
        let mut info = TestInfo::new(&self.full_title(), self.title.clone());
        info.tags = self.tags.clone();
        info.annotations = self.annotations.clone();
        info.expected_status = self.expected_status;
        info
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwTestResult {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<TestStatus>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub error: Option<RunnerError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwTestStep {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_path: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub error: Option<RunnerError>,
}

impl PwTestStep {
    fn info(&self) -> StepInfo {
        let title = if self.title_path.is_empty() {
            self.title.clone()
        } else {
            self.title_path.join(" ")
        };
        StepInfo {
            title,
            category: self.category.clone(),
            duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PwFullResult {
    #[serde(default)]
    pub status: Option<TestStatus>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub duration: Option<u64>,
}

/// Native payload delivered with a playwright reporter callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaywrightPayload {
    None,
    Test {
        test: PwTestCase,
        result: PwTestResult,
    },
    Step {
        test: PwTestCase,
        result: PwTestResult,
        step: PwTestStep,
    },
    Result(PwFullResult),
    Error(RunnerError),
}

#[derive(Deserialize)]
struct TestArgs {
    test: PwTestCase,
    #[serde(default)]
    result: PwTestResult,
}

#[derive(Deserialize)]
struct StepArgs {
    test: PwTestCase,
    #[serde(default)]
    result: PwTestResult,
    step: PwTestStep,
}

type Translate = fn(&ReporterCore, &PlaywrightPayload) -> Option<ScoutEvent>;

/// Scout reporter for playwright-style runners
#[derive(Debug)]
pub struct ScoutPlaywrightReporter {
    core: ReporterCore,
    handlers: HashMap<PlaywrightLifecycle, Translate>,
}

impl ScoutPlaywrightReporter {
    pub fn new(options: ReporterOptions) -> Self {
        // onExit has nothing to record
        let handlers: HashMap<PlaywrightLifecycle, Translate> = HashMap::from([
            (PlaywrightLifecycle::Begin, on_begin as Translate),
            (PlaywrightLifecycle::TestBegin, on_test_begin as Translate),
            (PlaywrightLifecycle::StepBegin, on_step_begin as Translate),
            (PlaywrightLifecycle::StepEnd, on_step_end as Translate),
            (PlaywrightLifecycle::TestEnd, on_test_end as Translate),
            (PlaywrightLifecycle::End, on_end as Translate),
            (PlaywrightLifecycle::Error, on_error as Translate),
        ]);

        Self {
            core: ReporterCore::new(options),
            handlers,
        }
    }

    /// The reporter writes its run id to stdout
    pub fn prints_to_stdio(&self) -> bool {
        true
    }
}

impl RunnerAdapter for ScoutPlaywrightReporter {
    type Lifecycle = PlaywrightLifecycle;
    type Payload = PlaywrightPayload;

    fn core(&self) -> &ReporterCore {
        &self.core
    }

    fn dispatch(
        &mut self,
        lifecycle: PlaywrightLifecycle,
        payload: PlaywrightPayload,
    ) -> Result<(), AdapterError> {
        let span = self.core.span().clone();
        let _enter = span.enter();

        if self.core.is_finished() {
            if lifecycle != PlaywrightLifecycle::Exit {
                warn!("Ignoring playwright '{}' callback after the run ended", lifecycle.name());
            }
            return Ok(());
        }

        let Some(translate) = self.handlers.get(&lifecycle).copied() else {
            trace!("No handler for playwright '{}' callback", lifecycle.name());
            return Ok(());
        };

        match translate(&self.core, &payload) {
            Some(event) => self.core.log_event(event),
            None => debug!("Playwright '{}' callback produced no Scout event", lifecycle.name()),
        }

        if lifecycle == PlaywrightLifecycle::End {
            self.core.finish()?;
        }
        Ok(())
    }

    fn parse_payload(
        lifecycle: PlaywrightLifecycle,
        value: serde_json::Value,
    ) -> Result<PlaywrightPayload, AdapterError> {
        let wrap = |source| AdapterError::Payload {
            lifecycle: lifecycle.name().to_string(),
            source,
        };

        let payload = match lifecycle {
            PlaywrightLifecycle::Begin | PlaywrightLifecycle::Exit => PlaywrightPayload::None,
            PlaywrightLifecycle::TestBegin | PlaywrightLifecycle::TestEnd => {
                let args: TestArgs = serde_json::from_value(value).map_err(wrap)?;
                PlaywrightPayload::Test {
                    test: args.test,
                    result: args.result,
                }
            }
            PlaywrightLifecycle::StepBegin | PlaywrightLifecycle::StepEnd => {
                let args: StepArgs = serde_json::from_value(value).map_err(wrap)?;
                PlaywrightPayload::Step {
                    test: args.test,
                    result: args.result,
                    step: args.step,
                }
            }
            // The run must still end (and save) when its result is unreadable
            PlaywrightLifecycle::End => match serde_json::from_value(value) {
                Ok(result) => PlaywrightPayload::Result(result),
                Err(e) => {
                    warn!("Unreadable playwright run result ({}); recording a failed run", e);
                    PlaywrightPayload::None
                }
            },
            PlaywrightLifecycle::Error => {
                PlaywrightPayload::Error(serde_json::from_value(value).map_err(wrap)?)
            }
        };
        Ok(payload)
    }
}

fn unexpected(expected: &str, payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    warn!("Expected a {} payload, got {:?}; event skipped", expected, payload);
    None
}

fn on_begin(core: &ReporterCore, _payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    Some(core.event(EventAction::RunBegin))
}

fn on_test_begin(core: &ReporterCore, payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    let PlaywrightPayload::Test { test, result } = payload else {
        return unexpected("test", payload);
    };
    Some(
        core.event(EventAction::TestBegin)
            .with_timestamp(result.start_time)
            .with_suite(test.suite_info())
            .with_test(test.test_info()),
    )
}

fn on_test_end(core: &ReporterCore, payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    let PlaywrightPayload::Test { test, result } = payload else {
        return unexpected("test", payload);
    };
    let mut info = test.test_info();
    info.status = result.status;
    info.duration = result.duration;

    Some(
        core.event(EventAction::TestEnd)
            .with_suite(test.suite_info())
            .with_test(info)
            .with_error(event_error(result.error.as_ref())),
    )
}

fn on_step_begin(core: &ReporterCore, payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    let PlaywrightPayload::Step { test, step, .. } = payload else {
        return unexpected("step", payload);
    };
    let mut info = test.test_info();
    info.step = Some(step.info());

    Some(
        core.event(EventAction::StepBegin)
            .with_timestamp(step.start_time)
            .with_suite(test.suite_info())
            .with_test(info),
    )
}

fn on_step_end(core: &ReporterCore, payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    let PlaywrightPayload::Step { test, step, .. } = payload else {
        return unexpected("step", payload);
    };
    let mut step_info = step.info();
    step_info.duration = step.duration;
    let mut info = test.test_info();
    info.step = Some(step_info);

    Some(
        core.event(EventAction::StepEnd)
            .with_suite(test.suite_info())
            .with_test(info)
            .with_error(event_error(step.error.as_ref())),
    )
}

fn on_end(core: &ReporterCore, payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    let (status, duration) = match payload {
        PlaywrightPayload::Result(result) => (
            result.status.unwrap_or(TestStatus::Failed),
            result.duration.unwrap_or(0),
        ),
        other => {
            warn!("Run ended without a result payload ({:?}); assuming failure", other);
            (TestStatus::Failed, 0)
        }
    };
    Some(core.event(EventAction::RunEnd).with_run_outcome(status, duration))
}

fn on_error(core: &ReporterCore, payload: &PlaywrightPayload) -> Option<ScoutEvent> {
    let PlaywrightPayload::Error(err) = payload else {
        return unexpected("error", payload);
    };
    Some(core.event(EventAction::Error).with_error(event_error(Some(err))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_case() -> PwTestCase {
        PwTestCase {
            title: "opens the page".to_string(),
            title_path: vec![
                "".to_string(),
                "chromium".to_string(),
                "home.spec.ts".to_string(),
                "Home".to_string(),
                "opens the page".to_string(),
            ],
            parent: Some(PwSuite {
                title_path: vec![
                    "".to_string(),
                    "chromium".to_string(),
                    "home.spec.ts".to_string(),
                    "Home".to_string(),
                ],
                kind: SuiteType::Describe,
            }),
            tags: vec!["@smoke".to_string()],
            annotations: Vec::new(),
            expected_status: Some(TestStatus::Passed),
        }
    }

    #[test]
    fn test_lifecycle_names_round_trip() {
        for lifecycle in PlaywrightLifecycle::ALL {
            assert_eq!(lifecycle.name().parse::<PlaywrightLifecycle>().unwrap(), lifecycle);
        }
        assert!("onStdOut".parse::<PlaywrightLifecycle>().is_err());
    }

    #[test]
    fn test_test_info_uses_title_path() {
        let test = test_case();
        let info = test.test_info();
        let expected = crate::event::test_id_for_title("chromium home.spec.ts Home opens the page");
        assert_eq!(info.id, expected);
        assert_eq!(info.tags, vec!["@smoke".to_string()]);
        assert_eq!(test.suite_info().title, "chromium home.spec.ts Home");
        assert_eq!(test.suite_info().kind, SuiteType::Describe);
    }

    #[test]
    fn test_step_title_joins_path() {
        let step = PwTestStep {
            title: "click".to_string(),
            title_path: vec!["login".to_string(), "click".to_string()],
            category: Some("pw:api".to_string()),
            ..PwTestStep::default()
        };
        assert_eq!(step.info().title, "login click");
    }

    #[test]
    fn test_parse_step_payload() {
        let value = json!({
            "test": {
                "title": "t",
                "parent": {"titlePath": ["", "s"], "type": "file"}
            },
            "step": {"title": "expect", "category": "expect", "duration": 4}
        });
        let payload =
            ScoutPlaywrightReporter::parse_payload(PlaywrightLifecycle::StepEnd, value).unwrap();
        let PlaywrightPayload::Step { test, step, .. } = payload else {
            panic!("expected step payload");
        };
        assert_eq!(test.full_title(), "s t");
        assert_eq!(step.duration, Some(4));
    }

    #[test]
    fn test_parse_payload_reports_lifecycle() {
        let err = ScoutPlaywrightReporter::parse_payload(PlaywrightLifecycle::Error, json!("x"))
            .unwrap_err();
        assert!(err.to_string().contains("onError"));
    }

    #[test]
    fn test_test_without_parent_uses_unknown_suite() {
        let value = json!({"test": {"title": "t"}, "result": {"duration": 41.6}});
        let payload =
            ScoutPlaywrightReporter::parse_payload(PlaywrightLifecycle::TestEnd, value).unwrap();
        let PlaywrightPayload::Test { test, result } = payload else {
            panic!("expected test payload");
        };
        assert_eq!(test.full_title(), "t");
        assert_eq!(test.suite_info().title, UNKNOWN_SUITE);
        assert_eq!(result.duration, Some(42));

        let mut rootless = test_case();
        rootless.parent = Some(PwSuite {
            title_path: vec!["".to_string()],
            kind: SuiteType::Root,
        });
        assert_eq!(rootless.suite_info().title, UNKNOWN_SUITE);
    }

    #[test]
    fn test_unreadable_run_result_still_ends_the_run() {
        let payload =
            ScoutPlaywrightReporter::parse_payload(PlaywrightLifecycle::End, json!({"status": 3}))
                .unwrap();
        assert_eq!(payload, PlaywrightPayload::None);

        let payload = ScoutPlaywrightReporter::parse_payload(
            PlaywrightLifecycle::End,
            json!({"duration": 1234.567}),
        )
        .unwrap();
        let core = ReporterCore::new(ReporterOptions::default());
        let event = on_end(&core, &payload).unwrap();
        assert_eq!(event.test_run.status, Some(TestStatus::Failed));
        assert_eq!(event.test_run.duration, Some(1235));
    }
}
