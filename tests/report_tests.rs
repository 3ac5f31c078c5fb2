// Tests for the event buffer and its NDJSON event log - public API only

use scout_reporting::event::{
    EnvironmentMetadata, EventAction, ScoutEvent, SuiteInfo, SuiteType, TestInfo,
};
use scout_reporting::report::{EVENT_LOG_FILE, ReportError, ScoutReport, read_event_log};
use std::sync::Arc;
use tempfile::TempDir;

fn event(action: EventAction) -> ScoutEvent {
    ScoutEvent::new(action, "18c2f0a1b2c3d4e5", Arc::new(EnvironmentMetadata::default()))
}

#[test]
fn test_saved_log_reads_back_in_order() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let mut report = ScoutReport::new();
    report.log_event(event(EventAction::RunBegin));
    report.log_event(
        event(EventAction::TestBegin)
            .with_suite(SuiteInfo::new("A", SuiteType::Suite))
            .with_test(TestInfo::new("A B", "B")),
    );
    report.log_event(event(EventAction::RunEnd));

    // Act
    let path = report.save(dir.path()).unwrap();
    let events = read_event_log(&path).unwrap();

    // Assert
    assert_eq!(path, dir.path().join(EVENT_LOG_FILE));
    let actions: Vec<_> = events.iter().map(|e| e.action()).collect();
    assert_eq!(
        actions,
        vec![EventAction::RunBegin, EventAction::TestBegin, EventAction::RunEnd]
    );
    assert_eq!(events[1].test.as_ref().unwrap().title, "B");
    assert!(events.iter().all(|e| e.test_run.id == "18c2f0a1b2c3d4e5"));
}

#[test]
fn test_each_line_is_one_json_object() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let mut report = ScoutReport::new();
    report.log_event(event(EventAction::RunBegin));
    report.log_event(event(EventAction::RunEnd));

    // Act
    let path = report.save(dir.path()).unwrap();
    let content = std::fs::read_to_string(path).unwrap();

    // Assert
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("@timestamp").is_some());
        assert!(value["event"]["action"].is_string());
    }
}

#[test]
fn test_save_refuses_to_overwrite() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let report = ScoutReport::new();
    report.save(dir.path()).unwrap();

    // Act
    let result = report.save(dir.path());

    // Assert
    assert!(matches!(result, Err(ReportError::AlreadyExists(_))));
}

#[test]
fn test_unwritable_destination_still_concludes() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let mut report = ScoutReport::new();
    report.log_event(event(EventAction::RunBegin));

    // Act
    let result = report.save_and_conclude(&blocker.join("scout-run"));

    // Assert
    assert!(matches!(result, Err(ReportError::Write { .. })));
    assert!(report.is_concluded());
    assert!(report.is_empty());
}

#[test]
fn test_concluded_report_cannot_be_saved() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let mut report = ScoutReport::new();
    report.conclude();

    // Act
    let result = report.save(dir.path());

    // Assert
    assert!(matches!(result, Err(ReportError::Concluded)));
    assert!(!dir.path().join(EVENT_LOG_FILE).exists());
}

#[test]
fn test_read_reports_malformed_line_number() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(EVENT_LOG_FILE);
    let good = serde_json::to_string(&event(EventAction::RunBegin)).unwrap();
    std::fs::write(&path, format!("{}\n{{broken\n", good)).unwrap();

    // Act
    let result = read_event_log(&path);

    // Assert
    assert!(matches!(result, Err(ReportError::Parse { line: 2, .. })));
}
