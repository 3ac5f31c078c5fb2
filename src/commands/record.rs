// Record command - drive a runner adapter from NDJSON lifecycle callbacks

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::cli::{RecordArgs, RunnerKind};
use crate::config::{Config, ENV_SCOUT_REPORT_OUTPUT_ROOT};
use crate::reporter::{ReporterOptions, RunnerAdapter, ScoutMochaReporter, ScoutPlaywrightReporter};

/// One runner callback: `{"event": "<name>", "payload": {...}}`
#[derive(Debug, Deserialize)]
struct RecordedCallback {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// What happened while replaying callbacks into an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub run_id: String,
    pub callbacks: usize,
    pub skipped: usize,
    pub finished: bool,
    pub report_root: PathBuf,
}

pub fn handle_record(args: &RecordArgs, config: Option<&Config>) -> Result<()> {
    // SCOUT_REPORT_OUTPUT_ROOT wins over the config file
    let env_root_set =
        std::env::var_os(ENV_SCOUT_REPORT_OUTPUT_ROOT).is_some_and(|v| !v.is_empty());
    let options = ReporterOptions {
        output_path: args.output_path.clone().or_else(|| {
            config
                .filter(|_| !env_root_set)
                .and_then(|c| c.reporter.output_root.as_ref())
                .map(PathBuf::from)
        }),
        environment: None,
    };

    let input: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path).with_context(|| {
            format!("Failed to open callback input: {}", path.display())
        })?)),
        None => Box::new(io::stdin().lock()),
    };

    let summary = match args.runner {
        RunnerKind::Mocha => replay(&mut ScoutMochaReporter::new(options), input)?,
        RunnerKind::Playwright => replay(&mut ScoutPlaywrightReporter::new(options), input)?,
    };

    if summary.finished {
        info!(
            "Recorded run {} ({} callbacks) under {}",
            summary.run_id,
            summary.callbacks,
            summary.report_root.display()
        );
    }
    Ok(())
}

/// Feed every callback line into `adapter`.
///
/// Malformed lines, unknown event names and bad payloads are skipped with a
/// warning. Only a failure to save the report at run end is an error.
pub fn replay<A: RunnerAdapter, R: BufRead>(adapter: &mut A, input: R) -> Result<ReplaySummary> {
    let mut callbacks = 0;
    let mut skipped = 0;

    for (idx, line) in input.lines().enumerate() {
        let line = line.context("Failed to read runner callbacks")?;
        if line.trim().is_empty() {
            continue;
        }

        let callback: RecordedCallback = match serde_json::from_str(&line) {
            Ok(callback) => callback,
            Err(e) => {
                warn!("Skipping malformed callback on line {}: {}", idx + 1, e);
                skipped += 1;
                continue;
            }
        };

        let parsed = callback
            .event
            .parse::<A::Lifecycle>()
            .and_then(|lifecycle| Ok((lifecycle, A::parse_payload(lifecycle, callback.payload)?)));
        let (lifecycle, payload) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping callback on line {}: {}", idx + 1, e);
                skipped += 1;
                continue;
            }
        };

        adapter
            .dispatch(lifecycle, payload)
            .context("Failed to record Scout report")?;
        callbacks += 1;
    }

    if !adapter.is_finished() {
        warn!(
            "Callbacks ended before the run finished; {} buffered events were not saved",
            adapter.report().len()
        );
    }

    Ok(ReplaySummary {
        run_id: adapter.run_id().to_string(),
        callbacks,
        skipped,
        finished: adapter.is_finished(),
        report_root: adapter.report_root_path(),
    })
}
