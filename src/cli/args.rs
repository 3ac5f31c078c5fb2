// CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{ENV_ES_API_KEY, ENV_ES_URL};

/// Test runner event models the recorder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunnerKind {
    Mocha,
    Playwright,
}

/// Scout test-event reporting tools
#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(author = "scout team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Record Scout test events and upload them to Elasticsearch", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose debug output
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Show current configuration and exit
    #[arg(long, default_value_t = false)]
    pub config: bool,

    /// Create default configuration file
    #[arg(long, value_name = "CONFIG_FILE")]
    pub init_config: Option<PathBuf>,

    /// Print shell completion (bash, zsh, fish, powershell)
    #[arg(long, value_name = "SHELL_TYPE", value_parser = ["bash", "zsh", "fish", "powershell"])]
    pub completion: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload events recorded by the Scout reporter to Elasticsearch
    #[command(name = "upload-events")]
    UploadEvents(UploadEventsArgs),

    /// Record runner lifecycle callbacks (NDJSON) into a Scout event log
    Record(RecordArgs),
}

#[derive(Args, Debug, Clone)]
pub struct UploadEventsArgs {
    /// Path to the event log to upload (a file, or a directory of .ndjson logs)
    #[arg(long = "eventLogPath", value_name = "PATH")]
    pub event_log_path: PathBuf,

    /// Elasticsearch URL
    #[arg(long = "esURL", value_name = "URL", env = ENV_ES_URL)]
    pub es_url: Option<String>,

    /// Elasticsearch API key
    #[arg(long = "esAPIKey", value_name = "KEY", env = ENV_ES_API_KEY, hide_env_values = true)]
    pub es_api_key: Option<String>,

    /// Verify TLS certificates
    #[arg(long = "verifyTLSCerts", default_value_t = false)]
    pub verify_tls_certs: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Event model of the runner producing the callbacks
    #[arg(long, value_enum)]
    pub runner: RunnerKind,

    /// Root directory for the report (default: SCOUT_REPORT_OUTPUT_ROOT or .scout/reports)
    #[arg(long = "outputPath", value_name = "DIR")]
    pub output_path: Option<PathBuf>,

    /// Read callbacks from this file instead of stdin
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_upload_events_flags() {
        let cli = Cli::try_parse_from([
            "scout",
            "upload-events",
            "--eventLogPath",
            "events.ndjson",
            "--esURL",
            "http://localhost:9200",
            "--esAPIKey",
            "secret",
            "--verifyTLSCerts",
        ])
        .unwrap();

        let Some(Commands::UploadEvents(args)) = cli.command else {
            panic!("expected upload-events");
        };
        assert_eq!(args.event_log_path, PathBuf::from("events.ndjson"));
        assert_eq!(args.es_url.as_deref(), Some("http://localhost:9200"));
        assert_eq!(args.es_api_key.as_deref(), Some("secret"));
        assert!(args.verify_tls_certs);
    }

    #[test]
    fn test_upload_events_requires_log_path() {
        assert!(Cli::try_parse_from(["scout", "upload-events"]).is_err());
    }

    #[test]
    fn test_record_runner_values() {
        let cli = Cli::try_parse_from(["scout", "record", "--runner", "playwright"]).unwrap();
        let Some(Commands::Record(args)) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.runner, RunnerKind::Playwright);
        assert!(Cli::try_parse_from(["scout", "record", "--runner", "jest"]).is_err());
    }
}
