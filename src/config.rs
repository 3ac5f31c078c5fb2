// Configuration file handling

use crate::persistence::{DATA_STREAM_NAME, DEFAULT_FLUSH_BYTES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub reporter: ReporterConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReporterConfig {
    /// Root directory for `scout-<runId>` report directories
    #[serde(default)]
    pub output_root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Elasticsearch URL used when neither --esURL nor ES_URL is given
    #[serde(default)]
    pub es_url: Option<String>,

    /// Verify the cluster's TLS certificate
    #[serde(default)]
    pub verify_tls_certs: bool,

    /// Bytes of documents buffered before a bulk request is sent
    #[serde(default = "default_flush_bytes")]
    pub flush_bytes: usize,

    /// Target data stream
    #[serde(default = "default_data_stream")]
    pub data_stream: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            es_url: None,
            verify_tls_certs: false,
            flush_bytes: default_flush_bytes(),
            data_stream: default_data_stream(),
        }
    }
}

// Environment variables
pub const ENV_ES_URL: &str = "ES_URL";
pub const ENV_ES_API_KEY: &str = "ES_API_KEY";
pub const ENV_SCOUT_REPORT_OUTPUT_ROOT: &str = "SCOUT_REPORT_OUTPUT_ROOT";

pub const DEFAULT_OUTPUT_ROOT: &str = ".scout/reports";

/// Report output root: `SCOUT_REPORT_OUTPUT_ROOT`, else `.scout/reports`
pub fn default_output_root() -> PathBuf {
    std::env::var_os(ENV_SCOUT_REPORT_OUTPUT_ROOT)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT))
}

fn default_flush_bytes() -> usize {
    DEFAULT_FLUSH_BYTES
}

fn default_data_stream() -> String {
    DATA_STREAM_NAME.to_string()
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Option<Self> {
        // Check locations in order:
        // 1. .scoutrc (current directory)
        // 2. ~/.scoutrc (home directory)
        // 3. .scoutrc.toml (current directory)
        // 4. ~/.scoutrc.toml (home directory)

        let cwd = std::env::current_dir().ok()?;
        let home = dirs::home_dir()?;

        let paths = [
            cwd.join(".scoutrc"),
            home.join(".scoutrc"),
            cwd.join(".scoutrc.toml"),
            home.join(".scoutrc.toml"),
        ];

        paths
            .iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Option<Self> {
        toml::from_str(content).ok()
    }

    /// Generate configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Output root from the config file, falling back to the environment default
    pub fn output_root(&self) -> PathBuf {
        self.reporter
            .output_root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_output_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[reporter]
output_root = "target/scout"

[upload]
es_url = "https://es.example.com:9243"
verify_tls_certs = true
flush_bytes = 1024
"#;

        let config = Config::parse(toml).expect("Failed to parse config");
        assert_eq!(config.reporter.output_root.as_deref(), Some("target/scout"));
        assert_eq!(config.output_root(), PathBuf::from("target/scout"));
        assert_eq!(
            config.upload.es_url.as_deref(),
            Some("https://es.example.com:9243")
        );
        assert!(config.upload.verify_tls_certs);
        assert_eq!(config.upload.flush_bytes, 1024);
        assert_eq!(config.upload.data_stream, DATA_STREAM_NAME);
    }

    #[test]
    fn test_defaults_round_trip() {
        let config = Config::default();
        let parsed = Config::parse(&config.to_toml()).expect("Failed to parse generated config");
        assert_eq!(parsed.upload.flush_bytes, DEFAULT_FLUSH_BYTES);
        assert!(!parsed.upload.verify_tls_certs);
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(Config::parse("[upload]\nflush_bytes = \"lots\"").is_none());
    }
}
