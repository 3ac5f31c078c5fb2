// Upload-events command - ship recorded event logs to Elasticsearch

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cli::UploadEventsArgs;
use crate::config::{Config, ENV_ES_API_KEY, ENV_ES_URL, UploadConfig};
use crate::persistence::{
    BulkOptions, BulkStats, DocumentStore, ElasticsearchClient, ElasticsearchConfig,
    ScoutReportDataStream,
};
use crate::utils::FileUtils;

/// Validated upload settings, resolved before any remote call
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub event_logs: Vec<PathBuf>,
    pub es_url: String,
    pub es_api_key: String,
    pub verify_tls_certs: bool,
    pub data_stream: String,
    pub bulk: BulkOptions,
}

impl UploadSettings {
    /// Merge flags (and their env defaults) with the config file, validating each
    pub fn resolve(args: &UploadEventsArgs, config: Option<&Config>) -> Result<Self> {
        let upload = config.map(|c| c.upload.clone()).unwrap_or_default();

        let event_logs = FileUtils::resolve_event_logs(&args.event_log_path)?;

        let es_url = args
            .es_url
            .clone()
            .or_else(|| upload.es_url.clone())
            .filter(|u| !u.is_empty())
            .with_context(|| format!("--esURL is required (or set {})", ENV_ES_URL))?;
        url::Url::parse(&es_url).with_context(|| format!("Invalid --esURL '{}'", es_url))?;

        let es_api_key = args
            .es_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .with_context(|| format!("--esAPIKey is required (or set {})", ENV_ES_API_KEY))?;

        let UploadConfig {
            verify_tls_certs,
            flush_bytes,
            data_stream,
            ..
        } = upload;

        Ok(Self {
            event_logs,
            es_url,
            es_api_key,
            verify_tls_certs: args.verify_tls_certs || verify_tls_certs,
            data_stream,
            bulk: BulkOptions {
                flush_bytes: flush_bytes.max(1),
            },
        })
    }

    pub fn es_config(&self) -> ElasticsearchConfig {
        let mut config = ElasticsearchConfig::new(&self.es_url, &self.es_api_key);
        config.verify_tls_certs = self.verify_tls_certs;
        config
    }
}

pub async fn handle_upload_events(args: &UploadEventsArgs, config: Option<&Config>) -> Result<()> {
    let settings = UploadSettings::resolve(args, config)?;

    info!("Connecting to Elasticsearch at {}", settings.es_url);
    let client = ElasticsearchClient::new(&settings.es_config())
        .context("Failed to configure the Elasticsearch client")?;
    let node = client
        .info()
        .await
        .context("Failed to connect to Elasticsearch")?;
    info!("Connected to Elasticsearch node '{}'", node.name);

    upload_event_logs(client, &settings).await?;
    Ok(())
}

/// Bootstrap the data stream schema, then upload every event log in order.
///
/// Per-document failures are reported in the returned stats, not as errors.
pub async fn upload_event_logs<S: DocumentStore>(
    store: S,
    settings: &UploadSettings,
) -> Result<BulkStats> {
    let data_stream = ScoutReportDataStream::new(store)
        .with_name(settings.data_stream.clone())
        .with_bulk_options(settings.bulk);

    data_stream
        .create_if_missing()
        .await
        .with_context(|| format!("Failed to set up data stream '{}'", data_stream.name()))?;

    let mut totals = BulkStats::default();
    for log in &settings.event_logs {
        let stats = data_stream
            .add_events_from_file(log)
            .await
            .with_context(|| format!("Failed to upload event log {}", log.display()))?;
        totals.merge(&stats);
    }

    if settings.event_logs.len() > 1 {
        info!(
            "Uploaded {} events from {} event logs ({} failed)",
            totals.total,
            settings.event_logs.len(),
            totals.failed
        );
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(path: PathBuf) -> UploadEventsArgs {
        UploadEventsArgs {
            event_log_path: path,
            es_url: Some("http://localhost:9200".to_string()),
            es_api_key: Some("key".to_string()),
            verify_tls_certs: false,
        }
    }

    #[test]
    fn test_resolve_missing_log_fails_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut args = args(dir.path().join("missing.ndjson"));
        args.es_url = None;

        let err = UploadSettings::resolve(&args, None).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_rejects_malformed_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("event-log.ndjson");
        std::fs::write(&log, "{}\n").unwrap();
        let mut args = args(log);
        args.es_url = Some("localhost 9200".to_string());

        assert!(UploadSettings::resolve(&args, None).is_err());
    }

    #[test]
    fn test_resolve_uses_config_fallbacks() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("event-log.ndjson");
        std::fs::write(&log, "{}\n").unwrap();
        let mut args = args(log.clone());
        args.es_url = None;

        let mut config = Config::default();
        config.upload.es_url = Some("https://es.example.com".to_string());
        config.upload.verify_tls_certs = true;
        config.upload.flush_bytes = 0;

        let settings = UploadSettings::resolve(&args, Some(&config)).unwrap();
        assert_eq!(settings.es_url, "https://es.example.com");
        assert!(settings.verify_tls_certs);
        assert_eq!(settings.bulk.flush_bytes, 1);
        assert_eq!(settings.event_logs, vec![log]);
    }

    #[test]
    fn test_resolve_requires_api_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("event-log.ndjson");
        std::fs::write(&log, "{}\n").unwrap();
        let mut args = args(log);
        args.es_api_key = None;

        let err = UploadSettings::resolve(&args, None).unwrap_err();
        assert!(err.to_string().contains("--esAPIKey"));
    }
}
