// Persistence module - schema bootstrap and event-log upload

pub mod bulk;
pub mod elasticsearch;
pub mod store;
pub mod templates;

pub use bulk::{BulkOptions, BulkStats, DEFAULT_FLUSH_BYTES, bulk_create};
pub use elasticsearch::{ElasticsearchClient, ElasticsearchConfig};
pub use store::{BulkItemFailure, BulkResponse, DocumentStore, StoreError, StoreInfo};

use crate::event::ScoutEvent;
use futures::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::SplitStream;
use tracing::{info, warn};

/// Data stream receiving Scout test events
pub const DATA_STREAM_NAME: &str = "scout-test-events-kibana";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("event log '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read event log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decode one raw event-log line, stripping a trailing `\r`
fn decode_line(bytes: Vec<u8>) -> String {
    let mut line = match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            warn!("Event log line is not valid UTF-8; invalid bytes were replaced");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

/// Treat a concurrent creation of `what` as success
fn tolerate_existing(result: Result<(), StoreError>, what: &str) -> Result<(), StoreError> {
    match result {
        Err(StoreError::AlreadyExists(name)) => {
            info!("{} '{}' was created concurrently; keeping it", what, name);
            Ok(())
        }
        other => other,
    }
}

/// The Scout events data stream on a document store
#[derive(Debug)]
pub struct ScoutReportDataStream<S> {
    store: S,
    name: String,
    bulk: BulkOptions,
}

impl<S: DocumentStore> ScoutReportDataStream<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            name: DATA_STREAM_NAME.to_string(),
            bulk: BulkOptions::default(),
        }
    }

    /// Use a different data stream; it must match the index template pattern
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_bulk_options(mut self, options: BulkOptions) -> Self {
        self.bulk = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn exists(&self) -> Result<bool, StoreError> {
        self.store.exists_data_stream(&self.name).await
    }

    /// Create every schema object that is missing: component templates, the
    /// index template, then the data stream itself
    pub async fn create_if_missing(&self) -> Result<(), StoreError> {
        self.setup_component_templates().await?;
        self.setup_index_template().await?;

        if self.exists().await? {
            return Ok(());
        }

        info!("Creating data stream '{}'", self.name);
        tolerate_existing(self.store.create_data_stream(&self.name).await, "Data stream")
    }

    pub async fn setup_component_templates(&self) -> Result<(), StoreError> {
        for template in templates::component_templates() {
            if self.store.exists_component_template(template.name).await? {
                continue;
            }

            info!("Creating component template '{}'", template.name);
            tolerate_existing(
                self.store
                    .put_component_template(template.name, &template.body)
                    .await,
                "Component template",
            )?;
        }
        Ok(())
    }

    pub async fn setup_index_template(&self) -> Result<(), StoreError> {
        let template = templates::test_events_index_template();
        if self.store.exists_index_template(template.name).await? {
            return Ok(());
        }

        info!("Creating index template '{}'", template.name);
        tolerate_existing(
            self.store
                .put_index_template(template.name, &template.body)
                .await,
            "Index template",
        )
    }

    pub async fn add_event(&self, event: &ScoutEvent) -> Result<(), PersistenceError> {
        let document = serde_json::to_value(event)?;
        self.store.index(&self.name, &document).await?;
        Ok(())
    }

    /// Upload an NDJSON event log line by line.
    ///
    /// Fails before touching the store when the file does not exist. Rejected
    /// documents are counted in the returned stats and logged as a warning.
    /// Invalid UTF-8 is replaced, never fatal.
    pub async fn add_events_from_file(
        &self,
        event_log_path: &Path,
    ) -> Result<BulkStats, PersistenceError> {
        let path =
            std::path::absolute(event_log_path).map_err(|source| PersistenceError::Read {
                path: event_log_path.to_path_buf(),
                source,
            })?;
        if !path.is_file() {
            return Err(PersistenceError::NotFound(path));
        }

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|source| PersistenceError::Read {
                path: path.clone(),
                source,
            })?;
        let lines = SplitStream::new(BufReader::new(file).split(b'\n'))
            .map(|chunk| chunk.map(decode_line));

        info!(
            "Uploading events from file {} to data stream '{}'",
            path.display(),
            self.name
        );

        let stats = bulk_create(&self.store, &self.name, lines, self.bulk)
            .await
            .map_err(|source| PersistenceError::Read {
                path: path.clone(),
                source,
            })?;

        info!(
            "Uploaded {} events in {:.3}s.",
            stats.total,
            stats.time.as_secs_f64()
        );
        if stats.failed > 0 {
            warn!("Failed to upload {} events", stats.failed);
        }

        Ok(stats)
    }
}
