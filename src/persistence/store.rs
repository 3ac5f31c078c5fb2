// Document store capabilities needed by the upload pipeline

use serde_json::Value;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("cannot reach {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{0}' already exists")]
    AlreadyExists(String),

    #[error("{endpoint} returned {status}: {reason}")]
    Status {
        endpoint: String,
        status: u16,
        reason: String,
    },

    #[error("unexpected response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// Cluster identity returned by a successful connection check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    pub name: String,
    pub cluster_name: Option<String>,
    pub version: Option<String>,
}

/// A document of a bulk request the store rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    /// Position of the document within the submitted batch
    pub position: usize,
    pub status: u16,
    pub reason: String,
}

/// Per-document outcome of one bulk request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub failures: Vec<BulkItemFailure>,
}

/// Remote document store: schema management plus document ingestion.
///
/// `put_*` and `create_data_stream` report a concurrent creation as
/// [`StoreError::AlreadyExists`].
pub trait DocumentStore {
    fn info(&self) -> impl Future<Output = Result<StoreInfo, StoreError>> + Send;

    fn exists_component_template(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn put_component_template(
        &self,
        name: &str,
        body: &Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn exists_index_template(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn put_index_template(
        &self,
        name: &str,
        body: &Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn exists_data_stream(&self, name: &str)
    -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn create_data_stream(&self, name: &str)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write a single document
    fn index(&self, index: &str, document: &Value)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Submit `documents` (raw JSON) as `create` operations against `index`
    fn bulk_create(
        &self,
        index: &str,
        documents: &[String],
    ) -> impl Future<Output = Result<BulkResponse, StoreError>> + Send;
}
