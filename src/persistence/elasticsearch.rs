// Elasticsearch HTTP client implementing the document store capabilities

use super::store::{BulkItemFailure, BulkResponse, DocumentStore, StoreError, StoreInfo};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Connection settings for an Elasticsearch cluster
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub api_key: String,
    pub verify_tls_certs: bool,
    pub timeout: Duration,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            verify_tls_certs: false,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    http: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
struct InfoBody {
    name: String,
    #[serde(default)]
    cluster_name: Option<String>,
    #[serde(default)]
    version: Option<VersionBody>,
}

#[derive(Deserialize)]
struct VersionBody {
    number: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorCause,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorCause {
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        reason: Option<String>,
    },
    Plain(String),
}

#[derive(Deserialize)]
struct BulkBody {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemBody>>,
}

#[derive(Deserialize)]
struct BulkItemBody {
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl ElasticsearchClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, StoreError> {
        let mut base = Url::parse(&config.url).map_err(|source| StoreError::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("ApiKey {}", config.api_key)).map_err(|e| {
            StoreError::InvalidResponse {
                endpoint: base.to_string(),
                reason: format!("API key is not a valid header value: {}", e),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls_certs)
            .timeout(config.timeout)
            .user_agent(concat!("scout-reporting/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Client)?;

        Ok(Self { http, base })
    }

    fn request(&self, method: Method, path: &str) -> Result<(RequestBuilder, String), StoreError> {
        let url = self.base.join(path).map_err(|source| StoreError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            source,
        })?;
        let endpoint = format!("{} {}", method, url.path());
        Ok((self.http.request(method, url), endpoint))
    }

    async fn send(&self, builder: RequestBuilder, endpoint: &str) -> Result<Response, StoreError> {
        debug!("Elasticsearch request {}", endpoint);
        builder.send().await.map_err(|source| StoreError::Connection {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let (builder, endpoint) = self.request(Method::HEAD, path)?;
        let response = self.send(builder, &endpoint).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::Status {
                endpoint,
                status: status.as_u16(),
                reason: "unexpected status for existence check".to_string(),
            }),
        }
    }

    /// Send a request, mapping error statuses; `name` is reported on conflicts
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        name: &str,
    ) -> Result<Response, StoreError> {
        let (mut builder, endpoint) = self.request(method, path)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder, &endpoint).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Err(error_from_body(endpoint, status, &text, name))
    }

    async fn put_json(&self, path: &str, body: &Value, name: &str) -> Result<(), StoreError> {
        self.execute(Method::PUT, path, Some(body), name).await?;
        Ok(())
    }
}

/// Translate an Elasticsearch error response into a store error
fn error_from_body(endpoint: String, status: u16, text: &str, name: &str) -> StoreError {
    let (kind, reason) = match serde_json::from_str::<ErrorBody>(text) {
        Ok(ErrorBody {
            error: ErrorCause::Detailed { kind, reason },
        }) => {
            let reason = reason.unwrap_or_else(|| kind.clone());
            (Some(kind), reason)
        }
        Ok(ErrorBody {
            error: ErrorCause::Plain(reason),
        }) => (None, reason),
        Err(_) => (None, text.to_string()),
    };

    let already_exists = kind
        .as_deref()
        .is_some_and(|k| k == "resource_already_exists_exception")
        || reason.contains("already exists");
    if status == 400 && already_exists {
        return StoreError::AlreadyExists(name.to_string());
    }

    StoreError::Status {
        endpoint,
        status,
        reason,
    }
}

/// Extract per-document failures from a bulk response body
fn parse_bulk_response(endpoint: &str, text: &str) -> Result<BulkResponse, StoreError> {
    let body: BulkBody =
        serde_json::from_str(text).map_err(|e| StoreError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    let failures = body
        .items
        .into_iter()
        .enumerate()
        .filter_map(|(position, mut item)| {
            let (_, result) = item.drain().next()?;
            if result.error.is_none() && result.status < 300 {
                return None;
            }
            let reason = result
                .error
                .map(|e| match e.get("reason").and_then(Value::as_str) {
                    Some(reason) => reason.to_string(),
                    None => e.to_string(),
                })
                .unwrap_or_else(|| format!("status {}", result.status));
            Some(BulkItemFailure {
                position,
                status: result.status,
                reason,
            })
        })
        .collect();

    Ok(BulkResponse { failures })
}

impl DocumentStore for ElasticsearchClient {
    async fn info(&self) -> Result<StoreInfo, StoreError> {
        let response = self.execute(Method::GET, "", None, "cluster").await?;
        let body: InfoBody = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse {
                endpoint: "GET /".to_string(),
                reason: e.to_string(),
            })?;
        Ok(StoreInfo {
            name: body.name,
            cluster_name: body.cluster_name,
            version: body.version.map(|v| v.number),
        })
    }

    async fn exists_component_template(&self, name: &str) -> Result<bool, StoreError> {
        self.exists(&format!("_component_template/{}", name)).await
    }

    async fn put_component_template(&self, name: &str, body: &Value) -> Result<(), StoreError> {
        self.put_json(&format!("_component_template/{}", name), body, name)
            .await
    }

    async fn exists_index_template(&self, name: &str) -> Result<bool, StoreError> {
        self.exists(&format!("_index_template/{}", name)).await
    }

    async fn put_index_template(&self, name: &str, body: &Value) -> Result<(), StoreError> {
        self.put_json(&format!("_index_template/{}", name), body, name)
            .await
    }

    async fn exists_data_stream(&self, name: &str) -> Result<bool, StoreError> {
        self.exists(name).await
    }

    async fn create_data_stream(&self, name: &str) -> Result<(), StoreError> {
        self.execute(Method::PUT, &format!("_data_stream/{}", name), None, name)
            .await?;
        Ok(())
    }

    async fn index(&self, index: &str, document: &Value) -> Result<(), StoreError> {
        self.execute(Method::POST, &format!("{}/_doc", index), Some(document), index)
            .await?;
        Ok(())
    }

    async fn bulk_create(
        &self,
        index: &str,
        documents: &[String],
    ) -> Result<BulkResponse, StoreError> {
        let action = serde_json::json!({ "create": { "_index": index } }).to_string();
        let mut body = String::new();
        for document in documents {
            let _ = writeln!(body, "{}", action);
            let _ = writeln!(body, "{}", document);
        }

        let (builder, endpoint) = self.request(Method::POST, "_bulk")?;
        let builder = builder
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let response = self.send(builder, &endpoint).await?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        if !(200..300).contains(&status) {
            return Err(error_from_body(endpoint, status, &text, index));
        }

        parse_bulk_response(&endpoint, &text)
    }
}
