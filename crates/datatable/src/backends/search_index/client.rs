//! Elasticsearch search index.

use std::fmt::Debug;
use std::time::Duration;

use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::Url;
use elasticsearch::http::transport::{SingleNodeConnectionPool, Transport, TransportBuilder};
use elasticsearch::{Elasticsearch, SearchParts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::core::SearchIndex;
use crate::error::{BackendError, DatatableResult};

const BACKEND: &str = "elasticsearch";
const DEFAULT_NODE: &str = "http://localhost:9200";

fn connection_failed(message: String) -> BackendError {
    BackendError::ConnectionFailed {
        backend_name: BACKEND.to_string(),
        message,
    }
}

/// Authentication configuration for Elasticsearch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

impl ElasticsearchAuth {
    fn credentials(&self) -> Credentials {
        match self {
            Self::Basic { username, password } => {
                Credentials::Basic(username.clone(), password.clone())
            }
            Self::Bearer { token } => Credentials::Bearer(token.clone()),
        }
    }
}

/// Configuration for one Elasticsearch index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchIndexConfig {
    /// Node URLs. Requests go to the first one.
    pub nodes: Vec<String>,

    /// Name of the searched index.
    pub index: String,

    /// Request timeout in milliseconds.
    #[serde(default = "ElasticsearchIndexConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,

    /// Suffix of the string projection fields in this index's mapping.
    /// Falls back to the datatable configuration when unset.
    #[serde(default)]
    pub search_field_suffix: Option<String>,
}

impl Default for ElasticsearchIndexConfig {
    fn default() -> Self {
        Self {
            nodes: vec![DEFAULT_NODE.to_string()],
            index: String::new(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
            search_field_suffix: None,
        }
    }
}

impl ElasticsearchIndexConfig {
    fn default_request_timeout_ms() -> u64 {
        30_000
    }

    fn node_url(&self) -> Result<Url, BackendError> {
        let node = self
            .nodes
            .first()
            .ok_or_else(|| connection_failed("No nodes configured".to_string()))?;
        node.parse()
            .map_err(|e| connection_failed(format!("Invalid node URL {:?}: {}", node, e)))
    }

    fn transport(&self) -> Result<Transport, BackendError> {
        let pool = SingleNodeConnectionPool::new(self.node_url()?);
        let mut builder =
            TransportBuilder::new(pool).timeout(Duration::from_millis(self.request_timeout_ms));

        if self.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }
        if let Some(auth) = &self.auth {
            builder = builder.auth(auth.credentials());
        }

        builder
            .build()
            .map_err(|e| connection_failed(format!("Failed to build transport: {}", e)))
    }
}

/// A [`SearchIndex`] backed by one Elasticsearch index.
///
/// Each call blocks on a private current-thread runtime, so the index must
/// not be used from inside another Tokio runtime.
pub struct ElasticsearchIndex {
    client: Elasticsearch,
    runtime: Runtime,
    config: ElasticsearchIndexConfig,
}

impl Debug for ElasticsearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchIndex")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchIndex {
    /// Creates a client for the configured index.
    pub fn new(config: ElasticsearchIndexConfig) -> DatatableResult<Self> {
        let client = Elasticsearch::new(config.transport()?);
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::Internal {
                backend_name: BACKEND.to_string(),
                message: "Failed to start runtime".to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            runtime,
            config,
        })
    }

    /// Returns the index configuration.
    pub fn config(&self) -> &ElasticsearchIndexConfig {
        &self.config
    }

    async fn send(&self, body: &Value) -> DatatableResult<Value> {
        let index = self.config.index.as_str();
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| BackendError::query_failed(BACKEND, format!("Search failed: {}", e)))?;

        if !response.status_code().is_success() {
            let status = response.status_code();
            let text = response.text().await.unwrap_or_default();
            return Err(
                BackendError::query_failed(BACKEND, format!("Search failed ({}): {}", status, text))
                    .into(),
            );
        }

        response.json::<Value>().await.map_err(|e| {
            BackendError::malformed(BACKEND, format!("Failed to parse search response: {}", e))
                .into()
        })
    }
}

impl SearchIndex for ElasticsearchIndex {
    fn search(&self, body: &Value) -> DatatableResult<Value> {
        self.runtime.block_on(self.send(body))
    }

    fn field_name_for_search(&self, field: &str) -> Option<String> {
        self.config
            .search_field_suffix
            .as_ref()
            .map(|suffix| format!("{}{}", field, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: ElasticsearchIndexConfig =
            serde_json::from_str(r#"{"nodes": ["http://es:9200"], "index": "orders"}"#).unwrap();
        assert_eq!(config.request_timeout_ms, 30000);
        assert!(config.auth.is_none());
        assert!(config.search_field_suffix.is_none());
    }

    #[test]
    fn test_invalid_url_is_connection_failure() {
        let config = ElasticsearchIndexConfig {
            nodes: vec!["not a url".to_string()],
            index: "orders".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ElasticsearchIndex::new(config),
            Err(crate::error::DatatableError::Backend(
                BackendError::ConnectionFailed { .. }
            ))
        ));
    }

    #[test]
    fn test_empty_nodes_is_connection_failure() {
        let config = ElasticsearchIndexConfig {
            nodes: Vec::new(),
            index: "orders".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.node_url(),
            Err(BackendError::ConnectionFailed { .. })
        ));
    }

    #[test]
    fn test_search_field_suffix_override() {
        let index = ElasticsearchIndex::new(ElasticsearchIndexConfig {
            index: "orders".to_string(),
            search_field_suffix: Some("_text".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            index.field_name_for_search("created_at").as_deref(),
            Some("created_at_text")
        );
    }
}
