use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::execution::response::Object;

/// One request to a source schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphRequest {
    #[serde(skip)]
    pub subgraph_name: String,
    #[serde(skip)]
    pub url: Option<Url>,
    /// The GraphQL document.
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub variables: Object,
}

/// Sends requests to source schemas. Implementations own connections and connection pools.
#[async_trait]
pub trait SubgraphTransport: Send + Sync {
    /// Sends `request` and returns the response body, `{"data": .., "errors": [..]}`.
    ///
    /// Implementations should stop work and return [`TransportError::Cancelled`] once
    /// `cancellation` is cancelled.
    async fn send(
        &self,
        request: SubgraphRequest,
        cancellation: CancellationToken,
    ) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP fetch failed from '{subgraph}': {message}")]
    Connection { subgraph: String, message: String },
    #[error("HTTP fetch failed from '{subgraph}': {status}")]
    Status { subgraph: String, status: u16 },
    #[error("service '{subgraph}' response was malformed: {reason}")]
    MalformedResponse { subgraph: String, reason: String },
    #[error("request to service '{subgraph}' timed out after {}", humantime_duration(.timeout))]
    Timeout { subgraph: String, timeout: Duration },
    #[error("request to service '{subgraph}' was cancelled")]
    Cancelled { subgraph: String },
}

impl TransportError {
    /// The `extensions.code` of the GraphQL error reporting this failure.
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Connection { .. } | TransportError::Status { .. } => {
                "SUBREQUEST_HTTP_ERROR"
            }
            TransportError::MalformedResponse { .. } => "SUBREQUEST_MALFORMED_RESPONSE",
            TransportError::Timeout { .. } => "SUBREQUEST_TIMEOUT",
            TransportError::Cancelled { .. } => "SUBREQUEST_CANCELLED",
        }
    }
}

fn humantime_duration(duration: &Duration) -> String {
    humantime_serde::re::humantime::format_duration(*duration).to_string()
}
