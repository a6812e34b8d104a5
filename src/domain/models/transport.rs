use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::TransportError;

/// Every call the core makes is relative to this path on the configured server.
pub const API_BASE_PATH: &str = "/api/v1";

#[async_trait]
pub trait Transport {
    /// Sends one JSON request, attaching the stored bearer token when there is
    /// one. Resolves to the decoded response body of a 2xx response.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError>;
}

pub type TransportBox = Arc<dyn Transport + Send + Sync>;
