#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::CredentialStoreBox;
use crate::domain::models::Transport;
use crate::domain::models::TransportError;
use crate::domain::models::API_BASE_PATH;

/// Pulls a human readable message out of an error body. The monitor routes
/// answer with `message`, the auth routes with `error`.
fn extract_message(text: &str) -> Option<String> {
    let body: Value = serde_json::from_str(text).ok()?;
    return ["message", "error"]
        .iter()
        .filter_map(|key| return body.get(key).and_then(Value::as_str))
        .find(|message| return !message.is_empty())
        .map(|message| return message.to_string());
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    credentials: CredentialStoreBox,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration, credentials: CredentialStoreBox) -> Result<HttpTransport> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        return Ok(HttpTransport {
            client,
            url: url.trim_end_matches('/').to_string(),
            credentials,
        });
    }

    pub fn from_config(credentials: CredentialStoreBox) -> Result<HttpTransport> {
        return HttpTransport::new(
            &Config::get(ConfigKey::ApiURL),
            Config::get_duration(ConfigKey::RequestTimeout)?,
            credentials,
        );
    }

    fn endpoint(&self, path: &str) -> String {
        return format!("{url}{API_BASE_PATH}{path}", url = self.url);
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[allow(clippy::implicit_return)]
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let mut req = self
            .client
            .request(method.clone(), self.endpoint(path))
            .header("Accept", "application/json");

        if let Some(token) = self.credentials.load().await {
            req = req.bearer_auth(token);
        }

        if let Some(body) = body {
            req = req.json(&body);
        }

        let res = req.send().await.map_err(|err| {
            tracing::warn!(method = %method, path, error = ?err, "Request failed without a response");
            return TransportError::network(err);
        })?;

        let status = res.status();
        let text = res.text().await.map_err(TransportError::network)?;

        if !status.is_success() {
            tracing::debug!(method = %method, path, status = status.as_u16(), "Request failed");
            return Err(TransportError::Server {
                status: status.as_u16(),
                message: extract_message(&text),
            });
        }

        tracing::debug!(method = %method, path, status = status.as_u16(), "Request succeeded");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        return serde_json::from_str(&text).map_err(TransportError::decode);
    }
}
