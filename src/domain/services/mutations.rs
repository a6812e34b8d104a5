#[cfg(test)]
#[path = "mutations_test.rs"]
mod tests;

use std::sync::Arc;

use reqwest::Method;
use reqwest::Url;
use serde_json::json;
use serde_json::Value;
use tokio::sync::watch;

use super::MonitorStore;
use super::SessionSignal;
use crate::domain::models::decode;
use crate::domain::models::ApiResponse;
use crate::domain::models::ClientError;
use crate::domain::models::SessionEnd;
use crate::domain::models::SessionState;
use crate::domain::models::TransportBox;

pub const MINIMUM_INTERVAL_SECONDS: u64 = 5;
pub const DEFAULT_INTERVAL_TEXT: &str = "60";
pub const ADD_FALLBACK: &str = "Failed to provision new target.";

/// A monitor definition that passed client side validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorDraft {
    pub url: String,
    pub interval_seconds: u64,
}

impl MonitorDraft {
    pub fn new(url: &str, interval_seconds: u64) -> Result<MonitorDraft, ClientError> {
        let parsed = Url::parse(url)
            .map_err(|err| return ClientError::Validation(format!("'{url}' is not a valid URL: {err}")))?;

        if !parsed.has_host() {
            return Err(ClientError::Validation(format!(
                "'{url}' is not a valid URL: missing host"
            )));
        }

        if interval_seconds < MINIMUM_INTERVAL_SECONDS {
            return Err(ClientError::Validation(format!(
                "interval must be at least {MINIMUM_INTERVAL_SECONDS} seconds"
            )));
        }

        return Ok(MonitorDraft {
            url: url.to_string(),
            interval_seconds,
        });
    }

    /// Validates raw form input. An empty interval falls back to the default.
    pub fn parse(url_text: &str, interval_text: &str) -> Result<MonitorDraft, ClientError> {
        let mut interval_text = interval_text.trim();
        if interval_text.is_empty() {
            interval_text = DEFAULT_INTERVAL_TEXT;
        }

        let interval_seconds = interval_text.parse::<u64>().map_err(|_| {
            return ClientError::Validation(format!(
                "interval must be a whole number of seconds, got '{interval_text}'"
            ));
        })?;

        return MonitorDraft::new(url_text.trim(), interval_seconds);
    }
}

/// Writes against the backend. Nothing is inserted locally, the list only
/// changes through the refresh that follows a confirmed write.
pub struct Mutations {
    transport: TransportBox,
    store: Arc<MonitorStore>,
    signal: Arc<SessionSignal>,
    session: watch::Receiver<SessionState>,
}

impl Mutations {
    pub fn new(
        transport: TransportBox,
        store: Arc<MonitorStore>,
        signal: Arc<SessionSignal>,
        session: watch::Receiver<SessionState>,
    ) -> Mutations {
        return Mutations {
            transport,
            store,
            signal,
            session,
        };
    }

    pub async fn add_monitor(&self, url: &str, interval_seconds: u64) -> Result<String, ClientError> {
        let draft = MonitorDraft::new(url, interval_seconds)?;
        return self.submit(draft).await;
    }

    pub async fn submit(&self, draft: MonitorDraft) -> Result<String, ClientError> {
        let authenticated = self.session.borrow().is_authenticated();
        if !authenticated {
            return Err(ClientError::Unauthenticated);
        }

        let message = match self.post(&draft).await {
            Ok(message) => message,
            Err(err) => {
                if err.is_unauthorized() {
                    self.signal.raise(SessionEnd::Rejected).await;
                }
                tracing::warn!(url = %draft.url, error = %err, "Failed to add monitor");
                return Err(err);
            }
        };

        tracing::info!(url = %draft.url, interval = draft.interval_seconds, "Monitor added");
        if let Err(err) = self.store.refresh().await {
            tracing::debug!(error = %err, "Refresh after add failed");
        }

        return Ok(message);
    }

    async fn post(&self, draft: &MonitorDraft) -> Result<String, ClientError> {
        let value = self
            .transport
            .request(
                Method::POST,
                "/monitor/add",
                Some(json!({ "url": draft.url, "interval": draft.interval_seconds })),
            )
            .await?;

        let res: ApiResponse<Value> = decode(value)?;
        if !res.is_success() {
            return Err(ClientError::Rejected(res.message_or(ADD_FALLBACK)));
        }

        return Ok(res.message_or("Monitor added"));
    }
}
