#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;

use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_json::Value;

use super::TransportError;

/// Envelope shared by every backend response: `{success, message, data}`.
/// A missing `success` on a 2xx response counts as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        return self.success.unwrap_or(true);
    }

    pub fn message_or(&self, fallback: &str) -> String {
        return self
            .message
            .as_deref()
            .filter(|message| return !message.is_empty())
            .unwrap_or(fallback)
            .to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub envelope: ApiResponse<LoginData>,
    /// The reference backend replies `{message, token}` without an envelope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl LoginResponse {
    pub fn token(&self) -> Option<String> {
        return self
            .envelope
            .data
            .as_ref()
            .and_then(|data| return data.token.clone())
            .filter(|token| return !token.is_empty())
            .or_else(|| {
                return self
                    .token
                    .clone()
                    .filter(|token| return !token.is_empty());
            });
    }
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, TransportError> {
    return serde_json::from_value(value).map_err(TransportError::decode);
}
