#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use thiserror::Error;

use super::SessionState;

/// Failures surfaced by a `Transport`. The transport never reacts to them
/// itself, it only classifies what came back from the network.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No response was received: DNS, connection refused, timeout.
    #[error("network error: {message}")]
    Network { message: String },

    /// A response arrived with a failure status code.
    #[error("server responded with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    /// A successful response whose body could not be read as JSON.
    #[error("invalid response body: {message}")]
    Decode { message: String },
}

impl TransportError {
    pub fn network(err: impl ToString) -> TransportError {
        return TransportError::Network {
            message: err.to_string(),
        };
    }

    pub fn decode(err: impl ToString) -> TransportError {
        return TransportError::Decode {
            message: err.to_string(),
        };
    }

    /// Authorization-class failures invalidate the session.
    pub fn is_unauthorized(&self) -> bool {
        return matches!(
            self,
            TransportError::Server {
                status: 401 | 403,
                ..
            }
        );
    }

    /// Human readable message extracted from the response body, if any.
    pub fn message(&self) -> Option<&str> {
        if let TransportError::Server {
            message: Some(message),
            ..
        } = self
        {
            return Some(message);
        }

        return None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Detected client side, never sent.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered successfully but declined the request in its
    /// envelope (`success: false`), or omitted a required field.
    #[error("{0}")]
    Rejected(String),

    #[error("not allowed while the session is {0}")]
    InvalidSession(SessionState),

    #[error("you are not logged in")]
    Unauthenticated,

    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        if let ClientError::Transport(err) = self {
            return err.is_unauthorized();
        }

        return false;
    }

    /// The message Presentation should show for this error. Backend messages
    /// are surfaced verbatim, everything the backend did not explain falls back
    /// to `fallback`.
    pub fn reason(&self, fallback: &str) -> String {
        return match self {
            ClientError::Transport(err) => err
                .message()
                .filter(|message| return !message.is_empty())
                .unwrap_or(fallback)
                .to_string(),
            ClientError::Validation(message) | ClientError::Rejected(message) => {
                message.to_string()
            }
            ClientError::InvalidSession(_)
            | ClientError::Unauthenticated
            | ClientError::Storage(_) => self.to_string(),
        };
    }
}
