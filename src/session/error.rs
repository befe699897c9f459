use reqwest::StatusCode;
use serde_json::Value;

use super::api::ApiResponse;
use crate::validation::ValidationError;

/// Errors returned by [`SessionManager`](super::SessionManager) operations.
///
/// `Clone` so a single renewal outcome can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Local form validation failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The gateway answered with an error status.
    #[error("{message}")]
    Rejected {
        status: StatusCode,
        code: Option<String>,
        message: String,
        body: Value,
    },

    /// The gateway could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// A success body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The renewal task ended without an outcome.
    #[error("renewal aborted: {0}")]
    Aborted(String),
}

impl ClientError {
    /// Builds [`ClientError::Rejected`] from an error response, reading the
    /// gateway's `{error, code}` body.
    #[must_use]
    pub fn rejected(response: &ApiResponse) -> Self {
        let text = |key: &str| {
            response
                .body
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        Self::Rejected {
            status: response.status,
            code: text("code"),
            message: text("error")
                .or_else(|| text("message"))
                .unwrap_or_else(|| format!("HTTP {}", response.status.as_u16())),
            body: response.body.clone(),
        }
    }

    /// Status of a rejected request.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error code reported by the gateway, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
