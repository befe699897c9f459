use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;
use crate::types::ErrorBody;
use crate::upstream::UpstreamReply;

/// Errors surfaced by gateway handlers.
///
/// Every variant renders as the uniform [`ErrorBody`] with a stable `code`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("no file was provided")]
    MissingFile,

    #[error("no access token")]
    MissingToken,

    #[error("no refresh token")]
    MissingRefreshToken,

    #[error("invalid token")]
    InvalidToken,

    /// The upstream base URL for `service` is not set.
    #[error("{service} service is not configured")]
    NotConfigured { service: &'static str },

    /// The upstream answered with an error status; fields are passed through.
    #[error("{error}")]
    Upstream {
        status: StatusCode,
        error: String,
        code: String,
        details: String,
        url: String,
    },

    /// The upstream could not be reached or did not answer in time.
    #[error("{kind}: {message}")]
    Transport {
        kind: TransportKind,
        message: String,
        url: String,
    },

    #[error("invalid response from upstream service: {detail}")]
    InvalidResponse { detail: String, url: Option<String> },

    #[error("logout failed: {0}")]
    Logout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Transport failure classes, each with its own status and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum TransportKind {
    #[display("service unavailable")]
    Unavailable,
    #[display("timeout")]
    Timeout,
    #[display("network error")]
    Network,
}

impl GatewayError {
    /// Pass-through of an upstream error reply (`API_ERROR` unless the
    /// upstream supplied its own `code`).
    #[must_use]
    pub fn from_reply(reply: &UpstreamReply) -> Self {
        Self::Upstream {
            status: reply.status,
            error: reply.error_message().unwrap_or("Request failed").to_owned(),
            code: reply.field("code").unwrap_or("API_ERROR").to_owned(),
            details: reply.field("details").map_or_else(
                || format!("HTTP {}: {}", reply.status.as_u16(), reply.reason()),
                str::to_owned,
            ),
            url: reply.url.clone(),
        }
    }

    /// Like [`from_reply`](Self::from_reply) but with a fixed `code`.
    #[must_use]
    pub fn from_reply_with_code(reply: &UpstreamReply, code: &str) -> Self {
        match Self::from_reply(reply) {
            Self::Upstream {
                status,
                error,
                details,
                url,
                ..
            } => Self::Upstream {
                status,
                error,
                code: code.to_owned(),
                details,
                url,
            },
            other => other,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidParams(_) | Self::MissingFile => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingToken | Self::MissingRefreshToken | Self::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotConfigured { .. } | Self::Logout(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Upstream { status, .. } => *status,
            Self::Transport { kind, .. } => match kind {
                TransportKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                TransportKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                TransportKind::Network => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidParams(_) => "INVALID_PARAMS",
            Self::MissingFile => "MISSING_FILE",
            Self::MissingToken => "MISSING_TOKEN",
            Self::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NotConfigured { .. } => "SERVICE_NOT_CONFIGURED",
            Self::Upstream { code, .. } => code,
            Self::Transport { kind, .. } => match kind {
                TransportKind::Unavailable => "SERVICE_UNAVAILABLE",
                TransportKind::Timeout => "TIMEOUT_ERROR",
                TransportKind::Network => "NETWORK_ERROR",
            },
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::Logout(_) => "LOGOUT_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The uniform JSON body for this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let status = self.status().as_u16();
        let (details, url) = match self {
            Self::Upstream { details, url, .. } => (Some(details.clone()), Some(url.clone())),
            Self::Transport { url, .. } => (Some(format!("Failed to connect to {url}")), Some(url.clone())),
            Self::InvalidResponse { detail, url } => (Some(detail.clone()), url.clone()),
            _ => (Some(format!("HTTP {status}")), None),
        };

        ErrorBody {
            error: match self {
                Self::InvalidResponse { .. } => "Invalid response from upstream service".to_owned(),
                other => other.to_string(),
            },
            code: self.code().to_owned(),
            details,
            status,
            url,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Transport { .. }
            | Self::InvalidResponse { .. }
            | Self::Logout(_)
            | Self::Internal(_) => {
                tracing::error!(error = %self, code = self.code(), "Gateway upstream failure");
            }
            Self::NotConfigured { service } => {
                tracing::error!(service, "Upstream service not configured");
            }
            _ => {}
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<Error> for GatewayError {
    fn from(e: Error) -> Self {
        match e {
            Error::Transport { url, source } => {
                let kind = if source.is_timeout() {
                    TransportKind::Timeout
                } else if source.is_connect() {
                    TransportKind::Unavailable
                } else {
                    TransportKind::Network
                };
                Self::Transport {
                    kind,
                    message: source.to_string(),
                    url,
                }
            }
            Error::InvalidResponse { url, detail } => Self::InvalidResponse {
                detail,
                url: Some(url),
            },
            Error::Token(_) => Self::InvalidToken,
            Error::Config(msg) => Self::Internal(msg),
        }
    }
}
