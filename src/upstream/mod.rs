//! HTTP clients for the two microservices the gateway fronts.
//!
//! Both clients return an [`UpstreamReply`] for any HTTP answer, successful
//! or not, so callers can pass upstream status and error fields through
//! unchanged. Only transport failures and undecodable success bodies become
//! [`Error`]s.

mod auth;
mod documents;

pub use auth::AuthServiceClient;
pub use documents::DocumentsClient;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value, json};

use crate::error::Error;
use crate::types::UploadFile;

/// Longest slice of a non-JSON error body kept in the summarized reply.
const RAW_BODY_PREVIEW: usize = 200;

/// An HTTP answer from an upstream service.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
    /// Full URL the request was sent to.
    pub url: String,
}

impl UpstreamReply {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Canonical reason phrase of the status (e.g. `"Unauthorized"`).
    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// `error` field of the body, falling back to `message`.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.field("error").or_else(|| self.field("message"))
    }

    /// String field of the body.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.body
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Joins a service base URL and an endpoint path.
///
/// A trailing `/` on the base is ignored, and an `/api/v1` prefix present on
/// both sides is kept only once.
pub(crate) fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/api/v1") && endpoint.starts_with("/api/v1/") {
        return format!("{base}{}", &endpoint["/api/v1".len()..]);
    }
    format!("{base}{endpoint}")
}

pub(crate) fn transport(url: &str) -> impl FnOnce(reqwest::Error) -> Error + '_ {
    move |source| Error::Transport {
        url: url.to_owned(),
        source,
    }
}

/// Builds a multipart form carrying `file` under the `file` field.
pub(crate) fn file_form(file: UploadFile) -> Result<Form, reqwest::Error> {
    let mut part = Part::bytes(file.bytes);
    if let Some(name) = file.filename {
        part = part.file_name(name);
    }
    if let Some(mime) = file.content_type {
        part = part.mime_str(&mime)?;
    }
    Ok(Form::new().part("file", part))
}

/// Reads a response body into an [`UpstreamReply`].
///
/// An empty success body becomes `{}`. A non-JSON error body is summarized
/// so it can still be passed through as structured JSON.
pub(crate) async fn read_reply(
    response: reqwest::Response,
    url: String,
) -> Result<UpstreamReply, Error> {
    let status = response.status();
    let text = response.text().await.map_err(transport(&url))?;

    let body = if text.trim().is_empty() {
        if status.is_success() {
            Value::Object(Map::new())
        } else {
            summarize_raw(status, "")
        }
    } else {
        match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(Error::InvalidResponse {
                    url,
                    detail: format!("body is not valid JSON: {e}"),
                });
            }
            Err(_) => summarize_raw(status, &text),
        }
    };

    Ok(UpstreamReply { status, body, url })
}

fn summarize_raw(status: StatusCode, text: &str) -> Value {
    let preview: String = text.chars().take(RAW_BODY_PREVIEW).collect();
    json!({
        "error": "Upstream service unavailable",
        "details": format!(
            "Upstream returned: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        ),
        "status": status.as_u16(),
        "response": preview,
    })
}
