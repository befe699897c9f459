use std::future::Future;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use super::error::ClientError;
use crate::types::UploadFile;
use crate::upstream::{file_form, join_url};

pub(crate) const LOGIN_PATH: &str = "/api/auth/login";
pub(crate) const LOGOUT_PATH: &str = "/api/auth/logout";
pub(crate) const ME_PATH: &str = "/api/auth/me";
pub(crate) const REFRESH_PATH: &str = "/api/auth/refresh";
pub(crate) const REGISTER_PATH: &str = "/api/auth/register";
pub(crate) const DOCUMENTS_PATH: &str = "/api/documents";

/// Body of a gateway request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Sent as multipart field `file`.
    Multipart(UploadFile),
}

/// A request to the session gateway, replayable after a renewal.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path and query, e.g. `/api/documents?page=1&limit=5`.
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: UploadFile) -> Self {
        self.body = RequestBody::Multipart(file);
        self
    }
}

/// A gateway answer. Non-JSON bodies are kept as a JSON string; empty ones as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body on success, [`ClientError::Rejected`] otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] for non-2xx statuses.
    pub fn into_result(self) -> Result<Value, ClientError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ClientError::rejected(&self))
        }
    }
}

/// Transport to the session gateway.
///
/// Implementations own the cookie jar: cookies set by one response are sent
/// with the next request.
pub trait GatewayApi: Send + Sync + 'static {
    /// Sends a request. Only transport failures are errors; any HTTP status
    /// is returned as an [`ApiResponse`].
    fn send(&self, request: ApiRequest)
    -> impl Future<Output = Result<ApiResponse, ClientError>> + Send;
}

/// [`GatewayApi`] over HTTP, with a reqwest cookie store as the cookie jar.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base: String,
    http: reqwest::Client,
}

impl HttpGateway {
    /// Creates a client with its own cookie store.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &Url) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self::with_http_client(base_url, http))
    }

    /// Uses a preconfigured client. It should have a cookie store enabled.
    #[must_use]
    pub fn with_http_client(base_url: &Url, http: reqwest::Client) -> Self {
        Self {
            base: base_url.as_str().trim_end_matches('/').to_owned(),
            http,
        }
    }
}

impl GatewayApi for HttpGateway {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = join_url(&self.base, &request.path);
        tracing::debug!(method = %request.method, url = %url, "gateway request");

        let builder = self.http.request(request.method, &url);
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(file) => builder.multipart(file_form(file)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::post(LOGIN_PATH).with_json(json!({"email": "a@b.co"}));
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/api/auth/login");
        assert_eq!(request.body, RequestBody::Json(json!({"email": "a@b.co"})));

        let file = UploadFile::new("a.pdf", "application/pdf", b"%PDF".to_vec());
        let request = ApiRequest::post(DOCUMENTS_PATH).with_file(file.clone());
        assert_eq!(request.body, RequestBody::Multipart(file));
    }

    #[test]
    fn test_into_result() {
        let ok = ApiResponse {
            status: StatusCode::OK,
            body: json!({"id": 1}),
        };
        assert_eq!(ok.into_result().unwrap(), json!({"id": 1}));

        let err = ApiResponse {
            status: StatusCode::NOT_FOUND,
            body: json!({"error": "Document not found", "code": "API_ERROR"}),
        };
        assert_eq!(err.into_result().unwrap_err().code(), Some("API_ERROR"));
    }
}
