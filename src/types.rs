use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default token type when the issuer omits `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Login form payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Registration form payload, forwarded verbatim to the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub id_citizen: u64,
}

/// Body of `GET /api/auth/me`.
///
/// `exp` is the access token expiry in epoch **milliseconds**, or `None` when
/// the token carries no readable `exp` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user: Value,
    pub exp: Option<i64>,
}

/// Parsed view of a token issuance reply (login or refresh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub token_type: String,
}

impl TokenGrant {
    /// Extracts the grant fields from an issuer body.
    ///
    /// `access_token` falls back to a legacy `token` field. `expires_in` is
    /// accepted as a number or a numeric string and kept only when positive.
    #[must_use]
    pub fn from_json(body: &Value) -> Self {
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        let expires_in = body
            .get("expires_in")
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| secs as i64)
            .filter(|secs| *secs > 0);

        Self {
            access_token: text("access_token").or_else(|| text("token")),
            expires_in,
            refresh_token: text("refresh_token"),
            token_type: text("token_type").unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned()),
        }
    }
}

/// Uniform error body returned by every gateway handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Documents service identifier (opaque string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Document metadata as reported by the documents service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub hash_sha256: String,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub authentication_status: String,
    #[serde(default)]
    pub url: String,
    /// Fields this crate does not model, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of the authenticated user's documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentsPage {
    pub documents: Vec<Document>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

/// A file received from (or sent to) a multipart `file` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            bytes,
        }
    }
}

/// Pagination query for document listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 5 }
    }
}
