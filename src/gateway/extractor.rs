use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use super::cookies;
use super::error::GatewayError;

/// Access token read from the session cookie.
///
/// Use as an Axum extractor in route handlers. Rejects with
/// `401 MISSING_TOKEN` when the cookie is absent or empty. The token is not
/// validated here; the upstream (or the local authority) does that.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(AccessToken(token): AccessToken) -> impl IntoResponse {
///     // forward `token` as a Bearer credential
/// }
/// ```
#[derive(Clone)]
pub struct AccessToken(pub String);

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AccessToken {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        cookies::get_access_token(&jar)
            .map(Self)
            .ok_or(GatewayError::MissingToken)
    }
}
