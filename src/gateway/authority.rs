use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use super::error::GatewayError;
use crate::token;
use crate::types::{DEFAULT_TOKEN_TYPE, Profile, TokenGrant};
use crate::upstream::AuthServiceClient;

/// Result of a successful renewal.
#[derive(Debug, Clone)]
pub struct Renewal {
    /// Fields the gateway turns into cookies.
    pub grant: TokenGrant,
    /// JSON returned to the browser.
    pub body: Value,
}

/// Issues and validates session tokens.
///
/// The gateway picks one implementation at startup:
/// [`UpstreamAuthority`] delegates to the auth service, [`LocalAuthority`]
/// verifies and re-signs HS256 tokens with a shared secret (development
/// fallback).
pub trait TokenAuthority: Send + Sync + 'static {
    /// Resolves the user behind an access token.
    fn profile(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<Profile, GatewayError>> + Send;

    /// Exchanges a refresh token for a new access token.
    fn renew(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Renewal, GatewayError>> + Send;

    /// Best-effort revocation. Always yields a body for the logout response.
    fn revoke(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> impl Future<Output = Value> + Send;
}

// ── Upstream ───────────────────────────────────────────────────────

/// Delegates token operations to the auth microservice.
#[derive(Debug, Clone)]
pub struct UpstreamAuthority {
    client: Arc<AuthServiceClient>,
}

impl UpstreamAuthority {
    #[must_use]
    pub fn new(client: Arc<AuthServiceClient>) -> Self {
        Self { client }
    }
}

impl TokenAuthority for UpstreamAuthority {
    async fn profile(&self, access_token: &str) -> Result<Profile, GatewayError> {
        let reply = self.client.me(access_token).await?;
        if !reply.is_success() {
            tracing::debug!(status = %reply.status, "Auth service rejected access token");
            return Err(GatewayError::InvalidToken);
        }

        Ok(Profile {
            user: reply.body,
            exp: token::decode_exp_millis(access_token),
        })
    }

    async fn renew(&self, refresh_token: &str) -> Result<Renewal, GatewayError> {
        let reply = self.client.refresh(refresh_token).await?;
        if !reply.is_success() {
            tracing::warn!(status = %reply.status, "Refresh rejected by auth service");
            return Err(GatewayError::from_reply(&reply));
        }

        let grant = TokenGrant::from_json(&reply.body);
        if grant.access_token.is_none() {
            return Err(GatewayError::InvalidResponse {
                detail: "refresh reply carries no access token".into(),
                url: Some(reply.url),
            });
        }

        let mut body = reply.body;
        if let Value::Object(map) = &mut body {
            map.insert("token_type".into(), grant.token_type.clone().into());
        }
        Ok(Renewal { grant, body })
    }

    async fn revoke(&self, access_token: &str, refresh_token: Option<&str>) -> Value {
        match self.client.logout(access_token, refresh_token).await {
            Ok(reply) if reply.body.as_object().is_some_and(|m| !m.is_empty()) => reply.body,
            Ok(reply) => json!({ "message": reply.reason() }),
            Err(e) => {
                tracing::warn!(error = %e, "Upstream logout failed; clearing session locally");
                json!({ "message": "logged out" })
            }
        }
    }
}

// ── Local ──────────────────────────────────────────────────────────

/// Verifies and re-signs HS256 tokens with a shared secret.
///
/// Used when no auth service is configured.
#[derive(Clone)]
pub struct LocalAuthority {
    secret: Vec<u8>,
    access_ttl: Duration,
}

impl std::fmt::Debug for LocalAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAuthority")
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl LocalAuthority {
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, access_ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            access_ttl,
        }
    }
}

impl TokenAuthority for LocalAuthority {
    async fn profile(&self, access_token: &str) -> Result<Profile, GatewayError> {
        let claims = token::verify_hs256(&self.secret, access_token).map_err(|e| {
            tracing::debug!(error = %e, "Local access token verification failed");
            GatewayError::InvalidToken
        })?;

        let exp = claims.exp_millis();
        Ok(Profile {
            user: claims.into_json(),
            exp,
        })
    }

    async fn renew(&self, refresh_token: &str) -> Result<Renewal, GatewayError> {
        let claims = token::verify_hs256(&self.secret, refresh_token).map_err(|e| {
            tracing::debug!(error = %e, "Local refresh token verification failed");
            GatewayError::InvalidToken
        })?;

        let access_token = token::sign_hs256(&self.secret, claims.as_json(), self.access_ttl)?;
        let expires_in = i64::try_from(self.access_ttl.as_secs()).unwrap_or(i64::MAX);

        let body = json!({
            "access_token": access_token,
            "expires_in": expires_in,
            "refresh_token": refresh_token,
            "token_type": DEFAULT_TOKEN_TYPE,
        });

        // The refresh token is not rotated, so its cookie is left as-is.
        let grant = TokenGrant {
            access_token: Some(access_token),
            expires_in: Some(expires_in),
            refresh_token: None,
            token_type: DEFAULT_TOKEN_TYPE.into(),
        };

        Ok(Renewal { grant, body })
    }

    async fn revoke(&self, _access_token: &str, _refresh_token: Option<&str>) -> Value {
        json!({ "message": "logged out" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "dev-secret";

    fn refresh_token() -> String {
        token::sign_hs256(
            SECRET.as_bytes(),
            &json!({"sub": "7", "email": "ana@gov.co", "typ": "refresh"}),
            Duration::from_secs(30 * 24 * 3600),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_local_renew_reissues_same_claims() {
        let authority = LocalAuthority::new(SECRET, Duration::from_secs(900));
        let renewal = authority.renew(&refresh_token()).await.unwrap();

        assert_eq!(renewal.grant.expires_in, Some(900));
        assert!(renewal.grant.refresh_token.is_none());
        assert_eq!(renewal.body["token_type"], "Bearer");

        let access = renewal.grant.access_token.unwrap();
        let profile = authority.profile(&access).await.unwrap();
        assert_eq!(profile.user["email"], "ana@gov.co");
        assert!(profile.exp.is_some());
    }

    #[tokio::test]
    async fn test_local_rejects_foreign_signature() {
        let authority = LocalAuthority::new("other-secret", Duration::from_secs(900));
        assert!(matches!(
            authority.renew(&refresh_token()).await,
            Err(GatewayError::InvalidToken)
        ));
        assert!(matches!(
            authority.profile("not-a-jwt").await,
            Err(GatewayError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_local_revoke_message() {
        let authority = LocalAuthority::new(SECRET, Duration::from_secs(900));
        assert_eq!(
            authority.revoke("a", None).await,
            json!({"message": "logged out"})
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let authority = LocalAuthority::new("hidden-value", Duration::from_secs(1));
        assert!(!format!("{authority:?}").contains("hidden-value"));
    }
}
