use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Decodes a JWT payload **without** checking its signature.
///
/// Only used to read display data such as `exp` from tokens the upstream has
/// already accepted. Never use the result for an authorization decision.
///
/// # Errors
///
/// Returns `Error::Token` if the token is not three dot-separated segments or
/// the payload is not base64-encoded JSON.
pub fn decode_payload_unverified(token_str: &str) -> Result<JsonValue, Error> {
    let parts: Vec<&str> = token_str.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    let payload_b64 = parts[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| STANDARD_NO_PAD.decode(payload_b64))
        .map_err(|_| Error::Token("invalid payload encoding".into()))?;

    serde_json::from_slice(&bytes).map_err(|e| Error::Token(format!("invalid payload: {e}")))
}

/// Reads the `exp` claim of an access token as epoch milliseconds.
///
/// Returns `None` for opaque tokens or payloads without a numeric `exp`.
#[must_use]
pub fn decode_exp_millis(token_str: &str) -> Option<i64> {
    let payload = decode_payload_unverified(token_str).ok()?;
    exp_millis(&payload)
}

fn exp_millis(claims: &JsonValue) -> Option<i64> {
    let exp = claims.get("exp")?;
    let secs = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    secs.checked_mul(1000)
}

/// Claims from a token whose HS256 signature and expiry were checked.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    inner: JsonValue,
}

impl VerifiedClaims {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    /// Gets the inner JSON value.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.inner
    }

    #[must_use]
    pub fn into_json(self) -> JsonValue {
        self.inner
    }

    /// `exp` claim in epoch milliseconds.
    #[must_use]
    pub fn exp_millis(&self) -> Option<i64> {
        exp_millis(&self.inner)
    }
}

/// Verifies an HS256 JWT against a shared secret.
///
/// `exp` is required and checked with the default leeway.
///
/// # Errors
///
/// Returns `Error::Token` if the signature, algorithm, or expiry check fails.
#[cfg(feature = "gateway")]
pub fn verify_hs256(secret: &[u8], token_str: &str) -> Result<VerifiedClaims, Error> {
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    let data = decode::<serde_json::Map<String, JsonValue>>(
        token_str,
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| Error::Token(e.to_string()))?;

    Ok(VerifiedClaims {
        inner: JsonValue::Object(data.claims),
    })
}

/// Signs `claims` as an HS256 JWT valid for `ttl`.
///
/// Any `exp`, `iat` or `nbf` already present is replaced.
///
/// # Errors
///
/// Returns `Error::Token` if the claims are not a JSON object or encoding fails.
#[cfg(feature = "gateway")]
pub fn sign_hs256(
    secret: &[u8],
    claims: &JsonValue,
    ttl: std::time::Duration,
) -> Result<String, Error> {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let mut map = claims
        .as_object()
        .cloned()
        .ok_or_else(|| Error::Token("claims must be a JSON object".into()))?;
    map.remove("nbf");

    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
    map.insert("iat".into(), now.into());
    map.insert("exp".into(), now.saturating_add(ttl_secs).into());

    encode(
        &Header::default(),
        &JsonValue::Object(map),
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| Error::Token(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unsigned(payload: &JsonValue) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn test_decode_exp_millis() {
        let token = unsigned(&json!({"sub": "1", "exp": 1_700_000_000}));
        assert_eq!(decode_exp_millis(&token), Some(1_700_000_000_000));
    }

    #[test]
    fn test_decode_exp_missing_or_opaque() {
        assert_eq!(decode_exp_millis(&unsigned(&json!({"sub": "1"}))), None);
        assert_eq!(decode_exp_millis("opaque-token"), None);
        assert_eq!(decode_exp_millis("a.!!!.c"), None);
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let body = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":10}"#);
        let token = format!("{header}.{body}.x");
        assert_eq!(decode_exp_millis(&token), Some(10_000));
    }

    #[cfg(feature = "gateway")]
    #[test]
    fn test_sign_then_verify_keeps_claims() {
        let secret = b"dev-secret";
        let token = sign_hs256(
            secret,
            &json!({"sub": "42", "email": "ana@gov.co", "exp": 1, "iat": 1}),
            std::time::Duration::from_secs(900),
        )
        .unwrap();

        let claims = verify_hs256(secret, &token).unwrap();
        assert_eq!(claims.get_claim("email"), Some(&json!("ana@gov.co")));
        let exp = claims.exp_millis().unwrap();
        let now_ms = time::OffsetDateTime::now_utc().unix_timestamp() * 1000;
        assert!(exp > now_ms && exp <= now_ms + 901_000);
    }

    #[cfg(feature = "gateway")]
    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = sign_hs256(
            b"one",
            &json!({"sub": "42"}),
            std::time::Duration::from_secs(60),
        )
        .unwrap();
        assert!(matches!(verify_hs256(b"two", &token), Err(Error::Token(_))));
    }

    #[cfg(feature = "gateway")]
    #[test]
    fn test_sign_rejects_non_object_claims() {
        let err = sign_hs256(b"k", &json!("x"), std::time::Duration::from_secs(1));
        assert!(matches!(err, Err(Error::Token(_))));
    }
}
