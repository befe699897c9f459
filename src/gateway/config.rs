use std::time::Duration;

use url::Url;

use crate::error::Error;

const DEFAULT_JWT_SECRET: &str = "dev-secret";

/// Cookie attributes shared by config and runtime state.
#[derive(Debug, Clone)]
pub(crate) struct CookieSettings {
    pub(crate) secure: bool,
    /// Access cookie max-age when the issuer sends no usable `expires_in`.
    pub(crate) access_fallback_ttl: time::Duration,
    pub(crate) refresh_ttl: time::Duration,
}

impl CookieSettings {
    fn defaults() -> Self {
        Self {
            secure: false,
            access_fallback_ttl: time::Duration::days(7),
            refresh_ttl: time::Duration::days(30),
        }
    }
}

/// Gateway configuration.
///
/// Use [`from_env()`](GatewayConfig::from_env) for convention-based setup,
/// or [`new()`](GatewayConfig::new) with `with_*` methods for full control.
/// Without an auth service URL the gateway verifies tokens locally with the
/// shared JWT secret.
#[derive(Clone)]
pub struct GatewayConfig {
    pub(super) auth_base_url: Option<Url>,
    pub(super) documents_base_url: Option<Url>,
    pub(super) jwt_secret: String,
    pub(super) local_access_ttl: Duration,
    pub(super) upstream_timeout: Duration,
    pub(super) max_upload_bytes: usize,
    pub(super) port: u16,
    pub(super) cookies: CookieSettings,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("auth_base_url", &self.auth_base_url.as_ref().map(Url::as_str))
            .field(
                "documents_base_url",
                &self.documents_base_url.as_ref().map(Url::as_str),
            )
            .field("jwt_secret", &"<redacted>")
            .field("local_access_ttl", &self.local_access_ttl)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("port", &self.port)
            .field("secure_cookies", &self.cookies.secure)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayConfig {
    /// Config with no upstream services and development defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            auth_base_url: None,
            documents_base_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.into(),
            local_access_ttl: Duration::from_secs(15 * 60),
            upstream_timeout: Duration::from_secs(30),
            max_upload_bytes: 10 * 1024 * 1024,
            port: 3000,
            cookies: CookieSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Env vars (all optional)
    /// - `AUTH_BASE_URL`: auth service base URL; unset or empty selects local token verification
    /// - `DOCUMENTS_BASE_URL`: documents service base URL
    /// - `JWT_SECRET`: HS256 secret for local verification (default `dev-secret`)
    /// - `NODE_ENV`: `production` marks cookies `Secure`
    /// - `PORT`: listen port (default 3000)
    /// - `UPSTREAM_TIMEOUT_SECS`: per-request upstream timeout (default 30)
    /// - `MAX_UPLOAD_BYTES`: request body cap (default 10 MiB)
    /// - `LOCAL_ACCESS_TTL_SECS`: lifetime of locally re-signed access tokens (default 900)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a URL or number is malformed.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::new();

        if let Some(url) = env_url("AUTH_BASE_URL")? {
            config = config.with_auth_base_url(url);
        }
        if let Some(url) = env_url("DOCUMENTS_BASE_URL")? {
            config = config.with_documents_base_url(url);
        }
        if let Some(secret) = env_non_empty("JWT_SECRET") {
            config = config.with_jwt_secret(secret);
        }

        let production = env_non_empty("NODE_ENV").is_some_and(|v| v == "production");
        config = config.with_secure_cookies(production);

        if let Some(port) = env_number::<u16>("PORT")? {
            config = config.with_port(port);
        }
        if let Some(secs) = env_number::<u64>("UPSTREAM_TIMEOUT_SECS")? {
            config = config.with_upstream_timeout(Duration::from_secs(secs));
        }
        if let Some(bytes) = env_number::<usize>("MAX_UPLOAD_BYTES")? {
            config = config.with_max_upload_bytes(bytes);
        }
        if let Some(secs) = env_number::<u64>("LOCAL_ACCESS_TTL_SECS")? {
            config = config.with_local_access_ttl(Duration::from_secs(secs));
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_auth_base_url(mut self, url: Url) -> Self {
        self.auth_base_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_documents_base_url(mut self, url: Url) -> Self {
        self.documents_base_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.cookies.secure = secure;
        self
    }

    #[must_use]
    pub fn with_local_access_ttl(mut self, ttl: Duration) -> Self {
        self.local_access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn auth_base_url(&self) -> Option<&Url> {
        self.auth_base_url.as_ref()
    }

    #[must_use]
    pub fn documents_base_url(&self) -> Option<&Url> {
        self.documents_base_url.as_ref()
    }

    /// HTTP client shared by the upstream clients.
    pub(super) fn http_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.upstream_timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_url(key: &str) -> Result<Option<Url>, Error> {
    env_non_empty(key)
        .map(|raw| {
            raw.parse::<Url>()
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        })
        .transpose()
}

fn env_number<T>(key: &str) -> Result<Option<T>, Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_non_empty(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::new();
        assert!(config.auth_base_url().is_none());
        assert!(config.documents_base_url().is_none());
        assert_eq!(config.jwt_secret, "dev-secret");
        assert_eq!(config.port(), 3000);
        assert!(!config.cookies.secure);
        assert_eq!(config.cookies.refresh_ttl, time::Duration::days(30));
        assert_eq!(config.cookies.access_fallback_ttl, time::Duration::days(7));
    }

    #[test]
    fn test_builder_overrides() {
        let config = GatewayConfig::new()
            .with_auth_base_url("http://auth:8000".parse().unwrap())
            .with_jwt_secret("s3cret")
            .with_secure_cookies(true)
            .with_port(8080);

        assert_eq!(config.auth_base_url().unwrap().as_str(), "http://auth:8000/");
        assert!(config.cookies.secure);
        assert_eq!(config.port(), 8080);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = GatewayConfig::new().with_jwt_secret("super-secret-value");
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret-value"));
        assert!(printed.contains("<redacted>"));
    }
}
