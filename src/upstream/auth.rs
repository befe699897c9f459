use serde_json::{Value, json};
use url::Url;

use super::{UpstreamReply, join_url, read_reply, transport};
use crate::error::Error;
use crate::types::Credentials;

const LOGIN: &str = "/auth/login";
const REGISTER: &str = "/auth/register";
const REFRESH: &str = "/auth/refresh";
const ME: &str = "/auth/me";
const LOGOUT: &str = "/auth/logout";

/// Client for the auth microservice (credentials, token issuance, profile).
#[derive(Debug, Clone)]
pub struct AuthServiceClient {
    base: String,
    http: reqwest::Client,
}

impl AuthServiceClient {
    #[must_use]
    pub fn new(base_url: &Url) -> Self {
        Self {
            base: base_url.as_str().trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse, timeouts or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Full URL of an auth endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        join_url(&self.base, endpoint)
    }

    /// Exchanges credentials for a token grant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on network failure, or
    /// [`Error::InvalidResponse`] if a success body is not JSON.
    pub async fn login(&self, credentials: &Credentials) -> Result<UpstreamReply, Error> {
        self.post_json(LOGIN, None, &json!({
            "email": credentials.email,
            "password": credentials.password,
        }))
        .await
    }

    /// Creates a user. The body is forwarded unchanged.
    ///
    /// # Errors
    ///
    /// See [`login`](Self::login).
    pub async fn register(&self, body: &Value) -> Result<UpstreamReply, Error> {
        self.post_json(REGISTER, None, body).await
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// See [`login`](Self::login).
    pub async fn refresh(&self, refresh_token: &str) -> Result<UpstreamReply, Error> {
        self.post_json(REFRESH, None, &json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Fetches the profile behind an access token.
    ///
    /// # Errors
    ///
    /// See [`login`](Self::login).
    pub async fn me(&self, access_token: &str) -> Result<UpstreamReply, Error> {
        let url = self.url(ME);
        tracing::debug!(url = %url, "auth service GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport(&url))?;

        read_reply(response, url).await
    }

    /// Revokes a session.
    ///
    /// Unlike the other calls, a body that is not JSON (success or not) is
    /// replaced by `{"message": <reason phrase>}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on network failure.
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<UpstreamReply, Error> {
        let (response, url) = self
            .send_post(
                LOGOUT,
                Some(access_token),
                &json!({ "refresh_token": refresh_token.unwrap_or_default() }),
            )
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(transport(&url))?;
        let body = serde_json::from_str::<Value>(&text)
            .unwrap_or_else(|_| json!({ "message": status.canonical_reason().unwrap_or("") }));

        Ok(UpstreamReply { status, body, url })
    }

    async fn post_json(
        &self,
        endpoint: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<UpstreamReply, Error> {
        let (response, url) = self.send_post(endpoint, bearer, body).await?;
        read_reply(response, url).await
    }

    async fn send_post(
        &self,
        endpoint: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<(reqwest::Response, String), Error> {
        let url = self.url(endpoint);
        tracing::debug!(url = %url, "auth service POST");

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport(&url))?;
        Ok((response, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let client = AuthServiceClient::new(&"http://auth.local:8000/".parse().unwrap());
        assert_eq!(client.base_url(), "http://auth.local:8000");
        assert_eq!(client.url(LOGIN), "http://auth.local:8000/auth/login");
        assert_eq!(client.url(REFRESH), "http://auth.local:8000/auth/refresh");
    }

    #[test]
    fn test_base_path_is_kept() {
        let client = AuthServiceClient::new(&"https://gw.example/identity".parse().unwrap());
        assert_eq!(client.url(ME), "https://gw.example/identity/auth/me");
    }
}
