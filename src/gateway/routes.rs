use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use serde_json::{Value, json};

use super::authority::{LocalAuthority, TokenAuthority, UpstreamAuthority};
use super::config::GatewayConfig;
use super::cookies;
use super::documents;
use super::error::GatewayError;
use super::extractor::AccessToken;
use super::state::GatewayState;
use crate::error::Error;
use crate::types::{Credentials, Profile, TokenGrant};
use crate::upstream::{AuthServiceClient, DocumentsClient};
use crate::validation;

/// Create the gateway router with an explicit token authority.
///
/// # Errors
///
/// Returns [`Error::Config`] if the upstream HTTP client cannot be built.
pub fn gateway_routes<T: TokenAuthority>(config: GatewayConfig, authority: T) -> Result<Router, Error> {
    let http = config.http_client()?;

    let state = GatewayState {
        authority: Arc::new(authority),
        auth: config
            .auth_base_url
            .as_ref()
            .map(|url| Arc::new(AuthServiceClient::new(url).with_http_client(http.clone()))),
        documents: config
            .documents_base_url
            .as_ref()
            .map(|url| Arc::new(DocumentsClient::new(url).with_http_client(http.clone()))),
        cookies: config.cookies,
    };

    let router = Router::new()
        .route("/api/auth/login", post(login::<T>))
        .route("/api/auth/logout", post(logout::<T>))
        .route("/api/auth/me", get(me::<T>))
        .route("/api/auth/refresh", post(refresh::<T>))
        .route("/api/auth/register", post(register::<T>))
        .route(
            "/api/documents",
            get(documents::list::<T>)
                .post(documents::upload::<T>)
                .delete(documents::delete_all::<T>),
        )
        .route(
            "/api/documents/{id}",
            get(documents::get_one::<T>).delete(documents::delete_one::<T>),
        )
        .route(
            "/api/documents/{id}/authenticate",
            post(documents::authenticate::<T>),
        )
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    Ok(router.with_state(state))
}

/// Create the gateway router, picking the token authority from config.
///
/// With `AUTH_BASE_URL` set, tokens are checked by the auth service;
/// otherwise they are verified locally with the shared JWT secret.
///
/// # Errors
///
/// Returns [`Error::Config`] if the upstream HTTP client cannot be built.
pub fn build_router(config: GatewayConfig) -> Result<Router, Error> {
    match config.auth_base_url.clone() {
        Some(url) => {
            let client = AuthServiceClient::new(&url).with_http_client(config.http_client()?);
            tracing::info!(auth_base_url = %url, "Using upstream token authority");
            gateway_routes(config, UpstreamAuthority::new(Arc::new(client)))
        }
        None => {
            tracing::warn!("AUTH_BASE_URL not set; verifying tokens locally with JWT_SECRET");
            let authority = LocalAuthority::new(&config.jwt_secret, config.local_access_ttl);
            gateway_routes(config, authority)
        }
    }
}

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, GatewayError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| GatewayError::Validation(e.body_text()))
}

fn require_fields(body: &Value, fields: &[&str]) -> Result<(), GatewayError> {
    let missing = validation::missing_fields(body, fields);
    if missing.is_empty() {
        return Ok(());
    }
    Err(GatewayError::Validation(format!(
        "Campos requeridos faltantes: {}",
        missing.join(", ")
    )))
}

/// Set `token_type` on an issuance body, keeping every other field.
fn with_token_type(mut body: Value, token_type: &str) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("token_type".into(), token_type.into());
    }
    body
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    jar: CookieJar,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<Value>), GatewayError> {
    let body = json_body(payload)?;
    require_fields(&body, &["email", "password"])?;
    let credentials: Credentials = serde_json::from_value(body)
        .map_err(|_| GatewayError::Validation("email and password must be strings".into()))?;

    let reply = state.auth_client()?.login(&credentials).await?;
    if !reply.is_success() {
        tracing::warn!(status = %reply.status, url = %reply.url, "Login rejected by auth service");
        return Err(GatewayError::from_reply(&reply));
    }

    let grant = TokenGrant::from_json(&reply.body);
    let Some(access_token) = grant.access_token.as_deref() else {
        return Err(GatewayError::InvalidResponse {
            detail: "login reply carries no access token".into(),
            url: Some(reply.url),
        });
    };

    let jar = cookies::store_grant(jar, &grant, access_token, &state.cookies);
    tracing::info!(refresh_cookie = grant.refresh_token.is_some(), "Login successful");

    Ok((
        reply.status,
        jar,
        Json(with_token_type(reply.body, &grant.token_type)),
    ))
}

// ── Refresh ────────────────────────────────────────────────────────

async fn refresh<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), GatewayError> {
    let refresh_token = cookies::get_refresh_token(&jar).ok_or(GatewayError::MissingRefreshToken)?;

    let renewal = state.authority.renew(&refresh_token).await?;
    let mut grant = renewal.grant;
    // Only a rotated refresh token replaces the cookie.
    if grant.refresh_token.as_deref() == Some(refresh_token.as_str()) {
        grant.refresh_token = None;
    }

    let access_token = grant
        .access_token
        .clone()
        .ok_or_else(|| GatewayError::InvalidResponse {
            detail: "renewal carries no access token".into(),
            url: None,
        })?;

    let jar = cookies::store_grant(jar, &grant, &access_token, &state.cookies);
    tracing::debug!(rotated = grant.refresh_token.is_some(), "Access token renewed");

    Ok((jar, Json(renewal.body)))
}

// ── Me ─────────────────────────────────────────────────────────────

async fn me<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    AccessToken(access_token): AccessToken,
) -> Result<Json<Profile>, GatewayError> {
    state.authority.profile(&access_token).await.map(Json)
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<T: TokenAuthority>(State(state): State<GatewayState<T>>, jar: CookieJar) -> Response {
    let outcome = match cookies::get_access_token(&jar) {
        Some(access_token) => {
            let refresh_token = cookies::get_refresh_token(&jar);
            let authority = Arc::clone(&state.authority);
            // Spawned so a panicking revocation still lets the cookies be cleared.
            tokio::spawn(async move {
                authority
                    .revoke(&access_token, refresh_token.as_deref())
                    .await
            })
            .await
            .map_err(|e| GatewayError::Logout(e.to_string()))
        }
        None => Ok(json!({ "message": "logged out" })),
    };

    let jar = cookies::clear_session(jar, &state.cookies);
    match outcome {
        Ok(body) => (jar, Json(body)).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

// ── Register ───────────────────────────────────────────────────────

async fn register<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let body = json_body(payload)?;
    require_fields(&body, &["email", "password", "name", "id_citizen"])?;

    let reply = state.auth_client()?.register(&body).await?;
    if !reply.is_success() {
        tracing::warn!(status = %reply.status, "Registration rejected by auth service");
        return Err(GatewayError::from_reply(&reply));
    }

    tracing::info!("User registered");
    Ok(Json(reply.body))
}
