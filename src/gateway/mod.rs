//! Session gateway for Axum.
//!
//! Translates cookie-bearing browser requests into bearer calls to the auth
//! and documents services, and upstream replies into `Set-Cookie` headers and
//! a uniform JSON error body.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use carpeta_gateway::gateway::{GatewayConfig, build_router};
//!
//! // 1. Configure from environment (AUTH_BASE_URL, DOCUMENTS_BASE_URL, ...)
//! let config = GatewayConfig::from_env()?;
//!
//! // 2. Build the router; the token authority follows AUTH_BASE_URL
//! let app = build_router(config)?;
//!
//! // 3. Serve
//! axum::serve(listener, app).await?;
//! ```
//!
//! Use [`gateway_routes`] to supply your own [`TokenAuthority`].

mod authority;
mod config;
mod cookies;
mod documents;
mod error;
mod extractor;
mod routes;
mod state;


pub use authority::{LocalAuthority, Renewal, TokenAuthority, UpstreamAuthority};
pub use config::GatewayConfig;
pub use error::{GatewayError, TransportKind};
pub use extractor::AccessToken;
pub use routes::{build_router, gateway_routes};

/// Cookie names shared with browser-side code.
pub use cookies::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
