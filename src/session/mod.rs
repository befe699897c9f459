//! Client-side session keeper for the gateway.
//!
//! [`SessionManager`] plays the browser's role: it logs in through the
//! gateway, keeps the access token alive with a renewal timer, and retries a
//! request once after a `401` when a renewal succeeds. The gateway's cookies
//! live in the [`GatewayApi`] implementation ([`HttpGateway`] uses a reqwest
//! cookie store).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use carpeta_gateway::session::{HttpGateway, SessionManager, SessionState};
//!
//! let session = SessionManager::new(HttpGateway::new(&"http://localhost:3000".parse()?)?);
//! let mut states = session.subscribe();
//!
//! session.init().await;
//! session.login(&Credentials::new("ana@gov.co", "correcta123")).await?;
//!
//! while states.changed().await.is_ok() {
//!     if *states.borrow() == SessionState::Unauthenticated {
//!         break; // back to the login form
//!     }
//! }
//! ```

mod api;
mod documents;
mod error;
pub mod friendly;
mod manager;
mod policy;

pub use api::{ApiRequest, ApiResponse, GatewayApi, HttpGateway, RequestBody};
pub use error::ClientError;
pub use manager::{SessionManager, SessionState};
pub use policy::{RenewalPlan, RenewalPolicy, plan_renewal};
