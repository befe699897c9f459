#![doc = include_str!("../README.md")]

pub mod error;
#[cfg(feature = "gateway")]
pub mod gateway;
#[cfg(feature = "session")]
pub mod session;
pub mod token;
pub mod types;
pub mod upstream;
pub mod validation;

// Re-exports for convenient access
pub use error::Error;
#[cfg(feature = "gateway")]
pub use gateway::{GatewayConfig, GatewayError, TokenAuthority, build_router, gateway_routes};
#[cfg(feature = "session")]
pub use session::{ClientError, HttpGateway, RenewalPolicy, SessionManager, SessionState};
pub use token::{VerifiedClaims, decode_exp_millis, decode_payload_unverified};
pub use types::{
    Credentials, Document, DocumentId, DocumentsPage, ErrorBody, PageRequest, Profile,
    Registration, TokenGrant, UploadFile,
};
pub use upstream::{AuthServiceClient, DocumentsClient, UpstreamReply};
