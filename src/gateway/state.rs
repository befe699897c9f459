use std::sync::Arc;

use super::config::CookieSettings;
use super::error::GatewayError;
use crate::upstream::{AuthServiceClient, DocumentsClient};

/// Shared state for gateway route handlers.
pub(super) struct GatewayState<T> {
    pub(super) authority: Arc<T>,
    pub(super) auth: Option<Arc<AuthServiceClient>>,
    pub(super) documents: Option<Arc<DocumentsClient>>,
    pub(super) cookies: CookieSettings,
}

// Manual Clone: avoid derive adding a `T: Clone` bound.
impl<T> Clone for GatewayState<T> {
    fn clone(&self) -> Self {
        Self {
            authority: self.authority.clone(),
            auth: self.auth.clone(),
            documents: self.documents.clone(),
            cookies: self.cookies.clone(),
        }
    }
}

impl<T> GatewayState<T> {
    pub(super) fn auth_client(&self) -> Result<&AuthServiceClient, GatewayError> {
        self.auth
            .as_deref()
            .ok_or(GatewayError::NotConfigured { service: "auth" })
    }

    pub(super) fn documents_client(&self) -> Result<&DocumentsClient, GatewayError> {
        self.documents
            .as_deref()
            .ok_or(GatewayError::NotConfigured { service: "documents" })
    }
}
