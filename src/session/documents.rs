//! Document helpers on [`SessionManager`]; all go through
//! [`fetch_with_refresh`](SessionManager::fetch_with_refresh).

use serde_json::Value;

use super::api::{ApiRequest, DOCUMENTS_PATH, GatewayApi};
use super::error::ClientError;
use super::manager::SessionManager;
use crate::types::{Document, DocumentId, DocumentsPage, PageRequest, UploadFile};
use crate::validation;

fn to_u32(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// The documents service wraps payloads as `{success: true, data: ...}`.
fn envelope_data(body: &Value) -> Option<&Value> {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        body.get("data").filter(|d| !d.is_null())
    } else {
        None
    }
}

/// Normalizes a listing into a [`DocumentsPage`]. Missing or zero
/// pagination fields fall back to the requested page.
fn normalize_page(body: Value, requested: PageRequest) -> Result<DocumentsPage, ClientError> {
    let Some(data) = envelope_data(&body) else {
        return Ok(serde_json::from_value(body)?);
    };

    let pagination = data.get("pagination");
    let number = |key: &str| {
        pagination
            .and_then(|p| p.get(key))
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
    };
    let documents = match data.get("documents") {
        Some(documents) if !documents.is_null() => serde_json::from_value(documents.clone())?,
        _ => Vec::new(),
    };

    Ok(DocumentsPage {
        documents,
        total: number("total_items").unwrap_or(0),
        page: number("page").map_or(to_u32(requested.page), |n| u32::try_from(n).unwrap_or(u32::MAX)),
        limit: number("limit").map_or(to_u32(requested.limit), |n| u32::try_from(n).unwrap_or(u32::MAX)),
        total_pages: number("total_pages").map_or(1, |n| u32::try_from(n).unwrap_or(u32::MAX)),
    })
}

/// Picks the document out of an upload reply.
fn unwrap_document(body: Value) -> Value {
    let inner = match envelope_data(&body) {
        Some(data) => data.clone(),
        None => body,
    };
    match inner.get("document") {
        Some(document) if !document.is_null() => document.clone(),
        _ => inner,
    }
}

fn document_path(id: &DocumentId) -> String {
    format!("{DOCUMENTS_PATH}/{}", urlencoding::encode(&id.0))
}

impl<A: GatewayApi> SessionManager<A> {
    /// Lists one page of the user's documents.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] for out-of-range paging, the gateway's
    /// rejection, or [`ClientError::Decode`] for an unexpected body.
    pub async fn list_documents(&self, page: PageRequest) -> Result<DocumentsPage, ClientError> {
        validation::validate_page(page)?;
        let path = format!("{DOCUMENTS_PATH}?page={}&limit={}", page.page, page.limit);
        let body = self
            .fetch_with_refresh(ApiRequest::get(path))
            .await?
            .into_result()?;
        normalize_page(body, page)
    }

    /// Uploads a file and returns the stored document.
    ///
    /// # Errors
    ///
    /// The gateway's rejection (`UPLOAD_ERROR`, `MISSING_FILE`, ...) or a
    /// decode error.
    pub async fn upload_document(&self, file: UploadFile) -> Result<Document, ClientError> {
        let request = ApiRequest::post(DOCUMENTS_PATH).with_file(file);
        let body = self.fetch_with_refresh(request).await?.into_result()?;
        Ok(serde_json::from_value(unwrap_document(body))?)
    }

    /// # Errors
    ///
    /// The gateway's rejection or a transport error.
    pub async fn delete_document(&self, id: &DocumentId) -> Result<Value, ClientError> {
        self.fetch_with_refresh(ApiRequest::delete(document_path(id)))
            .await?
            .into_result()
    }

    /// # Errors
    ///
    /// The gateway's rejection or a transport error.
    pub async fn delete_all_documents(&self) -> Result<Value, ClientError> {
        self.fetch_with_refresh(ApiRequest::delete(DOCUMENTS_PATH))
            .await?
            .into_result()
    }

    /// Starts the authentication workflow of a document.
    ///
    /// # Errors
    ///
    /// The gateway's rejection or a transport error.
    pub async fn request_authentication(&self, id: &DocumentId) -> Result<Value, ClientError> {
        let path = format!("{}/authenticate", document_path(id));
        self.fetch_with_refresh(ApiRequest::post(path))
            .await?
            .into_result()
    }
}
