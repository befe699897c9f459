//! Document routes: thin authenticated proxies to the documents service.

use axum::Json;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Path, RawQuery, State};
use serde_json::Value;

use super::authority::TokenAuthority;
use super::error::GatewayError;
use super::extractor::AccessToken;
use super::state::GatewayState;
use crate::types::{DocumentId, PageRequest, UploadFile};
use crate::upstream::UpstreamReply;
use crate::validation;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const FILE_FIELD: &str = "file";

fn forward(reply: UpstreamReply) -> Result<Json<Value>, GatewayError> {
    if reply.is_success() {
        Ok(Json(reply.body))
    } else {
        tracing::debug!(status = %reply.status, url = %reply.url, "Documents service returned an error");
        Err(GatewayError::from_reply(&reply))
    }
}

/// Parse `page`/`limit` from a raw query string, applying defaults.
fn parse_page(query: Option<&str>) -> Result<PageRequest, GatewayError> {
    let mut page = PageRequest::new(DEFAULT_PAGE, DEFAULT_LIMIT);

    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let slot = match key.as_ref() {
            "page" => &mut page.page,
            "limit" => &mut page.limit,
            _ => continue,
        };
        *slot = value
            .trim()
            .parse()
            .map_err(|_| GatewayError::InvalidParams(format!("{key} must be an integer")))?;
    }

    validation::validate_page(page).map_err(|e| GatewayError::InvalidParams(e.0))?;
    Ok(page)
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadFile>, GatewayError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::Validation(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GatewayError::Validation(e.body_text()))?;
        return Ok(Some(UploadFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

pub(super) async fn list<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    AccessToken(access_token): AccessToken,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, GatewayError> {
    let page = parse_page(query.as_deref())?;
    let client = state.documents_client()?;
    forward(client.list(&access_token, page).await?)
}

pub(super) async fn upload<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    AccessToken(access_token): AccessToken,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, GatewayError> {
    let mut multipart = multipart.map_err(|e| GatewayError::Validation(e.body_text()))?;
    let file = read_file_field(&mut multipart)
        .await?
        .ok_or(GatewayError::MissingFile)?;

    let client = state.documents_client()?;
    let size = file.bytes.len();
    let reply = client.upload(&access_token, file).await?;
    if !reply.is_success() {
        tracing::warn!(status = %reply.status, size, "Document upload rejected");
        return Err(GatewayError::from_reply_with_code(&reply, "UPLOAD_ERROR"));
    }

    tracing::info!(size, "Document uploaded");
    Ok(Json(reply.body))
}

pub(super) async fn delete_all<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    AccessToken(access_token): AccessToken,
) -> Result<Json<Value>, GatewayError> {
    let client = state.documents_client()?;
    forward(client.delete_all(&access_token).await?)
}

pub(super) async fn get_one<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    AccessToken(access_token): AccessToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let client = state.documents_client()?;
    forward(client.get(&access_token, &DocumentId(id)).await?)
}

pub(super) async fn delete_one<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    AccessToken(access_token): AccessToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let client = state.documents_client()?;
    forward(client.delete(&access_token, &DocumentId(id)).await?)
}

pub(super) async fn authenticate<T: TokenAuthority>(
    State(state): State<GatewayState<T>>,
    AccessToken(access_token): AccessToken,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let client = state.documents_client()?;
    let reply = client
        .request_authentication(&access_token, &DocumentId(id))
        .await?;
    forward(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_defaults() {
        assert_eq!(parse_page(None).unwrap(), PageRequest::new(1, 10));
        assert_eq!(parse_page(Some("")).unwrap(), PageRequest::new(1, 10));
        assert_eq!(
            parse_page(Some("page=3&limit=50&sort=name")).unwrap(),
            PageRequest::new(3, 50)
        );
    }

    #[test]
    fn test_parse_page_rejects_out_of_range() {
        for query in ["page=0", "limit=0", "limit=51", "page=-2", "page=abc", "limit=1.5"] {
            let err = parse_page(Some(query)).unwrap_err();
            assert_eq!(err.code(), "INVALID_PARAMS", "{query}");
        }
    }
}
