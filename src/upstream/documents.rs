use reqwest::Method;
use url::Url;

use super::{UpstreamReply, file_form, join_url, read_reply, transport};
use crate::error::Error;
use crate::types::{DocumentId, PageRequest, UploadFile};

const DOCUMENTS: &str = "/documents";

/// Client for the documents microservice (storage, hashing, authentication).
///
/// Every call is made on behalf of a user and carries their access token.
#[derive(Debug, Clone)]
pub struct DocumentsClient {
    base: String,
    http: reqwest::Client,
}

impl DocumentsClient {
    #[must_use]
    pub fn new(base_url: &Url) -> Self {
        Self {
            base: base_url.as_str().trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Full URL of a documents endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        join_url(&self.base, endpoint)
    }

    /// Endpoint path of a single document.
    #[must_use]
    pub fn document_path(id: &DocumentId) -> String {
        format!("{DOCUMENTS}/{}", urlencoding::encode(&id.0))
    }

    /// Lists one page of the caller's documents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on network failure, or
    /// [`Error::InvalidResponse`] if a success body is not JSON.
    pub async fn list(&self, access_token: &str, page: PageRequest) -> Result<UpstreamReply, Error> {
        let endpoint = format!("{DOCUMENTS}?page={}&limit={}", page.page, page.limit);
        self.send(Method::GET, &endpoint, access_token).await
    }

    /// Uploads a file as multipart field `file`.
    ///
    /// # Errors
    ///
    /// See [`list`](Self::list).
    pub async fn upload(&self, access_token: &str, file: UploadFile) -> Result<UpstreamReply, Error> {
        let url = self.url(DOCUMENTS);
        tracing::debug!(url = %url, filename = ?file.filename, size = file.bytes.len(), "documents upload");

        let form = file_form(file).map_err(transport(&url))?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await
            .map_err(transport(&url))?;

        read_reply(response, url).await
    }

    /// Deletes every document of the caller.
    ///
    /// # Errors
    ///
    /// See [`list`](Self::list).
    pub async fn delete_all(&self, access_token: &str) -> Result<UpstreamReply, Error> {
        let endpoint = format!("{DOCUMENTS}/user/delete-all");
        self.send(Method::DELETE, &endpoint, access_token).await
    }

    /// Fetches a single document.
    ///
    /// # Errors
    ///
    /// See [`list`](Self::list).
    pub async fn get(&self, access_token: &str, id: &DocumentId) -> Result<UpstreamReply, Error> {
        self.send(Method::GET, &Self::document_path(id), access_token)
            .await
    }

    /// Deletes a single document.
    ///
    /// # Errors
    ///
    /// See [`list`](Self::list).
    pub async fn delete(&self, access_token: &str, id: &DocumentId) -> Result<UpstreamReply, Error> {
        self.send(Method::DELETE, &Self::document_path(id), access_token)
            .await
    }

    /// Starts the authentication workflow of a document.
    ///
    /// # Errors
    ///
    /// See [`list`](Self::list).
    pub async fn request_authentication(
        &self,
        access_token: &str,
        id: &DocumentId,
    ) -> Result<UpstreamReply, Error> {
        let endpoint = format!("{}/request-authentication", Self::document_path(id));
        self.send(Method::POST, &endpoint, access_token).await
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
    ) -> Result<UpstreamReply, Error> {
        let url = self.url(endpoint);
        tracing::debug!(method = %method, url = %url, "documents request");

        let response = self
            .http
            .request(method, &url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport(&url))?;

        read_reply(response, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_path_is_encoded() {
        assert_eq!(
            DocumentsClient::document_path(&DocumentId::from("a b/c")),
            "/documents/a%20b%2Fc"
        );
    }

    #[test]
    fn test_versioned_base() {
        let client = DocumentsClient::new(&"http://docs:9000/api/v1/".parse().unwrap());
        assert_eq!(client.url(DOCUMENTS), "http://docs:9000/api/v1/documents");
    }
}
