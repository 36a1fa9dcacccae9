//! Remote authority HTTP client
//!
//! Provides a typed HTTP client for the folder/document JSON API.
//! Handles the optional authentication header, root-key wrapping of request
//! bodies, JSON deserialization and endpoint construction.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meddir_remote::client::RemoteClient;
//!
//! # async fn example() -> Result<(), meddir_remote::RemoteError> {
//! let client = RemoteClient::with_base_url("http://localhost:3000", None);
//! let listing = client.list_folders().await?;
//! println!("{} folders", listing.folders.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use meddir_core::{
    config::RemoteConfig,
    domain::{Attributes, RemoteId, RetainedFile},
    ports::{DocumentListing, FetchResponse, FolderListing, RemoteEntity},
};
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::RemoteError;

/// Longest response body quoted in a rejection message
const MAX_ERROR_BODY: usize = 200;

// ============================================================================
// RemoteClient
// ============================================================================

/// HTTP client for the remote authority
///
/// Wraps `reqwest::Client` with the base URL and the optional
/// authentication header sent on every request.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    /// The underlying HTTP client
    client: Client,
    /// Origin of the authority, without trailing slash
    base_url: String,
    /// Header name and token
    auth: Option<(String, String)>,
}

impl RemoteClient {
    /// Creates a client from configuration
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        Url::parse(&config.base_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let auth = match (&config.auth_header, &config.auth_token) {
            (Some(header), Some(token)) => Some((header.clone(), token.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Creates a client with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `base_url` - Origin of the authority
    /// * `auth` - Optional `(header name, token)` pair
    pub fn with_base_url(base_url: impl Into<String>, auth: Option<(String, String)>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an endpoint URL from path segments under the base URL
    ///
    /// Each segment is percent-encoded, so an id containing `/`, `?` or `#`
    /// stays a single segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Creates a request builder for the given method and path segments
    ///
    /// Adds the `Accept` and authentication headers.
    pub fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, RemoteError> {
        let url = self.endpoint(segments)?;
        Ok(self
            .authorize(self.client.request(method, url))
            .header(ACCEPT, "application/json"))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((header, token)) => builder.header(header.as_str(), token.as_str()),
            None => builder,
        }
    }

    /// Resolves a possibly relative URL (e.g. a `fileUrl`) against the base URL
    pub fn resolve(&self, url: &str) -> Result<Url, RemoteError> {
        let base = Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        base.join(url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", url, e)))
    }

    /// Returns `true` when `url` shares the authority's origin
    pub fn is_same_origin(&self, url: &Url) -> bool {
        self.resolve("/")
            .map(|base| base.origin() == url.origin())
            .unwrap_or(false)
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// `GET /folders.json`
    pub async fn list_folders(&self) -> Result<FolderListing, RemoteError> {
        debug!("Fetching folder listing");
        let response = self.request(Method::GET, &["folders.json"])?.send().await?;
        let listing: FolderListing = parse_json(ensure_success(response).await?).await?;
        debug!(count = listing.folders.len(), "Fetched folder listing");
        Ok(listing)
    }

    /// `GET /folders/{id}/documents.json`
    pub async fn list_documents(&self, folder_id: &RemoteId) -> Result<DocumentListing, RemoteError> {
        debug!(folder_id = %folder_id, "Fetching document listing");
        let response = self
            .request(Method::GET, &["folders", folder_id.as_str(), "documents.json"])?
            .send()
            .await?;
        let listing: DocumentListing = parse_json(ensure_success(response).await?).await?;
        debug!(
            folder_id = %folder_id,
            count = listing.documents.len(),
            "Fetched document listing"
        );
        Ok(listing)
    }

    // ========================================================================
    // Folders
    // ========================================================================

    /// `POST /folders.json` with `{"folder": payload}`
    pub async fn create_folder(&self, payload: &Attributes) -> Result<RemoteEntity, RemoteError> {
        let response = self
            .request(Method::POST, &["folders.json"])?
            .json(&json!({ "folder": payload }))
            .send()
            .await?;
        let created: RemoteEntity = parse_json(ensure_success(response).await?).await?;
        info!(id = %created.id, "Created folder");
        Ok(created)
    }

    /// `PATCH /folders/{id}.json` with `{"folder": payload}`
    pub async fn update_folder(&self, id: &RemoteId, payload: &Attributes) -> Result<(), RemoteError> {
        let resource = format!("{}.json", id);
        let response = self
            .request(Method::PATCH, &["folders", &resource])?
            .json(&json!({ "folder": payload }))
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(id = %id, "Updated folder");
        Ok(())
    }

    /// `DELETE /folders/{id}.json`; a 404 counts as success
    pub async fn delete_folder(&self, id: &RemoteId) -> Result<(), RemoteError> {
        let resource = format!("{}.json", id);
        let response = self
            .request(Method::DELETE, &["folders", &resource])?
            .send()
            .await?;
        ensure_deleted(response).await
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// `POST /folders/{folder_id}/documents.json`
    ///
    /// Sends multipart form data (`document[<attr>]` plus `document[file]`)
    /// when a file is given, otherwise `{"document": payload}`.
    pub async fn create_document(
        &self,
        folder_id: &RemoteId,
        payload: &Attributes,
        file: Option<&RetainedFile>,
    ) -> Result<RemoteEntity, RemoteError> {
        let builder =
            self.request(Method::POST, &["folders", folder_id.as_str(), "documents.json"])?;

        let builder = match file {
            Some(file) => {
                debug!(
                    folder_id = %folder_id,
                    file_name = %file.file_name,
                    size = file.size(),
                    "Uploading document with file"
                );
                builder.multipart(document_form(payload, file)?)
            }
            None => builder.json(&json!({ "document": payload })),
        };

        let response = builder.send().await?;
        let created: RemoteEntity = parse_json(ensure_success(response).await?).await?;
        info!(folder_id = %folder_id, id = %created.id, "Created document");
        Ok(created)
    }

    /// `PATCH /folders/{folder_id}/documents/{id}.json` with `{"document": payload}`
    pub async fn update_document(
        &self,
        folder_id: &RemoteId,
        id: &RemoteId,
        payload: &Attributes,
    ) -> Result<(), RemoteError> {
        let resource = format!("{}.json", id);
        let response = self
            .request(Method::PATCH, &["folders", folder_id.as_str(), "documents", &resource])?
            .json(&json!({ "document": payload }))
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(folder_id = %folder_id, id = %id, "Updated document");
        Ok(())
    }

    /// `DELETE /folders/{folder_id}/documents/{id}.json`; a 404 counts as success
    pub async fn delete_document(&self, folder_id: &RemoteId, id: &RemoteId) -> Result<(), RemoteError> {
        let resource = format!("{}.json", id);
        let response = self
            .request(Method::DELETE, &["folders", folder_id.as_str(), "documents", &resource])?
            .send()
            .await?;
        ensure_deleted(response).await
    }

    // ========================================================================
    // Raw fetch
    // ========================================================================

    /// GETs `url` (relative or absolute) and returns status, content type and body
    ///
    /// Non-2xx statuses are returned, not raised. The authentication header
    /// is only sent to the authority's own origin.
    pub async fn get_bytes(&self, url: &str) -> Result<FetchResponse, RemoteError> {
        let target = self.resolve(url)?;
        let builder = self.client.get(target.clone());
        let builder = if self.is_same_origin(&target) {
            self.authorize(builder)
        } else {
            builder
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(url = %target, status, bytes = body.len(), "Fetched payload");
        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

// ============================================================================
// Response handling
// ============================================================================

async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY).collect()
    };

    warn!(status = status.as_u16(), %message, "Remote authority rejected request");
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn ensure_deleted(response: Response) -> Result<(), RemoteError> {
    let path = response.url().path().to_string();
    if response.status() == StatusCode::NOT_FOUND {
        debug!(%path, "Already deleted on the remote authority");
        return Ok(());
    }
    ensure_success(response).await?;
    debug!(%path, "Deleted");
    Ok(())
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

/// Multipart body for a document create with file
fn document_form(payload: &Attributes, file: &RetainedFile) -> Result<Form, RemoteError> {
    let mut form = Form::new();
    for (key, value) in payload {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        form = form.text(format!("document[{}]", key), text);
    }

    let part = Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.content_type)?;
    Ok(form.part("document[file]", part))
}
