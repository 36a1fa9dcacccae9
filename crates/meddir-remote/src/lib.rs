//! meddir Remote - Remote authority HTTP client
//!
//! Provides async client for:
//! - Folder and document listings (`GET /folders.json`, `GET /folders/{id}/documents.json`)
//! - Create, update and delete of folders and documents, including multipart
//!   upload of retained document files
//! - Raw GETs of document payloads and static assets
//!
//! ## Modules
//!
//! - [`client`] - HTTP client bound to the authority's base URL
//! - [`provider`] - `IRemoteAuthority` and `IContentFetcher` adapters

pub mod client;
pub mod provider;

use meddir_core::domain::{DomainError, EngineError};
use thiserror::Error;

pub use client::RemoteClient;
pub use provider::{HttpFetcher, HttpRemoteAuthority};

/// Errors that can occur when talking to the remote authority
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The authority answered with a non-2xx status
    #[error("Request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body (truncated) or reason phrase
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A base or request URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<RemoteError> for EngineError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Rejected { status, message } => {
                EngineError::RemoteRejected { status, message }
            }
            RemoteError::NetworkError(e) => EngineError::Network(e.to_string()),
            RemoteError::InvalidResponse(msg) => EngineError::Corrupt(msg),
            RemoteError::InvalidUrl(msg) => {
                EngineError::Domain(DomainError::ValidationFailed(msg))
            }
        }
    }
}
