//! Byte-fetch port (driven/secondary port)
//!
//! The one network primitive the content cache and the request
//! interception layer need: a GET that returns status, content type and body.

use crate::domain::EngineResult;

/// Response of a GET issued through [`IContentFetcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Returns `true` for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests
///
/// Non-2xx statuses are returned as `Ok`; only transport failures map to
/// `EngineError::Network`.
#[async_trait::async_trait]
pub trait IContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> EngineResult<FetchResponse>;
}
