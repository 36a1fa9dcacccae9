//! Responses produced by the interception layer

use meddir_core::{domain::CachedContent, ports::FetchResponse};

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Built by the layer because neither network nor cache could answer
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl InterceptResponse {
    pub fn from_network(response: FetchResponse) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type,
            body: response.body,
            source: ResponseSource::Network,
        }
    }

    pub fn from_cache(hit: CachedContent) -> Self {
        Self {
            status: 200,
            content_type: hit.entry.content_type,
            body: hit.bytes,
            source: ResponseSource::Cache,
        }
    }

    /// 503 `{"error":"Offline","offline":true}` for data requests
    pub fn offline_json() -> Self {
        let body = serde_json::json!({ "error": "Offline", "offline": true });
        Self {
            status: 503,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
            source: ResponseSource::Synthetic,
        }
    }

    /// 503 plain-text response
    pub fn offline_text(message: &str) -> Self {
        Self {
            status: 503,
            content_type: Some("text/plain".to_string()),
            body: message.as_bytes().to_vec(),
            source: ResponseSource::Synthetic,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
