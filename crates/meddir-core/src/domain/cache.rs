//! Content cache entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index entry for one cached payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL the payload was fetched from (the cache key)
    pub url: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub inserted_at: DateTime<Utc>,
}

/// A cache hit: index entry plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub entry: CacheEntry,
    pub bytes: Vec<u8>,
}

/// Snapshot returned by `sizeInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSizeInfo {
    pub count: usize,
    pub total_bytes: u64,
    pub entries: Vec<CacheEntry>,
}

impl CacheSizeInfo {
    pub fn from_entries(entries: Vec<CacheEntry>) -> Self {
        Self {
            count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            entries,
        }
    }
}
