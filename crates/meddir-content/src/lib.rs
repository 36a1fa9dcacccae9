//! meddir Content - Persistent byte cache
//!
//! Provides:
//! - [`CacheStore`] - bucketed on-disk payload store with a SQLite index
//! - [`ContentCache`] - document payload cache with fetch, priming queue
//!   and size-bounded eviction
//! - [`EvictionPolicy`] - largest-first eviction down to a target share of
//!   the ceiling
//!
//! The request interception layer uses the same [`CacheStore`] for its
//! static and dynamic buckets.

pub mod documents;
pub mod eviction;
pub mod store;

use meddir_core::domain::EngineError;

pub use documents::{ContentCache, PrimingReport};
pub use eviction::{select_victims, EvictionPolicy, EvictionReport};
pub use store::{CacheBucket, CacheStore};

/// Errors raised by the on-disk cache
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// Reading or writing a payload file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache index could not be queried
    #[error("Index error: {0}")]
    Index(String),

    /// Opening or migrating the cache index failed
    #[error("Failed to open cache index: {0}")]
    OpenFailed(String),
}

impl From<sqlx::Error> for ContentError {
    fn from(e: sqlx::Error) -> Self {
        ContentError::Index(e.to_string())
    }
}

impl From<ContentError> for EngineError {
    fn from(e: ContentError) -> Self {
        EngineError::Storage(e.to_string())
    }
}
