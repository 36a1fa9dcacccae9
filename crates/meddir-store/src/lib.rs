//! meddir Store - Local durable store
//!
//! SQLite-based persistence for:
//! - Folder and document records (with provenance-tagged ids)
//! - The pending-operation log
//! - Scalar metadata such as the last successful sync time
//!
//! ## Architecture
//!
//! This crate implements the `ILocalStore` port from `meddir-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteLocalStore`] - Full `ILocalStore` implementation
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use meddir_store::SqliteLocalStore;
//!
//! # async fn example() -> Result<(), meddir_store::StoreError> {
//! let store = SqliteLocalStore::open(Path::new("/home/user/.local/share/meddir/meddir.db")).await?;
//! // Use store as ILocalStore...
//! store.close().await;
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

use meddir_core::domain::{EngineError, EntityKind};

pub use pool::DatabasePool;
pub use repository::SqliteLocalStore;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded into domain types
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The record addressed by an offline mutation does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The caller supplied an invalid record
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => EngineError::NotFound { kind, id },
            StoreError::SerializationError(msg) => EngineError::Corrupt(msg),
            StoreError::InvalidRecord(msg) => EngineError::Domain(
                meddir_core::domain::DomainError::ValidationFailed(msg),
            ),
            other => EngineError::Storage(other.to_string()),
        }
    }
}
