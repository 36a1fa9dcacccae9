//! Domain entities
//!
//! This module contains the core domain types for meddir:
//! - Provenance-tagged identifiers for folders and documents
//! - Entity records as held by the local store
//! - Pending operations (the local mutation log)
//! - Content cache entries and size reports
//! - Sync status snapshots
//! - Domain and engine error types

pub mod cache;
pub mod entity;
pub mod errors;
pub mod ids;
pub mod operation;
pub mod status;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheSizeInfo, CachedContent};
pub use entity::{Attributes, EntityDraft, EntityKind, EntityRecord, IndexQuery, RetainedFile};
pub use errors::{DomainError, EngineError, EngineResult};
pub use ids::{EntityId, IdOrigin, LocalId, RemoteId};
pub use operation::{NewOperation, OperationType, PendingOperation};
pub use status::{StorageCounts, SyncState, SyncStatus};
