//! Local store port (driven/secondary port)
//!
//! This module defines the interface for the durable store holding three
//! record families: entities (folders and documents), the pending-operation
//! log, and scalar metadata.
//!
//! ## Design Notes
//!
//! - The base operations (`get_all`, `get`, `put`, `delete`,
//!   `query_by_index`) are raw record access and never touch the log.
//! - The `*_offline` operations are what user actions call: each one writes
//!   the record and its log entry in a single transaction.
//! - `mark_synced` is the identifier remap. Implementations must make it
//!   atomic so a reader never observes both the temporary and the
//!   authoritative copy of an entity.

use chrono::{DateTime, Utc};

use crate::domain::{
    Attributes, EngineResult, EntityDraft, EntityId, EntityKind, EntityRecord, IndexQuery,
    PendingOperation, RemoteId, RetainedFile, StorageCounts,
};
use crate::ports::RemoteEntity;

/// Metadata key holding the time of the last successful cycle
pub const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

/// Durable store for entities, pending operations and metadata
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    // --- Entity records ---

    /// All records of a kind
    async fn get_all(&self, kind: EntityKind) -> EngineResult<Vec<EntityRecord>>;

    /// A single record, or `None`
    async fn get(&self, kind: EntityKind, id: &EntityId) -> EngineResult<Option<EntityRecord>>;

    /// Insert or replace a record as-is
    async fn put(&self, record: &EntityRecord) -> EngineResult<()>;

    /// Remove a record without touching the log
    async fn delete(&self, kind: EntityKind, id: &EntityId) -> EngineResult<()>;

    /// Records matching a secondary index
    async fn query_by_index(
        &self,
        kind: EntityKind,
        query: &IndexQuery,
    ) -> EngineResult<Vec<EntityRecord>>;

    // --- Offline mutations ---

    /// Persist authoritative data (`synced = true`) received from a pull
    async fn save_synced(&self, record: &EntityRecord) -> EngineResult<()>;

    /// Persist a locally authored entity and enqueue its `create`
    ///
    /// Assigns a temporary id when the draft has none. Returns the stored record.
    async fn save_offline(
        &self,
        draft: EntityDraft,
        file: Option<RetainedFile>,
    ) -> EngineResult<EntityRecord>;

    /// Merge `patch` into an existing record
    ///
    /// Fails with `NotFound` when the record does not exist. Records created
    /// offline fold the patch into their pending `create`; all others enqueue
    /// an `update`.
    async fn update_offline(
        &self,
        kind: EntityKind,
        id: &EntityId,
        patch: &Attributes,
    ) -> EngineResult<EntityRecord>;

    /// Delete a record (and a folder's documents)
    ///
    /// Enqueues a `delete` unless the record was created offline, in which
    /// case its pending operations are dropped instead.
    async fn delete_offline(&self, kind: EntityKind, id: &EntityId) -> EngineResult<()>;

    /// Replace a temporary id with the authoritative one
    ///
    /// Also rewrites documents and pending operations that reference the
    /// temporary id as their parent, and drops the retained file payload.
    async fn mark_synced(
        &self,
        kind: EntityKind,
        temp_id: &EntityId,
        server_id: &RemoteId,
    ) -> EngineResult<()>;

    /// Record the authority's acceptance of `operation`
    ///
    /// Removes the operation and, for a create, applies the remap to
    /// `created.id` and stores its file URL. Once no other operation targets
    /// the entity it is marked `synced` again. All of it commits together, so
    /// an accepted create is never pushed twice.
    async fn acknowledge_operation(
        &self,
        operation: &PendingOperation,
        created: Option<&RemoteEntity>,
    ) -> EngineResult<()>;

    // --- Pending operations ---

    /// Every queued operation, oldest first
    async fn pending_operations(&self) -> EngineResult<Vec<PendingOperation>>;

    /// Persist attempts / failure state of an operation
    async fn update_operation(&self, operation: &PendingOperation) -> EngineResult<()>;

    /// Remove an acknowledged operation
    async fn remove_operation(&self, seq: i64) -> EngineResult<()>;

    /// Reset every `failed` operation; returns how many were reset
    async fn reset_failed_operations(&self) -> EngineResult<u64>;

    /// Number of queued operations (failed ones included)
    async fn pending_count(&self) -> EngineResult<u64>;

    // --- Metadata ---

    async fn get_metadata(&self, key: &str) -> EngineResult<Option<String>>;

    async fn set_metadata(&self, key: &str, value: &str) -> EngineResult<()>;

    /// Time of the last successful cycle
    async fn last_sync_time(&self) -> EngineResult<Option<DateTime<Utc>>> {
        Ok(self
            .get_metadata(LAST_SYNC_TIME_KEY)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> EngineResult<()> {
        self.set_metadata(LAST_SYNC_TIME_KEY, &at.to_rfc3339()).await
    }

    // --- Housekeeping ---

    async fn storage_counts(&self) -> EngineResult<StorageCounts>;

    /// Drop every record, operation and metadata value
    async fn clear_all(&self) -> EngineResult<()>;
}
