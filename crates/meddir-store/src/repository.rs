//! SQLite implementation of ILocalStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! local store port defined in meddir-core. It handles domain type
//! serialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type      | SQL Type      | Strategy                                   |
//! |------------------|---------------|--------------------------------------------|
//! | EntityId         | TEXT, TEXT    | `(origin, value)` column pair              |
//! | EntityKind       | TEXT          | `as_str()` / `FromStr`                     |
//! | OperationType    | TEXT          | `as_str()` / `FromStr`                     |
//! | Attributes       | TEXT          | serde_json object                          |
//! | RetainedFile     | TEXT, TEXT, BLOB | name, content type and bytes columns    |
//! | DateTime<Utc>    | TEXT          | RFC 3339, microseconds, `Z` suffix         |
//!
//! Every multi-row mutation (`save_offline`, `update_offline`,
//! `delete_offline`, `mark_synced`, `acknowledge_operation`, `clear_all`)
//! runs in one transaction.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, trace, warn};

use meddir_core::domain::{
    Attributes, EngineResult, EntityDraft, EntityId, EntityKind, EntityRecord, IdOrigin,
    IndexQuery, NewOperation, OperationType, PendingOperation, RemoteId, RetainedFile,
    StorageCounts,
};
use meddir_core::ports::{ILocalStore, RemoteEntity};

use crate::{DatabasePool, StoreError};

/// SQLite-based implementation of the local store port
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Creates a store on top of an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating and migrating if needed) the database at `path`
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let db = DatabasePool::new(path).await?;
        Ok(Self::new(db.pool().clone()))
    }

    /// Opens a fresh in-memory store
    pub async fn in_memory() -> Result<Self, StoreError> {
        let db = DatabasePool::in_memory().await?;
        Ok(Self::new(db.pool().clone()))
    }

    /// Closes every pooled connection; further calls fail
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Local store closed");
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

const ENTITY_COLUMNS: &str = "kind, id_origin, id, parent_origin, parent_id, attributes, \
     file_url, file_name, file_type, file_blob, synced, created_offline, cached_at, updated_at";

const OPERATION_COLUMNS: &str = "seq, op_type, entity_kind, entity_origin, entity_id, \
     parent_origin, parent_id, payload, has_file, created_at, attempts, failed, error, \
     last_attempt_at";

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a DateTime<Utc> from an RFC 3339 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn corrupt(e: impl std::fmt::Display) -> StoreError {
    StoreError::SerializationError(e.to_string())
}

fn encode_attributes(attributes: &Attributes) -> Result<String, StoreError> {
    serde_json::to_string(attributes).map_err(corrupt)
}

fn decode_attributes(raw: &str) -> Result<Attributes, StoreError> {
    serde_json::from_str(raw).map_err(corrupt)
}

/// Rebuild an optional id from a nullable `(origin, value)` column pair
fn optional_id(
    origin: Option<String>,
    value: Option<String>,
) -> Result<Option<EntityId>, StoreError> {
    match (origin, value) {
        (Some(origin), Some(value)) => EntityId::from_parts(&origin, &value)
            .map(Some)
            .map_err(corrupt),
        _ => Ok(None),
    }
}

fn row_to_record(row: &SqliteRow) -> Result<EntityRecord, StoreError> {
    let kind: String = row.get("kind");
    let id_origin: String = row.get("id_origin");
    let id: String = row.get("id");
    let attributes: String = row.get("attributes");
    let cached_at: String = row.get("cached_at");

    let file = row
        .get::<Option<Vec<u8>>, _>("file_blob")
        .map(|bytes| RetainedFile {
            file_name: row
                .get::<Option<String>, _>("file_name")
                .unwrap_or_default(),
            content_type: row
                .get::<Option<String>, _>("file_type")
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes,
        });

    Ok(EntityRecord {
        kind: kind.parse().map_err(corrupt)?,
        id: EntityId::from_parts(&id_origin, &id).map_err(corrupt)?,
        parent_folder_id: optional_id(row.get("parent_origin"), row.get("parent_id"))?,
        attributes: decode_attributes(&attributes)?,
        file_url: row.get("file_url"),
        file,
        synced: row.get("synced"),
        created_offline: row.get("created_offline"),
        cached_at: parse_datetime(&cached_at)?,
        updated_at: parse_optional_datetime(row.get("updated_at"))?,
    })
}

fn row_to_operation(row: &SqliteRow) -> Result<PendingOperation, StoreError> {
    let op_type: String = row.get("op_type");
    let entity_kind: String = row.get("entity_kind");
    let entity_origin: String = row.get("entity_origin");
    let entity_id: String = row.get("entity_id");
    let payload: String = row.get("payload");
    let created_at: String = row.get("created_at");
    let attempts: i64 = row.get("attempts");

    Ok(PendingOperation {
        seq: row.get("seq"),
        op_type: op_type.parse().map_err(corrupt)?,
        entity_kind: entity_kind.parse().map_err(corrupt)?,
        entity_id: EntityId::from_parts(&entity_origin, &entity_id).map_err(corrupt)?,
        parent_id: optional_id(row.get("parent_origin"), row.get("parent_id"))?,
        payload: decode_attributes(&payload)?,
        has_file: row.get("has_file"),
        created_at: parse_datetime(&created_at)?,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        failed: row.get("failed"),
        error: row.get("error"),
        last_attempt_at: parse_optional_datetime(row.get("last_attempt_at"))?,
    })
}

// ============================================================================
// Connection-level queries (shared by pooled calls and transactions)
// ============================================================================

async fn fetch_record(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &EntityId,
) -> Result<Option<EntityRecord>, StoreError> {
    let sql = format!(
        "SELECT {ENTITY_COLUMNS} FROM entities WHERE kind = ? AND id_origin = ? AND id = ?"
    );
    let row = sqlx::query(&sql)
        .bind(kind.as_str())
        .bind(id.origin().as_str())
        .bind(id.storage_value())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

async fn fetch_children(
    conn: &mut SqliteConnection,
    folder_id: &EntityId,
) -> Result<Vec<EntityRecord>, StoreError> {
    let sql = format!(
        "SELECT {ENTITY_COLUMNS} FROM entities \
         WHERE kind = 'document' AND parent_origin = ? AND parent_id = ? \
         ORDER BY cached_at ASC, id ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(folder_id.origin().as_str())
        .bind(folder_id.storage_value())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_record).collect()
}

async fn insert_record(
    conn: &mut SqliteConnection,
    record: &EntityRecord,
) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT OR REPLACE INTO entities ({ENTITY_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    let parent = record.parent_folder_id.as_ref();

    sqlx::query(&sql)
        .bind(record.kind.as_str())
        .bind(record.id.origin().as_str())
        .bind(record.id.storage_value())
        .bind(parent.map(|p| p.origin().as_str()))
        .bind(parent.map(EntityId::storage_value))
        .bind(encode_attributes(&record.attributes)?)
        .bind(record.file_url.as_deref())
        .bind(record.file.as_ref().map(|f| f.file_name.as_str()))
        .bind(record.file.as_ref().map(|f| f.content_type.as_str()))
        .bind(record.file.as_ref().map(|f| f.bytes.as_slice()))
        .bind(record.synced)
        .bind(record.created_offline)
        .bind(format_timestamp(record.cached_at))
        .bind(record.updated_at.map(format_timestamp))
        .execute(&mut *conn)
        .await?;

    trace!(kind = %record.kind, id = %record.id, "Record saved");
    Ok(())
}

async fn delete_record(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &EntityId,
) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM entities WHERE kind = ? AND id_origin = ? AND id = ?")
        .bind(kind.as_str())
        .bind(id.origin().as_str())
        .bind(id.storage_value())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

async fn insert_operation(
    conn: &mut SqliteConnection,
    op: &NewOperation,
) -> Result<i64, StoreError> {
    let parent = op.parent_id.as_ref();
    let result = sqlx::query(
        "INSERT INTO pending_operations \
         (op_type, entity_kind, entity_origin, entity_id, parent_origin, parent_id, \
          payload, has_file, created_at, attempts, failed) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0)",
    )
    .bind(op.op_type.as_str())
    .bind(op.entity_kind.as_str())
    .bind(op.entity_id.origin().as_str())
    .bind(op.entity_id.storage_value())
    .bind(parent.map(|p| p.origin().as_str()))
    .bind(parent.map(EntityId::storage_value))
    .bind(encode_attributes(&op.payload)?)
    .bind(op.has_file)
    .bind(format_timestamp(Utc::now()))
    .execute(&mut *conn)
    .await?;

    let seq = result.last_insert_rowid();
    debug!(
        seq,
        op_type = %op.op_type,
        kind = %op.entity_kind,
        id = %op.entity_id,
        "Pending operation enqueued"
    );
    Ok(seq)
}

/// Drop every queued operation that targets an entity
async fn delete_operations_for(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &EntityId,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "DELETE FROM pending_operations \
         WHERE entity_kind = ? AND entity_origin = ? AND entity_id = ?",
    )
    .bind(kind.as_str())
    .bind(id.origin().as_str())
    .bind(id.storage_value())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

async fn find_create_operation(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &EntityId,
) -> Result<Option<i64>, StoreError> {
    let seq = sqlx::query_scalar::<_, i64>(
        "SELECT seq FROM pending_operations \
         WHERE entity_kind = ? AND entity_origin = ? AND entity_id = ? AND op_type = 'create' \
         ORDER BY seq ASC LIMIT 1",
    )
    .bind(kind.as_str())
    .bind(id.origin().as_str())
    .bind(id.storage_value())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(seq)
}

/// Moves a record from its temporary id to the authoritative one and
/// rewrites every reference to it. Returns `false` when the record is gone.
async fn remap_entity(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    temp_id: &EntityId,
    server_id: &RemoteId,
) -> Result<bool, StoreError> {
    let final_id = EntityId::Authoritative(server_id.clone());
    let Some(mut record) = fetch_record(&mut *conn, kind, temp_id).await? else {
        warn!(%kind, %temp_id, %server_id, "Record vanished before remap");
        return Ok(false);
    };

    delete_record(&mut *conn, kind, temp_id).await?;
    record.id = final_id.clone();
    record.synced = true;
    record.created_offline = false;
    record.file = None;
    insert_record(&mut *conn, &record).await?;

    if kind == EntityKind::Folder {
        let moved = sqlx::query(
            "UPDATE entities SET parent_origin = ?, parent_id = ? \
             WHERE kind = 'document' AND parent_origin = ? AND parent_id = ?",
        )
        .bind(IdOrigin::Authoritative.as_str())
        .bind(server_id.as_str())
        .bind(temp_id.origin().as_str())
        .bind(temp_id.storage_value())
        .execute(&mut *conn)
        .await?
        .rows_affected();

        sqlx::query(
            "UPDATE pending_operations SET parent_origin = ?, parent_id = ? \
             WHERE parent_origin = ? AND parent_id = ?",
        )
        .bind(IdOrigin::Authoritative.as_str())
        .bind(server_id.as_str())
        .bind(temp_id.origin().as_str())
        .bind(temp_id.storage_value())
        .execute(&mut *conn)
        .await?;

        debug!(%temp_id, %server_id, documents = moved, "Rewrote document parents");
    }

    sqlx::query(
        "UPDATE pending_operations SET entity_origin = ?, entity_id = ? \
         WHERE entity_kind = ? AND entity_origin = ? AND entity_id = ?",
    )
    .bind(IdOrigin::Authoritative.as_str())
    .bind(server_id.as_str())
    .bind(kind.as_str())
    .bind(temp_id.origin().as_str())
    .bind(temp_id.storage_value())
    .execute(&mut *conn)
    .await?;

    Ok(true)
}

async fn count(conn: &mut SqliteConnection, sql: &str) -> Result<u64, StoreError> {
    let n = sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(&mut *conn)
        .await?;
    Ok(u64::try_from(n).unwrap_or(0))
}

// ============================================================================
// ILocalStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalStore for SqliteLocalStore {
    // --- Entity records ---

    async fn get_all(&self, kind: EntityKind) -> EngineResult<Vec<EntityRecord>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE kind = ? ORDER BY cached_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get(&self, kind: EntityKind, id: &EntityId) -> EngineResult<Option<EntityRecord>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        Ok(fetch_record(&mut conn, kind, id).await?)
    }

    async fn put(&self, record: &EntityRecord) -> EngineResult<()> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        insert_record(&mut conn, record).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> EngineResult<()> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        delete_record(&mut conn, kind, id).await?;
        trace!(%kind, %id, "Record deleted");
        Ok(())
    }

    async fn query_by_index(
        &self,
        kind: EntityKind,
        query: &IndexQuery,
    ) -> EngineResult<Vec<EntityRecord>> {
        let base = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE kind = ?");
        let order = "ORDER BY cached_at ASC, id ASC";

        let rows = match query {
            IndexQuery::ParentFolder(parent) => {
                let sql = format!("{base} AND parent_origin = ? AND parent_id = ? {order}");
                sqlx::query(&sql)
                    .bind(kind.as_str())
                    .bind(parent.origin().as_str())
                    .bind(parent.storage_value())
                    .fetch_all(&self.pool)
                    .await
            }
            IndexQuery::Synced(flag) => {
                let sql = format!("{base} AND synced = ? {order}");
                sqlx::query(&sql)
                    .bind(kind.as_str())
                    .bind(*flag)
                    .fetch_all(&self.pool)
                    .await
            }
            IndexQuery::CreatedOffline(flag) => {
                let sql = format!("{base} AND created_offline = ? {order}");
                sqlx::query(&sql)
                    .bind(kind.as_str())
                    .bind(*flag)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(StoreError::from)?;

        Ok(rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?)
    }

    // --- Offline mutations ---

    async fn save_synced(&self, record: &EntityRecord) -> EngineResult<()> {
        let mut record = record.clone();
        record.synced = true;
        record.created_offline = false;
        record.file = None;
        record.cached_at = Utc::now();

        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        insert_record(&mut conn, &record).await?;
        Ok(())
    }

    async fn save_offline(
        &self,
        draft: EntityDraft,
        file: Option<RetainedFile>,
    ) -> EngineResult<EntityRecord> {
        if draft.kind == EntityKind::Document && draft.parent_folder_id.is_none() {
            return Err(StoreError::InvalidRecord("document has no parent folder".into()).into());
        }
        if draft.kind == EntityKind::Folder && file.is_some() {
            return Err(StoreError::InvalidRecord("folders cannot carry a file".into()).into());
        }

        let record = EntityRecord::from_draft(draft, file);
        let operation = NewOperation {
            op_type: OperationType::Create,
            entity_kind: record.kind,
            entity_id: record.id.clone(),
            parent_id: record.parent_folder_id.clone(),
            payload: record.attributes.clone(),
            has_file: record.file.is_some(),
        };

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        insert_record(&mut tx, &record).await?;
        insert_operation(&mut tx, &operation).await?;
        tx.commit().await.map_err(StoreError::from)?;

        info!(kind = %record.kind, id = %record.id, "Saved offline");
        Ok(record)
    }

    async fn update_offline(
        &self,
        kind: EntityKind,
        id: &EntityId,
        patch: &Attributes,
    ) -> EngineResult<EntityRecord> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let mut record = fetch_record(&mut tx, kind, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })?;
        record.apply_patch(patch);
        insert_record(&mut tx, &record).await?;

        if record.created_offline {
            match find_create_operation(&mut tx, kind, id).await? {
                Some(seq) => {
                    sqlx::query("UPDATE pending_operations SET payload = ? WHERE seq = ?")
                        .bind(encode_attributes(&record.attributes)?)
                        .bind(seq)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::from)?;
                    debug!(seq, %kind, %id, "Patch folded into pending create");
                }
                None => {
                    warn!(%kind, %id, "Offline record had no pending create, re-enqueueing");
                    insert_operation(
                        &mut tx,
                        &NewOperation {
                            op_type: OperationType::Create,
                            entity_kind: kind,
                            entity_id: record.id.clone(),
                            parent_id: record.parent_folder_id.clone(),
                            payload: record.attributes.clone(),
                            has_file: record.file.is_some(),
                        },
                    )
                    .await?;
                }
            }
        } else {
            insert_operation(
                &mut tx,
                &NewOperation {
                    op_type: OperationType::Update,
                    entity_kind: kind,
                    entity_id: record.id.clone(),
                    parent_id: record.parent_folder_id.clone(),
                    payload: patch.clone(),
                    has_file: false,
                },
            )
            .await?;
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(record)
    }

    async fn delete_offline(&self, kind: EntityKind, id: &EntityId) -> EngineResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let Some(record) = fetch_record(&mut tx, kind, id).await? else {
            debug!(%kind, %id, "Nothing to delete");
            return Ok(());
        };

        if kind == EntityKind::Folder {
            for child in fetch_children(&mut tx, &record.id).await? {
                delete_operations_for(&mut tx, EntityKind::Document, &child.id).await?;
                delete_record(&mut tx, EntityKind::Document, &child.id).await?;
                trace!(id = %child.id, "Cascaded document delete");
            }
        }

        delete_record(&mut tx, kind, id).await?;
        let dropped = delete_operations_for(&mut tx, kind, id).await?;

        if !record.created_offline {
            insert_operation(
                &mut tx,
                &NewOperation {
                    op_type: OperationType::Delete,
                    entity_kind: kind,
                    entity_id: record.id.clone(),
                    parent_id: record.parent_folder_id.clone(),
                    payload: Attributes::new(),
                    has_file: false,
                },
            )
            .await?;
        }

        tx.commit().await.map_err(StoreError::from)?;
        info!(
            %kind,
            %id,
            dropped_operations = dropped,
            remote_delete = !record.created_offline,
            "Deleted offline"
        );
        Ok(())
    }

    async fn mark_synced(
        &self,
        kind: EntityKind,
        temp_id: &EntityId,
        server_id: &RemoteId,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        if remap_entity(&mut tx, kind, temp_id, server_id).await? {
            tx.commit().await.map_err(StoreError::from)?;
            info!(%kind, %temp_id, %server_id, "Remapped to authoritative id");
        }
        Ok(())
    }

    async fn acknowledge_operation(
        &self,
        operation: &PendingOperation,
        created: Option<&RemoteEntity>,
    ) -> EngineResult<()> {
        let kind = operation.entity_kind;
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        sqlx::query("DELETE FROM pending_operations WHERE seq = ?")
            .bind(operation.seq)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        let entity_id = match created {
            Some(created) => {
                remap_entity(&mut tx, kind, &operation.entity_id, &created.id).await?;
                let id = EntityId::Authoritative(created.id.clone());
                if let Some(url) = &created.file_url {
                    sqlx::query(
                        "UPDATE entities SET file_url = ? \
                         WHERE kind = ? AND id_origin = ? AND id = ?",
                    )
                    .bind(url.as_str())
                    .bind(kind.as_str())
                    .bind(id.origin().as_str())
                    .bind(id.storage_value())
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::from)?;
                }
                id
            }
            None => operation.entity_id.clone(),
        };

        let remaining = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pending_operations \
             WHERE entity_kind = ? AND entity_origin = ? AND entity_id = ?",
        )
        .bind(kind.as_str())
        .bind(entity_id.origin().as_str())
        .bind(entity_id.storage_value())
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if remaining == 0 {
            sqlx::query(
                "UPDATE entities SET synced = 1 \
                 WHERE kind = ? AND id_origin = ? AND id = ?",
            )
            .bind(kind.as_str())
            .bind(entity_id.origin().as_str())
            .bind(entity_id.storage_value())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;
        debug!(
            seq = operation.seq,
            %kind,
            id = %entity_id,
            remaining,
            "Operation acknowledged"
        );
        Ok(())
    }

    async fn pending_operations(&self) -> EngineResult<Vec<PendingOperation>> {
        let sql = format!(
            "SELECT {OPERATION_COLUMNS} FROM pending_operations ORDER BY created_at ASC, seq ASC"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(rows
            .iter()
            .map(row_to_operation)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_operation(&self, operation: &PendingOperation) -> EngineResult<()> {
        sqlx::query(
            "UPDATE pending_operations \
             SET attempts = ?, failed = ?, error = ?, last_attempt_at = ? \
             WHERE seq = ?",
        )
        .bind(i64::from(operation.attempts))
        .bind(operation.failed)
        .bind(operation.error.as_deref())
        .bind(operation.last_attempt_at.map(format_timestamp))
        .bind(operation.seq)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn remove_operation(&self, seq: i64) -> EngineResult<()> {
        sqlx::query("DELETE FROM pending_operations WHERE seq = ?")
            .bind(seq)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        trace!(seq, "Pending operation removed");
        Ok(())
    }

    async fn reset_failed_operations(&self) -> EngineResult<u64> {
        let reset = sqlx::query(
            "UPDATE pending_operations \
             SET attempts = 0, failed = 0, error = NULL, last_attempt_at = NULL \
             WHERE failed = 1",
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?
        .rows_affected();

        if reset > 0 {
            info!(reset, "Failed operations queued for retry");
        }
        Ok(reset)
    }

    async fn pending_count(&self) -> EngineResult<u64> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        Ok(count(&mut conn, "SELECT COUNT(*) FROM pending_operations").await?)
    }

    // --- Metadata ---

    async fn get_metadata(&self, key: &str) -> EngineResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(value)
    }

    async fn set_metadata(&self, key: &str, value: &str) -> EngineResult<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    // --- Housekeeping ---

    async fn storage_counts(&self) -> EngineResult<StorageCounts> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        Ok(StorageCounts {
            folders: count(&mut conn, "SELECT COUNT(*) FROM entities WHERE kind = 'folder'")
                .await?,
            documents: count(&mut conn, "SELECT COUNT(*) FROM entities WHERE kind = 'document'")
                .await?,
            pending: count(&mut conn, "SELECT COUNT(*) FROM pending_operations").await?,
            failed: count(
                &mut conn,
                "SELECT COUNT(*) FROM pending_operations WHERE failed = 1",
            )
            .await?,
        })
    }

    async fn clear_all(&self) -> EngineResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        for table in ["entities", "pending_operations", "metadata"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }
        tx.commit().await.map_err(StoreError::from)?;
        info!("Local store cleared");
        Ok(())
    }
}
