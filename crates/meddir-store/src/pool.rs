//! Connection pool and schema versioning
//!
//! [`DatabasePool`] opens the Local Store database and brings its schema up
//! to date. Migrations are numbered; the applied version is kept in SQLite's
//! `user_version` pragma so reopening an existing database only runs the
//! migrations it has not seen yet.

use std::{path::Path, time::Duration};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

use crate::StoreError;

/// Schema migrations in application order, keyed by the version they produce
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("migrations/0001_initial.sql"))];

/// Connections for a file-backed store
const MAX_CONNECTIONS: u32 = 4;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of SQLite connections to the Local Store database
///
/// File databases run in WAL mode so readers (status queries, the
/// interception layer) never wait on a sync cycle's writes. An in-memory
/// database is a single connection, since each SQLite connection would
/// otherwise see its own empty database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database at `db_path`, creating the file and its directory
    /// if needed, and applies pending migrations.
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!("{}: {}", db_path.display(), e))
            })?;

        let version = migrate(&pool).await?;
        info!(path = %db_path.display(), schema_version = version, "Local store database ready");

        Ok(Self { pool })
    }

    /// Opens a private in-memory database with the current schema
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("in-memory database: {}", e)))?;

        let version = migrate(&pool).await?;
        debug!(schema_version = version, "In-memory local store ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Version of the newest migration this build knows
    pub fn latest_version() -> i64 {
        MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
    }
}

/// Reads the schema version stored in the database
pub async fn schema_version(pool: &SqlitePool) -> Result<i64, StoreError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Applies every migration newer than the stored version; returns the
/// resulting version
async fn migrate(pool: &SqlitePool) -> Result<i64, StoreError> {
    let applied = schema_version(pool).await?;
    let mut current = applied;

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("version {}: {}", version, e)))?;
        // PRAGMA does not accept bound parameters
        sqlx::raw_sql(&format!("PRAGMA user_version = {}", version))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("version {}: {}", version, e)))?;
        tx.commit().await?;

        debug!(version, "Applied schema migration");
        current = *version;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_is_at_latest_version() {
        let db = DatabasePool::in_memory().await.unwrap();
        assert_eq!(
            schema_version(db.pool()).await.unwrap(),
            DatabasePool::latest_version()
        );
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("meddir.db");

        let db = DatabasePool::new(&path).await.unwrap();
        sqlx::query(
            "INSERT INTO metadata (key, value, updated_at) VALUES ('marker', 'kept', '2026-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db.pool().close().await;

        let db = DatabasePool::new(&path).await.unwrap();
        let value: String = sqlx::query_scalar("SELECT value FROM metadata WHERE key = 'marker'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(value, "kept");
        assert_eq!(
            schema_version(db.pool()).await.unwrap(),
            DatabasePool::latest_version()
        );
    }
}
