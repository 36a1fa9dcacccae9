//! Bucketed on-disk payload store
//!
//! Payloads are stored in a hash-based directory structure:
//! `{cache_dir}/content/{first_2_chars_of_hash}/{rest_of_hash}`, where the
//! hash is the SHA-256 of bucket and URL. A small SQLite index at
//! `{cache_dir}/index.db` records size, content type and insertion order.
//!
//! A payload file that disappears behind the index's back is treated as a
//! miss and its index row is dropped.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, SecondsFormat, Utc};
use meddir_core::domain::{CacheEntry, CachedContent, DomainError};
use sha2::{Digest, Sha256};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use tracing::{debug, trace, warn};

use crate::ContentError;

/// Logical partitions of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheBucket {
    /// Application shell assets
    Static,
    /// Read-only API responses
    Dynamic,
    /// Document payloads
    Documents,
}

impl CacheBucket {
    pub const ALL: [CacheBucket; 3] = [
        CacheBucket::Static,
        CacheBucket::Dynamic,
        CacheBucket::Documents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBucket::Static => "static",
            CacheBucket::Dynamic => "dynamic",
            CacheBucket::Documents => "documents",
        }
    }
}

impl fmt::Display for CacheBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheBucket {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(CacheBucket::Static),
            "dynamic" => Ok(CacheBucket::Dynamic),
            "documents" => Ok(CacheBucket::Documents),
            other => Err(DomainError::UnknownVariant {
                what: "cache bucket",
                value: other.to_string(),
            }),
        }
    }
}

/// Payload files plus their SQLite index
pub struct CacheStore {
    pool: SqlitePool,
    content_dir: PathBuf,
}

impl CacheStore {
    /// Opens (or creates) the cache rooted at `cache_dir`
    pub async fn open(cache_dir: &Path) -> Result<Self, ContentError> {
        let content_dir = cache_dir.join("content");
        tokio::fs::create_dir_all(&content_dir).await?;

        let index_path = cache_dir.join("index.db");
        let options = SqliteConnectOptions::new()
            .filename(&index_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                ContentError::OpenFailed(format!(
                    "failed to connect to {}: {}",
                    index_path.display(),
                    e
                ))
            })?;

        sqlx::raw_sql(include_str!("migrations/0001_cache_index.sql"))
            .execute(&pool)
            .await
            .map_err(|e| ContentError::OpenFailed(format!("migration failed: {}", e)))?;

        debug!(path = %cache_dir.display(), "Content cache opened");

        Ok(Self { pool, content_dir })
    }

    /// Closes the index connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Compute the payload path for a bucket/URL pair.
    pub fn blob_path(&self, bucket: CacheBucket, url: &str) -> PathBuf {
        let hash = Self::hash_key(bucket, url);
        let (prefix, rest) = hash.split_at(2);
        self.content_dir.join(prefix).join(rest)
    }

    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".partial");
        path.with_file_name(name)
    }

    fn hash_key(bucket: CacheBucket, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bucket.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Stores a payload, replacing any previous entry for the same URL.
    ///
    /// A replaced entry becomes the newest in insertion order.
    pub async fn put(
        &self,
        bucket: CacheBucket,
        url: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<CacheEntry, ContentError> {
        let path = self.blob_path(bucket, url);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = Self::partial_path(&path);
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, &path).await?;

        let entry = CacheEntry {
            url: url.to_string(),
            size: bytes.len() as u64,
            content_type: content_type.map(str::to_string),
            inserted_at: Utc::now(),
        };

        sqlx::query(
            "INSERT OR REPLACE INTO cache_entries (bucket, url, size, content_type, inserted_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(bucket.as_str())
        .bind(&entry.url)
        .bind(entry.size as i64)
        .bind(&entry.content_type)
        .bind(entry.inserted_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        trace!(bucket = %bucket, url, size = entry.size, "Cached payload");
        Ok(entry)
    }

    /// Looks up a payload
    pub async fn get(
        &self,
        bucket: CacheBucket,
        url: &str,
    ) -> Result<Option<CachedContent>, ContentError> {
        let Some(entry) = self.entry(bucket, url).await? else {
            return Ok(None);
        };

        match tokio::fs::read(self.blob_path(bucket, url)).await {
            Ok(bytes) => Ok(Some(CachedContent { entry, bytes })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(bucket = %bucket, url, "Payload file missing, dropping index entry");
                self.delete_row(bucket, url).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Index entry for a URL, without reading the payload
    pub async fn entry(
        &self,
        bucket: CacheBucket,
        url: &str,
    ) -> Result<Option<CacheEntry>, ContentError> {
        let row = sqlx::query(
            "SELECT url, size, content_type, inserted_at FROM cache_entries \
             WHERE bucket = ? AND url = ?",
        )
        .bind(bucket.as_str())
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_entry(&r)).transpose()
    }

    /// Returns `true` when the URL is indexed and its payload file exists
    pub async fn contains(&self, bucket: CacheBucket, url: &str) -> Result<bool, ContentError> {
        if self.entry(bucket, url).await?.is_none() {
            return Ok(false);
        }
        Ok(tokio::fs::try_exists(self.blob_path(bucket, url)).await?)
    }

    /// Removes a payload, returning its index entry if it was cached
    pub async fn remove(
        &self,
        bucket: CacheBucket,
        url: &str,
    ) -> Result<Option<CacheEntry>, ContentError> {
        let entry = self.entry(bucket, url).await?;
        self.delete_row(bucket, url).await?;

        let path = self.blob_path(bucket, url);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let _ = tokio::fs::remove_file(Self::partial_path(&path)).await;

        Ok(entry)
    }

    async fn delete_row(&self, bucket: CacheBucket, url: &str) -> Result<(), ContentError> {
        sqlx::query("DELETE FROM cache_entries WHERE bucket = ? AND url = ?")
            .bind(bucket.as_str())
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All entries of a bucket, oldest first
    pub async fn entries(&self, bucket: CacheBucket) -> Result<Vec<CacheEntry>, ContentError> {
        let rows = sqlx::query(
            "SELECT url, size, content_type, inserted_at FROM cache_entries \
             WHERE bucket = ? ORDER BY seq ASC",
        )
        .bind(bucket.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Sum of payload sizes in a bucket
    pub async fn total_size(&self, bucket: CacheBucket) -> Result<u64, ContentError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM cache_entries WHERE bucket = ?")
                .bind(bucket.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(total.max(0) as u64)
    }

    /// Drops the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the number of entries removed.
    pub async fn trim_to(
        &self,
        bucket: CacheBucket,
        max_entries: usize,
    ) -> Result<usize, ContentError> {
        let entries = self.entries(bucket).await?;
        if entries.len() <= max_entries {
            return Ok(0);
        }

        let excess = entries.len() - max_entries;
        for entry in entries.iter().take(excess) {
            self.remove(bucket, &entry.url).await?;
        }

        debug!(bucket = %bucket, removed = excess, max_entries, "Trimmed cache bucket");
        Ok(excess)
    }

    /// Removes every entry of a bucket, returning how many were removed
    pub async fn clear(&self, bucket: CacheBucket) -> Result<usize, ContentError> {
        let entries = self.entries(bucket).await?;
        for entry in &entries {
            self.remove(bucket, &entry.url).await?;
        }
        Ok(entries.len())
    }

    /// Entry count per bucket
    pub async fn counts(&self) -> Result<HashMap<CacheBucket, usize>, ContentError> {
        let rows = sqlx::query("SELECT bucket, COUNT(*) AS n FROM cache_entries GROUP BY bucket")
            .fetch_all(&self.pool)
            .await?;

        let mut counts: HashMap<CacheBucket, usize> =
            CacheBucket::ALL.iter().map(|b| (*b, 0)).collect();
        for row in rows {
            let name: String = row.try_get("bucket")?;
            let n: i64 = row.try_get("n")?;
            match name.parse::<CacheBucket>() {
                Ok(bucket) => {
                    counts.insert(bucket, n.max(0) as usize);
                }
                Err(e) => warn!(error = %e, "Ignoring unknown bucket in cache index"),
            }
        }
        Ok(counts)
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<CacheEntry, ContentError> {
    let size: i64 = row.try_get("size")?;
    let inserted_at: String = row.try_get("inserted_at")?;
    let inserted_at = DateTime::parse_from_rfc3339(&inserted_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ContentError::Index(format!("invalid timestamp '{}': {}", inserted_at, e)))?;

    Ok(CacheEntry {
        url: row.try_get("url")?,
        size: size.max(0) as u64,
        content_type: row.try_get("content_type")?,
        inserted_at,
    })
}
