//! Document payload cache
//!
//! [`ContentCache`] owns the `documents` bucket of a [`CacheStore`]. Payloads
//! are fetched through the [`IContentFetcher`] port, kept below a size
//! ceiling by [`EvictionPolicy`], and primed in bulk through a background
//! queue drained by a single worker.
//!
//! ## Priming
//!
//! ```text
//! sync_many(records) ──► enforce_limit ──► enqueue(file urls) ──► process_queue
//!                                          (dedup, skip cached)     │
//!                                                                   ├─ cache-started {count}
//!                                                                   ├─ fetch + cache-progress ...
//!                                                                   ├─ evict to target if the
//!                                                                   │  ceiling was crossed
//!                                                                   └─ cache-completed
//! ```

use std::{collections::VecDeque, sync::Arc, time::Duration};

use meddir_core::{
    config::ContentCacheConfig,
    domain::{
        CacheSizeInfo, CachedContent, EngineError, EngineResult, EntityId, EntityKind,
        EntityRecord, IndexQuery,
    },
    ports::{EngineEvent, IContentFetcher, IEventSink, ILocalStore},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    eviction::{select_victims, EvictionPolicy, EvictionReport},
    store::{CacheBucket, CacheStore},
};

const BUCKET: CacheBucket = CacheBucket::Documents;

/// Outcome of draining the priming queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimingReport {
    pub cached: usize,
    pub failed: usize,
    pub eviction: EvictionReport,
}

/// Size-bounded cache of document payloads
pub struct ContentCache {
    store: Arc<CacheStore>,
    fetcher: Arc<dyn IContentFetcher>,
    events: Arc<dyn IEventSink>,
    policy: EvictionPolicy,
    prime_delay: Duration,
    queue: Mutex<VecDeque<String>>,
    /// Held for the whole of a drain
    drain_lock: Mutex<()>,
}

impl ContentCache {
    pub fn new(
        store: Arc<CacheStore>,
        fetcher: Arc<dyn IContentFetcher>,
        events: Arc<dyn IEventSink>,
        policy: EvictionPolicy,
        prime_delay: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            events,
            policy,
            prime_delay,
            queue: Mutex::new(VecDeque::new()),
            drain_lock: Mutex::new(()),
        }
    }

    pub fn from_config(
        store: Arc<CacheStore>,
        fetcher: Arc<dyn IContentFetcher>,
        events: Arc<dyn IEventSink>,
        config: &ContentCacheConfig,
    ) -> Self {
        Self::new(
            store,
            fetcher,
            events,
            EvictionPolicy::from_config(config),
            Duration::from_millis(config.prime_delay_ms),
        )
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    // ========================================================================
    // Single-entry operations
    // ========================================================================

    /// Returns `true` when the payload is cached. Index errors count as a miss.
    pub async fn has(&self, url: &str) -> bool {
        match self.store.contains(BUCKET, url).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url, error = %e, "Cache lookup failed");
                false
            }
        }
    }

    /// Cached payload for `url`, if any. Index errors count as a miss.
    pub async fn get(&self, url: &str) -> Option<CachedContent> {
        match self.store.get(BUCKET, url).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(url, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Downloads `url` and stores the payload.
    ///
    /// Returns `false` on any failure (transport, non-2xx, quota, disk); the
    /// caller sees a miss.
    pub async fn fetch(&self, url: &str) -> bool {
        match self.try_fetch(url).await {
            Ok(_) => true,
            Err(e) => {
                warn!(url, error = %e, "Failed to cache payload");
                false
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> EngineResult<EvictionReport> {
        let response = self.fetcher.fetch(url).await?;
        if !response.is_success() {
            return Err(EngineError::RemoteRejected {
                status: response.status,
                message: format!("GET {}", url),
            });
        }
        self.insert(url, &response.body, response.content_type.as_deref())
            .await
    }

    /// Stores an already-downloaded payload, evicting if the ceiling is crossed.
    ///
    /// # Errors
    ///
    /// `QuotaExceeded` when the payload alone is larger than the ceiling.
    pub async fn insert(
        &self,
        url: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> EngineResult<EvictionReport> {
        let size = bytes.len() as u64;
        if size > self.policy.max_bytes {
            return Err(EngineError::QuotaExceeded {
                requested: size,
                ceiling: self.policy.max_bytes,
            });
        }

        self.store.put(BUCKET, url, bytes, content_type).await?;
        self.enforce_limit().await
    }

    /// Removes a payload. Returns `true` if it was cached.
    pub async fn remove(&self, url: &str) -> bool {
        match self.store.remove(BUCKET, url).await {
            Ok(entry) => entry.is_some(),
            Err(e) => {
                warn!(url, error = %e, "Failed to remove cached payload");
                false
            }
        }
    }

    pub async fn size_info(&self) -> EngineResult<CacheSizeInfo> {
        let entries = self.store.entries(BUCKET).await?;
        Ok(CacheSizeInfo::from_entries(entries))
    }

    /// Drops every cached payload and any queued priming work.
    pub async fn clear(&self) -> EngineResult<usize> {
        self.queue.lock().await.clear();
        let removed = self.store.clear(BUCKET).await?;
        info!(removed, "Document cache cleared");
        Ok(removed)
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Evicts down to the target when the cache is over its ceiling.
    pub async fn enforce_limit(&self) -> EngineResult<EvictionReport> {
        let total = self.store.total_size(BUCKET).await?;
        if !self.policy.is_over_ceiling(total) {
            return Ok(EvictionReport::default());
        }
        self.evict_to_target().await
    }

    async fn evict_to_target(&self) -> EngineResult<EvictionReport> {
        let entries = self.store.entries(BUCKET).await?;
        let current: u64 = entries.iter().map(|e| e.size).sum();
        let target = self.policy.target_bytes();

        let mut report = EvictionReport::default();
        for victim in select_victims(&entries, target) {
            self.store.remove(BUCKET, &victim.url).await?;
            report.bytes_freed += victim.size;
            report.evicted.push(victim.url);
        }

        if !report.is_empty() {
            info!(
                current_usage_kb = current / 1024,
                target_kb = target / 1024,
                evicted = report.evicted.len(),
                freed_kb = report.bytes_freed / 1024,
                "Evicted cached payloads"
            );
        }
        Ok(report)
    }

    // ========================================================================
    // Priming
    // ========================================================================

    /// Queues URLs for priming. Duplicates and already-cached URLs are
    /// skipped. Returns how many were added.
    pub async fn enqueue<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for url in urls {
            if self.has(&url).await {
                continue;
            }
            let mut queue = self.queue.lock().await;
            if !queue.contains(&url) {
                queue.push_back(url);
                added += 1;
            }
        }
        added
    }

    pub async fn queued(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Drains the priming queue.
    ///
    /// Only one drain runs at a time. A concurrent call waits for the
    /// running drain, then drains whatever is left, so the queue is empty
    /// when it returns. The report counts only the fetches this call made.
    #[tracing::instrument(skip(self))]
    pub async fn process_queue(&self) -> PrimingReport {
        let mut report = PrimingReport::default();
        let _drain = match self.drain_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Priming already in progress, waiting for it");
                self.drain_lock.lock().await
            }
        };
        self.drain(&mut report).await;
        report
    }

    async fn drain(&self, report: &mut PrimingReport) {
        let count = self.queue.lock().await.len();
        if count == 0 {
            return;
        }

        self.events.emit(EngineEvent::CacheStarted { count });
        let (mut cached, mut failed) = (0, 0);
        let mut crossed_ceiling = false;

        loop {
            let next = self.queue.lock().await.pop_front();
            let Some(url) = next else { break };

            match self.try_fetch(&url).await {
                Ok(eviction) => {
                    cached += 1;
                    crossed_ceiling |= !eviction.is_empty();
                    report.eviction.merge(eviction);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Priming fetch failed");
                    failed += 1;
                }
            }

            let remaining = self.queue.lock().await.len();
            self.events.emit(EngineEvent::CacheProgress {
                cached,
                failed,
                remaining,
            });

            if remaining > 0 && !self.prime_delay.is_zero() {
                tokio::time::sleep(self.prime_delay).await;
            }
        }

        if crossed_ceiling {
            match self.evict_to_target().await {
                Ok(eviction) => report.eviction.merge(eviction),
                Err(e) => warn!(error = %e, "Post-priming eviction failed"),
            }
        }

        info!(cached, failed, "Priming pass finished");
        self.events
            .emit(EngineEvent::CacheCompleted { cached, failed });
        report.cached += cached;
        report.failed += failed;
    }

    /// Primes the payloads of every record that carries a file URL.
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    pub async fn sync_many(&self, records: &[EntityRecord]) -> PrimingReport {
        if let Err(e) = self.enforce_limit().await {
            warn!(error = %e, "Pre-priming eviction failed");
        }
        self.enqueue(file_urls(records)).await;
        self.process_queue().await
    }

    /// Queues URLs and drains the queue on a background task.
    pub fn schedule(self: &Arc<Self>, urls: Vec<String>) -> JoinHandle<PrimingReport> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            cache.enqueue(urls).await;
            cache.process_queue().await
        })
    }

    /// Primes every document of one folder from the Local Store.
    pub async fn preload_folder(
        &self,
        store: &dyn ILocalStore,
        folder_id: &EntityId,
    ) -> EngineResult<PrimingReport> {
        let documents = store
            .query_by_index(EntityKind::Document, &IndexQuery::ParentFolder(folder_id.clone()))
            .await?;
        Ok(self.sync_many(&documents).await)
    }

    /// Primes every document held in the Local Store.
    pub async fn preload_all(&self, store: &dyn ILocalStore) -> EngineResult<PrimingReport> {
        let documents = store.get_all(EntityKind::Document).await?;
        Ok(self.sync_many(&documents).await)
    }
}

/// File URLs of the given records, in order.
pub fn file_urls(records: &[EntityRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.file_url.clone())
        .collect()
}
