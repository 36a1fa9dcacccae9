//! Interception layer
//!
//! Serves intercepted requests from the on-disk caches by strategy:
//!
//! | class          | strategy                                   | bucket      |
//! |----------------|--------------------------------------------|-------------|
//! | `Static`       | cache-first                                | `static`    |
//! | `DocumentFile` | stale-while-revalidate                     | `documents` |
//! | `Api`          | network-first, capped dynamic cache        | `dynamic`   |
//! | `Navigation`   | network-first, offline page fallback       | `dynamic`   |
//!
//! Lookups search every bucket, so a page pre-cached as a static asset also
//! answers an offline navigation to it.
//!
//! The layer also relays "sync required" and "connectivity restored"
//! signals to the sync scheduler, skipping them while a cycle is in flight.

use std::{collections::BTreeMap, sync::Arc};

use meddir_content::{CacheBucket, CacheStore, ContentCache};
use meddir_core::{
    config::InterceptConfig,
    domain::{CachedContent, EngineResult},
    ports::IContentFetcher,
};
use meddir_sync::{SyncActivity, SyncSignal, SyncTrigger};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    classify::{classify, InterceptRequest, RequestClass},
    response::InterceptResponse,
};

/// Body of the 503 served when a static asset is neither cached nor reachable
const OFFLINE_BODY: &str = "Offline";
/// Body of the 503 served for a navigation with no offline page cached
const OFFLINE_PAGE_BODY: &str = "You are offline";

// ============================================================================
// Reports
// ============================================================================

/// Outcome of [`InterceptLayer::install`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Entry counts per bucket, as returned by [`InterceptLayer::cache_status`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub caches: BTreeMap<String, usize>,
    pub document_bytes: u64,
}

/// Handles through which the layer reaches the sync scheduler
#[derive(Debug, Clone)]
pub struct SyncBridge {
    trigger: SyncTrigger,
    activity: SyncActivity,
}

impl SyncBridge {
    pub fn new(trigger: SyncTrigger, activity: SyncActivity) -> Self {
        Self { trigger, activity }
    }
}

// ============================================================================
// InterceptLayer
// ============================================================================

pub struct InterceptLayer {
    origin: Url,
    store: Arc<CacheStore>,
    documents: Arc<ContentCache>,
    fetcher: Arc<dyn IContentFetcher>,
    config: InterceptConfig,
    sync: Option<SyncBridge>,
}

impl InterceptLayer {
    /// Creates a layer for requests to `origin`
    ///
    /// `documents` must sit on the same `store` so status and lookups see
    /// its bucket.
    pub fn new(
        origin: Url,
        store: Arc<CacheStore>,
        documents: Arc<ContentCache>,
        fetcher: Arc<dyn IContentFetcher>,
        config: InterceptConfig,
    ) -> Self {
        Self {
            origin,
            store,
            documents,
            fetcher,
            config,
            sync: None,
        }
    }

    pub fn with_sync(mut self, bridge: SyncBridge) -> Self {
        self.sync = Some(bridge);
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Serves `request`. `None` means the request is not intercepted and
    /// should go to the network untouched.
    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    pub async fn handle(&self, request: &InterceptRequest) -> Option<InterceptResponse> {
        let class = classify(request, &self.origin)?;
        let key = request.cache_key();
        debug!(class = class.as_str(), key = %key, "Intercepted request");

        let response = match class {
            RequestClass::Static => self.cache_first(&key).await,
            RequestClass::DocumentFile => self.stale_while_revalidate(&key).await,
            RequestClass::Api => self.network_first(&key).await,
            RequestClass::Navigation => self.network_first_with_offline_page(&key).await,
        };
        Some(response)
    }

    // ========================================================================
    // Strategies
    // ========================================================================

    async fn cache_first(&self, key: &str) -> InterceptResponse {
        if let Some(hit) = self.lookup(key).await {
            return InterceptResponse::from_cache(hit);
        }

        match self.fetcher.fetch(key).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_in(CacheBucket::Static, key, &response.body, response.content_type.as_deref())
                        .await;
                }
                InterceptResponse::from_network(response)
            }
            Err(e) => {
                warn!(key, error = %e, "Static asset unavailable");
                InterceptResponse::offline_text(OFFLINE_BODY)
            }
        }
    }

    async fn network_first(&self, key: &str) -> InterceptResponse {
        match self.fetcher.fetch(key).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_dynamic(key, &response.body, response.content_type.as_deref())
                        .await;
                }
                InterceptResponse::from_network(response)
            }
            Err(e) => {
                debug!(key, error = %e, "Network unavailable, falling back to cache");
                match self.lookup(key).await {
                    Some(hit) => InterceptResponse::from_cache(hit),
                    None => InterceptResponse::offline_json(),
                }
            }
        }
    }

    async fn network_first_with_offline_page(&self, key: &str) -> InterceptResponse {
        match self.fetcher.fetch(key).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_dynamic(key, &response.body, response.content_type.as_deref())
                        .await;
                }
                InterceptResponse::from_network(response)
            }
            Err(e) => {
                debug!(key, error = %e, "Navigation offline");
                if let Some(hit) = self.lookup(key).await {
                    return InterceptResponse::from_cache(hit);
                }
                if let Some(page) = self.lookup(&self.config.offline_page).await {
                    return InterceptResponse::from_cache(page);
                }
                InterceptResponse::offline_text(OFFLINE_PAGE_BODY)
            }
        }
    }

    /// Cached payload right away with a background refresh; the network
    /// otherwise.
    async fn stale_while_revalidate(&self, key: &str) -> InterceptResponse {
        if let Some(hit) = self.documents.get(key).await {
            self.revalidate(key.to_string());
            return InterceptResponse::from_cache(hit);
        }

        match self.fetcher.fetch(key).await {
            Ok(response) => {
                if response.is_success() {
                    if let Err(e) = self
                        .documents
                        .insert(key, &response.body, response.content_type.as_deref())
                        .await
                    {
                        warn!(key, error = %e, "Document payload not cached");
                    }
                }
                InterceptResponse::from_network(response)
            }
            Err(e) => {
                warn!(key, error = %e, "Document payload unavailable");
                InterceptResponse::offline_text(OFFLINE_BODY)
            }
        }
    }

    fn revalidate(&self, key: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let documents = Arc::clone(&self.documents);
        tokio::spawn(async move {
            match fetcher.fetch(&key).await {
                Ok(response) if response.is_success() => {
                    if let Err(e) = documents
                        .insert(&key, &response.body, response.content_type.as_deref())
                        .await
                    {
                        warn!(key = %key, error = %e, "Revalidated payload not cached");
                    }
                }
                Ok(response) => {
                    debug!(key = %key, status = response.status, "Revalidation kept cached payload");
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "Revalidation skipped, network unavailable");
                }
            }
        });
    }

    // ========================================================================
    // Cache access
    // ========================================================================

    /// First hit across all buckets. Index errors count as a miss.
    async fn lookup(&self, key: &str) -> Option<CachedContent> {
        for bucket in CacheBucket::ALL {
            match self.store.get(bucket, key).await {
                Ok(Some(hit)) => return Some(hit),
                Ok(None) => {}
                Err(e) => warn!(bucket = %bucket, key, error = %e, "Cache lookup failed"),
            }
        }
        None
    }

    async fn store_in(&self, bucket: CacheBucket, key: &str, body: &[u8], content_type: Option<&str>) {
        if let Err(e) = self.store.put(bucket, key, body, content_type).await {
            warn!(bucket = %bucket, key, error = %e, "Failed to cache response");
        }
    }

    async fn store_dynamic(&self, key: &str, body: &[u8], content_type: Option<&str>) {
        self.store_in(CacheBucket::Dynamic, key, body, content_type).await;
        if let Err(e) = self
            .store
            .trim_to(CacheBucket::Dynamic, self.config.max_dynamic_entries)
            .await
        {
            warn!(error = %e, "Failed to trim dynamic cache");
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Pre-caches the configured static assets
    ///
    /// A failing asset is reported and skipped.
    pub async fn install(&self) -> InstallReport {
        info!(count = self.config.precache.len(), "Pre-caching static assets");
        let mut report = InstallReport::default();

        for asset in &self.config.precache {
            match self.fetcher.fetch(asset).await {
                Ok(response) if response.is_success() => {
                    match self
                        .store
                        .put(CacheBucket::Static, asset, &response.body, response.content_type.as_deref())
                        .await
                    {
                        Ok(_) => report.cached.push(asset.clone()),
                        Err(e) => {
                            warn!(asset = %asset, error = %e, "Failed to store asset");
                            report.failed.push(asset.clone());
                        }
                    }
                }
                Ok(response) => {
                    warn!(asset = %asset, status = response.status, "Asset rejected");
                    report.failed.push(asset.clone());
                }
                Err(e) => {
                    warn!(asset = %asset, error = %e, "Asset unreachable");
                    report.failed.push(asset.clone());
                }
            }
        }

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Pre-caching finished"
        );
        report
    }

    /// Downloads a document payload into the document cache
    pub async fn cache_document(&self, url: &str) -> bool {
        self.documents.fetch(url).await
    }

    pub async fn clear_document_cache(&self) -> EngineResult<usize> {
        self.documents.clear().await
    }

    pub async fn cache_status(&self) -> EngineResult<CacheStatus> {
        let counts = self.store.counts().await?;
        let document_bytes = self.store.total_size(CacheBucket::Documents).await?;
        Ok(CacheStatus {
            caches: counts
                .into_iter()
                .map(|(bucket, n)| (bucket.as_str().to_string(), n))
                .collect(),
            document_bytes,
        })
    }

    // ========================================================================
    // Sync signaling
    // ========================================================================

    /// The network came back. Returns `true` if a cycle was requested.
    pub fn on_connectivity_restored(&self) -> bool {
        self.request_sync(SyncSignal::ConnectivityRestored)
    }

    /// The application reported local changes. Returns `true` if a cycle was
    /// requested.
    pub fn on_sync_required(&self) -> bool {
        self.request_sync(SyncSignal::SyncRequired)
    }

    fn request_sync(&self, signal: SyncSignal) -> bool {
        let Some(bridge) = &self.sync else {
            debug!(?signal, "No sync bridge attached");
            return false;
        };
        if bridge.activity.is_busy() {
            debug!(?signal, "Sync in flight, signal ignored");
            return false;
        }
        bridge.trigger.request(signal)
    }
}
