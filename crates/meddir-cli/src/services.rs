//! Service wiring shared by the commands
//!
//! [`Services::open`] builds the whole engine from configuration: Local
//! Store, content cache, remote client, sync manager and interception
//! layer. [`Services::close`] releases the database pools.

use std::sync::Arc;

use anyhow::{Context, Result};
use meddir_content::{CacheStore, ContentCache};
use meddir_core::config::Config;
use meddir_intercept::{InterceptLayer, SyncBridge};
use meddir_remote::{HttpFetcher, HttpRemoteAuthority, RemoteClient};
use meddir_store::SqliteLocalStore;
use meddir_sync::{BroadcastEvents, ConnectivityMonitor, RetryPolicy, SyncManager, SyncTrigger};
use tracing::{debug, info};
use url::Url;

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 256;

pub struct Services {
    pub config: Config,
    pub store: Arc<SqliteLocalStore>,
    pub cache_store: Arc<CacheStore>,
    pub client: Arc<RemoteClient>,
    pub content: Arc<ContentCache>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub events: Arc<BroadcastEvents>,
    pub manager: Arc<SyncManager>,
}

impl Services {
    pub async fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config.store.database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create data directory")?;
        }

        let store = Arc::new(
            SqliteLocalStore::open(&config.store.database_path)
                .await
                .context("Failed to open local store")?,
        );
        debug!(path = %config.store.database_path.display(), "Local store opened");

        let cache_store = Arc::new(
            CacheStore::open(&config.content_cache.dir)
                .await
                .context("Failed to open content cache")?,
        );
        debug!(dir = %config.content_cache.dir.display(), "Content cache opened");

        let client = Arc::new(
            RemoteClient::new(&config.remote).context("Failed to create remote client")?,
        );
        let events = Arc::new(BroadcastEvents::new(EVENT_CAPACITY));
        let connectivity = Arc::new(ConnectivityMonitor::new(true));

        let content = Arc::new(ContentCache::from_config(
            cache_store.clone(),
            Arc::new(HttpFetcher::new(client.clone())),
            events.clone(),
            &config.content_cache,
        ));

        let manager = Arc::new(SyncManager::new(
            store.clone(),
            Arc::new(HttpRemoteAuthority::new(client.clone())),
            Some(content.clone()),
            connectivity.clone(),
            events.clone(),
            RetryPolicy::from_config(&config.sync),
        ));

        info!(remote = %config.remote.base_url, "Services ready");

        Ok(Self {
            config: config.clone(),
            store,
            cache_store,
            client,
            content,
            connectivity,
            events,
            manager,
        })
    }

    /// Interception layer over the shared cache
    ///
    /// With a `trigger`, the layer relays sync signals to the scheduler.
    pub fn intercept_layer(&self, trigger: Option<SyncTrigger>) -> Result<InterceptLayer> {
        let origin = Url::parse(&self.config.remote.base_url)
            .context("remote.base_url is not a valid URL")?;
        let layer = InterceptLayer::new(
            origin,
            self.cache_store.clone(),
            self.content.clone(),
            Arc::new(HttpFetcher::new(self.client.clone())),
            self.config.intercept.clone(),
        );
        Ok(match trigger {
            Some(trigger) => {
                layer.with_sync(SyncBridge::new(trigger, self.manager.activity().clone()))
            }
            None => layer,
        })
    }

    pub async fn close(&self) {
        self.store.close().await;
        self.cache_store.close().await;
        debug!("Services closed");
    }
}
