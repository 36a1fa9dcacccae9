//! ContentCache behavior against an on-disk CacheStore and a scripted fetcher

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use meddir_content::{CacheStore, ContentCache, EvictionPolicy};
use meddir_core::{
    domain::{
        EngineError, EngineResult, EntityDraft, EntityId, EntityKind, EntityRecord, RemoteId,
    },
    ports::{EngineEvent, FetchResponse, IContentFetcher, IEventSink, ILocalStore},
};
use meddir_store::SqliteLocalStore;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Semaphore;

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct ScriptedFetcher {
    responses: HashMap<String, FetchResponse>,
    calls: Mutex<Vec<String>>,
    /// When set, every fetch waits for a permit
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedFetcher {
    fn with(mut self, url: &str, size: usize) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResponse {
                status: 200,
                content_type: Some("application/pdf".into()),
                body: vec![7; size],
            },
        );
        self
    }

    fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchResponse {
                status,
                content_type: None,
                body: Vec::new(),
            },
        );
        self
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IContentFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> EngineResult<FetchResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| EngineError::Network(format!("connection refused: {}", url)))
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl IEventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    cache: Arc<ContentCache>,
    fetcher: Arc<ScriptedFetcher>,
    sink: Arc<RecordingSink>,
    _dir: TempDir,
}

async fn harness(fetcher: ScriptedFetcher, policy: EvictionPolicy) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CacheStore::open(dir.path()).await.unwrap());
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(RecordingSink::default());
    let cache = Arc::new(ContentCache::new(
        store,
        fetcher.clone(),
        sink.clone(),
        policy,
        Duration::ZERO,
    ));
    Harness {
        cache,
        fetcher,
        sink,
        _dir: dir,
    }
}

fn document_with_file(id: i64, folder: i64, url: &str) -> EntityRecord {
    EntityRecord::authoritative(
        EntityKind::Document,
        RemoteId::from(id).into(),
        Some(RemoteId::from(folder).into()),
        json!({"title": format!("doc {}", id)})
            .as_object()
            .cloned()
            .unwrap(),
        Some(url.to_string()),
    )
}

// ============================================================================
// Single-entry operations
// ============================================================================

#[tokio::test]
async fn fetch_stores_payload() {
    let h = harness(
        ScriptedFetcher::default().with("/files/1.pdf", 64),
        EvictionPolicy::new(1000, 80),
    )
    .await;

    assert!(!h.cache.has("/files/1.pdf").await);
    assert!(h.cache.fetch("/files/1.pdf").await);
    assert!(h.cache.has("/files/1.pdf").await);

    let hit = h.cache.get("/files/1.pdf").await.unwrap();
    assert_eq!(hit.bytes.len(), 64);
    assert_eq!(hit.entry.content_type.as_deref(), Some("application/pdf"));

    let info = h.cache.size_info().await.unwrap();
    assert_eq!(info.count, 1);
    assert_eq!(info.total_bytes, 64);
}

#[tokio::test]
async fn fetch_failures_degrade_to_miss() {
    let h = harness(
        ScriptedFetcher::default().with_status("/files/gone.pdf", 404),
        EvictionPolicy::new(1000, 80),
    )
    .await;

    assert!(!h.cache.fetch("/files/gone.pdf").await);
    assert!(!h.cache.fetch("/files/unreachable.pdf").await);
    assert_eq!(h.cache.size_info().await.unwrap().count, 0);
}

#[tokio::test]
async fn payload_larger_than_ceiling_is_rejected() {
    let h = harness(
        ScriptedFetcher::default().with("/files/huge.pdf", 2000),
        EvictionPolicy::new(1000, 80),
    )
    .await;

    let err = h.cache.insert("/files/huge.pdf", &[0; 2000], None).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::QuotaExceeded {
            requested: 2000,
            ceiling: 1000
        }
    );
    assert!(!h.cache.fetch("/files/huge.pdf").await);
    assert!(!h.cache.has("/files/huge.pdf").await);
}

#[tokio::test]
async fn remove_and_clear() {
    let h = harness(ScriptedFetcher::default(), EvictionPolicy::new(1000, 80)).await;
    h.cache.insert("/a", &[1; 10], None).await.unwrap();
    h.cache.insert("/b", &[1; 10], None).await.unwrap();

    assert!(h.cache.remove("/a").await);
    assert!(!h.cache.remove("/a").await);
    assert_eq!(h.cache.clear().await.unwrap(), 1);
    assert_eq!(h.cache.size_info().await.unwrap().total_bytes, 0);
}

// ============================================================================
// Eviction
// ============================================================================

#[tokio::test]
async fn insert_over_ceiling_evicts_largest_to_target() {
    let h = harness(ScriptedFetcher::default(), EvictionPolicy::new(1000, 80)).await;
    h.cache.insert("/small", &[0; 100], None).await.unwrap();
    h.cache.insert("/large", &[0; 600], None).await.unwrap();

    let report = h.cache.insert("/medium", &[0; 350], None).await.unwrap();
    assert_eq!(report.evicted, vec!["/large"]);
    assert_eq!(report.bytes_freed, 600);

    let info = h.cache.size_info().await.unwrap();
    assert_eq!(info.total_bytes, 450);
    assert!(h.cache.has("/small").await);
    assert!(h.cache.has("/medium").await);
}

#[tokio::test]
async fn priming_past_ceiling_ends_at_or_below_target() {
    let fetcher = ScriptedFetcher::default()
        .with("/f/500", 500)
        .with("/f/400", 400)
        .with("/f/300", 300)
        .with("/f/200", 200);
    let h = harness(fetcher, EvictionPolicy::new(1000, 80)).await;

    let records = vec![
        document_with_file(1, 10, "/f/500"),
        document_with_file(2, 10, "/f/400"),
        document_with_file(3, 10, "/f/300"),
        document_with_file(4, 10, "/f/200"),
    ];
    let report = h.cache.sync_many(&records).await;

    assert_eq!(report.cached, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(report.eviction.evicted, vec!["/f/500", "/f/400"]);

    let info = h.cache.size_info().await.unwrap();
    assert!(info.total_bytes <= 800, "total {} above target", info.total_bytes);
    assert!(h.cache.has("/f/300").await);
    assert!(h.cache.has("/f/200").await);
}

// ============================================================================
// Priming queue
// ============================================================================

#[tokio::test]
async fn sync_many_skips_cached_and_duplicate_urls() {
    let fetcher = ScriptedFetcher::default().with("/f/1", 10).with("/f/2", 10);
    let h = harness(fetcher, EvictionPolicy::new(1000, 80)).await;
    h.cache.insert("/f/1", &[0; 10], None).await.unwrap();

    let mut folder = document_with_file(9, 10, "/unused");
    folder.kind = EntityKind::Folder;
    folder.file_url = None;

    let records = vec![
        document_with_file(1, 10, "/f/1"),
        document_with_file(2, 10, "/f/2"),
        document_with_file(3, 10, "/f/2"),
        folder,
    ];
    let report = h.cache.sync_many(&records).await;

    assert_eq!(report.cached, 1);
    assert_eq!(h.fetcher.calls(), vec!["/f/2"]);
}

#[tokio::test]
async fn priming_emits_lifecycle_events() {
    let fetcher = ScriptedFetcher::default().with("/f/ok", 10);
    let h = harness(fetcher, EvictionPolicy::new(1000, 80)).await;

    let records = vec![
        document_with_file(1, 10, "/f/ok"),
        document_with_file(2, 10, "/f/missing"),
    ];
    h.cache.sync_many(&records).await;

    assert_eq!(
        h.sink.events(),
        vec![
            EngineEvent::CacheStarted { count: 2 },
            EngineEvent::CacheProgress {
                cached: 1,
                failed: 0,
                remaining: 1
            },
            EngineEvent::CacheProgress {
                cached: 1,
                failed: 1,
                remaining: 0
            },
            EngineEvent::CacheCompleted {
                cached: 1,
                failed: 1
            },
        ]
    );
}

#[tokio::test]
async fn empty_queue_emits_nothing() {
    let h = harness(ScriptedFetcher::default(), EvictionPolicy::new(1000, 80)).await;
    let report = h.cache.process_queue().await;
    assert_eq!(report.cached, 0);
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn schedule_drains_in_background() {
    let fetcher = ScriptedFetcher::default().with("/f/1", 10).with("/f/2", 20);
    let h = harness(fetcher, EvictionPolicy::new(1000, 80)).await;

    let report = h
        .cache
        .schedule(vec!["/f/1".into(), "/f/2".into()])
        .await
        .unwrap();

    assert_eq!(report.cached, 2);
    assert_eq!(h.cache.queued().await, 0);
    assert_eq!(h.cache.size_info().await.unwrap().total_bytes, 30);
}

#[tokio::test]
async fn concurrent_drain_waits_for_running_worker() {
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = ScriptedFetcher::default()
        .with("/f/1", 10)
        .with("/f/2", 20)
        .gated(gate.clone());
    let h = harness(fetcher, EvictionPolicy::new(1000, 80)).await;

    let first = h.cache.schedule(vec!["/f/1".into()]);
    for _ in 0..100 {
        if !h.fetcher.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.fetcher.calls(), vec!["/f/1".to_string()]);

    let second = h.cache.schedule(vec!["/f/2".into()]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!second.is_finished());

    gate.add_permits(2);
    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_eq!(first.cached + second.cached, 2);
    assert_eq!(h.cache.queued().await, 0);
    assert!(h.cache.has("/f/1").await);
    assert!(h.cache.has("/f/2").await);
}

// ============================================================================
// Preloading from the Local Store
// ============================================================================

#[tokio::test]
async fn preload_folder_and_all() {
    let fetcher = ScriptedFetcher::default()
        .with("/f/a", 10)
        .with("/f/b", 10)
        .with("/f/c", 10);
    let h = harness(fetcher, EvictionPolicy::new(1000, 80)).await;

    let store = SqliteLocalStore::in_memory().await.unwrap();
    let folder_a: EntityId = RemoteId::from(1).into();
    let folder_b: EntityId = RemoteId::from(2).into();
    store.put(&document_with_file(11, 1, "/f/a")).await.unwrap();
    store.put(&document_with_file(12, 1, "/f/b")).await.unwrap();
    store.put(&document_with_file(21, 2, "/f/c")).await.unwrap();
    // Unsynced drafts have no file URL and are ignored
    store
        .save_offline(
            EntityDraft::document(folder_b.clone(), Default::default()),
            None,
        )
        .await
        .unwrap();

    let report = h.cache.preload_folder(&store, &folder_a).await.unwrap();
    assert_eq!(report.cached, 2);
    assert!(!h.cache.has("/f/c").await);

    let report = h.cache.preload_all(&store).await.unwrap();
    assert_eq!(report.cached, 1);
    assert!(h.cache.has("/f/c").await);
}
