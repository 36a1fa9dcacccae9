//! SyncManager cycles against an in-memory store and a mock authority

mod common;

use std::{sync::Arc, time::Duration};

use common::{
    attrs, harness, mount_documents, mount_folders, mutations, remote, synced_document,
    synced_folder,
};
use meddir_content::{CacheStore, ContentCache, EvictionPolicy};
use meddir_core::{
    domain::{EngineError, EntityDraft, EntityKind, IndexQuery, RetainedFile, SyncState},
    ports::{IConnectivity, ILocalStore, NullEventSink},
};
use meddir_remote::{HttpFetcher, HttpRemoteAuthority, RemoteClient};
use meddir_sync::{ConnectivityMonitor, CycleOutcome, RetryPolicy, SkipReason, SyncManager};
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, ResponseTemplate,
};

// ============================================================================
// Guards
// ============================================================================

#[tokio::test]
async fn offline_cycle_is_skipped_without_network() {
    let h = harness().await;
    h.monitor.set_online(false);
    assert!(!h.monitor.is_online());

    let outcome = h.manager.cycle().await;
    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::Offline));
    assert!(h.server.received_requests().await.unwrap().is_empty());
    assert!(h.sink.events().is_empty());
    assert_eq!(h.manager.activity().state(), SyncState::Idle);
}

#[tokio::test]
async fn concurrent_cycle_requests_coalesce() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/folders.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"folders": []}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (first, second) = tokio::join!(h.manager.cycle(), h.manager.cycle());

    assert!(first.is_completed());
    assert_eq!(second, CycleOutcome::Skipped(SkipReason::AlreadyRunning));
    assert_eq!(h.sink.names(), vec!["sync-started", "sync-completed"]);
}

// ============================================================================
// Push
// ============================================================================

#[tokio::test]
async fn create_then_delete_offline_makes_no_mutation_calls() {
    let h = harness().await;
    mount_folders(&h.server, json!([])).await;

    let folder = h
        .store
        .save_offline(EntityDraft::folder(attrs(json!({"name": "Tmp"}))), None)
        .await
        .unwrap();
    h.store
        .delete_offline(EntityKind::Folder, &folder.id)
        .await
        .unwrap();

    let outcome = h.manager.cycle().await;
    let report = outcome.report().unwrap();
    assert!(outcome.is_completed());
    assert_eq!(report.pushed, 0);
    assert!(mutations(&h.server).await.is_empty());
    assert!(h.store.get(EntityKind::Folder, &folder.id).await.unwrap().is_none());
}

#[tokio::test]
async fn offline_folder_and_document_are_remapped() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 10, "name": "Cardiology"})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/folders/10/documents.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 20,
            "medical_folder_id": 10,
            "title": "ECG"
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_folders(&h.server, json!([{"id": 10, "name": "Cardiology"}])).await;
    mount_documents(
        &h.server,
        10,
        json!([{"id": 20, "medical_folder_id": 10, "title": "ECG"}]),
    )
    .await;

    let folder = h
        .store
        .save_offline(EntityDraft::folder(attrs(json!({"name": "Cardiology"}))), None)
        .await
        .unwrap();
    let document = h
        .store
        .save_offline(
            EntityDraft::document(folder.id.clone(), attrs(json!({"title": "ECG"}))),
            None,
        )
        .await
        .unwrap();

    let outcome = h.manager.cycle().await;
    assert!(outcome.is_completed(), "{outcome:?}");
    assert_eq!(outcome.report().unwrap().pushed, 2);

    let synced = h
        .store
        .get(EntityKind::Document, &remote(20))
        .await
        .unwrap()
        .expect("document remapped");
    assert_eq!(synced.parent_folder_id, Some(remote(10)));
    assert!(synced.synced);
    assert!(!synced.created_offline);

    assert!(h.store.get(EntityKind::Folder, &folder.id).await.unwrap().is_none());
    assert!(h.store.get(EntityKind::Document, &document.id).await.unwrap().is_none());
    assert_eq!(h.store.pending_count().await.unwrap(), 0);
    assert!(h.store.last_sync_time().await.unwrap().is_some());
}

#[tokio::test]
async fn document_with_file_is_uploaded_as_multipart() {
    let h = harness().await;
    h.store.put(&synced_folder(3, "Lab")).await.unwrap();
    Mock::given(method("POST"))
        .and(path("/folders/3/documents.json"))
        .and(body_string_contains("name=\"document[file]\""))
        .and(body_string_contains("name=\"document[title]\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 30,
            "medicalFolderId": 3,
            "fileUrl": "/blobs/30/scan.pdf"
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_folders(&h.server, json!([{"id": 3, "name": "Lab"}])).await;
    mount_documents(
        &h.server,
        3,
        json!([{"id": 30, "medicalFolderId": 3, "title": "Scan", "fileUrl": "/blobs/30/scan.pdf"}]),
    )
    .await;

    let file = RetainedFile::new("scan.pdf", "application/pdf", b"%PDF-1.4".to_vec());
    h.store
        .save_offline(
            EntityDraft::document(remote(3), attrs(json!({"title": "Scan"}))),
            Some(file),
        )
        .await
        .unwrap();

    assert!(h.manager.cycle().await.is_completed());

    let synced = h
        .store
        .get(EntityKind::Document, &remote(30))
        .await
        .unwrap()
        .unwrap();
    assert!(synced.file.is_none());
    assert_eq!(synced.file_url.as_deref(), Some("/blobs/30/scan.pdf"));
}

#[tokio::test]
async fn failing_operation_is_retired_after_three_cycles() {
    let h = harness().await;
    h.store.put(&synced_folder(5, "Dental")).await.unwrap();
    h.store
        .update_offline(EntityKind::Folder, &remote(5), &attrs(json!({"name": "Teeth"})))
        .await
        .unwrap();

    Mock::given(method("PATCH"))
        .and(path("/folders/5.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 11, "name": "New"})))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_folders(&h.server, json!([{"id": 5, "name": "Dental"}])).await;
    mount_documents(&h.server, 5, json!([])).await;

    for cycle in 1..=3 {
        let outcome = h.manager.cycle().await;
        let report = outcome.report().unwrap();
        assert!(outcome.is_completed(), "cycle {cycle}: {outcome:?}");
        assert_eq!(report.push_failed, 1, "cycle {cycle}");
    }

    let ops = h.store.pending_operations().await.unwrap();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].failed);
    assert_eq!(ops[0].attempts, 3);
    assert!(ops[0].error.as_deref().unwrap().contains("status 500"));

    // Unrelated work still flows on the fourth cycle
    h.store
        .save_offline(EntityDraft::folder(attrs(json!({"name": "New"}))), None)
        .await
        .unwrap();
    let outcome = h.manager.cycle().await;
    let report = outcome.report().unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.push_failed, 0);
    assert_eq!(report.skipped, 1);

    // Local edit survives pulls while its update is parked
    let folder = h.store.get(EntityKind::Folder, &remote(5)).await.unwrap().unwrap();
    assert_eq!(folder.attributes["name"], "Teeth");

    let status = h.manager.status().await.unwrap();
    assert_eq!(status.storage_counts.failed, 1);

    assert_eq!(h.manager.retry_failed().await.unwrap(), 1);
    let ops = h.store.pending_operations().await.unwrap();
    assert!(!ops[0].failed);
    assert_eq!(ops[0].attempts, 0);
}

#[tokio::test]
async fn document_under_unresolved_parent_fails_cleanly() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid"))
        .mount(&h.server)
        .await;
    mount_folders(&h.server, json!([])).await;

    let folder = h
        .store
        .save_offline(EntityDraft::folder(attrs(json!({"name": ""}))), None)
        .await
        .unwrap();
    let document = h
        .store
        .save_offline(
            EntityDraft::document(folder.id.clone(), attrs(json!({"title": "Orphan"}))),
            None,
        )
        .await
        .unwrap();

    let outcome = h.manager.cycle().await;
    let report = outcome.report().unwrap();
    assert_eq!(report.push_failed, 2);
    assert!(report.errors[1].contains("has not been synchronized yet"));

    // Both records and both operations are intact
    assert!(h.store.get(EntityKind::Folder, &folder.id).await.unwrap().is_some());
    assert!(h.store.get(EntityKind::Document, &document.id).await.unwrap().is_some());
    assert_eq!(h.store.pending_count().await.unwrap(), 2);
}

#[tokio::test]
async fn accepted_update_is_refreshed_by_later_pulls() {
    let h = harness().await;
    h.store.put(&synced_folder(5, "Dental")).await.unwrap();
    h.store
        .update_offline(EntityKind::Folder, &remote(5), &attrs(json!({"name": "Teeth"})))
        .await
        .unwrap();

    Mock::given(method("PATCH"))
        .and(path("/folders/5.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "name": "Teeth"})))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_folders(&h.server, json!([{"id": 5, "name": "Renamed by server"}])).await;
    mount_documents(&h.server, 5, json!([])).await;

    let outcome = h.manager.cycle().await;
    assert!(outcome.is_completed(), "{outcome:?}");
    let report = outcome.report().unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.pulled_folders, 1);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);

    let folder = h.store.get(EntityKind::Folder, &remote(5)).await.unwrap().unwrap();
    assert!(folder.synced);
    assert_eq!(folder.attributes["name"], "Renamed by server");

    let dirty = h
        .store
        .query_by_index(EntityKind::Folder, &IndexQuery::Synced(false))
        .await
        .unwrap();
    assert!(dirty.is_empty());

    // Nothing left to push on the next cycle
    let outcome = h.manager.cycle().await;
    assert_eq!(outcome.report().unwrap().pushed, 0);
}

#[tokio::test]
async fn delete_answered_with_404_is_acknowledged() {
    let h = harness().await;
    h.store.put(&synced_folder(7, "Archive")).await.unwrap();
    h.store
        .delete_offline(EntityKind::Folder, &remote(7))
        .await
        .unwrap();

    Mock::given(method("DELETE"))
        .and(path("/folders/7.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_folders(&h.server, json!([])).await;

    let outcome = h.manager.cycle().await;
    assert!(outcome.is_completed(), "{outcome:?}");
    let report = outcome.report().unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.push_failed, 0);
    assert_eq!(h.store.pending_count().await.unwrap(), 0);
    assert!(h.store.get(EntityKind::Folder, &remote(7)).await.unwrap().is_none());
}

// ============================================================================
// Pull
// ============================================================================

#[tokio::test]
async fn pull_overwrites_synced_and_leaves_offline_records() {
    let h = harness().await;
    h.store.put(&synced_folder(1, "Old name")).await.unwrap();
    h.store.put(&synced_folder(2, "Gone remotely")).await.unwrap();
    h.store.put(&synced_document(21, 2, "Gone too")).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    mount_folders(&h.server, json!([{"id": 1, "name": "New name"}])).await;
    mount_documents(&h.server, 1, json!([{"id": 11, "medical_folder_id": 1, "title": "Fresh"}])).await;

    let offline = h
        .store
        .save_offline(EntityDraft::folder(attrs(json!({"name": "Draft"}))), None)
        .await
        .unwrap();

    let outcome = h.manager.cycle().await;
    assert!(outcome.is_completed());
    let report = outcome.report().unwrap();
    assert_eq!(report.pulled_folders, 1);
    assert_eq!(report.pulled_documents, 1);
    assert_eq!(report.pruned, 2);

    let folder = h.store.get(EntityKind::Folder, &remote(1)).await.unwrap().unwrap();
    assert_eq!(folder.attributes["name"], "New name");
    assert!(h.store.get(EntityKind::Folder, &remote(2)).await.unwrap().is_none());
    assert!(h.store.get(EntityKind::Document, &remote(21)).await.unwrap().is_none());

    let kept = h.store.get(EntityKind::Folder, &offline.id).await.unwrap().unwrap();
    assert_eq!(kept.attributes["name"], "Draft");
    assert!(kept.created_offline);
    assert!(!kept.synced);
    assert_eq!(h.store.pending_count().await.unwrap(), 1);

    let children = h
        .store
        .query_by_index(EntityKind::Document, &IndexQuery::ParentFolder(remote(1)))
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
}

#[tokio::test]
async fn pull_failure_fails_cycle_and_keeps_pulled_data() {
    let h = harness().await;
    mount_folders(&h.server, json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}])).await;
    mount_documents(&h.server, 1, json!([{"id": 10, "medical_folder_id": 1, "title": "x"}])).await;
    Mock::given(method("GET"))
        .and(path("/folders/2/documents.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let outcome = h.manager.cycle().await;
    match &outcome {
        CycleOutcome::Failed { error, report } => {
            assert!(matches!(error, EngineError::RemoteRejected { status: 500, .. }));
            assert_eq!(report.pulled_folders, 2);
            assert_eq!(report.pulled_documents, 1);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    assert!(h.store.get(EntityKind::Document, &remote(10)).await.unwrap().is_some());
    assert!(h.store.last_sync_time().await.unwrap().is_none());
    assert_eq!(h.sink.names(), vec!["sync-started", "sync-failed"]);
    assert_eq!(h.manager.activity().state(), SyncState::Idle);
}

// ============================================================================
// Full resync and status
// ============================================================================

#[tokio::test]
async fn full_resync_discards_local_state() {
    let h = harness().await;
    h.store.put(&synced_folder(9, "Stale")).await.unwrap();
    h.store
        .save_offline(EntityDraft::folder(attrs(json!({"name": "Unpushed"}))), None)
        .await
        .unwrap();
    mount_folders(&h.server, json!([{"id": 1, "name": "Fresh"}])).await;
    mount_documents(&h.server, 1, json!([])).await;

    let outcome = h.manager.full_resync().await;
    assert!(outcome.is_completed());
    assert!(mutations(&h.server).await.is_empty());

    let status = h.manager.status().await.unwrap();
    assert_eq!(status.storage_counts.folders, 1);
    assert_eq!(status.pending_count, 0);
    assert!(status.last_sync_time.is_some());
    assert!(status.is_online);
    assert!(!status.is_syncing);
}

#[tokio::test]
async fn full_resync_offline_keeps_local_data() {
    let h = harness().await;
    h.store.put(&synced_folder(9, "Keep")).await.unwrap();
    h.monitor.set_online(false);

    assert_eq!(
        h.manager.full_resync().await,
        CycleOutcome::Skipped(SkipReason::Offline)
    );
    assert!(h.store.get(EntityKind::Folder, &remote(9)).await.unwrap().is_some());
}

#[tokio::test]
async fn pull_primes_content_cache() {
    let h = harness().await;
    mount_folders(&h.server, json!([{"id": 1, "name": "A"}])).await;
    mount_documents(
        &h.server,
        1,
        json!([{"id": 10, "medical_folder_id": 1, "file_url": "/blobs/10.pdf"}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/blobs/10.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .mount(&h.server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = Arc::new(RemoteClient::with_base_url(h.server.uri(), None));
    let cache = Arc::new(ContentCache::new(
        Arc::new(CacheStore::open(dir.path()).await.unwrap()),
        Arc::new(HttpFetcher::new(client.clone())),
        Arc::new(NullEventSink),
        EvictionPolicy::new(1024 * 1024, 80),
        Duration::ZERO,
    ));
    let manager = SyncManager::new(
        h.store.clone(),
        Arc::new(HttpRemoteAuthority::new(client)),
        Some(cache.clone()),
        Arc::new(ConnectivityMonitor::new(true)),
        Arc::new(NullEventSink),
        RetryPolicy::default(),
    );

    assert!(manager.cycle().await.is_completed());

    let priming = manager.wait_for_priming().await.expect("priming started");
    assert_eq!(priming.cached, 1);
    assert!(cache.has("/blobs/10.pdf").await);
    assert!(manager.wait_for_priming().await.is_none());
}
