//! Shared harness: in-memory Local Store, wiremock authority, recording sink

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use meddir_core::{
    domain::{Attributes, EntityId, EntityKind, EntityRecord, RemoteId},
    ports::{EngineEvent, IEventSink},
};
use meddir_remote::{HttpRemoteAuthority, RemoteClient};
use meddir_store::SqliteLocalStore;
use meddir_sync::{ConnectivityMonitor, RetryPolicy, SyncManager};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl IEventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<SqliteLocalStore>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub sink: Arc<RecordingSink>,
    pub manager: Arc<SyncManager>,
}

pub async fn harness() -> Harness {
    harness_with_policy(RetryPolicy::new(3)).await
}

pub async fn harness_with_policy(policy: RetryPolicy) -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(SqliteLocalStore::in_memory().await.unwrap());
    let monitor = Arc::new(ConnectivityMonitor::new(true));
    let sink = Arc::new(RecordingSink::default());
    let remote = HttpRemoteAuthority::new(Arc::new(RemoteClient::with_base_url(server.uri(), None)));

    let manager = Arc::new(SyncManager::new(
        store.clone(),
        Arc::new(remote),
        None,
        monitor.clone(),
        sink.clone(),
        policy,
    ));

    Harness {
        server,
        store,
        monitor,
        sink,
        manager,
    }
}

pub fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap_or_default()
}

pub fn remote(id: i64) -> EntityId {
    RemoteId::from(id).into()
}

pub fn synced_folder(id: i64, name: &str) -> EntityRecord {
    EntityRecord::authoritative(
        EntityKind::Folder,
        remote(id),
        None,
        attrs(json!({ "name": name })),
        None,
    )
}

pub fn synced_document(id: i64, folder: i64, title: &str) -> EntityRecord {
    EntityRecord::authoritative(
        EntityKind::Document,
        remote(id),
        Some(remote(folder)),
        attrs(json!({ "title": title })),
        None,
    )
}

/// Mounts `GET /folders.json`
pub async fn mount_folders(server: &MockServer, folders: Value) {
    Mock::given(method("GET"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "folders": folders,
            "syncedAt": "2026-01-15T10:00:00Z"
        })))
        .mount(server)
        .await;
}

/// Mounts `GET /folders/{id}/documents.json`
pub async fn mount_documents(server: &MockServer, folder_id: i64, documents: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/folders/{}/documents.json", folder_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": documents,
            "medicalFolderId": folder_id
        })))
        .mount(server)
        .await;
}

/// Requests other than GET received by the mock server
pub async fn mutations(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() != "GET")
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}
