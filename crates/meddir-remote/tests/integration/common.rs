//! Shared test helpers for remote authority integration tests
//!
//! Each helper mounts the necessary mock endpoints on a wiremock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use meddir_remote::RemoteClient;

pub const AUTH_HEADER: &str = "X-CSRF-Token";
pub const AUTH_TOKEN: &str = "test-token";

/// Starts a mock server and returns a client pointing at it with the test
/// authentication header configured.
pub async fn setup_remote_mock() -> (MockServer, RemoteClient) {
    let server = MockServer::start().await;
    let client = RemoteClient::with_base_url(
        server.uri(),
        Some((AUTH_HEADER.to_string(), AUTH_TOKEN.to_string())),
    );
    (server, client)
}

/// Mounts `GET /folders.json` returning the given folders.
pub async fn mount_folder_listing(server: &MockServer, folders: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "folders": folders,
            "syncedAt": "2026-01-15T10:00:00Z"
        })))
        .mount(server)
        .await;
}

/// Mounts `GET /folders/{id}/documents.json` returning the given documents.
pub async fn mount_document_listing(
    server: &MockServer,
    folder_id: i64,
    documents: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/folders/{}/documents.json", folder_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "documents": documents,
            "medical_folder_id": folder_id,
            "synced_at": "2026-01-15T10:00:00Z"
        })))
        .mount(server)
        .await;
}

pub fn attrs(value: serde_json::Value) -> meddir_core::domain::Attributes {
    value.as_object().cloned().unwrap_or_default()
}
