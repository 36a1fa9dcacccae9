//! Folder listing and folder mutations

use meddir_core::domain::{EngineError, RemoteId};
use meddir_core::ports::IRemoteAuthority;
use meddir_remote::{HttpRemoteAuthority, RemoteError};
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, ResponseTemplate,
};

use crate::common::{self, attrs, AUTH_HEADER, AUTH_TOKEN};

#[tokio::test]
async fn test_list_folders_parses_listing() {
    let (server, client) = common::setup_remote_mock().await;
    common::mount_folder_listing(
        &server,
        json!([
            {"id": 1, "name": "Cardiology", "specialty": "heart"},
            {"id": "2", "name": "Dental", "description": null}
        ]),
    )
    .await;

    let listing = client.list_folders().await.expect("listing failed");
    assert_eq!(listing.folders.len(), 2);
    assert_eq!(listing.folders[0].id, RemoteId::from(1));
    assert_eq!(listing.folders[0].attributes["name"], "Cardiology");
    assert_eq!(listing.folders[1].id.as_str(), "2");
    assert_eq!(listing.synced_at.as_deref(), Some("2026-01-15T10:00:00Z"));
}

#[tokio::test]
async fn test_create_folder_wraps_body_and_sends_auth() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/folders.json"))
        .and(header(AUTH_HEADER, AUTH_TOKEN))
        .and(body_json(json!({"folder": {"name": "Cardiology"}})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 42, "name": "Cardiology"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let created = client
        .create_folder(&attrs(json!({"name": "Cardiology"})))
        .await
        .expect("create failed");
    assert_eq!(created.id, RemoteId::from(42));
}

#[tokio::test]
async fn test_update_folder_patches() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/folders/7.json"))
        .and(body_json(json!({"folder": {"notes": "x"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update_folder(&RemoteId::from(7), &attrs(json!({"notes": "x"})))
        .await
        .expect("update failed");
}

#[tokio::test]
async fn test_delete_folder_tolerates_not_found() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/folders/7.json"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/folders/7.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    client.delete_folder(&RemoteId::from(7)).await.expect("first delete");
    client.delete_folder(&RemoteId::from(7)).await.expect("repeat delete");
}

#[tokio::test]
async fn test_update_folder_encodes_textual_id() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/folders/a%2Fb.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let id = RemoteId::new("a/b").unwrap();
    client
        .update_folder(&id, &attrs(json!({"name": "x"})))
        .await
        .expect("update failed");
}

#[tokio::test]
async fn test_rejection_carries_status_and_body() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(422).set_body_string("name can't be blank"))
        .mount(&server)
        .await;

    let err = client.create_folder(&attrs(json!({}))).await.unwrap_err();
    match err {
        RemoteError::Rejected { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "name can't be blank");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_listing_is_invalid_response() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/folders.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    assert!(matches!(
        client.list_folders().await,
        Err(RemoteError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_authority_adapter_maps_errors() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/folders/3.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let authority = HttpRemoteAuthority::new(Arc::new(client));
    let err = authority
        .update_folder(&RemoteId::from(3), &attrs(json!({"name": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RemoteRejected { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = meddir_remote::RemoteClient::with_base_url("http://127.0.0.1:9", None);
    let authority = HttpRemoteAuthority::new(Arc::new(client));
    let err = authority.list_folders().await.unwrap_err();
    assert!(matches!(err, EngineError::Network(_)));
}
