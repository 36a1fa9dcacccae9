//! Document listing and document mutations

use meddir_core::domain::{RemoteId, RetainedFile};
use serde_json::json;
use wiremock::{
    matchers::{body_json, body_string_contains, header, method, path},
    Mock, ResponseTemplate,
};

use crate::common::{self, attrs};

#[tokio::test]
async fn test_list_documents_accepts_snake_case() {
    let (server, client) = common::setup_remote_mock().await;
    common::mount_document_listing(
        &server,
        3,
        json!([
            {"id": 10, "medical_folder_id": 3, "title": "X-ray", "file_url": "/blobs/10.pdf"},
            {"id": 11, "medicalFolderId": 3, "title": "Notes"}
        ]),
    )
    .await;

    let listing = client.list_documents(&RemoteId::from(3)).await.unwrap();
    assert_eq!(listing.folder_id, Some(RemoteId::from(3)));
    assert_eq!(listing.documents.len(), 2);
    assert_eq!(listing.documents[0].file_url.as_deref(), Some("/blobs/10.pdf"));
    assert_eq!(listing.documents[1].parent_folder_id, Some(RemoteId::from(3)));
    assert!(listing.documents[1].file_url.is_none());
}

#[tokio::test]
async fn test_create_document_json_without_file() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/folders/3/documents.json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"document": {"title": "Blood test"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 99,
            "medical_folder_id": 3,
            "title": "Blood test"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client
        .create_document(&RemoteId::from(3), &attrs(json!({"title": "Blood test"})), None)
        .await
        .unwrap();
    assert_eq!(created.id, RemoteId::from(99));
    assert_eq!(created.parent_folder_id, Some(RemoteId::from(3)));
}

#[tokio::test]
async fn test_create_document_multipart_with_file() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/folders/3/documents.json"))
        .and(body_string_contains("name=\"document[title]\""))
        .and(body_string_contains("name=\"document[file]\""))
        .and(body_string_contains("filename=\"scan.pdf\""))
        .and(body_string_contains("%PDF-1.4"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 100,
            "medicalFolderId": 3,
            "fileUrl": "/blobs/100/scan.pdf"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = RetainedFile::new("scan.pdf", "application/pdf", b"%PDF-1.4 test".to_vec());
    let created = client
        .create_document(
            &RemoteId::from(3),
            &attrs(json!({"title": "Scan", "notes": null})),
            Some(&file),
        )
        .await
        .unwrap();
    assert_eq!(created.file_url.as_deref(), Some("/blobs/100/scan.pdf"));
}

#[tokio::test]
async fn test_update_and_delete_document() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/folders/3/documents/10.json"))
        .and(body_json(json!({"document": {"notes": "follow up"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 10})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/folders/3/documents/10.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update_document(
            &RemoteId::from(3),
            &RemoteId::from(10),
            &attrs(json!({"notes": "follow up"})),
        )
        .await
        .unwrap();
    client
        .delete_document(&RemoteId::from(3), &RemoteId::from(10))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_document_paths_keep_ids_in_one_segment() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("DELETE"))
        .and(path("/folders/f%2F1/documents/doc%3F2.json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    common::mount_document_listing(&server, 9, json!([])).await;

    let folder = RemoteId::new("f/1").unwrap();
    let document = RemoteId::new("doc?2").unwrap();
    client
        .delete_document(&folder, &document)
        .await
        .expect("delete failed");

    let listing = client
        .list_documents(&RemoteId::from(9))
        .await
        .expect("listing failed");
    assert!(listing.documents.is_empty());
}
