//! Raw payload fetches through HttpFetcher

use std::sync::Arc;

use meddir_core::ports::IContentFetcher;
use meddir_remote::HttpFetcher;
use wiremock::{
    matchers::{header, method, path},
    Mock, ResponseTemplate,
};

use crate::common::{self, AUTH_HEADER, AUTH_TOKEN};

#[tokio::test]
async fn test_fetch_relative_url_with_auth() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/blobs/10.pdf"))
        .and(header(AUTH_HEADER, AUTH_TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"%PDF-1.4".to_vec())
                .append_header("Content-Type", "application/pdf"),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Arc::new(client));
    let response = fetcher.fetch("/blobs/10.pdf").await.unwrap();
    assert!(response.is_success());
    assert_eq!(response.body, b"%PDF-1.4");
    assert_eq!(response.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn test_fetch_returns_error_statuses() {
    let (server, client) = common::setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/blobs/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Arc::new(client));
    let response = fetcher.fetch("/blobs/missing.pdf").await.unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}
