//! HTTP-level tests for the managed backend adapter using a mock server

use mockito::Matcher;
use photobundle::adapters::supabase::SupabaseClient;
use photobundle::adapters::{CatalogLookup, ObjectReader};
use photobundle::config::{secret_string, RetryConfig, StorageConfig};
use photobundle::core::archive::read_archive;
use photobundle::core::export::{ExportOrchestrator, ExportSettings, FailureReason};
use photobundle::domain::{CatalogError, ObjectReadError, PageRequest, PhotoId, StorageKey};
use std::sync::Arc;

fn client(base_url: &str) -> SupabaseClient {
    SupabaseClient::new(&StorageConfig {
        base_url: base_url.to_string(),
        api_key: secret_string("service-key".to_string()),
        bucket: "photos".to_string(),
        table: "photos".to_string(),
        timeout_seconds: 5,
        connect_timeout_seconds: 5,
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
    })
    .unwrap()
}

fn id(raw: &str) -> PhotoId {
    PhotoId::new(raw).unwrap()
}

#[tokio::test]
async fn test_resolve_maps_rows_to_records() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        r#"[
            {{"id": 1, "file_name": "first dance.jpg", "file_url": "{0}/storage/v1/object/public/photos/events/1%20a.jpg", "created_at": "2024-09-14T18:30:00+00:00"}},
            {{"id": 2, "file_name": "cake.jpg", "file_url": "{0}/storage/v1/object/public/photos/events/2.jpg?token=abc", "created_at": null}}
        ]"#,
        server.url()
    );
    let mock = server
        .mock("GET", "/rest/v1/photos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), "in.(1,2,3)".into()),
            Matcher::UrlEncoded("select".into(), "id,file_name,file_url,created_at".into()),
        ]))
        .match_header("apikey", "service-key")
        .match_header("authorization", "Bearer service-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let records = client(&server.url())
        .resolve(&[id("1"), id("2"), id("3")])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, id("1"));
    assert_eq!(records[0].display_name, "first dance.jpg");
    assert_eq!(records[0].storage_key.as_str(), "events/1 a.jpg");
    assert_eq!(records[1].storage_key.as_str(), "events/2.jpg");
}

#[tokio::test]
async fn test_resolve_retries_then_reports_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/v1/photos")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("upstream down")
        .expect(2)
        .create_async()
        .await;

    let err = client(&server.url()).resolve(&[id("1")]).await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, CatalogError::Unavailable(_)));
}

#[tokio::test]
async fn test_resolve_rejects_malformed_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/rest/v1/photos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"message": "not a list"}"#)
        .create_async()
        .await;

    let err = client(&server.url()).resolve(&[id("1")]).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_list_requests_newest_page_with_exact_count() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        r#"[
            {{"id": 57, "file_name": "latest.jpg", "file_url": "{0}/storage/v1/object/public/photos/57.jpg", "created_at": "2024-09-14T23:59:00Z"}},
            {{"id": 56, "file_name": "earlier.jpg", "file_url": "{0}/storage/v1/object/public/photos/56.jpg", "created_at": "2024-09-14T23:58:00Z"}}
        ]"#,
        server.url()
    );
    let mock = server
        .mock("GET", "/rest/v1/photos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("select".into(), "id,file_name,file_url,created_at".into()),
            Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
        ]))
        .match_header("range-unit", "items")
        .match_header("range", "20-39")
        .match_header("prefer", "count=exact")
        .match_header("apikey", "service-key")
        .with_status(206)
        .with_header("content-range", "20-21/57")
        .with_body(body)
        .create_async()
        .await;

    let page = client(&server.url())
        .list(PageRequest::new(Some(2), Some(20)))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(page.total, 57);
    assert_eq!(page.page, 2);
    assert!(page.has_more);
    assert_eq!(page.photos.len(), 2);
    assert_eq!(page.photos[0].display_name, "latest.jpg");
    assert_eq!(page.photos[1].storage_key.as_str(), "56.jpg");
}

#[tokio::test]
async fn test_list_past_the_end_is_empty() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/rest/v1/photos")
        .match_query(Matcher::Any)
        .match_header("range", "100-149")
        .with_status(416)
        .with_header("content-range", "*/57")
        .create_async()
        .await;

    let page = client(&server.url())
        .list(PageRequest::new(Some(3), Some(50)))
        .await
        .unwrap();

    assert!(page.photos.is_empty());
    assert_eq!(page.total, 57);
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_list_without_count_is_invalid() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/rest/v1/photos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let err = client(&server.url())
        .list(PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_read_returns_object_bytes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/storage/v1/object/photos/events/7.jpg")
        .match_header("authorization", "Bearer service-key")
        .with_status(200)
        .with_body(b"\xff\xd8jpeg")
        .create_async()
        .await;

    let data = client(&server.url())
        .read(&StorageKey::new("events/7.jpg").unwrap())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(&data[..], b"\xff\xd8jpeg");
}

#[tokio::test]
async fn test_read_classifies_missing_objects() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/storage/v1/object/photos/gone.jpg")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/storage/v1/object/photos/also-gone.jpg")
        .with_status(400)
        .with_body(r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#)
        .create_async()
        .await;

    let client = client(&server.url());
    let gone = client.read(&StorageKey::new("gone.jpg").unwrap()).await;
    let also_gone = client.read(&StorageKey::new("also-gone.jpg").unwrap()).await;

    assert!(matches!(gone, Err(ObjectReadError::NotFound(_))));
    assert!(matches!(also_gone, Err(ObjectReadError::NotFound(_))));
}

#[tokio::test]
async fn test_read_server_error_is_io() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/storage/v1/object/photos/broken.jpg")
        .with_status(500)
        .with_body("internal")
        .create_async()
        .await;

    let err = client(&server.url())
        .read(&StorageKey::new("broken.jpg").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, ObjectReadError::Io(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_export_over_http_backend() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        r#"[
            {{"id": 1, "file_name": "a.jpg", "file_url": "{0}/storage/v1/object/public/photos/a.jpg", "created_at": "2024-09-14T18:30:00Z"}},
            {{"id": 2, "file_name": "b.jpg", "file_url": "{0}/storage/v1/object/public/photos/b.jpg", "created_at": "2024-09-14T18:31:00Z"}}
        ]"#,
        server.url()
    );
    server
        .mock("GET", "/rest/v1/photos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;
    server
        .mock("GET", "/storage/v1/object/photos/a.jpg")
        .with_status(200)
        .with_body("first")
        .create_async()
        .await;
    server
        .mock("GET", "/storage/v1/object/photos/b.jpg")
        .with_status(404)
        .create_async()
        .await;

    let client = Arc::new(client(&server.url()));
    let orchestrator = ExportOrchestrator::new(client.clone(), client, ExportSettings::default());

    let mut sink = Vec::new();
    let summary = orchestrator
        .export(&[id("1"), id("2"), id("3")], &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.succeeded_count, 1);
    assert_eq!(summary.failed_count, 2);
    assert_eq!(summary.failures[0].photo_id, id("2"));
    assert_eq!(summary.failures[0].reason, FailureReason::NotFound);
    assert_eq!(summary.failures[1].reason, FailureReason::NotInCatalog);

    let entries = read_archive(&sink).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "a.jpg");
    assert_eq!(entries[0].data, b"first");
}
