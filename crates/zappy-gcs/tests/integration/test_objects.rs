//! Integration tests for existence checks and conditional uploads

use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};
use zappy_core::domain::BackendError;
use zappy_core::ports::{IObjectStore, PutResult};

use crate::common::{self, BUCKET, PROJECT, TOKEN};

// ============================================================================
// Existence checks
// ============================================================================

#[tokio::test]
async fn test_exists_true_on_200() {
    let (server, store) = common::setup_gcs_mock().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/zappy/o/a.txt"))
        .and(query_param("fields", "name"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header("x-goog-user-project", PROJECT))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "a.txt"})))
        .expect(1)
        .mount(&server)
        .await;

    let exists = store.exists(&common::object("a.txt")).await.unwrap();
    assert!(exists);
}

#[tokio::test]
async fn test_exists_false_on_404() {
    let (server, store) = common::setup_gcs_mock().await;
    common::mount_object_status(&server, "missing.txt", 404).await;

    let exists = store.exists(&common::object("missing.txt")).await.unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn test_no_such_object_skips_bucket_check() {
    let (server, store) = common::setup_gcs_mock().await;
    common::mount_object_status(&server, "missing.txt", 404).await;
    common::mount_bucket_status(&server, 200, 0).await;

    assert!(!store.exists(&common::object("missing.txt")).await.unwrap());
}

#[tokio::test]
async fn test_missing_bucket_is_error_not_absent() {
    let (server, store) = common::setup_gcs_mock().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/zappy/o/a.txt"))
        .respond_with(common::not_found("The specified bucket does not exist."))
        .expect(1)
        .mount(&server)
        .await;
    common::mount_bucket_status(&server, 404, 0).await;

    let err = store.exists(&common::object("a.txt")).await.unwrap_err();
    assert!(matches!(err, BackendError::BucketNotFound(ref b) if b == BUCKET));
}

#[tokio::test]
async fn test_unrecognised_404_with_bucket_present_is_absent() {
    let (server, store) = common::setup_gcs_mock().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/zappy/o/a.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    common::mount_bucket_status(&server, 200, 1).await;

    assert!(!store.exists(&common::object("a.txt")).await.unwrap());
}

#[tokio::test]
async fn test_unrecognised_404_with_bucket_gone_is_error() {
    let (server, store) = common::setup_gcs_mock().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/zappy/o/a.txt"))
        .respond_with(common::not_found("Not Found"))
        .mount(&server)
        .await;
    common::mount_bucket_status(&server, 404, 1).await;

    let err = store.exists(&common::object("a.txt")).await.unwrap_err();
    assert!(matches!(err, BackendError::BucketNotFound(_)));
}

#[tokio::test]
async fn test_exists_forbidden_is_error_not_absent() {
    let (server, store) = common::setup_gcs_mock().await;
    common::mount_object_status(&server, "a.txt", 403).await;

    let err = store.exists(&common::object("a.txt")).await.unwrap_err();
    assert!(matches!(err, BackendError::Forbidden(ref m) if m == "status 403"));
}

#[tokio::test]
async fn test_exists_unauthorized_is_error() {
    let (server, store) = common::setup_gcs_mock().await;
    common::mount_object_status(&server, "a.txt", 401).await;

    let err = store.exists(&common::object("a.txt")).await.unwrap_err();
    assert!(matches!(err, BackendError::Unauthorized(_)));
}

#[tokio::test]
async fn test_exists_server_error() {
    let (server, store) = common::setup_gcs_mock().await;
    common::mount_object_status(&server, "a.txt", 503).await;

    let err = store.exists(&common::object("a.txt")).await.unwrap_err();
    assert!(matches!(err, BackendError::Server { status: 503, .. }));
}

#[tokio::test]
async fn test_no_user_project_header_without_quota_project() {
    let server = wiremock::MockServer::start().await;
    let client = zappy_gcs::client::GcsClient::with_base_url(
        std::sync::Arc::new(zappy_gcs::auth::StaticTokenProvider::new(TOKEN)),
        &server.uri(),
    )
    .unwrap();
    common::mount_object_status(&server, "a.txt", 200).await;

    assert!(client.object_exists(BUCKET, "a.txt").await.unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("x-goog-user-project"));
}

#[tokio::test]
async fn test_exists_encodes_key() {
    let (server, store) = common::setup_gcs_mock().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/zappy/o/my%20file.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "my file.txt"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store.exists(&common::object("my file.txt")).await.unwrap());
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn test_upload_streams_file_conditionally() {
    let (server, store) = common::setup_gcs_mock().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let file = tmp.path().join("c.txt");
    std::fs::write(&file, b"hello bucket").unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/upload/storage/v1/b/{BUCKET}/o")))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "c.txt"))
        .and(query_param("ifGenerationMatch", "0"))
        .and(header("x-goog-user-project", PROJECT))
        .and(body_bytes(b"hello bucket".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "c.txt"})))
        .expect(1)
        .mount(&server)
        .await;

    let result = store.upload(&common::object("c.txt"), &file).await.unwrap();
    assert_eq!(result, PutResult::Created);
}

#[tokio::test]
async fn test_upload_empty_file() {
    let (server, store) = common::setup_gcs_mock().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let file = tmp.path().join("empty.txt");
    std::fs::write(&file, b"").unwrap();
    common::mount_upload_status(&server, 200).await;

    let result = store.upload(&common::object("empty.txt"), &file).await.unwrap();
    assert_eq!(result, PutResult::Created);
}

#[tokio::test]
async fn test_upload_precondition_failed_is_already_present() {
    let (server, store) = common::setup_gcs_mock().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let file = tmp.path().join("a.txt");
    std::fs::write(&file, b"late").unwrap();
    common::mount_upload_status(&server, 412).await;

    let result = store.upload(&common::object("a.txt"), &file).await.unwrap();
    assert_eq!(result, PutResult::AlreadyPresent);
}

#[tokio::test]
async fn test_upload_missing_bucket() {
    let (server, store) = common::setup_gcs_mock().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let file = tmp.path().join("a.txt");
    std::fs::write(&file, b"data").unwrap();
    common::mount_upload_status(&server, 404).await;

    let err = store.upload(&common::object("a.txt"), &file).await.unwrap_err();
    assert!(matches!(err, BackendError::BucketNotFound(ref b) if b == BUCKET));
}

#[tokio::test]
async fn test_upload_rate_limited() {
    let (server, store) = common::setup_gcs_mock().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let file = tmp.path().join("a.txt");
    std::fs::write(&file, b"data").unwrap();
    common::mount_upload_status(&server, 429).await;

    let err = store.upload(&common::object("a.txt"), &file).await.unwrap_err();
    assert!(matches!(err, BackendError::RateLimited(_)));
}

#[tokio::test]
async fn test_upload_unreadable_file_sends_nothing() {
    let (server, store) = common::setup_gcs_mock().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = store
        .upload(
            &common::object("gone.txt"),
            std::path::Path::new("/nonexistent/gone.txt"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::LocalFile { .. }));
}
