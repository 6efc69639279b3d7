//! Shared test helpers for Cloud Storage integration tests
//!
//! Each helper mounts the endpoints a test needs and returns a
//! `GcsObjectStore` pointing at the mock server.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zappy_core::domain::{ObjectKey, RemoteObjectRef};
use zappy_gcs::auth::StaticTokenProvider;
use zappy_gcs::client::GcsClient;
use zappy_gcs::provider::GcsObjectStore;

pub const BUCKET: &str = "zappy";
pub const TOKEN: &str = "test-access-token";
pub const PROJECT: &str = "zappy-test-project";

/// Starts a mock server and returns a store talking to it
pub async fn setup_gcs_mock() -> (MockServer, GcsObjectStore) {
    let server = MockServer::start().await;
    let client = GcsClient::with_base_url(Arc::new(StaticTokenProvider::new(TOKEN)), &server.uri())
        .expect("mock server URI is a valid base")
        .with_user_project(PROJECT);
    (server, GcsObjectStore::new(client))
}

pub fn object(key: &str) -> RemoteObjectRef {
    RemoteObjectRef::new(BUCKET, ObjectKey::new(key).unwrap())
}

/// Mounts a metadata endpoint answering `status` for `key`
pub async fn mount_object_status(server: &MockServer, key: &str, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": key }))
    } else if status == 404 {
        not_found(&format!("No such object: {BUCKET}/{key}"))
    } else {
        ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "error": { "code": status, "message": format!("status {status}") }
        }))
    };

    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{BUCKET}/o/{key}")))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Mounts the media upload endpoint answering `status`
pub async fn mount_upload_status(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(format!("/upload/storage/v1/b/{BUCKET}/o")))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "bucket": BUCKET,
            "generation": "1700000000000000"
        })))
        .mount(server)
        .await;
}

/// A JSON API 404 carrying `message`
pub fn not_found(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(serde_json::json!({
        "error": { "code": 404, "message": message }
    }))
}

/// Mounts the bucket metadata endpoint answering `status`
pub async fn mount_bucket_status(server: &MockServer, status: u16, expected_calls: u64) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": BUCKET }))
    } else {
        not_found("Not Found")
    };

    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{BUCKET}")))
        .respond_with(template)
        .expect(expected_calls)
        .mount(server)
        .await;
}
