//! Integration tests for the OAuth2 token exchange

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use zappy_gcs::auth::{CredentialsFile, OAuthTokenProvider, TokenProvider, STORAGE_SCOPE};
use zappy_gcs::client::GcsClient;
use zappy_gcs::GcsError;

fn authorized_user(token_uri: &str) -> CredentialsFile {
    CredentialsFile::from_json(
        &serde_json::json!({
            "type": "authorized_user",
            "client_id": "cid",
            "client_secret": "secret",
            "refresh_token": "1//refresh",
            "token_uri": token_uri,
        })
        .to_string(),
    )
    .unwrap()
}

const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_rsa_key.pem");
const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test_rsa_key.pub.pem");
const SERVICE_ACCOUNT: &str = "uploader@zappy-test.iam.gserviceaccount.com";

fn service_account(token_uri: &str) -> CredentialsFile {
    CredentialsFile::from_json(
        &serde_json::json!({
            "type": "service_account",
            "client_email": SERVICE_ACCOUNT,
            "private_key": TEST_PRIVATE_KEY,
            "private_key_id": "key-1",
            "token_uri": token_uri,
        })
        .to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_service_account_jwt_bearer_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.service",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token_uri = format!("{}/token", server.uri());
    let provider = OAuthTokenProvider::new(service_account(&token_uri));

    assert_eq!(provider.access_token().await.unwrap(), "ya29.service");
    // Second call is served from the cache
    assert_eq!(provider.access_token().await.unwrap(), "ya29.service");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let assertion = url::form_urlencoded::parse(&requests[0].body)
        .find(|(k, _)| k == "assertion")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[token_uri.as_str()]);
    let decoded = jsonwebtoken::decode::<serde_json::Value>(
        &assertion,
        &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
        &validation,
    )
    .unwrap();

    assert_eq!(decoded.header.kid.as_deref(), Some("key-1"));
    assert_eq!(decoded.claims["iss"], SERVICE_ACCOUNT);
    assert_eq!(decoded.claims["scope"], STORAGE_SCOPE);
    assert_eq!(decoded.claims["aud"], token_uri.as_str());
}

#[tokio::test]
async fn test_refresh_token_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OAuthTokenProvider::new(authorized_user(&format!("{}/token", server.uri())));

    assert_eq!(provider.access_token().await.unwrap(), "ya29.fresh");
    // Second call is served from the cache
    assert_eq!(provider.access_token().await.unwrap(), "ya29.fresh");
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.short",
            "expires_in": 30
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider = OAuthTokenProvider::new(authorized_user(&format!("{}/token", server.uri())));

    provider.access_token().await.unwrap();
    provider.access_token().await.unwrap();
}

#[tokio::test]
async fn test_token_endpoint_rejection_is_credentials_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let provider = OAuthTokenProvider::new(authorized_user(&format!("{}/token", server.uri())));

    let err = provider.access_token().await.unwrap_err();
    assert!(matches!(err, GcsError::Credentials(ref m) if m.contains("invalid_grant")));
}

#[tokio::test]
async fn test_client_uses_exchanged_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/zappy/o/a.txt"))
        .and(header("authorization", "Bearer ya29.fresh"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": 404, "message": "No such object: zappy/a.txt" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(OAuthTokenProvider::new(authorized_user(&format!(
        "{}/token",
        server.uri()
    ))));
    let client = GcsClient::with_base_url(provider, &server.uri()).unwrap();

    assert!(!client.object_exists("zappy", "a.txt").await.unwrap());
}

#[tokio::test]
async fn test_credentials_file_on_disk() {
    let tmp = tempfile::TempDir::new().unwrap();
    let key_path = tmp.path().join("gcpkey.json");
    std::fs::write(
        &key_path,
        r#"{"type": "authorized_user", "client_id": "c", "client_secret": "s", "refresh_token": "r"}"#,
    )
    .unwrap();

    let creds = CredentialsFile::from_file(&key_path).unwrap();
    assert_eq!(creds.kind(), "authorized_user");

    std::fs::write(&key_path, "{ not json").unwrap();
    assert!(matches!(
        CredentialsFile::from_file(&key_path),
        Err(GcsError::Credentials(_))
    ));
}
