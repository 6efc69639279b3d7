//! OAuth2 access tokens for Cloud Storage
//!
//! Reads a Google credentials file (the resolved `gcp.credentials`, which
//! the CLI also exports as `GOOGLE_APPLICATION_CREDENTIALS`) and exchanges it
//! for short-lived access tokens.
//!
//! ## Components
//!
//! - [`CredentialsFile`] - Parsed `service_account` / `authorized_user` key file
//! - [`TokenProvider`] - Source of bearer tokens for the HTTP client
//! - [`OAuthTokenProvider`] - Token exchange with caching and early refresh
//! - [`StaticTokenProvider`] - Fixed token, for emulators and tests

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::GcsError;

/// Environment variable naming the credentials file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Default Google OAuth2 token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope needed to read object metadata and create objects
pub const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// Lifetime requested for service-account assertions
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

// ============================================================================
// Credentials file
// ============================================================================

/// Service-account key, as downloaded from the Cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Project billed for requests, if the key names one
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

/// User credentials written by `gcloud auth application-default login`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Set by `gcloud auth application-default set-quota-project`
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

/// A Google credentials file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

impl CredentialsFile {
    /// Parses a credentials file from disk
    pub fn from_file(path: &Path) -> Result<Self, GcsError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GcsError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
            .map_err(|e| GcsError::Credentials(format!("{}: {}", path.display(), e)))
    }

    /// Parses credentials from their JSON text
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn token_uri(&self) -> &str {
        match self {
            Self::ServiceAccount(key) => &key.token_uri,
            Self::AuthorizedUser(key) => &key.token_uri,
        }
    }

    /// Quota project declared in the file, sent as `x-goog-user-project`
    ///
    /// The configured `gcp.project` is never used for this.
    pub fn quota_project(&self) -> Option<&str> {
        let project = match self {
            Self::ServiceAccount(key) => key.quota_project_id.as_deref(),
            Self::AuthorizedUser(key) => key.quota_project_id.as_deref(),
        };
        project.filter(|p| !p.is_empty())
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "service_account",
            Self::AuthorizedUser(_) => "authorized_user",
        }
    }
}

// ============================================================================
// Token providers
// ============================================================================

/// Source of bearer tokens for Cloud Storage requests
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token valid for at least the next request
    async fn access_token(&self) -> Result<String, GcsError>;
}

/// Always returns the same token
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, GcsError> {
        Ok(self.token.clone())
    }
}

/// JWT claims for the service-account bearer grant
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Reply from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Exchanges a [`CredentialsFile`] for access tokens
///
/// The last token is cached behind a `tokio::sync::Mutex`, so concurrent
/// uploads share one exchange instead of racing the token endpoint.
pub struct OAuthTokenProvider {
    http: Client,
    credentials: CredentialsFile,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenProvider {
    pub fn new(credentials: CredentialsFile) -> Self {
        Self::with_client(Client::new(), credentials)
    }

    pub fn with_client(http: Client, credentials: CredentialsFile) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, GcsError> {
        let token_uri = self.credentials.token_uri();
        debug!(
            kind = self.credentials.kind(),
            token_uri, "Requesting access token"
        );

        let request = match &self.credentials {
            CredentialsFile::ServiceAccount(key) => {
                let assertion = sign_assertion(key, Utc::now())?;
                self.http
                    .post(token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            }
            CredentialsFile::AuthorizedUser(key) => self.http.post(token_uri).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", key.client_id.as_str()),
                ("client_secret", key.client_secret.as_str()),
                ("refresh_token", key.refresh_token.as_str()),
            ]),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GcsError::Credentials(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let reply: TokenResponse = response
            .json()
            .await
            .map_err(|e| GcsError::InvalidResponse(format!("token response: {e}")))?;

        let lifetime = reply.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        info!(
            kind = self.credentials.kind(),
            expires_in = lifetime,
            "Obtained access token"
        );
        Ok(CachedToken {
            token: reply.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn access_token(&self) -> Result<String, GcsError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

/// Builds the RS256-signed assertion for the JWT bearer grant
fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, GcsError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: STORAGE_SCOPE,
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| GcsError::Credentials(format!("invalid private key: {e}")))?;

    jsonwebtoken::encode(&header, &claims, &signing_key)
        .map_err(|e| GcsError::Credentials(format!("cannot sign assertion: {e}")))
}
