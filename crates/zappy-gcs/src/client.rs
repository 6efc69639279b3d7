//! Cloud Storage JSON API client
//!
//! Builds object and upload URLs, attaches bearer tokens and maps HTTP
//! statuses to [`GcsError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zappy_gcs::auth::StaticTokenProvider;
//! use zappy_gcs::client::GcsClient;
//!
//! # async fn example() -> Result<(), zappy_gcs::GcsError> {
//! let client = GcsClient::with_base_url(
//!     Arc::new(StaticTokenProvider::new("token")),
//!     "http://localhost:4443",
//! )?;
//! let present = client.object_exists("zappy", "a.txt").await?;
//! println!("a.txt present: {present}");
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;
use zappy_core::ports::PutResult;

use crate::auth::TokenProvider;
use crate::GcsError;

/// Public Cloud Storage endpoint
pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Environment variable overriding the endpoint (emulators, tests)
pub const ENDPOINT_ENV: &str = "ZAPPY_GCS_ENDPOINT";

/// Header attributing quota to a project
const USER_PROJECT_HEADER: &str = "x-goog-user-project";

/// Error body returned by the JSON API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// HTTP client for the Cloud Storage JSON API
pub struct GcsClient {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    user_project: Option<String>,
}

impl GcsClient {
    /// Creates a client for the public endpoint, or `ZAPPY_GCS_ENDPOINT` if set
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Result<Self, GcsError> {
        let base = std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| GCS_BASE_URL.to_string());
        Self::with_base_url(tokens, &base)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(tokens: Arc<dyn TokenProvider>, base_url: &str) -> Result<Self, GcsError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GcsError::InvalidEndpoint(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GcsError::InvalidEndpoint(base_url.to_string()));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            tokens,
            user_project: None,
        })
    }

    /// Sends `x-goog-user-project` with every request
    pub fn with_user_project(mut self, project: impl Into<String>) -> Self {
        let project = project.into();
        self.user_project = (!project.is_empty()).then_some(project);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_project(&self) -> Option<&str> {
        self.user_project.as_deref()
    }

    /// `{base}/storage/v1/b/{bucket}/o/{key}`
    pub fn object_url(&self, bucket: &str, key: &str) -> Url {
        self.url_with_segments(&["storage", "v1", "b", bucket, "o", key])
    }

    /// `{base}/upload/storage/v1/b/{bucket}/o?uploadType=media&name={key}&ifGenerationMatch=0`
    pub fn upload_url(&self, bucket: &str, key: &str) -> Url {
        let mut url = self.url_with_segments(&["upload", "storage", "v1", "b", bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key)
            .append_pair("ifGenerationMatch", "0");
        url
    }

    fn url_with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Creates an authenticated request builder
    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, GcsError> {
        let token = self.tokens.access_token().await?;
        let mut builder = self.client.request(method, url).bearer_auth(token);
        if let Some(project) = &self.user_project {
            builder = builder.header(USER_PROJECT_HEADER, project);
        }
        Ok(builder)
    }

    /// `{base}/storage/v1/b/{bucket}`
    pub fn bucket_url(&self, bucket: &str) -> Url {
        self.url_with_segments(&["storage", "v1", "b", bucket])
    }

    /// Checks whether `key` exists in `bucket`
    ///
    /// Only a 404 for the object means absent. A missing bucket is
    /// [`GcsError::NotFound`]; any other failure is an error too.
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, GcsError> {
        let mut url = self.object_url(bucket, key);
        url.query_pairs_mut().append_pair("fields", "name");
        debug!(bucket, key, "GET object metadata");

        let response = self.request(Method::GET, url).await?.send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => {
                let message = error_message(&response.text().await.unwrap_or_default());
                match classify_not_found(&message) {
                    Some(Missing::Object) => Ok(false),
                    Some(Missing::Bucket) => Err(GcsError::NotFound(bucket.to_string())),
                    None => {
                        debug!(bucket, key, %message, "Unrecognised 404, checking the bucket");
                        if self.bucket_exists(bucket).await? {
                            Ok(false)
                        } else {
                            Err(GcsError::NotFound(bucket.to_string()))
                        }
                    }
                }
            }
            _ => Err(status_error(response, bucket).await),
        }
    }

    /// Checks whether `bucket` exists and is visible to these credentials
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool, GcsError> {
        let mut url = self.bucket_url(bucket);
        url.query_pairs_mut().append_pair("fields", "name");
        debug!(bucket, "GET bucket metadata");

        let response = self.request(Method::GET, url).await?.send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response, bucket).await),
        }
    }

    /// Uploads `local_path` as `key`, only if no object with that key exists
    ///
    /// The body is streamed from disk.
    pub async fn insert_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<PutResult, GcsError> {
        let io_error = |source| GcsError::Io {
            path: local_path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(local_path).await.map_err(io_error)?;
        let size = file.metadata().await.map_err(io_error)?.len();
        debug!(bucket, key, size, "POST media upload");

        let response = self
            .request(Method::POST, self.upload_url(bucket, key))
            .await?
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(PutResult::Created),
            StatusCode::PRECONDITION_FAILED => Ok(PutResult::AlreadyPresent),
            _ => Err(status_error(response, bucket).await),
        }
    }
}

/// What a 404 on an object URL refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    Object,
    Bucket,
}

/// Reads the JSON API's 404 wording; `None` when it says neither
fn classify_not_found(message: &str) -> Option<Missing> {
    let lower = message.to_ascii_lowercase();
    if lower.starts_with("no such object") {
        Some(Missing::Object)
    } else if lower.contains("bucket") && lower.contains("does not exist") {
        Some(Missing::Bucket)
    } else {
        None
    }
}

/// The `error.message` of a JSON error body, or the trimmed body itself
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

/// Maps a non-success response to a [`GcsError`]
async fn status_error(response: Response, bucket: &str) -> GcsError {
    let status = response.status();
    let message = error_message(&response.text().await.unwrap_or_default());

    match status {
        StatusCode::UNAUTHORIZED => GcsError::Unauthorized(message),
        StatusCode::FORBIDDEN => GcsError::Forbidden(message),
        StatusCode::NOT_FOUND => GcsError::NotFound(bucket.to_string()),
        StatusCode::PRECONDITION_FAILED => GcsError::PreconditionFailed(message),
        StatusCode::TOO_MANY_REQUESTS => GcsError::TooManyRequests(message),
        s if s.is_server_error() => GcsError::ServerError {
            status: s.as_u16(),
            message,
        },
        s => GcsError::UnexpectedStatus {
            status: s.as_u16(),
            message,
        },
    }
}
