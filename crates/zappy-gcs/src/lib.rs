//! Zappy GCS - Google Cloud Storage client
//!
//! Provides the async storage backend used by Zappy:
//! - Service-account and authorized-user credentials with token caching
//! - Object existence checks via the JSON API
//! - Conditional, streamed media uploads
//!
//! ## Modules
//!
//! - [`auth`] - Credentials files and OAuth2 access tokens
//! - [`client`] - Cloud Storage JSON API HTTP client
//! - [`provider`] - [`IObjectStore`](zappy_core::ports::IObjectStore) adapter

pub mod auth;
pub mod client;
pub mod provider;

use std::path::PathBuf;

use thiserror::Error;
use zappy_core::domain::BackendError;

/// Errors that can occur when talking to Cloud Storage
#[derive(Debug, Error)]
pub enum GcsError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested bucket or object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An `ifGenerationMatch` precondition did not hold
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Rate limit exceeded
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Any other non-success status
    #[error("Unexpected status ({status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The credentials file is missing, malformed or unusable
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured endpoint is not a usable base URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The local file to upload could not be read
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<GcsError> for BackendError {
    fn from(err: GcsError) -> Self {
        match err {
            GcsError::Unauthorized(m) => BackendError::Unauthorized(m),
            GcsError::Forbidden(m) => BackendError::Forbidden(m),
            GcsError::NotFound(m) => BackendError::BucketNotFound(m),
            GcsError::PreconditionFailed(m) => BackendError::UnexpectedStatus {
                status: 412,
                message: m,
            },
            GcsError::TooManyRequests(m) => BackendError::RateLimited(m),
            GcsError::ServerError { status, message } => BackendError::Server { status, message },
            GcsError::UnexpectedStatus { status, message } => {
                BackendError::UnexpectedStatus { status, message }
            }
            GcsError::NetworkError(e) => BackendError::Transport(e.to_string()),
            GcsError::Credentials(m) => BackendError::Credentials(m),
            GcsError::InvalidResponse(m) => BackendError::InvalidResponse(m),
            GcsError::InvalidEndpoint(m) => BackendError::Transport(format!("invalid endpoint {m}")),
            GcsError::Io { path, source } => BackendError::LocalFile { path, source },
        }
    }
}
