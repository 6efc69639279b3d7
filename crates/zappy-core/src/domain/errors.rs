//! Domain error types
//!
//! The error taxonomy is split by phase:
//! - [`ConfigError`] and [`PreconditionError`] are fatal and only occur
//!   at startup, before any remote I/O.
//! - [`BackendError`] comes from the storage backend and is always contained
//!   to the file or event being processed.
//! - [`UploadError`] is what the upload handler reports for a single event.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ValidationError;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid object key (empty, or contains a path separator)
    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },
}

/// Problems with configuration content or values
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The default settings file could not be created
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML or has wrongly typed keys
    #[error("Malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The default settings could not be rendered as TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The storage provider is not one we can talk to
    #[error("{0} is not supported.")]
    UnsupportedProvider(String),

    /// Neither the settings file nor the flags name a directory to watch
    #[error("No directory to watch; set `directory` in the config file or pass --directory")]
    MissingDirectory,

    /// A `~` or `$VAR` in a path could not be expanded
    #[error("Cannot expand path '{path}': {message}")]
    PathExpansion { path: String, message: String },

    /// One or more values failed validation
    #[error(
        "Invalid configuration: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Invalid(Vec<ValidationError>),
}

/// A path the configuration points at is not usable
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// The watch directory does not exist
    #[error("{0} does not exist.")]
    DirectoryNotFound(PathBuf),

    /// The watch directory exists but is a file
    #[error("{0} is not a directory.")]
    NotADirectory(PathBuf),

    /// The credentials file does not exist
    #[error("{0} does not exist.")]
    CredentialsNotFound(PathBuf),
}

/// Any fatal error raised while resolving the effective configuration
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

/// Failures reported by a storage backend
///
/// A backend must never turn any of these into "object not found":
/// an existence check either answers definitively or fails.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The local file could not be opened or read for upload
    #[error("Cannot read local file {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credentials could not be loaded or exchanged for an access token
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// The backend rejected the credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The credentials lack permission for the bucket (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The bucket itself does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// The backend is throttling requests (429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The backend failed on its side (5xx)
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other status the backend should not have returned
    #[error("Unexpected response ({status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// Connection, TLS or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure while handling a single file
#[derive(Debug, Error)]
pub enum UploadError {
    /// The storage backend failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// No object key can be derived from the path
    #[error("Cannot derive an object key from {0}")]
    InvalidKey(PathBuf),

    /// The file kept changing size and never settled
    #[error("{0} is still being written")]
    Unsettled(PathBuf),

    /// The file disappeared before it could be processed
    #[error("{0} no longer exists")]
    Vanished(PathBuf),
}
