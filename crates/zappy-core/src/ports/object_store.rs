//! Object store port (driven/secondary port)
//!
//! This module defines the interface for talking to the remote bucket.
//! The shipped implementation targets Google Cloud Storage, but nothing
//! in the core depends on which provider sits behind the trait.
//!
//! ## Design Notes
//!
//! - Errors are typed as [`BackendError`] rather than `anyhow::Error` so
//!   callers can tell a definitive "absent" from a failed check.
//! - Implementations must be safe to share across tasks; the same instance
//!   serves the startup scan and every live event.

use std::path::Path;

use crate::domain::{BackendError, RemoteObjectRef};

/// Result of a conditional upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    /// The object was written
    Created,
    /// The backend refused the write because the key already exists
    ///
    /// Returned when an if-absent precondition fails, which happens when
    /// another writer stored the key between our existence check and upload.
    AlreadyPresent,
}

/// Port trait for remote object storage
#[async_trait::async_trait]
pub trait IObjectStore: Send + Sync {
    /// Short provider identifier used in logs (e.g. `"gcs"`)
    fn provider_name(&self) -> &'static str;

    /// Checks whether `object` exists in its bucket
    ///
    /// Never mutates remote state. `Ok(false)` only on a definitive
    /// not-found answer; transport and auth failures are errors.
    async fn exists(&self, object: &RemoteObjectRef) -> Result<bool, BackendError>;

    /// Uploads the file at `local_path` as `object`
    ///
    /// Implementations should make the write conditional on the key being
    /// absent when the backend supports it, and report a failed precondition
    /// as [`PutResult::AlreadyPresent`].
    ///
    /// # Errors
    /// [`BackendError::LocalFile`] if the file cannot be read, any other
    /// variant if the remote call fails.
    async fn upload(
        &self,
        object: &RemoteObjectRef,
        local_path: &Path,
    ) -> Result<PutResult, BackendError>;
}
