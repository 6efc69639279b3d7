//! Upload handler use case
//!
//! Turns one [`FileEvent`] into one [`UploadOutcome`]:
//!
//! ```text
//! directory event ──→ ignored
//! file event ──→ exists? ── yes ──→ AlreadyExists
//!                        └─ no ──→ dry run? ── yes ──→ WouldUpload
//!                                            └─ no ──→ upload ──→ Uploaded
//! ```
//!
//! Every decision and every failure goes to the observer. Failures are
//! returned to the caller but never escalate beyond the event.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{FileEvent, RemoteObjectRef, UploadError, UploadOutcome};
use crate::ports::{IObjectStore, IUploadObserver, PutResult};

use super::key_locks::KeyLocks;

/// Use case for handling a single created file
pub struct UploadFileUseCase {
    store: Arc<dyn IObjectStore>,
    observer: Arc<dyn IUploadObserver>,
    bucket: String,
    dry_run: bool,
    key_locks: KeyLocks,
}

impl UploadFileUseCase {
    /// Creates a new handler
    ///
    /// # Arguments
    ///
    /// * `store` - Backend used for existence checks and uploads
    /// * `observer` - Receives every outcome and failure
    /// * `bucket` - Destination bucket
    /// * `dry_run` - Report `WouldUpload` instead of uploading
    pub fn new(
        store: Arc<dyn IObjectStore>,
        observer: Arc<dyn IUploadObserver>,
        bucket: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            observer,
            bucket: bucket.into(),
            dry_run,
            key_locks: KeyLocks::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Handles one event and reports the result to the observer
    ///
    /// Returns `Ok(None)` for directory events, which are ignored.
    pub async fn handle(&self, event: &FileEvent) -> Result<Option<UploadOutcome>, UploadError> {
        if event.is_directory {
            debug!(path = %event.path().display(), "Ignoring directory event");
            return Ok(None);
        }

        let path = event.path();
        match self.process(path).await {
            Ok(outcome) => {
                info!(
                    path = %path.display(),
                    bucket = %self.bucket,
                    %outcome,
                    "File processed"
                );
                self.observer.on_outcome(path, &self.bucket, outcome);
                Ok(Some(outcome))
            }
            Err(e) => {
                self.report_failure(path, &e);
                Err(e)
            }
        }
    }

    /// Reports a failure for `path` that stops it from being processed
    ///
    /// Also used by callers that give up on a file before calling
    /// [`handle`](Self::handle), such as the settle check.
    pub fn report_failure(&self, path: &Path, error: &UploadError) {
        warn!(
            path = %path.display(),
            bucket = %self.bucket,
            error = %error,
            "Failed to process file"
        );
        self.observer.on_failure(path, &self.bucket, error);
    }

    /// Existence check followed by upload, serialized per object key
    async fn process(&self, path: &Path) -> Result<UploadOutcome, UploadError> {
        let object = RemoteObjectRef::for_file(self.bucket.as_str(), path)
            .ok_or_else(|| UploadError::InvalidKey(path.to_path_buf()))?;

        let _guard = self.key_locks.lock(object.key()).await;

        if self.store.exists(&object).await? {
            return Ok(UploadOutcome::AlreadyExists);
        }

        if self.dry_run {
            return Ok(UploadOutcome::WouldUpload);
        }

        debug!(
            path = %path.display(),
            object = %object,
            provider = self.store.provider_name(),
            "Uploading file"
        );
        match self.store.upload(&object, path).await? {
            PutResult::Created => Ok(UploadOutcome::Uploaded),
            PutResult::AlreadyPresent => {
                info!(object = %object, "Object appeared between check and upload");
                Ok(UploadOutcome::AlreadyExists)
            }
        }
    }
}
