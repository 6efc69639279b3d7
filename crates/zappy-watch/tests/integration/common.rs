//! Shared helpers for watcher integration tests

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use zappy_core::domain::{BackendError, RemoteObjectRef, UploadError, UploadOutcome};
use zappy_core::ports::{IObjectStore, IUploadObserver, PutResult};

/// In-memory bucket
#[derive(Default)]
pub struct MemoryBucket {
    pub objects: Mutex<HashSet<String>>,
    pub uploads: Mutex<Vec<String>>,
}

impl MemoryBucket {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl IObjectStore for MemoryBucket {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, object: &RemoteObjectRef) -> Result<bool, BackendError> {
        Ok(self.contains(object.key().as_str()))
    }

    async fn upload(
        &self,
        object: &RemoteObjectRef,
        local_path: &Path,
    ) -> Result<PutResult, BackendError> {
        std::fs::metadata(local_path).map_err(|source| BackendError::LocalFile {
            path: local_path.to_path_buf(),
            source,
        })?;
        let key = object.key().to_string();
        self.uploads.lock().unwrap().push(key.clone());
        self.objects.lock().unwrap().insert(key);
        Ok(PutResult::Created)
    }
}

/// Observer that keeps every reported outcome
#[derive(Default)]
pub struct Recorder {
    pub outcomes: Mutex<Vec<(PathBuf, UploadOutcome)>>,
}

impl IUploadObserver for Recorder {
    fn on_outcome(&self, path: &Path, _bucket: &str, outcome: UploadOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), outcome));
    }
    fn on_failure(&self, _path: &Path, _bucket: &str, _error: &UploadError) {}
    fn on_status(&self, _message: &str) {}
    fn on_error(&self, _message: &str) {}
}
