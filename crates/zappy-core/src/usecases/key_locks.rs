//! Per-key async locks
//!
//! When several files are processed concurrently, two events that map to
//! the same object key must not interleave their existence check and upload.
//! [`KeyLocks`] hands out one async mutex per key and forgets the key once
//! nobody holds or waits on it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ObjectKey;

/// Registry of per-key mutexes
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    inner: Arc<DashMap<ObjectKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has `key`, then holds it until the
    /// returned guard is dropped.
    pub async fn lock(&self, key: &ObjectKey) -> KeyGuard {
        let mutex = self.inner.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            locks: self.clone(),
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or waited on
    pub fn active(&self) -> usize {
        self.inner.len()
    }
}

/// Holds one key of a [`KeyLocks`] registry
#[derive(Debug)]
pub struct KeyGuard {
    locks: KeyLocks,
    key: ObjectKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Release first so the strong count reflects only the map and waiters.
        self.guard.take();
        self.locks
            .inner
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
