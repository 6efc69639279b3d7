//! Zappy Watch - Directory watching and upload dispatch
//!
//! Provides:
//! - Non-recursive creation watching with a native or polling backend
//! - A bounded dispatcher feeding events to the upload handler
//! - An optional settle check for files still being written
//!
//! ## Modules
//!
//! - [`watcher`] - `notify` subscription producing [`FileEvent`](zappy_core::domain::FileEvent)s
//! - [`scheduler`] - Event loop dispatching events under a concurrency limit

pub mod scheduler;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up or running the watcher
#[derive(Debug, Error)]
pub enum WatchError {
    /// The OS watch could not be created for the directory
    #[error("Cannot watch {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// `start` was called on a watcher that is already running
    #[error("Watcher is already running on {0}")]
    AlreadyRunning(PathBuf),
}
