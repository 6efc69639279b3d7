//! Upload observer port
//!
//! Every component that produces user-visible output (the startup scan,
//! the upload handler, the orchestrator) receives an observer instead of
//! printing directly. The CLI provides console and JSON implementations;
//! tests use recording implementations.

use std::path::Path;

use crate::domain::{UploadError, UploadOutcome};

/// Sink for pipeline outcomes and status messages
///
/// Methods are synchronous and must not block for long: they are called
/// from inside the upload handler.
pub trait IUploadObserver: Send + Sync {
    /// A file reached a decision
    fn on_outcome(&self, path: &Path, bucket: &str, outcome: UploadOutcome);

    /// Processing a file failed; the pipeline carries on
    fn on_failure(&self, path: &Path, bucket: &str, error: &UploadError);

    /// Informational status line (startup, watching, shutdown)
    fn on_status(&self, message: &str);

    /// Fatal error reported before the process aborts
    fn on_error(&self, message: &str);
}

/// Observer that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl IUploadObserver for NullObserver {
    fn on_outcome(&self, _path: &Path, _bucket: &str, _outcome: UploadOutcome) {}
    fn on_failure(&self, _path: &Path, _bucket: &str, _error: &UploadError) {}
    fn on_status(&self, _message: &str) {}
    fn on_error(&self, _message: &str) {}
}
