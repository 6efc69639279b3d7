//! Startup reconciliation use case
//!
//! Walks the immediate children of the watch directory once and feeds every
//! regular file through the [`UploadFileUseCase`], so files that arrived
//! while the watcher was not running still reach the bucket. The scan must
//! finish before live watching starts.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::{BackendError, FileEvent, ReconcileReport, UploadError};

use super::upload_file::UploadFileUseCase;

/// Use case for the `--upload-missing` startup scan
pub struct ReconcileUseCase {
    handler: Arc<UploadFileUseCase>,
    max_concurrent: usize,
}

impl ReconcileUseCase {
    /// Creates a scanner that processes at most `max_concurrent` files at once
    ///
    /// With `max_concurrent == 1` files are handled strictly one after the
    /// other, in directory listing order.
    pub fn new(handler: Arc<UploadFileUseCase>, max_concurrent: usize) -> Self {
        Self {
            handler,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Scans `directory` and uploads files missing from the bucket
    ///
    /// Subdirectories are skipped. Per-file failures are counted in the
    /// report and do not stop the scan.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory itself cannot be listed.
    pub async fn run(&self, directory: &Path) -> Result<ReconcileReport> {
        self.run_until(directory, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops taking new files once `stop`
    /// completes
    ///
    /// Files already handed to the handler are finished, not aborted.
    pub async fn run_until<F>(&self, directory: &Path, stop: F) -> Result<ReconcileReport>
    where
        F: Future<Output = ()>,
    {
        info!(
            directory = %directory.display(),
            bucket = %self.handler.bucket(),
            dry_run = self.handler.is_dry_run(),
            max_concurrent = self.max_concurrent,
            "Reconciling directory with bucket"
        );

        let mut entries = tokio::fs::read_dir(directory)
            .await
            .with_context(|| format!("Failed to list {}", directory.display()))?;

        tokio::pin!(stop);
        let mut report = ReconcileReport::default();
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("Reconciliation interrupted, finishing files in progress");
                    break;
                }
                next = entries.next_entry() => next,
            };
            let entry = match next {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry");
                    report.failed += 1;
                    continue;
                }
            };

            let path = entry.path();
            // Follow symlinks: a link to a file is uploaded like the file.
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "Cannot stat entry, skipping");
                    let err = UploadError::Backend(BackendError::LocalFile {
                        path: path.clone(),
                        source,
                    });
                    self.handler.report_failure(&path, &err);
                    report.failed += 1;
                    continue;
                }
            };

            if metadata.is_dir() {
                debug!(path = %path.display(), "Skipping subdirectory");
                report.skipped_directories += 1;
                continue;
            }
            if !metadata.is_file() {
                debug!(path = %path.display(), "Skipping special file");
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("Reconciliation interrupted, finishing files in progress");
                    break;
                }
                permit = permits.clone().acquire_owned() => permit.context("Upload permits closed")?,
            };
            report.scanned += 1;
            let handler = Arc::clone(&self.handler);
            tasks.spawn(async move {
                let _permit = permit;
                handler.handle(&FileEvent::file(path)).await
            });

            // Collect whatever already finished so the set stays small.
            while let Some(joined) = tasks.try_join_next() {
                record(&mut report, joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record(&mut report, joined);
        }

        info!(
            scanned = report.scanned,
            uploaded = report.uploaded,
            already_exists = report.already_exists,
            would_upload = report.would_upload,
            skipped_directories = report.skipped_directories,
            failed = report.failed,
            "Reconciliation complete"
        );

        Ok(report)
    }
}

type HandleResult = std::result::Result<
    std::result::Result<Option<crate::domain::UploadOutcome>, UploadError>,
    tokio::task::JoinError,
>;

fn record(report: &mut ReconcileReport, joined: HandleResult) {
    match joined {
        Ok(Ok(Some(outcome))) => report.record(outcome),
        Ok(Ok(None)) => {}
        // Already reported to the observer by the handler
        Ok(Err(_)) => report.failed += 1,
        Err(e) => {
            error!(error = %e, "Upload task panicked");
            report.failed += 1;
        }
    }
}
