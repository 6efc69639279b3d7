//! Outcomes of processing a file

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// What the upload handler decided for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// An object with the same key is already in the bucket
    AlreadyExists,
    /// Dry run: the file would have been uploaded
    WouldUpload,
    /// The file was uploaded
    Uploaded,
}

impl UploadOutcome {
    /// Console line describing the outcome for `path`
    pub fn describe(&self, path: &Path, bucket: &str) -> String {
        let path = path.display();
        match self {
            UploadOutcome::AlreadyExists => format!("{path} already exists in {bucket}."),
            UploadOutcome::WouldUpload => format!("{path} will be uploaded to {bucket}."),
            UploadOutcome::Uploaded => format!("{path} uploaded to {bucket}."),
        }
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadOutcome::AlreadyExists => "already_exists",
            UploadOutcome::WouldUpload => "would_upload",
            UploadOutcome::Uploaded => "uploaded",
        };
        write!(f, "{}", s)
    }
}

/// Counters collected by a reconciliation scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Regular files found in the directory
    pub scanned: u64,
    pub uploaded: u64,
    pub already_exists: u64,
    pub would_upload: u64,
    /// Subdirectories skipped (the scan is not recursive)
    pub skipped_directories: u64,
    /// Files whose processing failed
    pub failed: u64,
}

impl ReconcileReport {
    pub fn record(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::AlreadyExists => self.already_exists += 1,
            UploadOutcome::WouldUpload => self.would_upload += 1,
            UploadOutcome::Uploaded => self.uploaded += 1,
        }
    }

    /// Number of files that reached a decision (success or failure)
    pub fn processed(&self) -> u64 {
        self.uploaded + self.already_exists + self.would_upload + self.failed
    }
}
