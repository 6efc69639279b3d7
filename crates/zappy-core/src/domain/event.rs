//! Filesystem creation events

use std::path::{Path, PathBuf};

/// A creation observed in the watched directory
///
/// Produced by the watcher (or synthesised by the startup scan) and consumed
/// by the upload handler. Directory events are carried through so the
/// handler can discard them explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Absolute path of the created entry
    pub source_path: PathBuf,
    /// Whether the created entry is a directory
    pub is_directory: bool,
}

impl FileEvent {
    /// A file creation event
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: path.into(),
            is_directory: false,
        }
    }

    /// A directory creation event
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: path.into(),
            is_directory: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.source_path
    }
}
