//! Domain newtypes with validation
//!
//! Remote objects are addressed by `(bucket, key)`, where the key is the
//! base name of the local file. Both types validate at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// ObjectKey
// ============================================================================

/// Name under which a file is stored in the bucket
///
/// Always a single path component: non-empty, no path separator for the
/// current platform, not `.` or `..`. A backslash is an ordinary character
/// outside Windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create an ObjectKey after validating it is a plain file name
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.is_empty() || key == "." || key == ".." || key.chars().any(std::path::is_separator) {
            return Err(DomainError::InvalidObjectKey(key));
        }
        Ok(Self(key))
    }

    /// Derive the key from a local path by stripping everything but the base name
    ///
    /// Returns `None` when the path has no final component (e.g. `/` or `..`)
    /// or when the name is not valid UTF-8.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        Self::new(name).ok()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// RemoteObjectRef
// ============================================================================

/// A `(bucket, key)` pair naming one remote object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteObjectRef {
    bucket: String,
    key: ObjectKey,
}

impl RemoteObjectRef {
    pub fn new(bucket: impl Into<String>, key: ObjectKey) -> Self {
        Self {
            bucket: bucket.into(),
            key,
        }
    }

    /// Build the reference for a local file, keyed by its base name
    #[must_use]
    pub fn for_file(bucket: impl Into<String>, path: &Path) -> Option<Self> {
        ObjectKey::from_path(path).map(|key| Self::new(bucket, key))
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }
}

impl Display for RemoteObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}
