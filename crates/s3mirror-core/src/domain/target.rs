//! SyncTarget domain entity
//!
//! A SyncTarget names what is mirrored where: a local root directory, the
//! remote bucket and the key prefix under which the root's files are stored.
//! It is immutable for the lifetime of a session.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::key_mapper::{derive_key, normalize_prefix};
use super::newtypes::RemoteKey;

/// Local directory ↔ remote bucket/prefix binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Local directory being mirrored
    root: PathBuf,
    /// Remote container (bucket) name
    bucket: String,
    /// Normalized key prefix, possibly empty
    prefix: String,
}

impl SyncTarget {
    /// Creates a new SyncTarget
    ///
    /// The bucket name is trimmed and the prefix normalized
    /// (see [`normalize_prefix`]). No filesystem access happens here;
    /// call [`validated`](Self::validated) before starting a session.
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into().trim().to_string(),
            prefix: normalize_prefix(prefix),
        }
    }

    /// Checks the target can be watched and returns it with a canonical root
    ///
    /// # Errors
    /// - `DomainError::ValidationFailed` if the bucket name is empty
    /// - `DomainError::InvalidPath` if the root does not exist, is not a
    ///   directory or cannot be listed
    pub fn validated(self) -> Result<Self, DomainError> {
        if self.bucket.is_empty() {
            return Err(DomainError::ValidationFailed(
                "bucket name must not be empty".to_string(),
            ));
        }

        let root = std::fs::canonicalize(&self.root).map_err(|e| {
            DomainError::InvalidPath(format!(
                "sync root {} is not accessible: {e}",
                self.root.display()
            ))
        })?;

        if !root.is_dir() {
            return Err(DomainError::InvalidPath(format!(
                "sync root {} is not a directory",
                root.display()
            )));
        }

        std::fs::read_dir(&root).map_err(|e| {
            DomainError::InvalidPath(format!(
                "sync root {} is not readable: {e}",
                root.display()
            ))
        })?;

        Ok(Self { root, ..self })
    }

    /// Returns the local root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the normalized key prefix (empty when unset)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derives the remote key for a path under this target's root
    ///
    /// # Errors
    /// See [`derive_key`]
    pub fn key_for(&self, path: &Path) -> Result<RemoteKey, DomainError> {
        derive_key(&self.root, path, &self.prefix)
    }
}

impl std::fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{} -> s3://{}", self.root.display(), self.bucket)
        } else {
            write!(
                f,
                "{} -> s3://{}/{}",
                self.root.display(),
                self.bucket,
                self.prefix
            )
        }
    }
}
