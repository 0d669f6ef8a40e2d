//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for writing to and deleting from the
//! remote object store. The primary implementation targets Amazon S3 and
//! S3-compatible services, but the trait is provider-agnostic.
//!
//! ## Design Notes
//!
//! - Errors are typed ([`StoreError`]) rather than `anyhow::Error` because the
//!   sync engine treats start-time failures (`Auth`, `Config`) and per-call
//!   failures (`Transfer`, `LocalRead`) differently.
//! - A store handle is bound to a single bucket at construction time; keys
//!   passed to `put`/`delete` are relative to that bucket.
//! - Calls are independent: no batching, no ordering across keys.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::credentials::Credentials;
use crate::domain::newtypes::RemoteKey;
use crate::domain::outcome::FailureReason;

// ============================================================================
// StoreError
// ============================================================================

/// Errors raised by remote store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    /// Credentials are missing, malformed or rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The store configuration is unusable (e.g. unknown bucket)
    #[error("Invalid store configuration: {0}")]
    Config(String),

    /// A single put/delete call failed
    #[error("Transfer failed for {key}: {message}")]
    Transfer {
        /// Key the call targeted
        key: String,
        /// Underlying error description
        message: String,
    },

    /// The local file could not be read for upload
    #[error("Cannot read local file {}: {source}", path.display())]
    LocalRead {
        /// Path that failed to read
        path: PathBuf,
        /// The I/O error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Creates a transfer error for `key`
    pub fn transfer(key: &RemoteKey, message: impl Into<String>) -> Self {
        StoreError::Transfer {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Creates a local read error for `path`
    pub fn local_read(path: &Path, source: std::io::Error) -> Self {
        StoreError::LocalRead {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Maps per-call failures to their outcome category
    ///
    /// Returns `None` for `Auth`/`Config`, which only occur while connecting.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            StoreError::Transfer { .. } => Some(FailureReason::Transfer),
            StoreError::LocalRead { .. } => Some(FailureReason::LocalRead),
            StoreError::Auth(_) | StoreError::Config(_) => None,
        }
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for object operations against one bucket
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Uploads the file at `local_path` to `key`, overwriting any object there
    ///
    /// # Errors
    /// - `StoreError::LocalRead` if the file vanished or cannot be read
    /// - `StoreError::Transfer` on network, permission or throttling failure
    async fn put(&self, key: &RemoteKey, local_path: &Path) -> Result<(), StoreError>;

    /// Removes the object at `key` if present
    ///
    /// Deleting a key that does not exist is not an error.
    ///
    /// # Errors
    /// `StoreError::Transfer` on network or permission failure
    async fn delete(&self, key: &RemoteKey) -> Result<(), StoreError>;
}

// ============================================================================
// IStoreConnector trait
// ============================================================================

/// Port trait for constructing store handles
///
/// Credentials are resolved once here and never re-resolved per call.
#[async_trait::async_trait]
pub trait IStoreConnector: Send + Sync {
    /// Builds a store handle bound to `bucket`
    ///
    /// # Errors
    /// - `StoreError::Auth` if no usable credentials can be resolved
    /// - `StoreError::Config` if the bucket or endpoint is unusable
    async fn connect(
        &self,
        credentials: &Credentials,
        bucket: &str,
    ) -> Result<Box<dyn IRemoteStore>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_mapping() {
        let key = RemoteKey::new("a.txt".to_string()).unwrap();
        assert_eq!(
            StoreError::transfer(&key, "timeout").failure_reason(),
            Some(FailureReason::Transfer)
        );
        assert_eq!(
            StoreError::local_read(
                Path::new("/data/a.txt"),
                std::io::Error::from(std::io::ErrorKind::NotFound)
            )
            .failure_reason(),
            Some(FailureReason::LocalRead)
        );
        assert_eq!(StoreError::Auth("denied".into()).failure_reason(), None);
        assert_eq!(StoreError::Config("no bucket".into()).failure_reason(), None);
    }

    #[test]
    fn test_error_display() {
        let key = RemoteKey::new("backup/a.txt".to_string()).unwrap();
        assert_eq!(
            StoreError::transfer(&key, "503 Slow Down").to_string(),
            "Transfer failed for backup/a.txt: 503 Slow Down"
        );

        let err = StoreError::local_read(
            Path::new("/data/a.txt"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "Cannot read local file /data/a.txt: gone");
    }
}
