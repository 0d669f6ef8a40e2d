//! s3mirror Sync - Change translation and session lifecycle
//!
//! Provides:
//! - Recursive filesystem watching with notify
//! - Translation of file changes into remote put/delete calls
//! - A start/stop session lifecycle with orderly worker shutdown
//!
//! ## Modules
//!
//! - [`watcher`] - notify watcher feeding a bounded [`ChangeEvent`](watcher::ChangeEvent) channel
//! - [`translator`] - per-event dispatcher from change events to the remote store
//! - [`session`] - [`SyncSession`](session::SyncSession) state machine and worker loop

pub mod session;
pub mod translator;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

use s3mirror_core::ports::StoreError;

pub use session::{SessionState, SyncSession};
pub use translator::ChangeTranslator;
pub use watcher::{ChangeEvent, ChangeKind, FileWatcher};

/// Errors returned when starting a sync session
///
/// Per-event transfer failures never surface here; they are reported as
/// outcome records by the [`ChangeTranslator`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync target is unusable (missing root, empty bucket, unknown bucket)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The remote store rejected or could not resolve the credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// `start` was called on a session that is not idle
    #[error("Session is already running")]
    AlreadyRunning,

    /// Another session in this process is mirroring the same root
    #[error("Another session is already mirroring {}", .0.display())]
    RootBusy(PathBuf),

    /// The filesystem watch could not be registered
    #[error("Cannot watch {}: {message}", path.display())]
    Watch {
        /// Root that failed to register
        path: PathBuf,
        /// Underlying watcher error
        message: String,
    },
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Auth(msg) => SyncError::Auth(msg),
            StoreError::Config(msg) => SyncError::Config(msg),
            // connect never issues transfers; treat anything else as unusable credentials
            other => SyncError::Auth(other.to_string()),
        }
    }
}
