//! Outcome records for synchronized file events
//!
//! Every file event handled by the change translator produces exactly one
//! [`SyncOutcome`]. Outcomes are the observable surface of per-event
//! failures: a failed upload or delete is recorded here instead of
//! interrupting the session.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemoteKey;

/// Remote operation attempted for a file event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Local file contents written to the remote key
    Upload,
    /// Remote key removed
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Upload => write!(f, "upload"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Why a remote operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Network, permission or throttling failure talking to the store
    Transfer,
    /// The local file disappeared or could not be read
    LocalRead,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Transfer => write!(f, "transfer_error"),
            FailureReason::LocalRead => write!(f, "local_read_error"),
        }
    }
}

/// Result of a remote operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    /// The operation completed
    Success,
    /// The operation failed; the session keeps running
    Failed {
        /// Failure category
        reason: FailureReason,
        /// Human-readable error message
        message: String,
    },
}

impl OutcomeResult {
    /// Creates a failed result
    pub fn failed(reason: FailureReason, message: impl Into<String>) -> Self {
        OutcomeResult::Failed {
            reason,
            message: message.into(),
        }
    }

    /// Returns true if the result is a success
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeResult::Success)
    }

    /// Returns the failure reason, if any
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            OutcomeResult::Success => None,
            OutcomeResult::Failed { reason, .. } => Some(*reason),
        }
    }
}

/// Record of one file event turned into one remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// When the remote call returned
    timestamp: DateTime<Utc>,
    /// Operation attempted
    operation: Operation,
    /// Local path named by the change notification
    local_path: PathBuf,
    /// Remote key derived from the path
    key: RemoteKey,
    /// What happened
    result: OutcomeResult,
}

impl SyncOutcome {
    /// Creates an outcome stamped with the current time
    pub fn new(
        operation: Operation,
        local_path: impl Into<PathBuf>,
        key: RemoteKey,
        result: OutcomeResult,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            local_path: local_path.into(),
            key,
            result,
        }
    }

    /// Returns when the outcome was recorded
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the attempted operation
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the local path of the event
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Returns the remote key
    pub fn key(&self) -> &RemoteKey {
        &self.key
    }

    /// Returns the result
    pub fn result(&self) -> &OutcomeResult {
        &self.result
    }

    /// Returns true if the remote call succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.operation {
            Operation::Upload => "Uploaded",
            Operation::Delete => "Deleted",
        };
        match &self.result {
            OutcomeResult::Success => write!(
                f,
                "{verb}: {} -> {}",
                self.local_path.display(),
                self.key
            ),
            OutcomeResult::Failed { reason, message } => write!(
                f,
                "Failed to {} {} ({reason}): {message}",
                self.operation,
                self.local_path.display()
            ),
        }
    }
}
