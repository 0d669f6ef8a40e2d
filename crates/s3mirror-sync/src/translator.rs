//! ChangeTranslator - turns change events into remote store calls
//!
//! Each file event is mapped to its remote key and produces exactly one
//! `put` (Created/Modified) or `delete` (Deleted) call. Nothing is queued,
//! retried or deduplicated here; the session worker awaits every call before
//! receiving the next event, which serializes all remote traffic.
//!
//! Failures never propagate. They are logged and returned as a failed
//! [`SyncOutcome`], which is also published to outcome subscribers.

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use s3mirror_core::domain::{FailureReason, Operation, OutcomeResult, SyncOutcome, SyncTarget};
use s3mirror_core::ports::{IRemoteStore, StoreError};

use crate::watcher::{ChangeEvent, ChangeKind};

/// Dispatches file change events to a remote store bound to one target
pub struct ChangeTranslator {
    store: Box<dyn IRemoteStore>,
    target: SyncTarget,
    outcomes: Option<broadcast::Sender<SyncOutcome>>,
}

impl ChangeTranslator {
    /// Creates a translator owning `store`
    ///
    /// `target.root()` must be the same path the watcher was registered on,
    /// otherwise every event falls outside the root and is skipped.
    pub fn new(store: Box<dyn IRemoteStore>, target: SyncTarget) -> Self {
        Self {
            store,
            target,
            outcomes: None,
        }
    }

    /// Publishes every outcome on `sender` in addition to returning it
    pub fn with_outcomes(mut self, sender: broadcast::Sender<SyncOutcome>) -> Self {
        self.outcomes = Some(sender);
        self
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// Processes one change event
    ///
    /// Returns `None` when the event was skipped: directory events, and paths
    /// that do not map to a valid key under the root.
    pub async fn handle(&self, event: ChangeEvent) -> Option<SyncOutcome> {
        if event.is_directory {
            debug!(path = %event.path.display(), kind = ?event.kind, "Skipping directory event");
            return None;
        }

        let key = match self.target.key_for(&event.path) {
            Ok(key) => key,
            Err(e) => {
                warn!(path = %event.path.display(), error = %e, "Skipping event without a remote key");
                return None;
            }
        };

        let (operation, result) = match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                (Operation::Upload, self.store.put(&key, &event.path).await)
            }
            ChangeKind::Deleted => (Operation::Delete, self.store.delete(&key).await),
        };

        let result = match result {
            Ok(()) => {
                info!(
                    operation = %operation,
                    path = %event.path.display(),
                    key = %key,
                    "Synced change"
                );
                OutcomeResult::Success
            }
            Err(e) => {
                let reason = failure_reason(&e);
                warn!(
                    operation = %operation,
                    path = %event.path.display(),
                    key = %key,
                    reason = %reason,
                    error = %e,
                    "Failed to sync change"
                );
                OutcomeResult::failed(reason, e.to_string())
            }
        };

        let outcome = SyncOutcome::new(operation, event.path, key, result);
        if let Some(sender) = &self.outcomes {
            // no subscribers is fine
            let _ = sender.send(outcome.clone());
        }
        Some(outcome)
    }
}

fn failure_reason(err: &StoreError) -> FailureReason {
    err.failure_reason().unwrap_or(FailureReason::Transfer)
}
