//! Checkpoint port
//!
//! Persists the target and credentials of the last successfully started
//! session so the next process start can prefill them. The sync engine has
//! no validation responsibility here; it only calls `save`.

use crate::domain::credentials::Credentials;
use crate::domain::target::SyncTarget;

/// Durable record of the active sync configuration
pub trait ICheckpointStore: Send + Sync {
    /// Persists `target` and `credentials`
    fn save(&self, target: &SyncTarget, credentials: &Credentials) -> anyhow::Result<()>;
}
