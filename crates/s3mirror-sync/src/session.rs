//! SyncSession - lifecycle of one mirroring session
//!
//! A session binds a [`ChangeTranslator`] to a live recursive watch on the
//! target root. Events flow through a bounded channel into a single worker
//! task that awaits each remote call before receiving the next event.
//!
//! ## States
//!
//! ```text
//!  Idle ──start──→ Running ──stop──→ Stopping ──→ Idle
//!   ↑                                              │
//!   └──────────────── start again ─────────────────┘
//! ```
//!
//! ## Design Notes
//!
//! - `start` takes `&mut self`, so transitions on one session are serialized
//!   by the borrow checker. A process-wide registry of claimed roots keeps two
//!   sessions from mirroring the same directory.
//! - The worker owns the event receiver, the watcher and the root claim.
//!   `stop` cancels the worker and awaits it. An in-flight `put`/`delete`
//!   completes before the worker exits; events still queued at that point
//!   are discarded.
//! - The worker closes the event channel before it unwatches. notify's
//!   unwatch waits on the backend thread, which may be parked on a full
//!   channel until the receiver is gone.
//! - The root stays claimed until the worker has exited, also when a running
//!   session is dropped without `stop`.
//! - Start failures leave the session `Idle` and release everything acquired
//!   so far.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use s3mirror_core::domain::{Credentials, SyncOutcome, SyncTarget};
use s3mirror_core::ports::{ICheckpointStore, IStoreConnector};

use crate::translator::ChangeTranslator;
use crate::watcher::{ChangeEvent, FileWatcher};
use crate::SyncError;

/// Events buffered between the OS watcher thread and the worker
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Outcomes buffered per subscriber before it starts lagging
const OUTCOME_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a [`SyncSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    /// Transient while `stop` tears the session down
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Root registry
// ============================================================================

fn claimed_roots() -> &'static Mutex<HashSet<PathBuf>> {
    static ROOTS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    ROOTS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on a root for the lifetime of a running session
#[derive(Debug)]
struct RootClaim {
    root: PathBuf,
}

impl RootClaim {
    fn acquire(root: &Path) -> Result<Self, SyncError> {
        let mut roots = claimed_roots()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !roots.insert(root.to_path_buf()) {
            return Err(SyncError::RootBusy(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

impl Drop for RootClaim {
    fn drop(&mut self) {
        claimed_roots()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.root);
    }
}

// ============================================================================
// SyncSession
// ============================================================================

/// Handles kept while the session is running
struct ActiveSession {
    target: SyncTarget,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

/// Mirrors one local directory into one bucket/prefix
pub struct SyncSession {
    connector: Arc<dyn IStoreConnector>,
    checkpoint: Option<Arc<dyn ICheckpointStore>>,
    outcomes: broadcast::Sender<SyncOutcome>,
    state: SessionState,
    active: Option<ActiveSession>,
}

impl SyncSession {
    /// Creates an idle session that will build stores with `connector`
    pub fn new(connector: Arc<dyn IStoreConnector>) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            connector,
            checkpoint: None,
            outcomes,
            state: SessionState::Idle,
            active: None,
        }
    }

    /// Persists target and credentials through `checkpoint` on every successful start
    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn ICheckpointStore>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// The validated target of the running session
    pub fn target(&self) -> Option<&SyncTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    /// Receives every outcome produced from now on, across restarts
    pub fn subscribe(&self) -> broadcast::Receiver<SyncOutcome> {
        self.outcomes.subscribe()
    }

    /// Starts mirroring `target` with `credentials`
    ///
    /// # Errors
    /// - `SyncError::AlreadyRunning` if the session is not idle
    /// - `SyncError::Config` if the root is not a readable directory, the
    ///   bucket is empty, or the store rejects the bucket
    /// - `SyncError::RootBusy` if another session mirrors the same root
    /// - `SyncError::Auth` if the store cannot be built with `credentials`
    /// - `SyncError::Watch` if the recursive watch cannot be registered
    pub async fn start(
        &mut self,
        target: SyncTarget,
        credentials: &Credentials,
    ) -> Result<(), SyncError> {
        if self.state != SessionState::Idle {
            return Err(SyncError::AlreadyRunning);
        }

        let target = target
            .validated()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let claim = RootClaim::acquire(target.root())?;

        let store = self.connector.connect(credentials, target.bucket()).await?;

        let (mut watcher, events) =
            FileWatcher::new(EVENT_CHANNEL_CAPACITY).map_err(|e| SyncError::Watch {
                path: target.root().to_path_buf(),
                message: format!("{e:#}"),
            })?;
        watcher.watch(target.root()).map_err(|e| SyncError::Watch {
            path: target.root().to_path_buf(),
            message: format!("{e:#}"),
        })?;

        let translator =
            ChangeTranslator::new(store, target.clone()).with_outcomes(self.outcomes.clone());
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_worker(
            Worker {
                translator,
                events,
                watcher,
                claim,
            },
            shutdown.clone(),
        ));

        if let Some(checkpoint) = &self.checkpoint {
            if let Err(e) = checkpoint.save(&target, credentials) {
                warn!(error = %e, "Failed to persist session checkpoint");
            }
        }

        info!(
            sync_target = %target,
            explicit_credentials = credentials.is_explicit(),
            "Sync session started"
        );

        self.active = Some(ActiveSession {
            target,
            shutdown,
            worker,
        });
        self.state = SessionState::Running;
        Ok(())
    }

    /// Stops the session and waits for the worker to exit
    ///
    /// No-op when idle. After this returns no further remote call is made
    /// on behalf of this run.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            debug!("Stop requested while idle");
            return;
        };
        self.state = SessionState::Stopping;
        info!(sync_target = %active.target, "Stopping sync session");

        let ActiveSession {
            target,
            shutdown,
            worker,
        } = active;

        shutdown.cancel();
        if let Err(e) = worker.await {
            if e.is_panic() {
                error!(error = %e, "Sync worker panicked");
            } else {
                warn!(error = %e, "Sync worker was cancelled");
            }
        }

        self.state = SessionState::Idle;
        info!(sync_target = %target, "Sync session stopped");
    }
}

// The detached worker finishes its in-flight call, then releases the watch
// and the root.
impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.shutdown.cancel();
        }
    }
}

// ============================================================================
// Worker loop
// ============================================================================

/// Everything the worker task owns for one run
struct Worker {
    translator: ChangeTranslator,
    events: mpsc::Receiver<ChangeEvent>,
    watcher: FileWatcher,
    claim: RootClaim,
}

/// Consumes change events one at a time until cancelled or the channel closes
async fn run_worker(worker: Worker, shutdown: CancellationToken) {
    let Worker {
        translator,
        mut events,
        mut watcher,
        claim,
    } = worker;
    let root = translator.target().root().to_path_buf();

    debug!(root = %root.display(), "Sync worker started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    translator.handle(event).await;
                }
                None => break,
            },
        }
    }

    // Unblocks the watcher thread if it is waiting on a full channel.
    drop(events);
    if let Err(e) = watcher.unwatch(&root) {
        debug!(error = %e, "Unwatch failed, dropping watcher anyway");
    }
    drop(watcher);
    drop(claim);
    debug!(root = %root.display(), "Sync worker exited");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use s3mirror_store::MemoryConnector;

    use super::*;

    #[derive(Default)]
    struct RecordingCheckpoint {
        saved: StdMutex<Vec<(SyncTarget, Credentials)>>,
    }

    impl ICheckpointStore for RecordingCheckpoint {
        fn save(&self, target: &SyncTarget, credentials: &Credentials) -> anyhow::Result<()> {
            self.saved
                .lock()
                .unwrap()
                .push((target.clone(), credentials.clone()));
            Ok(())
        }
    }

    struct FailingCheckpoint;

    impl ICheckpointStore for FailingCheckpoint {
        fn save(&self, _: &SyncTarget, _: &Credentials) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn target_in(dir: &tempfile::TempDir) -> SyncTarget {
        SyncTarget::new(dir.path(), "bucket", "pfx")
    }

    #[tokio::test]
    async fn new_session_is_idle() {
        let session = SyncSession::new(Arc::new(MemoryConnector::default()));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_running());
        assert!(session.target().is_none());
    }

    #[tokio::test]
    async fn start_and_stop_transition_states() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SyncSession::new(Arc::new(MemoryConnector::default()));

        session
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(
            session.target().unwrap().root(),
            dir.path().canonicalize().unwrap()
        );

        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.target().is_none());
    }

    #[tokio::test]
    async fn start_while_running_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SyncSession::new(Arc::new(MemoryConnector::default()));
        session
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap();

        let err = session
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AlreadyRunning));
        assert!(session.is_running());

        session.stop().await;
    }

    #[tokio::test]
    async fn stop_when_idle_is_noop() {
        let mut session = SyncSession::new(Arc::new(MemoryConnector::default()));
        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn missing_root_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SyncSession::new(Arc::new(MemoryConnector::default()));

        let err = session
            .start(
                SyncTarget::new(dir.path().join("missing"), "bucket", ""),
                &Credentials::Ambient,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_error_and_release_root() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::default());
        connector.reject_auth("invalid access key");
        let mut session = SyncSession::new(connector.clone());

        let err = session
            .start(target_in(&dir), &Credentials::explicit("a", "s"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
        assert_eq!(session.state(), SessionState::Idle);

        connector.accept();
        session
            .start(target_in(&dir), &Credentials::explicit("a", "s"))
            .await
            .unwrap();
        session.stop().await;
    }

    #[tokio::test]
    async fn unknown_bucket_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::default());
        connector.reject_config("bucket does not exist");
        let mut session = SyncSession::new(connector);

        let err = session
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[tokio::test]
    async fn second_session_on_same_root_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let connector: Arc<dyn IStoreConnector> = Arc::new(MemoryConnector::default());
        let mut first = SyncSession::new(connector.clone());
        let mut second = SyncSession::new(connector);

        first
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap();
        let err = second
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RootBusy(_)));

        first.stop().await;
        second
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap();
        second.stop().await;
    }

    #[tokio::test]
    async fn dropping_running_session_releases_root_after_worker_exits() {
        let dir = tempfile::tempdir().unwrap();
        let connector: Arc<dyn IStoreConnector> = Arc::new(MemoryConnector::default());
        {
            let mut session = SyncSession::new(connector.clone());
            session
                .start(target_in(&dir), &Credentials::Ambient)
                .await
                .unwrap();
        }

        // The worker has not been polled since the drop, so the root is still held.
        let mut session = SyncSession::new(connector);
        let err = session
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RootBusy(_)));

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            match session.start(target_in(&dir), &Credentials::Ambient).await {
                Ok(()) => break,
                Err(SyncError::RootBusy(_)) => {
                    assert!(tokio::time::Instant::now() < deadline, "root never released");
                }
                Err(e) => panic!("unexpected start error: {e}"),
            }
        }
        session.stop().await;
    }

    #[tokio::test]
    async fn checkpoint_saved_only_on_successful_start() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Arc::new(RecordingCheckpoint::default());
        let mut session = SyncSession::new(Arc::new(MemoryConnector::default()))
            .with_checkpoint(checkpoint.clone());

        let _ = session
            .start(
                SyncTarget::new(dir.path().join("missing"), "bucket", ""),
                &Credentials::Ambient,
            )
            .await;
        assert!(checkpoint.saved.lock().unwrap().is_empty());

        session
            .start(target_in(&dir), &Credentials::explicit("a", "s"))
            .await
            .unwrap();
        session.stop().await;

        let saved = checkpoint.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0.prefix(), "pfx");
        assert_eq!(saved[0].1, Credentials::explicit("a", "s"));
    }

    #[tokio::test]
    async fn checkpoint_failure_does_not_fail_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SyncSession::new(Arc::new(MemoryConnector::default()))
            .with_checkpoint(Arc::new(FailingCheckpoint));

        session
            .start(target_in(&dir), &Credentials::Ambient)
            .await
            .unwrap();
        assert!(session.is_running());
        session.stop().await;
    }

    #[test]
    fn session_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Running.to_string(), "running");
        assert_eq!(SessionState::Stopping.to_string(), "stopping");
    }
}
