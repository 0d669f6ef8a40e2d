//! End-to-end tests: real filesystem watch, in-memory object store.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use s3mirror_core::domain::{Credentials, FailureReason, Operation, RemoteKey, SyncTarget};
use s3mirror_core::ports::{IRemoteStore, IStoreConnector, StoreError};
use s3mirror_store::{MemoryConnector, MemoryRemoteStore, StoreCall};
use s3mirror_sync::{SessionState, SyncError, SyncSession};

const WAIT_LIMIT: Duration = Duration::from_secs(10);
const QUIET_PERIOD: Duration = Duration::from_millis(400);

struct Harness {
    _dir: tempfile::TempDir,
    root: PathBuf,
    store: MemoryRemoteStore,
    session: SyncSession,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let connector = Arc::new(MemoryConnector::default());
        let store = connector.store().clone();
        Self {
            _dir: dir,
            root,
            store,
            session: SyncSession::new(connector),
        }
    }

    fn target(&self, prefix: &str) -> SyncTarget {
        SyncTarget::new(self.root.clone(), "bucket", prefix)
    }

    async fn start(&mut self, prefix: &str) {
        let target = self.target(prefix);
        self.session
            .start(target, &Credentials::Ambient)
            .await
            .unwrap();
    }
}

/// Polls `condition` until it holds or the wait limit is hit
async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn append(path: &Path, data: &[u8]) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(data).unwrap();
}

#[tokio::test]
async fn written_file_is_uploaded_under_prefix() {
    let mut h = Harness::new();
    std::fs::create_dir(h.root.join("a")).unwrap();
    h.start("backup").await;

    let file = h.root.join("a").join("b.txt");
    std::fs::write(&file, b"payload").unwrap();

    wait_for("upload of backup/a/b.txt", || {
        h.store.object("backup/a/b.txt").as_deref() == Some(&b"payload"[..])
    })
    .await;

    for call in h.store.calls() {
        assert_eq!(
            call,
            StoreCall::Put {
                key: "backup/a/b.txt".into(),
                path: file.clone()
            }
        );
    }

    h.session.stop().await;
}

#[tokio::test]
async fn deleted_file_is_deleted_remotely() {
    let mut h = Harness::new();
    std::fs::create_dir(h.root.join("a")).unwrap();
    let file = h.root.join("a").join("b.txt");
    std::fs::write(&file, b"payload").unwrap();
    h.start("backup").await;

    append(&file, b"!");
    wait_for("upload", || h.store.contains("backup/a/b.txt")).await;

    std::fs::remove_file(&file).unwrap();
    wait_for("delete", || h.store.delete_count("backup/a/b.txt") == 1).await;
    assert!(!h.store.contains("backup/a/b.txt"));

    h.session.stop().await;
}

#[tokio::test]
async fn directories_are_not_uploaded() {
    let mut h = Harness::new();
    h.start("").await;

    std::fs::create_dir(h.root.join("empty")).unwrap();
    tokio::time::sleep(QUIET_PERIOD).await;
    assert!(h.store.calls().is_empty());

    h.session.stop().await;
}

#[tokio::test]
async fn create_then_delete_leaves_no_object() {
    let mut h = Harness::new();
    h.start("p").await;

    let file = h.root.join("short-lived.tmp");
    std::fs::write(&file, b"x").unwrap();
    std::fs::remove_file(&file).unwrap();

    wait_for("delete", || h.store.delete_count("p/short-lived.tmp") >= 1).await;
    tokio::time::sleep(QUIET_PERIOD).await;
    assert!(!h.store.contains("p/short-lived.tmp"));

    h.session.stop().await;
}

#[tokio::test]
async fn rename_moves_the_object() {
    let mut h = Harness::new();
    let old = h.root.join("old.txt");
    std::fs::write(&old, b"content").unwrap();
    h.start("").await;

    append(&old, b"+");
    wait_for("initial upload", || h.store.contains("old.txt")).await;

    let new = h.root.join("new.txt");
    std::fs::rename(&old, &new).unwrap();

    wait_for("object under new name", || h.store.contains("new.txt")).await;
    wait_for("old object removed", || !h.store.contains("old.txt")).await;

    h.session.stop().await;
}

#[tokio::test]
async fn transfer_failure_keeps_session_running() {
    let mut h = Harness::new();
    let mut outcomes = h.session.subscribe();
    h.store.fail_key("backup/bad.txt");
    h.start("backup").await;

    std::fs::write(h.root.join("bad.txt"), b"x").unwrap();
    let failed = tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            let outcome = outcomes.recv().await.unwrap();
            if !outcome.is_success() {
                break outcome;
            }
        }
    })
    .await
    .expect("no failure outcome");
    assert_eq!(failed.operation(), Operation::Upload);
    assert_eq!(failed.key().as_str(), "backup/bad.txt");
    assert_eq!(failed.result().failure_reason(), Some(FailureReason::Transfer));

    std::fs::write(h.root.join("good.txt"), b"y").unwrap();
    wait_for("unrelated upload", || h.store.contains("backup/good.txt")).await;
    assert_eq!(h.session.state(), SessionState::Running);
    assert!(!h.store.contains("backup/bad.txt"));

    h.session.stop().await;
}

#[tokio::test]
async fn no_calls_after_stop() {
    let mut h = Harness::new();
    h.start("").await;

    std::fs::write(h.root.join("before.txt"), b"x").unwrap();
    wait_for("upload before stop", || h.store.contains("before.txt")).await;

    h.session.stop().await;
    h.session.stop().await;
    assert_eq!(h.session.state(), SessionState::Idle);
    let calls = h.store.calls().len();

    std::fs::write(h.root.join("after.txt"), b"y").unwrap();
    std::fs::remove_file(h.root.join("before.txt")).unwrap();
    tokio::time::sleep(QUIET_PERIOD).await;

    assert_eq!(h.store.calls().len(), calls);
    assert!(!h.store.contains("after.txt"));
}

#[tokio::test]
async fn restart_delivers_each_event_once() {
    let mut h = Harness::new();
    h.start("").await;
    h.session.stop().await;

    let file = h.root.join("existing.txt");
    std::fs::write(&file, b"v1").unwrap();

    h.start("").await;
    append(&file, b"v2");

    wait_for("upload after restart", || h.store.contains("existing.txt")).await;
    tokio::time::sleep(QUIET_PERIOD).await;
    assert_eq!(h.store.put_count("existing.txt"), 1);
    assert_eq!(h.store.object("existing.txt").as_deref(), Some(&b"v1v2"[..]));

    h.session.stop().await;
}

#[tokio::test]
async fn bad_root_then_corrected_root() {
    let mut h = Harness::new();

    let missing = SyncTarget::new(h.root.join("missing"), "bucket", "");
    let err = h
        .session
        .start(missing, &Credentials::Ambient)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    assert_eq!(h.session.state(), SessionState::Idle);

    h.start("").await;
    assert_eq!(h.session.state(), SessionState::Running);

    std::fs::write(h.root.join("ok.txt"), b"x").unwrap();
    wait_for("upload after corrected start", || h.store.contains("ok.txt")).await;

    h.session.stop().await;
}

#[tokio::test]
async fn second_session_on_same_root_is_rejected() {
    let mut h = Harness::new();
    h.start("").await;

    let mut other = SyncSession::new(Arc::new(MemoryConnector::default()));
    let err = other
        .start(h.target(""), &Credentials::Ambient)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RootBusy(path) if path == h.root));
    assert_eq!(other.state(), SessionState::Idle);

    h.session.stop().await;
}

// ============================================================================
// Stopping under load
// ============================================================================

/// Store whose puts take a while, counting started and finished calls
#[derive(Clone, Default)]
struct SlowStore {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl SlowStore {
    const PUT_LATENCY: Duration = Duration::from_millis(20);

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IRemoteStore for SlowStore {
    async fn put(&self, _key: &RemoteKey, _local_path: &Path) -> Result<(), StoreError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Self::PUT_LATENCY).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _key: &RemoteKey) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl IStoreConnector for SlowStore {
    async fn connect(
        &self,
        _credentials: &Credentials,
        _bucket: &str,
    ) -> Result<Box<dyn IRemoteStore>, StoreError> {
        Ok(Box::new(self.clone()))
    }
}

/// Floods the root with enough events to fill the event channel, then stops
async fn stop_with_backlog() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let store = SlowStore::default();
    let mut session = SyncSession::new(Arc::new(store.clone()));
    session
        .start(
            SyncTarget::new(root.clone(), "bucket", ""),
            &Credentials::Ambient,
        )
        .await
        .unwrap();

    for i in 0..1500 {
        std::fs::write(root.join(format!("file-{i}.txt")), b"x").unwrap();
    }
    wait_for("a few puts", || store.finished() >= 3).await;

    let started_before_stop = store.started();
    tokio::time::timeout(WAIT_LIMIT, session.stop())
        .await
        .expect("stop did not return with a full event backlog");
    assert_eq!(session.state(), SessionState::Idle);

    let started_after_stop = store.started();
    assert!(
        started_after_stop <= started_before_stop + 1,
        "{} puts started after stop was requested",
        started_after_stop - started_before_stop
    );
    // The in-flight put ran to completion
    assert_eq!(store.finished(), started_after_stop);

    tokio::time::sleep(QUIET_PERIOD).await;
    assert_eq!(store.started(), started_after_stop);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_discards_queued_events_on_multi_thread_runtime() {
    stop_with_backlog().await;
}

#[tokio::test]
async fn stop_returns_with_full_backlog_on_current_thread_runtime() {
    stop_with_backlog().await;
}
