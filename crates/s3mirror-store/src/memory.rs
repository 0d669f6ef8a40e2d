//! In-memory object store
//!
//! [`MemoryRemoteStore`] keeps objects in a shared map and records every call
//! it receives, so dry runs can report what would have been transferred and
//! tests can assert on the exact sequence of puts and deletes. Failures can be
//! injected per key or for the next N calls.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use s3mirror_core::domain::{Credentials, RemoteKey};
use s3mirror_core::ports::{IRemoteStore, IStoreConnector, StoreError};

/// A call received by [`MemoryRemoteStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Put { key: String, path: PathBuf },
    Delete { key: String },
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    calls: Vec<StoreCall>,
    failing_keys: HashSet<String>,
    fail_next: usize,
}

impl State {
    fn take_injected_failure(&mut self, key: &str) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        self.failing_keys.contains(key)
    }
}

// ============================================================================
// MemoryRemoteStore
// ============================================================================

/// Object store held in process memory
///
/// Clones share the same objects and call log.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<State>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all stored objects by key
    pub fn objects(&self) -> BTreeMap<String, Vec<u8>> {
        self.state().objects.clone()
    }

    /// Contents stored at `key`
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    /// Every call received so far, in arrival order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Number of put calls that targeted `key`
    pub fn put_count(&self, key: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Put { key: k, .. } if k == key))
            .count()
    }

    /// Number of delete calls that targeted `key`
    pub fn delete_count(&self, key: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Delete { key: k } if k == key))
            .count()
    }

    /// Makes every call on `key` fail with a transfer error
    pub fn fail_key(&self, key: impl Into<String>) {
        self.state().failing_keys.insert(key.into());
    }

    /// Makes the next `count` calls fail regardless of key
    pub fn fail_next(&self, count: usize) {
        self.state().fail_next = count;
    }

    /// Removes all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_keys.clear();
        state.fail_next = 0;
    }
}

#[async_trait]
impl IRemoteStore for MemoryRemoteStore {
    async fn put(&self, key: &RemoteKey, local_path: &Path) -> Result<(), StoreError> {
        self.state().calls.push(StoreCall::Put {
            key: key.to_string(),
            path: local_path.to_path_buf(),
        });

        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| StoreError::local_read(local_path, e))?;

        let mut state = self.state();
        if state.take_injected_failure(key.as_str()) {
            return Err(StoreError::transfer(key, "injected failure"));
        }
        debug!(key = %key, size = data.len(), "Stored object in memory");
        state.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &RemoteKey) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(StoreCall::Delete {
            key: key.to_string(),
        });

        if state.take_injected_failure(key.as_str()) {
            return Err(StoreError::transfer(key, "injected failure"));
        }
        state.objects.remove(key.as_str());
        Ok(())
    }
}

// ============================================================================
// MemoryConnector
// ============================================================================

#[derive(Debug, Clone)]
enum Rejection {
    Auth(String),
    Config(String),
}

/// [`IStoreConnector`] handing out clones of one [`MemoryRemoteStore`]
///
/// The bucket name is recorded but not used to partition objects.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    store: MemoryRemoteStore,
    rejection: Mutex<Option<Rejection>>,
    connections: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new(store: MemoryRemoteStore) -> Self {
        Self {
            store,
            rejection: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &MemoryRemoteStore {
        &self.store
    }

    /// Makes subsequent connects fail with an authentication error
    pub fn reject_auth(&self, message: impl Into<String>) {
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Rejection::Auth(message.into()));
    }

    /// Makes subsequent connects fail with a configuration error
    pub fn reject_config(&self, message: impl Into<String>) {
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Rejection::Config(message.into()));
    }

    /// Lets subsequent connects succeed again
    pub fn accept(&self) {
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Buckets of all successful connects, in order
    pub fn connections(&self) -> Vec<String> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl IStoreConnector for MemoryConnector {
    async fn connect(
        &self,
        _credentials: &Credentials,
        bucket: &str,
    ) -> Result<Box<dyn IRemoteStore>, StoreError> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(StoreError::Config("bucket name is empty".to_string()));
        }

        let rejection = self
            .rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match rejection {
            Some(Rejection::Auth(msg)) => return Err(StoreError::Auth(msg)),
            Some(Rejection::Config(msg)) => return Err(StoreError::Config(msg)),
            None => {}
        }

        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bucket.to_string());
        Ok(Box::new(self.store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> RemoteKey {
        RemoteKey::new(s.to_string()).unwrap()
    }

    #[tokio::test]
    async fn put_stores_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();

        let store = MemoryRemoteStore::new();
        store.put(&key("backup/a.txt"), &file).await.unwrap();

        assert_eq!(store.object("backup/a.txt").as_deref(), Some(&b"hello"[..]));
        assert_eq!(store.put_count("backup/a.txt"), 1);
        assert_eq!(
            store.calls(),
            vec![StoreCall::Put {
                key: "backup/a.txt".into(),
                path: file
            }]
        );
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        let store = MemoryRemoteStore::new();

        std::fs::write(&file, b"one").unwrap();
        store.put(&key("a.txt"), &file).await.unwrap();
        std::fs::write(&file, b"two").unwrap();
        store.put(&key("a.txt"), &file).await.unwrap();

        assert_eq!(store.object("a.txt").as_deref(), Some(&b"two"[..]));
        assert_eq!(store.objects().len(), 1);
    }

    #[tokio::test]
    async fn put_of_missing_file_is_local_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryRemoteStore::new();

        let err = store
            .put(&key("gone.txt"), &dir.path().join("gone.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LocalRead { .. }));
        assert_eq!(store.put_count("gone.txt"), 1);
        assert!(!store.contains("gone.txt"));
    }

    #[tokio::test]
    async fn delete_missing_key_succeeds() {
        let store = MemoryRemoteStore::new();
        store.delete(&key("nothing")).await.unwrap();
        assert_eq!(store.delete_count("nothing"), 1);
    }

    #[tokio::test]
    async fn injected_failures() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        let store = MemoryRemoteStore::new();

        store.fail_key("bad");
        assert!(matches!(
            store.put(&key("bad"), &file).await,
            Err(StoreError::Transfer { .. })
        ));
        store.put(&key("good"), &file).await.unwrap();

        store.fail_next(1);
        assert!(store.delete(&key("good")).await.is_err());
        assert!(store.contains("good"));
        store.delete(&key("good")).await.unwrap();
        assert!(!store.contains("good"));

        store.clear_failures();
        store.put(&key("bad"), &file).await.unwrap();
        assert!(store.contains("bad"));
    }

    #[tokio::test]
    async fn connector_shares_store_and_records_buckets() {
        let connector = MemoryConnector::default();
        let handle = connector
            .connect(&Credentials::Ambient, " bucket ")
            .await
            .unwrap();
        handle.delete(&key("k")).await.unwrap();

        assert_eq!(connector.connections(), vec!["bucket".to_string()]);
        assert_eq!(connector.store().delete_count("k"), 1);
    }

    #[tokio::test]
    async fn connector_rejections() {
        let connector = MemoryConnector::default();

        assert!(matches!(
            connector.connect(&Credentials::Ambient, "").await,
            Err(StoreError::Config(_))
        ));

        connector.reject_auth("bad keys");
        assert!(matches!(
            connector.connect(&Credentials::Ambient, "b").await,
            Err(StoreError::Auth(msg)) if msg == "bad keys"
        ));

        connector.reject_config("no such bucket");
        assert!(matches!(
            connector.connect(&Credentials::Ambient, "b").await,
            Err(StoreError::Config(_))
        ));

        connector.accept();
        assert!(connector.connect(&Credentials::Ambient, "b").await.is_ok());
        assert_eq!(connector.connections().len(), 1);
    }
}
