//! File watching
//!
//! Provides a [`FileWatcher`] that wraps the `notify` crate to monitor a
//! directory tree recursively, converting raw OS events into [`ChangeEvent`]
//! values delivered through a bounded channel.
//!
//! ## Architecture
//!
//! ```text
//! inotify / FSEvents / kqueue
//!       │
//!       ▼
//!  FileWatcher  ──→  mpsc::channel  ──→  session worker  ──→  ChangeTranslator
//! ```
//!
//! The notify callback runs on the backend's own thread and uses
//! `blocking_send`, so a full channel applies backpressure to the OS event
//! thread instead of dropping events.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

// ============================================================================
// ChangeEvent
// ============================================================================

/// Kind of change observed for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A filesystem change detected by the watcher
///
/// Decoupled from the `notify` crate's raw event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Absolute path of the changed entry
    pub path: PathBuf,
    pub is_directory: bool,
}

impl ChangeEvent {
    /// A change to a regular file
    pub fn file(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            is_directory: false,
        }
    }

    /// A change to a directory
    pub fn directory(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            is_directory: true,
        }
    }
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Watches directories for changes using the OS-native mechanism
///
/// Dropping the watcher unregisters every watch and closes the sending side
/// of the event channel once the backend thread lets go of it.
///
/// ## Usage
///
/// ```ignore
/// let (mut watcher, rx) = FileWatcher::new(1024)?;
/// watcher.watch(Path::new("/home/user/data"))?;
/// // rx.recv().await to get events
/// drop(watcher); // stops watching
/// ```
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates a new `FileWatcher` and the receiver for its events
    ///
    /// # Arguments
    /// * `capacity` - Number of events buffered before the OS event thread blocks
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new(capacity: usize) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(capacity);

        debug!(capacity, "Initializing file watcher");

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for change in map_notify_event(&event) {
                        if event_tx.blocking_send(change).is_err() {
                            debug!("Dropping change event, receiver closed");
                            return;
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, event_rx))
    }

    /// Starts watching a directory recursively
    ///
    /// # Errors
    /// Returns an error if the path cannot be watched (e.g., does not exist,
    /// insufficient permissions, or inotify watch limit reached)
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Starting recursive watch");

        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }

    /// Stops watching a directory
    ///
    /// # Errors
    /// Returns an error if the path was not being watched
    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Stopping watch");

        self.watcher
            .unwatch(path)
            .with_context(|| format!("Failed to unwatch path: {}", path.display()))
    }
}

// ============================================================================
// Event mapping - notify::Event → ChangeEvent
// ============================================================================

/// Converts a `notify::Event` into zero or more [`ChangeEvent`]s
///
/// Maps the notify event kinds as follows:
/// - `Create(*)` -> `Created`
/// - `Remove(*)` -> `Deleted`
/// - `Modify(Name(From))` -> `Deleted` (moved away)
/// - `Modify(Name(To))` -> `Created` (moved in)
/// - `Modify(Name(Any | Other))` -> `Created` if the path exists, else `Deleted`
/// - `Modify(Name(Both))` -> ignored, the From/To pair already covers it
/// - Other `Modify(*)` -> `Modified`
///
/// Access events and unknown kinds are ignored.
pub(crate) fn map_notify_event(event: &notify::Event) -> Vec<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(kind) => paths
            .iter()
            .map(|path| {
                let is_directory = match kind {
                    CreateKind::Folder => true,
                    CreateKind::File => false,
                    _ => path.is_dir(),
                };
                debug!(path = %path.display(), is_directory, "Mapped Create event");
                ChangeEvent {
                    kind: ChangeKind::Created,
                    path: path.clone(),
                    is_directory,
                }
            })
            .collect(),

        EventKind::Remove(kind) => paths
            .iter()
            .map(|path| {
                let is_directory = matches!(kind, RemoveKind::Folder);
                debug!(path = %path.display(), is_directory, "Mapped Remove event");
                ChangeEvent {
                    kind: ChangeKind::Deleted,
                    path: path.clone(),
                    is_directory,
                }
            })
            .collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            debug!(paths = ?paths, "Ignoring paired rename event");
            Vec::new()
        }

        EventKind::Modify(ModifyKind::Name(mode)) => paths
            .iter()
            .map(|path| {
                let kind = match mode {
                    RenameMode::From => ChangeKind::Deleted,
                    RenameMode::To => ChangeKind::Created,
                    _ if path.exists() => ChangeKind::Created,
                    _ => ChangeKind::Deleted,
                };
                let is_directory = kind == ChangeKind::Created && path.is_dir();
                debug!(path = %path.display(), ?kind, "Mapped Rename event");
                ChangeEvent {
                    kind,
                    path: path.clone(),
                    is_directory,
                }
            })
            .collect(),

        EventKind::Modify(_) => paths
            .iter()
            .map(|path| {
                debug!(path = %path.display(), kind = ?event.kind, "Mapped Modify event");
                ChangeEvent {
                    kind: ChangeKind::Modified,
                    path: path.clone(),
                    is_directory: path.is_dir(),
                }
            })
            .collect(),

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            Vec::new()
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
