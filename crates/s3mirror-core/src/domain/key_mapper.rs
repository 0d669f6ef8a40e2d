//! Key mapper - local path → remote object key
//!
//! A pure function with no state and no I/O:
//!
//! ```text
//! key = normalize_separators(join(prefix, relative_path(path, root)))
//! ```
//!
//! The relative path is walked component by component and re-joined with
//! `/`, so the key is identical on every host platform.

use std::path::{Component, Path};

use super::errors::DomainError;
use super::newtypes::RemoteKey;

/// Derives the remote key of `path` under `root`, prepending `prefix`
///
/// `prefix` may be empty. Leading, trailing and repeated separators in the
/// prefix are dropped, and a `\` in the prefix is treated as a separator.
/// Segment text, whitespace included, is kept as written.
///
/// # Errors
/// - `DomainError::PathNotInSyncRoot` if `path` does not lie under `root`
/// - `DomainError::InvalidPath` if `path` is the root itself, contains a
///   `..` component, or is not valid UTF-8
pub fn derive_key(root: &Path, path: &Path, prefix: &str) -> Result<RemoteKey, DomainError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        DomainError::PathNotInSyncRoot(format!(
            "{} is not within {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut segments: Vec<&str> = prefix_segments(prefix).collect();
    let prefix_len = segments.len();

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    DomainError::InvalidPath(format!("Path is not valid UTF-8: {}", path.display()))
                })?;
                segments.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DomainError::InvalidPath(format!(
                    "Unexpected component in {}",
                    path.display()
                )));
            }
        }
    }

    if segments.len() == prefix_len {
        return Err(DomainError::InvalidPath(format!(
            "Path refers to the sync root itself: {}",
            path.display()
        )));
    }

    RemoteKey::new(segments.join("/"))
}

/// Normalizes a user-supplied key prefix to its `/`-joined segments
///
/// `"/backup//daily/"` and `"backup\\daily"` both become `"backup/daily"`.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    prefix_segments(prefix).collect::<Vec<_>>().join("/")
}

fn prefix_segments(prefix: &str) -> impl Iterator<Item = &str> {
    prefix
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
}
