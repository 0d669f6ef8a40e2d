//! Key command - Show where a local file is mirrored
//!
//! `s3mirror key <path>` maps a local path to its remote key under the
//! configured target, using the same mapping the sync engine uses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use s3mirror_core::config::Config;
use s3mirror_core::domain::{RemoteKey, SyncTarget};

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct KeyCommand {
    /// Local file path (may be relative to the current directory)
    pub path: PathBuf,
}

impl KeyCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let config = Config::load_or_default(config_path);
        let target = config.sync_target();
        let key = key_for(&target, &self.path)?;

        if format.is_json() {
            get_formatter(format).print_json(&serde_json::json!({
                "path": self.path.display().to_string(),
                "bucket": target.bucket(),
                "key": key.as_str(),
                "uri": format!("s3://{}/{}", target.bucket(), key),
            }));
        } else {
            println!("{key}");
        }
        Ok(())
    }
}

/// Resolves `path` and the target root the way the watcher reports them
fn key_for(target: &SyncTarget, path: &Path) -> Result<RemoteKey> {
    let root = resolve(target.root())?;
    let path = resolve(path)?;
    let resolved = SyncTarget::new(root, target.bucket(), target.prefix());
    resolved
        .key_for(&path)
        .with_context(|| format!("Cannot map {} under {}", path.display(), resolved.root().display()))
}

/// Absolute, symlink-resolved form of `path`
///
/// Paths that no longer exist (deleted files) are resolved through their
/// parent directory.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Cannot determine current directory")?
            .join(path)
    };

    if let Ok(canonical) = absolute.canonicalize() {
        return Ok(canonical);
    }
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(absolute),
        },
        _ => Ok(absolute),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        let file = dir.path().join("a").join("b.txt");
        std::fs::write(&file, b"x").unwrap();

        let target = SyncTarget::new(dir.path(), "bucket", "backup");
        assert_eq!(key_for(&target, &file).unwrap().as_str(), "backup/a/b.txt");
    }

    #[test]
    fn test_key_for_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = SyncTarget::new(dir.path(), "bucket", "");
        let gone = dir.path().join("gone.txt");
        assert_eq!(key_for(&target, &gone).unwrap().as_str(), "gone.txt");
    }

    #[test]
    fn test_key_for_path_outside_root_fails() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let target = SyncTarget::new(root.path(), "bucket", "");
        assert!(key_for(&target, &other.path().join("x.txt")).is_err());
    }

    #[test]
    fn test_resolve_keeps_absolute_missing_path() {
        let path = Path::new("/definitely/not/here.txt");
        assert_eq!(resolve(path).unwrap(), path);
    }
}
