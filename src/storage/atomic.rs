//! Crash-safe file replacement.
//!
//! Content is written to a uniquely named sibling temp file, fsynced, then
//! renamed over the target. Readers see either the old file or the new one,
//! never a partial write.

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::error::{RalphError, Result};

/// Temp-file path next to `path`: `.{name}.{pid}.{16 hex chars}.tmp`.
#[must_use]
pub fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("prd");
    let mut nonce = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut nonce);
    parent.join(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        hex::encode(nonce)
    ))
}

/// Blocking atomic replace of `path` with `content`.
///
/// # Errors
///
/// Returns [`RalphError::CrossDeviceRename`] when the rename would cross
/// filesystems and [`RalphError::AtomicWrite`] for any other I/O failure.
/// The temp file is removed on failure.
pub fn write_atomic_sync(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = temp_path_for(path);

    let result = write_and_rename(&temp_path, path, content);
    if result.is_err() {
        // Best effort; the original error is what matters.
        let _ = std::fs::remove_file(&temp_path);
    }

    result.map_err(|source| write_error(path, source))
}

/// A cross-filesystem rename is never retried as a copy.
fn write_error(path: &Path, source: std::io::Error) -> RalphError {
    if source.kind() == ErrorKind::CrossesDevices {
        RalphError::CrossDeviceRename {
            path: path.to_path_buf(),
        }
    } else {
        RalphError::AtomicWrite {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn write_and_rename(temp_path: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    {
        let mut file = File::create(temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    std::fs::rename(temp_path, path)
}

/// Async atomic replace; the blocking I/O runs on the blocking pool.
///
/// # Errors
///
/// See [`write_atomic_sync`].
pub async fn atomic_write(path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    let content = content.into();
    tokio::task::spawn_blocking(move || write_atomic_sync(&path, &content))
        .await
        .map_err(|e| RalphError::Other(anyhow::anyhow!("atomic write task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temps(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn temp_name_is_hidden_sibling_with_pid() {
        let temp = temp_path_for(Path::new("/work/prd.json"));
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert_eq!(temp.parent(), Some(Path::new("/work")));
        assert!(name.starts_with(".prd.json."));
        assert!(name.contains(&std::process::id().to_string()));
        assert!(name.ends_with(".tmp"));
        assert_ne!(temp, temp_path_for(Path::new("/work/prd.json")));
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        let temp = temp_path_for(Path::new("prd.json"));
        assert_eq!(temp.parent(), Some(Path::new(".")));
    }

    #[test]
    fn sync_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prd.json");
        std::fs::write(&path, "old").unwrap();
        write_atomic_sync(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn failed_write_cleans_up_and_keeps_target() {
        let dir = TempDir::new().unwrap();
        // Renaming a file over a non-empty directory fails.
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let err = write_atomic_sync(&target, b"data").unwrap_err();
        assert!(matches!(err, RalphError::AtomicWrite { .. }));
        assert!(target.join("keep").exists());
        assert!(leftover_temps(dir.path()).is_empty());
    }

    #[test]
    fn missing_parent_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("prd.json");
        assert!(write_atomic_sync(&path, b"x").is_err());
    }

    #[test]
    fn cross_device_rename_fails_loudly() {
        let path = Path::new("/mnt/other/prd.json");
        let err = write_error(path, std::io::Error::from(ErrorKind::CrossesDevices));
        assert!(matches!(&err, RalphError::CrossDeviceRename { path: p } if p == path));
        assert_eq!(err.error_code(), "RALPH-L003");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("cross-filesystem"));

        let err = write_error(path, std::io::Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(err, RalphError::AtomicWrite { .. }));
    }

    #[tokio::test]
    async fn async_write_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prd.json");
        atomic_write(&path, "{\"tasks\":[]}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"tasks\":[]}");
    }
}
