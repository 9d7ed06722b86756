//! File system helpers for staging.
//!
//! Thin wrappers over `tokio::fs` that create parent directories and attach
//! the path to every error.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::path::Path;
use tokio::fs;

/// Writes `contents` to `path`, creating any parent directories.
pub async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }
    fs::write(path, contents).await.fs_context("writing file", path)
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .await
            .fs_context("removing directory", path)?;
    }
    Ok(())
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::GenericError(format!("{from:?} does not exist")));
    }
    if !from.is_file() {
        return Err(Error::GenericError(format!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

/// Moves a file, replacing any existing file at `to`.
///
/// Falls back to copy and delete when a rename is not possible (e.g. across
/// file systems).
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        fs::remove_file(to).await.fs_context("removing old file", to)?;
    }
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    copy_file(from, to).await?;
    fs::remove_file(from)
        .await
        .fs_context("removing moved file", from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_move_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("RPMS/aarch64/game.rpm");
        let to = dir.path().join("game.rpm");
        write_file(&from, "new").await.unwrap();
        write_file(&to, "old").await.unwrap();

        move_file(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_file(&dir.path().join("nope"), &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_remove_missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_dir_all(&dir.path().join("gone")).await.is_ok());
    }
}
