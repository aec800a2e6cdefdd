//! Directory copy and removal helpers shared by local fetches and vendor backups.

use crate::cancel::CancelToken;
use crate::error::{Result, VenError};
use std::fs;
use std::io;
use std::path::Path;

/// Copies `src` into the not yet existing directory `dst`, entry by entry.
///
/// Checks `cancel` before every entry, so an interrupt leaves a partial copy
/// that the caller is expected to clean up.
pub fn copy_dir(src: &Path, dst: &Path, cancel: &CancelToken) -> Result<()> {
    cancel.checkpoint()?;

    let meta = match fs::metadata(src) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(VenError::SourceMissing {
                path: src.to_path_buf(),
            });
        }
        Err(e) => return Err(VenError::io(src, e)),
    };
    if !meta.is_dir() {
        return Err(VenError::io(
            src,
            io::Error::new(io::ErrorKind::InvalidInput, "path is not a directory"),
        ));
    }
    if fs::symlink_metadata(dst).is_ok() {
        return Err(VenError::DestinationExists {
            path: dst.to_path_buf(),
        });
    }

    copy_tree(src, dst, cancel)
}

fn copy_tree(src: &Path, dst: &Path, cancel: &CancelToken) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| VenError::io(dst, e))?;
    if let Ok(meta) = fs::metadata(src) {
        let _ = fs::set_permissions(dst, meta.permissions());
    }

    for entry in fs::read_dir(src).map_err(|e| VenError::io(src, e))? {
        cancel.checkpoint()?;
        let entry = entry.map_err(|e| VenError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let ty = entry.file_type().map_err(|e| VenError::io(&from, e))?;

        if ty.is_dir() {
            copy_tree(&from, &to, cancel)?;
        } else if ty.is_symlink() {
            copy_symlink(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| VenError::io(&from, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = fs::read_link(from).map_err(|e| VenError::io(from, e))?;
    std::os::unix::fs::symlink(&target, to).map_err(|e| VenError::io(to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    if from.is_dir() {
        copy_tree(from, to, &CancelToken::new())
    } else {
        fs::copy(from, to).map(|_| ()).map_err(|e| VenError::io(from, e))
    }
}

/// Removes `path` and everything below it; a missing path is not an error.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VenError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_copies_tree() -> Result<()> {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("top.go"), "package top").unwrap();
        fs::write(src.join("a/b/deep.go"), "package b").unwrap();

        let dst = tmp.path().join("dst");
        copy_dir(&src, &dst, &CancelToken::new())?;
        assert_eq!(fs::read_to_string(dst.join("top.go")).unwrap(), "package top");
        assert_eq!(fs::read_to_string(dst.join("a/b/deep.go")).unwrap(), "package b");
        Ok(())
    }

    #[test]
    fn test_copy_dir_refuses_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        assert!(matches!(
            copy_dir(&src, &dst, &CancelToken::new()),
            Err(VenError::DestinationExists { .. })
        ));
    }

    #[test]
    fn test_copy_dir_missing_source() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            copy_dir(&tmp.path().join("nope"), &tmp.path().join("dst"), &CancelToken::new()),
            Err(VenError::SourceMissing { .. })
        ));
    }

    #[test]
    fn test_copy_dir_observes_cancellation() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            copy_dir(&src, &tmp.path().join("dst"), &cancel),
            Err(VenError::Cancelled)
        ));
        assert!(!tmp.path().join("dst").exists());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        assert!(remove_dir_all(&tmp.path().join("missing")).is_ok());
    }
}
