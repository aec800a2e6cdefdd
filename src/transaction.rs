//! Vendor tree transaction.
//!
//! An update may replace packages that are already vendored, so the whole
//! tree is copied to `<vendor>.orig` first and swapped back if the run fails.
//! A run that only adds packages skips the copy; on failure it removes just
//! the package directories it created.

use crate::cancel::CancelToken;
use crate::config::VENDOR_BACKUP_SUFFIX;
use crate::error::{Result, VenError};
use crate::fsutil;
use crate::walker::join_import_path;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct VendorTransaction {
    vendor_dir: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl VendorTransaction {
    /// Starts a transaction over `vendor_dir`, backing it up when `update`
    /// is set and there is something to back up.
    pub fn begin(vendor_dir: &Path, update: bool) -> Result<Self> {
        let backup_dir = if update && vendor_dir.exists() {
            let backup = backup_path(vendor_dir);
            fsutil::remove_dir_all(&backup)?;
            // The backup must complete even if an interrupt is already pending.
            fsutil::copy_dir(vendor_dir, &backup, &CancelToken::new())?;
            debug!("vendor backed up to {}", backup.display());
            Some(backup)
        } else {
            None
        };

        Ok(Self {
            vendor_dir: vendor_dir.to_path_buf(),
            backup_dir,
        })
    }

    pub fn has_backup(&self) -> bool {
        self.backup_dir.is_some()
    }

    /// Drops the backup. Failing to delete it is only worth a warning.
    pub fn commit(self) {
        if let Some(backup) = &self.backup_dir
            && let Err(err) = fsutil::remove_dir_all(backup)
        {
            warn!("cannot delete vendor backup: {}", err);
        }
    }

    /// Restores the tree as it was before [`begin`](Self::begin).
    ///
    /// With a backup the current tree is discarded wholesale. Without one,
    /// only `new_packages` (import paths under the vendor root) are removed,
    /// along with any parent directory left empty.
    pub fn rollback(self, new_packages: &[String]) -> Result<()> {
        if let Some(backup) = &self.backup_dir {
            fsutil::remove_dir_all(&self.vendor_dir)?;
            fs::rename(backup, &self.vendor_dir).map_err(|e| VenError::io(backup, e))?;
            return Ok(());
        }

        for pkg in new_packages {
            let dir = join_import_path(&self.vendor_dir, pkg);
            if let Err(err) = fsutil::remove_dir_all(&dir) {
                warn!("cannot remove pkg ({}): {}", pkg, err);
                continue;
            }
            self.remove_empty_parents(&dir);
        }
        Ok(())
    }

    fn remove_empty_parents(&self, dir: &Path) {
        let mut current = dir.parent();
        while let Some(parent) = current {
            if parent == self.vendor_dir || !parent.starts_with(&self.vendor_dir) {
                break;
            }
            // Stops at the first directory that still has entries.
            if fs::remove_dir(parent).is_err() {
                break;
            }
            current = parent.parent();
        }
    }
}

/// `<vendor>.orig` next to the vendor directory.
pub fn backup_path(vendor_dir: &Path) -> PathBuf {
    let mut name = vendor_dir.as_os_str().to_owned();
    name.push(VENDOR_BACKUP_SUFFIX);
    PathBuf::from(name)
}
