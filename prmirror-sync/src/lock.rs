//! Single-writer guard for the data directory.
//!
//! ```text
//! <data>/
//!   update.lock       (advisory exclusive lock, held for the whole update)
//! ```
//!
//! The lock is released when the guard drops, or by the OS if the process dies.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{io_err, SyncError};

pub const LOCK_FILE: &str = "update.lock";

/// Held while a reconciliation or queue run is in progress.
#[derive(Debug)]
pub struct UpdateLock {
    path: PathBuf,
    file: File,
}

impl UpdateLock {
    /// Take the lock without waiting. Fails with [`SyncError::Locked`] if
    /// another process holds it.
    pub fn acquire(data_dir: &Path) -> Result<Self, SyncError> {
        std::fs::create_dir_all(data_dir).map_err(|e| io_err(data_dir, e))?;
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        if file.try_lock_exclusive().is_err() {
            return Err(SyncError::Locked { path });
        }
        tracing::debug!("acquired {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("failed to release {}: {e}", self.path.display());
        }
    }
}
