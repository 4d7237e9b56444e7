//! Environment directory management for the mapped key/value backend.
//!
//! ```text
//! <env_path>/
//! ├─ data.kv           # Append-only log of committed write batches
//! └─ LOCK              # Advisory lock for the single writer
//! ```
//!
//! Writers hold an exclusive lock on `LOCK` for as long as the directory
//! handle lives. Readers never touch the lock, so any number of them can
//! map the log while one writer appends to it.

use crate::config::OpenMode;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File names within the environment directory.
const DATA_FILE: &str = "data.kv";
const LOCK_FILE: &str = "LOCK";

/// An environment directory, locked when opened for writing.
///
/// # Example
///
/// ```rust,ignore
/// use dbhandler_core::dir::EnvDir;
/// use dbhandler_core::OpenMode;
/// use std::path::Path;
///
/// let dir = EnvDir::open(Path::new("data/lmdb/biz_card"), OpenMode::Append, false)?;
/// println!("log: {:?}", dir.data_path());
/// ```
#[derive(Debug)]
pub struct EnvDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle, held for exclusive write access.
    lock_file: Option<File>,
}

impl EnvDir {
    /// Opens an environment directory for `mode`.
    ///
    /// - [`OpenMode::Read`]: the directory and its data file must exist.
    /// - [`OpenMode::Create`]: the path must not exist unless `force`, in
    ///   which case the old content is removed first.
    /// - [`OpenMode::Append`]: the directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is missing in read mode (`NotFound`)
    /// - The path exists in create mode without `force` (`AlreadyExists`)
    /// - Another process holds the writer lock (`Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, mode: OpenMode, force: bool) -> StoreResult<Self> {
        match mode {
            OpenMode::Read => Self::open_read(path),
            OpenMode::Create => {
                if path.exists() {
                    if !force {
                        return Err(StoreError::already_exists(path));
                    }
                    Self::remove_existing(path)?;
                }
                fs::create_dir_all(path)?;
                Self::open_locked(path)
            }
            OpenMode::Append => {
                fs::create_dir_all(path)?;
                Self::open_locked(path)
            }
        }
    }

    fn open_read(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::path_not_found(path));
        }
        if !path.is_dir() {
            return Err(StoreError::invalid_format(format!(
                "path is not an environment directory: {}",
                path.display()
            )));
        }
        let dir = Self {
            path: path.to_path_buf(),
            lock_file: None,
        };
        if !dir.data_path().exists() {
            return Err(StoreError::not_found(format!(
                "{} has no data file",
                path.display()
            )));
        }
        Ok(dir)
    }

    fn open_locked(path: &Path) -> StoreResult<Self> {
        if !path.is_dir() {
            return Err(StoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        // Try to acquire exclusive lock (non-blocking)
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file: Some(lock_file),
        })
    }

    /// Removes an existing environment, refusing if a writer holds it.
    fn remove_existing(path: &Path) -> StoreResult<()> {
        if path.is_dir() {
            let lock_path = path.join(LOCK_FILE);
            if lock_path.exists() {
                let lock_file = OpenOptions::new().read(true).write(true).open(&lock_path)?;
                if lock_file.try_lock_exclusive().is_err() {
                    return Err(StoreError::Locked {
                        path: path.to_path_buf(),
                    });
                }
                // Released when `lock_file` drops, before the directory goes
            }
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Returns the path to the environment directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the batch log.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    /// Returns `true` while the writer lock is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_file.is_some()
    }

    /// Releases the writer lock early. Idempotent.
    pub fn unlock(&mut self) {
        if let Some(file) = self.lock_file.take() {
            // Closing the descriptor releases the lock even if this fails
            let _ = fs2::FileExt::unlock(&file);
        }
    }

    /// Syncs the directory so newly created files survive a crash.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    /// Directory fsync is not supported on this platform.
    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}
