//! Memory-mapped key/value environment.

use crate::config::OpenMode;
use crate::dir::EnvDir;
use crate::error::{StoreError, StoreResult};
use crate::kv::batch::{self, WriteBatch};
use dbhandler_storage::{AccessPattern, FileBackend, MappedFile, StorageBackend};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Location of a value in the mapped log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueRef {
    offset: u64,
    len: u32,
}

/// A directory-backed key/value environment.
///
/// Values live in an append-only log that is memory-mapped for reads.
/// An in-memory index maps each key to its latest value. Writers hold the
/// directory lock; readers take no lock and can [`Environment::refresh`]
/// to observe batches committed since they opened.
#[derive(Debug)]
pub struct Environment {
    dir: EnvDir,
    writer: Option<FileBackend>,
    map: MappedFile,
    index: HashMap<Vec<u8>, ValueRef>,
    scanned_to: u64,
    sync_on_commit: bool,
}

impl Environment {
    /// Opens the environment at `path`.
    ///
    /// Torn batches at the end of the log are ignored; a writable
    /// environment also truncates them away.
    ///
    /// # Errors
    ///
    /// Returns the [`EnvDir::open`] errors, or an I/O error if the log
    /// cannot be opened or mapped.
    pub fn open(path: &Path, mode: OpenMode, force: bool, sync_on_commit: bool) -> StoreResult<Self> {
        let dir = EnvDir::open(path, mode, force)?;
        let data_path = dir.data_path();

        let writer = if mode.is_writable() {
            let created = !data_path.exists();
            let backend = FileBackend::open(&data_path)?;
            if created {
                dir.sync_directory()?;
            }
            Some(backend)
        } else {
            None
        };

        let map = MappedFile::open(&data_path, AccessPattern::Random)?;

        let mut env = Self {
            dir,
            writer,
            map,
            index: HashMap::new(),
            scanned_to: 0,
            sync_on_commit,
        };
        env.replay()?;
        Ok(env)
    }

    /// Rebuilds the index from the start of the log.
    fn replay(&mut self) -> StoreResult<()> {
        let outcome = batch::scan(self.map.as_slice(), 0);
        for entry in outcome.entries {
            self.index.insert(
                entry.key,
                ValueRef {
                    offset: entry.value_offset,
                    len: entry.value_len,
                },
            );
        }
        self.scanned_to = outcome.valid_end;

        if let Some(reason) = outcome.stopped {
            match self.writer.as_mut() {
                Some(writer) => {
                    warn!(
                        path = %self.dir.path().display(),
                        valid_end = outcome.valid_end,
                        "truncating torn log tail: {reason}"
                    );
                    writer.truncate(outcome.valid_end)?;
                    self.map.remap()?;
                }
                None => {
                    debug!(
                        path = %self.dir.path().display(),
                        "ignoring incomplete log tail: {reason}"
                    );
                }
            }
        }

        debug!(
            path = %self.dir.path().display(),
            batches = outcome.batches,
            entries = self.index.len(),
            "environment replayed"
        );
        Ok(())
    }

    /// Indexes batches appended after the last scanned offset.
    ///
    /// Returns the number of new batches.
    fn apply_new_batches(&mut self) -> usize {
        let outcome = batch::scan(self.map.as_slice(), self.scanned_to);
        for entry in outcome.entries {
            self.index.insert(
                entry.key,
                ValueRef {
                    offset: entry.value_offset,
                    len: entry.value_len,
                },
            );
        }
        self.scanned_to = outcome.valid_end;
        outcome.batches
    }

    /// Returns the latest value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let value = self.index.get(key)?;
        let start = value.offset as usize;
        self.map.as_slice().get(start..start + value.len as usize)
    }

    /// Returns `true` if `key` has a value.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// Appends `batch` to the log and makes it visible.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReadOnly`] for read-mode environments, or an
    /// I/O error if the append, flush, sync or remap fails.
    pub fn commit(&mut self, batch: &WriteBatch) -> StoreResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(StoreError::ReadOnly {
                path: self.dir.path().to_path_buf(),
            });
        };

        let frame = batch.encode()?;
        writer.append(&frame)?;
        writer.flush()?;
        if self.sync_on_commit {
            writer.sync()?;
        }

        self.map.remap()?;
        let applied = self.apply_new_batches();
        if applied != 1 {
            return Err(StoreError::invalid_format(format!(
                "committed batch not readable back ({applied} batches applied)"
            )));
        }
        Ok(())
    }

    /// Flushes and syncs the log. No-op in read mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> StoreResult<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            writer.sync()?;
        }
        Ok(())
    }

    /// Picks up batches committed by another process since the last
    /// open or refresh.
    ///
    /// Returns the number of new batches.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be remapped.
    pub fn refresh(&mut self) -> StoreResult<usize> {
        self.map.remap()?;
        Ok(self.apply_new_batches())
    }

    /// Syncs the log and releases the writer lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails. The lock is released
    /// either way.
    pub fn close(&mut self) -> StoreResult<()> {
        let result = match self.writer.as_mut() {
            Some(writer) => writer.flush().and_then(|()| writer.sync()),
            None => Ok(()),
        };
        self.writer = None;
        self.dir.unlock();
        result.map_err(StoreError::from)
    }

    /// Returns the environment directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the log size in bytes covered by complete batches.
    #[must_use]
    pub fn log_size(&self) -> u64 {
        self.scanned_to
    }
}
