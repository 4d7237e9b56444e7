//! Columnar container: named, resizable arrays of variable-length elements.

use crate::column::compression::{compress, decompress};
use crate::column::format::{
    decode_directory, encode_directory, ColumnMeta, DType, Header, Slot, HEADER_SIZE,
};
use crate::config::Compression;
use crate::error::{StoreError, StoreResult};
use dbhandler_storage::{FileBackend, StorageBackend};
use tracing::debug;

/// A container of named one-dimensional arrays in a single byte store.
///
/// Element bytes are appended to a heap; each column keeps one slot per
/// element. Metadata changes stay in memory until [`ColumnFile::flush`]
/// appends a new directory and repoints the header at it, so a reader
/// always sees the last flushed state in full.
///
/// # Example
///
/// ```rust
/// use dbhandler_core::column::{ColumnFile, DType};
/// use dbhandler_core::Compression;
/// use dbhandler_storage::InMemoryBackend;
///
/// let mut file = ColumnFile::create(InMemoryBackend::new()).unwrap();
/// file.add_column("labels", DType::Utf8, Compression::None).unwrap();
/// file.resize("labels", 3).unwrap();
/// file.set("labels", 2, b"{\"label\":\"x\"}").unwrap();
/// file.flush().unwrap();
///
/// assert_eq!(file.len("labels").unwrap(), 3);
/// assert!(file.get("labels", 0).unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct ColumnFile<B: StorageBackend> {
    backend: B,
    header: Header,
    columns: Vec<ColumnMeta>,
    dirty: bool,
}

impl<B: StorageBackend> ColumnFile<B> {
    /// Initializes an empty container in an empty backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is not empty or the header
    /// cannot be written.
    pub fn create(mut backend: B) -> StoreResult<Self> {
        if backend.size()? != 0 {
            return Err(StoreError::invalid_format(
                "cannot create a container over existing bytes",
            ));
        }

        let header = Header::default();
        backend.append(&header.encode())?;

        let mut file = Self {
            backend,
            header,
            columns: Vec::new(),
            dirty: true,
        };
        file.flush()?;
        Ok(file)
    }

    /// Loads an existing container.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or directory is missing, corrupted
    /// or points outside the backend.
    pub fn open(backend: B) -> StoreResult<Self> {
        let mut file = Self {
            backend,
            header: Header::default(),
            columns: Vec::new(),
            dirty: false,
        };
        file.load_metadata()?;
        Ok(file)
    }

    fn load_metadata(&mut self) -> StoreResult<()> {
        let size = self.backend.size()?;
        if size < HEADER_SIZE as u64 {
            return Err(StoreError::invalid_format("container header truncated"));
        }

        let header = Header::decode(&self.backend.read_at(0, HEADER_SIZE)?)?;
        let columns = if header.dir_len == 0 {
            Vec::new()
        } else {
            let end = header.dir_offset.saturating_add(header.dir_len);
            if header.dir_offset < HEADER_SIZE as u64 || end > size {
                return Err(StoreError::invalid_format(format!(
                    "directory at {}+{} outside container of {size} bytes",
                    header.dir_offset, header.dir_len
                )));
            }
            let dir_len = usize::try_from(header.dir_len)
                .map_err(|_| StoreError::invalid_format("directory too large"))?;
            decode_directory(&self.backend.read_at(header.dir_offset, dir_len)?)?
        };

        self.header = header;
        self.columns = columns;
        self.dirty = false;
        Ok(())
    }

    fn column_index(&self, name: &str) -> StoreResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StoreError::not_found(format!("column '{name}'")))
    }

    /// Adds an empty column.
    ///
    /// # Errors
    ///
    /// Returns an error if a column with the same name exists.
    pub fn add_column(&mut self, name: &str, dtype: DType, compression: Compression) -> StoreResult<()> {
        if self.has_column(name) {
            return Err(StoreError::invalid_format(format!(
                "column '{name}' already exists"
            )));
        }
        self.columns.push(ColumnMeta {
            name: name.to_string(),
            dtype,
            compression,
            slots: Vec::new(),
        });
        self.dirty = true;
        Ok(())
    }

    /// Returns `true` if the named column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Returns the metadata of a column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown column.
    pub fn column(&self, name: &str) -> StoreResult<&ColumnMeta> {
        Ok(&self.columns[self.column_index(name)?])
    }

    /// Returns the number of elements in a column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown column.
    pub fn len(&self, name: &str) -> StoreResult<u64> {
        Ok(self.column(name)?.slots.len() as u64)
    }

    /// Grows a column to `new_len`, filling new positions with empty
    /// elements. Existing elements keep their positions.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown column or if `new_len` is smaller
    /// than the current length.
    pub fn resize(&mut self, name: &str, new_len: u64) -> StoreResult<()> {
        let idx = self.column_index(name)?;
        let column = &mut self.columns[idx];
        let current = column.slots.len() as u64;

        if new_len < current {
            return Err(StoreError::invalid_format(format!(
                "cannot shrink column '{name}' from {current} to {new_len}"
            )));
        }
        if new_len > current {
            let new_len = usize::try_from(new_len)
                .map_err(|_| StoreError::invalid_format("column length exceeds address space"))?;
            column.slots.resize(new_len, Slot::default());
            self.dirty = true;
        }
        Ok(())
    }

    /// Writes element `index` of a column.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown column, an index at or past the
    /// column length, non-UTF-8 data in a UTF-8 column, or a failed append.
    pub fn set(&mut self, name: &str, index: u64, data: &[u8]) -> StoreResult<()> {
        let idx = self.column_index(name)?;
        let column = &self.columns[idx];
        let len = column.slots.len() as u64;
        if index >= len {
            return Err(StoreError::IndexOutOfRange { index, len });
        }
        if column.dtype == DType::Utf8 && std::str::from_utf8(data).is_err() {
            return Err(StoreError::invalid_format(format!(
                "non UTF-8 element for column '{name}'"
            )));
        }

        let slot = if data.is_empty() {
            Slot::default()
        } else {
            let stored = compress(column.compression, data)?;
            let offset = self.backend.append(&stored)?;
            Slot {
                offset,
                len: stored.len() as u64,
            }
        };

        self.columns[idx].slots[index as usize] = slot;
        self.dirty = true;
        Ok(())
    }

    /// Reads element `index` of a column. Empty elements read as an empty
    /// vector.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown column, an out-of-range index, or
    /// if the element cannot be read or decompressed.
    pub fn get(&self, name: &str, index: u64) -> StoreResult<Vec<u8>> {
        let column = self.column(name)?;
        let len = column.slots.len() as u64;
        let slot = column
            .slots
            .get(usize::try_from(index).unwrap_or(usize::MAX))
            .ok_or(StoreError::IndexOutOfRange { index, len })?;

        if slot.len == 0 {
            return Ok(Vec::new());
        }
        let stored_len = usize::try_from(slot.len)
            .map_err(|_| StoreError::invalid_format("element too large"))?;
        let stored = self.backend.read_at(slot.offset, stored_len)?;
        decompress(column.compression, &stored)
    }

    /// Returns `true` if metadata changed since the last flush.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns how many directories have been published.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.header.generation
    }

    /// Publishes the in-memory metadata.
    ///
    /// Appends a new directory, syncs, then rewrites the header to point
    /// at it and syncs again. Does nothing if nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if any write or sync fails.
    pub fn flush(&mut self) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let directory = encode_directory(&self.columns)?;
        let dir_offset = self.backend.append(&directory)?;
        self.backend.flush()?;
        self.backend.sync()?;

        let header = Header {
            dir_offset,
            dir_len: directory.len() as u64,
            generation: self.header.generation + 1,
        };
        self.backend.write_at(0, &header.encode())?;
        self.backend.flush()?;
        self.backend.sync()?;

        debug!(
            generation = header.generation,
            columns = self.columns.len(),
            dir_bytes = header.dir_len,
            "column directory published"
        );
        self.header = header;
        self.dirty = false;
        Ok(())
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl ColumnFile<FileBackend> {
    /// Reloads metadata published by a writer in another process.
    ///
    /// Returns `true` if a newer directory was loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the new metadata cannot be read.
    pub fn refresh(&mut self) -> StoreResult<bool> {
        self.backend.reload_size()?;
        let previous = self.header.generation;
        self.load_metadata()?;
        Ok(self.header.generation != previous)
    }
}
