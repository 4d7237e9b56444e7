//! Heap-backed storage for tests and benches.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// A byte store held in a `Vec<u8>`.
///
/// Container and log tests stage torn writes and damaged headers by
/// building the exact byte image with [`InMemoryBackend::with_data`] and
/// reading it back with [`InMemoryBackend::data`].
///
/// ```rust
/// use dbhandler_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// assert_eq!(backend.append(b"DBKV").unwrap(), 0);
/// assert_eq!(backend.size().unwrap(), 4);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    bytes: Vec<u8>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding `bytes`, as if read from disk.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn range(&self, offset: u64, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let range = self.range(offset, len).ok_or(StorageError::ReadPastEnd {
            offset,
            len,
            size: self.bytes.len() as u64,
        })?;
        Ok(self.bytes[range].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(data);
        Ok(offset)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let range = self
            .range(offset, data.len())
            .ok_or(StorageError::WritePastEnd {
                offset,
                len: data.len(),
                size: self.bytes.len() as u64,
            })?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let current = self.bytes.len() as u64;
        if new_size > current {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot grow storage from {current} to {new_size} bytes by truncation"),
            )));
        }
        self.bytes.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_report_their_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"header").unwrap(), 0);
        assert_eq!(backend.append(b"payload").unwrap(), 6);
        assert_eq!(backend.read_at(6, 7).unwrap(), b"payload");
    }

    #[test]
    fn reads_stop_at_the_end() {
        let backend = InMemoryBackend::with_data(b"batch".to_vec());
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { size: 5, .. })
        ));
        assert!(matches!(
            backend.read_at(u64::MAX, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(backend.read_at(5, 0).unwrap().is_empty());
    }

    #[test]
    fn header_patch_keeps_length() {
        let mut backend = InMemoryBackend::with_data(b"gen=0001;dir=0000".to_vec());
        backend.write_at(4, b"0002").unwrap();
        assert_eq!(backend.data(), b"gen=0002;dir=0000");

        let result = backend.write_at(15, b"9999");
        assert!(matches!(result, Err(StorageError::WritePastEnd { .. })));
        assert_eq!(backend.size().unwrap(), 17);
    }

    #[test]
    fn torn_tail_can_be_cut() {
        let mut backend = InMemoryBackend::with_data(b"whole|torn".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.data(), b"whole");
        assert!(backend.truncate(6).is_err());
    }
}
