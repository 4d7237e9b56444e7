//! Read-only memory maps over append-only files.
//!
//! A [`MappedFile`] maps the current contents of a file and can be
//! remapped after the file grows. Writers never go through the map;
//! they append via [`crate::FileBackend`] and then call
//! [`MappedFile::remap`] so readers see the new bytes.

use crate::error::StorageResult;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Kernel paging hint applied to a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPattern {
    /// Default kernel behaviour.
    #[default]
    Normal,
    /// Point lookups: disables readahead.
    Random,
    /// Front-to-back scans.
    Sequential,
}

/// A read-only memory map of a file.
///
/// Empty files are represented without a mapping, so [`MappedFile::as_slice`]
/// is always valid.
#[derive(Debug)]
pub struct MappedFile {
    path: PathBuf,
    file: File,
    map: Option<Mmap>,
    pattern: AccessPattern,
}

impl MappedFile {
    /// Maps the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped.
    pub fn open(path: &Path, pattern: AccessPattern) -> StorageResult<Self> {
        let file = File::open(path)?;
        let mut mapped = Self {
            path: path.to_path_buf(),
            file,
            map: None,
            pattern,
        };
        mapped.remap()?;
        Ok(mapped)
    }

    /// Rebuilds the mapping so it covers the file's current length.
    ///
    /// Returns the new mapped length.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read or the
    /// mapping fails.
    pub fn remap(&mut self) -> StorageResult<u64> {
        let len = self.file.metadata()?.len();
        if len == 0 {
            self.map = None;
            return Ok(0);
        }

        // SAFETY: the file is only ever appended to or truncated by the
        // single writer while no map handed out by this type is borrowed:
        // `as_slice` borrows `self`, and `remap` needs `&mut self`.
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&self.file)? };
        apply_pattern(&map, self.pattern);
        self.map = Some(map);
        Ok(len)
    }

    /// Returns the mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Returns the mapped length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Returns the mapped file's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn apply_pattern(map: &Mmap, pattern: AccessPattern) {
    use memmap2::Advice;

    let advice = match pattern {
        AccessPattern::Normal => Advice::Normal,
        AccessPattern::Random => Advice::Random,
        AccessPattern::Sequential => Advice::Sequential,
    };
    // Advice is a hint; a refusal does not affect correctness.
    let _ = map.advise(advice);
}

#[cfg(not(unix))]
fn apply_pattern(_map: &Mmap, _pattern: AccessPattern) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileBackend, StorageBackend};
    use tempfile::tempdir;

    #[test]
    fn empty_file_maps_to_empty_slice() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.kv");
        std::fs::write(&path, b"").unwrap();

        let mapped = MappedFile::open(&path, AccessPattern::Random).unwrap();
        assert!(mapped.is_empty());
        assert_eq!(mapped.as_slice(), b"");
    }

    #[test]
    fn remap_sees_appended_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.kv");

        let mut writer = FileBackend::open(&path).unwrap();
        writer.append(b"first").unwrap();
        writer.flush().unwrap();

        let mut mapped = MappedFile::open(&path, AccessPattern::Random).unwrap();
        assert_eq!(mapped.as_slice(), b"first");

        writer.append(b"+second").unwrap();
        writer.flush().unwrap();

        // Stale until remapped
        assert_eq!(mapped.len(), 5);
        assert_eq!(mapped.remap().unwrap(), 12);
        assert_eq!(mapped.as_slice(), b"first+second");
        assert_eq!(mapped.path(), path);
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(MappedFile::open(&dir.path().join("nope"), AccessPattern::Normal).is_err());
    }
}
