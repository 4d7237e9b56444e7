//! Error types for record store operations.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while opening or using a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] dbhandler_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Annotation (de)serialization error.
    #[error("annotation JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The path does not carry the extension required by the backend.
    #[error("invalid file extension: '{}', use '.{expected}'", path.display())]
    InvalidExtension {
        /// The rejected path.
        path: PathBuf,
        /// The required extension, without the leading dot.
        expected: &'static str,
    },

    /// Create mode was requested on an existing path without `force`.
    #[error("{} already exists, use force to overwrite", path.display())]
    AlreadyExists {
        /// The existing path.
        path: PathBuf,
    },

    /// A path or record does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was missing.
        what: String,
    },

    /// An unknown open mode was requested.
    #[error("invalid mode: '{mode}', use 'r' for read-only, 'w' for create, 'a' for append")]
    InvalidMode {
        /// The rejected mode string.
        mode: String,
    },

    /// An image could not be encoded.
    #[error("failed to encode image at index {index}: {message}")]
    Encode {
        /// The record index being written.
        index: u64,
        /// Codec message.
        message: String,
    },

    /// Stored bytes could not be decoded.
    #[error("failed to decode {what}: {message}")]
    Decode {
        /// What was being decoded.
        what: String,
        /// Codec message.
        message: String,
    },

    /// Exactly one half of a record is present.
    #[error("corrupt record at index {index}: {message}")]
    CorruptRecord {
        /// The record index.
        index: u64,
        /// Which half is missing.
        message: String,
    },

    /// The index is not below the store length.
    #[error("index {index} out of range for store of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: u64,
        /// The store length.
        len: u64,
    },

    /// A put would create more placeholder slots than one write allows.
    #[error("index {index} would grow store of length {len} by more than {max} placeholders")]
    GrowthTooLarge {
        /// The requested index.
        index: u64,
        /// The store length.
        len: u64,
        /// The placeholder limit per put.
        max: u64,
    },

    /// A write was attempted on a store opened in read mode.
    #[error("{} is opened read-only", path.display())]
    ReadOnly {
        /// The store path.
        path: PathBuf,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// Another writer holds the store.
    #[error("store locked: another writer has exclusive access to {}", path.display())]
    Locked {
        /// The locked path.
        path: PathBuf,
    },

    /// The persisted container is not in the expected format.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a not found error for a path.
    pub fn path_not_found(path: &Path) -> Self {
        Self::not_found(format!("{} does not exist", path.display()))
    }

    /// Creates an already exists error.
    pub fn already_exists(path: &Path) -> Self {
        Self::AlreadyExists {
            path: path.to_path_buf(),
        }
    }

    /// Creates an image encode error.
    pub fn encode(index: u64, message: impl ToString) -> Self {
        Self::Encode {
            index,
            message: message.to_string(),
        }
    }

    /// Creates a decode error.
    pub fn decode(what: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Creates a corrupt record error.
    pub fn corrupt_record(index: u64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            index,
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns `true` for errors caused by a single bad record rather
    /// than by the store as a whole.
    #[must_use]
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Self::Encode { .. }
                | Self::Decode { .. }
                | Self::GrowthTooLarge { .. }
                | Self::CorruptRecord { .. }
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let err = StoreError::already_exists(Path::new("s.db"));
        assert_eq!(err.to_string(), "s.db already exists, use force to overwrite");

        let err = StoreError::InvalidExtension {
            path: PathBuf::from("data.bin"),
            expected: "h5col",
        };
        assert_eq!(
            err.to_string(),
            "invalid file extension: 'data.bin', use '.h5col'"
        );
    }

    #[test]
    fn record_errors_are_classified() {
        assert!(StoreError::encode(3, "bad").is_record_error());
        assert!(StoreError::corrupt_record(3, "no image").is_record_error());
        assert!(StoreError::GrowthTooLarge {
            index: u64::MAX,
            len: 0,
            max: 1
        }
        .is_record_error());
        assert!(!StoreError::Closed.is_record_error());
        assert!(!StoreError::already_exists(Path::new("x")).is_record_error());
    }
}
