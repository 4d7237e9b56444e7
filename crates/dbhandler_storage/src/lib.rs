//! # DBHandler Storage
//!
//! Byte-store backends for DBHandler.
//!
//! This crate provides the lowest-level storage abstraction. Backends are
//! **opaque byte stores**: they do not interpret the data they hold. The
//! key/value log and the columnar container in `dbhandler_core` own all
//! format interpretation.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//! - [`MappedFile`] - Read-only memory map over a growing file
//!
//! ## Example
//!
//! ```rust
//! use dbhandler_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod checksum;
mod error;
mod file;
mod memory;
mod mmap;

pub use backend::StorageBackend;
pub use checksum::compute_crc32;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use mmap::{AccessPattern, MappedFile};
