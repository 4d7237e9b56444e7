//! Memory-mapped key/value environment.
//!
//! An environment is a directory holding an append-only log of write
//! batches. Each batch is committed atomically:
//!
//! ```text
//! | magic (4) | entry_count (4) | body_len (4) | body | crc32 (4) |
//! ```
//!
//! ## Recovery
//!
//! On open the log is replayed from the start and the latest value for
//! every key is indexed:
//!
//! - **Clean end**: every byte belongs to a complete batch
//! - **Torn tail**: an incomplete or checksum-failing final batch is
//!   ignored, and truncated away when the environment is writable
//!
//! ## Concurrency
//!
//! One writer process at a time, enforced by the directory lock. Readers
//! map the log without locking and use [`Environment::refresh`] to follow
//! the writer.

mod batch;
mod env;

pub use batch::{scan, EntryRef, ScanOutcome, WriteBatch, BATCH_MAGIC};
pub use env::Environment;
