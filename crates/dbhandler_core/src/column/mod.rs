//! Single-file columnar container.
//!
//! ```text
//! | header (64) | element heap ... | directory | ... | directory |
//! ```
//!
//! The header points at the most recently published directory. Older
//! directories stay in the file as unreachable bytes; a container is
//! rewritten only by creating a fresh one.

mod compression;
mod file;
mod format;

pub use file::ColumnFile;
pub use format::{ColumnMeta, DType, Header, Slot, COLUMN_MAGIC, FORMAT_VERSION, HEADER_SIZE};

/// Extension every columnar container path must carry.
pub const COLUMNAR_EXTENSION: &str = "h5col";

/// Column holding encoded images.
pub const IMAGES_COLUMN: &str = "images";

/// Column holding annotation JSON.
pub const LABELS_COLUMN: &str = "labels";
