//! # DBHandler Upload
//!
//! Parallel bulk ingestion of image/label file pairs into a
//! [`RecordStore`](dbhandler_core::RecordStore).
//!
//! Pairs are decoded on a bounded `rayon` pool; commits go through one
//! mutex so every record gets a unique index. Unreadable pairs are logged
//! and skipped, never fatal.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod pairs;
mod uploader;

pub use config::{IndexBase, UploadConfig, DEFAULT_MAX_WORKERS};
pub use error::{UploadError, UploadResult};
pub use pairs::{discover_pairs, load_pair, DataPair, PairError, IMAGE_EXTENSIONS, LABEL_EXTENSION};
pub use uploader::{UploadReport, Uploader};
