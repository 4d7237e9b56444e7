//! # DBHandler Core
//!
//! Indexed image/annotation record stores for DBHandler.
//!
//! This crate provides:
//! - [`RecordStore`], a dense zero-based record index over two backends
//! - A memory-mapped key/value environment ([`kv`])
//! - A single-file columnar container with per-column compression ([`column`])
//! - Image and annotation codecs ([`codec`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbhandler_core::{OpenMode, RecordStore, StoreOptions};
//!
//! let store = RecordStore::open_inferred("data/biz_card.h5col", OpenMode::Read, StoreOptions::new())?;
//! for index in 0..store.len()? {
//!     let record = store.get_data(index)?;
//!     println!("{index}: {}", record.annotation);
//! }
//! # Ok::<(), dbhandler_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod column;
pub mod config;
pub mod dir;
pub mod error;
pub mod kv;
mod store;

pub use codec::{ImageCodec, JpegCodec, PngCodec};
pub use config::{Backend, Compression, ImageFormat, OpenMode, StoreOptions};
pub use error::{StoreError, StoreResult};
pub use store::{
    annots_key, image_key, ColumnarStore, MappedKvStore, Record, RecordStore, MAX_GROWTH,
    NUM_DATA_KEY,
};

pub use image::{Rgb, RgbImage};
pub use serde_json::Value;
