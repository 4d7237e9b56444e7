//! Indexed record stores.
//!
//! A [`RecordStore`] owns one persisted container and exposes records by a
//! dense zero-based index. The backend is picked at open time:
//!
//! - [`Backend::MappedKv`]: an environment directory holding a memory-mapped
//!   batch log ([`MappedKvStore`]).
//! - [`Backend::Columnar`]: a single `.h5col` container file with parallel
//!   `images` and `labels` columns ([`ColumnarStore`]).

/// Logs a store event at `info` when verbose, `debug` otherwise.
macro_rules! store_event {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

mod columnar;
mod kv;

pub use columnar::ColumnarStore;
pub use kv::{annots_key, image_key, MappedKvStore, NUM_DATA_KEY};

use crate::config::{Backend, OpenMode, StoreOptions};
use crate::error::{StoreError, StoreResult};
use image::RgbImage;
use serde_json::Value;
use std::path::Path;

/// Most placeholder slots a single `put_data` may create.
pub const MAX_GROWTH: u64 = 1 << 20;

/// Returns the store length after writing `index` into `len` records.
///
/// Fails without touching the store when the write would need more than
/// [`MAX_GROWTH`] placeholders.
pub(crate) fn grown_len(index: u64, len: u64) -> StoreResult<u64> {
    let too_large = || StoreError::GrowthTooLarge {
        index,
        len,
        max: MAX_GROWTH,
    };
    if index.saturating_sub(len) > MAX_GROWTH {
        return Err(too_large());
    }
    let end = index.checked_add(1).ok_or_else(too_large)?;
    Ok(len.max(end))
}

/// One materialized record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Position in the store.
    pub index: u64,
    /// Decoded image, `None` for placeholders.
    pub image: Option<RgbImage>,
    /// Annotation, `null` for placeholders.
    pub annotation: Value,
}

impl Record {
    /// Returns `true` for slots created by growth and never written.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.image.is_none() && self.annotation.is_null()
    }
}

/// A record store over one of the supported backends.
///
/// # Example
///
/// ```rust,no_run
/// use dbhandler_core::{Backend, OpenMode, RecordStore, RgbImage, StoreOptions};
/// use serde_json::json;
///
/// let mut store = RecordStore::open(
///     Backend::MappedKv,
///     "data/lmdb/biz_card",
///     OpenMode::Create,
///     StoreOptions::new().force(true),
/// )?;
/// let image = RgbImage::new(64, 64);
/// store.put_data(&image, &json!({"label": "x"}), 0)?;
/// assert_eq!(store.len()?, 1);
/// store.close()?;
/// # Ok::<(), dbhandler_core::StoreError>(())
/// ```
#[derive(Debug)]
pub enum RecordStore {
    /// Key/value environment directory.
    MappedKv(MappedKvStore),
    /// Columnar container file.
    Columnar(ColumnarStore),
}

macro_rules! dispatch {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            RecordStore::MappedKv($store) => $body,
            RecordStore::Columnar($store) => $body,
        }
    };
}

impl RecordStore {
    /// Opens a store.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A columnar path lacks the `.h5col` extension (`InvalidExtension`)
    /// - The path exists in create mode without `force` (`AlreadyExists`)
    /// - The path is missing in read mode (`NotFound`)
    /// - Another writer holds the container (`Locked`)
    /// - Existing content is not a valid container (`InvalidFormat`)
    /// - I/O errors occur
    pub fn open(
        backend: Backend,
        path: impl AsRef<Path>,
        mode: OpenMode,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let path = path.as_ref();
        match backend {
            Backend::MappedKv => Ok(Self::MappedKv(MappedKvStore::open(path, mode, &options)?)),
            Backend::Columnar => Ok(Self::Columnar(ColumnarStore::open(path, mode, &options)?)),
        }
    }

    /// Opens a store, picking the backend from the path extension.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::open`].
    pub fn open_inferred(
        path: impl AsRef<Path>,
        mode: OpenMode,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let path = path.as_ref();
        Self::open(Backend::infer(path), path, mode, options)
    }

    /// Writes `image` and `annotation` at `index`.
    ///
    /// Writing past the end grows the store to `index + 1`; the skipped
    /// positions become placeholders. Writing below the end overwrites.
    ///
    /// # Errors
    ///
    /// Returns `Encode`, `ReadOnly`, `Closed`, or an I/O error.
    pub fn put_data(&mut self, image: &RgbImage, annotation: &Value, index: u64) -> StoreResult<()> {
        dispatch!(self, store => store.put_data(image, annotation, index))
    }

    /// Reads the record at `index`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange`, `NotFound`, `CorruptRecord`, `Decode`
    /// or `Closed`.
    pub fn get_data(&self, index: u64) -> StoreResult<Record> {
        dispatch!(self, store => store.get_data(index))
    }

    /// Returns the record count.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after close, or `InvalidFormat` if a persisted
    /// counter is unreadable.
    pub fn len(&self) -> StoreResult<u64> {
        dispatch!(self, store => store.len())
    }

    /// Returns `true` if the store holds no records.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::len`].
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Persists pending metadata without closing.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after close, or an I/O error.
    pub fn flush(&mut self) -> StoreResult<()> {
        dispatch!(self, store => store.flush())
    }

    /// Picks up records committed by a writer in another process.
    /// Writers already see their own records, so this is a no-op for them.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after close, or an error if the new state cannot
    /// be read.
    pub fn refresh(&mut self) -> StoreResult<()> {
        dispatch!(self, store => store.refresh())
    }

    /// Flushes and releases the container. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails.
    pub fn close(&mut self) -> StoreResult<()> {
        dispatch!(self, store => store.close())
    }

    /// Returns `true` until [`RecordStore::close`].
    #[must_use]
    pub fn is_open(&self) -> bool {
        dispatch!(self, store => store.is_open())
    }

    /// Returns the container path.
    #[must_use]
    pub fn path(&self) -> &Path {
        dispatch!(self, store => store.path())
    }

    /// Returns the open mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        dispatch!(self, store => store.mode())
    }

    /// Returns the backend kind.
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            Self::MappedKv(_) => Backend::MappedKv,
            Self::Columnar(_) => Backend::Columnar,
        }
    }
}
