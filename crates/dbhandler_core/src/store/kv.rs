//! Record store over the mapped key/value environment.

use crate::codec::{decode_annotation, encode_annotation, ImageCodec};
use crate::config::{OpenMode, StoreOptions};
use crate::error::{StoreError, StoreResult};
use crate::kv::{Environment, WriteBatch};
use crate::store::{grown_len, Record};
use image::RgbImage;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Reserved key holding the decimal record count.
pub const NUM_DATA_KEY: &str = "num_data";

/// Annotation stored for placeholder records.
const NULL_ANNOTATION: &[u8] = b"null";

/// Key of the image entry for `index`.
#[must_use]
pub fn image_key(index: u64) -> String {
    format!("{index}_img")
}

/// Key of the annotation entry for `index`.
#[must_use]
pub fn annots_key(index: u64) -> String {
    format!("{index}_annots")
}

/// Stores each record as two entries, `{index}_img` and
/// `{index}_annots`, plus the `num_data` counter.
///
/// Every put commits one batch holding both entries, placeholder pairs
/// for any skipped index, and the recomputed counter, so the counter
/// and the entries can never disagree.
#[derive(Debug)]
pub struct MappedKvStore {
    env: Option<Environment>,
    path: PathBuf,
    mode: OpenMode,
    verbose: bool,
    codec: Arc<dyn ImageCodec>,
}

impl MappedKvStore {
    /// Opens the environment directory at `path`.
    ///
    /// # Errors
    ///
    /// See [`crate::RecordStore::open`].
    pub fn open(path: &Path, mode: OpenMode, options: &StoreOptions) -> StoreResult<Self> {
        let env = Environment::open(path, mode, options.force, options.sync_on_commit)?;
        let store = Self {
            env: Some(env),
            path: path.to_path_buf(),
            mode,
            verbose: options.verbose,
            codec: Arc::clone(&options.image_codec),
        };
        let len = store.len()?;
        store_event!(store.verbose, len, "{} opened in {} mode", store.path.display(), mode);
        Ok(store)
    }

    fn env(&self) -> StoreResult<&Environment> {
        self.env.as_ref().ok_or(StoreError::Closed)
    }

    fn env_mut(&mut self) -> StoreResult<&mut Environment> {
        self.env.as_mut().ok_or(StoreError::Closed)
    }

    /// Returns the persisted record count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after close, or
    /// [`StoreError::InvalidFormat`] if the counter is not a number.
    pub fn len(&self) -> StoreResult<u64> {
        let Some(raw) = self.env()?.get(NUM_DATA_KEY.as_bytes()) else {
            return Ok(0);
        };
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| StoreError::invalid_format(format!("{NUM_DATA_KEY} is not a number")))
    }

    /// Writes a record at `index`, growing the store if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::GrowthTooLarge`] if `index` is more than
    /// [`super::MAX_GROWTH`] past the end, [`StoreError::Encode`] if the
    /// image cannot be encoded, [`StoreError::ReadOnly`] in read mode,
    /// [`StoreError::Closed`] after close, or an I/O error from the commit.
    pub fn put_data(&mut self, image: &RgbImage, annotation: &Value, index: u64) -> StoreResult<()> {
        if !self.mode.is_writable() {
            return Err(StoreError::ReadOnly {
                path: self.path.clone(),
            });
        }
        let current = self.len()?;
        grown_len(index, current)?;
        let encoded = self
            .codec
            .encode(image)
            .map_err(|e| StoreError::encode(index, e))?;
        let annots = encode_annotation(annotation)?;

        let env = self.env()?;
        let mut batch = WriteBatch::new();
        for gap in current..index {
            let (img, ann) = (image_key(gap), annots_key(gap));
            if !env.contains(img.as_bytes()) {
                batch.put(img, Vec::new());
            }
            if !env.contains(ann.as_bytes()) {
                batch.put(ann, NULL_ANNOTATION);
            }
        }
        batch.put(image_key(index), encoded);
        batch.put(annots_key(index), annots);

        // Count keyed entries as they will be after this batch, then halve
        let existing = env.entry_count() - usize::from(env.contains(NUM_DATA_KEY.as_bytes()));
        let added = batch.keys().filter(|key| !env.contains(key)).count();
        let num_data = (((existing + added) / 2) as u64).max(current);
        batch.put(NUM_DATA_KEY, num_data.to_string());

        let placeholders = batch.len() - 3;
        self.env_mut()?.commit(&batch)?;

        store_event!(self.verbose, index, num_data, placeholders, "data {index} inserted");
        Ok(())
    }

    /// Reads the record at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexOutOfRange`] past the length,
    /// [`StoreError::NotFound`] if neither entry exists,
    /// [`StoreError::CorruptRecord`] if only one exists, or
    /// [`StoreError::Decode`] if the stored bytes do not decode.
    pub fn get_data(&self, index: u64) -> StoreResult<Record> {
        let len = self.len()?;
        if index >= len {
            return Err(StoreError::IndexOutOfRange { index, len });
        }

        let env = self.env()?;
        let image = env.get(image_key(index).as_bytes());
        let annots = env.get(annots_key(index).as_bytes());

        let (image, annots) = match (image, annots) {
            (Some(image), Some(annots)) => (image, annots),
            (None, None) => return Err(StoreError::not_found(format!("record {index}"))),
            (Some(_), None) => {
                return Err(StoreError::corrupt_record(index, "image without annotation"))
            }
            (None, Some(_)) => {
                return Err(StoreError::corrupt_record(index, "annotation without image"))
            }
        };

        let image = if image.is_empty() {
            None
        } else {
            Some(
                self.codec
                    .decode(image)
                    .map_err(|e| StoreError::decode(format!("image {index}"), e))?,
            )
        };

        Ok(Record {
            index,
            image,
            annotation: decode_annotation(annots)?,
        })
    }

    /// Syncs committed batches to disk.
    ///
    /// Every batch is already readable once committed; this only matters
    /// when `sync_on_commit` is off.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after close, or an I/O error.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.env_mut()?.sync()
    }

    /// Picks up records committed by another process. No-op for writers.
    ///
    /// # Errors
    ///
    /// Returns an error after close or if the log cannot be remapped.
    pub fn refresh(&mut self) -> StoreResult<()> {
        if self.mode.is_writable() {
            self.env()?;
            return Ok(());
        }
        let batches = self.env_mut()?.refresh()?;
        store_event!(self.verbose, batches, "{} refreshed", self.path.display());
        Ok(())
    }

    /// Syncs and releases the environment. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails; the handle is released
    /// either way.
    pub fn close(&mut self) -> StoreResult<()> {
        let Some(mut env) = self.env.take() else {
            return Ok(());
        };
        env.close()?;
        store_event!(self.verbose, "closed {}", self.path.display());
        Ok(())
    }

    /// Returns `true` until [`MappedKvStore::close`].
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.env.is_some()
    }

    /// Returns the environment path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the open mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }
}

impl Drop for MappedKvStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), "failed to close store: {e}");
        }
    }
}
