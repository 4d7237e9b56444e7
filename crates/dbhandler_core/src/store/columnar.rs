//! Record store over a single-file columnar container.

use crate::codec::{decode_annotation, encode_annotation, ImageCodec};
use crate::column::{ColumnFile, DType, COLUMNAR_EXTENSION, IMAGES_COLUMN, LABELS_COLUMN};
use crate::config::{Compression, OpenMode, StoreOptions};
use crate::error::{StoreError, StoreResult};
use crate::store::{grown_len, Record};
use dbhandler_storage::{FileBackend, StorageBackend};
use fs2::FileExt;
use image::RgbImage;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Stores records in two parallel columns, `images` and `labels`.
///
/// Both columns are resized together before every write, so they always
/// have the same length. New element data is appended to the container
/// immediately; the directory that makes it reachable is published on
/// [`ColumnarStore::flush`] and [`ColumnarStore::close`].
#[derive(Debug)]
pub struct ColumnarStore {
    file: Option<ColumnFile<FileBackend>>,
    path: PathBuf,
    mode: OpenMode,
    verbose: bool,
    codec: Arc<dyn ImageCodec>,
}

impl ColumnarStore {
    /// Opens the container file at `path`.
    ///
    /// # Errors
    ///
    /// See [`crate::RecordStore::open`].
    pub fn open(path: &Path, mode: OpenMode, options: &StoreOptions) -> StoreResult<Self> {
        check_extension(path)?;

        let file = match mode {
            OpenMode::Read => open_read(path)?,
            OpenMode::Create => {
                if path.exists() {
                    if !options.force {
                        return Err(StoreError::already_exists(path));
                    }
                    remove_existing(path)?;
                }
                create_new(path, options.compression)?
            }
            OpenMode::Append => {
                let existing = path.exists() && fs::metadata(path)?.len() > 0;
                if existing {
                    open_write(path)?
                } else {
                    create_new(path, options.compression)?
                }
            }
        };

        let store = Self {
            file: Some(file),
            path: path.to_path_buf(),
            mode,
            verbose: options.verbose,
            codec: Arc::clone(&options.image_codec),
        };
        let len = store.len()?;
        store_event!(store.verbose, len, "{} opened in {} mode", store.path.display(), mode);
        Ok(store)
    }

    fn file(&self) -> StoreResult<&ColumnFile<FileBackend>> {
        self.file.as_ref().ok_or(StoreError::Closed)
    }

    fn file_mut(&mut self) -> StoreResult<&mut ColumnFile<FileBackend>> {
        self.file.as_mut().ok_or(StoreError::Closed)
    }

    /// Returns the record count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after close.
    pub fn len(&self) -> StoreResult<u64> {
        self.file()?.len(IMAGES_COLUMN)
    }

    /// Writes a record at `index`, growing both columns if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::GrowthTooLarge`] if `index` is more than
    /// [`super::MAX_GROWTH`] past the end, [`StoreError::Encode`] if the
    /// image cannot be encoded, [`StoreError::ReadOnly`] in read mode, [`StoreError::Closed`]
    /// after close, or an I/O error from the append.
    pub fn put_data(&mut self, image: &RgbImage, annotation: &Value, index: u64) -> StoreResult<()> {
        if !self.mode.is_writable() {
            return Err(StoreError::ReadOnly {
                path: self.path.clone(),
            });
        }
        let new_len = grown_len(index, self.len()?)?;
        let encoded = self
            .codec
            .encode(image)
            .map_err(|e| StoreError::encode(index, e))?;
        let label = encode_annotation(annotation)?;

        let verbose = self.verbose;
        let file = self.file_mut()?;
        file.resize(IMAGES_COLUMN, new_len)?;
        file.resize(LABELS_COLUMN, new_len)?;
        file.set(IMAGES_COLUMN, index, &encoded)?;
        file.set(LABELS_COLUMN, index, &label)?;

        store_event!(verbose, index, len = new_len, "data {index} inserted");
        Ok(())
    }

    /// Reads the record at `index`. A slot with both elements empty reads
    /// back as a placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexOutOfRange`] past the length,
    /// [`StoreError::CorruptRecord`] if exactly one element is empty, or
    /// [`StoreError::Decode`] if the stored bytes do not decode.
    pub fn get_data(&self, index: u64) -> StoreResult<Record> {
        let file = self.file()?;
        let len = file.len(IMAGES_COLUMN)?;
        if index >= len {
            return Err(StoreError::IndexOutOfRange { index, len });
        }

        let image = file.get(IMAGES_COLUMN, index)?;
        let label = file.get(LABELS_COLUMN, index)?;
        match (image.is_empty(), label.is_empty()) {
            (false, true) => {
                return Err(StoreError::corrupt_record(index, "image without annotation"))
            }
            (true, false) => {
                return Err(StoreError::corrupt_record(index, "annotation without image"))
            }
            _ => {}
        }

        let image = if image.is_empty() {
            None
        } else {
            Some(
                self.codec
                    .decode(&image)
                    .map_err(|e| StoreError::decode(format!("image {index}"), e))?,
            )
        };
        let annotation = if label.is_empty() {
            Value::Null
        } else {
            decode_annotation(&label)?
        };

        Ok(Record {
            index,
            image,
            annotation,
        })
    }

    /// Publishes written records to readers.
    ///
    /// # Errors
    ///
    /// Returns an error after close or if the directory cannot be written.
    pub fn flush(&mut self) -> StoreResult<()> {
        let writable = self.mode.is_writable();
        let file = self.file_mut()?;
        if writable {
            file.flush()?;
        }
        Ok(())
    }

    /// Reloads the directory published by a writer. No-op for writers.
    ///
    /// # Errors
    ///
    /// Returns an error after close or if the new directory is unreadable.
    pub fn refresh(&mut self) -> StoreResult<()> {
        let writable = self.mode.is_writable();
        let file = self.file_mut()?;
        if writable {
            return Ok(());
        }
        let updated = file.refresh()?;
        store_event!(self.verbose, updated, "{} refreshed", self.path.display());
        Ok(())
    }

    /// Flushes and releases the container. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails; the handle is released
    /// either way.
    pub fn close(&mut self) -> StoreResult<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let result = if self.mode.is_writable() {
            file.flush()
        } else {
            Ok(())
        };
        file.backend().with_file(|f| {
            // Closing the descriptor releases the lock even if this fails
            let _ = fs2::FileExt::unlock(f);
        });
        drop(file);
        result?;
        store_event!(self.verbose, "closed {}", self.path.display());
        Ok(())
    }

    /// Returns `true` until [`ColumnarStore::close`].
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Returns the container path.
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

impl Drop for ColumnarStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), "failed to close store: {e}");
        }
    }
}

fn check_extension(path: &Path) -> StoreResult<()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext == COLUMNAR_EXTENSION => Ok(()),
        _ => Err(StoreError::InvalidExtension {
            path: path.to_path_buf(),
            expected: COLUMNAR_EXTENSION,
        }),
    }
}

fn lock(backend: &FileBackend) -> StoreResult<()> {
    backend
        .with_file(|f| f.try_lock_exclusive())
        .map_err(|_| StoreError::Locked {
            path: backend.path().to_path_buf(),
        })
}

fn open_read(path: &Path) -> StoreResult<ColumnFile<FileBackend>> {
    if !path.exists() {
        return Err(StoreError::path_not_found(path));
    }
    let file = ColumnFile::open(FileBackend::open_read_only(path)?)?;
    require_record_columns(&file)?;
    Ok(file)
}

fn open_write(path: &Path) -> StoreResult<ColumnFile<FileBackend>> {
    let backend = FileBackend::open(path)?;
    lock(&backend)?;
    let file = ColumnFile::open(backend)?;
    require_record_columns(&file)?;
    Ok(file)
}

fn create_new(path: &Path, compression: Compression) -> StoreResult<ColumnFile<FileBackend>> {
    let backend = FileBackend::open_with_create_dirs(path)?;
    lock(&backend)?;
    if backend.size()? != 0 {
        // Another process initialized it between the checks
        return Err(StoreError::invalid_format(format!(
            "{} is not empty",
            path.display()
        )));
    }
    let mut file = ColumnFile::create(backend)?;
    file.add_column(IMAGES_COLUMN, DType::Bytes, compression)?;
    file.add_column(LABELS_COLUMN, DType::Utf8, compression)?;
    file.flush()?;
    Ok(file)
}

fn require_record_columns(file: &ColumnFile<FileBackend>) -> StoreResult<()> {
    for name in [IMAGES_COLUMN, LABELS_COLUMN] {
        if !file.has_column(name) {
            return Err(StoreError::invalid_format(format!(
                "container has no '{name}' column"
            )));
        }
    }
    let images = file.len(IMAGES_COLUMN)?;
    let labels = file.len(LABELS_COLUMN)?;
    if images != labels {
        return Err(StoreError::invalid_format(format!(
            "column lengths differ: {images} images, {labels} labels"
        )));
    }
    Ok(())
}

/// Removes an existing container, refusing if a writer holds it.
fn remove_existing(path: &Path) -> StoreResult<()> {
    if path.is_dir() {
        return Err(StoreError::invalid_format(format!(
            "{} is a directory",
            path.display()
        )));
    }
    let existing = OpenOptions::new().read(true).write(true).open(path)?;
    if existing.try_lock_exclusive().is_err() {
        return Err(StoreError::Locked {
            path: path.to_path_buf(),
        });
    }
    drop(existing);
    fs::remove_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageFormat;
    use serde_json::json;
    use tempfile::tempdir;

    fn options() -> StoreOptions {
        StoreOptions::new().image_format(ImageFormat::Png)
    }

    fn pixel(value: u8) -> RgbImage {
        RgbImage::from_pixel(3, 2, image::Rgb([value, 0, 255 - value]))
    }

    #[test]
    fn extension_checked_before_io() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.h5");
        let result = ColumnarStore::open(&path, OpenMode::Create, &options());
        assert!(matches!(result, Err(StoreError::InvalidExtension { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn columns_grow_together() {
        let temp = tempdir().unwrap();
        let mut store =
            ColumnarStore::open(&temp.path().join("s.h5col"), OpenMode::Create, &options())
                .unwrap();
        store.put_data(&pixel(7), &json!({"label": "z"}), 2).unwrap();

        let file = store.file().unwrap();
        assert_eq!(file.len(IMAGES_COLUMN).unwrap(), 3);
        assert_eq!(file.len(LABELS_COLUMN).unwrap(), 3);
        assert!(store.get_data(0).unwrap().is_placeholder());
        assert!(store.get_data(1).unwrap().is_placeholder());
        assert_eq!(store.get_data(2).unwrap().image.unwrap(), pixel(7));
    }

    #[test]
    fn runaway_index_is_rejected() {
        let temp = tempdir().unwrap();
        let mut store =
            ColumnarStore::open(&temp.path().join("s.h5col"), OpenMode::Create, &options())
                .unwrap();
        store.put_data(&pixel(1), &json!(0), 0).unwrap();

        for index in [u64::MAX, 2 + crate::store::MAX_GROWTH] {
            let result = store.put_data(&pixel(2), &json!(1), index);
            assert!(matches!(result, Err(StoreError::GrowthTooLarge { len: 1, .. })));
        }
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.file().unwrap().len(LABELS_COLUMN).unwrap(), 1);
    }

    #[test]
    fn half_written_slot_is_corrupt() {
        let temp = tempdir().unwrap();
        let mut store =
            ColumnarStore::open(&temp.path().join("s.h5col"), OpenMode::Create, &options())
                .unwrap();
        store.put_data(&pixel(1), &json!(0), 0).unwrap();

        // Image element written, label element left empty
        let image = crate::codec::PngCodec.encode(&pixel(5)).unwrap();
        let file = store.file_mut().unwrap();
        file.resize(IMAGES_COLUMN, 2).unwrap();
        file.resize(LABELS_COLUMN, 2).unwrap();
        file.set(IMAGES_COLUMN, 1, &image).unwrap();

        assert!(matches!(
            store.get_data(1),
            Err(StoreError::CorruptRecord { index: 1, .. })
        ));
        assert_eq!(store.get_data(0).unwrap().annotation, json!(0));
    }

    #[test]
    fn unflushed_puts_are_invisible_to_readers() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("s.h5col");
        let mut writer = ColumnarStore::open(&path, OpenMode::Create, &options()).unwrap();
        writer.put_data(&pixel(1), &json!(1), 0).unwrap();

        let mut reader = ColumnarStore::open(&path, OpenMode::Read, &options()).unwrap();
        assert_eq!(reader.len().unwrap(), 0);

        writer.flush().unwrap();
        reader.refresh().unwrap();
        assert_eq!(reader.len().unwrap(), 1);
        assert_eq!(reader.get_data(0).unwrap().annotation, json!(1));
    }

    #[test]
    fn second_writer_is_locked_out() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("s.h5col");
        let mut first = ColumnarStore::open(&path, OpenMode::Create, &options()).unwrap();

        assert!(matches!(
            ColumnarStore::open(&path, OpenMode::Append, &options()),
            Err(StoreError::Locked { .. })
        ));
        assert!(matches!(
            ColumnarStore::open(&path, OpenMode::Create, &options().force(true)),
            Err(StoreError::Locked { .. })
        ));

        first.close().unwrap();
        let _second = ColumnarStore::open(&path, OpenMode::Append, &options()).unwrap();
    }

    #[test]
    fn compression_applies_to_new_containers() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("z.h5col");
        let annotation = json!({"text": "repeat ".repeat(200)});
        {
            let opts = options().compression(Compression::Zstd(3));
            let mut store = ColumnarStore::open(&path, OpenMode::Create, &opts).unwrap();
            store.put_data(&pixel(3), &annotation, 0).unwrap();
            let column = store.file().unwrap().column(LABELS_COLUMN).unwrap();
            assert_eq!(column.compression, Compression::Zstd(3));
            assert!(column.slots[0].len < 200);
        }

        let store = ColumnarStore::open(&path, OpenMode::Read, &options()).unwrap();
        assert_eq!(store.get_data(0).unwrap().annotation, annotation);
    }

    #[test]
    fn foreign_file_is_invalid_format() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("foreign.h5col");
        fs::write(&path, vec![0u8; 128]).unwrap();

        assert!(matches!(
            ColumnarStore::open(&path, OpenMode::Read, &options()),
            Err(StoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn append_to_empty_file_initializes_it() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("empty.h5col");
        fs::write(&path, b"").unwrap();

        let mut store = ColumnarStore::open(&path, OpenMode::Append, &options()).unwrap();
        store.put_data(&pixel(2), &json!([1, 2]), 0).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }
}
