//! Parallel bulk uploader.

use crate::config::{IndexBase, UploadConfig};
use crate::error::UploadResult;
use crate::pairs::{load_pair, DataPair};
use dbhandler_core::{
    Backend, OpenMode, RecordStore, RgbImage, StoreOptions, StoreResult, Value,
};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Outcome of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Number of pairs handed to the uploader.
    pub pairs_seen: usize,
    /// Indices written, in ascending order.
    pub committed: Vec<u64>,
    /// Pairs that could not be loaded or written.
    pub skipped: usize,
    /// Store length after the last commit.
    pub final_len: u64,
}

impl UploadReport {
    /// Returns the number of records written.
    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }
}

/// The store plus the indices committed to it, guarded together.
struct Committer {
    store: RecordStore,
    committed: Vec<u64>,
}

impl Committer {
    /// Picks the next index and writes the record at it.
    fn commit(&mut self, base: IndexBase, image: &RgbImage, annotation: &Value) -> StoreResult<u64> {
        let index = base.next_index(self.store.len()?);
        self.store.put_data(image, annotation, index)?;
        self.committed.push(index);
        Ok(index)
    }
}

/// Decodes pairs on a worker pool and commits them to one store.
///
/// Decoding runs fully in parallel. Commits are serialized behind a
/// mutex, so picking the next index and writing the record happen as
/// one step and indices never collide.
///
/// # Example
///
/// ```rust,no_run
/// use dbhandler_core::{Backend, StoreOptions};
/// use dbhandler_upload::{discover_pairs, UploadConfig, Uploader};
/// use std::path::Path;
///
/// let pairs = discover_pairs(Path::new("data/images"), Path::new("data/labels"))?;
/// let uploader = Uploader::new(UploadConfig::default().max_workers(30));
/// let report = uploader.upload_to(
///     Backend::MappedKv,
///     Path::new("data/lmdb/biz_card"),
///     StoreOptions::new(),
///     &pairs,
/// )?;
/// println!("{} records, {} skipped", report.final_len, report.skipped);
/// # Ok::<(), dbhandler_upload::UploadError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Uploader {
    config: UploadConfig,
}

impl Uploader {
    /// Creates an uploader.
    #[must_use]
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Opens the store at `path` and uploads `pairs` into it.
    ///
    /// The store is created (or appended to, with
    /// [`UploadConfig::append`]); `force` and `verbose` from the upload
    /// config override the ones in `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store
    /// cannot be opened or closed.
    pub fn upload_to(
        &self,
        backend: Backend,
        path: &Path,
        options: StoreOptions,
        pairs: &[DataPair],
    ) -> UploadResult<UploadReport> {
        self.config.validate()?;
        let mode = if self.config.append {
            OpenMode::Append
        } else {
            OpenMode::Create
        };
        let options = options
            .force(self.config.force)
            .verbose(self.config.verbose);
        let store = RecordStore::open(backend, path, mode, options)?;
        self.upload(store, pairs)
    }

    /// Uploads `pairs` into an already open store, then closes it.
    ///
    /// Pairs whose image or label cannot be read, and records the store
    /// rejects, are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the pool cannot
    /// be built, or the store cannot be closed.
    pub fn upload(&self, store: RecordStore, pairs: &[DataPair]) -> UploadResult<UploadReport> {
        self.config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .thread_name(|i| format!("dbhandler-upload-{i}"))
            .build()?;

        let bar = self.progress_bar(pairs.len() as u64);
        let base = self.config.index_base;
        let committer = Mutex::new(Committer {
            store,
            committed: Vec::with_capacity(pairs.len()),
        });
        let skipped = AtomicUsize::new(0);

        pool.install(|| {
            pairs.par_iter().for_each(|pair| {
                match load_pair(pair) {
                    Ok((image, annotation)) => {
                        let result = committer.lock().commit(base, &image, &annotation);
                        if let Err(e) = result {
                            warn!(image = %pair.image.display(), "failed to store pair: {e}");
                            skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => {
                        warn!("skipping pair: {e}");
                        skipped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                bar.inc(1);
            });
        });
        bar.finish();

        let Committer {
            mut store,
            mut committed,
        } = committer.into_inner();
        committed.sort_unstable();
        let final_len = store.len()?;
        store.close()?;

        let report = UploadReport {
            pairs_seen: pairs.len(),
            committed,
            skipped: skipped.into_inner(),
            final_len,
        };
        info!(
            pairs = report.pairs_seen,
            committed = report.committed_count(),
            skipped = report.skipped,
            len = report.final_len,
            "upload finished"
        );
        Ok(report)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})")
        {
            bar.set_style(style);
        }
        bar.set_message("Uploading");
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UploadError;
    use tempfile::tempdir;

    #[test]
    fn invalid_config_fails_before_opening() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("never.db");
        let uploader = Uploader::new(UploadConfig::default().max_workers(0));

        let result = uploader.upload_to(Backend::MappedKv, &path, StoreOptions::new(), &[]);
        assert!(matches!(result, Err(UploadError::InvalidConfig(_))));
        assert!(!path.exists());
    }

    #[test]
    fn empty_upload_closes_store() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("empty.h5col");
        let uploader = Uploader::new(UploadConfig::default().show_progress(false));

        let report = uploader
            .upload_to(Backend::Columnar, &path, StoreOptions::new(), &[])
            .unwrap();
        assert_eq!(report.final_len, 0);
        assert!(report.committed.is_empty());

        // Lock released on close
        let reopened = RecordStore::open(Backend::Columnar, &path, OpenMode::Append, StoreOptions::new());
        assert!(reopened.is_ok());
    }

    #[test]
    fn unreadable_pairs_are_counted() {
        let temp = tempdir().unwrap();
        let pairs = vec![
            DataPair::new(temp.path().join("a.jpg"), temp.path().join("a.json")),
            DataPair::new(temp.path().join("b.jpg"), temp.path().join("b.json")),
        ];
        let uploader = Uploader::new(UploadConfig::default().max_workers(2).show_progress(false));

        let report = uploader
            .upload_to(Backend::MappedKv, &temp.path().join("s.db"), StoreOptions::new(), &pairs)
            .unwrap();
        assert_eq!(report.pairs_seen, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.final_len, 0);
    }
}
