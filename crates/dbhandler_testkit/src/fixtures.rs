//! Test fixtures and store helpers.
//!
//! Provides temporary stores that clean up after themselves and on-disk
//! image/label datasets for upload tests.

use dbhandler_core::{
    Backend, ImageFormat, OpenMode, RecordStore, Rgb, RgbImage, StoreOptions, Value,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Options used by fixtures: lossless PNG so pixels compare exactly.
pub fn lossless_options() -> StoreOptions {
    StoreOptions::new().image_format(ImageFormat::Png)
}

/// A store in a temporary directory, removed on drop.
pub struct TestStore {
    /// The store instance.
    pub store: RecordStore,
    path: PathBuf,
    /// Kept alive to prevent cleanup.
    _temp_dir: TempDir,
}

impl TestStore {
    /// Creates an empty store of the given backend.
    pub fn new(backend: Backend) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = match backend {
            Backend::MappedKv => temp_dir.path().join("test.db"),
            Backend::Columnar => temp_dir.path().join("test.h5col"),
        };
        let store = RecordStore::open(backend, &path, OpenMode::Create, lossless_options())
            .expect("Failed to create store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Creates an empty key/value store.
    pub fn kv() -> Self {
        Self::new(Backend::MappedKv)
    }

    /// Creates an empty columnar store.
    pub fn columnar() -> Self {
        Self::new(Backend::Columnar)
    }

    /// Returns the store path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the store and opens it again in `mode`.
    pub fn reopen(&mut self, mode: OpenMode) {
        let backend = self.store.backend();
        self.store.close().expect("Failed to close store");
        self.store = RecordStore::open(backend, &self.path, mode, lossless_options())
            .expect("Failed to reopen store");
    }
}

impl std::ops::Deref for TestStore {
    type Target = RecordStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs `f` once against a fresh store of each backend.
///
/// # Example
///
/// ```rust,ignore
/// use dbhandler_testkit::for_each_backend;
///
/// #[test]
/// fn my_test() {
///     for_each_backend(|store| {
///         assert_eq!(store.len().unwrap(), 0);
///     });
/// }
/// ```
pub fn for_each_backend<F>(mut f: F)
where
    F: FnMut(&mut TestStore),
{
    for backend in [Backend::MappedKv, Backend::Columnar] {
        let mut store = TestStore::new(backend);
        f(&mut store);
    }
}

/// Deterministic image for record `seed`.
pub fn sample_image(seed: u32, width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = seed.wrapping_mul(31).wrapping_add(x * 7 + y * 13);
        Rgb([v as u8, (v >> 3) as u8, (v >> 5) as u8])
    })
}

/// Deterministic annotation for record `seed`.
pub fn sample_annotation(seed: usize) -> Value {
    json!({
        "index": seed,
        "label": format!("item {seed}"),
        "boxes": [[seed, seed + 1, seed + 10, seed + 20]],
        "text": "명함",
    })
}

/// A directory tree of images and JSON labels.
///
/// ```text
/// <root>/
/// ├─ images/image_000000.png ...
/// └─ labels/image_000000.json ...
/// ```
pub struct DatasetFixture {
    dir: TempDir,
    count: usize,
}

impl DatasetFixture {
    /// Writes `count` PNG images and matching labels.
    pub fn new(count: usize) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(dir.path().join("images")).expect("Failed to create images dir");
        fs::create_dir_all(dir.path().join("labels")).expect("Failed to create labels dir");

        let fixture = Self { dir, count };
        for i in 0..count {
            fixture
                .expected_image(i)
                .save(fixture.image_path(i))
                .expect("Failed to write image");
            let label = serde_json::to_vec(&sample_annotation(i)).expect("Failed to encode label");
            fs::write(fixture.label_path(i), label).expect("Failed to write label");
        }
        fixture
    }

    /// Returns the number of pairs written.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no pairs were written.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the fixture root, a good place for output stores.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the images directory.
    pub fn images_dir(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    /// Returns the labels directory.
    pub fn labels_dir(&self) -> PathBuf {
        self.dir.path().join("labels")
    }

    /// Returns the image path of pair `i`.
    pub fn image_path(&self, i: usize) -> PathBuf {
        self.images_dir().join(format!("image_{i:06}.png"))
    }

    /// Returns the label path of pair `i`.
    pub fn label_path(&self, i: usize) -> PathBuf {
        self.labels_dir().join(format!("image_{i:06}.json"))
    }

    /// Returns every `(image, label)` path pair in order.
    pub fn pair_paths(&self) -> Vec<(PathBuf, PathBuf)> {
        (0..self.count)
            .map(|i| (self.image_path(i), self.label_path(i)))
            .collect()
    }

    /// Returns the image stored for pair `i`.
    pub fn expected_image(&self, i: usize) -> RgbImage {
        sample_image(i as u32, 12, 8)
    }

    /// Returns the annotation stored for pair `i`.
    pub fn expected_annotation(&self, i: usize) -> Value {
        sample_annotation(i)
    }

    /// Overwrites image `i` with bytes no decoder accepts.
    pub fn corrupt_image(&self, i: usize) {
        fs::write(self.image_path(i), b"definitely not a png").expect("Failed to corrupt image");
    }

    /// Overwrites label `i` with invalid JSON.
    pub fn corrupt_label(&self, i: usize) {
        fs::write(self.label_path(i), b"{\"label\": ").expect("Failed to corrupt label");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_starts_empty() {
        for_each_backend(|store| {
            assert_eq!(store.len().unwrap(), 0);
            assert!(store.is_open());
        });
    }

    #[test]
    fn test_store_reopen() {
        let mut store = TestStore::kv();
        store
            .put_data(&sample_image(1, 4, 4), &sample_annotation(1), 0)
            .unwrap();
        store.reopen(OpenMode::Read);
        assert_eq!(store.mode(), OpenMode::Read);
        assert_eq!(store.get_data(0).unwrap().annotation, sample_annotation(1));
    }

    #[test]
    fn dataset_files_exist() {
        let dataset = DatasetFixture::new(3);
        assert_eq!(dataset.len(), 3);
        for (image, label) in dataset.pair_paths() {
            assert!(image.is_file());
            assert!(label.is_file());
        }
    }

    #[test]
    fn sample_image_is_deterministic() {
        assert_eq!(sample_image(5, 3, 3), sample_image(5, 3, 3));
        assert_ne!(sample_image(5, 3, 3), sample_image(6, 3, 3));
    }
}
