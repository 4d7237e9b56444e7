//! Image/label pair discovery and loading.

use crate::error::UploadResult;
use dbhandler_core::codec::{read_annotation_file, read_image_file};
use dbhandler_core::{RgbImage, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Image file extensions picked up by [`discover_pairs`].
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Label file extension picked up by [`discover_pairs`].
pub const LABEL_EXTENSION: &str = "json";

/// An image file and the JSON label that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPair {
    /// Path to the image file.
    pub image: PathBuf,
    /// Path to the JSON label file.
    pub label: PathBuf,
}

impl DataPair {
    /// Creates a pair.
    pub fn new(image: impl Into<PathBuf>, label: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            label: label.into(),
        }
    }
}

/// Why a pair was skipped.
#[derive(Debug, Error)]
pub enum PairError {
    /// The image is missing or not a supported format.
    #[error("failed to read image {}: {message}", path.display())]
    Image {
        /// Image path.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },

    /// The label is missing or not valid JSON.
    #[error("failed to read label {}: {message}", path.display())]
    Label {
        /// Label path.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },
}

/// Reads and decodes both halves of a pair.
///
/// # Errors
///
/// Returns [`PairError`] naming whichever file could not be used.
pub fn load_pair(pair: &DataPair) -> Result<(RgbImage, Value), PairError> {
    let image = read_image_file(&pair.image).map_err(|e| PairError::Image {
        path: pair.image.clone(),
        message: e.to_string(),
    })?;
    let annotation = read_annotation_file(&pair.label).map_err(|e| PairError::Label {
        path: pair.label.clone(),
        message: e.to_string(),
    })?;
    Ok((image, annotation))
}

/// Pairs the images in `images_dir` with the labels in `labels_dir`.
///
/// Both listings are sorted by file name and zipped by position. If one
/// side has more files, the extras are dropped with a warning.
///
/// # Errors
///
/// Returns an error if either directory cannot be listed.
pub fn discover_pairs(images_dir: &Path, labels_dir: &Path) -> UploadResult<Vec<DataPair>> {
    let images = list_files(images_dir, |ext| {
        IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
    })?;
    let labels = list_files(labels_dir, |ext| ext.eq_ignore_ascii_case(LABEL_EXTENSION))?;

    if images.len() != labels.len() {
        warn!(
            images = images.len(),
            labels = labels.len(),
            "image and label counts differ; unmatched files are ignored"
        );
    }

    Ok(images
        .into_iter()
        .zip(labels)
        .map(|(image, label)| DataPair { image, label })
        .collect())
}

fn list_files(dir: &Path, accept: impl Fn(&str) -> bool) -> UploadResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()).is_some_and(|ext| accept(ext)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn pairs_are_sorted_and_zipped() {
        let temp = tempdir().unwrap();
        let images = temp.path().join("images");
        let labels = temp.path().join("labels");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&labels).unwrap();

        for name in ["b.jpg", "a.png", "c.JPEG", "notes.txt"] {
            touch(&images, name);
        }
        for name in ["b.json", "a.json", "c.json"] {
            touch(&labels, name);
        }

        let pairs = discover_pairs(&images, &labels).unwrap();
        let names: Vec<_> = pairs
            .iter()
            .map(|p| {
                (
                    p.image.file_name().unwrap().to_string_lossy().into_owned(),
                    p.label.file_name().unwrap().to_string_lossy().into_owned(),
                )
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("a.png".to_string(), "a.json".to_string()),
                ("b.jpg".to_string(), "b.json".to_string()),
                ("c.JPEG".to_string(), "c.json".to_string()),
            ]
        );
    }

    #[test]
    fn extra_labels_are_dropped() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "0.jpg");
        touch(temp.path(), "0.json");
        touch(temp.path(), "1.json");

        let pairs = discover_pairs(temp.path(), temp.path()).unwrap();
        assert_eq!(
            pairs,
            vec![DataPair::new(temp.path().join("0.jpg"), temp.path().join("0.json"))]
        );
    }

    #[test]
    fn missing_directory_is_io_error() {
        let temp = tempdir().unwrap();
        let result = discover_pairs(&temp.path().join("nope"), temp.path());
        assert!(matches!(result, Err(crate::UploadError::Io(_))));
    }

    #[test]
    fn load_pair_names_bad_file() {
        let temp = tempdir().unwrap();
        let label = temp.path().join("0.json");
        fs::write(&label, br#"{"label": "x"}"#).unwrap();

        let missing = DataPair::new(temp.path().join("0.jpg"), &label);
        assert!(matches!(load_pair(&missing), Err(PairError::Image { .. })));

        let image = temp.path().join("0.png");
        RgbImage::new(2, 2).save(&image).unwrap();
        fs::write(&label, b"{not json").unwrap();
        let broken = DataPair::new(&image, &label);
        assert!(matches!(load_pair(&broken), Err(PairError::Label { .. })));
    }
}
