//! Image and annotation codecs.
//!
//! Record stores never interpret pixels or JSON themselves. Images go
//! through an [`ImageCodec`] (JPEG or PNG via the `image` crate) and
//! annotations through `serde_json`.

use crate::error::{StoreError, StoreResult};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageResult, RgbImage};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

/// Encodes raster images to bytes and back.
pub trait ImageCodec: Send + Sync + fmt::Debug {
    /// Short codec name, used in logs.
    fn name(&self) -> &'static str;

    /// Encodes an RGB image.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder rejects the image (for example a
    /// zero-sized raster).
    fn encode(&self, image: &RgbImage) -> ImageResult<Vec<u8>>;

    /// Decodes bytes produced by any supported codec into RGB.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a supported image.
    fn decode(&self, bytes: &[u8]) -> ImageResult<RgbImage> {
        Ok(image::load_from_memory(bytes)?.to_rgb8())
    }
}

/// Lossy JPEG codec.
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    /// Creates a codec with the given quality, clamped to 1-100.
    #[must_use]
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Returns the encoder quality.
    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl ImageCodec for JpegCodec {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn encode(&self, image: &RgbImage) -> ImageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }
}

/// Lossless PNG codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn name(&self) -> &'static str {
        "png"
    }

    fn encode(&self, image: &RgbImage) -> ImageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }
}

/// Serializes an annotation as UTF-8 JSON, keeping non-ASCII text as-is.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode_annotation(annotation: &Value) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(annotation)?)
}

/// Parses a stored annotation.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] if the bytes are not valid JSON.
pub fn decode_annotation(bytes: &[u8]) -> StoreResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::decode("annotation", e))
}

/// Reads and decodes an image file into RGB.
///
/// # Errors
///
/// Returns an error if the file is missing or not a supported image.
pub fn read_image_file(path: &Path) -> ImageResult<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

/// Reads and parses a JSON label file.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be read and
/// [`StoreError::Json`] if it is not valid JSON.
pub fn read_annotation_file(path: &Path) -> StoreResult<Value> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
