//! Benchmark utilities.

#![warn(missing_docs)]

use dbhandler_core::{Rgb, RgbImage, Value};
use rand::Rng;
use serde_json::json;

/// Generates an image with uniformly random pixels.
pub fn random_image(width: u32, height: u32) -> RgbImage {
    let mut rng = rand::thread_rng();
    RgbImage::from_fn(width, height, |_, _| Rgb(rng.gen()))
}

/// Generates a smooth image, closer to a photo than noise is.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) / 2 % 256) as u8])
    })
}

/// Generates an annotation with `boxes` random bounding boxes.
pub fn random_annotation(boxes: usize) -> Value {
    let mut rng = rand::thread_rng();
    let boxes: Vec<Value> = (0..boxes)
        .map(|i| {
            let x: u32 = rng.gen_range(0..1000);
            let y: u32 = rng.gen_range(0..1000);
            json!({
                "text": format!("field {i}"),
                "bbox": [x, y, x + rng.gen_range(1..200), y + rng.gen_range(1..50)],
            })
        })
        .collect();
    json!({ "label": "biz_card", "boxes": boxes })
}
