//! Get command implementation.

use dbhandler_core::{OpenMode, RecordStore, StoreOptions};
use std::path::Path;

/// Runs the get command.
pub fn run(path: &Path, index: u64, image_out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open_inferred(path, OpenMode::Read, StoreOptions::new())?;
    let record = store.get_data(index)?;

    println!("Record {index} of {}", store.len()?);
    match &record.image {
        Some(image) => {
            let (width, height) = image.dimensions();
            println!("Image: {width}x{height}");
            if let Some(out) = image_out {
                image.save(out)?;
                println!("Image written to {out:?}");
            }
        }
        None => {
            println!("Image: none (placeholder)");
            if image_out.is_some() {
                return Err(format!("Record {index} has no image to write").into());
            }
        }
    }
    println!("Annotation:");
    println!("{}", serde_json::to_string_pretty(&record.annotation)?);
    Ok(())
}
