//! Inspect command implementation.

use dbhandler_core::{OpenMode, RecordStore, StoreOptions};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Backend name.
    pub backend: String,
    /// Number of records.
    pub records: u64,
    /// Bytes on disk.
    pub size_bytes: u64,
    /// Annotation of the first record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_annotation: Option<serde_json::Value>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = RecordStore::open_inferred(path, OpenMode::Read, StoreOptions::new())?;
    let records = store.len()?;

    let first_annotation = if records > 0 {
        store.get_data(0).ok().map(|record| record.annotation)
    } else {
        None
    };

    let result = InspectResult {
        path: path.display().to_string(),
        backend: store.backend().to_string(),
        records,
        size_bytes: disk_usage(path)?,
        first_annotation,
    };

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(result)
}

fn disk_usage(path: &Path) -> std::io::Result<u64> {
    let meta = fs::metadata(path)?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        total += disk_usage(&entry?.path())?;
    }
    Ok(total)
}

fn print_text_output(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!("Backend: {}", result.backend);
    println!("Records: {}", result.records);
    println!("Size: {} bytes", result.size_bytes);
    if let Some(annotation) = &result.first_annotation {
        println!("First annotation: {annotation}");
    }
}
