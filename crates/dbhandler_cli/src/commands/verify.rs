//! Verify command implementation.

use dbhandler_core::{OpenMode, RecordStore, StoreError, StoreOptions};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: u64,
    /// Records that decoded cleanly.
    pub valid_records: u64,
    /// Slots holding no image and a null annotation.
    pub placeholders: u64,
    /// Records that failed to read.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    println!("Verifying store at {:?}", path);
    println!();

    let store = RecordStore::open_inferred(path, OpenMode::Read, StoreOptions::new())?;
    let result = verify_store(&store)?;

    println!("Records checked: {}", result.records_checked);
    println!("  Valid:         {}", result.valid_records);
    println!("  Placeholders:  {}", result.placeholders);
    println!("  Errors:        {}", result.errors.len());
    for error in result.errors.iter().take(10) {
        println!("    - {error}");
    }
    if result.errors.len() > 10 {
        println!("    ... and {} more", result.errors.len() - 10);
    }

    println!();
    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(result)
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}

fn verify_store(store: &RecordStore) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    for index in 0..store.len()? {
        result.records_checked += 1;
        match store.get_data(index) {
            Ok(record) if record.is_placeholder() => result.placeholders += 1,
            Ok(_) => result.valid_records += 1,
            Err(e) if e.is_record_error() || matches!(e, StoreError::NotFound { .. }) => {
                result.errors.push(format!("record {index}: {e}"));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(result)
}
