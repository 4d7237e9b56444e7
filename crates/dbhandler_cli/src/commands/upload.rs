//! Upload command implementation.

use dbhandler_core::{Backend, Compression, ImageFormat, StoreOptions};
use dbhandler_upload::{discover_pairs, IndexBase, UploadConfig, UploadReport, Uploader};
use std::path::PathBuf;
use tracing::info;

/// Arguments for the upload command.
#[derive(Debug)]
pub struct UploadArgs {
    /// Directory of images.
    pub images: PathBuf,
    /// Directory of JSON labels.
    pub labels: PathBuf,
    /// Output store path.
    pub output: PathBuf,
    /// Output backend.
    pub backend: Backend,
    /// Decode pool size.
    pub workers: usize,
    /// Replace an existing store.
    pub force: bool,
    /// Add to an existing store.
    pub append: bool,
    /// Columnar compression.
    pub compression: Compression,
    /// Image encoding.
    pub image_format: ImageFormat,
    /// Legacy one-based indices.
    pub one_based: bool,
    /// Draw a progress bar.
    pub progress: bool,
    /// Verbose store logging.
    pub verbose: bool,
}

/// Runs the upload command.
pub fn run(args: &UploadArgs) -> Result<UploadReport, Box<dyn std::error::Error>> {
    let pairs = discover_pairs(&args.images, &args.labels)?;
    if pairs.is_empty() {
        return Err(format!(
            "No image/label pairs found in {:?} and {:?}",
            args.images, args.labels
        )
        .into());
    }

    let config = UploadConfig::default()
        .max_workers(args.workers)
        .force(args.force)
        .append(args.append)
        .verbose(args.verbose)
        .show_progress(args.progress)
        .index_base(if args.one_based {
            IndexBase::One
        } else {
            IndexBase::Zero
        });
    let options = StoreOptions::new()
        .compression(args.compression)
        .image_format(args.image_format);
    info!(?config, ?options, "Upload configuration");

    println!(
        "Uploading {} pairs to {:?} ({})",
        pairs.len(),
        args.output,
        args.backend
    );
    let report = Uploader::new(config).upload_to(args.backend, &args.output, options, &pairs)?;

    println!();
    println!("Committed: {}", report.committed_count());
    println!("Skipped:   {}", report.skipped);
    println!("Records:   {}", report.final_len);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbhandler_testkit::DatasetFixture;

    fn args(dataset: &DatasetFixture, output: PathBuf) -> UploadArgs {
        UploadArgs {
            images: dataset.images_dir(),
            labels: dataset.labels_dir(),
            backend: Backend::infer(&output),
            output,
            workers: 2,
            force: false,
            append: false,
            compression: Compression::Gzip(6),
            image_format: ImageFormat::Png,
            one_based: false,
            progress: false,
            verbose: false,
        }
    }

    #[test]
    fn upload_discovered_dataset() {
        let dataset = DatasetFixture::new(4);
        let args = args(&dataset, dataset.root().join("out.h5col"));
        let report = run(&args).unwrap();
        assert_eq!(report.final_len, 4);
    }

    #[test]
    fn empty_dataset_is_an_error() {
        let dataset = DatasetFixture::new(0);
        let args = args(&dataset, dataset.root().join("out.db"));
        assert!(run(&args).is_err());
        assert!(!args.output.exists());
    }
}
