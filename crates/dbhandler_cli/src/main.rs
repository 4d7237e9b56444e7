//! DBHandler CLI
//!
//! Command-line tools for building and checking record stores.
//!
//! # Commands
//!
//! - `upload` - Upload an image/label dataset into a new store
//! - `inspect` - Display store statistics
//! - `get` - Print one record
//! - `verify` - Read back every record
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use dbhandler_core::{Backend, Compression, ImageFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DBHandler command-line dataset tools.
#[derive(Parser)]
#[command(name = "dbhandler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an image/label dataset into a store
    Upload {
        /// Directory of images (jpg, jpeg, png, bmp)
        #[arg(long)]
        images: PathBuf,

        /// Directory of JSON labels
        #[arg(long)]
        labels: PathBuf,

        /// Output store path
        #[arg(short, long)]
        output: PathBuf,

        /// Backend (kv, columnar); inferred from the output path if omitted
        #[arg(short, long)]
        backend: Option<Backend>,

        /// Number of decode workers
        #[arg(short, long, default_value_t = dbhandler_upload::DEFAULT_MAX_WORKERS)]
        workers: usize,

        /// Replace an existing store
        #[arg(short, long, conflicts_with = "append")]
        force: bool,

        /// Add to an existing store
        #[arg(short, long)]
        append: bool,

        /// Columnar compression (none, gzip[:L], zstd[:L])
        #[arg(short, long, default_value = "none")]
        compression: Compression,

        /// Image encoding (jpeg, png)
        #[arg(long, default_value = "jpeg")]
        image_format: ImageFormat,

        /// Use the legacy one-based index convention
        #[arg(long)]
        one_based: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Display store statistics
    Inspect {
        /// Store path
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one record
    Get {
        /// Store path
        path: PathBuf,

        /// Record index
        index: u64,

        /// Write the decoded image to this file
        #[arg(short, long)]
        image_out: Option<PathBuf>,
    },

    /// Read back every record
    Verify {
        /// Store path
        path: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Upload {
            images,
            labels,
            output,
            backend,
            workers,
            force,
            append,
            compression,
            image_format,
            one_based,
            no_progress,
        } => {
            let args = commands::upload::UploadArgs {
                images,
                labels,
                backend: backend.unwrap_or_else(|| Backend::infer(&output)),
                output,
                workers,
                force,
                append,
                compression,
                image_format,
                one_based,
                progress: !no_progress,
                verbose: cli.verbose,
            };
            commands::upload::run(&args)?;
        }
        Commands::Inspect { path, format } => {
            commands::inspect::run(&path, &format)?;
        }
        Commands::Get {
            path,
            index,
            image_out,
        } => {
            commands::get::run(&path, index, image_out.as_deref())?;
        }
        Commands::Verify { path } => {
            commands::verify::run(&path)?;
        }
        Commands::Version => {
            println!("DBHandler CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
