//! Error types for bulk uploads.

use dbhandler_core::StoreError;
use thiserror::Error;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that fail a whole upload.
///
/// Problems with a single pair never surface here; they are logged and
/// counted in [`crate::UploadReport::skipped`].
#[derive(Debug, Error)]
pub enum UploadError {
    /// The store could not be opened, queried or closed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The upload configuration is unusable.
    #[error("invalid upload config: {0}")]
    InvalidConfig(String),

    /// Listing input directories failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
