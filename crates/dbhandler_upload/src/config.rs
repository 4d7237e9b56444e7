//! Upload configuration.

use crate::error::{UploadError, UploadResult};

/// Default number of worker threads.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// How the uploader picks the index for the next committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBase {
    /// `index = len()`: records land at `0, 1, 2, ...`.
    #[default]
    Zero,
    /// `index = len() + 1`: the legacy convention. Every commit leaves a
    /// placeholder below the record it writes.
    One,
}

impl IndexBase {
    /// Returns the index the next record is written at.
    #[must_use]
    pub const fn next_index(self, len: u64) -> u64 {
        match self {
            Self::Zero => len,
            Self::One => len + 1,
        }
    }
}

/// Configuration for an [`crate::Uploader`].
///
/// # Example
///
/// ```rust
/// use dbhandler_upload::{IndexBase, UploadConfig};
///
/// let config = UploadConfig::default()
///     .max_workers(30)
///     .force(true)
///     .show_progress(false);
/// assert_eq!(config.index_base, IndexBase::Zero);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Size of the decode pool.
    pub max_workers: usize,

    /// Replace an existing store at the output path.
    pub force: bool,

    /// Log store events at `info`.
    pub verbose: bool,

    /// Draw a progress bar on stderr.
    pub show_progress: bool,

    /// Index convention for committed records.
    pub index_base: IndexBase,

    /// Add to an existing store instead of creating a new one.
    pub append: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            force: false,
            verbose: false,
            show_progress: true,
            index_base: IndexBase::Zero,
            append: false,
        }
    }
}

impl UploadConfig {
    /// Sets the decode pool size.
    #[must_use]
    pub const fn max_workers(mut self, count: usize) -> Self {
        self.max_workers = count;
        self
    }

    /// Sets whether an existing store may be replaced.
    #[must_use]
    pub const fn force(mut self, value: bool) -> Self {
        self.force = value;
        self
    }

    /// Sets verbose store logging.
    #[must_use]
    pub const fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Sets whether to draw a progress bar.
    #[must_use]
    pub const fn show_progress(mut self, value: bool) -> Self {
        self.show_progress = value;
        self
    }

    /// Sets the index convention.
    #[must_use]
    pub const fn index_base(mut self, base: IndexBase) -> Self {
        self.index_base = base;
        self
    }

    /// Sets whether to append to an existing store.
    #[must_use]
    pub const fn append(mut self, value: bool) -> Self {
        self.append = value;
        self
    }

    /// Checks the configuration before any store is touched.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::InvalidConfig`] for a zero-sized pool or for
    /// `force` combined with `append`.
    pub fn validate(&self) -> UploadResult<()> {
        if self.max_workers == 0 {
            return Err(UploadError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.force && self.append {
            return Err(UploadError::InvalidConfig(
                "force and append are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
        assert!(!config.force);
        assert!(config.show_progress);
        assert_eq!(config.index_base, IndexBase::Zero);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn index_base_offsets() {
        assert_eq!(IndexBase::Zero.next_index(0), 0);
        assert_eq!(IndexBase::Zero.next_index(7), 7);
        assert_eq!(IndexBase::One.next_index(0), 1);
        assert_eq!(IndexBase::One.next_index(7), 8);
    }

    #[test]
    fn zero_workers_rejected() {
        let config = UploadConfig::default().max_workers(0);
        assert!(matches!(config.validate(), Err(UploadError::InvalidConfig(_))));
    }

    #[test]
    fn force_with_append_rejected() {
        let config = UploadConfig::default().force(true).append(true);
        assert!(matches!(config.validate(), Err(UploadError::InvalidConfig(_))));
    }
}
