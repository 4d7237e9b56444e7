//! Store configuration.

use crate::codec::{ImageCodec, JpegCodec, PngCodec};
use crate::column::COLUMNAR_EXTENSION;
use crate::error::StoreError;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// How a store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Path must exist; no locks are taken and nothing is written.
    Read,
    /// Path must not exist unless `force` is set.
    Create,
    /// Opens existing content or creates it, keeping the current length.
    Append,
}

impl OpenMode {
    /// Returns `true` for modes that may write.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl FromStr for OpenMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "read" => Ok(Self::Read),
            "w" | "create" => Ok(Self::Create),
            "a" | "append" => Ok(Self::Append),
            other => Err(StoreError::InvalidMode {
                mode: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "READ-ONLY",
            Self::Create => "CREATE",
            Self::Append => "APPEND",
        })
    }
}

/// Which persisted layout a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Memory-mapped key/value environment directory.
    MappedKv,
    /// Single container file holding two parallel arrays.
    Columnar,
}

impl Backend {
    /// Picks a backend from the path: the columnar extension selects
    /// [`Backend::Columnar`], anything else [`Backend::MappedKv`].
    #[must_use]
    pub fn infer(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext == COLUMNAR_EXTENSION) {
            Self::Columnar
        } else {
            Self::MappedKv
        }
    }
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kv" | "lmdb" | "mapped-kv" => Ok(Self::MappedKv),
            "columnar" | "column" | "hdf5" => Ok(Self::Columnar),
            other => Err(StoreError::invalid_format(format!(
                "unknown backend '{other}', use 'kv' or 'columnar'"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MappedKv => "mapped-kv",
            Self::Columnar => "columnar",
        })
    }
}

/// Per-element compression for columnar arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Elements are stored as-is.
    #[default]
    None,
    /// Deflate with gzip framing, level 0-9.
    Gzip(u8),
    /// Zstandard, level 1-22.
    Zstd(u8),
}

impl Compression {
    /// Default gzip level.
    pub const DEFAULT_GZIP_LEVEL: u8 = 4;
    /// Default zstd level.
    pub const DEFAULT_ZSTD_LEVEL: u8 = 3;
}

impl FromStr for Compression {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, level) = match s.split_once(':') {
            Some((name, level)) => {
                let level = level.parse::<u8>().map_err(|_| {
                    StoreError::invalid_format(format!("invalid compression level '{level}'"))
                })?;
                (name, Some(level))
            }
            None => (s, None),
        };

        match (name, level) {
            ("none", None) => Ok(Self::None),
            ("gzip", level) => {
                let level = level.unwrap_or(Self::DEFAULT_GZIP_LEVEL);
                if level > 9 {
                    return Err(StoreError::invalid_format(format!(
                        "gzip level {level} out of range 0-9"
                    )));
                }
                Ok(Self::Gzip(level))
            }
            ("zstd", level) => {
                let level = level.unwrap_or(Self::DEFAULT_ZSTD_LEVEL);
                if !(1..=22).contains(&level) {
                    return Err(StoreError::invalid_format(format!(
                        "zstd level {level} out of range 1-22"
                    )));
                }
                Ok(Self::Zstd(level))
            }
            _ => Err(StoreError::invalid_format(format!(
                "unknown compression '{s}', use none, gzip[:level] or zstd[:level]"
            ))),
        }
    }
}

/// Image encoding used for newly written records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Lossy JPEG at the given quality (1-100).
    Jpeg {
        /// Encoder quality.
        quality: u8,
    },
    /// Lossless PNG.
    Png,
}

impl Default for ImageFormat {
    fn default() -> Self {
        Self::Jpeg { quality: 95 }
    }
}

impl ImageFormat {
    /// Builds the codec for this format.
    #[must_use]
    pub fn codec(self) -> Arc<dyn ImageCodec> {
        match self {
            Self::Jpeg { quality } => Arc::new(JpegCodec::new(quality)),
            Self::Png => Arc::new(PngCodec),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::default()),
            "png" => Ok(Self::Png),
            other => Err(StoreError::invalid_format(format!(
                "unknown image format '{other}', use jpeg or png"
            ))),
        }
    }
}

/// Options for opening a record store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Allow create mode to delete existing content.
    pub force: bool,

    /// Log lifecycle and put events at `info` instead of `debug`.
    pub verbose: bool,

    /// Sync the key/value log after every committed batch.
    pub sync_on_commit: bool,

    /// Compression for columnar arrays created by this handle.
    pub compression: Compression,

    /// Codec for image payloads.
    pub image_codec: Arc<dyn ImageCodec>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            force: false,
            verbose: false,
            sync_on_commit: true,
            compression: Compression::None,
            image_codec: ImageFormat::default().codec(),
        }
    }
}

impl StoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether create mode may overwrite existing content.
    #[must_use]
    pub const fn force(mut self, value: bool) -> Self {
        self.force = value;
        self
    }

    /// Sets verbose event logging.
    #[must_use]
    pub const fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Sets whether to sync after every key/value batch.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets columnar compression.
    #[must_use]
    pub const fn compression(mut self, value: Compression) -> Self {
        self.compression = value;
        self
    }

    /// Uses the codec for `format`.
    #[must_use]
    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.image_codec = format.codec();
        self
    }

    /// Uses a caller-supplied codec.
    #[must_use]
    pub fn image_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.image_codec = codec;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = StoreOptions::default();
        assert!(!options.force);
        assert!(!options.verbose);
        assert!(options.sync_on_commit);
        assert_eq!(options.compression, Compression::None);
        assert_eq!(options.image_codec.name(), "jpeg");
    }

    #[test]
    fn builder_pattern() {
        let options = StoreOptions::new()
            .force(true)
            .sync_on_commit(false)
            .compression(Compression::Gzip(6))
            .image_format(ImageFormat::Png);

        assert!(options.force);
        assert!(!options.sync_on_commit);
        assert_eq!(options.compression, Compression::Gzip(6));
        assert_eq!(options.image_codec.name(), "png");
    }

    #[test]
    fn parse_modes() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("create".parse::<OpenMode>().unwrap(), OpenMode::Create);
        assert_eq!("a".parse::<OpenMode>().unwrap(), OpenMode::Append);
        assert!(matches!(
            "rw".parse::<OpenMode>(),
            Err(StoreError::InvalidMode { mode }) if mode == "rw"
        ));
    }

    #[test]
    fn parse_compression() {
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip(4));
        assert_eq!("gzip:9".parse::<Compression>().unwrap(), Compression::Gzip(9));
        assert_eq!("zstd:7".parse::<Compression>().unwrap(), Compression::Zstd(7));
        assert!("gzip:12".parse::<Compression>().is_err());
        assert!("zstd:0".parse::<Compression>().is_err());
        assert!("lzf".parse::<Compression>().is_err());
        assert!("none:1".parse::<Compression>().is_err());
    }

    #[test]
    fn infer_backend_from_extension() {
        assert_eq!(Backend::infer(Path::new("train.h5col")), Backend::Columnar);
        assert_eq!(Backend::infer(Path::new("data/lmdb/biz_card")), Backend::MappedKv);
        assert_eq!(Backend::infer(Path::new("s.db")), Backend::MappedKv);
        assert_eq!("hdf5".parse::<Backend>().unwrap(), Backend::Columnar);
    }
}
