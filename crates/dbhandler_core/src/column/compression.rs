//! Per-element compression for columnar arrays.

use crate::config::Compression;
use crate::error::{StoreError, StoreResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// On-disk codec tags.
const CODEC_NONE: u8 = 0;
const CODEC_GZIP: u8 = 1;
const CODEC_ZSTD: u8 = 2;

/// Returns the `(codec, level)` bytes stored in the directory.
pub(crate) fn to_tag(compression: Compression) -> (u8, u8) {
    match compression {
        Compression::None => (CODEC_NONE, 0),
        Compression::Gzip(level) => (CODEC_GZIP, level),
        Compression::Zstd(level) => (CODEC_ZSTD, level),
    }
}

/// Parses the `(codec, level)` bytes stored in the directory.
pub(crate) fn from_tag(codec: u8, level: u8) -> StoreResult<Compression> {
    match codec {
        CODEC_NONE => Ok(Compression::None),
        CODEC_GZIP => Ok(Compression::Gzip(level)),
        CODEC_ZSTD => Ok(Compression::Zstd(level)),
        other => Err(StoreError::invalid_format(format!(
            "unknown compression codec {other}"
        ))),
    }
}

/// Compresses one element.
pub(crate) fn compress(compression: Compression, data: &[u8]) -> StoreResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip(level) => {
            let mut encoder =
                GzEncoder::new(Vec::new(), flate2::Compression::new(u32::from(level)));
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Compression::Zstd(level) => Ok(zstd::stream::encode_all(data, i32::from(level))?),
    }
}

/// Decompresses one element.
pub(crate) fn decompress(compression: Compression, data: &[u8]) -> StoreResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip(_) => {
            let mut out = Vec::new();
            GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| StoreError::decode("gzip element", e))?;
            Ok(out)
        }
        Compression::Zstd(_) => {
            zstd::stream::decode_all(data).map_err(|e| StoreError::decode("zstd element", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Vec<u8> {
        br#"{"label":"x","bbox":[100,200,300,400]}"#.repeat(20)
    }

    #[test]
    fn gzip_shrinks_and_restores() {
        let data = payload();
        let packed = compress(Compression::Gzip(6), &data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(Compression::Gzip(6), &packed).unwrap(), data);
    }

    #[test]
    fn zstd_shrinks_and_restores() {
        let data = payload();
        let packed = compress(Compression::Zstd(3), &data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(Compression::Zstd(3), &packed).unwrap(), data);
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            decompress(Compression::Gzip(4), b"plain bytes"),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn tags_round_trip() {
        for compression in [Compression::None, Compression::Gzip(9), Compression::Zstd(5)] {
            let (codec, level) = to_tag(compression);
            assert_eq!(from_tag(codec, level).unwrap(), compression);
        }
        assert!(from_tag(7, 0).is_err());
    }
}
