//! CRC32 checksums for framed on-disk structures.

/// Computes the CRC32 (IEEE) checksum of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn single_flip_changes_checksum() {
        assert_ne!(compute_crc32(b"images"), compute_crc32(b"imagez"));
    }
}
