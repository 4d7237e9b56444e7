//! On-disk header and directory of a columnar container.

use crate::column::compression::{from_tag, to_tag};
use crate::config::Compression;
use crate::error::{StoreError, StoreResult};
use dbhandler_storage::compute_crc32;

/// Magic bytes at the start of every container.
pub const COLUMN_MAGIC: [u8; 8] = *b"DBHCOLS1";

/// Current container format version.
pub const FORMAT_VERSION: u16 = 1;

/// Fixed header size; the element heap starts right after it.
pub const HEADER_SIZE: usize = 64;

/// Offset of the header checksum.
const HEADER_CRC_OFFSET: usize = HEADER_SIZE - 4;

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    /// Variable-length byte blobs.
    Bytes,
    /// Variable-length UTF-8 strings.
    Utf8,
}

impl DType {
    fn tag(self) -> u8 {
        match self {
            Self::Bytes => 0,
            Self::Utf8 => 1,
        }
    }

    fn from_tag(tag: u8) -> StoreResult<Self> {
        match tag {
            0 => Ok(Self::Bytes),
            1 => Ok(Self::Utf8),
            other => Err(StoreError::invalid_format(format!("unknown dtype {other}"))),
        }
    }
}

/// Position of one element in the heap. `len == 0` is an empty element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slot {
    /// Heap offset of the stored (possibly compressed) bytes.
    pub offset: u64,
    /// Stored length.
    pub len: u64,
}

/// Metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,
    /// Element type.
    pub dtype: DType,
    /// Compression applied to every element.
    pub compression: Compression,
    /// One slot per element.
    pub slots: Vec<Slot>,
}

/// The fixed-size container header.
///
/// ```text
/// | magic (8) | version (2) | reserved (6) | dir_offset (8) | dir_len (8) |
/// | generation (8) | reserved (20) | crc32 (4) |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Offset of the current directory, 0 if none has been written.
    pub dir_offset: u64,
    /// Length of the current directory.
    pub dir_len: u64,
    /// Incremented every time a new directory is published.
    pub generation: u64,
}

impl Header {
    /// Encodes the header to exactly [`HEADER_SIZE`] bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&COLUMN_MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&[0u8; 6]);
        buf.extend_from_slice(&self.dir_offset.to_le_bytes());
        buf.extend_from_slice(&self.dir_len.to_le_bytes());
        buf.extend_from_slice(&self.generation.to_le_bytes());
        buf.resize(HEADER_CRC_OFFSET, 0);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns an error on a short buffer, wrong magic, unsupported
    /// version or checksum mismatch.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(StoreError::invalid_format("container header truncated"));
        }
        if data[..8] != COLUMN_MAGIC {
            return Err(StoreError::invalid_format("not a columnar container"));
        }

        let stored = u32::from_le_bytes(slice_array(&data[HEADER_CRC_OFFSET..HEADER_SIZE]));
        let computed = compute_crc32(&data[..HEADER_CRC_OFFSET]);
        if stored != computed {
            return Err(StoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let mut reader = Reader::new(&data[8..HEADER_CRC_OFFSET]);
        let version = reader.u16()?;
        if version != FORMAT_VERSION {
            return Err(StoreError::invalid_format(format!(
                "unsupported container version {version}"
            )));
        }
        reader.skip(6)?;

        Ok(Self {
            dir_offset: reader.u64()?,
            dir_len: reader.u64()?,
            generation: reader.u64()?,
        })
    }
}

/// Encodes the column directory.
///
/// ```text
/// | column_count (4) | columns... | crc32 (4) |
/// column: | name_len (2) | name | dtype (1) | codec (1) | level (1) | length (8) | (offset (8), len (8))... |
/// ```
///
/// # Errors
///
/// Returns an error if a column name is longer than `u16::MAX` bytes.
pub fn encode_directory(columns: &[ColumnMeta]) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(columns.len() as u32).to_le_bytes());

    for column in columns {
        let name_len = u16::try_from(column.name.len()).map_err(|_| {
            StoreError::invalid_format(format!("column name too long: {}", column.name))
        })?;
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(column.name.as_bytes());
        buf.push(column.dtype.tag());
        let (codec, level) = to_tag(column.compression);
        buf.push(codec);
        buf.push(level);
        buf.extend_from_slice(&(column.slots.len() as u64).to_le_bytes());
        for slot in &column.slots {
            buf.extend_from_slice(&slot.offset.to_le_bytes());
            buf.extend_from_slice(&slot.len.to_le_bytes());
        }
    }

    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Decodes and validates a column directory.
///
/// # Errors
///
/// Returns an error on truncation, checksum mismatch or unknown tags.
pub fn decode_directory(data: &[u8]) -> StoreResult<Vec<ColumnMeta>> {
    if data.len() < 8 {
        return Err(StoreError::invalid_format("column directory truncated"));
    }
    let body = &data[..data.len() - 4];
    let stored = u32::from_le_bytes(slice_array(&data[data.len() - 4..]));
    let computed = compute_crc32(body);
    if stored != computed {
        return Err(StoreError::ChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }

    let mut reader = Reader::new(body);
    let count = reader.u32()? as usize;
    let mut columns = Vec::with_capacity(count);

    for _ in 0..count {
        let name_len = reader.u16()? as usize;
        let name = String::from_utf8(reader.bytes(name_len)?.to_vec())
            .map_err(|_| StoreError::invalid_format("column name is not UTF-8"))?;
        let dtype = DType::from_tag(reader.u8()?)?;
        let codec = reader.u8()?;
        let level = reader.u8()?;
        let compression = from_tag(codec, level)?;

        let length = reader.u64()? as usize;
        if length > reader.remaining() / 16 {
            return Err(StoreError::invalid_format(format!(
                "column '{name}' claims {length} slots past end of directory"
            )));
        }
        let mut slots = Vec::with_capacity(length);
        for _ in 0..length {
            slots.push(Slot {
                offset: reader.u64()?,
                len: reader.u64()?,
            });
        }

        columns.push(ColumnMeta {
            name,
            dtype,
            compression,
            slots,
        });
    }

    if reader.remaining() != 0 {
        return Err(StoreError::invalid_format("trailing bytes in column directory"));
    }
    Ok(columns)
}

fn slice_array<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[..N]);
    out
}

/// Little-endian cursor over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, len: usize) -> StoreResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(StoreError::invalid_format("unexpected end of metadata"));
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn skip(&mut self, len: usize) -> StoreResult<()> {
        self.bytes(len).map(|_| ())
    }

    fn u8(&mut self) -> StoreResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> StoreResult<u16> {
        Ok(u16::from_le_bytes(slice_array(self.bytes(2)?)))
    }

    fn u32(&mut self) -> StoreResult<u32> {
        Ok(u32::from_le_bytes(slice_array(self.bytes(4)?)))
    }

    fn u64(&mut self) -> StoreResult<u64> {
        Ok(u64::from_le_bytes(slice_array(self.bytes(8)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnMeta> {
        vec![
            ColumnMeta {
                name: "images".to_string(),
                dtype: DType::Bytes,
                compression: Compression::Gzip(4),
                slots: vec![Slot { offset: 64, len: 10 }, Slot::default()],
            },
            ColumnMeta {
                name: "labels".to_string(),
                dtype: DType::Utf8,
                compression: Compression::None,
                slots: vec![Slot { offset: 74, len: 3 }, Slot::default()],
            },
        ]
    }

    #[test]
    fn header_is_fixed_size() {
        let header = Header {
            dir_offset: 1234,
            dir_len: 56,
            generation: 7,
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(Header::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn header_rejects_foreign_files() {
        assert!(matches!(
            Header::decode(b"\x89HDF\r\n\x1a\n"),
            Err(StoreError::InvalidFormat { .. })
        ));

        let mut bytes = Header::default().encode();
        bytes[0] = b'X';
        assert!(matches!(
            Header::decode(&bytes),
            Err(StoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn header_checksum_catches_flip() {
        let mut bytes = Header::default().encode();
        bytes[20] ^= 0xFF;
        assert!(matches!(
            Header::decode(&bytes),
            Err(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn directory_preserves_columns() {
        let encoded = encode_directory(&columns()).unwrap();
        assert_eq!(decode_directory(&encoded).unwrap(), columns());
    }

    #[test]
    fn directory_checksum_catches_flip() {
        let mut encoded = encode_directory(&columns()).unwrap();
        encoded[6] ^= 0x01;
        assert!(matches!(
            decode_directory(&encoded),
            Err(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn empty_directory() {
        let encoded = encode_directory(&[]).unwrap();
        assert!(decode_directory(&encoded).unwrap().is_empty());
    }
}
