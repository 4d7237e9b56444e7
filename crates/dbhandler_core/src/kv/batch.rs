//! Write batch framing for the key/value log.

use crate::error::{StoreError, StoreResult};
use dbhandler_storage::compute_crc32;

/// Magic number at the start of every batch frame ("DBKV").
pub const BATCH_MAGIC: [u8; 4] = *b"DBKV";

/// Frame header size: magic (4) + entry count (4) + body length (4).
pub const HEADER_SIZE: usize = 12;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Per-entry header size: key length (4) + value length (4).
const ENTRY_HEADER_SIZE: usize = 8;

/// A group of key/value writes committed atomically.
///
/// Later puts of the same key within one batch win.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a write of `value` under `key`.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Returns `true` if `key` is written by this batch.
    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns the keys written by this batch, in order.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|(k, _)| k.as_slice())
    }

    /// Returns the number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes the batch as one frame.
    ///
    /// ```text
    /// | magic (4) | entry_count (4) | body_len (4) | body | crc32 (4) |
    /// body entry: | key_len (4) | value_len (4) | key | value |
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if a key, value or the whole body exceeds `u32`.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let body_len: usize = self
            .entries
            .iter()
            .map(|(k, v)| ENTRY_HEADER_SIZE + k.len() + v.len())
            .sum();
        let body_len_u32 = to_u32(body_len, "batch body")?;
        let count = to_u32(self.entries.len(), "batch entry count")?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + body_len + CRC_SIZE);
        frame.extend_from_slice(&BATCH_MAGIC);
        frame.extend_from_slice(&count.to_le_bytes());
        frame.extend_from_slice(&body_len_u32.to_le_bytes());

        for (key, value) in &self.entries {
            frame.extend_from_slice(&to_u32(key.len(), "key")?.to_le_bytes());
            frame.extend_from_slice(&to_u32(value.len(), "value")?.to_le_bytes());
            frame.extend_from_slice(key);
            frame.extend_from_slice(value);
        }

        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

fn to_u32(len: usize, what: &str) -> StoreResult<u32> {
    u32::try_from(len)
        .map_err(|_| StoreError::invalid_format(format!("{what} too large: {len} bytes")))
}

/// Location of one decoded entry inside the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    /// The entry key.
    pub key: Vec<u8>,
    /// Absolute offset of the value bytes.
    pub value_offset: u64,
    /// Value length.
    pub value_len: u32,
}

/// Result of scanning a region of the log.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Entries of every complete batch, in commit order.
    pub entries: Vec<EntryRef>,
    /// Number of complete batches found.
    pub batches: usize,
    /// Offset just past the last complete batch.
    pub valid_end: u64,
    /// Why scanning stopped before the end of the data, if it did.
    pub stopped: Option<String>,
}

/// Scans complete batches in `data[start..]`.
///
/// Scanning stops at the first frame that is incomplete, has a bad magic
/// number, or fails its checksum. Everything before it is returned.
#[must_use]
pub fn scan(data: &[u8], start: u64) -> ScanOutcome {
    let mut outcome = ScanOutcome {
        valid_end: start,
        ..ScanOutcome::default()
    };
    let mut pos = start as usize;

    while pos < data.len() {
        match decode_frame(data, pos) {
            Ok((entries, frame_len)) => {
                outcome.entries.extend(entries);
                outcome.batches += 1;
                pos += frame_len;
                outcome.valid_end = pos as u64;
            }
            Err(reason) => {
                outcome.stopped = Some(reason);
                break;
            }
        }
    }

    outcome
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// Decodes one frame at `pos`, returning its entries and total length.
fn decode_frame(data: &[u8], pos: usize) -> Result<(Vec<EntryRef>, usize), String> {
    let remaining = data.len() - pos;
    if remaining < HEADER_SIZE {
        return Err(format!("incomplete batch header at offset {pos}"));
    }
    if data[pos..pos + 4] != BATCH_MAGIC {
        return Err(format!("bad batch magic at offset {pos}"));
    }

    let count = read_u32(data, pos + 4) as usize;
    let body_len = read_u32(data, pos + 8) as usize;
    let frame_len = HEADER_SIZE + body_len + CRC_SIZE;
    if remaining < frame_len {
        return Err(format!(
            "incomplete batch at offset {pos}: need {frame_len} bytes, have {remaining}"
        ));
    }

    let crc_pos = pos + HEADER_SIZE + body_len;
    let stored = read_u32(data, crc_pos);
    let computed = compute_crc32(&data[pos..crc_pos]);
    if stored != computed {
        return Err(format!(
            "batch checksum mismatch at offset {pos}: expected {stored:08x}, got {computed:08x}"
        ));
    }

    let mut entries = Vec::with_capacity(count);
    let mut cursor = pos + HEADER_SIZE;
    for _ in 0..count {
        if cursor + ENTRY_HEADER_SIZE > crc_pos {
            return Err(format!("entry header overruns batch at offset {pos}"));
        }
        let key_len = read_u32(data, cursor) as usize;
        let value_len = read_u32(data, cursor + 4);
        cursor += ENTRY_HEADER_SIZE;

        let value_start = cursor + key_len;
        let value_end = value_start + value_len as usize;
        if value_end > crc_pos {
            return Err(format!("entry overruns batch at offset {pos}"));
        }

        entries.push(EntryRef {
            key: data[cursor..value_start].to_vec(),
            value_offset: value_start as u64,
            value_len,
        });
        cursor = value_end;
    }

    if cursor != crc_pos {
        return Err(format!("batch body length mismatch at offset {pos}"));
    }

    Ok((entries, frame_len))
}
