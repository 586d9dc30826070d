use bytes::{Buf, BufMut, BytesMut};

use crate::errors::{Errors, Result};

/// Fixed on-disk record header: `crc32 | timestamp | ksz | vsz`, four
/// big-endian u32 fields.
pub const HEADER_SIZE: usize = 16;

/// Fixed hint header: `timestamp | ksz | value_size | value_position(i64)`.
pub const HINT_HEADER_SIZE: usize = 20;

/// Configured key/value size bounds, threaded into the codecs.
#[derive(Debug, Clone, Copy)]
pub struct RecordLimits {
  pub max_key_size: u32,
  pub max_value_size: u32,
}

/// A single on-disk record. A zero-length value marks a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
  pub timestamp: u32,
  pub key: Vec<u8>,
  pub value: Vec<u8>,
}

impl LogRecord {
  pub fn is_tombstone(&self) -> bool {
    self.value.is_empty()
  }

  pub fn encoded_len(&self) -> usize {
    HEADER_SIZE + self.key.len() + self.value.len()
  }

  /// Appends the encoded record to `buf` and returns the number of bytes
  /// written. The CRC covers every byte after itself.
  pub fn encode(&self, limits: RecordLimits, buf: &mut BytesMut) -> Result<usize> {
    if self.key.len() > limits.max_key_size as usize
      || self.value.len() > limits.max_value_size as usize
    {
      return Err(Errors::OversizedRecord);
    }

    let start = buf.len();
    buf.reserve(self.encoded_len());
    buf.put_u32(0); // crc placeholder
    buf.put_u32(self.timestamp);
    buf.put_u32(self.key.len() as u32);
    buf.put_u32(self.value.len() as u32);
    buf.put_slice(&self.key);
    buf.put_slice(&self.value);

    let crc = crc32(&buf[start + 4..]);
    buf[start..start + 4].copy_from_slice(&crc.to_be_bytes());

    Ok(buf.len() - start)
  }

  /// Decodes one record from the front of `buf`. Returns the record and
  /// the number of bytes it occupied. The input is untouched on error.
  pub fn decode(buf: &[u8], limits: RecordLimits) -> Result<(LogRecord, usize)> {
    let header = RecordHeader::decode(buf)?;
    if header.ksz > limits.max_key_size || header.vsz > limits.max_value_size {
      return Err(Errors::OversizedRecord);
    }

    let total = HEADER_SIZE + header.ksz as usize + header.vsz as usize;
    if buf.len() < total {
      return Err(Errors::ReadDataFileEOF);
    }
    if crc32(&buf[4..total]) != header.crc {
      return Err(Errors::ChecksumMismatch);
    }

    let key_end = HEADER_SIZE + header.ksz as usize;
    Ok((
      LogRecord {
        timestamp: header.timestamp,
        key: buf[HEADER_SIZE..key_end].to_vec(),
        value: buf[key_end..total].to_vec(),
      },
      total,
    ))
  }
}

#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
  pub crc: u32,
  pub timestamp: u32,
  pub ksz: u32,
  pub vsz: u32,
}

impl RecordHeader {
  pub fn decode(mut buf: &[u8]) -> Result<RecordHeader> {
    if buf.len() < HEADER_SIZE {
      return Err(Errors::ReadDataFileEOF);
    }
    Ok(RecordHeader {
      crc: buf.get_u32(),
      timestamp: buf.get_u32(),
      ksz: buf.get_u32(),
      vsz: buf.get_u32(),
    })
  }
}

fn crc32(bytes: &[u8]) -> u32 {
  let mut hasher = crc32fast::Hasher::new();
  hasher.update(bytes);
  hasher.finalize()
}

/// One live-key entry of the in-memory keydir. `value_pos` is the absolute
/// offset of the value payload inside `file_id`, not of the record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeydirEntry {
  pub file_id: u64,
  pub value_size: u32,
  pub value_pos: u64,
  pub timestamp: u32,
}

/// Appends a hint record for `key` to `buf`:
/// `timestamp | ksz | value_size | value_position(i64) | key`, big-endian.
/// Hint records carry no CRC; they are a rebuildable index.
pub fn encode_hint_record(key: &[u8], entry: &KeydirEntry, buf: &mut BytesMut) -> usize {
  let start = buf.len();
  buf.reserve(HINT_HEADER_SIZE + key.len());
  buf.put_u32(entry.timestamp);
  buf.put_u32(key.len() as u32);
  buf.put_u32(entry.value_size);
  buf.put_i64(entry.value_pos as i64);
  buf.put_slice(key);
  buf.len() - start
}

/// Decodes one hint record from the front of `buf`; the file id is not on
/// the wire and is filled in by the caller. A short buffer reads as
/// `ReadDataFileEOF`; an implausible key length as `Corrupt`.
pub fn decode_hint_record(
  buf: &[u8],
  limits: RecordLimits,
  file_id: u64,
) -> Result<(Vec<u8>, KeydirEntry, usize)> {
  if buf.len() < HINT_HEADER_SIZE {
    return Err(Errors::ReadDataFileEOF);
  }
  let mut header = &buf[..HINT_HEADER_SIZE];
  let timestamp = header.get_u32();
  let ksz = header.get_u32();
  let value_size = header.get_u32();
  let value_pos = header.get_i64();

  if ksz > limits.max_key_size || value_pos < 0 {
    return Err(Errors::Corrupt);
  }
  let total = HINT_HEADER_SIZE + ksz as usize;
  if buf.len() < total {
    return Err(Errors::ReadDataFileEOF);
  }

  Ok((
    buf[HINT_HEADER_SIZE..total].to_vec(),
    KeydirEntry {
      file_id,
      value_size,
      value_pos: value_pos as u64,
      timestamp,
    },
    total,
  ))
}
