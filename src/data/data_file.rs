use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::{
  errors::{Errors, Result},
  fio::{new_io_manager, IOManager},
  option::IOManagerType,
};

use super::log_record::{
  decode_hint_record, encode_hint_record, KeydirEntry, LogRecord, RecordHeader, RecordLimits,
  HEADER_SIZE, HINT_HEADER_SIZE,
};

pub const DATA_FILE_NAME_SUFFIX: &str = ".data";
pub const HINT_FILE_NAME_SUFFIX: &str = ".data.hint";

pub fn data_file_path<P: AsRef<Path>>(dir: P, file_id: u64) -> PathBuf {
  dir
    .as_ref()
    .join(format!("{}{}", file_id, DATA_FILE_NAME_SUFFIX))
}

pub fn hint_file_path<P: AsRef<Path>>(dir: P, file_id: u64) -> PathBuf {
  dir
    .as_ref()
    .join(format!("{}{}", file_id, HINT_FILE_NAME_SUFFIX))
}

#[derive(Debug)]
pub struct ReadLogRecord {
  pub record: LogRecord,
  pub size: u64,
}

/// One append-only log file plus its optional sibling hint file.
///
/// The active file carries a hint writer; sealing drops it. Reads are
/// positional and valid concurrently with appends.
pub struct DataFile {
  file_id: u64,
  write_off: u64,
  io: Box<dyn IOManager>,
  hint: Option<HintFile>,
}

impl DataFile {
  /// Opens `{id}.data` and `{id}.data.hint` for append; the data handle
  /// also serves positional reads. Used for the active file.
  pub fn new<P: AsRef<Path>>(dir: P, file_id: u64) -> Result<DataFile> {
    let io = new_io_manager(&data_file_path(&dir, file_id), IOManagerType::StandardFileIO)?;
    let write_off = io.size();
    let hint = HintFile::new(&dir, file_id)?;
    Ok(DataFile {
      file_id,
      write_off,
      io,
      hint: Some(hint),
    })
  }

  /// Opens an existing `{id}.data` read-only (no hint writer). Used for
  /// sealed files.
  pub fn open<P: AsRef<Path>>(dir: P, file_id: u64, io_type: IOManagerType) -> Result<DataFile> {
    let io = new_io_manager(&data_file_path(&dir, file_id), io_type)?;
    let write_off = io.size();
    Ok(DataFile {
      file_id,
      write_off,
      io,
      hint: None,
    })
  }

  pub fn file_id(&self) -> u64 {
    self.file_id
  }

  pub fn write_off(&self) -> u64 {
    self.write_off
  }

  /// Appends encoded record bytes, returning the file offset one past the
  /// end of the append.
  pub fn append(&mut self, buf: &[u8]) -> Result<u64> {
    let n = self.io.write(buf)?;
    self.write_off += n as u64;
    Ok(self.write_off)
  }

  /// Appends a hint entry for `key` to the sibling hint file. A no-op on
  /// sealed files.
  pub fn append_hint(&mut self, key: &[u8], entry: &KeydirEntry) -> Result<()> {
    if let Some(hint) = self.hint.as_mut() {
      hint.append_entry(key, entry)?;
    }
    Ok(())
  }

  /// Reads and verifies the record starting at `offset`.
  ///
  /// A truncated tail reads as `ReadDataFileEOF`, an implausible header as
  /// `Corrupt`, a failed CRC as `ChecksumMismatch`.
  pub fn read_log_record(&self, offset: u64, limits: RecordLimits) -> Result<ReadLogRecord> {
    let mut header = [0u8; HEADER_SIZE];
    self.io.read(&mut header, offset)?;
    let h = RecordHeader::decode(&header)?;
    if h.ksz > limits.max_key_size || h.vsz > limits.max_value_size {
      return Err(Errors::Corrupt);
    }

    let total = HEADER_SIZE + h.ksz as usize + h.vsz as usize;
    if offset + total as u64 > self.io.size() {
      return Err(Errors::ReadDataFileEOF);
    }

    let mut buf = vec![0u8; total];
    self.io.read(&mut buf, offset)?;
    let (record, size) = LogRecord::decode(&buf, limits)?;
    Ok(ReadLogRecord {
      record,
      size: size as u64,
    })
  }

  /// Positional read of exactly `len` bytes at `pos`.
  pub fn read_value_at(&self, pos: u64, len: u32) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len as usize];
    self.io.read(&mut buf, pos)?;
    Ok(buf)
  }

  /// Flushes the data handle; the hint file is advisory and is flushed
  /// opportunistically alongside it.
  pub fn sync(&self) -> Result<()> {
    self.io.sync()?;
    if let Some(hint) = self.hint.as_ref() {
      hint.sync()?;
    }
    Ok(())
  }

  /// Drops the hint writer; the file keeps serving positional reads but
  /// never takes another append.
  pub fn seal(&mut self) {
    self.hint = None;
  }

  /// Swaps the underlying read handle, e.g. from the startup mmap back to
  /// standard file I/O.
  pub(crate) fn reset_io_manager<P: AsRef<Path>>(
    &mut self,
    dir: P,
    io_type: IOManagerType,
  ) -> Result<()> {
    self.io = new_io_manager(&data_file_path(dir, self.file_id), io_type)?;
    Ok(())
  }

  pub fn iter(&self, limits: RecordLimits) -> DataFileIterator<'_> {
    DataFileIterator {
      data_file: self,
      limits,
      offset: 0,
      done: false,
    }
  }
}

/// Streaming walk over a data file, yielding `(key, keydir entry)` per
/// record; tombstones yield a zero `value_size`. A truncated or
/// implausibly-sized trailing record ends the walk; a mid-file checksum
/// failure is surfaced to the caller.
pub struct DataFileIterator<'a> {
  data_file: &'a DataFile,
  limits: RecordLimits,
  offset: u64,
  done: bool,
}

impl DataFileIterator<'_> {
  pub fn has_next(&self) -> bool {
    !self.done && self.offset < self.data_file.write_off()
  }
}

impl Iterator for DataFileIterator<'_> {
  type Item = Result<(Vec<u8>, KeydirEntry)>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    match self.data_file.read_log_record(self.offset, self.limits) {
      Ok(ReadLogRecord { record, size }) => {
        let entry = KeydirEntry {
          file_id: self.data_file.file_id(),
          value_size: record.value.len() as u32,
          value_pos: self.offset + HEADER_SIZE as u64 + record.key.len() as u64,
          timestamp: record.timestamp,
        };
        self.offset += size;
        Some(Ok((record.key, entry)))
      }
      Err(Errors::ReadDataFileEOF) | Err(Errors::Corrupt) | Err(Errors::OversizedRecord) => {
        self.done = true;
        None
      }
      Err(e) => {
        self.done = true;
        Some(Err(e))
      }
    }
  }
}

/// The compact index sibling of a data file. No CRC: if it is corrupt or
/// truncated the engine rescans the paired data file.
pub struct HintFile {
  file_id: u64,
  write_off: u64,
  io: Box<dyn IOManager>,
}

impl HintFile {
  pub fn new<P: AsRef<Path>>(dir: P, file_id: u64) -> Result<HintFile> {
    Self::open(dir, file_id, IOManagerType::StandardFileIO)
  }

  pub fn open<P: AsRef<Path>>(dir: P, file_id: u64, io_type: IOManagerType) -> Result<HintFile> {
    let io = new_io_manager(&hint_file_path(&dir, file_id), io_type)?;
    let write_off = io.size();
    Ok(HintFile {
      file_id,
      write_off,
      io,
    })
  }

  pub fn exists<P: AsRef<Path>>(dir: P, file_id: u64) -> bool {
    hint_file_path(dir, file_id).is_file()
  }

  pub fn append_entry(&mut self, key: &[u8], entry: &KeydirEntry) -> Result<()> {
    let mut buf = BytesMut::with_capacity(HINT_HEADER_SIZE + key.len());
    encode_hint_record(key, entry, &mut buf);
    let n = self.io.write(&buf)?;
    self.write_off += n as u64;
    Ok(())
  }

  pub fn sync(&self) -> Result<()> {
    self.io.sync()
  }

  pub fn iter(&self, limits: RecordLimits) -> HintFileIterator<'_> {
    HintFileIterator {
      hint_file: self,
      limits,
      offset: 0,
      done: false,
    }
  }
}

/// Streaming walk over a hint file. Any truncation or implausible entry
/// yields `Corrupt` so the loader can fall back to the data file.
pub struct HintFileIterator<'a> {
  hint_file: &'a HintFile,
  limits: RecordLimits,
  offset: u64,
  done: bool,
}

impl Iterator for HintFileIterator<'_> {
  type Item = Result<(Vec<u8>, KeydirEntry)>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    let size = self.hint_file.io.size();
    if self.offset >= size {
      self.done = true;
      return None;
    }

    let item = || -> Result<(Vec<u8>, KeydirEntry, usize)> {
      let mut header = [0u8; HINT_HEADER_SIZE];
      self.hint_file.io.read(&mut header, self.offset)?;
      let ksz = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
      if ksz > self.limits.max_key_size {
        return Err(Errors::Corrupt);
      }
      let total = HINT_HEADER_SIZE + ksz as usize;
      let mut buf = vec![0u8; total];
      self.hint_file.io.read(&mut buf, self.offset)?;
      decode_hint_record(&buf, self.limits, self.hint_file.file_id)
    };

    match item() {
      Ok((key, entry, consumed)) => {
        self.offset += consumed as u64;
        Some(Ok((key, entry)))
      }
      Err(e) => {
        self.done = true;
        // a short tail means the hint is truncated, not that the walk is done
        let e = match e {
          Errors::ReadDataFileEOF => Errors::Corrupt,
          other => other,
        };
        Some(Err(e))
      }
    }
  }
}
