use lazy_static::lazy_static;
use std::path::PathBuf;

use crate::data::log_record::RecordLimits;

lazy_static! {
  pub static ref DEFAULT_DIR_PATH: PathBuf = std::env::temp_dir().join("logcask");
}

#[derive(Debug, Clone)]
pub struct Options {
  pub dir_path: PathBuf,

  /// Rotation threshold: the active file is sealed once an append would
  /// push it past this many bytes.
  pub data_file_size: u64,

  pub max_key_size: u32,

  pub max_value_size: u32,

  /// Fsync the active file after every append.
  pub sync_writes: bool,

  pub index_type: IndexType,

  /// Scan sealed files through a read-only mmap during load, then reopen
  /// them with standard file I/O for serving.
  pub mmap_at_startup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
  BTree,

  SkipList,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      dir_path: DEFAULT_DIR_PATH.clone(),
      data_file_size: 8 * 1024 * 1024, // 8MB
      max_key_size: 1024,
      max_value_size: 2048,
      sync_writes: false,
      index_type: IndexType::BTree,
      mmap_at_startup: true,
    }
  }
}

impl Options {
  pub(crate) fn limits(&self) -> RecordLimits {
    RecordLimits {
      max_key_size: self.max_key_size,
      max_value_size: self.max_value_size,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOManagerType {
  StandardFileIO,

  MemoryMap,
}
