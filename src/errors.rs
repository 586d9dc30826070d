use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Errors>;

/// Every error the engine can surface. `Io` keeps only the
/// [`std::io::ErrorKind`] so the enum stays comparable; the full error is
/// logged where it happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Errors {
  #[error("the database directory is locked by another writer")]
  Locked,

  #[error("a merge is already in progress")]
  MergeInProgress,

  #[error("key or value exceeds the configured size limit")]
  OversizedRecord,

  #[error("record checksum mismatch")]
  ChecksumMismatch,

  #[error("record header decodes to implausible sizes")]
  Corrupt,

  #[error("io failure: {0:?}")]
  Io(io::ErrorKind),

  #[error("the key is empty")]
  KeyIsEmpty,

  #[error("read reached the end of the data file")]
  ReadDataFileEOF,

  #[error("data file is missing from the file table")]
  DataFileNotFound,
}

impl From<io::Error> for Errors {
  fn from(e: io::Error) -> Self {
    Errors::Io(e.kind())
  }
}
