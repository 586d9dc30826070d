use std::{
  fs::{File, OpenOptions},
  io::Write,
  os::unix::fs::FileExt,
  path::Path,
  sync::Arc,
};

use log::error;
use parking_lot::RwLock;

use crate::errors::{Errors, Result};

use super::IOManager;

/// Standard-file I/O: one descriptor opened for append plus positional
/// reads. Appends go through the write lock; positional reads only take
/// the read lock and never move the append offset.
pub struct FileIO {
  fd: Arc<RwLock<File>>,
}

impl FileIO {
  pub fn new<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    match OpenOptions::new()
      .create(true)
      .read(true)
      .append(true)
      .open(file_name)
    {
      Ok(file) => Ok(FileIO {
        fd: Arc::new(RwLock::new(file)),
      }),
      Err(e) => {
        error!("failed to open data file: {}", e);
        Err(Errors::from(e))
      }
    }
  }
}

impl IOManager for FileIO {
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
    let fd = self.fd.read();
    match fd.read_exact_at(buf, offset) {
      Ok(()) => Ok(buf.len()),
      Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Errors::ReadDataFileEOF),
      Err(e) => {
        error!("failed to read from data file: {}", e);
        Err(Errors::from(e))
      }
    }
  }

  fn write(&self, buf: &[u8]) -> Result<usize> {
    let mut fd = self.fd.write();
    if let Err(e) = fd.write_all(buf) {
      error!("failed to write to data file: {}", e);
      return Err(Errors::from(e));
    }
    Ok(buf.len())
  }

  fn sync(&self) -> Result<()> {
    let fd = self.fd.read();
    if let Err(e) = fd.sync_all() {
      error!("failed to sync data file: {}", e);
      return Err(Errors::from(e));
    }
    Ok(())
  }

  fn size(&self) -> u64 {
    let fd = self.fd.read();
    fd.metadata().map(|m| m.len()).unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_io_write_and_read_at() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.data");

    let fio = FileIO::new(&path).unwrap();
    assert_eq!(fio.write(b"hello world").unwrap(), 11);
    assert_eq!(fio.write(b"good morning").unwrap(), 12);

    let mut buf = [0u8; 5];
    fio.read(&mut buf, 6).unwrap();
    assert_eq!(&buf, b"world");

    let mut buf = [0u8; 12];
    fio.read(&mut buf, 11).unwrap();
    assert_eq!(&buf, b"good morning");
  }

  #[test]
  fn test_file_io_read_past_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.data");

    let fio = FileIO::new(&path).unwrap();
    fio.write(b"abc").unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(fio.read(&mut buf, 0).unwrap_err(), Errors::ReadDataFileEOF);
    assert_eq!(fio.read(&mut buf, 100).unwrap_err(), Errors::ReadDataFileEOF);
  }

  #[test]
  fn test_file_io_size_and_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.data");

    let fio = FileIO::new(&path).unwrap();
    assert_eq!(fio.size(), 0);
    fio.write(b"0123456789").unwrap();
    fio.sync().unwrap();
    assert_eq!(fio.size(), 10);
  }
}
