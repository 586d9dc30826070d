pub mod file_io;
pub mod mmap;

use std::path::Path;

use crate::{errors::Result, option::IOManagerType};

use self::{file_io::FileIO, mmap::MMapIO};

/// Abstract I/O management interface for different I/O implementations.
///
/// Reads are positional and take an explicit offset, so concurrent readers
/// never share a seek cursor.
pub trait IOManager: Sync + Send {
  /// Fills `buf` from `offset`, failing with `ReadDataFileEOF` when the
  /// window extends past the end of the file.
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

  /// Appends `buf` and returns the number of bytes written.
  fn write(&self, buf: &[u8]) -> Result<usize>;

  fn sync(&self) -> Result<()>;

  fn size(&self) -> u64;
}

pub fn new_io_manager(filename: &Path, io_type: IOManagerType) -> Result<Box<dyn IOManager>> {
  match io_type {
    IOManagerType::StandardFileIO => Ok(Box::new(FileIO::new(filename)?)),
    IOManagerType::MemoryMap => Ok(Box::new(MMapIO::new(filename)?)),
  }
}
