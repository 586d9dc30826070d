use std::{fs::OpenOptions, path::Path, sync::Arc};

use log::error;
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::errors::{Errors, Result};

use super::IOManager;

/// Read-only memory-mapped view of a sealed data file, used to speed up
/// startup loads. Zero-length files carry no mapping.
pub struct MMapIO {
  map: Arc<Mutex<Option<Mmap>>>,
}

impl MMapIO {
  pub fn new<P>(file_name: P) -> Result<Self>
  where
    P: AsRef<Path>,
  {
    let file = match OpenOptions::new().create(true).read(true).append(true).open(file_name) {
      Ok(file) => file,
      Err(e) => {
        error!("failed to open data file: {}", e);
        return Err(Errors::from(e));
      }
    };

    let map = if file.metadata()?.len() == 0 {
      None
    } else {
      match unsafe { Mmap::map(&file) } {
        Ok(map) => Some(map),
        Err(e) => {
          error!("failed to map data file: {}", e);
          return Err(Errors::from(e));
        }
      }
    };

    Ok(MMapIO {
      map: Arc::new(Mutex::new(map)),
    })
  }
}

impl IOManager for MMapIO {
  fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
    let map = self.map.lock();
    let map_arr = match map.as_ref() {
      Some(m) => m,
      None => return Err(Errors::ReadDataFileEOF),
    };
    let end = offset + buf.len() as u64;
    if end > map_arr.len() as u64 {
      return Err(Errors::ReadDataFileEOF);
    }

    let val = &map_arr[offset as usize..end as usize];
    buf.copy_from_slice(val);
    Ok(val.len())
  }

  fn write(&self, _buf: &[u8]) -> Result<usize> {
    unimplemented!("mmap handles are read-only")
  }

  fn sync(&self) -> Result<()> {
    unimplemented!("mmap handles are read-only")
  }

  fn size(&self) -> u64 {
    let map = self.map.lock();
    map.as_ref().map(|m| m.len() as u64).unwrap_or(0)
  }
}
