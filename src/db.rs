use std::{
  collections::HashMap,
  fs::{self, File, OpenOptions},
  path::Path,
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
  },
  time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use fs2::FileExt;
use log::{error, warn};
use parking_lot::RwLock;

use crate::{
  data::{
    data_file::{data_file_path, DataFile, HintFile, DATA_FILE_NAME_SUFFIX},
    log_record::{KeydirEntry, LogRecord, RecordLimits, HEADER_SIZE},
  },
  errors::{Errors, Result},
  index::{new_keydir, Keydir},
  option::{IOManagerType, Options},
  util::{self, buffer::BufferPool},
};

pub const WRITE_LOCK_FILE_NAME: &str = ".bitcask.write.lock";
pub const MERGE_LOCK_FILE_NAME: &str = ".bitcask.merge.lock";

/// Bitcask storage engine: an append-only log per directory plus an
/// in-memory keydir locating the latest value of every live key.
///
/// One engine instance owns its directory exclusively (a sentinel file
/// lock enforces this across processes); within the process it supports
/// parallel readers and serialized writers.
pub struct Engine {
  pub(crate) options: Arc<Options>,
  /// Active file and sealed-file table. Writers and the merge swap hold
  /// the write side; readers resolve the keydir entry and issue their
  /// positional read under the read side, so a lookup can never race the
  /// swap.
  pub(crate) files: RwLock<FileTable>,
  pub(crate) keydir: Box<dyn Keydir>,
  /// Estimate of dead bytes sitting in data files, fed by overwrites and
  /// deletes and reset by merge.
  pub(crate) reclaim_size: AtomicU64,
  buffers: BufferPool,
  lock_file: File,
  closed: AtomicBool,
}

pub(crate) struct FileTable {
  pub(crate) active: DataFile,
  pub(crate) sealed: HashMap<u64, DataFile>,
}

/// Engine statistics, cheap enough to poll.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
  pub key_num: usize,
  pub data_file_num: usize,
  pub disk_size: u64,
  pub reclaimable_size: u64,
}

impl Engine {
  /// Opens an engine on `options.dir_path`, creating the directory if
  /// needed. Acquires the writer lock, rebuilds the keydir from hint
  /// files (or by scanning), and opens a fresh active file.
  pub fn open(options: Options) -> Result<Engine> {
    let dir = options.dir_path.clone();
    if !dir.is_dir() {
      if let Err(e) = fs::create_dir_all(&dir) {
        error!("failed to create database directory: {}", e);
        return Err(Errors::from(e));
      }
    }

    let lock_file = OpenOptions::new()
      .create(true)
      .read(true)
      .write(true)
      .open(dir.join(WRITE_LOCK_FILE_NAME))?;
    if lock_file.try_lock_exclusive().is_err() {
      return Err(Errors::Locked);
    }

    let keydir = new_keydir(options.index_type);
    let limits = options.limits();
    let load_io = if options.mmap_at_startup {
      IOManagerType::MemoryMap
    } else {
      IOManagerType::StandardFileIO
    };

    let mut sealed = HashMap::new();
    let mut reclaimed = 0u64;
    let file_ids = sorted_file_ids(&dir)?;
    for fid in &file_ids {
      let df = load_data_file(&dir, *fid, load_io, limits, keydir.as_ref(), &mut reclaimed)?;
      sealed.insert(*fid, df);
    }
    if options.mmap_at_startup {
      for df in sealed.values_mut() {
        df.reset_io_manager(&dir, IOManagerType::StandardFileIO)?;
      }
    }

    let floor = file_ids.last().map(|id| id + 1).unwrap_or(0);
    let active_id = mint_file_id(&dir, floor);
    let active = DataFile::new(&dir, active_id)?;

    Ok(Engine {
      options: Arc::new(options),
      files: RwLock::new(FileTable { active, sealed }),
      keydir,
      reclaim_size: AtomicU64::new(reclaimed),
      buffers: BufferPool::new(),
      lock_file,
      closed: AtomicBool::new(false),
    })
  }

  /// Stores `value` under `key`, overwriting any previous value.
  pub fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }

    let record = LogRecord {
      timestamp: now_timestamp(),
      key: key.to_vec(),
      value: value.to_vec(),
    };
    let mut buf = self.buffers.get();
    let enc_len = match record.encode(self.options.limits(), &mut buf) {
      Ok(n) => n,
      Err(e) => {
        self.buffers.put(buf);
        return Err(e);
      }
    };

    let mut table = self.files.write();
    self.rotate_if_needed(&mut table, enc_len as u64)?;
    let end_off = table.active.append(&buf)?;
    if self.options.sync_writes {
      table.active.sync()?;
    }

    let entry = KeydirEntry {
      file_id: table.active.file_id(),
      value_size: value.len() as u32,
      value_pos: end_off - value.len() as u64,
      timestamp: record.timestamp,
    };
    table.active.append_hint(&key, &entry)?;
    if let Some(old) = self.keydir.put(record.key, entry) {
      self
        .reclaim_size
        .fetch_add(dead_record_size(key.len(), old.value_size), Ordering::SeqCst);
    }
    drop(table);

    self.buffers.put(buf);
    Ok(())
  }

  /// Looks up `key`. A missing key yields an empty value, not an error.
  pub fn get(&self, key: Bytes) -> Result<Bytes> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }
    let table = self.files.read();
    match self.keydir.get(&key) {
      Some(entry) => self.read_value(&table, &entry),
      None => Ok(Bytes::new()),
    }
  }

  /// Removes `key` by appending a tombstone. Deleting an absent key is a
  /// successful no-op.
  pub fn delete(&self, key: Bytes) -> Result<()> {
    if key.is_empty() {
      return Err(Errors::KeyIsEmpty);
    }

    let mut table = self.files.write();
    if self.keydir.get(&key).is_none() {
      return Ok(());
    }

    let record = LogRecord {
      timestamp: now_timestamp(),
      key: key.to_vec(),
      value: Vec::new(),
    };
    let mut buf = self.buffers.get();
    let enc_len = match record.encode(self.options.limits(), &mut buf) {
      Ok(n) => n,
      Err(e) => {
        self.buffers.put(buf);
        return Err(e);
      }
    };

    self.rotate_if_needed(&mut table, enc_len as u64)?;
    let end_off = table.active.append(&buf)?;
    if self.options.sync_writes {
      table.active.sync()?;
    }

    let tombstone = KeydirEntry {
      file_id: table.active.file_id(),
      value_size: 0,
      value_pos: end_off,
      timestamp: record.timestamp,
    };
    table.active.append_hint(&key, &tombstone)?;
    if let Some(old) = self.keydir.delete(&key) {
      let dead = dead_record_size(key.len(), old.value_size) + enc_len as u64;
      self.reclaim_size.fetch_add(dead, Ordering::SeqCst);
    }
    drop(table);

    self.buffers.put(buf);
    Ok(())
  }

  pub fn has_key(&self, key: &[u8]) -> bool {
    self.keydir.get(key).is_some()
  }

  /// All live keys, in no promised order.
  pub fn list_keys(&self) -> Vec<Bytes> {
    self.keydir.list_keys()
  }

  /// Number of live keys.
  pub fn len(&self) -> usize {
    self.keydir.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keydir.is_empty()
  }

  /// Flushes the active file to durable storage.
  pub fn sync(&self) -> Result<()> {
    let table = self.files.read();
    table.active.sync()
  }

  pub fn stat(&self) -> Stat {
    let table = self.files.read();
    Stat {
      key_num: self.keydir.len(),
      data_file_num: table.sealed.len() + 1,
      disk_size: util::file::dir_disk_size(&self.options.dir_path),
      reclaimable_size: self.reclaim_size.load(Ordering::SeqCst),
    }
  }

  /// Syncs the active file and releases the writer lock. Idempotent;
  /// file handles close when the engine drops.
  pub fn close(&self) -> Result<()> {
    if self.closed.swap(true, Ordering::SeqCst) {
      return Ok(());
    }
    let table = self.files.read();
    table.active.sync()?;
    if let Err(e) = self.lock_file.unlock() {
      error!("failed to release the writer lock: {}", e);
      return Err(Errors::from(e));
    }
    Ok(())
  }

  /// Seals the active file and opens a fresh one when the pending append
  /// would push it past the rotation threshold.
  fn rotate_if_needed(&self, table: &mut FileTable, pending: u64) -> Result<()> {
    let active = &mut table.active;
    if active.write_off() == 0 || active.write_off() + pending <= self.options.data_file_size {
      return Ok(());
    }

    active.sync()?;
    let new_id = mint_file_id(&self.options.dir_path, active.file_id() + 1);
    let new_active = DataFile::new(&self.options.dir_path, new_id)?;
    let mut old = std::mem::replace(active, new_active);
    old.seal();
    table.sealed.insert(old.file_id(), old);
    Ok(())
  }

  pub(crate) fn read_value(&self, table: &FileTable, entry: &KeydirEntry) -> Result<Bytes> {
    let df = if table.active.file_id() == entry.file_id {
      &table.active
    } else {
      table
        .sealed
        .get(&entry.file_id)
        .ok_or(Errors::DataFileNotFound)?
    };
    let value = df.read_value_at(entry.value_pos, entry.value_size)?;
    Ok(Bytes::from(value))
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      error!("failed to close the engine: {}", e);
    }
  }
}

/// Ids of every `.data` file directly inside `dir`, ascending.
fn sorted_file_ids(dir: &Path) -> Result<Vec<u64>> {
  let entries = match fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) => {
      error!("failed to read database directory: {}", e);
      return Err(Errors::from(e));
    }
  };

  let mut ids = Vec::new();
  for entry in entries.flatten() {
    let file_name = entry.file_name();
    let Some(name) = file_name.to_str() else {
      continue;
    };
    let Some(stem) = name.strip_suffix(DATA_FILE_NAME_SUFFIX) else {
      continue;
    };
    match stem.parse::<u64>() {
      Ok(id) => ids.push(id),
      Err(_) => warn!("ignoring stray file in database directory: {}", name),
    }
  }
  ids.sort_unstable();
  Ok(ids)
}

/// Rebuilds the keydir contribution of one sealed file, preferring its
/// hint sibling and falling back to a full scan when the hint is corrupt
/// or truncated.
fn load_data_file(
  dir: &Path,
  file_id: u64,
  io_type: IOManagerType,
  limits: RecordLimits,
  keydir: &dyn Keydir,
  reclaimed: &mut u64,
) -> Result<DataFile> {
  let df = DataFile::open(dir, file_id, io_type)?;
  if df.write_off() == 0 {
    return Ok(df);
  }

  if HintFile::exists(dir, file_id) {
    let hint = HintFile::open(dir, file_id, io_type)?;
    match replay_entries(hint.iter(limits), keydir, reclaimed) {
      Ok(()) => return Ok(df),
      Err(Errors::Corrupt) => {
        warn!("hint file of data file {} is corrupt, scanning instead", file_id);
      }
      Err(e) => return Err(e),
    }
  }

  replay_entries(df.iter(limits), keydir, reclaimed)?;
  Ok(df)
}

/// Applies a stream of `(key, entry)` items to the keydir in log order:
/// later entries overwrite, tombstones remove.
fn replay_entries(
  iter: impl Iterator<Item = Result<(Vec<u8>, KeydirEntry)>>,
  keydir: &dyn Keydir,
  reclaimed: &mut u64,
) -> Result<()> {
  for item in iter {
    let (key, entry) = item?;
    if entry.value_size == 0 {
      // the tombstone itself is dead weight, as is whatever it buried
      *reclaimed += (HEADER_SIZE + key.len()) as u64;
      if let Some(old) = keydir.delete(&key) {
        *reclaimed += dead_record_size(key.len(), old.value_size);
      }
    } else if let Some(old) = keydir.put(key.clone(), entry) {
      *reclaimed += dead_record_size(key.len(), old.value_size);
    }
  }
  Ok(())
}

/// Mints a data-file id: the wall-clock Unix second, advanced past
/// `floor` and past every file already in the directory so ids stay
/// unique and monotonic even when files are created within one second.
fn mint_file_id(dir: &Path, floor: u64) -> u64 {
  let mut id = now_unix_secs().max(floor);
  while data_file_path(dir, id).is_file() {
    id += 1;
  }
  id
}

fn dead_record_size(key_len: usize, value_size: u32) -> u64 {
  (HEADER_SIZE + key_len) as u64 + value_size as u64
}

fn now_unix_secs() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}

fn now_timestamp() -> u32 {
  now_unix_secs() as u32
}
