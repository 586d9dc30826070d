use std::{
  collections::{HashMap, HashSet},
  fs::{self, OpenOptions},
  path::{Path, PathBuf},
  sync::atomic::Ordering,
};

use bytes::Bytes;
use fs2::FileExt;
use log::error;

use crate::{
  data::{
    data_file::{data_file_path, hint_file_path, DataFile},
    log_record::KeydirEntry,
  },
  db::{Engine, MERGE_LOCK_FILE_NAME},
  errors::{Errors, Result},
  option::IOManagerType,
};

const MERGE_DIR_NAME: &str = "merge";

impl Engine {
  /// Compacts the sealed files: rewrites their live records into a fresh
  /// set of data and hint files and swaps them in, reclaiming the space
  /// held by overwritten values and tombstones.
  ///
  /// The write lock is held only to snapshot the sealed set and to swap;
  /// puts and deletes proceed during the bulk copy and stay untouched by
  /// the swap, since their entries point at the active file.
  pub fn merge(&self) -> Result<()> {
    let lock_path = self.options.dir_path.join(MERGE_LOCK_FILE_NAME);
    let lock_file = OpenOptions::new()
      .create(true)
      .read(true)
      .write(true)
      .open(&lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
      return Err(Errors::MergeInProgress);
    }

    let result = self.merge_inner();
    if let Err(e) = lock_file.unlock() {
      error!("failed to release the merge lock: {}", e);
    }
    result
  }

  fn merge_inner(&self) -> Result<()> {
    // snapshot the sealed set and the keydir
    let (merged_ids, snapshot) = {
      let table = self.files.write();
      if table.sealed.is_empty() {
        return Ok(());
      }
      let mut ids: Vec<u64> = table.sealed.keys().copied().collect();
      ids.sort_unstable();
      (ids, self.keydir.entries())
    };
    let merged: HashSet<u64> = merged_ids.iter().copied().collect();

    let merge_path = get_merge_path(&self.options.dir_path);
    if merge_path.is_dir() {
      fs::remove_dir_all(&merge_path)?;
    }
    if let Err(e) = fs::create_dir_all(&merge_path) {
      error!("failed to create the merge directory: {}", e);
      return Err(Errors::from(e));
    }

    let mut scratch_opts = self.options.as_ref().clone();
    scratch_opts.dir_path = merge_path.clone();
    scratch_opts.sync_writes = false;
    scratch_opts.mmap_at_startup = false;
    let scratch = Engine::open(scratch_opts)?;

    // copy phase: rewrite every live entry that lives in a merged file,
    // taking the read lock per value so writers keep making progress
    for (key, entry) in &snapshot {
      if !merged.contains(&entry.file_id) {
        continue;
      }
      let value = {
        let table = self.files.read();
        self.read_value(&table, entry)?
      };
      scratch.put(Bytes::from(key.clone()), value)?;
    }
    scratch.sync()?;

    let scratch_ids = scratch_file_ids(&scratch);
    let compacted = scratch.keydir.entries();
    scratch.close()?;
    drop(scratch);

    // swap phase
    let mut table = self.files.write();
    for fid in &merged_ids {
      table.sealed.remove(fid);
    }

    // compacted files take over the smallest freed ids so they sort
    // before the active file on replay; compaction packs records up to
    // the same rotation threshold, so it never produces more files than
    // it consumed
    let mut id_map: HashMap<u64, u64> = HashMap::new();
    for (i, sid) in scratch_ids.iter().enumerate() {
      let new_id = merged_ids[i];
      let dst_hint = hint_file_path(&self.options.dir_path, new_id);
      if dst_hint.is_file() {
        fs::remove_file(&dst_hint)?;
      }
      fs::rename(
        data_file_path(&merge_path, *sid),
        data_file_path(&self.options.dir_path, new_id),
      )?;
      let src_hint = hint_file_path(&merge_path, *sid);
      if src_hint.is_file() {
        fs::rename(src_hint, dst_hint)?;
      }
      let df = DataFile::open(&self.options.dir_path, new_id, IOManagerType::StandardFileIO)?;
      table.sealed.insert(new_id, df);
      id_map.insert(*sid, new_id);
    }

    // unlink the superseded files whose ids were not reused
    for fid in merged_ids.iter().skip(scratch_ids.len()) {
      let data = data_file_path(&self.options.dir_path, *fid);
      if data.is_file() {
        fs::remove_file(data)?;
      }
      let hint = hint_file_path(&self.options.dir_path, *fid);
      if hint.is_file() {
        fs::remove_file(hint)?;
      }
    }

    // rewire the keydir entries still pointing into the merged set; keys
    // overwritten or deleted during the copy keep their newer state
    for (key, sentry) in &compacted {
      let Some(new_id) = id_map.get(&sentry.file_id) else {
        continue;
      };
      match self.keydir.get(key) {
        Some(cur) if merged.contains(&cur.file_id) => {
          self.keydir.put(
            key.clone(),
            KeydirEntry {
              file_id: *new_id,
              ..*sentry
            },
          );
        }
        _ => {}
      }
    }

    self.reclaim_size.store(0, Ordering::SeqCst);
    drop(table);

    if let Err(e) = fs::remove_dir_all(&merge_path) {
      error!("failed to remove the merge directory: {}", e);
    }
    Ok(())
  }
}

/// Data-bearing file ids of the scratch engine, ascending: its sealed
/// files plus its active file when anything was written to it.
fn scratch_file_ids(scratch: &Engine) -> Vec<u64> {
  let table = scratch.files.read();
  let mut ids: Vec<u64> = table.sealed.keys().copied().collect();
  if table.active.write_off() > 0 {
    ids.push(table.active.file_id());
  }
  ids.sort_unstable();
  ids
}

/// Scratch directory for a merge: a sibling of the data directory, wiped
/// at the start of every merge so a crashed run cannot leak into this one.
fn get_merge_path<P>(dir_path: P) -> PathBuf
where
  P: AsRef<Path>,
{
  let dir = dir_path.as_ref();
  let name = dir
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| String::from("logcask"));
  let merge_name = format!("{}-{}", name, MERGE_DIR_NAME);
  match dir.parent() {
    Some(parent) => parent.join(merge_name),
    None => PathBuf::from(merge_name),
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, thread};

  use super::*;
  use crate::option::Options;
  use crate::util::{
    file::dir_suffix_size,
    rand_kv::{get_test_key, get_test_value},
  };

  fn test_options(dir: &Path) -> Options {
    let mut opt = Options::default();
    opt.dir_path = dir.to_path_buf();
    opt.data_file_size = 64 * 1024;
    opt
  }

  #[test]
  fn test_merge_empty_engine() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(test_options(dir.path())).expect("failed to open engine");

    let res = engine.merge();
    assert!(res.is_ok());
  }

  #[test]
  fn test_merge_reclaims_space() {
    let dir = tempfile::tempdir().unwrap();
    let opt = test_options(dir.path());
    let engine = Engine::open(opt.clone()).expect("failed to open engine");

    for i in 0..5000 {
      engine.put(get_test_key(i), get_test_value(i)).unwrap();
    }
    for i in 0..2500 {
      engine.delete(get_test_key(i)).unwrap();
    }
    engine.sync().unwrap();
    let before = dir_suffix_size(dir.path(), ".data");

    engine.merge().expect("merge failed");

    let after = dir_suffix_size(dir.path(), ".data");
    assert!(after < before, "merge did not shrink {} -> {}", before, after);

    assert_eq!(engine.len(), 2500);
    for i in 0..2500 {
      assert_eq!(engine.get(get_test_key(i)).unwrap(), Bytes::new());
    }
    for i in 2500..5000 {
      assert_eq!(engine.get(get_test_key(i)).unwrap(), get_test_value(i));
    }
  }

  #[test]
  fn test_merge_then_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let opt = test_options(dir.path());
    let engine = Engine::open(opt.clone()).expect("failed to open engine");

    for i in 0..3000 {
      engine.put(get_test_key(i), get_test_value(i)).unwrap();
    }
    for i in 0..1000 {
      engine.put(get_test_key(i), Bytes::from("rewritten")).unwrap();
    }
    for i in 2000..3000 {
      engine.delete(get_test_key(i)).unwrap();
    }
    engine.merge().expect("merge failed");
    engine.close().unwrap();
    drop(engine);

    let engine2 = Engine::open(opt).expect("failed to reopen engine");
    assert_eq!(engine2.len(), 2000);
    for i in 0..1000 {
      assert_eq!(engine2.get(get_test_key(i)).unwrap(), Bytes::from("rewritten"));
    }
    for i in 1000..2000 {
      assert_eq!(engine2.get(get_test_key(i)).unwrap(), get_test_value(i));
    }
    for i in 2000..3000 {
      assert_eq!(engine2.get(get_test_key(i)).unwrap(), Bytes::new());
    }
  }

  #[test]
  fn test_put_during_merge_stays_visible() {
    let dir = tempfile::tempdir().unwrap();
    let opt = test_options(dir.path());
    let engine = Engine::open(opt.clone()).expect("failed to open engine");

    for i in 0..5000 {
      engine.put(get_test_key(i), get_test_value(i)).unwrap();
    }

    let eng = Arc::new(engine);
    let mut handles = vec![];

    let writer = eng.clone();
    handles.push(thread::spawn(move || {
      for i in 10000..12000 {
        writer.put(get_test_key(i), get_test_value(i)).unwrap();
        if i % 500 == 0 {
          // visible while the merge may still be copying
          assert_eq!(writer.get(get_test_key(i)).unwrap(), get_test_value(i));
        }
      }
    }));

    let merger = eng.clone();
    handles.push(thread::spawn(move || {
      merger.merge().expect("merge failed");
    }));

    for handle in handles {
      handle.join().unwrap();
    }

    for i in 10000..12000 {
      assert_eq!(eng.get(get_test_key(i)).unwrap(), get_test_value(i));
    }
    eng.close().unwrap();
    drop(eng);

    let engine2 = Engine::open(opt).expect("failed to reopen engine");
    assert_eq!(engine2.len(), 7000);
  }

  #[test]
  fn test_second_merge_is_rejected_while_running() {
    // the sentinel is a file lock, so a second handle in the same
    // process contends the same way another process would
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(test_options(dir.path())).expect("failed to open engine");

    let lock_path = dir.path().join(MERGE_LOCK_FILE_NAME);
    let holder = OpenOptions::new()
      .create(true)
      .read(true)
      .write(true)
      .open(&lock_path)
      .unwrap();
    holder.try_lock_exclusive().unwrap();

    for i in 0..10 {
      engine.put(get_test_key(i), get_test_value(i)).unwrap();
    }
    assert_eq!(engine.merge().unwrap_err(), Errors::MergeInProgress);

    holder.unlock().unwrap();
    assert!(engine.merge().is_ok());
  }
}
