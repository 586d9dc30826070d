pub mod btree;
pub mod skiplist;

use bytes::Bytes;

use crate::{data::log_record::KeydirEntry, option::IndexType};

/// In-memory mapping from key bytes to the location of the key's latest
/// value. Implementations are internally synchronized; the engine's file
/// table lock orders keydir mutations against file swaps.
pub trait Keydir: Sync + Send {
  /// Inserts or replaces, returning the displaced entry if any.
  fn put(&self, key: Vec<u8>, entry: KeydirEntry) -> Option<KeydirEntry>;

  fn get(&self, key: &[u8]) -> Option<KeydirEntry>;

  /// Removes a key, returning the displaced entry if any.
  fn delete(&self, key: &[u8]) -> Option<KeydirEntry>;

  /// Snapshot of all live keys. No ordering is promised.
  fn list_keys(&self) -> Vec<Bytes>;

  /// Snapshot of all live entries, taken for the merge copy phase.
  fn entries(&self) -> Vec<(Vec<u8>, KeydirEntry)>;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

pub fn new_keydir(index_type: IndexType) -> Box<dyn Keydir> {
  match index_type {
    IndexType::BTree => Box::new(btree::BTree::new()),
    IndexType::SkipList => Box::new(skiplist::SkipList::new()),
  }
}
