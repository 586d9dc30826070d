use std::sync::Arc;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::data::log_record::KeydirEntry;

use super::Keydir;

/// Lock-free skiplist keydir for read-heavy workloads.
pub struct SkipList {
  skl: Arc<SkipMap<Vec<u8>, KeydirEntry>>,
}

impl SkipList {
  pub fn new() -> Self {
    Self {
      skl: Arc::new(SkipMap::new()),
    }
  }
}

impl Default for SkipList {
  fn default() -> Self {
    Self::new()
  }
}

impl Keydir for SkipList {
  fn put(&self, key: Vec<u8>, entry: KeydirEntry) -> Option<KeydirEntry> {
    let old = self.skl.get(&key).map(|e| *e.value());
    self.skl.insert(key, entry);
    old
  }

  fn get(&self, key: &[u8]) -> Option<KeydirEntry> {
    self.skl.get(key).map(|e| *e.value())
  }

  fn delete(&self, key: &[u8]) -> Option<KeydirEntry> {
    self.skl.remove(key).map(|e| *e.value())
  }

  fn list_keys(&self) -> Vec<Bytes> {
    self
      .skl
      .iter()
      .map(|e| Bytes::from(e.key().clone()))
      .collect()
  }

  fn entries(&self) -> Vec<(Vec<u8>, KeydirEntry)> {
    self
      .skl
      .iter()
      .map(|e| (e.key().clone(), *e.value()))
      .collect()
  }

  fn len(&self) -> usize {
    self.skl.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(file_id: u64, pos: u64) -> KeydirEntry {
    KeydirEntry {
      file_id,
      value_size: 4,
      value_pos: pos,
      timestamp: 100,
    }
  }

  #[test]
  fn test_skiplist_put_get_delete() {
    let skl = SkipList::new();
    assert!(skl.put(b"a".to_vec(), entry(1, 10)).is_none());
    assert_eq!(skl.put(b"a".to_vec(), entry(2, 20)), Some(entry(1, 10)));
    assert_eq!(skl.get(b"a"), Some(entry(2, 20)));

    assert_eq!(skl.delete(b"a"), Some(entry(2, 20)));
    assert!(skl.get(b"a").is_none());
  }

  #[test]
  fn test_skiplist_snapshot() {
    let skl = SkipList::new();
    skl.put(b"x".to_vec(), entry(1, 1));
    skl.put(b"y".to_vec(), entry(1, 2));

    assert_eq!(skl.len(), 2);
    assert!(!skl.is_empty());
    let mut keys = skl.list_keys();
    keys.sort();
    assert_eq!(keys, vec![Bytes::from("x"), Bytes::from("y")]);
  }
}
