use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::data::log_record::KeydirEntry;

use super::Keydir;

/// BTreeMap-backed keydir.
pub struct BTree {
  tree: Arc<RwLock<BTreeMap<Vec<u8>, KeydirEntry>>>,
}

impl BTree {
  pub fn new() -> Self {
    Self {
      tree: Arc::new(RwLock::new(BTreeMap::new())),
    }
  }
}

impl Default for BTree {
  fn default() -> Self {
    Self::new()
  }
}

impl Keydir for BTree {
  fn put(&self, key: Vec<u8>, entry: KeydirEntry) -> Option<KeydirEntry> {
    let mut tree = self.tree.write();
    tree.insert(key, entry)
  }

  fn get(&self, key: &[u8]) -> Option<KeydirEntry> {
    let tree = self.tree.read();
    tree.get(key).copied()
  }

  fn delete(&self, key: &[u8]) -> Option<KeydirEntry> {
    let mut tree = self.tree.write();
    tree.remove(key)
  }

  fn list_keys(&self) -> Vec<Bytes> {
    let tree = self.tree.read();
    tree.keys().map(|k| Bytes::from(k.clone())).collect()
  }

  fn entries(&self) -> Vec<(Vec<u8>, KeydirEntry)> {
    let tree = self.tree.read();
    tree.iter().map(|(k, e)| (k.clone(), *e)).collect()
  }

  fn len(&self) -> usize {
    let tree = self.tree.read();
    tree.len()
  }
}
