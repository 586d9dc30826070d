use bytes::BytesMut;
use parking_lot::Mutex;

const MAX_POOLED: usize = 8;

/// A small pool of encode scratch buffers for the put/delete hot path.
pub(crate) struct BufferPool {
  pool: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
  pub(crate) fn new() -> Self {
    Self {
      pool: Mutex::new(Vec::new()),
    }
  }

  pub(crate) fn get(&self) -> BytesMut {
    let mut pool = self.pool.lock();
    pool.pop().unwrap_or_default()
  }

  pub(crate) fn put(&self, mut buf: BytesMut) {
    buf.clear();
    let mut pool = self.pool.lock();
    if pool.len() < MAX_POOLED {
      pool.push(buf);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pool_reuses_buffers() {
    let pool = BufferPool::new();
    let mut buf = pool.get();
    buf.extend_from_slice(b"scratch");
    pool.put(buf);

    let buf = pool.get();
    assert!(buf.is_empty());
    assert!(buf.capacity() >= 7);
  }
}
