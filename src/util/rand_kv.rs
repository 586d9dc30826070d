use bytes::Bytes;

pub fn get_test_key(i: usize) -> Bytes {
  Bytes::from(format!("logcask-key-{:09}", i))
}

pub fn get_test_value(i: usize) -> Bytes {
  Bytes::from(format!(
    "logcask-value-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa-{:09}",
    i
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_generators_are_deterministic() {
    assert_eq!(get_test_key(7), get_test_key(7));
    assert_ne!(get_test_key(7), get_test_key(8));
    assert!(get_test_value(1).len() > 32);
  }
}
