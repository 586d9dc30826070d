use std::{fs, path::Path};

/// Total size in bytes of the regular files directly inside `dir`.
pub fn dir_disk_size<P: AsRef<Path>>(dir: P) -> u64 {
  let Ok(entries) = fs::read_dir(dir) else {
    return 0;
  };
  entries
    .flatten()
    .filter_map(|e| e.metadata().ok())
    .filter(|m| m.is_file())
    .map(|m| m.len())
    .sum()
}

/// Total size in bytes of the files with `suffix` directly inside `dir`.
pub fn dir_suffix_size<P: AsRef<Path>>(dir: P, suffix: &str) -> u64 {
  let Ok(entries) = fs::read_dir(dir) else {
    return 0;
  };
  entries
    .flatten()
    .filter(|e| {
      e.file_name()
        .to_str()
        .map(|n| n.ends_with(suffix))
        .unwrap_or(false)
    })
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_dir_sizes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("1.data"), b"0123456789").unwrap();
    fs::write(dir.path().join("1.data.hint"), b"01234").unwrap();
    fs::write(dir.path().join("other"), b"x").unwrap();

    assert_eq!(dir_disk_size(dir.path()), 16);
    assert_eq!(dir_suffix_size(dir.path(), ".data"), 10);
    assert_eq!(dir_suffix_size(dir.path(), ".data.hint"), 5);
  }
}
