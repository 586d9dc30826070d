use criterion::{criterion_group, criterion_main, Criterion};
use logcask::{
  db::Engine,
  option::Options,
  util::rand_kv::{get_test_key, get_test_value},
};
use rand::Rng;

fn bench_put(c: &mut Criterion) {
  let dir = tempfile::tempdir().unwrap();
  let mut option = Options::default();
  option.dir_path = dir.path().to_path_buf();
  let engine = Engine::open(option).unwrap();

  let mut rnd = rand::thread_rng();

  c.bench_function("logcask-put-bench", |b| {
    b.iter(|| {
      let i = rnd.gen_range(0..u32::MAX) as usize;
      let res = engine.put(get_test_key(i), get_test_value(i));
      assert!(res.is_ok());
    })
  });
}

fn bench_get(c: &mut Criterion) {
  let dir = tempfile::tempdir().unwrap();
  let mut option = Options::default();
  option.dir_path = dir.path().to_path_buf();
  let engine = Engine::open(option).unwrap();

  for i in 0..100000 {
    let res = engine.put(get_test_key(i), get_test_value(i));
    assert!(res.is_ok());
  }

  let mut rnd = rand::thread_rng();

  c.bench_function("logcask-get-bench", |b| {
    b.iter(|| {
      let i = rnd.gen_range(0..u32::MAX) as usize;
      let res = engine.get(get_test_key(i)).unwrap();

      if (0..100000).contains(&i) {
        assert!(!res.is_empty());
      } else {
        // a missing key reads back as an empty value
        assert!(res.is_empty());
      }
    })
  });
}

fn bench_delete(c: &mut Criterion) {
  let dir = tempfile::tempdir().unwrap();
  let mut option = Options::default();
  option.dir_path = dir.path().to_path_buf();
  let engine = Engine::open(option).unwrap();

  for i in 0..100000 {
    let res = engine.put(get_test_key(i), get_test_value(i));
    assert!(res.is_ok());
  }

  let mut rnd = rand::thread_rng();

  c.bench_function("logcask-delete-bench", |b| {
    b.iter(|| {
      let i = rnd.gen_range(0..u32::MAX) as usize;
      engine.delete(get_test_key(i)).unwrap();
    })
  });
}

fn bench_listkeys(c: &mut Criterion) {
  let dir = tempfile::tempdir().unwrap();
  let mut option = Options::default();
  option.dir_path = dir.path().to_path_buf();
  let engine = Engine::open(option).unwrap();

  for i in 0..100000 {
    let res = engine.put(get_test_key(i), get_test_value(i));
    assert!(res.is_ok());
  }

  c.bench_function("logcask-listkeys-bench", |b| {
    b.iter(|| {
      let keys = engine.list_keys();
      assert!(!keys.is_empty());
    })
  });
}

fn bench_stat(c: &mut Criterion) {
  let dir = tempfile::tempdir().unwrap();
  let mut option = Options::default();
  option.dir_path = dir.path().to_path_buf();
  let engine = Engine::open(option).unwrap();

  for i in 0..100000 {
    let res = engine.put(get_test_key(i), get_test_value(i));
    assert!(res.is_ok());
  }

  c.bench_function("logcask-stat-bench", |b| {
    b.iter(|| {
      let stat = engine.stat();
      assert!(stat.key_num > 0);
    })
  });
}

criterion_group!(
  benches,
  bench_get,
  bench_put,
  bench_delete,
  bench_listkeys,
  bench_stat
);
criterion_main!(benches);
