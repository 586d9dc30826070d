//! Logcask: an embeddable persistent key/value store following the
//! Bitcask design.
//!
//! Writes append records to an active log file that rotates at a size
//! threshold; an in-memory keydir maps every live key to the exact byte
//! location of its latest value, so reads cost one positional read.
//! Deletes append tombstones, reopening rebuilds the keydir from compact
//! hint files (or by scanning), and a merge routine rewrites the sealed
//! files down to live data only.
//!
//! # Basic Usage
//!
//! ```
//! use bytes::Bytes;
//! use logcask::{db::Engine, option::Options};
//!
//! let mut opts = Options::default();
//! opts.dir_path = std::env::temp_dir().join("logcask-doc");
//!
//! let engine = Engine::open(opts).expect("failed to open logcask engine");
//!
//! let key = Bytes::from(b"hello".to_vec());
//! let value = Bytes::from(b"world".to_vec());
//! engine.put(key.clone(), value.clone()).expect("failed to put");
//!
//! // a present key reads back its value, a missing key reads back empty
//! let retrieved = engine.get(key.clone()).expect("failed to get");
//! assert_eq!(retrieved, value);
//!
//! engine.delete(key.clone()).expect("failed to delete");
//! assert_eq!(engine.get(key).expect("failed to get"), Bytes::new());
//! ```

mod data;

mod fio;
mod index;

pub mod db;
pub mod errors;
pub mod merge;
pub mod option;
pub mod util;

pub use db::{Engine, Stat};
pub use errors::{Errors, Result};
pub use option::Options;
