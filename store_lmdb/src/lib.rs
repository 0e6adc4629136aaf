//! LMDB storage backend for Plaudit.
//!
//! Implements [`plaudit_store::KvStore`] on top of the `heed` LMDB bindings.
//! The whole key space lives in one named database inside a single
//! environment; expiry is carried in a small envelope in front of each value.

pub mod entry;
pub mod environment;
pub mod error;
pub mod kv;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use kv::LmdbKvStore;
