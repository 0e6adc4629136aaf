//! Abstract storage contract for Plaudit.
//!
//! Every storage backend (LMDB, in-memory for testing) implements
//! [`KvStore`]. The rest of the codebase depends only on the trait and on the
//! key layout in [`keys`].

pub mod error;
pub mod keys;
pub mod kv;

pub use error::StoreError;
pub use kv::KvStore;
