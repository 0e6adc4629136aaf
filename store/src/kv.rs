//! The key-value store contract every backend implements.

use crate::StoreError;

/// A flat key-value namespace with optional per-entry expiry.
///
/// Keys are UTF-8 strings laid out by [`crate::keys`]. Values are opaque
/// bytes. An entry whose TTL has run out behaves exactly like a missing one
/// for every operation, whether or not the backend has physically removed it
/// yet.
///
/// Implementations must make [`KvStore::compare_and_swap`] and
/// [`KvStore::delete`] atomic with respect to each other. Backends that
/// cannot (an eventually consistent remote KV, say) break the exactly-once
/// counting guarantee and need periodic counter reconciliation.
pub trait KvStore: Send + Sync {
    /// Read a live entry.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write unconditionally. `ttl_secs = None` means the entry never expires.
    fn put(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> Result<(), StoreError>;

    /// Remove an entry. Returns `true` if a live entry was removed.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically replace the entry at `key` if its current value equals
    /// `expected` (`None` meaning "absent"). `new = None` deletes the entry.
    ///
    /// Returns `true` if the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
        ttl_secs: Option<u64>,
    ) -> Result<bool, StoreError>;

    /// All live entries whose key starts with `prefix`, in key order.
    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Create the entry only if no live entry exists.
    fn put_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl_secs: Option<u64>,
    ) -> Result<bool, StoreError> {
        self.compare_and_swap(key, None, Some(value), ttl_secs)
    }

    /// Physically drop expired entries. Returns how many were removed.
    fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
