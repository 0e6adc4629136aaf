//! Nullable store: thread-safe in-memory key-value storage for testing.

use plaudit_store::{KvStore, StoreError};
use plaudit_types::{Clock, Timestamp};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Timestamp>,
}

impl Entry {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// An in-memory [`KvStore`] with the same expiry and atomicity semantics as
/// the LMDB backend.
///
/// Also records how many operations it served and can be told to fail or
/// stall, so callers can assert on "never touched storage" and timeout paths.
/// One-shot faults and hooks let a test land a failure or a concurrent write
/// at an exact point inside a multi-step operation.
pub struct NullKvStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    operations: AtomicU64,
    unavailable: AtomicBool,
    delay: Mutex<Option<Duration>>,
    cas_faults: Mutex<Vec<String>>,
    list_hooks: Mutex<Vec<(String, ListHook)>>,
}

type ListHook = Box<dyn FnOnce() + Send>;

impl NullKvStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            clock,
            operations: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
            delay: Mutex::new(None),
            cas_faults: Mutex::new(Vec::new()),
            list_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Number of store operations served so far (including failed ones).
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail with a backend error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Block every subsequent operation for `delay` before serving it.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Fail the next compare-and-swap on a key starting with `prefix`.
    pub fn fail_next_cas(&self, prefix: &str) {
        self.cas_faults.lock().unwrap().push(prefix.to_string());
    }

    /// Run `hook` once, right after the next `list_prefix(prefix)` has read
    /// its entries and before it returns them. The hook may use the store.
    pub fn after_next_list(&self, prefix: &str, hook: impl FnOnce() + Send + 'static) {
        self.list_hooks
            .lock()
            .unwrap()
            .push((prefix.to_string(), Box::new(hook)));
    }

    /// Raw view including expired entries, for assertions.
    pub fn raw_keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    fn enter(&self) -> Result<Timestamp, StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store is unavailable".into()));
        }
        Ok(self.clock.now())
    }

    fn expiry(now: Timestamp, ttl_secs: Option<u64>) -> Option<Timestamp> {
        ttl_secs.map(|ttl| now.plus_secs(ttl))
    }
}

impl KvStore for NullKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.enter()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    fn put(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let now = self.enter()?;
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Self::expiry(now, ttl_secs),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.enter()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
        ttl_secs: Option<u64>,
    ) -> Result<bool, StoreError> {
        let now = self.enter()?;
        {
            let mut faults = self.cas_faults.lock().unwrap();
            if let Some(i) = faults.iter().position(|p| key.starts_with(p.as_str())) {
                faults.remove(i);
                return Err(StoreError::Backend(format!("injected fault on {key}")));
            }
        }
        let mut entries = self.entries.lock().unwrap();
        let current = entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.as_slice());
        if current != expected {
            return Ok(false);
        }
        match new {
            Some(value) => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_vec(),
                        expires_at: Self::expiry(now, ttl_secs),
                    },
                );
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(true)
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let now = self.enter()?;
        let listed: Vec<(String, Vec<u8>)> = self
            .entries
            .lock()
            .unwrap()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect();

        let hook = {
            let mut hooks = self.list_hooks.lock().unwrap();
            hooks
                .iter()
                .position(|(p, _)| p == prefix)
                .map(|i| hooks.remove(i).1)
        };
        if let Some(hook) = hook {
            hook();
        }
        Ok(listed)
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.enter()?;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok(before - entries.len())
    }

    fn backend_name(&self) -> &'static str {
        "null"
    }
}
