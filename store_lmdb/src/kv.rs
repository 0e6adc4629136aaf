//! LMDB implementation of KvStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};
use tracing::debug;

use plaudit_store::{KvStore, StoreError};
use plaudit_types::Clock;

use crate::entry;
use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// Every write runs in its own LMDB write transaction. LMDB allows a single
/// writer at a time, which is what makes `compare_and_swap` and `delete`
/// atomic here.
pub struct LmdbKvStore {
    env: Arc<Env>,
    kv_db: Database<Bytes, Bytes>,
    clock: Arc<dyn Clock>,
}

impl LmdbKvStore {
    pub fn new(environment: &LmdbEnvironment, clock: Arc<dyn Clock>) -> Self {
        Self {
            env: environment.env().clone(),
            kv_db: environment.kv_db(),
            clock,
        }
    }

    fn expiry(&self, ttl_secs: Option<u64>) -> Option<plaudit_types::Timestamp> {
        ttl_secs.map(|ttl| self.clock.now().plus_secs(ttl))
    }
}

impl KvStore for LmdbKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .kv_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        match raw {
            Some(raw) => {
                let payload = entry::live(key.as_bytes(), raw, self.clock.now())?;
                Ok(payload.map(<[u8]>::to_vec))
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let bytes = entry::encode(value, self.expiry(ttl_secs));
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.kv_db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let was_live = match self
            .kv_db
            .get(&wtxn, key.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(raw) => entry::live(key.as_bytes(), raw, now)?.is_some(),
            None => return Ok(false),
        };
        self.kv_db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(was_live)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
        ttl_secs: Option<u64>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        let matches = {
            let current = match self
                .kv_db
                .get(&wtxn, key.as_bytes())
                .map_err(LmdbError::from)?
            {
                Some(raw) => entry::live(key.as_bytes(), raw, now)?,
                None => None,
            };
            current == expected
        };
        if !matches {
            // Dropping the transaction aborts it.
            return Ok(false);
        }

        match new {
            Some(value) => {
                let bytes = entry::encode(value, self.expiry(ttl_secs));
                self.kv_db
                    .put(&mut wtxn, key.as_bytes(), &bytes)
                    .map_err(LmdbError::from)?;
            }
            None => {
                self.kv_db
                    .delete(&mut wtxn, key.as_bytes())
                    .map_err(LmdbError::from)?;
            }
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let now = self.clock.now();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .kv_db
            .prefix_iter(&rtxn, prefix.as_bytes())
            .map_err(LmdbError::from)?;

        let mut entries = Vec::new();
        for item in iter {
            let (key, raw) = item.map_err(LmdbError::from)?;
            let Some(payload) = entry::live(key, raw, now)? else {
                continue;
            };
            let key = std::str::from_utf8(key)
                .map_err(|_| LmdbError::Corrupt(String::from_utf8_lossy(key).into_owned()))?;
            entries.push((key.to_string(), payload.to_vec()));
        }
        Ok(entries)
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.kv_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut to_delete = Vec::new();
        for item in iter {
            let (key, raw) = item.map_err(LmdbError::from)?;
            if entry::live(key, raw, now)?.is_none() {
                to_delete.push(key.to_vec());
            }
        }
        drop(rtxn);

        let count = to_delete.len();
        if !to_delete.is_empty() {
            let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
            for key in &to_delete {
                self.kv_db
                    .delete(&mut wtxn, key)
                    .map_err(LmdbError::from)?;
            }
            wtxn.commit().map_err(LmdbError::from)?;
            debug!(count, "purged expired entries");
        }
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "lmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaudit_nullables::NullClock;

    fn open(dir: &tempfile::TempDir, clock: Arc<NullClock>) -> LmdbKvStore {
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).expect("open env");
        LmdbKvStore::new(&env, clock)
    }

    fn setup() -> (tempfile::TempDir, Arc<NullClock>, LmdbKvStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let clock = Arc::new(NullClock::new(1_000));
        let store = open(&dir, clock.clone());
        (dir, clock, store)
    }

    #[test]
    fn put_get_delete() {
        let (_dir, _clock, store) = setup();
        store.put("a", b"1", None).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"1".to_vec()));
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn entries_expire_with_the_clock() {
        let (_dir, clock, store) = setup();
        store.put("session:x", b"s", Some(900)).unwrap();
        clock.advance(899);
        assert!(store.get("session:x").unwrap().is_some());
        clock.advance(1);
        assert_eq!(store.get("session:x").unwrap(), None);
        assert!(!store.delete("session:x").unwrap(), "expired entries are not live");
    }

    #[test]
    fn compare_and_swap_checks_current_value() {
        let (_dir, _clock, store) = setup();
        assert!(store.put_if_absent("k", b"1", None).unwrap());
        assert!(!store.put_if_absent("k", b"2", None).unwrap());
        assert!(!store.compare_and_swap("k", Some(b"0"), Some(b"2"), None).unwrap());
        assert!(store.compare_and_swap("k", Some(b"1"), Some(b"2"), None).unwrap());
        assert_eq!(store.get("k").unwrap(), Some(b"2".to_vec()));
        assert!(store.compare_and_swap("k", Some(b"2"), None, None).unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn expired_entry_counts_as_absent_for_cas() {
        let (_dir, clock, store) = setup();
        store.put("k", b"old", Some(10)).unwrap();
        clock.advance(10);
        assert!(store.put_if_absent("k", b"new", None).unwrap());
        assert_eq!(store.get("k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn list_prefix_skips_other_namespaces_and_expired() {
        let (_dir, clock, store) = setup();
        store.put("endorsement:p:1", b"a", None).unwrap();
        store.put("endorsement:p:2", b"b", Some(5)).unwrap();
        store.put("endorsement:q:1", b"c", None).unwrap();
        store.put("count:p:total", b"2", None).unwrap();
        clock.advance(5);

        let keys: Vec<String> = store
            .list_prefix("endorsement:")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["endorsement:p:1", "endorsement:q:1"]);
    }

    #[test]
    fn purge_removes_only_expired() {
        let (_dir, clock, store) = setup();
        store.put("a", b"1", Some(1)).unwrap();
        store.put("b", b"2", Some(100)).unwrap();
        store.put("c", b"3", None).unwrap();
        clock.advance(2);
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.purge_expired().unwrap(), 0);
        assert!(store.get("b").unwrap().is_some());
        assert!(store.get("c").unwrap().is_some());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let clock = Arc::new(NullClock::new(0));
        {
            let store = open(&dir, clock.clone());
            store.put("count:p:total", b"3", None).unwrap();
        }
        let store = open(&dir, clock);
        assert_eq!(store.get("count:p:total").unwrap(), Some(b"3".to_vec()));
    }
}
