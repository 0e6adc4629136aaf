//! Statistics cache: a time-bounded global snapshot plus per-proposal totals.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use plaudit_store::{keys, KvStore};
use plaudit_types::{Clock, Endorsement, GlobalStats, OrganizationCount, ProposalId, ProposalStats, Timestamp};

use crate::codec::{decode, encode};
use crate::counter::{self, CounterLedger};
use crate::endorsement::EndorsementStore;
use crate::LedgerError;

/// A global snapshot and whether it was served from the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsLookup {
    pub stats: GlobalStats,
    pub cached: bool,
}

/// What is stored at `cache:stats`.
#[derive(Serialize, Deserialize)]
struct CachedStats {
    generation: u64,
    stats: GlobalStats,
}

#[derive(Clone)]
pub struct StatsCache {
    kv: Arc<dyn KvStore>,
    endorsements: EndorsementStore,
    counters: CounterLedger,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
    top_n: usize,
}

impl StatsCache {
    pub fn new(
        kv: Arc<dyn KvStore>,
        endorsements: EndorsementStore,
        counters: CounterLedger,
        clock: Arc<dyn Clock>,
        ttl_secs: u64,
        top_n: usize,
    ) -> Self {
        Self {
            kv,
            endorsements,
            counters,
            clock,
            ttl_secs,
            top_n,
        }
    }

    /// Read-through: serve `cache:stats` when it is live and was built under
    /// the current generation, otherwise rebuild it from a full endorsement
    /// scan and store it for `ttl_secs`.
    ///
    /// The generation is read before the scan. A write that invalidates
    /// while the scan is running bumps it, so the snapshot stored here is
    /// already stale for the next reader instead of masking that write.
    pub fn global_stats(&self) -> Result<StatsLookup, LedgerError> {
        let generation = self.generation()?;
        if let Some(bytes) = self.kv.get(keys::STATS_CACHE_KEY)? {
            match decode::<CachedStats>(keys::STATS_CACHE_KEY, &bytes) {
                Ok(cached) if cached.generation == generation => {
                    return Ok(StatsLookup {
                        stats: cached.stats,
                        cached: true,
                    })
                }
                Ok(cached) => debug!(
                    cached = cached.generation,
                    current = generation,
                    "stats cache from an older generation"
                ),
                Err(e) => warn!(error = %e, "discarding corrupt stats cache"),
            }
        }

        let records = self.endorsements.list_all()?;
        let stats = summarize(&records, self.top_n, self.clock.now());
        let entry = CachedStats { generation, stats };
        self.kv
            .put(keys::STATS_CACHE_KEY, &encode(&entry)?, Some(self.ttl_secs))?;
        debug!(
            generation,
            total = entry.stats.total_endorsements,
            organizations = entry.stats.unique_organizations,
            "stats cache rebuilt"
        );
        Ok(StatsLookup {
            stats: entry.stats,
            cached: false,
        })
    }

    pub fn proposal_stats(&self, proposal: &ProposalId) -> Result<ProposalStats, LedgerError> {
        Ok(ProposalStats::new(proposal, self.counters.read(proposal)?))
    }

    /// Drop the cached snapshot and move to a new generation, so a rebuild
    /// already in flight cannot store a snapshot that predates this call.
    pub fn invalidate(&self) -> Result<(), LedgerError> {
        counter::update_decimal(self.kv.as_ref(), keys::STATS_GENERATION_KEY, |g| {
            g.wrapping_add(1)
        })?;
        self.kv.delete(keys::STATS_CACHE_KEY)?;
        Ok(())
    }

    fn generation(&self) -> Result<u64, LedgerError> {
        match self.kv.get(keys::STATS_GENERATION_KEY)? {
            Some(bytes) => Ok(counter::parse(keys::STATS_GENERATION_KEY, &bytes)?),
            None => Ok(0),
        }
    }
}

/// Aggregate records by employer. Top organizations are ordered by count
/// descending, then name ascending, and capped at `top_n`.
pub fn summarize(records: &[Endorsement], top_n: usize, now: Timestamp) -> GlobalStats {
    let mut by_employer: HashMap<&str, u64> = HashMap::new();
    for record in records {
        *by_employer.entry(record.employer.as_str()).or_default() += 1;
    }

    let unique_organizations = by_employer.len() as u64;
    let mut top: Vec<OrganizationCount> = by_employer
        .into_iter()
        .map(|(name, count)| OrganizationCount {
            name: name.to_string(),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    top.truncate(top_n);

    GlobalStats {
        total_endorsements: records.len() as u64,
        unique_organizations,
        top_organizations: top,
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaudit_nullables::{NullClock, NullKvStore};
    use plaudit_types::{EndorsementFields, Identity, IdentityId};

    struct Fixture {
        clock: Arc<NullClock>,
        kv: Arc<NullKvStore>,
        endorsements: EndorsementStore,
        cache: StatsCache,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(NullClock::new(500));
        let kv = Arc::new(NullKvStore::new(clock.clone()));
        let endorsements = EndorsementStore::new(kv.clone());
        let cache = StatsCache::new(
            kv.clone(),
            endorsements.clone(),
            CounterLedger::new(kv.clone()),
            clock.clone(),
            300,
            3,
        );
        Fixture {
            clock,
            kv,
            endorsements,
            cache,
        }
    }

    fn record(p: &str, who: &str, employer: &str) -> Endorsement {
        Endorsement::new(
            ProposalId::parse(p).unwrap(),
            &Identity::new(IdentityId::parse(who).unwrap(), who),
            EndorsementFields::new("Engineer", employer).unwrap(),
            Timestamp::new(0),
        )
    }

    #[test]
    fn test_summarize_orders_and_caps() {
        let records = vec![
            record("p", "1", "Zeta"),
            record("p", "2", "Zeta"),
            record("p", "3", "Acme"),
            record("p", "4", "Acme"),
            record("p", "5", "Beta"),
            record("p", "6", "Gamma"),
            record("q", "1", "Acme"),
        ];
        let stats = summarize(&records, 3, Timestamp::new(7));
        assert_eq!(stats.total_endorsements, 7);
        assert_eq!(stats.unique_organizations, 4);
        let top: Vec<_> = stats
            .top_organizations
            .iter()
            .map(|o| (o.name.as_str(), o.count))
            .collect();
        assert_eq!(top, vec![("Acme", 3), ("Zeta", 2), ("Beta", 1)]);
        assert_eq!(stats.generated_at, Timestamp::new(7));
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[], 10, Timestamp::new(1)), GlobalStats::empty(Timestamp::new(1)));
    }

    #[test]
    fn test_read_through_then_hit() {
        let f = fixture();
        f.endorsements.upsert(record("p", "1", "Acme")).unwrap();

        let first = f.cache.global_stats().unwrap();
        assert!(!first.cached);
        assert_eq!(first.stats.total_endorsements, 1);

        // Without invalidation the cached snapshot is served as-is.
        f.endorsements.upsert(record("p", "2", "Initech")).unwrap();
        let second = f.cache.global_stats().unwrap();
        assert!(second.cached);
        assert_eq!(second.stats, first.stats);

        f.cache.invalidate().unwrap();
        let third = f.cache.global_stats().unwrap();
        assert!(!third.cached);
        assert_eq!(third.stats.unique_organizations, 2);
    }

    #[test]
    fn test_cache_expires() {
        let f = fixture();
        assert!(!f.cache.global_stats().unwrap().cached);
        f.clock.advance(299);
        assert!(f.cache.global_stats().unwrap().cached);
        f.clock.advance(1);
        assert!(!f.cache.global_stats().unwrap().cached);
    }

    #[test]
    fn test_corrupt_cache_is_a_miss() {
        let f = fixture();
        f.kv.put(keys::STATS_CACHE_KEY, b"{broken", Some(300)).unwrap();
        let lookup = f.cache.global_stats().unwrap();
        assert!(!lookup.cached);
        assert!(f.cache.global_stats().unwrap().cached);
    }

    #[test]
    fn test_proposal_stats_reads_counter() {
        let f = fixture();
        let p = ProposalId::parse("alpha-beta").unwrap();
        assert_eq!(f.cache.proposal_stats(&p).unwrap().total, 0);
        f.kv.put("count:alpha-beta:total", b"4", None).unwrap();
        let stats = f.cache.proposal_stats(&p).unwrap();
        assert_eq!(stats.proposal_id, "alpha-beta");
        assert_eq!(stats.total, 4);
    }

    #[test]
    fn test_rebuild_racing_an_invalidation_is_not_served() {
        let f = fixture();
        let endorsements = f.endorsements.clone();
        let cache = f.cache.clone();
        f.kv.after_next_list(keys::ENDORSEMENT_PREFIX, move || {
            endorsements.upsert(record("p", "1", "Acme")).unwrap();
            cache.invalidate().unwrap();
        });

        // This rebuild scanned before the write landed.
        let racing = f.cache.global_stats().unwrap();
        assert_eq!(racing.stats.total_endorsements, 0);

        let next = f.cache.global_stats().unwrap();
        assert!(!next.cached);
        assert_eq!(next.stats.total_endorsements, 1);
        assert!(f.cache.global_stats().unwrap().cached);
    }

    #[test]
    fn test_invalidate_advances_generation() {
        let f = fixture();
        f.cache.invalidate().unwrap();
        f.cache.invalidate().unwrap();
        assert_eq!(
            f.kv.get(keys::STATS_GENERATION_KEY).unwrap(),
            Some(b"2".to_vec())
        );
    }
}
