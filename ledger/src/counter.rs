//! Counter ledger: per-proposal endorsement totals.
//!
//! Counters are ASCII decimals under `count:{proposal}:total` and are updated
//! through compare-and-swap loops, so concurrent increments never lose an
//! update on a backend with atomic CAS.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use plaudit_store::{keys, KvStore, StoreError};
use plaudit_types::{Endorsement, ProposalId};

use crate::LedgerError;

/// CAS attempts before an update gives up with [`StoreError::Contention`].
pub const CAS_ATTEMPTS: u32 = 16;

/// A counter that disagreed with the endorsement records and was rewritten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterDrift {
    pub proposal: ProposalId,
    pub recorded: u64,
    pub actual: u64,
}

#[derive(Clone)]
pub struct CounterLedger {
    kv: Arc<dyn KvStore>,
}

impl CounterLedger {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Current total, zero when no counter exists.
    pub fn read(&self, proposal: &ProposalId) -> Result<u64, LedgerError> {
        let key = keys::count(proposal);
        match self.kv.get(&key)? {
            Some(bytes) => Ok(parse(&key, &bytes)?),
            None => Ok(0),
        }
    }

    /// Returns the new total.
    pub fn increment(&self, proposal: &ProposalId) -> Result<u64, LedgerError> {
        self.update(proposal, |n| n.saturating_add(1))
    }

    /// Returns the new total. Never goes below zero.
    pub fn decrement(&self, proposal: &ProposalId) -> Result<u64, LedgerError> {
        self.update(proposal, |n| n.saturating_sub(1))
    }

    fn update(&self, proposal: &ProposalId, f: impl Fn(u64) -> u64) -> Result<u64, LedgerError> {
        update_decimal(self.kv.as_ref(), &keys::count(proposal), f)
    }

    /// Recount every proposal from `endorsements` and rewrite each counter
    /// that disagrees, including counters whose proposal has no records left.
    pub fn reconcile(&self, endorsements: &[Endorsement]) -> Result<Vec<CounterDrift>, LedgerError> {
        let mut actual: BTreeMap<ProposalId, u64> = BTreeMap::new();
        for record in endorsements {
            *actual.entry(record.proposal_id.clone()).or_default() += 1;
        }

        let mut recorded: BTreeMap<ProposalId, u64> = BTreeMap::new();
        for (key, bytes) in self.kv.list_prefix(keys::COUNT_PREFIX)? {
            let Some(proposal) = keys::parse_count(&key).and_then(|raw| ProposalId::parse(raw).ok())
            else {
                warn!(%key, "ignoring counter with malformed key");
                continue;
            };
            // An unreadable counter is treated as drifted and overwritten.
            let value = parse(&key, &bytes).unwrap_or(u64::MAX);
            recorded.insert(proposal, value);
        }

        let mut drifts = Vec::new();
        let proposals: BTreeSet<ProposalId> = actual.keys().chain(recorded.keys()).cloned().collect();
        for proposal in proposals {
            let want = actual.get(&proposal).copied().unwrap_or(0);
            let have = recorded.get(&proposal).copied().unwrap_or(0);
            if want == have {
                continue;
            }
            self.kv
                .put(&keys::count(&proposal), want.to_string().as_bytes(), None)?;
            info!(proposal = %proposal, recorded = have, actual = want, "counter repaired");
            drifts.push(CounterDrift {
                proposal,
                recorded: have,
                actual: want,
            });
        }
        Ok(drifts)
    }
}

/// Apply `f` to the decimal stored at `key` (absent = 0) through a CAS loop.
pub(crate) fn update_decimal(
    kv: &dyn KvStore,
    key: &str,
    f: impl Fn(u64) -> u64,
) -> Result<u64, LedgerError> {
    for _ in 0..CAS_ATTEMPTS {
        let current = kv.get(key)?;
        let value = match &current {
            Some(bytes) => parse(key, bytes)?,
            None => 0,
        };
        let next = f(value);
        let encoded = next.to_string();
        if kv.compare_and_swap(key, current.as_deref(), Some(encoded.as_bytes()), None)? {
            return Ok(next);
        }
    }
    warn!(%key, attempts = CAS_ATTEMPTS, "counter update gave up");
    Err(StoreError::Contention {
        key: key.to_string(),
        attempts: CAS_ATTEMPTS,
    }
    .into())
}

pub(crate) fn parse(key: &str, bytes: &[u8]) -> Result<u64, StoreError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| StoreError::Corruption(format!("{key}: not a decimal counter")))
}
