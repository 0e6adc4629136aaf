//! The ledger façade: coordinated operations across the four stores.
//!
//! All stores share one [`KvStore`] handle. Every operation here is
//! synchronous; callers on an async runtime run them on the blocking pool.

use std::sync::Arc;

use tracing::{error, info, warn};

use plaudit_store::KvStore;
use plaudit_types::{
    Clock, Endorsement, EndorsementFields, Identity, IdentityId, ProfileHint, ProposalId,
    ProposalStats, Session, SessionToken, TokenSource,
};

use crate::counter::{CounterDrift, CounterLedger};
use crate::endorsement::{EndorsementStore, UpsertOutcome};
use crate::session::SessionStore;
use crate::stats::{StatsCache, StatsLookup};
use crate::LedgerError;

/// Tunables for [`Ledger`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    pub session_ttl_secs: u64,
    pub stats_cache_ttl_secs: u64,
    pub top_organizations: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 900,
            stats_cache_ttl_secs: 300,
            top_organizations: 10,
        }
    }
}

pub type EndorseOutcome = UpsertOutcome;

#[derive(Clone)]
pub struct Ledger {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    sessions: SessionStore,
    endorsements: EndorsementStore,
    counters: CounterLedger,
    stats: StatsCache,
}

impl Ledger {
    pub fn new(
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenSource>,
        config: &LedgerConfig,
    ) -> Self {
        let sessions = SessionStore::new(kv.clone(), tokens, clock.clone(), config.session_ttl_secs);
        let endorsements = EndorsementStore::new(kv.clone());
        let counters = CounterLedger::new(kv.clone());
        let stats = StatsCache::new(
            kv.clone(),
            endorsements.clone(),
            counters.clone(),
            clock.clone(),
            config.stats_cache_ttl_secs,
            config.top_organizations,
        );
        Self {
            kv,
            clock,
            sessions,
            endorsements,
            counters,
            stats,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn endorsements(&self) -> &EndorsementStore {
        &self.endorsements
    }

    pub fn counters(&self) -> &CounterLedger {
        &self.counters
    }

    pub fn stats(&self) -> &StatsCache {
        &self.stats
    }

    pub fn backend_name(&self) -> &'static str {
        self.kv.backend_name()
    }

    pub fn open_session(
        &self,
        identity: Identity,
        profile_hint: ProfileHint,
    ) -> Result<SessionToken, LedgerError> {
        self.sessions.create(identity, profile_hint)
    }

    /// Record `session`'s endorsement of `proposal`, replacing any earlier one.
    ///
    /// The counter moves only when the record is new. If that counter update
    /// fails, the new record is withdrawn again before the error is returned,
    /// so a retry starts from the same state and still counts once. The
    /// global stats cache is invalidated after every successful write.
    pub fn endorse(
        &self,
        session: &Session,
        proposal: ProposalId,
        fields: EndorsementFields,
    ) -> Result<EndorseOutcome, LedgerError> {
        let record = Endorsement::new(proposal, &session.identity, fields, self.clock.now());
        let outcome = self.endorsements.upsert(record)?;
        if outcome.was_new {
            if let Err(e) = self.counters.increment(&outcome.record.proposal_id) {
                match self.endorsements.discard(&outcome.record) {
                    Ok(_) => warn!(
                        proposal = %outcome.record.proposal_id,
                        error = %e,
                        "counter update failed, new endorsement withdrawn"
                    ),
                    Err(undo) => error!(
                        proposal = %outcome.record.proposal_id,
                        error = %e,
                        undo_error = %undo,
                        "counter update failed and the endorsement could not be withdrawn"
                    ),
                }
                return Err(e);
            }
        }
        self.stats.invalidate()?;

        info!(
            proposal = %outcome.record.proposal_id,
            identity = %outcome.record.identity,
            was_new = outcome.was_new,
            "endorsement recorded"
        );
        Ok(outcome)
    }

    /// Remove `identity`'s endorsement of `proposal`. Removing nothing is
    /// not an error. A failed counter update puts the record back, so the
    /// removal can be retried.
    pub fn unendorse(&self, identity: &IdentityId, proposal: &ProposalId) -> Result<bool, LedgerError> {
        let Some(bytes) = self.endorsements.take(proposal, identity)? else {
            return Ok(false);
        };
        if let Err(e) = self.counters.decrement(proposal) {
            match self.endorsements.restore(proposal, identity, &bytes) {
                Ok(_) => warn!(proposal = %proposal, error = %e, "counter update failed, endorsement restored"),
                Err(undo) => error!(
                    proposal = %proposal,
                    error = %e,
                    undo_error = %undo,
                    "counter update failed and the endorsement could not be restored"
                ),
            }
            return Err(e);
        }
        self.stats.invalidate()?;
        info!(proposal = %proposal, identity = %identity, "endorsement removed");
        Ok(true)
    }

    pub fn endorsement(
        &self,
        identity: &IdentityId,
        proposal: &ProposalId,
    ) -> Result<Option<Endorsement>, LedgerError> {
        self.endorsements.get(proposal, identity)
    }

    /// `identity`'s endorsements, newest first.
    pub fn endorsements_of(&self, identity: &IdentityId) -> Result<Vec<Endorsement>, LedgerError> {
        let mut records = self.endorsements.list_by(identity)?;
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.proposal_id.cmp(&b.proposal_id))
        });
        Ok(records)
    }

    pub fn global_stats(&self) -> Result<StatsLookup, LedgerError> {
        self.stats.global_stats()
    }

    pub fn proposal_stats(&self, proposal: &ProposalId) -> Result<ProposalStats, LedgerError> {
        self.stats.proposal_stats(proposal)
    }

    /// Recount every counter from the endorsement records and repair drift.
    pub fn reconcile(&self) -> Result<Vec<CounterDrift>, LedgerError> {
        let records = self.endorsements.list_all()?;
        let drifts = self.counters.reconcile(&records)?;
        if !drifts.is_empty() {
            self.stats.invalidate()?;
        }
        Ok(drifts)
    }

    /// Drop expired sessions and cache entries from the backend.
    pub fn purge_expired(&self) -> Result<usize, LedgerError> {
        Ok(self.kv.purge_expired()?)
    }
}
