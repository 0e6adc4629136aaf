//! Endorsement store: at most one record per (proposal, identity) pair.

use std::sync::Arc;

use tracing::warn;

use plaudit_store::{keys, KvStore, StoreError};
use plaudit_types::{Endorsement, IdentityId, ProposalId};

use crate::codec::{decode, encode};
use crate::counter::CAS_ATTEMPTS;
use crate::LedgerError;

/// Result of [`EndorsementStore::upsert`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub record: Endorsement,
    /// `true` when no record existed for the pair before this write.
    pub was_new: bool,
}

#[derive(Clone)]
pub struct EndorsementStore {
    kv: Arc<dyn KvStore>,
}

impl EndorsementStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn get(
        &self,
        proposal: &ProposalId,
        identity: &IdentityId,
    ) -> Result<Option<Endorsement>, LedgerError> {
        let key = keys::endorsement(proposal, identity);
        match self.kv.get(&key)? {
            Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Create or replace the record for its pair.
    ///
    /// The create path is a conditional write, so when several callers race
    /// on a fresh pair exactly one of them sees `was_new`.
    pub fn upsert(&self, record: Endorsement) -> Result<UpsertOutcome, LedgerError> {
        let key = keys::endorsement(&record.proposal_id, &record.identity);
        let value = encode(&record)?;

        let was_new = self.kv.put_if_absent(&key, &value, None)?;
        if !was_new {
            self.kv.put(&key, &value, None)?;
        }
        Ok(UpsertOutcome { record, was_new })
    }

    /// Delete `record` only if it is still exactly what is stored. Returns
    /// whether it was deleted; a newer write for the pair is left alone.
    pub fn discard(&self, record: &Endorsement) -> Result<bool, LedgerError> {
        let key = keys::endorsement(&record.proposal_id, &record.identity);
        let value = encode(record)?;
        Ok(self.kv.compare_and_swap(&key, Some(&value), None, None)?)
    }

    /// Returns whether a record was actually removed.
    pub fn remove(&self, proposal: &ProposalId, identity: &IdentityId) -> Result<bool, LedgerError> {
        Ok(self.take(proposal, identity)?.is_some())
    }

    /// Remove the pair's record and hand back its stored bytes, so the
    /// removal can be undone with [`EndorsementStore::restore`].
    pub(crate) fn take(
        &self,
        proposal: &ProposalId,
        identity: &IdentityId,
    ) -> Result<Option<Vec<u8>>, LedgerError> {
        let key = keys::endorsement(proposal, identity);
        for _ in 0..CAS_ATTEMPTS {
            let Some(current) = self.kv.get(&key)? else {
                return Ok(None);
            };
            if self.kv.compare_and_swap(&key, Some(&current), None, None)? {
                return Ok(Some(current));
            }
        }
        Err(StoreError::Contention {
            key,
            attempts: CAS_ATTEMPTS,
        }
        .into())
    }

    /// Put back bytes returned by [`EndorsementStore::take`] unless the pair
    /// has been written again since.
    pub(crate) fn restore(
        &self,
        proposal: &ProposalId,
        identity: &IdentityId,
        bytes: &[u8],
    ) -> Result<bool, LedgerError> {
        let key = keys::endorsement(proposal, identity);
        Ok(self.kv.put_if_absent(&key, bytes, None)?)
    }

    /// Every record made by `identity`, in key order.
    pub fn list_by(&self, identity: &IdentityId) -> Result<Vec<Endorsement>, LedgerError> {
        self.scan(|key_identity| key_identity == identity.as_str())
    }

    pub fn list_all(&self) -> Result<Vec<Endorsement>, LedgerError> {
        self.scan(|_| true)
    }

    // Undecodable records are logged and skipped so a single bad value
    // cannot take statistics down with it.
    fn scan(&self, wanted: impl Fn(&str) -> bool) -> Result<Vec<Endorsement>, LedgerError> {
        let entries = self.kv.list_prefix(keys::ENDORSEMENT_PREFIX)?;
        let mut records = Vec::new();
        for (key, bytes) in entries {
            let Some((_, key_identity)) = keys::parse_endorsement(&key) else {
                warn!(%key, "skipping endorsement with malformed key");
                continue;
            };
            if !wanted(key_identity) {
                continue;
            }
            match decode::<Endorsement>(&key, &bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "skipping undecodable endorsement"),
            }
        }
        Ok(records)
    }
}
