//! Session store: short-lived credentials issued after identity verification.

use std::sync::Arc;

use tracing::debug;

use plaudit_store::{keys, KvStore, StoreError};
use plaudit_types::{Clock, Identity, ProfileHint, Session, SessionToken, TokenSource};

use crate::codec::{decode, encode};
use crate::LedgerError;

/// Fresh tokens are 256 random bits, so a collision means a broken entropy
/// source rather than bad luck.
const CREATE_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    tokens: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
}

impl SessionStore {
    pub fn new(
        kv: Arc<dyn KvStore>,
        tokens: Arc<dyn TokenSource>,
        clock: Arc<dyn Clock>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            kv,
            tokens,
            clock,
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue a session for a freshly verified identity.
    pub fn create(
        &self,
        identity: Identity,
        profile_hint: ProfileHint,
    ) -> Result<SessionToken, LedgerError> {
        let session = Session {
            identity,
            profile_hint,
            created_at: self.clock.now(),
        };
        let value = encode(&session)?;

        for _ in 0..CREATE_ATTEMPTS {
            let token = self.tokens.generate()?;
            let key = keys::session(&token);
            if self.kv.put_if_absent(&key, &value, Some(self.ttl_secs))? {
                debug!(identity = %session.identity.id, "session created");
                return Ok(token);
            }
        }
        Err(StoreError::Contention {
            key: keys::SESSION_PREFIX.to_string(),
            attempts: CREATE_ATTEMPTS,
        }
        .into())
    }

    /// Look up a live session. Reading does not consume it.
    pub fn consume(&self, token: &SessionToken) -> Result<Session, LedgerError> {
        let key = keys::session(token);
        let bytes = self.kv.get(&key)?.ok_or(LedgerError::SessionNotFound)?;
        let session: Session = decode(&key, &bytes)?;

        // Backends expire entries themselves; this guards against one that
        // lags behind the clock.
        if session
            .created_at
            .has_expired(self.ttl_secs, self.clock.now())
        {
            return Err(LedgerError::SessionNotFound);
        }
        Ok(session)
    }

    /// Parse a raw token and look it up. A malformed token never reaches
    /// the store.
    pub fn consume_raw(&self, raw: &str) -> Result<Session, LedgerError> {
        let token = SessionToken::parse(raw).map_err(|_| LedgerError::SessionNotFound)?;
        self.consume(&token)
    }

    pub fn revoke(&self, token: &SessionToken) -> Result<bool, LedgerError> {
        Ok(self.kv.delete(&keys::session(token))?)
    }
}
