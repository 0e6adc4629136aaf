//! The endorsement service: validated, time-bounded operations over the
//! ledger and the identity verifier.
//!
//! Every operation validates its input before it touches storage. Store work
//! runs on the blocking pool under `store_timeout`, and each identity
//! provider call runs under `upstream_timeout`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use plaudit_ledger::{CounterDrift, Ledger, LedgerError};
use plaudit_types::{
    Endorsement, EndorsementFields, Identity, ProfileHint, ProposalId, ProposalStats,
    SessionToken, StatsSnapshot, TokenSource, TypesError,
};
use plaudit_verification::{IdentityVerifier, VerificationError};

use crate::config::NodeConfig;
use crate::error::ServiceError;
use crate::metrics::NodeMetrics;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceOptions {
    pub store_timeout: Duration,
    pub upstream_timeout: Duration,
    pub single_use_sessions: bool,
}

impl ServiceOptions {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            store_timeout: config.store_timeout(),
            upstream_timeout: config.upstream_timeout(),
            single_use_sessions: config.single_use_sessions,
        }
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from_config(&NodeConfig::default())
    }
}

/// Where to send the user agent to sign in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRedirect {
    pub auth_url: String,
    pub state: String,
}

/// A completed sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    pub session_token: SessionToken,
    pub identity: Identity,
    pub profile_hint: ProfileHint,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndorseRequest {
    pub session_token: String,
    pub proposal_id: String,
    pub job_title: String,
    pub employer: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndorseReceipt {
    pub was_new: bool,
    pub endorsement: Endorsement,
}

#[derive(Clone)]
pub struct EndorsementService {
    ledger: Ledger,
    verifier: Arc<dyn IdentityVerifier>,
    states: Arc<dyn TokenSource>,
    metrics: Arc<NodeMetrics>,
    options: ServiceOptions,
}

impl EndorsementService {
    /// `states` supplies correlation state for sign-ins that did not bring
    /// their own.
    pub fn new(
        ledger: Ledger,
        verifier: Arc<dyn IdentityVerifier>,
        states: Arc<dyn TokenSource>,
        metrics: Arc<NodeMetrics>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            ledger,
            verifier,
            states,
            metrics,
            options,
        }
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn backend_name(&self) -> &'static str {
        self.ledger.backend_name()
    }

    pub fn verifier_name(&self) -> &'static str {
        self.verifier.name()
    }

    // ── Sign-in ─────────────────────────────────────────────────────────

    pub fn start_auth(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<AuthRedirect, ServiceError> {
        let result = self.start_auth_inner(redirect_uri, state);
        self.finish("start_auth", result)
    }

    fn start_auth_inner(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Result<AuthRedirect, ServiceError> {
        let redirect_uri = validate_redirect(redirect_uri)?;
        let state = match state.map(str::trim).filter(|s| !s.is_empty()) {
            Some(state) => state.to_string(),
            None => self
                .states
                .generate()
                .map_err(|e| ServiceError::Internal(e.to_string()))?
                .as_str()
                .to_string(),
        };
        let auth_url = self.verifier.authorization_url(redirect_uri, &state)?;
        Ok(AuthRedirect { auth_url, state })
    }

    /// Exchange the provider's code for an identity and open a session.
    /// The profile lookup is best-effort.
    pub async fn complete_auth(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthSession, ServiceError> {
        let result = self.complete_auth_inner(code, redirect_uri).await;
        self.finish("complete_auth", result)
    }

    async fn complete_auth_inner(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthSession, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ServiceError::InvalidInput("missing authorization code".into()));
        }
        let redirect_uri = validate_redirect(redirect_uri)?;

        let verified = self
            .upstream(self.verifier.exchange_code(code, redirect_uri))
            .await?;
        let identity = verified.identity;

        let profile_hint = match self
            .upstream(self.verifier.fetch_profile(&identity.id, &verified.access_token))
            .await
        {
            Ok(hint) => hint,
            Err(e) => {
                warn!(identity = %identity.id, error = %e, "profile lookup failed, continuing without hint");
                ProfileHint::default()
            }
        };

        let session_identity = identity.clone();
        let session_hint = profile_hint.clone();
        let session_token = self
            .blocking(move |ledger| ledger.open_session(session_identity, session_hint))
            .await?;

        info!(identity = %identity.id, "sign-in completed");
        Ok(AuthSession {
            session_token,
            identity,
            profile_hint,
        })
    }

    // ── Endorsements ────────────────────────────────────────────────────

    pub async fn endorse(&self, request: EndorseRequest) -> Result<EndorseReceipt, ServiceError> {
        let result = self.endorse_inner(request).await;
        self.finish("endorse", result)
    }

    async fn endorse_inner(&self, request: EndorseRequest) -> Result<EndorseReceipt, ServiceError> {
        let proposal = parse_proposal(&request.proposal_id)?;
        let fields = EndorsementFields::new(&request.job_title, &request.employer).map_err(
            |e| match e {
                TypesError::MissingFields(missing) => ServiceError::MissingFields(missing),
                other => ServiceError::InvalidInput(other.to_string()),
            },
        )?;
        let token = parse_token(&request.session_token)?;

        let single_use = self.options.single_use_sessions;
        let outcome = self
            .blocking(move |ledger| {
                let session = ledger.sessions().consume(&token)?;
                let outcome = ledger.endorse(&session, proposal, fields)?;
                if single_use {
                    ledger.sessions().revoke(&token)?;
                }
                Ok(outcome)
            })
            .await?;

        if outcome.was_new {
            self.metrics.endorsements_created.inc();
        } else {
            self.metrics.endorsements_updated.inc();
        }
        Ok(EndorseReceipt {
            was_new: outcome.was_new,
            endorsement: outcome.record,
        })
    }

    /// Withdraw an endorsement. Withdrawing one that does not exist succeeds
    /// with `false`.
    pub async fn unendorse(&self, session_token: &str, proposal_id: &str) -> Result<bool, ServiceError> {
        let result = self.unendorse_inner(session_token, proposal_id).await;
        self.finish("unendorse", result)
    }

    async fn unendorse_inner(&self, session_token: &str, proposal_id: &str) -> Result<bool, ServiceError> {
        let proposal = parse_proposal(proposal_id)?;
        let token = parse_token(session_token)?;
        let removed = self
            .blocking(move |ledger| {
                let session = ledger.sessions().consume(&token)?;
                ledger.unendorse(&session.identity.id, &proposal)
            })
            .await?;
        if removed {
            self.metrics.endorsements_removed.inc();
        }
        Ok(removed)
    }

    pub async fn check_endorsement(
        &self,
        session_token: &str,
        proposal_id: &str,
    ) -> Result<Option<Endorsement>, ServiceError> {
        let result = self.check_endorsement_inner(session_token, proposal_id).await;
        self.finish("check_endorsement", result)
    }

    async fn check_endorsement_inner(
        &self,
        session_token: &str,
        proposal_id: &str,
    ) -> Result<Option<Endorsement>, ServiceError> {
        let proposal = parse_proposal(proposal_id)?;
        let token = parse_token(session_token)?;
        self.blocking(move |ledger| {
            let session = ledger.sessions().consume(&token)?;
            ledger.endorsement(&session.identity.id, &proposal)
        })
        .await
    }

    /// The caller's endorsements, newest first.
    pub async fn list_mine(&self, session_token: &str) -> Result<Vec<Endorsement>, ServiceError> {
        let result = self.list_mine_inner(session_token).await;
        self.finish("list_mine", result)
    }

    async fn list_mine_inner(&self, session_token: &str) -> Result<Vec<Endorsement>, ServiceError> {
        let token = parse_token(session_token)?;
        self.blocking(move |ledger| {
            let session = ledger.sessions().consume(&token)?;
            ledger.endorsements_of(&session.identity.id)
        })
        .await
    }

    // ── Statistics ──────────────────────────────────────────────────────

    /// Global stats when `proposal_id` is absent or blank, otherwise that
    /// proposal's total. An invalid id reports zero without a store read.
    pub async fn stats(&self, proposal_id: Option<&str>) -> Result<StatsSnapshot, ServiceError> {
        let result = self.stats_inner(proposal_id).await;
        self.finish("stats", result)
    }

    async fn stats_inner(&self, proposal_id: Option<&str>) -> Result<StatsSnapshot, ServiceError> {
        match proposal_id.filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => match ProposalId::parse(raw) {
                Ok(proposal) => {
                    let stats = self
                        .blocking(move |ledger| ledger.proposal_stats(&proposal))
                        .await?;
                    Ok(StatsSnapshot::Proposal(stats))
                }
                Err(_) => {
                    debug!(proposal = raw, "stats requested for invalid proposal id");
                    Ok(StatsSnapshot::Proposal(ProposalStats {
                        proposal_id: raw.to_string(),
                        total: 0,
                    }))
                }
            },
            None => {
                let lookup = self.blocking(|ledger| ledger.global_stats()).await?;
                if lookup.cached {
                    self.metrics.stats_cache_hits.inc();
                } else {
                    self.metrics.stats_cache_misses.inc();
                }
                Ok(StatsSnapshot::Global(lookup.stats))
            }
        }
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    pub async fn reconcile(&self) -> Result<Vec<CounterDrift>, ServiceError> {
        let result = self.blocking(|ledger| ledger.reconcile()).await;
        self.finish("reconcile", result)
    }

    pub async fn purge_expired(&self) -> Result<usize, ServiceError> {
        let result = self.blocking(|ledger| ledger.purge_expired()).await;
        self.finish("purge", result)
    }

    // ── Plumbing ────────────────────────────────────────────────────────

    /// Run ledger work on the blocking pool under the store timeout. The
    /// work itself is not cancelled when the timeout fires.
    async fn blocking<T, F>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Ledger) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = self.ledger.clone();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || work(&ledger));
        let outcome = tokio::time::timeout(self.options.store_timeout, task).await;
        self.metrics
            .store_latency_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);

        match outcome {
            Ok(Ok(result)) => result.map_err(ServiceError::from),
            Ok(Err(join)) => Err(ServiceError::Internal(format!("store task failed: {join}"))),
            Err(_) => Err(ServiceError::StoreUnavailable(format!(
                "no response within {} ms",
                self.options.store_timeout.as_millis()
            ))),
        }
    }

    async fn upstream<T>(
        &self,
        call: impl Future<Output = Result<T, VerificationError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.options.upstream_timeout, call).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::UpstreamUnavailable(format!(
                "{} did not respond within {} ms",
                self.verifier.name(),
                self.options.upstream_timeout.as_millis()
            ))),
        }
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        result: Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        match &result {
            Ok(_) => self.metrics.record_request(operation, "ok"),
            Err(e) => {
                self.metrics.record_request(operation, e.kind());
                match e {
                    ServiceError::Internal(_) => error!(operation, error = %e, "operation failed"),
                    ServiceError::StoreUnavailable(_) | ServiceError::UpstreamUnavailable(_) => {
                        warn!(operation, error = %e, "operation failed")
                    }
                    _ => debug!(operation, error = %e, "operation rejected"),
                }
            }
        }
        result
    }
}

fn parse_proposal(raw: &str) -> Result<ProposalId, ServiceError> {
    ProposalId::parse(raw).map_err(|_| ServiceError::InvalidProposalId(raw.to_string()))
}

fn parse_token(raw: &str) -> Result<SessionToken, ServiceError> {
    SessionToken::parse(raw.trim()).map_err(|_| ServiceError::Unauthenticated)
}

fn validate_redirect(raw: &str) -> Result<&str, ServiceError> {
    let uri = raw.trim();
    let rest = uri
        .strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() && !uri.chars().any(char::is_whitespace) => Ok(uri),
        _ => Err(ServiceError::InvalidInput(
            "redirectUri must be an absolute http(s) URL".into(),
        )),
    }
}
