//! End-to-end tests of the endorsement service over nullable infrastructure:
//! sign-in → session → endorse / un-endorse → counters and statistics.
//!
//! The last section runs the same flow over a real LMDB environment.

use std::sync::Arc;
use std::time::Duration;

use plaudit_node::{EndorseRequest, EndorsementService, NodeConfig, PlauditNode, ServiceError};
use plaudit_nullables::{NullClock, NullKvStore, NullRandom, NullVerifier, ProfileBehavior};
use plaudit_types::{ProfileHint, StatsSnapshot};

const REDIRECT: &str = "https://g5t.github.io/endorse/complete/";
const ORCID: &str = "0000-0002-1825-0097";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    clock: Arc<NullClock>,
    kv: Arc<NullKvStore>,
    verifier: Arc<NullVerifier>,
    service: EndorsementService,
}

fn harness_with(config: NodeConfig) -> Harness {
    let clock = Arc::new(NullClock::new(1_700_000_000));
    let kv = Arc::new(NullKvStore::new(clock.clone()));
    let verifier = Arc::new(NullVerifier::new());
    verifier.accept_code("code-1", ORCID, "Josiah Carberry");
    verifier.accept_code("code-2", "0000-0001-5109-3700", "Laure Haak");

    let node = PlauditNode::with_parts(
        config,
        kv.clone(),
        clock.clone(),
        Arc::new(NullRandom::new()),
        verifier.clone(),
    )
    .expect("valid config");
    Harness {
        clock,
        kv,
        verifier,
        service: node.service().clone(),
    }
}

fn harness() -> Harness {
    harness_with(NodeConfig::default())
}

async fn sign_in(h: &Harness, code: &str) -> String {
    h.service
        .complete_auth(code, REDIRECT)
        .await
        .expect("sign-in")
        .session_token
        .as_str()
        .to_string()
}

fn request(token: &str, proposal: &str, title: &str, employer: &str) -> EndorseRequest {
    EndorseRequest {
        session_token: token.to_string(),
        proposal_id: proposal.to_string(),
        job_title: title.to_string(),
        employer: employer.to_string(),
    }
}

async fn proposal_total(service: &EndorsementService, proposal: &str) -> u64 {
    match service.stats(Some(proposal)).await.expect("stats") {
        StatsSnapshot::Proposal(stats) => stats.total,
        other => panic!("expected proposal stats, got {other:?}"),
    }
}

async fn global(service: &EndorsementService) -> plaudit_types::GlobalStats {
    match service.stats(None).await.expect("stats") {
        StatsSnapshot::Global(stats) => stats,
        other => panic!("expected global stats, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 1. Sign-in
// ---------------------------------------------------------------------------

#[test]
fn start_auth_generates_state_when_absent() {
    let h = harness();
    let redirect = h.service.start_auth(REDIRECT, None).unwrap();
    assert_eq!(redirect.state, NullRandom::token_for(1).as_str());
    assert!(redirect.auth_url.contains(&redirect.state));

    let kept = h.service.start_auth(REDIRECT, Some("abc")).unwrap();
    assert_eq!(kept.state, "abc");
}

#[test]
fn start_auth_rejects_bad_redirect() {
    let h = harness();
    for bad in ["", "javascript:alert(1)", "/relative"] {
        assert!(matches!(
            h.service.start_auth(bad, None),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}

#[tokio::test]
async fn complete_auth_returns_identity_and_profile_hint() {
    let h = harness();
    h.verifier.set_profile(
        ORCID,
        ProfileBehavior::Return(ProfileHint::new(
            Some("Professor".into()),
            Some("Wesleyan University".into()),
        )),
    );
    let session = h.service.complete_auth("code-1", REDIRECT).await.unwrap();
    assert_eq!(session.identity.id.as_str(), ORCID);
    assert_eq!(session.identity.display_name, "Josiah Carberry");
    assert_eq!(session.profile_hint.employer.as_deref(), Some("Wesleyan University"));
    assert_eq!(
        h.verifier.exchanges(),
        vec![("code-1".to_string(), REDIRECT.to_string())]
    );
}

#[tokio::test]
async fn complete_auth_error_kinds() {
    let h = harness();
    assert!(matches!(
        h.service.complete_auth("  ", REDIRECT).await,
        Err(ServiceError::InvalidInput(_))
    ));
    assert!(matches!(
        h.service.complete_auth("unknown", REDIRECT).await,
        Err(ServiceError::VerificationFailed(_))
    ));
    h.verifier.set_unavailable(true);
    assert!(matches!(
        h.service.complete_auth("code-1", REDIRECT).await,
        Err(ServiceError::UpstreamUnavailable(_))
    ));
}

#[tokio::test]
async fn profile_failure_is_swallowed() {
    let h = harness();
    h.verifier.set_profile(ORCID, ProfileBehavior::Fail);
    let session = h.service.complete_auth("code-1", REDIRECT).await.unwrap();
    assert!(session.profile_hint.is_empty());
}

#[tokio::test]
async fn stalled_profile_lookup_times_out_without_failing_sign_in() {
    let h = harness_with(NodeConfig {
        upstream_timeout_ms: 50,
        ..NodeConfig::default()
    });
    h.verifier
        .set_profile(ORCID, ProfileBehavior::Stall(Duration::from_secs(5)));
    let session = tokio::time::timeout(
        Duration::from_secs(2),
        h.service.complete_auth("code-1", REDIRECT),
    )
    .await
    .expect("bounded by the upstream timeout")
    .unwrap();
    assert!(session.profile_hint.is_empty());
}

// ---------------------------------------------------------------------------
// 2. Endorsement scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenarios_a_b_c() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;

    // A: fresh pair.
    let receipt = h
        .service
        .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
        .await
        .unwrap();
    assert!(receipt.was_new);
    assert_eq!(proposal_total(&h.service, "alpha-beta").await, 1);

    // B: same pair, new title.
    let receipt = h
        .service
        .endorse(request(&token, "alpha-beta", "Senior Engineer", "Acme"))
        .await
        .unwrap();
    assert!(!receipt.was_new);
    assert_eq!(receipt.endorsement.job_title, "Senior Engineer");
    assert_eq!(proposal_total(&h.service, "alpha-beta").await, 1);

    // C: withdraw twice.
    assert!(h.service.unendorse(&token, "alpha-beta").await.unwrap());
    assert_eq!(proposal_total(&h.service, "alpha-beta").await, 0);
    assert!(!h.service.unendorse(&token, "alpha-beta").await.unwrap());
    assert_eq!(proposal_total(&h.service, "alpha-beta").await, 0);
}

#[tokio::test]
async fn invalid_proposal_rejected_before_storage() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;
    let before = h.kv.operation_count();

    let err = h
        .service
        .endorse(request(&token, "alpha beta!", "Engineer", "Acme"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidProposalId(_)));

    assert!(matches!(
        h.service.unendorse(&token, "alpha beta!").await,
        Err(ServiceError::InvalidProposalId(_))
    ));
    assert!(matches!(
        h.service.check_endorsement(&token, "alpha beta!").await,
        Err(ServiceError::InvalidProposalId(_))
    ));
    assert_eq!(h.kv.operation_count(), before);
}

#[tokio::test]
async fn validation_order_is_proposal_fields_session() {
    let h = harness();
    let before = h.kv.operation_count();

    // Bad everything: the proposal id is reported first.
    assert!(matches!(
        h.service.endorse(request("nope", "a b", "", "")).await,
        Err(ServiceError::InvalidProposalId(_))
    ));
    // Valid proposal, blank fields, bad session: fields come next.
    match h.service.endorse(request("nope", "alpha-beta", " ", "")).await {
        Err(ServiceError::MissingFields(fields)) => assert_eq!(fields, vec!["jobTitle", "employer"]),
        other => panic!("expected MissingFields, got {other:?}"),
    }
    // Only the session is wrong.
    assert!(matches!(
        h.service.endorse(request("nope", "alpha-beta", "Engineer", "Acme")).await,
        Err(ServiceError::Unauthenticated)
    ));
    assert_eq!(h.kv.operation_count(), before);
}

#[tokio::test]
async fn unknown_session_is_unauthenticated() {
    let h = harness();
    let token = NullRandom::token_for(99);
    assert!(matches!(
        h.service
            .endorse(request(token.as_str(), "alpha-beta", "Engineer", "Acme"))
            .await,
        Err(ServiceError::Unauthenticated)
    ));
    assert!(matches!(
        h.service.list_mine(token.as_str()).await,
        Err(ServiceError::Unauthenticated)
    ));
}

#[tokio::test]
async fn session_expires_even_if_unused() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;
    h.clock.advance(900);
    assert!(matches!(
        h.service
            .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
            .await,
        Err(ServiceError::Unauthenticated)
    ));
}

#[tokio::test]
async fn sessions_are_reusable_by_default() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;
    h.service
        .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
        .await
        .unwrap();
    h.service
        .endorse(request(&token, "gamma", "Engineer", "Acme"))
        .await
        .unwrap();
    assert_eq!(h.service.list_mine(&token).await.unwrap().len(), 2);
}

#[tokio::test]
async fn single_use_sessions_are_revoked_after_endorse() {
    let h = harness_with(NodeConfig {
        single_use_sessions: true,
        ..NodeConfig::default()
    });
    let token = sign_in(&h, "code-1").await;
    h.service
        .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
        .await
        .unwrap();
    assert!(matches!(
        h.service
            .endorse(request(&token, "gamma", "Engineer", "Acme"))
            .await,
        Err(ServiceError::Unauthenticated)
    ));
}

#[tokio::test]
async fn check_and_list_mine() {
    let h = harness();
    let mine = sign_in(&h, "code-1").await;
    let theirs = sign_in(&h, "code-2").await;

    h.service
        .endorse(request(&mine, "alpha-beta", "Engineer", "Acme"))
        .await
        .unwrap();
    h.clock.advance(5);
    h.service
        .endorse(request(&mine, "gamma", "Engineer", "Acme"))
        .await
        .unwrap();
    h.service
        .endorse(request(&theirs, "alpha-beta", "Researcher", "Initech"))
        .await
        .unwrap();

    let found = h.service.check_endorsement(&mine, "alpha-beta").await.unwrap();
    assert_eq!(found.unwrap().employer, "Acme");
    assert!(h.service.check_endorsement(&mine, "delta").await.unwrap().is_none());

    let listed: Vec<_> = h
        .service
        .list_mine(&mine)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.proposal_id.to_string())
        .collect();
    assert_eq!(listed, vec!["gamma", "alpha-beta"]);
}

// ---------------------------------------------------------------------------
// 3. Statistics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cache_reflects_writes() {
    let h = harness();
    let first = sign_in(&h, "code-1").await;
    let second = sign_in(&h, "code-2").await;

    h.service
        .endorse(request(&first, "alpha-beta", "Engineer", "Initech"))
        .await
        .unwrap();
    let before = global(&h.service).await;

    h.service
        .endorse(request(&second, "alpha-beta", "Engineer", "Acme"))
        .await
        .unwrap();
    let after = global(&h.service).await;
    assert_eq!(after.unique_organizations, before.unique_organizations + 1);
    assert_eq!(after.total_endorsements, 2);

    h.service.unendorse(&second, "alpha-beta").await.unwrap();
    let removed = global(&h.service).await;
    assert_eq!(removed.unique_organizations, before.unique_organizations);
    assert_eq!(removed.total_endorsements, 1);

    let metrics = h.service.metrics();
    assert_eq!(metrics.stats_cache_misses.get(), 3);
    global(&h.service).await;
    assert_eq!(metrics.stats_cache_hits.get(), 1);
}

#[tokio::test]
async fn invalid_stats_proposal_reports_zero_without_storage() {
    let h = harness();
    let before = h.kv.operation_count();
    match h.service.stats(Some("alpha beta!")).await.unwrap() {
        StatsSnapshot::Proposal(stats) => {
            assert_eq!(stats.proposal_id, "alpha beta!");
            assert_eq!(stats.total, 0);
        }
        other => panic!("expected proposal stats, got {other:?}"),
    }
    assert_eq!(h.kv.operation_count(), before);
}

#[tokio::test]
async fn blank_stats_proposal_means_global() {
    let h = harness();
    assert!(matches!(
        h.service.stats(Some("")).await.unwrap(),
        StatsSnapshot::Global(_)
    ));
}

// ---------------------------------------------------------------------------
// 4. Failure handling and maintenance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_outage_is_store_unavailable() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;
    h.kv.set_unavailable(true);
    assert!(matches!(
        h.service
            .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
            .await,
        Err(ServiceError::StoreUnavailable(_))
    ));
    assert!(matches!(
        h.service.stats(None).await,
        Err(ServiceError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn retry_after_mid_operation_fault_is_safe() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;

    h.kv.fail_next_cas("count:");
    assert!(matches!(
        h.service
            .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
            .await,
        Err(ServiceError::StoreUnavailable(_))
    ));
    let receipt = h
        .service
        .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
        .await
        .unwrap();
    assert!(receipt.was_new);
    assert_eq!(proposal_total(&h.service, "alpha-beta").await, 1);

    h.kv.fail_next_cas("count:");
    assert!(matches!(
        h.service.unendorse(&token, "alpha-beta").await,
        Err(ServiceError::StoreUnavailable(_))
    ));
    assert!(h.service.unendorse(&token, "alpha-beta").await.unwrap());
    assert_eq!(proposal_total(&h.service, "alpha-beta").await, 0);
    assert!(h.service.reconcile().await.unwrap().is_empty());
}

#[tokio::test]
async fn stats_rebuild_racing_a_write_is_not_served() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;

    let service = h.service.clone();
    let runtime = tokio::runtime::Handle::current();
    h.kv.after_next_list("endorsement:", move || {
        // Runs on the blocking thread serving the rebuild.
        runtime
            .block_on(service.endorse(request(&token, "alpha-beta", "Engineer", "Acme")))
            .unwrap();
    });
    h.service.stats(None).await.unwrap();

    let stats = global(&h.service).await;
    assert_eq!(stats.total_endorsements, 1);
    assert_eq!(stats.unique_organizations, 1);
}

#[tokio::test]
async fn slow_store_times_out() {
    let h = harness_with(NodeConfig {
        store_timeout_ms: 50,
        ..NodeConfig::default()
    });
    h.kv.set_delay(Some(Duration::from_millis(500)));
    let result = h.service.stats(Some("alpha-beta")).await;
    assert!(matches!(result, Err(ServiceError::StoreUnavailable(_))));
    h.kv.set_delay(None);
}

#[tokio::test]
async fn reconcile_and_purge() {
    let h = harness();
    let token = sign_in(&h, "code-1").await;
    h.service
        .endorse(request(&token, "alpha-beta", "Engineer", "Acme"))
        .await
        .unwrap();

    use plaudit_store::KvStore;
    h.kv.put("count:alpha-beta:total", b"7", None).unwrap();
    let drifts = h.service.reconcile().await.unwrap();
    assert_eq!(drifts.len(), 1);
    assert_eq!((drifts[0].recorded, drifts[0].actual), (7, 1));
    assert_eq!(proposal_total(&h.service, "alpha-beta").await, 1);

    h.clock.advance(900);
    assert_eq!(h.service.purge_expired().await.unwrap(), 1);
}

#[tokio::test]
async fn request_outcomes_are_counted() {
    let h = harness();
    let _ = h.service.endorse(request("x", "a b", "", "")).await;
    let text = h.service.metrics().encode().unwrap();
    assert!(text.contains(
        r#"plaudit_requests_total{operation="endorse",outcome="InvalidProposalId"} 1"#
    ));
}

// ---------------------------------------------------------------------------
// 5. LMDB-backed node
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lmdb_node_persists_endorsements() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = NodeConfig {
        data_dir: dir.path().to_path_buf(),
        map_size: 16 * 1024 * 1024,
        ..NodeConfig::default()
    };
    let verifier = Arc::new(NullVerifier::new());
    verifier.accept_code("code-1", ORCID, "Josiah Carberry");

    {
        let mut node = PlauditNode::open(config.clone(), verifier.clone()).unwrap();
        node.start_housekeeping();
        let session = node.service().complete_auth("code-1", REDIRECT).await.unwrap();
        let receipt = node
            .service()
            .endorse(request(
                session.session_token.as_str(),
                "alpha-beta",
                "Engineer",
                "Acme",
            ))
            .await
            .unwrap();
        assert!(receipt.was_new);
        node.stop().await;
    }

    let node = PlauditNode::open(config, verifier).unwrap();
    assert_eq!(proposal_total(node.service(), "alpha-beta").await, 1);
    assert_eq!(global(node.service()).await.unique_organizations, 1);
}
