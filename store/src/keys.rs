//! Storage key layout.
//!
//! | Key | Value |
//! |---|---|
//! | `session:{token}` | session JSON, expires with the session TTL |
//! | `endorsement:{proposal}:{identity}` | endorsement JSON |
//! | `count:{proposal}:total` | ASCII decimal |
//! | `cache:stats` | global stats JSON and its generation, expires with the cache TTL |
//! | `cache:stats:generation` | ASCII decimal, bumped on invalidation |
//!
//! Proposal ids cannot contain `:`, so the first separator after the
//! `endorsement:` prefix always splits proposal from identity.

use plaudit_types::{IdentityId, ProposalId, SessionToken};

pub const SESSION_PREFIX: &str = "session:";
pub const ENDORSEMENT_PREFIX: &str = "endorsement:";
pub const COUNT_PREFIX: &str = "count:";
pub const COUNT_SUFFIX: &str = ":total";
pub const STATS_CACHE_KEY: &str = "cache:stats";
/// Bumped on every invalidation; a cached snapshot is only valid for the
/// generation it was built under.
pub const STATS_GENERATION_KEY: &str = "cache:stats:generation";

pub fn session(token: &SessionToken) -> String {
    format!("{SESSION_PREFIX}{}", token.as_str())
}

pub fn endorsement(proposal: &ProposalId, identity: &IdentityId) -> String {
    format!("{ENDORSEMENT_PREFIX}{}:{}", proposal.as_str(), identity.as_str())
}

pub fn count(proposal: &ProposalId) -> String {
    format!("{COUNT_PREFIX}{}{COUNT_SUFFIX}", proposal.as_str())
}

/// Split an endorsement key into its raw `(proposal, identity)` parts.
pub fn parse_endorsement(key: &str) -> Option<(&str, &str)> {
    key.strip_prefix(ENDORSEMENT_PREFIX)?.split_once(':')
}

/// Extract the raw proposal id from a counter key.
pub fn parse_count(key: &str) -> Option<&str> {
    key.strip_prefix(COUNT_PREFIX)?.strip_suffix(COUNT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> ProposalId {
        ProposalId::parse("alpha-beta").unwrap()
    }

    #[test]
    fn endorsement_key_round_trips() {
        let identity = IdentityId::parse("0000-0002-1825-0097").unwrap();
        let key = endorsement(&proposal(), &identity);
        assert_eq!(key, "endorsement:alpha-beta:0000-0002-1825-0097");
        assert_eq!(
            parse_endorsement(&key),
            Some(("alpha-beta", "0000-0002-1825-0097"))
        );
    }

    #[test]
    fn identity_may_contain_separator() {
        let identity = IdentityId::parse("urn:orcid:1").unwrap();
        let key = endorsement(&proposal(), &identity);
        assert_eq!(parse_endorsement(&key), Some(("alpha-beta", "urn:orcid:1")));
    }

    #[test]
    fn count_key_round_trips() {
        let key = count(&proposal());
        assert_eq!(key, "count:alpha-beta:total");
        assert_eq!(parse_count(&key), Some("alpha-beta"));
        assert_eq!(parse_count("count:alpha-beta"), None);
        assert_eq!(parse_count("session:abc"), None);
    }
}
