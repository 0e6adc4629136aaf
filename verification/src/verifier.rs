//! The identity verifier contract.

use async_trait::async_trait;
use std::fmt;

use plaudit_types::{Identity, IdentityId, ProfileHint};

use crate::VerificationError;

/// Bearer credential returned by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Result of a successful code exchange.
#[derive(Clone, Debug)]
pub struct VerifiedIdentity {
    pub identity: Identity,
    pub access_token: AccessToken,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// URL the user agent is sent to in order to sign in.
    fn authorization_url(&self, redirect_uri: &str, state: &str)
        -> Result<String, VerificationError>;

    /// Trade an authorization code for a verified identity.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<VerifiedIdentity, VerificationError>;

    /// Look up optional profile attributes. Callers treat failure as "no hint".
    async fn fetch_profile(
        &self,
        identity: &IdentityId,
        access_token: &AccessToken,
    ) -> Result<ProfileHint, VerificationError>;

    fn name(&self) -> &'static str;
}
