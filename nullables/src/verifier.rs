//! Nullable identity provider: scripted code exchanges without HTTP.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use plaudit_types::{Identity, IdentityId, ProfileHint};
use plaudit_verification::{AccessToken, IdentityVerifier, VerificationError, VerifiedIdentity};

/// What the fake provider should do when a given profile is requested.
#[derive(Clone, Debug)]
pub enum ProfileBehavior {
    Return(ProfileHint),
    Fail,
    /// Sleep before answering, to exercise caller timeouts.
    Stall(Duration),
}

/// A test identity provider.
///
/// Codes registered with [`NullVerifier::accept_code`] exchange for the given
/// identity; every other code is rejected. [`NullVerifier::set_unavailable`]
/// makes exchanges fail as if the provider were down.
pub struct NullVerifier {
    codes: Mutex<HashMap<String, Identity>>,
    profiles: Mutex<HashMap<String, ProfileBehavior>>,
    unavailable: Mutex<bool>,
    exchanges: Mutex<Vec<(String, String)>>,
}

impl NullVerifier {
    pub fn new() -> Self {
        Self {
            codes: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            unavailable: Mutex::new(false),
            exchanges: Mutex::new(Vec::new()),
        }
    }

    /// Register a code that verifies as `identity`.
    pub fn accept_code(&self, code: &str, id: &str, display_name: &str) {
        let identity = Identity::new(
            IdentityId::parse(id).expect("test identity id"),
            display_name,
        );
        self.codes.lock().unwrap().insert(code.to_string(), identity);
    }

    /// Script the profile lookup for `id`. Unscripted ids return an empty hint.
    pub fn set_profile(&self, id: &str, behavior: ProfileBehavior) {
        self.profiles.lock().unwrap().insert(id.to_string(), behavior);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// `(code, redirect_uri)` pairs seen by `exchange_code`, in order.
    pub fn exchanges(&self) -> Vec<(String, String)> {
        self.exchanges.lock().unwrap().clone()
    }
}

impl Default for NullVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityVerifier for NullVerifier {
    fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, VerificationError> {
        Ok(format!(
            "https://idp.invalid/authorize?redirect_uri={redirect_uri}&state={state}"
        ))
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<VerifiedIdentity, VerificationError> {
        self.exchanges
            .lock()
            .unwrap()
            .push((code.to_string(), redirect_uri.to_string()));
        if *self.unavailable.lock().unwrap() {
            return Err(VerificationError::Unavailable("null provider is down".into()));
        }
        let identity = self
            .codes
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| VerificationError::Rejected("unknown code".into()))?;
        Ok(VerifiedIdentity {
            access_token: AccessToken::new(format!("token-for-{}", identity.id)),
            identity,
        })
    }

    async fn fetch_profile(
        &self,
        identity: &IdentityId,
        _access_token: &AccessToken,
    ) -> Result<ProfileHint, VerificationError> {
        let behavior = self.profiles.lock().unwrap().get(identity.as_str()).cloned();
        match behavior {
            None => Ok(ProfileHint::default()),
            Some(ProfileBehavior::Return(hint)) => Ok(hint),
            Some(ProfileBehavior::Fail) => {
                Err(VerificationError::Unavailable("profile lookup failed".into()))
            }
            Some(ProfileBehavior::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(ProfileHint::default())
            }
        }
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
