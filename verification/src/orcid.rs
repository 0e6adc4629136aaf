//! ORCID OAuth client.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use plaudit_types::{Identity, IdentityId, ProfileHint};

use crate::profile::hint_from_employments;
use crate::verifier::{AccessToken, IdentityVerifier, VerifiedIdentity};
use crate::VerificationError;

/// Connection settings for the ORCID provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct OrcidConfig {
    #[serde(default)]
    pub client_id: String,

    /// Never written back out when a config is serialized.
    #[serde(default, skip_serializing)]
    pub client_secret: String,

    /// Base of the OAuth endpoints (`/oauth/authorize`, `/oauth/token`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base of the record API (`/{orcid}/employments`).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_base_url() -> String {
    "https://orcid.org".to_string()
}

fn default_api_url() -> String {
    "https://pub.orcid.org/v3.0".to_string()
}

fn default_scope() -> String {
    "/authenticate /read-limited".to_string()
}

impl Default for OrcidConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base_url: default_base_url(),
            api_url: default_api_url(),
            scope: default_scope(),
        }
    }
}

impl fmt::Debug for OrcidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrcidConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("api_url", &self.api_url)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    orcid: String,
    #[serde(default)]
    name: Option<String>,
}

pub struct OrcidVerifier {
    config: OrcidConfig,
    http: reqwest::Client,
}

impl OrcidVerifier {
    /// Build a verifier whose every HTTP call is bounded by `timeout`.
    pub fn new(config: OrcidConfig, timeout: Duration) -> Result<Self, VerificationError> {
        if config.client_id.is_empty() {
            return Err(VerificationError::Config("ORCID client id is not set".into()));
        }
        Url::parse(&config.base_url)
            .map_err(|e| VerificationError::Config(format!("base_url: {e}")))?;
        Url::parse(&config.api_url)
            .map_err(|e| VerificationError::Config(format!("api_url: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("plaudit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VerificationError::Config(e.to_string()))?;

        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl IdentityVerifier for OrcidVerifier {
    fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, VerificationError> {
        let url = Url::parse_with_params(
            &self.endpoint("oauth/authorize"),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("scope", self.config.scope.as_str()),
                ("redirect_uri", redirect_uri),
                ("state", state),
            ],
        )
        .map_err(|e| VerificationError::Config(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<VerifiedIdentity, VerificationError> {
        let response = self
            .http
            .post(self.endpoint("oauth/token"))
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %body, "token exchange rejected");
            return Err(VerificationError::Rejected(status.to_string()));
        }
        if !status.is_success() {
            warn!(%status, "token endpoint failed");
            return Err(VerificationError::Unavailable(status.to_string()));
        }

        let token: TokenResponse = response.json().await?;
        let id = IdentityId::parse(token.orcid)
            .map_err(|e| VerificationError::InvalidResponse(e.to_string()))?;
        let display_name = token
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.to_string());

        Ok(VerifiedIdentity {
            identity: Identity::new(id, display_name),
            access_token: AccessToken::new(token.access_token),
        })
    }

    async fn fetch_profile(
        &self,
        identity: &IdentityId,
        access_token: &AccessToken,
    ) -> Result<ProfileHint, VerificationError> {
        let url = format!(
            "{}/{}/employments",
            self.config.api_url.trim_end_matches('/'),
            identity.as_str()
        );
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token.as_str())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            status if status.is_client_error() => {
                return Err(VerificationError::Rejected(status.to_string()))
            }
            status => return Err(VerificationError::Unavailable(status.to_string())),
        }

        let doc: serde_json::Value = response.json().await?;
        Ok(hint_from_employments(&doc))
    }

    fn name(&self) -> &'static str {
        "orcid"
    }
}
