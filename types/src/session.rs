//! Session tokens and the session record they unlock.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Identity, ProfileHint, Timestamp, TypesError};

/// Number of random bytes behind every session token.
pub const TOKEN_BYTES: usize = 32;

/// An opaque bearer token, 32 random bytes rendered as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn from_bytes(bytes: &[u8; TOKEN_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Accept a token presented by a client. Only the exact canonical shape
    /// is accepted; anything else cannot have been issued by us.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let well_formed = raw.len() == TOKEN_BYTES * 2
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(TypesError::MalformedToken)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials: keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({}…)", &self.0[..8.min(self.0.len())])
    }
}

impl<'de> Deserialize<'de> for SessionToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Source of fresh session tokens.
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> Result<SessionToken, TypesError>;
}

/// Tokens from the operating system's CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn generate(&self) -> Result<SessionToken, TypesError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|e| TypesError::Entropy(e.to_string()))?;
        Ok(SessionToken::from_bytes(&bytes))
    }
}

/// A completed identity verification, valid until its TTL runs out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub identity: Identity,
    #[serde(default)]
    pub profile_hint: ProfileHint,
    pub created_at: Timestamp,
}
