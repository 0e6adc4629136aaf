//! Validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid proposal id: {0:?}")]
    InvalidProposalId(String),

    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("malformed session token")]
    MalformedToken,

    #[error("entropy source failed: {0}")]
    Entropy(String),
}
