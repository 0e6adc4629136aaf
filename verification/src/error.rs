use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    /// The provider rejected the authorization code (bad, expired, reused).
    #[error("identity provider rejected the authorization code: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered with a server error.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered, but not with anything we can use.
    #[error("unexpected identity provider response: {0}")]
    InvalidResponse(String),

    #[error("invalid verifier configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for VerificationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            VerificationError::InvalidResponse(e.to_string())
        } else if e.is_builder() {
            VerificationError::Config(e.to_string())
        } else {
            VerificationError::Unavailable(e.to_string())
        }
    }
}
