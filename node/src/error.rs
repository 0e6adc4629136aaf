use thiserror::Error;

use plaudit_ledger::LedgerError;
use plaudit_store::StoreError;
use plaudit_verification::VerificationError;

/// Startup and wiring failures.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a service operation, one variant per caller-visible kind.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid proposal id: {0:?}")]
    InvalidProposalId(String),

    #[error("invalid or expired session")]
    Unauthenticated,

    #[error("identity verification failed: {0}")]
    VerificationFailed(String),

    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable name, used in response bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::MissingFields(_) => "MissingFields",
            Self::InvalidProposalId(_) => "InvalidProposalId",
            Self::Unauthenticated => "Unauthenticated",
            Self::VerificationFailed(_) => "VerificationFailed",
            Self::UpstreamUnavailable(_) => "UpstreamUnavailable",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::SessionNotFound => Self::Unauthenticated,
            LedgerError::Storage(StoreError::Backend(msg)) => Self::StoreUnavailable(msg),
            LedgerError::Storage(e @ StoreError::Contention { .. }) => {
                Self::StoreUnavailable(e.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<VerificationError> for ServiceError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Rejected(msg) => Self::VerificationFailed(msg),
            VerificationError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
            VerificationError::InvalidResponse(msg) => {
                Self::UpstreamUnavailable(format!("unexpected response: {msg}"))
            }
            VerificationError::Config(msg) => Self::Internal(msg),
        }
    }
}
