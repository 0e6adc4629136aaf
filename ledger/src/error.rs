use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// No live session for the presented token (missing, expired or malformed).
    #[error("session not found")]
    SessionNotFound,

    #[error("token generation failed: {0}")]
    Token(#[from] plaudit_types::TypesError),

    #[error("storage error: {0}")]
    Storage(#[from] plaudit_store::StoreError),
}
