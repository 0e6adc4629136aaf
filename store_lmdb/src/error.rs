use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt entry at {0}")]
    Corrupt(String),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<LmdbError> for plaudit_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::Corrupt(key) => plaudit_store::StoreError::Corruption(key),
            other => plaudit_store::StoreError::Backend(other.to_string()),
        }
    }
}
