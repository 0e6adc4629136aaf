//! Nullable random: deterministic session tokens.

use plaudit_types::{SessionToken, TokenSource, TypesError, TOKEN_BYTES};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out predictable tokens: the big-endian sequence number repeated
/// to fill the token width.
pub struct NullRandom {
    next: AtomicU64,
}

impl NullRandom {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// The token that the `n`-th call (sequence number `n`) returns.
    pub fn token_for(n: u64) -> SessionToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        for chunk in bytes.chunks_mut(8) {
            chunk.copy_from_slice(&n.to_be_bytes());
        }
        SessionToken::from_bytes(&bytes)
    }
}

impl Default for NullRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for NullRandom {
    fn generate(&self) -> Result<SessionToken, TypesError> {
        Ok(Self::token_for(self.next.fetch_add(1, Ordering::SeqCst)))
    }
}
