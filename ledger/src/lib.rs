//! Endorsement core for Plaudit.
//!
//! Four stores over one key-value handle:
//! - [`SessionStore`]: credentials issued after identity verification
//! - [`EndorsementStore`]: one record per (proposal, identity)
//! - [`CounterLedger`]: per-proposal totals kept in step with the records
//! - [`StatsCache`]: cached global aggregates
//!
//! [`Ledger`] coordinates them.

mod codec;
pub mod counter;
pub mod endorsement;
pub mod error;
pub mod ledger;
pub mod session;
pub mod stats;

pub use counter::{CounterDrift, CounterLedger, CAS_ATTEMPTS};
pub use endorsement::{EndorsementStore, UpsertOutcome};
pub use error::LedgerError;
pub use ledger::{EndorseOutcome, Ledger, LedgerConfig};
pub use session::SessionStore;
pub use stats::{summarize, StatsCache, StatsLookup};
