//! Fundamental types for the Plaudit endorsement service.
//!
//! This crate defines the types shared across every other crate in the
//! workspace: identities, proposal ids, sessions, endorsement records,
//! statistics snapshots, timestamps and the clock/token abstractions.

pub mod endorsement;
pub mod error;
pub mod identity;
pub mod proposal;
pub mod session;
pub mod stats;
pub mod time;

pub use endorsement::{Endorsement, EndorsementFields};
pub use error::TypesError;
pub use identity::{Employment, Identity, IdentityId, Organization, ProfileHint};
pub use proposal::ProposalId;
pub use session::{OsTokenSource, Session, SessionToken, TokenSource, TOKEN_BYTES};
pub use stats::{GlobalStats, OrganizationCount, ProposalStats, StatsSnapshot};
pub use time::{Clock, SystemClock, Timestamp};
