//! Identity verification boundary.
//!
//! The endorsement core never talks OAuth itself. It asks an
//! [`IdentityVerifier`] for an authorization URL, hands it the code the user
//! comes back with, and gets a verified [`plaudit_types::Identity`] plus a
//! best-effort profile hint. [`OrcidVerifier`] is the production
//! implementation.

pub mod error;
pub mod orcid;
pub mod profile;
pub mod verifier;

pub use error::VerificationError;
pub use orcid::{OrcidConfig, OrcidVerifier};
pub use verifier::{AccessToken, IdentityVerifier, VerifiedIdentity};
