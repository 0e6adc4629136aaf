//! Deterministic stand-ins for the service's outside world.
//!
//! The clock, the key-value store, token randomness and the identity
//! provider are all traits. The types here implement them in memory and let
//! a test script time, failures, latency and sign-in outcomes.

pub mod clock;
pub mod random;
pub mod store;
pub mod verifier;

pub use clock::NullClock;
pub use random::NullRandom;
pub use store::NullKvStore;
pub use verifier::{NullVerifier, ProfileBehavior};
