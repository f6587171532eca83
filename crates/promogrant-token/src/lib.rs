//! # promogrant-token
//!
//! Grant token verification: the first thing every redemption request goes
//! through.
//!
//! 1. [`Envelope`]: parses a JWS (compact or JSON serialization)
//! 2. [`TokenVerifier`]: checks that every signature is EdDSA and that one
//!    verifies against the grant signing key
//! 3. [`decode_grant`]: turns the verified payload into a `Grant`
//!
//! All of it is pure and read-only over the configured key.

pub mod decoder;
pub mod jws;
#[cfg(any(test, feature = "test-helpers"))]
pub mod signer;

pub use decoder::decode_grant;
pub use jws::{Envelope, TokenVerifier};
