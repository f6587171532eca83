//! Identifiers carried inside signed grants.
//!
//! Both identifiers are UUIDs minted by the grant issuer. They are opaque to
//! this crate: ordering is only used to break ties deterministically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// GrantId
// ---------------------------------------------------------------------------

/// Unique identifier of a single grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct GrantId(pub Uuid);

impl GrantId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GrantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// PromotionId
// ---------------------------------------------------------------------------

/// Identifier of the campaign a grant was issued under.
///
/// Scope of both double-redemption invariants: a grant and a wallet are each
/// claimed at most once per promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PromotionId(pub Uuid);

impl PromotionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Name of the claim set recording which grants were redeemed.
    #[must_use]
    pub fn grants_claim_key(&self) -> String {
        format!("promotion:{}:grants", self.0)
    }

    /// Name of the claim set recording which wallets were granted.
    #[must_use]
    pub fn wallets_claim_key(&self) -> String {
        format!("promotion:{}:wallets", self.0)
    }
}

impl Default for PromotionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PromotionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PromotionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
