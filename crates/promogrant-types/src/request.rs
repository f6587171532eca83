//! Redemption request, result and stage types.
//!
//! ## Stage machine
//!
//! ```text
//!   Decoding → WalletResolved → TransactionValidated → PreflightChecked
//!            → GrantsSelected → Claimed → Verified
//! ```
//!
//! A request only ever moves forward. Any failure is terminal for the
//! request; once it reaches `Claimed` a retry will observe its own claims.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AltCurrency, TransactionInfo, WalletInfo, constants};

/// A request to redeem grants against a pending settlement transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemGrantsRequest {
    /// Signed grant tokens, in the order the caller supplied them.
    pub grants: Vec<String>,
    /// The wallet that will be funded.
    #[serde(rename = "wallet")]
    pub wallet_info: WalletInfo,
    /// User-signed settlement transaction, opaque to this crate.
    pub transaction: String,
}

impl RedeemGrantsRequest {
    /// SHA-256 fingerprint of the request content.
    ///
    /// Format: `"promogrant:redeem:v1:" || n || (len || grant)* || provider_id || transaction`
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::REQUEST_FINGERPRINT_DOMAIN);
        hasher.update((self.grants.len() as u64).to_le_bytes());
        for grant in &self.grants {
            hasher.update((grant.len() as u64).to_le_bytes());
            hasher.update(grant.as_bytes());
        }
        hasher.update((self.wallet_info.provider_id.len() as u64).to_le_bytes());
        hasher.update(self.wallet_info.provider_id.as_bytes());
        hasher.update(self.transaction.as_bytes());

        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Hex form of [`Self::fingerprint`], for logs.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }
}

/// What a successful verification authorizes: move `probi` of
/// `alt_currency` from the grant wallet to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionResult {
    #[serde(rename = "altcurrency")]
    pub alt_currency: AltCurrency,
    pub probi: Decimal,
    pub destination: String,
}

/// Record of a completed redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub result: RedemptionResult,
    /// Custodial grant wallet → user wallet.
    pub transfer: TransactionInfo,
    /// User wallet → settlement address.
    pub settlement: TransactionInfo,
    /// [`RedeemGrantsRequest::fingerprint`] of the redeemed request.
    pub request_hash: [u8; 32],
    pub completed_at: DateTime<Utc>,
}

/// Progress of a single redemption request. Each stage names the step in
/// progress; a request that fails is reported at the step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RedemptionStage {
    Decoding,
    WalletResolved,
    TransactionValidated,
    PreflightChecked,
    GrantsSelected,
    Claimed,
    Verified,
}

impl RedemptionStage {
    /// The stage that follows this one, or `None` once verified.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Decoding => Some(Self::WalletResolved),
            Self::WalletResolved => Some(Self::TransactionValidated),
            Self::TransactionValidated => Some(Self::PreflightChecked),
            Self::PreflightChecked => Some(Self::GrantsSelected),
            Self::GrantsSelected => Some(Self::Claimed),
            Self::Claimed => Some(Self::Verified),
            Self::Verified => None,
        }
    }

    /// Whether a request that failed at this step may have left claims
    /// behind.
    #[must_use]
    pub fn has_side_effects(self) -> bool {
        self >= Self::Claimed
    }
}

impl fmt::Display for RedemptionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decoding => "DECODING",
            Self::WalletResolved => "WALLET_RESOLVED",
            Self::TransactionValidated => "TRANSACTION_VALIDATED",
            Self::PreflightChecked => "PREFLIGHT_CHECKED",
            Self::GrantsSelected => "GRANTS_SELECTED",
            Self::Claimed => "CLAIMED",
            Self::Verified => "VERIFIED",
        };
        f.write_str(name)
    }
}
