//! Wallet-provider value types.
//!
//! These are the facts this workspace needs from a custodial wallet
//! provider. They are recomputed for every request and never persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AltCurrency;

/// Reference to a user's wallet at a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    /// Provider name (e.g., "uphold").
    pub provider: String,
    /// Externally visible account id at the provider (card id).
    pub provider_id: String,
    /// Asset the account is denominated in.
    #[serde(rename = "altcurrency")]
    pub alt_currency: AltCurrency,
    /// Hex-encoded public key registered for the account, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl WalletInfo {
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        provider_id: impl Into<String>,
        alt_currency: AltCurrency,
    ) -> Self {
        Self {
            provider: provider.into(),
            provider_id: provider_id.into(),
            alt_currency,
            public_key: None,
        }
    }
}

/// Balance of a wallet, in probi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub total_probi: Decimal,
    /// Funds usable for a new outgoing transaction right now.
    pub spendable_probi: Decimal,
    pub confirmed_probi: Decimal,
    pub unconfirmed_probi: Decimal,
}

impl Balance {
    /// A fully confirmed balance of `probi`.
    #[must_use]
    pub fn confirmed(probi: Decimal) -> Self {
        Self {
            total_probi: probi,
            spendable_probi: probi,
            confirmed_probi: probi,
            unconfirmed_probi: Decimal::ZERO,
        }
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::confirmed(Decimal::ZERO)
    }
}

/// Facts about a transaction, as decoded or executed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    /// Provider-assigned id, present once the transaction was executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "altcurrency")]
    pub alt_currency: AltCurrency,
    pub probi: Decimal,
    /// Source account, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Destination account or address.
    pub destination: String,
    /// When the provider executed the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl TransactionInfo {
    /// An unexecuted transaction of `probi` to `destination`.
    #[must_use]
    pub fn new(alt_currency: AltCurrency, probi: Decimal, destination: impl Into<String>) -> Self {
        Self {
            id: None,
            alt_currency,
            probi,
            source: None,
            destination: destination.into(),
            executed_at: None,
        }
    }
}
