//! Wallet-provider adapter.
//!
//! The orchestrator only needs a handful of facts from a custodial provider:
//! who a wallet is, what it can spend, what a signed transaction says, and
//! whether the provider accepts it. [`WalletError`] keeps the two outcomes
//! the preflight check branches on distinguishable from everything else.

use async_trait::async_trait;
use promogrant_types::{AltCurrency, Balance, GrantWalletConfig, TransactionInfo, WalletInfo};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors reported by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The transaction was not signed by the wallet's registered key.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("wallet not found: {0}")]
    NotFound(String),

    /// Transport or provider outage. Retrying may succeed.
    #[error("wallet provider unavailable: {0}")]
    Unavailable(String),

    /// Any other refusal by the provider.
    #[error("wallet provider rejected request: {0}")]
    Rejected(String),
}

impl WalletError {
    pub fn is_invalid_signature(&self) -> bool {
        matches!(self, Self::InvalidSignature(_))
    }

    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, Self::InsufficientBalance(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Resolves wallet references into live wallet handles.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    type Wallet: Wallet;

    /// Resolve a user's wallet.
    async fn resolve_wallet(&self, info: &WalletInfo) -> Result<Self::Wallet, WalletError>;

    /// Resolve the custodial grant wallet, bound to its signing key so that
    /// [`Wallet::transfer`] can sign.
    async fn resolve_custodial_wallet(
        &self,
        config: &GrantWalletConfig,
    ) -> Result<Self::Wallet, WalletError>;
}

/// A wallet at a provider.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn info(&self) -> &WalletInfo;

    /// Current balance. With `refresh`, the provider is asked for a fresh
    /// value instead of a cached one.
    async fn get_balance(&self, refresh: bool) -> Result<Balance, WalletError>;

    /// Decode a signed transaction without submitting it. The signature is
    /// not checked against the wallet's registered key.
    async fn verify_transaction(&self, signed_tx: &str) -> Result<TransactionInfo, WalletError>;

    /// Submit a signed transaction for execution.
    async fn submit_transaction(&self, signed_tx: &str) -> Result<TransactionInfo, WalletError>;

    /// Move `probi` from this wallet to `destination`. Only meaningful for a
    /// custodial wallet holding its signing key.
    async fn transfer(
        &self,
        alt_currency: AltCurrency,
        probi: Decimal,
        destination: &str,
    ) -> Result<TransactionInfo, WalletError>;
}
