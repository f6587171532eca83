//! Error types for grant redemption.
//!
//! All errors use the `GR_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by the stage that raises them:
//! - 1xx: Token / grant decoding
//! - 2xx: Settlement transaction policy
//! - 3xx: Grant selection
//! - 4xx: Claims (double redemption)
//! - 5xx: Adapter transport
//! - 6xx: Fund movement after verification
//! - 9xx: Configuration / internal

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AltCurrency, GrantId, PromotionId};

/// Central error enum for all redemption operations.
#[derive(Debug, Error)]
pub enum GrantError {
    // =================================================================
    // Decode Errors (1xx)
    // =================================================================
    /// The signed token envelope could not be parsed.
    #[error("GR_ERR_100: Malformed grant token: {reason}")]
    MalformedToken { reason: String },

    /// A signature declared an algorithm other than EdDSA.
    #[error("GR_ERR_101: Unsupported token signature algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// No signature on the token verified against the grant signing key.
    #[error("GR_ERR_102: Grant token signature verification failed")]
    InvalidSignature,

    /// The verified payload is not a valid grant.
    #[error("GR_ERR_103: Malformed grant: {reason}")]
    MalformedGrant { reason: String },

    // =================================================================
    // Policy Errors (2xx)
    // =================================================================
    /// The settlement transaction is not denominated in BAT.
    #[error("GR_ERR_200: Only grants submitted with BAT transactions are supported, got {found}")]
    AssetMismatch { found: AltCurrency },

    /// The settlement transaction is below the configured minimum.
    #[error("GR_ERR_201: Included transactions must be for a minimum of {minimum} probi, got {probi}")]
    BelowMinimum { probi: Decimal, minimum: Decimal },

    /// The wallet's own funds already cover the settlement transaction.
    #[error("GR_ERR_202: Wallet has enough funds to cover transaction: need {transaction}, have {spendable}")]
    NoShortfall {
        transaction: Decimal,
        spendable: Decimal,
    },

    /// The settlement transaction does not pay the settlement address.
    #[error("GR_ERR_203: Included transactions must have settlement as their destination, got {destination}")]
    WrongDestination { destination: String },

    /// The speculative submission moved real funds.
    #[error("GR_ERR_204: An included transaction unexpectedly succeeded")]
    UnexpectedSuccess,

    /// The provider rejected the settlement transaction's signature.
    #[error("GR_ERR_205: The included transaction was signed with the wrong public key")]
    WrongPublicKey,

    /// The provider could not decode or verify the settlement transaction.
    #[error("GR_ERR_206: Invalid settlement transaction: {reason}")]
    ///
    /// `retriable` is set when the provider was unreachable rather than
    /// refusing the transaction.
    InvalidTransaction { reason: String, retriable: bool },

    /// The provider refused the speculative submission for a reason other
    /// than a bad signature or insufficient balance.
    #[error("GR_ERR_207: Wallet provider rejected transaction: {reason}")]
    ProviderRejected { reason: String },

    // =================================================================
    // Selection Errors (3xx)
    // =================================================================
    /// More grants were supplied than needed to cover the shortfall.
    #[error("GR_ERR_300: More grants included than are needed to fulfill included transaction: needed {needed}, reached {reached} before grant {grant_id}")]
    ExcessGrants {
        needed: Decimal,
        reached: Decimal,
        grant_id: GrantId,
    },

    /// A grant is denominated in an asset other than BAT.
    #[error("GR_ERR_301: All grants must be in BAT, grant {grant_id} is {found}")]
    UnsupportedAsset { grant_id: GrantId, found: AltCurrency },

    /// The supplied grants do not cover the shortfall.
    #[error("GR_ERR_302: Grants do not cover the transaction: needed {needed}, total {total}")]
    InsufficientGrants { needed: Decimal, total: Decimal },

    /// The same grant was supplied twice in one request.
    #[error("GR_ERR_303: Grant {0} included more than once")]
    DuplicateGrant(GrantId),

    /// Two grants of one promotion were supplied in one request.
    #[error("GR_ERR_304: More than one grant from promotion {0} included")]
    DuplicatePromotion(PromotionId),

    // =================================================================
    // Claim Errors (4xx)
    // =================================================================
    /// The grant was already redeemed under its promotion.
    #[error("GR_ERR_400: Grant {grant_id} has already been redeemed")]
    AlreadyRedeemed {
        grant_id: GrantId,
        promotion_id: PromotionId,
    },

    /// The wallet was already granted under this promotion.
    #[error("GR_ERR_401: Wallet {wallet} has already redeemed a grant from promotion {promotion_id}")]
    AlreadyRedeemedByWallet {
        wallet: String,
        promotion_id: PromotionId,
    },

    // =================================================================
    // Transport Errors (5xx)
    // =================================================================
    /// The wallet reference could not be resolved at its provider.
    #[error("GR_ERR_500: Wallet resolution failed: {reason}")]
    ///
    /// `retriable` is set when the provider was unreachable rather than
    /// reporting the wallet unknown.
    WalletResolutionFailed { reason: String, retriable: bool },

    /// The wallet provider could not be reached.
    #[error("GR_ERR_501: Wallet provider unavailable: {reason}")]
    WalletUnavailable { reason: String },

    /// The claim store could not be reached.
    ///
    /// `claims_committed` counts claims this request already made permanent
    /// before the failure.
    #[error("GR_ERR_502: Claim store unavailable after {claims_committed} claims: {reason}")]
    ClaimStoreUnavailable {
        reason: String,
        claims_committed: usize,
    },

    /// The request did not complete within its deadline. Outcome unknown.
    #[error("GR_ERR_503: Request did not complete within {limit_ms}ms, outcome unknown")]
    Timeout { limit_ms: u64 },

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// The custodial transfer failed. Claimed grants stay consumed.
    #[error("GR_ERR_600: Grant wallet transfer failed: {reason}")]
    TransferFailed { reason: String },

    /// The settlement submission failed after the custodial transfer.
    #[error("GR_ERR_601: Settlement submission failed: {reason}")]
    SettlementFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("GR_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error (missing or malformed environment values).
    #[error("GR_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification of a [`GrantError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Permanent for the same token input.
    Decode,
    /// Permanent for the same request content.
    Policy,
    /// The caller supplied the wrong grant set.
    Selection,
    /// Authoritative global state: the grant or wallet is already consumed.
    Claim,
    /// An adapter could not be reached.
    Transport,
    /// The request may or may not have taken effect.
    Indeterminate,
    /// Fund movement failed after claims were committed.
    Settlement,
    Configuration,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decode => "DECODE",
            Self::Policy => "POLICY",
            Self::Selection => "SELECTION",
            Self::Claim => "CLAIM",
            Self::Transport => "TRANSPORT",
            Self::Indeterminate => "INDETERMINATE",
            Self::Settlement => "SETTLEMENT",
            Self::Configuration => "CONFIGURATION",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

impl GrantError {
    /// Which class of failure this is.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedToken { .. }
            | Self::UnsupportedAlgorithm { .. }
            | Self::InvalidSignature
            | Self::MalformedGrant { .. } => ErrorCategory::Decode,
            Self::AssetMismatch { .. }
            | Self::BelowMinimum { .. }
            | Self::NoShortfall { .. }
            | Self::WrongDestination { .. }
            | Self::UnexpectedSuccess
            | Self::WrongPublicKey
            | Self::InvalidTransaction { .. }
            | Self::ProviderRejected { .. } => ErrorCategory::Policy,
            Self::ExcessGrants { .. }
            | Self::UnsupportedAsset { .. }
            | Self::InsufficientGrants { .. }
            | Self::DuplicateGrant(_)
            | Self::DuplicatePromotion(_) => ErrorCategory::Selection,
            Self::AlreadyRedeemed { .. } | Self::AlreadyRedeemedByWallet { .. } => {
                ErrorCategory::Claim
            }
            Self::WalletResolutionFailed { .. }
            | Self::WalletUnavailable { .. }
            | Self::ClaimStoreUnavailable { .. } => ErrorCategory::Transport,
            Self::Timeout { .. } => ErrorCategory::Indeterminate,
            Self::TransferFailed { .. } | Self::SettlementFailed { .. } => {
                ErrorCategory::Settlement
            }
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the caller may safely retry the whole request.
    ///
    /// Only failures to reach an adapter that happened before any claim was
    /// committed qualify.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ClaimStoreUnavailable {
                claims_committed, ..
            } => *claims_committed == 0,
            Self::WalletResolutionFailed { retriable, .. }
            | Self::InvalidTransaction { retriable, .. } => *retriable,
            other => other.category() == ErrorCategory::Transport,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, GrantError>;
