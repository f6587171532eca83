//! System-wide constants for grant redemption.

use crate::AltCurrency;

/// The only asset grants can be redeemed in.
pub const SUPPORTED_ASSET: AltCurrency = AltCurrency::Bat;

/// The only JWS signature algorithm accepted on grant tokens.
pub const SUPPORTED_JWS_ALGORITHM: &str = "EdDSA";

/// Default minimum settlement transaction, in whole BAT.
///
/// Transactions below `20 BAT` (`20 * 10^18` probi) are refused.
pub const DEFAULT_MINIMUM_TRANSACTION_BAT: i64 = 20;

/// Provider of the custodial grant wallet.
pub const GRANT_WALLET_PROVIDER: &str = "uphold";

/// Domain tag mixed into request fingerprints.
pub const REQUEST_FINGERPRINT_DOMAIN: &[u8] = b"promogrant:redeem:v1:";

// Environment variables read by `RedemptionConfig::from_env`.

pub const ENV_SETTLEMENT_ADDRESS: &str = "BAT_SETTLEMENT_ADDRESS";
pub const ENV_GRANT_SIGNATOR_PUBLIC_KEY: &str = "GRANT_SIGNATOR_PUBLIC_KEY";
pub const ENV_GRANT_WALLET_PUBLIC_KEY: &str = "GRANT_WALLET_PUBLIC_KEY";
pub const ENV_GRANT_WALLET_PRIVATE_KEY: &str = "GRANT_WALLET_PRIVATE_KEY";
pub const ENV_GRANT_WALLET_CARD_ID: &str = "GRANT_WALLET_CARD_ID";
pub const ENV_ENVIRONMENT: &str = "ENV";
pub const ENV_REFRESH_BALANCE: &str = "GRANT_REFRESH_BALANCE";
pub const ENV_MINIMUM_TRANSACTION_BAT: &str = "GRANT_MINIMUM_TRANSACTION_BAT";
