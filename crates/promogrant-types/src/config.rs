//! Process configuration for grant redemption.
//!
//! Loaded once at start-up (normally from the environment) and handed to the
//! redeemer by value. Everything in here is read-only afterwards.

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AltCurrency, GrantError, Result, WalletInfo, constants};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    /// Parse the value of the `ENV` variable. Anything but `production` is
    /// treated as a non-production deployment.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Credentials of the custodial wallet grants are paid out from.
#[derive(Clone)]
pub struct GrantWalletConfig {
    /// Provider account id of the custodial wallet.
    pub card_id: String,
    /// Key used to sign custodial transfers.
    pub signing_key: SigningKey,
}

impl GrantWalletConfig {
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Wallet reference handed to the wallet provider.
    #[must_use]
    pub fn wallet_info(&self) -> WalletInfo {
        WalletInfo {
            provider: constants::GRANT_WALLET_PROVIDER.to_string(),
            provider_id: self.card_id.clone(),
            alt_currency: constants::SUPPORTED_ASSET,
            public_key: Some(hex::encode(self.verifying_key().as_bytes())),
        }
    }
}

impl fmt::Debug for GrantWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantWalletConfig")
            .field("card_id", &self.card_id)
            .field("public_key", &hex::encode(self.verifying_key().as_bytes()))
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Configuration of the redemption service.
#[derive(Debug, Clone)]
pub struct RedemptionConfig {
    /// Address every settlement transaction must pay.
    pub settlement_address: String,
    /// Key grant tokens are verified against.
    pub grant_signator_public_key: VerifyingKey,
    /// Custodial wallet credentials.
    pub grant_wallet: GrantWalletConfig,
    pub environment: Environment,
    /// Refresh wallet balances from the provider. Test harnesses only may
    /// turn this off; production refuses to start without it.
    pub refresh_balance: bool,
    /// Minimum settlement transaction, in probi.
    pub minimum_transaction_probi: Decimal,
}

impl RedemptionConfig {
    /// Configuration with default policy: balance refresh on, 20 BAT minimum,
    /// non-production environment.
    #[must_use]
    pub fn new(
        settlement_address: impl Into<String>,
        grant_signator_public_key: VerifyingKey,
        grant_wallet: GrantWalletConfig,
    ) -> Self {
        Self {
            settlement_address: settlement_address.into(),
            grant_signator_public_key,
            grant_wallet,
            environment: Environment::default(),
            refresh_balance: true,
            minimum_transaction_probi: default_minimum_transaction_probi(),
        }
    }

    /// Load from the process environment.
    ///
    /// See [`constants`] for the recognised variable names.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| GrantError::Configuration(format!("{key} is not set")))
        };

        let settlement_address = require(constants::ENV_SETTLEMENT_ADDRESS)?;
        let grant_signator_public_key = parse_verifying_key(
            constants::ENV_GRANT_SIGNATOR_PUBLIC_KEY,
            &require(constants::ENV_GRANT_SIGNATOR_PUBLIC_KEY)?,
        )?;
        let signing_key = parse_signing_key(
            &require(constants::ENV_GRANT_WALLET_PRIVATE_KEY)?,
            get(constants::ENV_GRANT_WALLET_PUBLIC_KEY).as_deref(),
        )?;
        let grant_wallet = GrantWalletConfig {
            card_id: require(constants::ENV_GRANT_WALLET_CARD_ID)?,
            signing_key,
        };

        let environment = get(constants::ENV_ENVIRONMENT)
            .map(|value| Environment::parse(&value))
            .unwrap_or_default();
        let refresh_balance = match get(constants::ENV_REFRESH_BALANCE) {
            Some(value) => parse_bool(constants::ENV_REFRESH_BALANCE, &value)?,
            None => true,
        };
        let minimum_transaction_probi = match get(constants::ENV_MINIMUM_TRANSACTION_BAT) {
            Some(value) => {
                let bat: Decimal = value.trim().parse().map_err(|e| {
                    GrantError::Configuration(format!(
                        "{}: invalid decimal {value:?}: {e}",
                        constants::ENV_MINIMUM_TRANSACTION_BAT
                    ))
                })?;
                if bat.is_sign_negative() {
                    return Err(GrantError::Configuration(format!(
                        "{} must not be negative",
                        constants::ENV_MINIMUM_TRANSACTION_BAT
                    )));
                }
                AltCurrency::Bat.checked_to_probi(bat).ok_or_else(|| {
                    GrantError::Configuration(format!(
                        "{}: {value:?} is too large",
                        constants::ENV_MINIMUM_TRANSACTION_BAT
                    ))
                })?
            }
            None => default_minimum_transaction_probi(),
        };

        let config = Self {
            settlement_address,
            grant_signator_public_key,
            grant_wallet,
            environment,
            refresh_balance,
            minimum_transaction_probi,
        };
        config.validate()?;
        Ok(config)
    }

    /// Start-up checks.
    ///
    /// # Errors
    /// Returns [`GrantError::Configuration`] if balance refresh is disabled in
    /// production or the settlement address is empty.
    pub fn validate(&self) -> Result<()> {
        if self.environment.is_production() && !self.refresh_balance {
            return Err(GrantError::Configuration(
                "refresh_balance must be true in production".to_string(),
            ));
        }
        if self.settlement_address.trim().is_empty() {
            return Err(GrantError::Configuration(
                "settlement address must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `DEFAULT_MINIMUM_TRANSACTION_BAT` in probi.
#[must_use]
pub fn default_minimum_transaction_probi() -> Decimal {
    AltCurrency::Bat.to_probi(Decimal::from(constants::DEFAULT_MINIMUM_TRANSACTION_BAT))
}

fn decode_hex(key: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim())
        .map_err(|e| GrantError::Configuration(format!("{key}: invalid hex: {e}")))
}

fn parse_verifying_key(key: &str, value: &str) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = decode_hex(key, value)?.try_into().map_err(|b: Vec<u8>| {
        GrantError::Configuration(format!("{key}: expected 32 bytes, got {}", b.len()))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| GrantError::Configuration(format!("{key}: invalid Ed25519 public key: {e}")))
}

/// Accepts a 32-byte seed or a 64-byte `seed || public` keypair.
fn parse_signing_key(private_hex: &str, public_hex: Option<&str>) -> Result<SigningKey> {
    let key = constants::ENV_GRANT_WALLET_PRIVATE_KEY;
    let bytes = decode_hex(key, private_hex)?;
    let signing_key = match bytes.len() {
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            SigningKey::from_bytes(&seed)
        }
        64 => {
            let mut keypair = [0u8; 64];
            keypair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&keypair).map_err(|e| {
                GrantError::Configuration(format!("{key}: inconsistent keypair: {e}"))
            })?
        }
        n => {
            return Err(GrantError::Configuration(format!(
                "{key}: expected 32 or 64 bytes, got {n}"
            )));
        }
    };

    if let Some(public_hex) = public_hex {
        let public = parse_verifying_key(constants::ENV_GRANT_WALLET_PUBLIC_KEY, public_hex)?;
        if public != signing_key.verifying_key() {
            return Err(GrantError::Configuration(format!(
                "{} does not match {key}",
                constants::ENV_GRANT_WALLET_PUBLIC_KEY
            )));
        }
    }
    Ok(signing_key)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(GrantError::Configuration(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}
