//! Shared fixture for the redemption integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use ed25519_dalek::SigningKey;
use promogrant_redeem::Redeemer;
use promogrant_redeem::memory::{MemoryClaimStore, MemoryWalletProvider};
use promogrant_token::signer::sign_grant;
use promogrant_types::{
    AltCurrency, Grant, GrantWalletConfig, PromotionId, RedeemGrantsRequest, RedemptionConfig,
    WalletInfo,
};
use rand::rngs::OsRng;
use rust_decimal::Decimal;

pub const SETTLEMENT: &str = "settlement-address";
pub const GRANT_CARD: &str = "grant-card";
pub const USER_CARD: &str = "user-card";
pub const GRANT_WALLET_FUNDS: i64 = 1_000;

pub type MemoryRedeemer = Redeemer<MemoryWalletProvider, MemoryClaimStore>;

pub fn bat(units: i64) -> Decimal {
    AltCurrency::Bat.to_probi(Decimal::from(units))
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("promogrant_redeem=debug")
            .with_test_writer()
            .try_init();
    });
}

/// A redeemer over in-memory adapters, with a funded grant wallet, an empty
/// settlement account and one empty user wallet.
pub struct Harness {
    pub issuer: SigningKey,
    pub user_key: SigningKey,
    pub provider: MemoryWalletProvider,
    pub claims: MemoryClaimStore,
    pub redeemer: Arc<MemoryRedeemer>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut RedemptionConfig)) -> Self {
        init_tracing();
        let issuer = SigningKey::generate(&mut OsRng);
        let user_key = SigningKey::generate(&mut OsRng);
        let provider = MemoryWalletProvider::new();
        let claims = MemoryClaimStore::new();

        provider.open_account(GRANT_CARD, None, bat(GRANT_WALLET_FUNDS));
        provider.open_account(USER_CARD, Some(user_key.verifying_key()), Decimal::ZERO);
        provider.open_account(SETTLEMENT, None, Decimal::ZERO);

        let mut config = RedemptionConfig::new(
            SETTLEMENT,
            issuer.verifying_key(),
            GrantWalletConfig {
                card_id: GRANT_CARD.to_string(),
                signing_key: SigningKey::generate(&mut OsRng),
            },
        );
        tweak(&mut config);

        let redeemer = Redeemer::new(config, provider.clone(), claims.clone())
            .await
            .expect("redeemer starts");

        Self {
            issuer,
            user_key,
            provider,
            claims,
            redeemer: Arc::new(redeemer),
        }
    }

    /// Open another user wallet with zero balance.
    pub fn open_user(&self, card: &str) -> SigningKey {
        let key = SigningKey::generate(&mut OsRng);
        self.provider
            .open_account(card, Some(key.verifying_key()), Decimal::ZERO);
        key
    }

    /// A signed grant worth `units` BAT under a fresh promotion.
    pub fn grant(&self, units: i64) -> (Grant, String) {
        self.grant_in(units, PromotionId::new())
    }

    pub fn grant_in(&self, units: i64, promotion: PromotionId) -> (Grant, String) {
        let grant = Grant::dummy(units, promotion);
        let token = sign_grant(&self.issuer, &grant);
        (grant, token)
    }

    /// A settlement transaction of `units` BAT signed by `key`.
    pub fn transaction(&self, key: &SigningKey, units: i64, destination: &str) -> String {
        MemoryWalletProvider::sign_transaction(key, AltCurrency::Bat, bat(units), destination)
            .expect("transaction signs")
    }

    /// The user wallet pays `units` BAT to the settlement address.
    pub fn settlement_tx(&self, units: i64) -> String {
        self.transaction(&self.user_key, units, SETTLEMENT)
    }

    pub fn request(&self, grants: Vec<String>, transaction: String) -> RedeemGrantsRequest {
        self.request_for(USER_CARD, grants, transaction)
    }

    pub fn request_for(
        &self,
        card: &str,
        grants: Vec<String>,
        transaction: String,
    ) -> RedeemGrantsRequest {
        RedeemGrantsRequest {
            grants,
            wallet_info: WalletInfo::new("uphold", card, AltCurrency::Bat),
            transaction,
        }
    }
}
