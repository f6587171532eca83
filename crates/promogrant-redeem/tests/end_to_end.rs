//! End-to-end redemption tests over the in-memory adapters.
//!
//! Each test drives a full request through token verification, wallet
//! checks, selection and claiming, and asserts both the outcome and what
//! was (or was not) left behind in the claim store and the ledger.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use common::{GRANT_CARD, GRANT_WALLET_FUNDS, Harness, SETTLEMENT, USER_CARD, bat};
use ed25519_dalek::SigningKey;
use promogrant_redeem::memory::{MemoryClaimStore, MemoryWallet, MemoryWalletProvider};
use promogrant_redeem::{ClaimSet, ClaimStore, Redeemer, WalletError, WalletProvider};
use promogrant_token::signer::sign_grant;
use promogrant_types::{
    AltCurrency, Environment, ErrorCategory, Grant, GrantError, GrantWalletConfig, PromotionId,
    RedemptionConfig, WalletInfo,
};
use rand::rngs::OsRng;
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Successful verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_grant_covers_shortfall() {
    let h = Harness::new().await;
    let (grant, token) = h.grant(25);
    let request = h.request(vec![token], h.settlement_tx(25));

    let result = h.redeemer.verify(&request).await.unwrap();

    assert_eq!(result.alt_currency, AltCurrency::Bat);
    assert_eq!(result.probi, bat(25));
    assert_eq!(result.destination, USER_CARD);
    assert_eq!(
        h.claims.members(&grant.promotion_id.grants_claim_key()),
        vec![grant.grant_id.to_string()]
    );
    assert_eq!(
        h.claims.members(&grant.promotion_id.wallets_claim_key()),
        vec![USER_CARD.to_string()]
    );
    assert_eq!(h.claims.open_handles(), 0);
}

#[tokio::test]
async fn last_grant_may_overshoot() {
    let h = Harness::new().await;
    let (_, a) = h.grant(15);
    let (_, b) = h.grant(15);
    let request = h.request(vec![a, b], h.settlement_tx(25));

    let result = h.redeemer.verify(&request).await.unwrap();
    assert_eq!(result.probi, bat(30));
    assert_eq!(h.claims.total_claims(), 4);
}

#[tokio::test]
async fn spendable_balance_reduces_shortfall() {
    let h = Harness::new().await;
    h.provider
        .open_account(USER_CARD, Some(h.user_key.verifying_key()), bat(10));
    let (_, token) = h.grant(15);
    let request = h.request(vec![token], h.settlement_tx(25));

    let result = h.redeemer.verify(&request).await.unwrap();
    assert_eq!(result.probi, bat(15));
}

#[tokio::test]
async fn verify_does_not_move_funds() {
    let h = Harness::new().await;
    let (_, token) = h.grant(25);
    h.redeemer
        .verify(&h.request(vec![token], h.settlement_tx(25)))
        .await
        .unwrap();

    assert_eq!(h.provider.balance_of(USER_CARD), Some(Decimal::ZERO));
    assert_eq!(h.provider.balance_of(SETTLEMENT), Some(Decimal::ZERO));
    assert!(h.provider.settlements().is_empty());
    assert!(h.provider.transfers().is_empty());
}

// ---------------------------------------------------------------------------
// Rejections before any claim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn surplus_grant_rejected_without_claims() {
    let h = Harness::new().await;
    let tokens = vec![h.grant(15).1, h.grant(15).1, h.grant(5).1];
    let request = h.request(tokens, h.settlement_tx(25));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(matches!(err, GrantError::ExcessGrants { .. }), "{err:?}");
    assert_eq!(h.claims.total_claims(), 0);
}

#[tokio::test]
async fn duplicate_promotion_rejected_without_claims() {
    let h = Harness::new().await;
    let promotion = PromotionId::new();
    let tokens = vec![h.grant_in(15, promotion).1, h.grant_in(15, promotion).1];
    let request = h.request(tokens, h.settlement_tx(25));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::DuplicatePromotion(id) if id == promotion),
        "{err:?}"
    );
    assert_eq!(h.claims.total_claims(), 0);
}

#[tokio::test]
async fn insufficient_grants_rejected_without_claims() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(10).1], h.settlement_tx(25));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::InsufficientGrants { needed, total }
            if needed == bat(25) && total == bat(10)),
        "{err:?}"
    );
    assert_eq!(h.claims.total_claims(), 0);
}

#[tokio::test]
async fn negative_balance_rejected() {
    let h = Harness::with_config(|config| config.minimum_transaction_probi = Decimal::ZERO).await;
    h.provider
        .open_account(USER_CARD, Some(h.user_key.verifying_key()), -bat(1));
    let tx =
        MemoryWalletProvider::sign_transaction(&h.user_key, AltCurrency::Bat, Decimal::MAX, SETTLEMENT)
            .unwrap();
    let request = h.request(vec![h.grant(25).1], tx);

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(&err, GrantError::ProviderRejected { reason } if reason.contains("negative")),
        "{err:?}"
    );
    assert_eq!(h.claims.total_claims(), 0);
    assert!(h.provider.settlements().is_empty());
}

#[tokio::test]
async fn funded_wallet_needs_no_grants() {
    let h = Harness::new().await;
    h.provider
        .open_account(USER_CARD, Some(h.user_key.verifying_key()), bat(30));
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::NoShortfall { transaction, spendable }
            if transaction == bat(25) && spendable == bat(30)),
        "{err:?}"
    );
}

#[tokio::test]
async fn wrong_destination_leaves_no_side_effects() {
    let h = Harness::new().await;
    let tx = h.transaction(&h.user_key, 25, "somewhere-else");
    let request = h.request(vec![h.grant(25).1], tx);

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(&err, GrantError::WrongDestination { destination } if destination == "somewhere-else"),
        "{err:?}"
    );
    assert_eq!(h.claims.total_claims(), 0);
    assert!(h.provider.settlements().is_empty());
}

#[tokio::test]
async fn small_transaction_below_minimum() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(10).1], h.settlement_tx(10));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::BelowMinimum { probi, minimum }
            if probi == bat(10) && minimum == bat(20)),
        "{err:?}"
    );
}

#[tokio::test]
async fn minimum_is_configurable() {
    let h = Harness::with_config(|config| config.minimum_transaction_probi = bat(5)).await;
    let request = h.request(vec![h.grant(10).1], h.settlement_tx(10));

    let result = h.redeemer.verify(&request).await.unwrap();
    assert_eq!(result.probi, bat(10));
}

#[tokio::test]
async fn non_bat_transaction_rejected() {
    let h = Harness::new().await;
    let tx = MemoryWalletProvider::sign_transaction(&h.user_key, AltCurrency::Eth, bat(25), SETTLEMENT)
        .unwrap();
    let request = h.request(vec![h.grant(25).1], tx);

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::AssetMismatch { found: AltCurrency::Eth }),
        "{err:?}"
    );
}

#[tokio::test]
async fn transaction_signed_by_another_key() {
    let h = Harness::new().await;
    let stranger = SigningKey::generate(&mut OsRng);
    let request = h.request(vec![h.grant(25).1], h.transaction(&stranger, 25, SETTLEMENT));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(matches!(err, GrantError::WrongPublicKey), "{err:?}");
    assert_eq!(h.claims.total_claims(), 0);
}

#[tokio::test]
async fn speculative_submission_that_succeeds() {
    // Balance equals the transaction: no shortfall refusal, but the
    // preflight submission goes through.
    let h = Harness::new().await;
    h.provider
        .open_account(USER_CARD, Some(h.user_key.verifying_key()), bat(25));
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(matches!(err, GrantError::UnexpectedSuccess), "{err:?}");
    assert_eq!(h.claims.total_claims(), 0);
}

#[tokio::test]
async fn malformed_transaction_rejected() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(25).1], "not a transaction".to_string());

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(matches!(err, GrantError::InvalidTransaction { .. }), "{err:?}");
}

#[tokio::test]
async fn grant_from_unknown_issuer_rejected() {
    let h = Harness::new().await;
    let impostor = SigningKey::generate(&mut OsRng);
    let token = sign_grant(&impostor, &Grant::dummy(25, PromotionId::new()));
    let request = h.request(vec![token], h.settlement_tx(25));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(matches!(err, GrantError::InvalidSignature), "{err:?}");
    assert_eq!(err.category(), ErrorCategory::Decode);
    assert_eq!(h.claims.total_claims(), 0);
}

#[tokio::test]
async fn unknown_wallet_fails_resolution() {
    let h = Harness::new().await;
    let request = h.request_for("nobody", vec![h.grant(25).1], h.settlement_tx(25));

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::WalletResolutionFailed { retriable: false, .. }),
        "{err:?}"
    );
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn provider_outage_is_retriable() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));
    h.provider.set_unavailable(true);

    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::WalletResolutionFailed { retriable: true, .. }),
        "{err:?}"
    );
    assert!(err.is_retriable());

    h.provider.set_unavailable(false);
    assert!(h.redeemer.verify(&request).await.is_ok());
}

// ---------------------------------------------------------------------------
// Double redemption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claim_queries_follow_redemptions() {
    let h = Harness::new().await;
    let promotion = PromotionId::new();
    let (grant, token) = h.grant_in(25, promotion);

    assert!(!h.redeemer.is_grant_redeemed(grant.grant_id, promotion).await.unwrap());
    assert!(!h.redeemer.has_wallet_redeemed(USER_CARD, promotion).await.unwrap());
    assert_eq!(h.redeemer.redeemed_grant_count(promotion).await.unwrap(), 0);

    h.redeemer
        .verify(&h.request(vec![token], h.settlement_tx(25)))
        .await
        .unwrap();

    assert!(h.redeemer.is_grant_redeemed(grant.grant_id, promotion).await.unwrap());
    assert!(h.redeemer.has_wallet_redeemed(USER_CARD, promotion).await.unwrap());
    assert!(!h.redeemer.has_wallet_redeemed("other-card", promotion).await.unwrap());
    assert_eq!(h.redeemer.redeemed_grant_count(promotion).await.unwrap(), 1);
    assert_eq!(h.claims.open_handles(), 0);
}

#[tokio::test]
async fn grant_cannot_be_redeemed_twice() {
    let h = Harness::new().await;
    let (grant, token) = h.grant(25);
    h.redeemer
        .verify(&h.request(vec![token.clone()], h.settlement_tx(25)))
        .await
        .unwrap();

    let other_key = h.open_user("other-card");
    let replay = h.request_for(
        "other-card",
        vec![token],
        h.transaction(&other_key, 25, SETTLEMENT),
    );
    let err = h.redeemer.verify(&replay).await.unwrap_err();
    assert!(
        matches!(err, GrantError::AlreadyRedeemed { grant_id, promotion_id }
            if grant_id == grant.grant_id && promotion_id == grant.promotion_id),
        "{err:?}"
    );
    assert_eq!(
        h.claims.members(&grant.promotion_id.wallets_claim_key()),
        vec![USER_CARD.to_string()]
    );
}

#[tokio::test]
async fn wallet_funded_once_per_promotion() {
    let h = Harness::new().await;
    let promotion = PromotionId::new();
    let (_, first) = h.grant_in(25, promotion);
    let (second_grant, second) = h.grant_in(25, promotion);

    h.redeemer
        .verify(&h.request(vec![first], h.settlement_tx(25)))
        .await
        .unwrap();
    let err = h
        .redeemer
        .verify(&h.request(vec![second], h.settlement_tx(25)))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, GrantError::AlreadyRedeemedByWallet { wallet, promotion_id }
            if wallet == USER_CARD && *promotion_id == promotion),
        "{err:?}"
    );
    // The losing grant was claimed before the wallet check and stays consumed.
    assert!(
        h.claims
            .members(&promotion.grants_claim_key())
            .contains(&second_grant.grant_id.to_string())
    );
}

#[tokio::test]
async fn earlier_claims_survive_a_later_failure() {
    let h = Harness::new().await;
    let (first, first_token) = h.grant(16);
    let (second, second_token) = h.grant(15);

    // Someone else already holds the second grant.
    let mut taken = h
        .claims
        .acquire(&second.promotion_id.grants_claim_key())
        .await
        .unwrap();
    assert!(taken.add(&second.grant_id.to_string()).await.unwrap());
    drop(taken);

    let request = h.request(vec![second_token, first_token], h.settlement_tx(25));
    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::AlreadyRedeemed { grant_id, .. } if grant_id == second.grant_id),
        "{err:?}"
    );

    // No compensation: the first grant and the wallet stay claimed.
    assert_eq!(
        h.claims.members(&first.promotion_id.grants_claim_key()),
        vec![first.grant_id.to_string()]
    );
    assert_eq!(
        h.claims.members(&first.promotion_id.wallets_claim_key()),
        vec![USER_CARD.to_string()]
    );

    // A retry of the same request now trips over its own claim.
    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::AlreadyRedeemed { grant_id, .. } if grant_id == first.grant_id),
        "{err:?}"
    );
}

#[tokio::test]
async fn claim_store_outage_reports_committed_claims() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(16).1, h.grant(15).1], h.settlement_tx(25));

    h.claims.fail_after(2);
    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::ClaimStoreUnavailable { claims_committed: 2, .. }),
        "{err:?}"
    );
    assert!(!err.is_retriable());
    assert_eq!(h.claims.open_handles(), 0);
}

#[tokio::test]
async fn claim_store_outage_before_claims_is_retriable() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));

    h.claims.set_offline(true);
    let err = h.redeemer.verify(&request).await.unwrap_err();
    assert!(
        matches!(err, GrantError::ClaimStoreUnavailable { claims_committed: 0, .. }),
        "{err:?}"
    );
    assert!(err.is_retriable());

    h.claims.set_offline(false);
    assert_eq!(h.redeemer.verify(&request).await.unwrap().probi, bat(25));
}

// ---------------------------------------------------------------------------
// Redeem
// ---------------------------------------------------------------------------

#[tokio::test]
async fn redeem_moves_funds_and_settles_once() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(15).1, h.grant(15).1], h.settlement_tx(25));

    let receipt = h.redeemer.redeem(&request).await.unwrap();

    assert_eq!(receipt.result.probi, bat(30));
    assert_eq!(receipt.request_hash, request.fingerprint());
    assert_eq!(receipt.transfer.source.as_deref(), Some(GRANT_CARD));
    assert_eq!(receipt.transfer.destination, USER_CARD);
    assert_eq!(receipt.settlement.destination, SETTLEMENT);

    assert_eq!(h.provider.transfers().len(), 1);
    assert_eq!(h.provider.settlements().len(), 1);
    assert_eq!(
        h.provider.balance_of(GRANT_CARD),
        Some(bat(GRANT_WALLET_FUNDS - 30))
    );
    assert_eq!(h.provider.balance_of(USER_CARD), Some(bat(5)));
    assert_eq!(h.provider.balance_of(SETTLEMENT), Some(bat(25)));
}

#[tokio::test]
async fn redeem_twice_fails_second_time() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));

    h.redeemer.redeem(&request).await.unwrap();
    let err = h.redeemer.redeem(&request).await.unwrap_err();

    assert!(matches!(err, GrantError::AlreadyRedeemed { .. }), "{err:?}");
    assert_eq!(h.provider.transfers().len(), 1);
    assert_eq!(h.provider.settlements().len(), 1);
}

#[tokio::test]
async fn failed_transfer_keeps_grants_consumed() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));
    h.provider.set_reject_transfers(true);

    let err = h.redeemer.redeem(&request).await.unwrap_err();
    assert!(matches!(err, GrantError::TransferFailed { .. }), "{err:?}");
    assert_eq!(err.category(), ErrorCategory::Settlement);
    assert_eq!(h.claims.total_claims(), 2);
    assert!(h.provider.settlements().is_empty());
    assert_eq!(h.provider.balance_of(GRANT_CARD), Some(bat(GRANT_WALLET_FUNDS)));
}

#[tokio::test]
async fn settlement_can_be_resubmitted_alone() {
    let h = Harness::new().await;
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));

    // Unfunded wallet: the submission fails.
    let err = h.redeemer.submit_settlement(&request).await.unwrap_err();
    assert!(matches!(err, GrantError::SettlementFailed { .. }), "{err:?}");

    h.provider
        .open_account(USER_CARD, Some(h.user_key.verifying_key()), bat(25));
    let settled = h.redeemer.submit_settlement(&request).await.unwrap();

    assert_eq!(settled.probi, bat(25));
    assert_eq!(h.provider.balance_of(SETTLEMENT), Some(bat(25)));
    assert_eq!(h.claims.total_claims(), 0);
}

// ---------------------------------------------------------------------------
// Configuration and timeouts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn production_refuses_stale_balances() {
    let provider = MemoryWalletProvider::new();
    provider.open_account(GRANT_CARD, None, bat(GRANT_WALLET_FUNDS));
    let mut config = RedemptionConfig::new(
        SETTLEMENT,
        SigningKey::generate(&mut OsRng).verifying_key(),
        GrantWalletConfig {
            card_id: GRANT_CARD.to_string(),
            signing_key: SigningKey::generate(&mut OsRng),
        },
    );
    config.environment = Environment::Production;
    config.refresh_balance = false;

    let result = Redeemer::new(config, provider, MemoryClaimStore::new()).await;
    assert!(matches!(result, Err(GrantError::Configuration(_))));
}

#[tokio::test]
async fn missing_grant_wallet_fails_start_up() {
    let config = RedemptionConfig::new(
        SETTLEMENT,
        SigningKey::generate(&mut OsRng).verifying_key(),
        GrantWalletConfig {
            card_id: "missing-card".to_string(),
            signing_key: SigningKey::generate(&mut OsRng),
        },
    );

    let result = Redeemer::new(config, MemoryWalletProvider::new(), MemoryClaimStore::new()).await;
    assert!(matches!(result, Err(GrantError::WalletResolutionFailed { .. })));
}

#[tokio::test]
async fn balance_refresh_follows_config() {
    let h = Harness::new().await;
    h.redeemer
        .verify(&h.request(vec![h.grant(25).1], h.settlement_tx(25)))
        .await
        .unwrap();
    assert_eq!(h.provider.balance_refreshes(), 1);

    let h = Harness::with_config(|config| config.refresh_balance = false).await;
    h.redeemer
        .verify(&h.request(vec![h.grant(25).1], h.settlement_tx(25)))
        .await
        .unwrap();
    assert_eq!(h.provider.balance_refreshes(), 0);
}

/// Delays wallet resolution so a deadline can expire mid-request.
struct SlowProvider {
    inner: MemoryWalletProvider,
    delay: Duration,
}

#[async_trait]
impl WalletProvider for SlowProvider {
    type Wallet = MemoryWallet;

    async fn resolve_wallet(&self, info: &WalletInfo) -> Result<MemoryWallet, WalletError> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve_wallet(info).await
    }

    async fn resolve_custodial_wallet(
        &self,
        config: &GrantWalletConfig,
    ) -> Result<MemoryWallet, WalletError> {
        self.inner.resolve_custodial_wallet(config).await
    }
}

#[tokio::test]
async fn deadline_expiry_is_indeterminate() {
    let h = Harness::new().await;
    let slow = SlowProvider {
        inner: h.provider.clone(),
        delay: Duration::from_millis(500),
    };
    let redeemer = Redeemer::new(h.redeemer.config().clone(), slow, h.claims.clone())
        .await
        .unwrap();
    let request = h.request(vec![h.grant(25).1], h.settlement_tx(25));

    let err = redeemer
        .verify_within(&request, Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::Timeout { limit_ms: 20 }), "{err:?}");
    assert_eq!(err.category(), ErrorCategory::Indeterminate);
    assert!(!err.is_retriable());

    let receipt = redeemer
        .redeem_within(&request, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(receipt.result.probi, bat(25));
}
