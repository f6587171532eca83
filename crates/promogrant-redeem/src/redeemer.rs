//! The redemption orchestrator.
//!
//! A [`Redeemer`] is built once at start-up and shared behind an `Arc`; every
//! method takes `&self`. Its only mutable state lives in the adapters.
//!
//! ## Claim semantics
//!
//! Claims are made per selected grant, in selection order: the grant id into
//! `promotion:<id>:grants`, then the wallet into `promotion:<id>:wallets`.
//! A claim is never rolled back. If the loop stops part way (a grant or
//! wallet already claimed, the store unreachable), the claims made before
//! the failure stay committed and those grants are consumed. A retry of the
//! same request will then fail with [`GrantError::AlreadyRedeemed`].

use std::time::Duration;

use chrono::Utc;
use promogrant_selection::select_grants;
use promogrant_token::TokenVerifier;
use promogrant_types::constants::SUPPORTED_ASSET;
use promogrant_types::{
    Balance, Grant, GrantError, GrantId, PromotionId, RedeemGrantsRequest, RedemptionConfig,
    RedemptionReceipt, RedemptionResult, RedemptionStage, Result, TransactionInfo,
};
use rust_decimal::Decimal;

use crate::claim_store::{ClaimSet, ClaimStore, ClaimStoreError};
use crate::wallet::{Wallet, WalletError, WalletProvider};

/// Verifies and redeems grant requests.
pub struct Redeemer<P: WalletProvider, S: ClaimStore> {
    config: RedemptionConfig,
    verifier: TokenVerifier,
    provider: P,
    claims: S,
    /// Custodial wallet grants are paid from.
    grant_wallet: P::Wallet,
}

impl<P: WalletProvider, S: ClaimStore> Redeemer<P, S> {
    /// Validate `config` and resolve the custodial grant wallet.
    ///
    /// # Errors
    /// - `Configuration` if `config` fails validation
    /// - `WalletResolutionFailed` if the grant wallet cannot be resolved,
    ///   retriable when the provider was unreachable
    pub async fn new(config: RedemptionConfig, provider: P, claims: S) -> Result<Self> {
        config.validate()?;
        let grant_wallet = provider
            .resolve_custodial_wallet(&config.grant_wallet)
            .await
            .map_err(resolution_error)?;

        tracing::info!(
            card = %config.grant_wallet.card_id,
            environment = ?config.environment,
            refresh_balance = config.refresh_balance,
            minimum_probi = %config.minimum_transaction_probi,
            "Grant wallet initialized"
        );

        Ok(Self {
            verifier: TokenVerifier::new(config.grant_signator_public_key),
            config,
            provider,
            claims,
            grant_wallet,
        })
    }

    pub fn config(&self) -> &RedemptionConfig {
        &self.config
    }

    pub fn grant_wallet(&self) -> &P::Wallet {
        &self.grant_wallet
    }

    /// Check a request and claim its grants.
    ///
    /// Every check that can fail runs before the first claim. Once claiming
    /// starts this is not idempotent: see the module docs.
    pub async fn verify(&self, request: &RedeemGrantsRequest) -> Result<RedemptionResult> {
        self.verify_with_wallet(request)
            .await
            .map(|(result, _)| result)
    }

    /// [`Self::verify`], then fund the user's wallet from the grant wallet
    /// and submit the user's settlement transaction.
    ///
    /// # Errors
    /// Any error of [`Self::verify`], then:
    /// - `TransferFailed`: grants stay consumed, no funds moved
    /// - `SettlementFailed`: the custodial transfer stays committed; the
    ///   submission alone can be retried with [`Self::submit_settlement`]
    pub async fn redeem(&self, request: &RedeemGrantsRequest) -> Result<RedemptionReceipt> {
        let (result, user_wallet) = self.verify_with_wallet(request).await?;
        let fingerprint = request.fingerprint();

        let transfer = self
            .grant_wallet
            .transfer(result.alt_currency, result.probi, &result.destination)
            .await
            .map_err(|err| {
                tracing::error!(
                    fingerprint = hex::encode(fingerprint),
                    wallet = %result.destination,
                    probi = %result.probi,
                    error = %err,
                    "Grant transfer failed after grants were claimed"
                );
                GrantError::TransferFailed {
                    reason: err.to_string(),
                }
            })?;

        let settlement = self.settle(&user_wallet, request).await?;

        tracing::info!(
            fingerprint = hex::encode(fingerprint),
            wallet = %result.destination,
            probi = %result.probi,
            transfer = ?transfer.id,
            settlement = ?settlement.id,
            "Grants redeemed"
        );

        Ok(RedemptionReceipt {
            result,
            transfer,
            settlement,
            request_hash: fingerprint,
            completed_at: Utc::now(),
        })
    }

    /// Submit the request's settlement transaction again, without verifying
    /// or claiming. For retrying a [`GrantError::SettlementFailed`].
    pub async fn submit_settlement(&self, request: &RedeemGrantsRequest) -> Result<TransactionInfo> {
        let wallet = self
            .provider
            .resolve_wallet(&request.wallet_info)
            .await
            .map_err(resolution_error)?;
        self.settle(&wallet, request).await
    }

    /// Whether `grant_id` has already been claimed under `promotion`.
    pub async fn is_grant_redeemed(
        &self,
        grant_id: GrantId,
        promotion: PromotionId,
    ) -> Result<bool> {
        self.is_claimed(&promotion.grants_claim_key(), &grant_id.to_string())
            .await
    }

    /// Whether `wallet_id` has already redeemed a grant of `promotion`.
    pub async fn has_wallet_redeemed(
        &self,
        wallet_id: &str,
        promotion: PromotionId,
    ) -> Result<bool> {
        self.is_claimed(&promotion.wallets_claim_key(), wallet_id)
            .await
    }

    /// Number of grants of `promotion` claimed so far.
    pub async fn redeemed_grant_count(&self, promotion: PromotionId) -> Result<usize> {
        let set = self
            .claims
            .acquire(&promotion.grants_claim_key())
            .await
            .map_err(|e| store_error(&e, 0))?;
        set.cardinality().await.map_err(|e| store_error(&e, 0))
    }

    /// [`Self::verify`] bounded by `limit`.
    ///
    /// On [`GrantError::Timeout`] the outcome is unknown: claims may or may
    /// not have been made.
    pub async fn verify_within(
        &self,
        request: &RedeemGrantsRequest,
        limit: Duration,
    ) -> Result<RedemptionResult> {
        tokio::time::timeout(limit, self.verify(request))
            .await
            .map_err(|_| timed_out(request, limit))?
    }

    /// [`Self::redeem`] bounded by `limit`.
    pub async fn redeem_within(
        &self,
        request: &RedeemGrantsRequest,
        limit: Duration,
    ) -> Result<RedemptionReceipt> {
        tokio::time::timeout(limit, self.redeem(request))
            .await
            .map_err(|_| timed_out(request, limit))?
    }

    async fn verify_with_wallet(
        &self,
        request: &RedeemGrantsRequest,
    ) -> Result<(RedemptionResult, P::Wallet)> {
        let fingerprint = request.fingerprint_hex();
        let mut stage = RedemptionStage::Decoding;

        let outcome = self.run_verify(request, &mut stage).await;
        match &outcome {
            Ok((result, _)) => tracing::info!(
                fingerprint = %fingerprint,
                wallet = %result.destination,
                grants = request.grants.len(),
                probi = %result.probi,
                "Grants verified"
            ),
            Err(err) => tracing::warn!(
                fingerprint = %fingerprint,
                stage = %stage,
                category = %err.category(),
                side_effects = leaves_side_effects(stage, err),
                error = %err,
                "Grant verification failed"
            ),
        }
        outcome
    }

    async fn run_verify(
        &self,
        request: &RedeemGrantsRequest,
        stage: &mut RedemptionStage,
    ) -> Result<(RedemptionResult, P::Wallet)> {
        let grants = self.verifier.verify_grants(request.grants.as_slice())?;

        enter(stage, RedemptionStage::WalletResolved);
        let wallet = self
            .provider
            .resolve_wallet(&request.wallet_info)
            .await
            .map_err(resolution_error)?;

        enter(stage, RedemptionStage::TransactionValidated);
        let balance = wallet
            .get_balance(self.config.refresh_balance)
            .await
            .map_err(provider_error)?;
        if balance.spendable_probi < Decimal::ZERO {
            return Err(GrantError::ProviderRejected {
                reason: format!(
                    "negative spendable balance {} for {}",
                    balance.spendable_probi, request.wallet_info.provider_id
                ),
            });
        }
        let transaction = wallet
            .verify_transaction(&request.transaction)
            .await
            .map_err(|err| GrantError::InvalidTransaction {
                retriable: err.is_unavailable(),
                reason: err.to_string(),
            })?;
        self.check_policy(&transaction, &balance)?;

        enter(stage, RedemptionStage::PreflightChecked);
        preflight(&wallet, &request.transaction).await?;

        enter(stage, RedemptionStage::GrantsSelected);
        let needed = transaction
            .probi
            .checked_sub(balance.spendable_probi)
            .ok_or_else(|| {
                GrantError::Internal(format!(
                    "shortfall of {} against {} overflows",
                    transaction.probi, balance.spendable_probi
                ))
            })?;
        let selection = select_grants(needed, grants)?;

        enter(stage, RedemptionStage::Claimed);
        self.claim(&selection.grants, &request.wallet_info.provider_id)
            .await?;

        enter(stage, RedemptionStage::Verified);
        let result = RedemptionResult {
            alt_currency: SUPPORTED_ASSET,
            probi: selection.total,
            destination: request.wallet_info.provider_id.clone(),
        };
        Ok((result, wallet))
    }

    fn check_policy(&self, transaction: &TransactionInfo, balance: &Balance) -> Result<()> {
        if transaction.alt_currency != SUPPORTED_ASSET {
            return Err(GrantError::AssetMismatch {
                found: transaction.alt_currency,
            });
        }
        if transaction.probi < self.config.minimum_transaction_probi {
            return Err(GrantError::BelowMinimum {
                probi: transaction.probi,
                minimum: self.config.minimum_transaction_probi,
            });
        }
        if transaction.probi < balance.spendable_probi {
            return Err(GrantError::NoShortfall {
                transaction: transaction.probi,
                spendable: balance.spendable_probi,
            });
        }
        if transaction.destination != self.config.settlement_address {
            return Err(GrantError::WrongDestination {
                destination: transaction.destination.clone(),
            });
        }
        Ok(())
    }

    async fn claim(&self, grants: &[Grant], wallet_id: &str) -> Result<()> {
        let mut committed = 0usize;
        for grant in grants {
            let mut redeemed_grants = self
                .claims
                .acquire(&grant.promotion_id.grants_claim_key())
                .await
                .map_err(|e| store_error(&e, committed))?;
            let mut redeemed_wallets = self
                .claims
                .acquire(&grant.promotion_id.wallets_claim_key())
                .await
                .map_err(|e| store_error(&e, committed))?;

            // ── GRANT CLAIM (GR_ERR_400) ─────────────────────────────────
            let added = redeemed_grants
                .add(&grant.grant_id.to_string())
                .await
                .map_err(|e| store_error(&e, committed))?;
            if !added {
                tracing::error!(
                    grant = %grant.grant_id,
                    promotion = %grant.promotion_id,
                    wallet = %wallet_id,
                    claims_committed = committed,
                    "Attempt to redeem previously redeemed grant"
                );
                return Err(GrantError::AlreadyRedeemed {
                    grant_id: grant.grant_id,
                    promotion_id: grant.promotion_id,
                });
            }
            committed += 1;

            // ── WALLET CLAIM (GR_ERR_401) ────────────────────────────────
            // One grant per wallet per promotion.
            let added = redeemed_wallets
                .add(wallet_id)
                .await
                .map_err(|e| store_error(&e, committed))?;
            if !added {
                tracing::error!(
                    grant = %grant.grant_id,
                    promotion = %grant.promotion_id,
                    wallet = %wallet_id,
                    claims_committed = committed,
                    "Attempt to redeem multiple grants from one promotion by the same wallet"
                );
                return Err(GrantError::AlreadyRedeemedByWallet {
                    wallet: wallet_id.to_string(),
                    promotion_id: grant.promotion_id,
                });
            }
            committed += 1;

            tracing::debug!(
                grant = %grant.grant_id,
                promotion = %grant.promotion_id,
                wallet = %wallet_id,
                grants_set = redeemed_grants.name(),
                "Grant claimed"
            );
        }
        Ok(())
    }

    async fn is_claimed(&self, name: &str, element: &str) -> Result<bool> {
        let set = self
            .claims
            .acquire(name)
            .await
            .map_err(|e| store_error(&e, 0))?;
        set.contains(element).await.map_err(|e| store_error(&e, 0))
    }

    async fn settle(
        &self,
        wallet: &P::Wallet,
        request: &RedeemGrantsRequest,
    ) -> Result<TransactionInfo> {
        wallet
            .submit_transaction(&request.transaction)
            .await
            .map_err(|err| {
                tracing::error!(
                    fingerprint = %request.fingerprint_hex(),
                    wallet = %request.wallet_info.provider_id,
                    error = %err,
                    "Settlement submission failed"
                );
                GrantError::SettlementFailed {
                    reason: err.to_string(),
                }
            })
    }
}

/// Submit the settlement transaction expecting it to fail for lack of
/// funds. That failure proves the signature matches the wallet's key and
/// that grants are really needed.
async fn preflight<W: Wallet>(wallet: &W, signed_tx: &str) -> Result<()> {
    match wallet.submit_transaction(signed_tx).await {
        Ok(executed) => {
            tracing::error!(
                wallet = %wallet.info().provider_id,
                transaction = ?executed.id,
                "Speculative settlement submission succeeded"
            );
            Err(GrantError::UnexpectedSuccess)
        }
        Err(err) if err.is_insufficient_balance() => Ok(()),
        Err(err) if err.is_invalid_signature() => Err(GrantError::WrongPublicKey),
        Err(err) => Err(provider_error(err)),
    }
}

fn enter(stage: &mut RedemptionStage, next: RedemptionStage) {
    *stage = next;
    tracing::debug!(stage = %next, "Redemption stage entered");
}

/// A settlement that went through during preflight moved the user's funds,
/// whatever stage it happened in.
fn leaves_side_effects(stage: RedemptionStage, err: &GrantError) -> bool {
    stage.has_side_effects() || matches!(err, GrantError::UnexpectedSuccess)
}

fn resolution_error(err: WalletError) -> GrantError {
    GrantError::WalletResolutionFailed {
        retriable: err.is_unavailable(),
        reason: err.to_string(),
    }
}

fn provider_error(err: WalletError) -> GrantError {
    match err {
        WalletError::Unavailable(reason) => GrantError::WalletUnavailable { reason },
        other => GrantError::ProviderRejected {
            reason: other.to_string(),
        },
    }
}

fn store_error(err: &ClaimStoreError, claims_committed: usize) -> GrantError {
    GrantError::ClaimStoreUnavailable {
        reason: err.to_string(),
        claims_committed,
    }
}

fn timed_out(request: &RedeemGrantsRequest, limit: Duration) -> GrantError {
    let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
    tracing::warn!(
        fingerprint = %request.fingerprint_hex(),
        limit_ms,
        "Redemption timed out, outcome unknown"
    );
    GrantError::Timeout { limit_ms }
}
