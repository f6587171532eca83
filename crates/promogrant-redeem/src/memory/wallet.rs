//! In-memory wallet provider.
//!
//! A tiny custodial ledger: accounts keyed by provider id, each with a
//! balance and an optional registered public key. Signed transactions are
//! base64 JSON envelopes carrying the transaction and an Ed25519 signature
//! over its JSON encoding. Submission enforces the same two rules a real
//! provider does, in the same order: the signature must match the source
//! account's key, then the balance must cover the amount.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use promogrant_types::{AltCurrency, Balance, GrantWalletConfig, TransactionInfo, WalletInfo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wallet::{Wallet, WalletError, WalletProvider};

#[derive(Serialize, Deserialize)]
struct SignedTransaction {
    transaction: TransactionInfo,
    /// Hex Ed25519 signature over the JSON encoding of `transaction`.
    signature: String,
}

#[derive(Debug)]
struct Account {
    public_key: Option<VerifyingKey>,
    balance: Decimal,
}

#[derive(Debug, Default)]
struct Ledger {
    accounts: HashMap<String, Account>,
    settlements: Vec<TransactionInfo>,
    transfers: Vec<TransactionInfo>,
    balance_refreshes: usize,
    unavailable: bool,
    reject_transfers: bool,
}

impl Ledger {
    fn check_available(&self) -> Result<(), WalletError> {
        if self.unavailable {
            return Err(WalletError::Unavailable("provider offline".to_string()));
        }
        Ok(())
    }

    fn account(&self, provider_id: &str) -> Result<&Account, WalletError> {
        self.accounts
            .get(provider_id)
            .ok_or_else(|| WalletError::NotFound(provider_id.to_string()))
    }

    fn move_funds(&mut self, from: &str, to: &str, probi: Decimal) -> Result<(), WalletError> {
        let source = self
            .accounts
            .get_mut(from)
            .ok_or_else(|| WalletError::NotFound(from.to_string()))?;
        if source.balance < probi {
            return Err(WalletError::InsufficientBalance(format!(
                "{from} holds {}, needs {probi}",
                source.balance
            )));
        }
        source.balance -= probi;
        self.accounts
            .entry(to.to_string())
            .or_insert(Account {
                public_key: None,
                balance: Decimal::ZERO,
            })
            .balance += probi;
        Ok(())
    }
}

/// Wallet provider backed by an in-process ledger.
#[derive(Clone, Default)]
pub struct MemoryWalletProvider {
    ledger: Arc<Mutex<Ledger>>,
}

impl MemoryWalletProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) an account.
    pub fn open_account(
        &self,
        provider_id: impl Into<String>,
        public_key: Option<VerifyingKey>,
        balance: Decimal,
    ) {
        self.control().accounts.insert(
            provider_id.into(),
            Account {
                public_key,
                balance,
            },
        );
    }

    pub fn balance_of(&self, provider_id: &str) -> Option<Decimal> {
        self.control().accounts.get(provider_id).map(|a| a.balance)
    }

    /// Transactions executed through [`Wallet::submit_transaction`].
    pub fn settlements(&self) -> Vec<TransactionInfo> {
        self.control().settlements.clone()
    }

    /// Transactions executed through [`Wallet::transfer`].
    pub fn transfers(&self) -> Vec<TransactionInfo> {
        self.control().transfers.clone()
    }

    /// Number of balance reads that asked for a fresh value.
    pub fn balance_refreshes(&self) -> usize {
        self.control().balance_refreshes
    }

    /// Fail every call with [`WalletError::Unavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.control().unavailable = unavailable;
    }

    /// Refuse custodial transfers while set.
    pub fn set_reject_transfers(&self, reject: bool) {
        self.control().reject_transfers = reject;
    }

    /// Sign a transaction in the format this provider accepts.
    pub fn sign_transaction(
        key: &SigningKey,
        alt_currency: AltCurrency,
        probi: Decimal,
        destination: &str,
    ) -> Result<String, WalletError> {
        let transaction = TransactionInfo::new(alt_currency, probi, destination);
        let message = serde_json::to_vec(&transaction)
            .map_err(|e| WalletError::Rejected(format!("unencodable transaction: {e}")))?;
        let envelope = SignedTransaction {
            transaction,
            signature: hex::encode(key.sign(&message).to_bytes()),
        };
        let json = serde_json::to_vec(&envelope)
            .map_err(|e| WalletError::Rejected(format!("unencodable transaction: {e}")))?;
        Ok(STANDARD.encode(json))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, WalletError> {
        lock(&self.ledger)
    }

    /// Ledger access for setup and inspection. A panic elsewhere must not
    /// turn these into silent no-ops, so poisoning is ignored here.
    fn control(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wallet(&self, info: WalletInfo, signing_key: Option<SigningKey>) -> MemoryWallet {
        MemoryWallet {
            info,
            signing_key,
            ledger: Arc::clone(&self.ledger),
        }
    }
}

fn lock(ledger: &Mutex<Ledger>) -> Result<MutexGuard<'_, Ledger>, WalletError> {
    ledger
        .lock()
        .map_err(|_| WalletError::Unavailable("ledger lock poisoned".to_string()))
}

fn decode_envelope(signed_tx: &str) -> Result<SignedTransaction, WalletError> {
    let bytes = STANDARD
        .decode(signed_tx)
        .map_err(|e| WalletError::Rejected(format!("malformed transaction: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| WalletError::Rejected(format!("malformed transaction: {e}")))
}

fn check_signature(envelope: &SignedTransaction, key: &VerifyingKey) -> Result<(), WalletError> {
    let invalid = |reason: &str| WalletError::InvalidSignature(reason.to_string());
    let raw = hex::decode(&envelope.signature).map_err(|_| invalid("signature is not hex"))?;
    let bytes: [u8; 64] = raw
        .as_slice()
        .try_into()
        .map_err(|_| invalid("signature must be 64 bytes"))?;
    let message = serde_json::to_vec(&envelope.transaction)
        .map_err(|e| WalletError::Rejected(format!("unencodable transaction: {e}")))?;
    key.verify_strict(&message, &Signature::from_bytes(&bytes))
        .map_err(|_| invalid("signature does not match registered key"))
}

#[async_trait]
impl WalletProvider for MemoryWalletProvider {
    type Wallet = MemoryWallet;

    async fn resolve_wallet(&self, info: &WalletInfo) -> Result<MemoryWallet, WalletError> {
        let public_key = {
            let ledger = self.lock()?;
            ledger.check_available()?;
            ledger.account(&info.provider_id)?.public_key
        };
        let mut info = info.clone();
        info.public_key = public_key.map(|k| hex::encode(k.as_bytes()));
        Ok(self.wallet(info, None))
    }

    async fn resolve_custodial_wallet(
        &self,
        config: &GrantWalletConfig,
    ) -> Result<MemoryWallet, WalletError> {
        let key = config.verifying_key();
        {
            let mut ledger = self.lock()?;
            ledger.check_available()?;
            let account = ledger
                .accounts
                .get_mut(&config.card_id)
                .ok_or_else(|| WalletError::NotFound(config.card_id.clone()))?;
            match account.public_key {
                Some(registered) if registered != key => {
                    return Err(WalletError::Rejected(format!(
                        "signing key does not match card {}",
                        config.card_id
                    )));
                }
                Some(_) => {}
                None => account.public_key = Some(key),
            }
        }
        Ok(self.wallet(config.wallet_info(), Some(config.signing_key.clone())))
    }
}

/// Handle to an account of a [`MemoryWalletProvider`].
#[derive(Debug)]
pub struct MemoryWallet {
    info: WalletInfo,
    signing_key: Option<SigningKey>,
    ledger: Arc<Mutex<Ledger>>,
}

#[async_trait]
impl Wallet for MemoryWallet {
    fn info(&self) -> &WalletInfo {
        &self.info
    }

    async fn get_balance(&self, refresh: bool) -> Result<Balance, WalletError> {
        let mut ledger = lock(&self.ledger)?;
        ledger.check_available()?;
        if refresh {
            ledger.balance_refreshes += 1;
        }
        let balance = ledger.account(&self.info.provider_id)?.balance;
        Ok(Balance::confirmed(balance))
    }

    async fn verify_transaction(&self, signed_tx: &str) -> Result<TransactionInfo, WalletError> {
        lock(&self.ledger)?.check_available()?;
        let envelope = decode_envelope(signed_tx)?;
        let mut transaction = envelope.transaction;
        transaction.source = Some(self.info.provider_id.clone());
        Ok(transaction)
    }

    async fn submit_transaction(&self, signed_tx: &str) -> Result<TransactionInfo, WalletError> {
        let envelope = decode_envelope(signed_tx)?;
        let source = self.info.provider_id.as_str();

        let mut ledger = lock(&self.ledger)?;
        ledger.check_available()?;
        let key = ledger.account(source)?.public_key.ok_or_else(|| {
            WalletError::InvalidSignature(format!("no key registered for {source}"))
        })?;
        check_signature(&envelope, &key)?;

        let mut executed = envelope.transaction;
        ledger.move_funds(source, &executed.destination, executed.probi)?;
        executed.id = Some(Uuid::new_v4().to_string());
        executed.source = Some(source.to_string());
        executed.executed_at = Some(Utc::now());
        ledger.settlements.push(executed.clone());
        Ok(executed)
    }

    async fn transfer(
        &self,
        alt_currency: AltCurrency,
        probi: Decimal,
        destination: &str,
    ) -> Result<TransactionInfo, WalletError> {
        if self.signing_key.is_none() {
            return Err(WalletError::Rejected(format!(
                "{} cannot sign transfers",
                self.info.provider_id
            )));
        }
        let source = self.info.provider_id.as_str();

        let mut ledger = lock(&self.ledger)?;
        ledger.check_available()?;
        if ledger.reject_transfers {
            return Err(WalletError::Rejected("transfers disabled".to_string()));
        }
        ledger.move_funds(source, destination, probi)?;

        let mut executed = TransactionInfo::new(alt_currency, probi, destination);
        executed.id = Some(Uuid::new_v4().to_string());
        executed.source = Some(source.to_string());
        executed.executed_at = Some(Utc::now());
        ledger.transfers.push(executed.clone());
        Ok(executed)
    }
}
