//! # promogrant-redeem
//!
//! **Redemption plane**: turns a user's signed settlement transaction plus a
//! set of grant tokens into a funded, settled transfer, claiming each grant
//! exactly once.
//!
//! ## Architecture
//!
//! [`Redeemer::verify`] runs every check that can fail before anything is
//! claimed, then claims:
//! 1. Decodes and verifies every grant token (EdDSA only)
//! 2. Resolves the user's wallet and reads its balance
//! 3. Validates the settlement transaction against policy
//! 4. Pre-flights the transaction (it must fail for lack of funds)
//! 5. Selects grants under the no-waste rule
//! 6. Claims each grant and the wallet once per promotion
//!
//! [`Redeemer::redeem`] then transfers the grant total from the custodial
//! grant wallet and submits the user's transaction.
//!
//! ## Adapters
//!
//! - [`WalletProvider`] / [`Wallet`]: the custodial wallet provider
//! - [`ClaimStore`] / [`ClaimSet`]: named sets with atomic add
//!
//! In-memory implementations of both live in [`memory`] (feature
//! `in-memory`, on by default).

pub mod claim_store;
#[cfg(feature = "in-memory")]
pub mod memory;
pub mod redeemer;
pub mod wallet;

pub use claim_store::{ClaimSet, ClaimStore, ClaimStoreError};
pub use redeemer::Redeemer;
pub use wallet::{Wallet, WalletError, WalletProvider};
