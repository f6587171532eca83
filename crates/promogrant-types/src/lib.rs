//! # promogrant-types
//!
//! Shared types, errors, and configuration for **promogrant**, the
//! promotional grant redemption service.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`GrantId`], [`PromotionId`]
//! - **Assets**: [`AltCurrency`] and probi scaling
//! - **Grant model**: [`Grant`]
//! - **Wallet model**: [`WalletInfo`], [`Balance`], [`TransactionInfo`]
//! - **Request model**: [`RedeemGrantsRequest`], [`RedemptionResult`],
//!   [`RedemptionReceipt`], [`RedemptionStage`]
//! - **Configuration**: [`RedemptionConfig`], [`GrantWalletConfig`], [`Environment`]
//! - **Errors**: [`GrantError`] with `GR_ERR_` prefix codes

pub mod altcurrency;
pub mod config;
pub mod constants;
pub mod error;
pub mod grant;
pub mod ids;
pub mod request;
pub mod wallet;

pub use altcurrency::*;
pub use config::*;
pub use error::*;
pub use grant::*;
pub use ids::*;
pub use request::*;
pub use wallet::*;

// Constants are accessed via `promogrant_types::constants::FOO`.
