//! # Grant, a single-use promotional allotment
//!
//! A `Grant` is the payload of a signed grant token. It is decoded fresh for
//! every redemption request and never persisted here; whether it has already
//! been consumed is tracked exclusively by the claim store.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "altcurrency": "BAT",
//!   "grantId": "…uuid…",
//!   "probi": "25000000000000000000",
//!   "promotionId": "…uuid…"
//! }
//! ```
//!
//! `probi` is always a decimal string.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AltCurrency, GrantId, PromotionId, constants};

/// A decoded grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Asset the grant is denominated in.
    #[serde(rename = "altcurrency")]
    pub alt_currency: AltCurrency,
    /// Unique grant identifier.
    #[serde(rename = "grantId")]
    pub grant_id: GrantId,
    /// Amount in probi.
    #[serde(with = "rust_decimal::serde::str")]
    pub probi: Decimal,
    /// Campaign this grant belongs to.
    #[serde(rename = "promotionId")]
    pub promotion_id: PromotionId,
}

impl Grant {
    /// Whether this grant is denominated in the redeemable asset.
    #[must_use]
    pub fn is_redeemable_asset(&self) -> bool {
        self.alt_currency == constants::SUPPORTED_ASSET
    }
}

/// Dummy grants for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Grant {
    /// A BAT grant worth `bat` whole tokens under `promotion_id`.
    pub fn dummy(bat: i64, promotion_id: PromotionId) -> Self {
        Self {
            alt_currency: AltCurrency::Bat,
            grant_id: GrantId::new(),
            probi: AltCurrency::Bat.to_probi(Decimal::from(bat)),
            promotion_id,
        }
    }
}
