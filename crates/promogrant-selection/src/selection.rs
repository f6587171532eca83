//! Grant selection with the no-waste invariant.
//!
//! Grants are sorted by `probi` descending (ties: `grant_id` ascending) and
//! summed. Before each grant is added, the running sum must still be short
//! of `needed`; otherwise that grant is surplus and the selection fails with
//! [`GrantError::ExcessGrants`]. The last grant may overshoot `needed`.
//!
//! ```text
//! needed = 25, grants {15, 15}      → 15 < 25, 30 ≥ 25 at the last grant  → ok, total 30
//! needed = 25, grants {15, 15, 5}   → 30 ≥ 25 before the third grant     → ExcessGrants
//! needed = 25, grants {15, 5}       → 20 < 25 after every grant          → InsufficientGrants
//! ```

use std::collections::HashSet;

use promogrant_types::{Grant, GrantError, Result};
use rust_decimal::Decimal;

/// Outcome of a successful selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Every supplied grant, in selection order.
    pub grants: Vec<Grant>,
    /// Sum of `probi` over `grants`. At least `needed`.
    pub total: Decimal,
}

/// Sort grants into selection order: `probi` descending, then `grant_id`
/// ascending.
pub fn sort_grants(grants: &mut [Grant]) {
    grants.sort_by(|a, b| b.probi.cmp(&a.probi).then(a.grant_id.cmp(&b.grant_id)));
}

/// Check that `grants` are exactly what is needed to cover `needed` probi.
///
/// # Errors
/// - `DuplicateGrant` if a grant id appears twice
/// - `DuplicatePromotion` if two grants share a promotion
/// - `ExcessGrants` if the running sum meets `needed` before the last grant
/// - `UnsupportedAsset` if a grant is not denominated in BAT
/// - `InsufficientGrants` if the grants sum to less than `needed`, or none
///   were supplied
pub fn select_grants(needed: Decimal, mut grants: Vec<Grant>) -> Result<Selection> {
    if grants.is_empty() {
        return Err(GrantError::InsufficientGrants {
            needed,
            total: Decimal::ZERO,
        });
    }
    check_unique(&grants)?;
    sort_grants(&mut grants);

    let mut total = Decimal::ZERO;
    for grant in &grants {
        if total >= needed {
            return Err(GrantError::ExcessGrants {
                needed,
                reached: total,
                grant_id: grant.grant_id,
            });
        }
        if !grant.is_redeemable_asset() {
            return Err(GrantError::UnsupportedAsset {
                grant_id: grant.grant_id,
                found: grant.alt_currency,
            });
        }
        total = total
            .checked_add(grant.probi)
            .ok_or_else(|| GrantError::Internal("grant total overflows".to_string()))?;
    }

    if total < needed {
        return Err(GrantError::InsufficientGrants { needed, total });
    }

    tracing::debug!(
        grants = grants.len(),
        needed = %needed,
        total = %total,
        "Grants selected"
    );
    Ok(Selection { grants, total })
}

/// Reject a grant set that could never be claimed in full: the same grant
/// twice, or two grants of one promotion (a wallet is granted once per
/// promotion).
fn check_unique(grants: &[Grant]) -> Result<()> {
    let mut grant_ids = HashSet::with_capacity(grants.len());
    let mut promotions = HashSet::with_capacity(grants.len());
    for grant in grants {
        if !grant_ids.insert(grant.grant_id) {
            return Err(GrantError::DuplicateGrant(grant.grant_id));
        }
        if !promotions.insert(grant.promotion_id) {
            return Err(GrantError::DuplicatePromotion(grant.promotion_id));
        }
    }
    Ok(())
}
