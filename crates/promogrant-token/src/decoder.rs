//! Grant decoder: verified payload bytes to [`Grant`].

use promogrant_types::{Grant, GrantError, Result};

use crate::jws::TokenVerifier;

/// Deserialize a verified payload into a grant.
///
/// # Errors
/// Returns [`GrantError::MalformedGrant`] on a missing or invalid field, a
/// non-string or negative `probi`.
pub fn decode_grant(payload: &[u8]) -> Result<Grant> {
    let grant: Grant = serde_json::from_slice(payload).map_err(|e| GrantError::MalformedGrant {
        reason: e.to_string(),
    })?;
    if grant.probi.is_sign_negative() {
        return Err(GrantError::MalformedGrant {
            reason: format!("grant {} has negative probi {}", grant.grant_id, grant.probi),
        });
    }
    Ok(grant)
}

impl TokenVerifier {
    /// Verify a grant token and decode its payload.
    pub fn verify_grant(&self, token: &str) -> Result<Grant> {
        decode_grant(&self.verify(token)?)
    }

    /// Verify and decode every token in order, stopping at the first failure.
    pub fn verify_grants<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<Grant>> {
        tokens
            .iter()
            .map(|token| self.verify_grant(token.as_ref()))
            .collect()
    }
}
