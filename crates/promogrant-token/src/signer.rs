//! Token signing for tests. **Never use in production.**
//!
//! Grants are minted by a separate issuer; this only exists so tests can
//! produce tokens the verifier accepts.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signer, SigningKey};
use promogrant_types::Grant;

/// base64url without padding.
pub fn encode_b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Sign `payload` as a compact JWS with `{"alg":"EdDSA"}`.
pub fn sign_compact(key: &SigningKey, payload: &[u8]) -> String {
    let protected = encode_b64(br#"{"alg":"EdDSA"}"#);
    let payload = encode_b64(payload);
    let signature = key.sign(format!("{protected}.{payload}").as_bytes());
    format!("{protected}.{payload}.{}", encode_b64(&signature.to_bytes()))
}

/// Serialize and sign a grant.
pub fn sign_grant(key: &SigningKey, grant: &Grant) -> String {
    let payload = serde_json::to_vec(grant).expect("grant serializes");
    sign_compact(key, &payload)
}
