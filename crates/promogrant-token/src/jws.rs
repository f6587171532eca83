//! JWS envelope parsing and EdDSA verification.
//!
//! Accepts the compact serialization
//!
//! ```text
//! base64url(protected) '.' base64url(payload) '.' base64url(signature)
//! ```
//!
//! and the JSON serializations (flattened and general). Every signature on
//! the envelope must declare `EdDSA`; the envelope verifies if any one of
//! its signatures verifies against the configured key.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, VerifyingKey};
use promogrant_types::{GrantError, Result, constants};
use serde::Deserialize;

/// The subset of the JOSE header this crate reads.
#[derive(Debug, Default, Deserialize)]
struct JoseHeader {
    alg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonSignature {
    protected: Option<String>,
    header: Option<JoseHeader>,
    signature: String,
}

/// Both JSON serializations. `signatures` is set for the general form, the
/// top-level `protected`/`header`/`signature` for the flattened form.
#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    payload: String,
    #[serde(default)]
    signatures: Vec<JsonSignature>,
    protected: Option<String>,
    header: Option<JoseHeader>,
    signature: Option<String>,
}

/// One signature of a parsed envelope.
#[derive(Debug)]
struct EnvelopeSignature {
    /// Encoded protected header, part of the signing input.
    protected_b64: String,
    algorithm: String,
    signature: Signature,
}

/// A parsed, not yet verified, JWS envelope.
#[derive(Debug)]
pub struct Envelope {
    payload_b64: String,
    payload: Vec<u8>,
    signatures: Vec<EnvelopeSignature>,
}

impl Envelope {
    /// Parse a compact or JSON serialized envelope.
    ///
    /// # Errors
    /// Returns [`GrantError::MalformedToken`] if the envelope cannot be parsed.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.starts_with('{') {
            Self::parse_json(token)
        } else {
            Self::parse_compact(token)
        }
    }

    fn parse_compact(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        let [protected_b64, payload_b64, signature_b64] = parts.as_slice() else {
            return Err(malformed(format!(
                "compact serialization has {} parts, expected 3",
                parts.len()
            )));
        };

        let signature = parse_signature(protected_b64, None, signature_b64)?;
        Ok(Self {
            payload_b64: (*payload_b64).to_string(),
            payload: decode_b64("payload", payload_b64)?,
            signatures: vec![signature],
        })
    }

    fn parse_json(token: &str) -> Result<Self> {
        let envelope: JsonEnvelope = serde_json::from_str(token)
            .map_err(|e| malformed(format!("invalid JSON serialization: {e}")))?;

        let mut raw = envelope.signatures;
        match envelope.signature {
            Some(signature) if raw.is_empty() => raw.push(JsonSignature {
                protected: envelope.protected,
                header: envelope.header,
                signature,
            }),
            Some(_) => {
                return Err(malformed(
                    "both flattened and general signatures present".to_string(),
                ));
            }
            None if raw.is_empty() => return Err(malformed("no signatures".to_string())),
            None => {}
        }

        let signatures = raw
            .into_iter()
            .map(|sig| {
                parse_signature(
                    sig.protected.as_deref().unwrap_or_default(),
                    sig.header.and_then(|h| h.alg),
                    &sig.signature,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            payload: decode_b64("payload", &envelope.payload)?,
            payload_b64: envelope.payload,
            signatures,
        })
    }

    /// Number of signatures on the envelope.
    #[must_use]
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Check algorithms, then signatures, and return the verified payload.
    ///
    /// # Errors
    /// - [`GrantError::UnsupportedAlgorithm`] if any signature is not EdDSA
    /// - [`GrantError::InvalidSignature`] if no signature verifies under `key`
    pub fn verify(self, key: &VerifyingKey) -> Result<Vec<u8>> {
        if let Some(sig) = self
            .signatures
            .iter()
            .find(|sig| sig.algorithm != constants::SUPPORTED_JWS_ALGORITHM)
        {
            return Err(GrantError::UnsupportedAlgorithm {
                algorithm: sig.algorithm.clone(),
            });
        }

        let verified = self.signatures.iter().any(|sig| {
            let signing_input = format!("{}.{}", sig.protected_b64, self.payload_b64);
            key.verify_strict(signing_input.as_bytes(), &sig.signature)
                .is_ok()
        });
        if verified {
            Ok(self.payload)
        } else {
            Err(GrantError::InvalidSignature)
        }
    }
}

/// Verifies grant tokens against the single grant signing key.
///
/// Holds no mutable state; share it freely across tasks.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: VerifyingKey,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Build from a hex-encoded 32-byte Ed25519 public key.
    ///
    /// # Errors
    /// Returns [`GrantError::Configuration`] for bad hex or an invalid key.
    pub fn from_hex(public_key_hex: &str) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(public_key_hex.trim())
            .map_err(|e| GrantError::Configuration(format!("invalid public key hex: {e}")))?
            .try_into()
            .map_err(|b: Vec<u8>| {
                GrantError::Configuration(format!("public key must be 32 bytes, got {}", b.len()))
            })?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| GrantError::Configuration(format!("invalid Ed25519 public key: {e}")))?;
        Ok(Self::new(key))
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }

    /// Parse and verify `token`, returning the verified payload bytes.
    pub fn verify(&self, token: &str) -> Result<Vec<u8>> {
        let result = Envelope::parse(token).and_then(|envelope| envelope.verify(&self.key));
        if let Err(err) = &result {
            tracing::debug!(error = %err, "Grant token rejected");
        }
        result
    }
}

fn parse_signature(
    protected_b64: &str,
    unprotected_alg: Option<String>,
    signature_b64: &str,
) -> Result<EnvelopeSignature> {
    let protected: JoseHeader = if protected_b64.is_empty() {
        JoseHeader::default()
    } else {
        let bytes = decode_b64("protected header", protected_b64)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| malformed(format!("invalid protected header: {e}")))?
    };

    let algorithm = protected
        .alg
        .or(unprotected_alg)
        .ok_or_else(|| malformed("signature declares no algorithm".to_string()))?;

    let signature_bytes: [u8; 64] = decode_b64("signature", signature_b64)?
        .try_into()
        .map_err(|b: Vec<u8>| malformed(format!("signature is {} bytes, expected 64", b.len())))?;

    Ok(EnvelopeSignature {
        protected_b64: protected_b64.to_string(),
        algorithm,
        signature: Signature::from_bytes(&signature_bytes),
    })
}

fn decode_b64(what: &str, value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| malformed(format!("invalid base64url in {what}: {e}")))
}

fn malformed(reason: String) -> GrantError {
    GrantError::MalformedToken { reason }
}
