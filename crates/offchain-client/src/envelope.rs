//! Detached-payload signed envelope codec.
//!
//! Commands travel as compact three-part envelopes,
//! `b64(header).b64(payload).b64(signature)`, with an EdDSA signature over
//! the first two parts. The codec's whole contract is `sign(bytes) -> bytes`
//! and `verify(bytes) -> bytes`; everything else in the system treats
//! envelopes as opaque.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as b64;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Fixed protected header; only EdDSA envelopes are accepted.
const HEADER: &str = r#"{"alg":"EdDSA"}"#;

/// Errors opening or building an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid utf-8")]
    NotUtf8,
    #[error("envelope must have three dot-separated parts")]
    WrongShape,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported envelope header")]
    UnsupportedHeader,
    #[error("signature must be {expected} bytes, got {actual}")]
    SignatureLength { expected: usize, actual: usize },
    #[error("signature verification failed")]
    BadSignature(#[source] ed25519_dalek::SignatureError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Signing seam for envelope producers.
///
/// The engine signs response envelopes and the receiver's travel-rule
/// metadata with the same compliance key, so both go through this trait.
pub trait Keychain: Send + Sync {
    fn sign(&self, message: &[u8]) -> Signature;
    fn verifying_key(&self) -> VerifyingKey;
}

/// An Ed25519 compliance key.
pub struct ComplianceKey {
    key: SigningKey,
}

impl ComplianceKey {
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        ComplianceKey {
            key: SigningKey::generate(&mut rng),
        }
    }

    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        ComplianceKey {
            key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl Keychain for ComplianceKey {
    fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }

    fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

/// Wraps raw payload bytes into a signed envelope.
pub fn sign(payload: &[u8], keychain: &dyn Keychain) -> Vec<u8> {
    let signing_input = format!("{}.{}", b64.encode(HEADER), b64.encode(payload));
    let signature = keychain.sign(signing_input.as_bytes());
    let envelope = format!("{signing_input}.{}", b64.encode(signature.to_bytes()));
    envelope.into_bytes()
}

/// Opens an envelope, returning the payload bytes iff the signature checks
/// out against `key`.
pub fn verify(envelope: &[u8], key: &VerifyingKey) -> Result<Vec<u8>, EnvelopeError> {
    let text = std::str::from_utf8(envelope).map_err(|_| EnvelopeError::NotUtf8)?;
    let parts: Vec<&str> = text.split('.').collect();
    let [header, payload, signature] = parts.as_slice() else {
        return Err(EnvelopeError::WrongShape);
    };

    if b64.decode(header)? != HEADER.as_bytes() {
        return Err(EnvelopeError::UnsupportedHeader);
    }

    let signature_bytes = b64.decode(signature)?;
    let signature_bytes: [u8; 64] =
        signature_bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| EnvelopeError::SignatureLength {
                expected: 64,
                actual: bytes.len(),
            })?;
    let signature = Signature::from_bytes(&signature_bytes);

    let signing_input = format!("{header}.{payload}");
    key.verify_strict(signing_input.as_bytes(), &signature)
        .map_err(EnvelopeError::BadSignature)?;

    Ok(b64.decode(payload)?)
}

/// Serializes `object` to canonical JSON and seals it.
pub fn sign_json<T: Serialize>(object: &T, keychain: &dyn Keychain) -> Result<Vec<u8>, EnvelopeError> {
    let payload = serde_json::to_vec(object)?;
    Ok(sign(&payload, keychain))
}

/// Opens an envelope and decodes its payload.
pub fn verify_json<T: DeserializeOwned>(
    envelope: &[u8],
    key: &VerifyingKey,
) -> Result<T, EnvelopeError> {
    let payload = verify(envelope, key)?;
    Ok(serde_json::from_slice(&payload)?)
}
