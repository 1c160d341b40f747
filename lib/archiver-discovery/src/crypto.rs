//! Signature verification for signed archiver payloads.
//!
//! Archivers sign their responses with Ed25519. The signature travels inside
//! the payload as `sign: { owner, sig }`, where `owner` is the hex encoded
//! public key and `sig` the hex encoded signature over the canonical JSON of
//! the payload without its `sign` field.

use crate::types::Endpoint;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Name of the field carrying the signature envelope.
pub const SIGN_FIELD: &str = "sign";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Payload is not a JSON object")]
    NotAnObject,
    #[error("Payload has no signature")]
    MissingSignature,
    #[error("Signer {owner} is neither the responding archiver nor a trusted signer")]
    UntrustedOwner { owner: String },
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Verifies the authenticity of a payload returned by an archiver.
///
/// `signer` is the roster entry that produced the response.
pub trait PayloadVerifier: Send + Sync {
    fn verify(&self, payload: &Value, signer: &Endpoint) -> bool;
}

/// Ed25519 verifier accepting signatures from the responding archiver itself
/// or from any key in the trusted signer set.
#[derive(Debug, Clone, Default)]
pub struct Ed25519Verifier {
    trusted_signers: HashSet<String>,
}

impl Ed25519Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trusted_signers<I, S>(signers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trusted_signers: signers
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }

    pub fn is_trusted(&self, owner: &str) -> bool {
        self.trusted_signers.contains(&owner.to_lowercase())
    }

    /// Full verification with the failure reason.
    pub fn check(&self, payload: &Value, signer: &Endpoint) -> Result<(), SignatureError> {
        let owner = payload
            .get(SIGN_FIELD)
            .and_then(|s| s.get("owner"))
            .and_then(Value::as_str)
            .ok_or(SignatureError::MissingSignature)?;

        if !owner.eq_ignore_ascii_case(&signer.public_key) && !self.is_trusted(owner) {
            return Err(SignatureError::UntrustedOwner {
                owner: owner.to_string(),
            });
        }

        verify_signed_payload(payload)
    }
}

impl PayloadVerifier for Ed25519Verifier {
    fn verify(&self, payload: &Value, signer: &Endpoint) -> bool {
        match self.check(payload, signer) {
            Ok(()) => true,
            Err(e) => {
                debug!(archiver = %signer, error = %e, "Payload signature rejected");
                false
            }
        }
    }
}

/// Canonical bytes that are signed: the payload without its `sign` field,
/// serialized with sorted object keys.
pub fn signing_message(payload: &Value) -> Result<Vec<u8>, SignatureError> {
    let mut object = payload
        .as_object()
        .cloned()
        .ok_or(SignatureError::NotAnObject)?;
    object.remove(SIGN_FIELD);
    serde_json::to_vec(&canonicalize(&Value::Object(object)))
        .map_err(|_| SignatureError::NotAnObject)
}

/// Rebuild `value` with the keys of every object inserted in sorted order,
/// so serialization does not depend on the map type backing `serde_json`.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Verify the embedded signature of `payload` against its declared owner.
///
/// Does not decide whether the owner is trusted; see [`Ed25519Verifier`].
pub fn verify_signed_payload(payload: &Value) -> Result<(), SignatureError> {
    let sign = payload
        .get(SIGN_FIELD)
        .ok_or(SignatureError::MissingSignature)?;
    let owner = sign
        .get("owner")
        .and_then(Value::as_str)
        .ok_or(SignatureError::MissingSignature)?;
    let sig = sign
        .get("sig")
        .and_then(Value::as_str)
        .ok_or(SignatureError::MissingSignature)?;

    let key_bytes: [u8; 32] = hex::decode(owner)
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?
        .try_into()
        .map_err(|b: Vec<u8>| {
            SignatureError::InvalidPublicKey(format!("expected 32 bytes, found {}", b.len()))
        })?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;

    let sig_bytes: [u8; 64] = hex::decode(sig)
        .map_err(|e| SignatureError::InvalidSignature(e.to_string()))?
        .try_into()
        .map_err(|b: Vec<u8>| {
            SignatureError::InvalidSignature(format!("expected 64 bytes, found {}", b.len()))
        })?;
    let signature = Signature::from_bytes(&sig_bytes);

    let message = signing_message(payload)?;
    verifying_key
        .verify(&message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

/// Attach a `sign` envelope to `payload`. Any existing envelope is replaced.
pub fn sign_payload(signing_key: &SigningKey, payload: Value) -> Result<Value, SignatureError> {
    let message = signing_message(&payload)?;
    let signature = signing_key.sign(&message);

    let mut object = match payload {
        Value::Object(object) => object,
        _ => return Err(SignatureError::NotAnObject),
    };
    object.insert(
        SIGN_FIELD.to_string(),
        serde_json::json!({
            "owner": public_key_hex(signing_key),
            "sig": hex::encode(signature.to_bytes()),
        }),
    );
    Ok(Value::Object(object))
}

/// Hex encoded verifying key, the form used as an archiver's `publicKey`.
pub fn public_key_hex(signing_key: &SigningKey) -> String {
    hex::encode(signing_key.verifying_key().to_bytes())
}
