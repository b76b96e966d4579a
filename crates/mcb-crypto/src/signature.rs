//! Detached ECDSA P-256 signatures over SHA-256 digests.
//!
//! Payloads travel as hex strings: the hex text is decoded, the raw bytes are
//! hashed, and the digest is signed. Signatures are ASN.1 DER, hex encoded.
//! Every signature draws a fresh nonce from the OS random source.

use p256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;

use crate::hash::sha256;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("payload is not valid hex")]
    MalformedPayload,
    #[error("signing failed")]
    SignFailed,
}

/// Sign raw payload bytes, returning a hex DER signature.
pub fn sign_bytes(secret: &SecretKey, payload: &[u8]) -> Result<String, SignatureError> {
    let digest = sha256(payload);
    let signing_key = SigningKey::from(secret);
    let signature: Signature = signing_key
        .sign_prehash_with_rng(&mut OsRng, &digest)
        .map_err(|_| SignatureError::SignFailed)?;
    Ok(hex::encode(signature.to_der().as_bytes()))
}

/// Sign a hex-encoded payload, returning a hex DER signature.
pub fn sign(secret: &SecretKey, hex_payload: &str) -> Result<String, SignatureError> {
    let payload = hex::decode(hex_payload).map_err(|_| SignatureError::MalformedPayload)?;
    sign_bytes(secret, &payload)
}

/// Verify a hex DER signature over raw payload bytes.
///
/// Malformed signatures and mismatches both yield `false`.
pub fn verify_bytes(public: &PublicKey, payload: &[u8], hex_signature: &str) -> bool {
    let Ok(der) = hex::decode(hex_signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&der) else {
        return false;
    };
    let digest = sha256(payload);
    VerifyingKey::from(public)
        .verify_prehash(&digest, &signature)
        .is_ok()
}

/// Verify a hex DER signature over a hex-encoded payload.
pub fn verify(public: &PublicKey, hex_payload: &str, hex_signature: &str) -> bool {
    match hex::decode(hex_payload) {
        Ok(payload) => verify_bytes(public, &payload, hex_signature),
        Err(_) => false,
    }
}
