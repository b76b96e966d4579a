//! ECIES over P-256 with AES-128-CTR and HMAC-SHA256.
//!
//! Ciphertext layout, matching the go-ethereum `ECIES_AES128_SHA256` suite the
//! node encrypts with:
//!
//! ```text
//! R (65, uncompressed) || IV (16) || AES-128-CTR(m) || HMAC-SHA256 tag (32)
//! ```
//!
//! `K = ConcatKDF(ECDH_x, 32)`, `Ke = K[..16]`, `Km = SHA-256(K[16..])`, and the
//! tag covers `IV || ciphertext`. The tag is checked before anything is
//! decrypted.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use p256::ecdh::{diffie_hellman, EphemeralSecret};
use p256::{PublicKey, SecretKey};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::hash::{concat_kdf, sha256, DIGEST_LEN};
use crate::keys::{public_key_bytes, UNCOMPRESSED_POINT_LEN};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const KEY_LEN: usize = 16;
const IV_LEN: usize = 16;
const TAG_LEN: usize = DIGEST_LEN;

#[derive(Debug, thiserror::Error)]
pub enum EciesError {
    #[error("ciphertext is not valid hex")]
    Decode,
    #[error("invalid ephemeral public key")]
    InvalidPublicKey,
    #[error("invalid message")]
    InvalidMessage,
    #[error("encryption failed")]
    EncryptFailed,
}

impl EciesError {
    /// True when the input could not even be decoded, as opposed to being
    /// structurally or cryptographically invalid.
    pub fn is_decode(&self) -> bool {
        matches!(self, EciesError::Decode)
    }
}

struct SessionKeys {
    enc: Zeroizing<[u8; KEY_LEN]>,
    mac: Zeroizing<[u8; DIGEST_LEN]>,
}

fn session_keys(shared_x: &[u8]) -> SessionKeys {
    let k = Zeroizing::new(concat_kdf(shared_x, &[], 2 * KEY_LEN));
    let mut enc = Zeroizing::new([0u8; KEY_LEN]);
    enc.copy_from_slice(&k[..KEY_LEN]);
    SessionKeys {
        enc,
        mac: Zeroizing::new(sha256(&k[KEY_LEN..])),
    }
}

fn message_tag(mac_key: &[u8], em: &[u8]) -> Result<HmacSha256, EciesError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|_| EciesError::InvalidMessage)?;
    mac.update(em);
    Ok(mac)
}

/// Encrypt `plaintext` to `recipient`.
pub fn encrypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, EciesError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let shared = ephemeral.diffie_hellman(recipient);
    let keys = session_keys(shared.raw_secret_bytes());

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut em = Vec::with_capacity(IV_LEN + plaintext.len());
    em.extend_from_slice(&iv);
    em.extend_from_slice(plaintext);
    let mut cipher = Aes128Ctr::new_from_slices(keys.enc.as_slice(), &iv)
        .map_err(|_| EciesError::EncryptFailed)?;
    cipher.apply_keystream(&mut em[IV_LEN..]);

    let tag = message_tag(keys.mac.as_slice(), &em)?.finalize().into_bytes();

    let mut out = public_key_bytes(&ephemeral.public_key());
    out.extend_from_slice(&em);
    out.extend_from_slice(&tag);
    Ok(out)
}

/// Decrypt a ciphertext addressed to `secret`.
pub fn decrypt(secret: &SecretKey, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, EciesError> {
    let first = *ciphertext.first().ok_or(EciesError::InvalidMessage)?;
    match first {
        0x02..=0x04 => {
            if ciphertext.len() < UNCOMPRESSED_POINT_LEN + TAG_LEN + 1 {
                return Err(EciesError::InvalidMessage);
            }
        }
        _ => return Err(EciesError::InvalidPublicKey),
    }

    // Compressed prefixes pass the length gate but never parse as 65 bytes
    let ephemeral = PublicKey::from_sec1_bytes(&ciphertext[..UNCOMPRESSED_POINT_LEN])
        .map_err(|_| EciesError::InvalidPublicKey)?;
    let shared = diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());
    let keys = session_keys(shared.raw_secret_bytes());

    let tag_start = ciphertext.len() - TAG_LEN;
    let em = &ciphertext[UNCOMPRESSED_POINT_LEN..tag_start];
    message_tag(keys.mac.as_slice(), em)?
        .verify_slice(&ciphertext[tag_start..])
        .map_err(|_| EciesError::InvalidMessage)?;

    if em.len() < IV_LEN {
        return Err(EciesError::InvalidMessage);
    }
    let (iv, body) = em.split_at(IV_LEN);
    let mut plaintext = Zeroizing::new(body.to_vec());
    let mut cipher = Aes128Ctr::new_from_slices(keys.enc.as_slice(), iv)
        .map_err(|_| EciesError::InvalidMessage)?;
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

/// Decrypt a hex ciphertext and return the plaintext hex encoded.
pub fn decrypt_hex(secret: &SecretKey, hex_ciphertext: &str) -> Result<String, EciesError> {
    let ciphertext = hex::decode(hex_ciphertext).map_err(|_| EciesError::Decode)?;
    let plaintext = decrypt(secret, &ciphertext)?;
    Ok(hex::encode(plaintext.as_slice()))
}
