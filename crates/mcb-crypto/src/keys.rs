//! P-256 keypair handling and PEM encodings.
//!
//! Private keys are accepted as SEC1 (`EC PRIVATE KEY`) or PKCS#8
//! (`PRIVATE KEY`); public keys as SubjectPublicKeyInfo (`PUBLIC KEY`).
//! OpenSSL-generated SEC1 files often carry an `EC PARAMETERS` block in front
//! of the key; only the key block is read.

use std::path::Path;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

const SEC1_LABEL: &str = "EC PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Length in bytes of a P-256 private scalar.
pub const SCALAR_LEN: usize = 32;

/// Length in bytes of an uncompressed SEC1 P-256 point.
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no PEM block containing a private key")]
    MissingPrivateKeyBlock,
    #[error("invalid private key encoding")]
    InvalidPrivateKey,
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    #[error("invalid scalar: zero or not below the group order")]
    InvalidScalar,
    #[error("failed to encode key")]
    Encode,
}

/// A P-256 private scalar with its public point.
///
/// The secret scalar is zeroized on drop by `SecretKey`.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS random source.
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Build a keypair from a big-endian scalar.
    ///
    /// Fails when the scalar is zero or not below the curve order.
    pub fn from_scalar_bytes(bytes: &[u8; SCALAR_LEN]) -> Result<Self, KeyError> {
        let secret = SecretKey::from_bytes(bytes.into()).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self::from_secret(secret))
    }

    /// Parse a private key from PEM text (SEC1 or PKCS#8).
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        if let Some(block) = pem_block(pem, SEC1_LABEL) {
            let secret = SecretKey::from_sec1_pem(block).map_err(|_| KeyError::InvalidPrivateKey)?;
            return Ok(Self::from_secret(secret));
        }
        if let Some(block) = pem_block(pem, PKCS8_LABEL) {
            let secret =
                SecretKey::from_pkcs8_pem(block).map_err(|_| KeyError::InvalidPrivateKey)?;
            return Ok(Self::from_secret(secret));
        }
        Err(KeyError::MissingPrivateKeyBlock)
    }

    pub fn load_pem_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let pem = read_key_file(path.as_ref())?;
        Self::from_pem(&pem)
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Big-endian private scalar.
    pub fn scalar_bytes(&self) -> Zeroizing<[u8; SCALAR_LEN]> {
        Zeroizing::new(self.secret.to_bytes().into())
    }

    /// SEC1 `EC PRIVATE KEY` PEM, the form the node tooling expects.
    pub fn to_sec1_pem(&self) -> Result<Zeroizing<String>, KeyError> {
        self.secret
            .to_sec1_pem(LineEnding::LF)
            .map_err(|_| KeyError::Encode)
    }

    pub fn public_pem(&self) -> Result<String, KeyError> {
        public_key_to_pem(&self.public)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(public_key_bytes(&self.public)))
            .finish_non_exhaustive()
    }
}

/// Parse a SubjectPublicKeyInfo `PUBLIC KEY` PEM.
pub fn public_key_from_pem(pem: &str) -> Result<PublicKey, KeyError> {
    PublicKey::from_public_key_pem(pem.trim()).map_err(|_| KeyError::InvalidPublicKey)
}

pub fn load_public_key_file(path: impl AsRef<Path>) -> Result<PublicKey, KeyError> {
    let pem = read_key_file(path.as_ref())?;
    public_key_from_pem(&pem)
}

pub fn public_key_to_pem(public: &PublicKey) -> Result<String, KeyError> {
    public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|_| KeyError::Encode)
}

/// Uncompressed SEC1 encoding (`0x04 || X || Y`).
pub fn public_key_bytes(public: &PublicKey) -> Vec<u8> {
    public.to_encoded_point(false).as_bytes().to_vec()
}

fn read_key_file(path: &Path) -> Result<Zeroizing<String>, KeyError> {
    std::fs::read_to_string(path)
        .map(Zeroizing::new)
        .map_err(|source| KeyError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Slice out the first complete PEM block carrying `label`.
fn pem_block<'a>(pem: &'a str, label: &str) -> Option<&'a str> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let start = pem.find(&begin)?;
    let stop = pem[start..].find(&end)? + start + end.len();
    Some(&pem[start..stop])
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::pkcs8::EncodePrivateKey;

    #[test]
    fn test_public_matches_secret() {
        let kp = Keypair::generate();
        assert_eq!(kp.public(), &kp.secret().public_key());
        assert_eq!(public_key_bytes(kp.public()).len(), UNCOMPRESSED_POINT_LEN);
    }

    #[test]
    fn test_sec1_pem_round_trip() {
        let kp = Keypair::generate();
        let pem = kp.to_sec1_pem().unwrap();
        assert!(pem.contains("BEGIN EC PRIVATE KEY"));

        let loaded = Keypair::from_pem(&pem).unwrap();
        assert_eq!(*loaded.scalar_bytes(), *kp.scalar_bytes());
    }

    #[test]
    fn test_pkcs8_pem_accepted() {
        let kp = Keypair::generate();
        let pem = kp.secret().to_pkcs8_pem(LineEnding::LF).unwrap();
        assert!(pem.contains("BEGIN PRIVATE KEY"));

        let loaded = Keypair::from_pem(&pem).unwrap();
        assert_eq!(loaded.public(), kp.public());
    }

    #[test]
    fn test_ec_parameters_block_skipped() {
        let kp = Keypair::generate();
        let pem = format!(
            "-----BEGIN EC PARAMETERS-----\nBggqhkjOPQMBBw==\n-----END EC PARAMETERS-----\n{}",
            kp.to_sec1_pem().unwrap().as_str()
        );
        let loaded = Keypair::from_pem(&pem).unwrap();
        assert_eq!(loaded.public(), kp.public());
    }

    #[test]
    fn test_missing_private_block() {
        let kp = Keypair::generate();
        let pem = kp.public_pem().unwrap();
        assert!(matches!(
            Keypair::from_pem(&pem),
            Err(KeyError::MissingPrivateKeyBlock)
        ));
    }

    #[test]
    fn test_public_pem_round_trip() {
        let kp = Keypair::generate();
        let pem = kp.public_pem().unwrap();
        assert_eq!(&public_key_from_pem(&pem).unwrap(), kp.public());
    }

    #[test]
    fn test_zero_scalar_rejected() {
        assert!(matches!(
            Keypair::from_scalar_bytes(&[0u8; SCALAR_LEN]),
            Err(KeyError::InvalidScalar)
        ));
        assert!(matches!(
            Keypair::from_scalar_bytes(&[0xFF; SCALAR_LEN]),
            Err(KeyError::InvalidScalar)
        ));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let kp = Keypair::generate();
        let priv_path = dir.path().join("server.pem");
        let pub_path = dir.path().join("server_pub.pem");
        std::fs::write(&priv_path, kp.to_sec1_pem().unwrap().as_bytes()).unwrap();
        std::fs::write(&pub_path, kp.public_pem().unwrap()).unwrap();

        assert_eq!(Keypair::load_pem_file(&priv_path).unwrap().public(), kp.public());
        assert_eq!(&load_public_key_file(&pub_path).unwrap(), kp.public());

        let missing = dir.path().join("absent.pem");
        assert!(matches!(
            Keypair::load_pem_file(&missing),
            Err(KeyError::Io { .. })
        ));
    }
}
