//! Extensible key derivation: a reproducible keypair from a password.
//!
//! The password is stretched with Argon2id into a 32-byte block. That block
//! opens an unbounded byte stream; whenever a reader needs more bytes than
//! are buffered, the most recent block (the chaining value) is fed back
//! through Argon2id with the same salt and costs, and the result is appended:
//!
//! ```text
//! B0 = Argon2id(password)     stream = B0 || B1 || B2 || ...
//! Bi = Argon2id(B(i-1))
//! ```
//!
//! The stream seeds rejection sampling of a P-256 scalar, so the same password
//! always yields the same keypair no matter how many candidates are rejected.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::keys::{Keypair, SCALAR_LEN};

/// Passwords shorter than this are refused.
///
/// Counted in Unicode characters, not UTF-8 bytes: a six-character CJK
/// password (18 bytes) is refused even though byte-counting tools accept it.
pub const MIN_PASSWORD_LEN: usize = 12;

/// Bytes produced by each Argon2id invocation.
pub const BLOCK_LEN: usize = SCALAR_LEN;

const DERIVE_SALT: [u8; 32] = [
    0xe5, 0xe4, 0xa1, 0x12, 0x16, 0x46, 0x21, 0xb7, 0xdd, 0x73, 0x42, 0x29, 0x72, 0xdd, 0xb5, 0x18,
    0x75, 0x6d, 0x0a, 0x2a, 0x41, 0x99, 0x4b, 0x7c, 0x3a, 0x18, 0x93, 0x58, 0x76, 0xb2, 0x60, 0x8b,
];

#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error("need a strong password, at least {min} characters")]
    WeakPassword { min: usize },
    #[error("argon2 failure: {0}")]
    Hash(argon2::Error),
}

/// Argon2id cost parameters for the derivation stream.
///
/// `Default` is the fixed production set; keys derived under any other set
/// are unrelated to production keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeriveParams {
    /// Iterations.
    pub t_cost: u32,
    /// Memory in KiB.
    pub m_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl Default for DeriveParams {
    fn default() -> Self {
        Self {
            t_cost: 1,
            m_cost: 128 * 1024,
            p_cost: 2,
        }
    }
}

impl DeriveParams {
    fn hasher(&self) -> Result<Argon2<'static>, DeriveError> {
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(BLOCK_LEN))
            .map_err(DeriveError::Hash)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// One step of the chain: `Argon2id(input)` under the fixed salt.
pub fn next_block(
    hasher: &Argon2<'_>,
    input: &[u8],
) -> Result<Zeroizing<[u8; BLOCK_LEN]>, DeriveError> {
    let mut block = Zeroizing::new([0u8; BLOCK_LEN]);
    hasher
        .hash_password_into(input, &DERIVE_SALT, block.as_mut_slice())
        .map_err(DeriveError::Hash)?;
    Ok(block)
}

/// Lazily extended, deterministic byte stream seeded by a password.
///
/// Owned by a single derivation; bytes are served strictly in order.
pub struct DeriveStream {
    hasher: Argon2<'static>,
    buffer: Zeroizing<Vec<u8>>,
    consumed: usize,
    chain: Zeroizing<[u8; BLOCK_LEN]>,
}

impl DeriveStream {
    pub fn new(password: &[u8], params: &DeriveParams) -> Result<Self, DeriveError> {
        let hasher = params.hasher()?;
        let chain = next_block(&hasher, password)?;
        let buffer = Zeroizing::new(chain.to_vec());
        Ok(Self {
            hasher,
            buffer,
            consumed: 0,
            chain,
        })
    }

    /// Bytes handed out so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes produced (consumed or buffered) so far.
    pub fn produced(&self) -> usize {
        self.buffer.len()
    }

    /// Fill `out` with the next `out.len()` bytes of the stream.
    pub fn fill(&mut self, out: &mut [u8]) -> Result<(), DeriveError> {
        while self.buffer.len() - self.consumed < out.len() {
            self.extend()?;
        }
        let end = self.consumed + out.len();
        out.copy_from_slice(&self.buffer[self.consumed..end]);
        self.consumed = end;
        Ok(())
    }

    /// Return the next `n` bytes of the stream.
    pub fn read(&mut self, n: usize) -> Result<Zeroizing<Vec<u8>>, DeriveError> {
        let mut out = Zeroizing::new(vec![0u8; n]);
        self.fill(&mut out)?;
        Ok(out)
    }

    fn extend(&mut self) -> Result<(), DeriveError> {
        let block = next_block(&self.hasher, self.chain.as_slice())?;
        self.buffer.extend_from_slice(block.as_slice());
        self.chain = block;
        Ok(())
    }
}

/// Derive a keypair from `password` with the production cost parameters.
pub fn derive_keypair(password: &str) -> Result<Keypair, DeriveError> {
    derive_keypair_with(password, &DeriveParams::default())
}

pub fn derive_keypair_with(password: &str, params: &DeriveParams) -> Result<Keypair, DeriveError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DeriveError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    let mut stream = DeriveStream::new(password.as_bytes(), params)?;
    sample_keypair(|candidate| stream.fill(candidate))
}

/// Rejection-sample a scalar in `[1, n)` from successive 32-byte reads.
fn sample_keypair<F>(mut next: F) -> Result<Keypair, DeriveError>
where
    F: FnMut(&mut [u8]) -> Result<(), DeriveError>,
{
    let mut candidate = Zeroizing::new([0u8; SCALAR_LEN]);
    loop {
        next(candidate.as_mut_slice())?;
        if let Ok(keypair) = Keypair::from_scalar_bytes(&candidate) {
            return Ok(keypair);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Cheap costs so tests exercise the construction without 128 MiB hashes.
    pub(crate) const TEST_PARAMS: DeriveParams = DeriveParams {
        t_cost: 1,
        m_cost: 64,
        p_cost: 2,
    };

    #[test]
    fn test_weak_password_rejected() {
        for len in 0..MIN_PASSWORD_LEN {
            let pwd = "a".repeat(len);
            assert!(matches!(
                derive_keypair_with(&pwd, &TEST_PARAMS),
                Err(DeriveError::WeakPassword { min: MIN_PASSWORD_LEN })
            ));
        }
    }

    #[test]
    fn test_weak_password_checked_before_hashing() {
        // Production costs would take seconds; the guard must short-circuit
        assert!(matches!(
            derive_keypair("short"),
            Err(DeriveError::WeakPassword { .. })
        ));
    }

    #[test]
    fn test_length_counts_characters() {
        // 6 characters, 18 bytes
        assert!(matches!(
            derive_keypair_with("密码密码密码", &TEST_PARAMS),
            Err(DeriveError::WeakPassword { min: MIN_PASSWORD_LEN })
        ));
        // 11 characters, 22 bytes
        let pwd = "é".repeat(11);
        assert!(derive_keypair_with(&pwd, &TEST_PARAMS).is_err());
        let pwd = "é".repeat(12);
        assert!(derive_keypair_with(&pwd, &TEST_PARAMS).is_ok());
    }

    #[test]
    fn test_sampler_skips_out_of_range_candidates() {
        // All-ones is above the group order, zero is not a valid scalar
        let blocks = [[0xffu8; SCALAR_LEN], [0u8; SCALAR_LEN], [0x01u8; SCALAR_LEN]];
        let mut reads = 0;
        let keypair = sample_keypair(|out| {
            out.copy_from_slice(&blocks[reads]);
            reads += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(reads, 3);
        assert_eq!(*keypair.scalar_bytes(), [0x01u8; SCALAR_LEN]);
    }

    #[test]
    fn test_sampler_accepts_first_valid_candidate() {
        let mut reads = 0;
        let keypair = sample_keypair(|out| {
            out.fill(0x42);
            reads += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(reads, 1);
        assert_eq!(*keypair.scalar_bytes(), [0x42u8; SCALAR_LEN]);
    }

    #[test]
    fn test_sampler_propagates_stream_errors() {
        let err = sample_keypair(|_| Err(DeriveError::WeakPassword { min: 0 })).unwrap_err();
        assert!(matches!(err, DeriveError::WeakPassword { min: 0 }));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        for pwd in ["Correct-Horse-9", "W7!aB3?cD9#eF", "averyveryverylongpassphrase!!"] {
            let a = derive_keypair_with(pwd, &TEST_PARAMS).unwrap();
            let b = derive_keypair_with(pwd, &TEST_PARAMS).unwrap();
            assert_eq!(*a.scalar_bytes(), *b.scalar_bytes());
            assert_eq!(a.public(), b.public());
        }
    }

    #[test]
    fn test_different_passwords_differ() {
        let a = derive_keypair_with("first-password-1", &TEST_PARAMS).unwrap();
        let b = derive_keypair_with("first-password-2", &TEST_PARAMS).unwrap();
        assert_ne!(*a.scalar_bytes(), *b.scalar_bytes());
    }

    #[test]
    fn test_params_change_the_key() {
        let other = DeriveParams {
            t_cost: 2,
            ..TEST_PARAMS
        };
        let a = derive_keypair_with("same-password-here", &TEST_PARAMS).unwrap();
        let b = derive_keypair_with("same-password-here", &other).unwrap();
        assert_ne!(*a.scalar_bytes(), *b.scalar_bytes());
    }

    #[test]
    fn test_first_block_is_password_hash() {
        let mut stream = DeriveStream::new(b"stream-password", &TEST_PARAMS).unwrap();
        let hasher = TEST_PARAMS.hasher().unwrap();
        let b0 = next_block(&hasher, b"stream-password").unwrap();
        let b1 = next_block(&hasher, b0.as_slice()).unwrap();

        assert_eq!(stream.produced(), BLOCK_LEN);
        assert_eq!(stream.read(BLOCK_LEN).unwrap().as_slice(), b0.as_slice());
        assert_eq!(stream.produced(), BLOCK_LEN);

        // Extension chains from the previous block, not the password
        assert_eq!(stream.read(BLOCK_LEN).unwrap().as_slice(), b1.as_slice());
        assert_eq!(stream.consumed(), 2 * BLOCK_LEN);
    }

    #[test]
    fn test_split_reads_match_single_read() {
        let mut whole = DeriveStream::new(b"split-password", &TEST_PARAMS).unwrap();
        let expected = whole.read(100).unwrap();

        let mut split = DeriveStream::new(b"split-password", &TEST_PARAMS).unwrap();
        let mut got = split.read(7).unwrap().to_vec();
        got.extend_from_slice(&split.read(0).unwrap());
        got.extend_from_slice(&split.read(60).unwrap());
        got.extend_from_slice(&split.read(33).unwrap());
        assert_eq!(got.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_large_read_extends_repeatedly() {
        let mut stream = DeriveStream::new(b"large-read-password", &TEST_PARAMS).unwrap();
        let out = stream.read(5 * BLOCK_LEN + 1).unwrap();
        assert_eq!(out.len(), 5 * BLOCK_LEN + 1);
        assert_eq!(stream.produced(), 6 * BLOCK_LEN);
    }

    #[test]
    fn test_invalid_params_surface_as_hash_error() {
        let bad = DeriveParams {
            t_cost: 0,
            ..TEST_PARAMS
        };
        assert!(matches!(
            derive_keypair_with("long-enough-password", &bad),
            Err(DeriveError::Hash(_))
        ));
    }

    #[test]
    #[ignore = "runs Argon2id with the 128 MiB production cost"]
    fn test_production_derivation_is_deterministic() {
        let a = derive_keypair("Prod-Password-123!").unwrap();
        let b = derive_keypair("Prod-Password-123!").unwrap();
        assert_eq!(*a.scalar_bytes(), *b.scalar_bytes());
    }
}
