use sha2::{Digest, Sha256};

pub const DIGEST_LEN: usize = 32;

pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

/// NIST SP 800-56A concatenation KDF over SHA-256.
///
/// `out = H(1 || z || info) || H(2 || z || info) || ...`, truncated to `len`,
/// with the counter encoded as a big-endian u32.
pub fn concat_kdf(z: &[u8], info: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + DIGEST_LEN);
    let mut counter: u32 = 1;
    while out.len() < len {
        let mut h = Sha256::new();
        h.update(counter.to_be_bytes());
        h.update(z);
        h.update(info);
        out.extend_from_slice(&h.finalize());
        counter += 1;
    }
    out.truncate(len);
    out
}
