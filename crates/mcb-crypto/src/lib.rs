#![forbid(unsafe_code)]

//! Cryptographic core of the MPC node callback service.
//!
//! One curve (P-256) and one hash (SHA-256):
//! - `signature`: detached ECDSA signatures over hex payloads
//! - `ecies`: decryption of artifacts the node relays to this service
//! - `derive`: reproducible keypairs from a password
//! - `keys`: keypair and PEM handling

pub mod hash;
pub mod keys;
pub mod signature;
pub mod ecies;
pub mod derive;

#[cfg(test)]
mod proptests;

pub use derive::{derive_keypair, DeriveError, DeriveParams};
pub use ecies::EciesError;
pub use keys::{KeyError, Keypair};
pub use p256::{PublicKey, SecretKey};
pub use signature::SignatureError;
