//! Process-lifetime key material.
//!
//! Loaded once before the server binds and never reloaded. Missing or
//! unparseable key files abort startup.

use std::path::Path;

use mcb_crypto::derive::{derive_keypair_with, DeriveError, DeriveParams};
use mcb_crypto::keys::{load_public_key_file, KeyError, Keypair};
use mcb_crypto::{PublicKey, SecretKey};
use tracing::info;
use zeroize::Zeroizing;

use crate::config::ServerConfig;

/// Environment variable holding the password for a derived decryption key.
pub const DECRYPT_PASSWORD_ENV: &str = "MCB_DECRYPT_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("load callback server keypair failed: {0}")]
    ServerKey(#[source] KeyError),
    #[error("load mpc-node public key failed: {0}")]
    MpcNodeKey(#[source] KeyError),
    #[error("load decryption key failed: {0}")]
    DecryptKey(#[source] KeyError),
    #[error("derive decryption key failed: {0}")]
    DerivedKey(#[source] DeriveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptKeySource {
    File,
    Password,
}

impl DecryptKeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecryptKeySource::File => "file",
            DecryptKeySource::Password => "password",
        }
    }
}

pub struct DecryptKey {
    keypair: Keypair,
    source: DecryptKeySource,
}

impl DecryptKey {
    pub fn secret(&self) -> &SecretKey {
        self.keypair.secret()
    }

    pub fn public(&self) -> &PublicKey {
        self.keypair.public()
    }

    pub fn source(&self) -> DecryptKeySource {
        self.source
    }
}

/// Immutable key material shared by every request.
pub struct KeyStore {
    server: Keypair,
    mpc_node: PublicKey,
    decrypt: Option<DecryptKey>,
}

impl KeyStore {
    pub fn new(server: Keypair, mpc_node: PublicKey) -> Self {
        Self {
            server,
            mpc_node,
            decrypt: None,
        }
    }

    pub fn with_decrypt_key(mut self, keypair: Keypair, source: DecryptKeySource) -> Self {
        self.decrypt = Some(DecryptKey { keypair, source });
        self
    }

    /// Load everything the config names.
    ///
    /// The decryption key comes from `decrypt_key_path` when set, otherwise
    /// from `password` when given, otherwise it is absent.
    pub fn load(
        config: &ServerConfig,
        password: Option<Zeroizing<String>>,
    ) -> Result<Self, KeyStoreError> {
        Self::load_with_params(config, password, &DeriveParams::default())
    }

    pub fn load_with_params(
        config: &ServerConfig,
        password: Option<Zeroizing<String>>,
        params: &DeriveParams,
    ) -> Result<Self, KeyStoreError> {
        let mpc_node = load_public_key_file(&config.mpc_node_public_key_path)
            .map_err(KeyStoreError::MpcNodeKey)?;
        let server = Keypair::load_pem_file(&config.private_key_path)
            .map_err(KeyStoreError::ServerKey)?;
        info!(
            path = %config.private_key_path.display(),
            "loaded callback server keypair"
        );

        let store = Self::new(server, mpc_node);
        match (&config.decrypt_key_path, password) {
            (Some(path), _) => {
                let keypair = load_decrypt_file(path)?;
                info!(path = %path.display(), "loaded decryption key");
                Ok(store.with_decrypt_key(keypair, DecryptKeySource::File))
            }
            (None, Some(password)) => {
                let keypair =
                    derive_keypair_with(&password, params).map_err(KeyStoreError::DerivedKey)?;
                info!("derived decryption key from password");
                Ok(store.with_decrypt_key(keypair, DecryptKeySource::Password))
            }
            (None, None) => {
                info!("no decryption key configured; relayed signatures will not be decrypted");
                Ok(store)
            }
        }
    }

    pub fn server(&self) -> &Keypair {
        &self.server
    }

    pub fn mpc_node(&self) -> &PublicKey {
        &self.mpc_node
    }

    pub fn decrypt(&self) -> Option<&DecryptKey> {
        self.decrypt.as_ref()
    }
}

fn load_decrypt_file(path: &Path) -> Result<Keypair, KeyStoreError> {
    Keypair::load_pem_file(path).map_err(KeyStoreError::DecryptKey)
}

/// Take the derivation password from the environment, treating empty as unset.
///
/// The variable is removed once read so it does not linger in the process
/// environment.
pub fn password_from_env() -> Option<Zeroizing<String>> {
    let password = std::env::var(DECRYPT_PASSWORD_ENV).ok().map(Zeroizing::new);
    std::env::remove_var(DECRYPT_PASSWORD_ENV);
    password.filter(|p| !p.is_empty())
}
