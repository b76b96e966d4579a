//! mcb-callback entry point

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcb_callback::config::{CliOverrides, ServerConfig};
use mcb_callback::keystore::{password_from_env, KeyStore};
use mcb_callback::CallbackServer;

/// Risk-control callback server for an MPC signing node.
#[derive(Debug, Parser)]
#[command(name = "mcb-callback", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "MCB_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    address: Option<SocketAddr>,

    /// Callback server private key (PEM)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Decryption private key (PEM) for relayed raw-data signatures
    #[arg(long)]
    decrypt_key_path: Option<PathBuf>,

    /// MPC node public key (PEM)
    #[arg(long)]
    mpc_node_public_key_path: Option<PathBuf>,

    /// Randomly reject or defer non-keygen requests
    #[arg(long)]
    random: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            bind_addr: self.address,
            private_key_path: self.path.clone(),
            decrypt_key_path: self.decrypt_key_path.clone(),
            mpc_node_public_key_path: self.mpc_node_public_key_path.clone(),
            random_reject: self.random.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let password = password_from_env();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_toml(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;
    let config = config.with_overrides(&cli.overrides());
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Argon2 derivation runs on the blocking pool
    let keys = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || KeyStore::load(&config, password))
            .await??
    };
    info!(
        decrypt_key = keys.decrypt().map(|k| k.source().as_str()).unwrap_or("none"),
        "key material loaded"
    );

    let server = CallbackServer::new(config, keys)?;
    server.start().await?;

    Ok(())
}
