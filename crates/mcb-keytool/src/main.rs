//! mcb-keytool: provision and exercise callback server key material.

use std::{fs, io::Write, path::Path, path::PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

use mcb_crypto::keys::{load_public_key_file, Keypair};
use mcb_crypto::{derive_keypair, ecies, signature};

/// Key tool for the MPC callback server
#[derive(Parser, Debug)]
#[command(name = "mcb-keytool", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Derive the decryption keypair from a password
    Derive {
        #[arg(long, env = "MCB_DECRYPT_PASSWORD", hide_env_values = true)]
        password: String,
        /// Write the private key (SEC1 PEM) here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a fresh random keypair
    Generate {
        /// Write the private key (SEC1 PEM) here
        #[arg(long)]
        out: PathBuf,
    },
    /// ECIES-encrypt a hex payload for a public key
    Encrypt {
        /// Recipient public key (PEM)
        #[arg(long)]
        public_key: PathBuf,
        /// Hex-encoded plaintext
        payload: String,
    },
    /// Sign a hex payload, printing the hex DER signature
    Sign {
        /// Signer private key (PEM)
        #[arg(long)]
        private_key: PathBuf,
        /// Hex-encoded payload
        payload: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output = run(cli.command)?;
    println!("{}", output.trim_end());
    Ok(())
}

fn run(command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Derive { password, out } => {
            let password = Zeroizing::new(password);
            derive(&password, out.as_deref())
        }
        Commands::Generate { out } => generate(&out),
        Commands::Encrypt {
            public_key,
            payload,
        } => encrypt(&public_key, &payload),
        Commands::Sign {
            private_key,
            payload,
        } => sign(&private_key, &payload),
    }
}

fn derive(password: &str, out: Option<&Path>) -> anyhow::Result<String> {
    let keypair = derive_keypair(password)?;
    if let Some(out) = out {
        write_private_key(&keypair, out)?;
    }
    Ok(keypair.public_pem()?)
}

fn generate(out: &Path) -> anyhow::Result<String> {
    let keypair = Keypair::generate();
    write_private_key(&keypair, out)?;
    Ok(keypair.public_pem()?)
}

fn encrypt(public_key: &Path, payload: &str) -> anyhow::Result<String> {
    let recipient = load_public_key_file(public_key)?;
    let plaintext = hex::decode(payload).context("payload is not hex")?;
    Ok(hex::encode(ecies::encrypt(&recipient, &plaintext)?))
}

fn sign(private_key: &Path, payload: &str) -> anyhow::Result<String> {
    let keypair = Keypair::load_pem_file(private_key)?;
    Ok(signature::sign(keypair.secret(), payload)?)
}

fn write_private_key(keypair: &Keypair, out: &Path) -> anyhow::Result<()> {
    if out.exists() {
        bail!("refusing to overwrite {}", out.display());
    }
    let pem = keypair.to_sec1_pem()?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(out)
        .with_context(|| format!("create {}", out.display()))?;
    file.write_all(pem.as_bytes())?;
    info!(path = %out.display(), "wrote private key");
    Ok(())
}
