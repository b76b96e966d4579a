use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    // Key material
    pub private_key_path: PathBuf,
    pub decrypt_key_path: Option<PathBuf>,
    pub mpc_node_public_key_path: PathBuf,

    /// Randomly reject or defer non-keygen requests.
    pub random_reject: bool,

    pub max_body_size: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            private_key_path: PathBuf::from("./callback_server_private.pem"),
            decrypt_key_path: None,
            mpc_node_public_key_path: PathBuf::from("./mpc_node_public.pem"),
            random_reject: false,
            max_body_size: 1024 * 1024, // 1MB
            log_level: "info".to_string(),
        }
    }
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_addr: Option<SocketAddr>,
    pub private_key_path: Option<PathBuf>,
    pub decrypt_key_path: Option<PathBuf>,
    pub mpc_node_public_key_path: Option<PathBuf>,
    pub random_reject: Option<bool>,
}

impl ServerConfig {
    pub fn from_toml(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `MCB_*` environment variables on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(addr) = get("MCB_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid MCB_BIND_ADDR: {}", e)))?;
        }

        if let Some(path) = get("MCB_PRIVATE_KEY_PATH") {
            self.private_key_path = PathBuf::from(path);
        }

        if let Some(path) = get("MCB_DECRYPT_KEY_PATH") {
            self.decrypt_key_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        if let Some(path) = get("MCB_MPC_NODE_PUBLIC_KEY_PATH") {
            self.mpc_node_public_key_path = PathBuf::from(path);
        }

        if let Some(flag) = get("MCB_RANDOM_REJECT") {
            self.random_reject = parse_bool(&flag).ok_or_else(|| {
                ConfigError::Invalid(format!("Invalid MCB_RANDOM_REJECT: {}", flag))
            })?;
        }

        if let Some(size) = get("MCB_MAX_BODY_SIZE") {
            self.max_body_size = size
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid MCB_MAX_BODY_SIZE: {}", e)))?;
        }

        Ok(())
    }

    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(addr) = overrides.bind_addr {
            self.bind_addr = addr;
        }
        if let Some(path) = &overrides.private_key_path {
            self.private_key_path = path.clone();
        }
        if let Some(path) = &overrides.decrypt_key_path {
            self.decrypt_key_path = Some(path.clone());
        }
        if let Some(path) = &overrides.mpc_node_public_key_path {
            self.mpc_node_public_key_path = path.clone();
        }
        if let Some(flag) = overrides.random_reject {
            self.random_reject = flag;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid("max_body_size must be > 0".to_string()));
        }

        if self.private_key_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("private_key_path must be set".to_string()));
        }

        if self.mpc_node_public_key_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "mpc_node_public_key_path must be set".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
