//! Configuration management for cosign
//!
//! Settings are read from `~/.cosign/config.toml`; defaults are used when the
//! file does not exist.

use crate::descriptor::CryptoFamily;
use crate::operation::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Home directory not found")]
    HomeDirectoryNotFound,
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chains: Vec<ChainConfig>,
    pub store: StoreConfig,
    pub coordinator: CoordinatorConfig,
    pub discovery: DiscoveryConfig,
    pub log: LogConfig,
}

/// Per-chain call layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub crypto_family: CryptoFamily,
    pub multisig_pallet: u8,
    pub as_multi_call: u8,
    pub cancel_as_multi_call: u8,
    pub proxy_pallet: u8,
    pub proxy_call: u8,
    /// `max_weight` attached to `as_multi`
    #[serde(default = "default_max_weight_ref_time")]
    pub max_weight_ref_time: u64,
    #[serde(default = "default_max_weight_proof_size")]
    pub max_weight_proof_size: u64,
}

fn default_max_weight_ref_time() -> u64 {
    10_000_000_000
}

fn default_max_weight_proof_size() -> u64 {
    1_000_000
}

/// Operation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory" or "file"
    pub backend: String,
    /// Directory for the file backend; defaults to `~/.cosign/operations`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Capacity of the incoming event channel
    pub event_channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl ChainConfig {
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.id.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chains: vec![
                ChainConfig {
                    id: "polkadot".to_string(),
                    name: "Polkadot".to_string(),
                    crypto_family: CryptoFamily::Standard,
                    multisig_pallet: 30,
                    as_multi_call: 1,
                    cancel_as_multi_call: 3,
                    proxy_pallet: 29,
                    proxy_call: 0,
                    max_weight_ref_time: default_max_weight_ref_time(),
                    max_weight_proof_size: default_max_weight_proof_size(),
                },
                ChainConfig {
                    id: "kusama".to_string(),
                    name: "Kusama".to_string(),
                    crypto_family: CryptoFamily::Standard,
                    multisig_pallet: 31,
                    as_multi_call: 1,
                    cancel_as_multi_call: 3,
                    proxy_pallet: 30,
                    proxy_call: 0,
                    max_weight_ref_time: default_max_weight_ref_time(),
                    max_weight_proof_size: default_max_weight_proof_size(),
                },
            ],
            store: StoreConfig {
                backend: "memory".to_string(),
                data_dir: None,
            },
            coordinator: CoordinatorConfig {
                event_channel_capacity: 1024,
            },
            discovery: DiscoveryConfig {
                enabled: true,
                poll_interval_secs: 60,
            },
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to default if file doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::ReadError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// `~/.cosign`
    pub fn home_dir() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirectoryNotFound)?;
        Ok(home.join(".cosign"))
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Directory used by the file store backend
    pub fn store_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::home_dir()?.join("operations")),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if chain.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "Chain id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(chain.id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "Duplicate chain id '{}'",
                    chain.id
                )));
            }
            if chain.multisig_pallet == chain.proxy_pallet {
                return Err(ConfigError::InvalidValue(format!(
                    "Chain '{}' uses the same pallet index for multisig and proxy",
                    chain.id
                )));
            }
        }

        if !matches!(self.store.backend.as_str(), "memory" | "file") {
            return Err(ConfigError::InvalidValue(format!(
                "Unknown store backend '{}'. Expected 'memory' or 'file'",
                self.store.backend
            )));
        }

        if self.coordinator.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "Coordinator event_channel_capacity must be positive".to_string(),
            ));
        }

        if self.discovery.enabled && self.discovery.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "Discovery poll_interval_secs must be positive".to_string(),
            ));
        }

        let level = self.log.level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid log level '{}'",
                self.log.level
            )));
        }

        Ok(())
    }

    /// Look up a chain by id
    pub fn chain(&self, chain_id: &ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.id == chain_id.as_str())
    }

    /// Get discovery poll interval as Duration
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery.poll_interval_secs)
    }
}
