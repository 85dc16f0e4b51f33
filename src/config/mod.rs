//! Configuration module
//!
//! Handles loading and saving SBDP configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::{DEFAULT_PORT, MAX_PAYLOAD_LEN};
use crate::transport::{TransportConfig, DEFAULT_READ_CHUNK_SIZE};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Frame exchange settings
    #[serde(default)]
    pub transport: TransportSection,

    /// Loopback demo settings
    #[serde(default)]
    pub demo: DemoConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log filter directive, overrides `verbose` (e.g. "sbdp=trace")
    pub log_filter: Option<String>,
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSection {
    /// Largest payload accepted from a peer, in bytes
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: usize,
    /// Upper bound on a single read call, in bytes
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
}

fn default_max_payload_len() -> usize {
    MAX_PAYLOAD_LEN
}

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK_SIZE
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            max_payload_len: default_max_payload_len(),
            read_chunk_size: default_read_chunk_size(),
        }
    }
}

/// Demo configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Interface the demo server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port the demo server listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("sbdp/config.toml")),
            Some(PathBuf::from("./sbdp.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.transport.max_payload_len > MAX_PAYLOAD_LEN {
            return Err(ConfigError::Invalid {
                field: "transport.max_payload_len",
                reason: format!("must not exceed {}", MAX_PAYLOAD_LEN),
            });
        }
        if self.transport.read_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "transport.read_chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Transport settings in the form the transport layer takes
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new()
            .with_max_payload_len(self.transport.max_payload_len)
            .with_read_chunk_size(self.transport.read_chunk_size)
    }

    /// `host:port` the demo server binds to
    pub fn demo_addr(&self) -> String {
        format!("{}:{}", self.demo.bind_address, self.demo.port)
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            verbose: false,
            log_filter: Some("sbdp=debug".to_string()),
        },
        transport: TransportSection {
            max_payload_len: 16 * 1024 * 1024,
            ..Default::default()
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
