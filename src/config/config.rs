use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::storage::StorageConfig;
use interp::InterpreterConfig;

/// Errors produced while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Server id must not be empty")]
    InvalidServerId,

    #[error("Invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("Interpretation sample count must be at least 1")]
    InvalidSampleCount,
}

/// Top-level application configuration
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub interpretation: InterpretationConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-references, required fields, etc.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.id.trim().is_empty() {
            return Err(ConfigError::InvalidServerId);
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::InvalidBindAddress(
                self.server.bind_address.clone(),
            ));
        }
        if self.interpretation.sample_count == 0 {
            return Err(ConfigError::InvalidSampleCount);
        }
        Ok(())
    }
}

/// Server identity and bind settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub id: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            id: "prism".to_string(),
            log_level: default_log_level(),
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_log_file_path")]
    pub log_file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_to_file: false,
            log_file_path: default_log_file_path(),
        }
    }
}

/// Tunables for series interpretation
#[derive(Debug, Deserialize)]
pub struct InterpretationConfig {
    /// Number of evenly-spaced slices sampled from a series for the provider.
    /// Capped at the series length per request.
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
}

impl Default for InterpretationConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
        }
    }
}

/// Default log level for the server configuration
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8000
}

fn default_log_file_path() -> String {
    "prism.log".to_string()
}

fn default_sample_count() -> usize {
    5
}
