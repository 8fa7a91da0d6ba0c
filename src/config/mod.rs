pub mod config;

pub use config::{Config, ConfigError, InterpretationConfig, LoggingConfig, ServerConfig};

/// Structure representing application startup arguments or metadata.
#[derive(Debug)]
pub struct Cli {
    /// Path to the configuration file.
    pub config_path: String,
}

impl Cli {
    /// Creates a new `Cli` instance with the provided configuration path.
    ///
    /// # Arguments
    /// - `config_path`: The path to the configuration file.
    pub fn new(config_path: String) -> Self {
        Self { config_path }
    }

    /// Build a `Cli` from process arguments; the first positional argument is
    /// the config path, defaulting to `prism.toml` in the working directory.
    pub fn from_env() -> Self {
        let config_path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| "prism.toml".to_string());
        Self::new(config_path)
    }
}
