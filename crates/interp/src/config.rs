//! Configuration for the interpretation provider

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

/// Configuration for the interpretation provider client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Provider API key. When absent the client reports itself unavailable
    /// instead of failing requests at call time.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model requested from the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Token budget for a single interpretation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds. Timeouts surface as transport errors;
    /// the caller decides whether to retry on a later request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl InterpreterConfig {
    /// Resolve the API key from config or the conventional environment variable
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_request_timeout() -> u64 {
    120_000
}
