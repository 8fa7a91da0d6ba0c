//! Error types for interpretation requests

use thiserror::Error;

/// Result type alias for interpretation operations
pub type Result<T> = std::result::Result<T, InterpError>;

/// Error types that can occur while requesting an interpretation
#[derive(Error, Debug)]
pub enum InterpError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("No images supplied for interpretation")]
    NoImages,
}

impl InterpError {
    /// Create a new unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Whether a retry on a later request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, InterpError::NoImages)
    }
}
