//! Error types for the viewer backend

use thiserror::Error;

/// Result type alias for viewer backend operations
pub type Result<T> = std::result::Result<T, PrismError>;

/// Which part of the hierarchy a lookup key addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Study,
    Series,
    Slice,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Study => write!(f, "study"),
            KeyKind::Series => write!(f, "series"),
            KeyKind::Slice => write!(f, "slice"),
        }
    }
}

/// Error types that can occur across the ingest/render/interpret pipeline
#[derive(Error, Debug)]
pub enum PrismError {
    #[error("Unparsable record: {0}")]
    UnparsableRecord(String),

    #[error("Missing required tag: {0}")]
    MissingRequiredTag(&'static str),

    #[error("Unknown {kind} key: {key}")]
    UnknownKey { kind: KeyKind, key: String },

    #[error("Invalid window: width must be positive, got {width}")]
    InvalidWindow { width: f64 },

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrismError {
    /// Create a new unknown-key error
    pub fn unknown_key(kind: KeyKind, key: impl Into<String>) -> Self {
        Self::UnknownKey {
            kind,
            key: key.into(),
        }
    }

    /// Create a new internal-consistency error
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::InternalConsistency(msg.into())
    }

    /// Stable machine-readable error kind, exposed alongside the human message
    pub fn kind(&self) -> &'static str {
        match self {
            PrismError::UnparsableRecord(_) => "unparsable_record",
            PrismError::MissingRequiredTag(_) => "missing_required_tag",
            PrismError::UnknownKey { .. } => "unknown_key",
            PrismError::InvalidWindow { .. } => "invalid_window",
            PrismError::ProviderUnavailable(_) => "provider_unavailable",
            PrismError::ProviderError(_) => "provider_error",
            PrismError::InternalConsistency(_) => "internal_consistency",
            PrismError::Storage(_) => "storage",
            PrismError::Io(_) => "io",
        }
    }
}

impl From<interp::InterpError> for PrismError {
    fn from(err: interp::InterpError) -> Self {
        match err {
            interp::InterpError::Unavailable(msg) => PrismError::ProviderUnavailable(msg),
            other => PrismError::ProviderError(other.to_string()),
        }
    }
}
