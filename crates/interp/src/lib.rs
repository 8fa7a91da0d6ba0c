//! AI interpretation client for sampled medical image series
//!
//! This crate wraps the external interpretation provider (the Anthropic
//! Messages API) behind the [`Interpreter`] trait so the rest of the system
//! only ever sees "images in, findings text out". The provider call is the
//! single network hop of the whole pipeline; everything here is built to be
//! safely cancelable so a dropped request never leaks state upstream.
//!
//! # Features
//! - [`Interpreter`] trait for pluggable providers (and test doubles)
//! - [`AnthropicInterpreter`]: Messages API implementation over reqwest
//! - Availability probing without issuing a request

pub mod anthropic;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use anthropic::AnthropicInterpreter;
pub use config::InterpreterConfig;
pub use error::{InterpError, Result};
pub use types::{Interpretation, SampledImage, TokenUsage};

use async_trait::async_trait;

/// Default model requested from the provider
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default token budget for a single interpretation
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Abstraction over the external interpretation provider.
///
/// Implementations must be cancel-safe: dropping the `interpret` future has
/// to abort the underlying request without leaving shared state behind.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Submit a set of sampled images for interpretation.
    ///
    /// `modality` names the acquisition type (e.g. "MRI", "CT"); `context`
    /// carries optional free-text clinical context supplied by the caller.
    async fn interpret(
        &self,
        images: &[SampledImage],
        modality: &str,
        context: Option<&str>,
    ) -> Result<Interpretation>;

    /// Whether the provider can be called at all (e.g. credentials present).
    fn is_available(&self) -> bool;
}
