//! Common types for interpretation requests

use serde::{Deserialize, Serialize};

/// One rendered slice image handed to the provider
#[derive(Debug, Clone)]
pub struct SampledImage {
    /// Base64-encoded image payload
    pub data: String,

    /// Media type of the payload, e.g. "image/png"
    pub media_type: String,
}

impl SampledImage {
    /// Create a PNG sampled image from an already base64-encoded payload
    pub fn png(data: String) -> Self {
        Self {
            data,
            media_type: "image/png".to_string(),
        }
    }
}

/// Token accounting reported by the provider for one request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A successful interpretation returned by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    /// Free-text findings
    pub text: String,

    /// Model that produced the findings
    pub model: String,

    /// Token usage counters for the request
    pub usage: TokenUsage,
}
