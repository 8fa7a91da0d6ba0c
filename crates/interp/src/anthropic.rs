//! Anthropic Messages API implementation of [`Interpreter`]

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::InterpreterConfig;
use crate::error::{InterpError, Result};
use crate::types::{Interpretation, SampledImage, TokenUsage};
use crate::Interpreter;

/// API version header required by the Messages API
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// System prompt steering the provider towards short, structured findings
const SYSTEM_PROMPT: &str = "You are a medical imaging AI assistant. Provide CONCISE interpretations.

IMPORTANT: This is for educational/research purposes only, NOT clinical use.

Response format (be brief, use bullet points):

**CRITICAL FINDINGS** (if any)
- List urgent/abnormal findings first
- Be specific: location, size, characteristics

**NORMAL STRUCTURES**
- List organs/structures that appear normal
- Keep each item to one line

**IMAGE QUALITY**
- Brief note on quality/limitations

Keep total response under 300 words. Be direct and clinical.";

/// Interpretation client backed by the Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicInterpreter {
    http: reqwest::Client,
    config: InterpreterConfig,
    api_key: Option<String>,
}

impl AnthropicInterpreter {
    /// Create a client from configuration.
    ///
    /// Missing credentials are not an error here; the client is constructed
    /// in an "unavailable" state and reports so via [`Interpreter::is_available`].
    pub fn new(config: InterpreterConfig) -> Result<Self> {
        let api_key = config.resolved_api_key();
        if api_key.is_none() {
            warn!("no interpretation API key configured; provider will report unavailable");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(InterpError::Transport)?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the user content blocks: optional context, the instruction, then images
    fn build_user_content(
        images: &[SampledImage],
        modality: &str,
        context: Option<&str>,
    ) -> Vec<Value> {
        let mut content = Vec::with_capacity(images.len() + 2);

        if let Some(ctx) = context {
            content.push(json!({
                "type": "text",
                "text": format!("Clinical context: {}", ctx),
            }));
        }

        content.push(json!({
            "type": "text",
            "text": format!(
                "Analyze this {} image. List critical findings first, then normal structures.",
                modality
            ),
        }));

        for img in images {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": img.media_type,
                    "data": img.data,
                },
            }));
        }

        content
    }
}

#[async_trait]
impl Interpreter for AnthropicInterpreter {
    async fn interpret(
        &self,
        images: &[SampledImage],
        modality: &str,
        context: Option<&str>,
    ) -> Result<Interpretation> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            InterpError::unavailable("interpretation API key is not configured")
        })?;

        if images.is_empty() {
            return Err(InterpError::NoImages);
        }

        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [{
                "role": "user",
                "content": Self::build_user_content(images, modality, context),
            }],
        });

        debug!(
            model = %self.config.model,
            images = images.len(),
            "submitting interpretation request"
        );

        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Surface the provider's own message when it sends one
            let detail = response
                .json::<ApiErrorEnvelope>()
                .await
                .ok()
                .map(|e| e.error.message)
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(InterpError::provider(format!(
                "provider returned {}: {}",
                status, detail
            )));
        }

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| InterpError::MalformedResponse(e.to_string()))?;

        let text: String = message
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(InterpError::MalformedResponse(
                "provider response contained no text blocks".to_string(),
            ));
        }

        Ok(Interpretation {
            text,
            model: message.model,
            usage: TokenUsage {
                input_tokens: message.usage.input_tokens,
                output_tokens: message.usage.output_tokens,
            },
        })
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    usage: UsageBody,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
