pub mod anthropic;
pub mod client;
mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;

/// Incremental text deltas from a streaming completion, in generation order.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("failed to send request to LLM API: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse LLM API response: {0}")]
    Parse(String),

    #[error("LLM stream failed: {0}")]
    Stream(String),
}

/// A text-generation backend usable by every agent phase.
///
/// Implementations hold no per-request state and are shared across requests
/// behind an `Arc`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_message: &str,
    ) -> Result<LlmResponse, LlmError>;

    /// Open a streaming completion. Dropping the returned stream closes the
    /// underlying connection.
    async fn stream(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        user_message: &str,
    ) -> Result<TextStream, LlmError>;
}
