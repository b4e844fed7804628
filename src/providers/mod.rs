//! LLM provider boundary.
//!
//! Every provider is reached through [`TextGenerator`]: a prompt plus an
//! optional model override in, generated text out. Network details, auth
//! headers and payload shapes stay inside the individual clients.

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::ChatCompletionsClient;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::ProviderKind;

// Sampling temperature shared by all providers
pub(crate) const TEMPERATURE: f32 = 0.2;

/// Core trait every provider client implements.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`, using `model` instead of the client default when given.
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String, ProviderError>;

    /// Provider name (e.g. "openai", "anthropic").
    fn provider_name(&self) -> &'static str;
}

/// Picks the client for `kind`.
pub fn build_provider(
    kind: ProviderKind,
    api_key: &str,
    client: reqwest::Client,
) -> Box<dyn TextGenerator> {
    match kind {
        ProviderKind::OpenAi => Box::new(ChatCompletionsClient::openai(client, api_key)),
        ProviderKind::AiPipe => Box::new(ChatCompletionsClient::aipipe(client, api_key)),
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(client, api_key)),
        ProviderKind::Gemini => Box::new(GeminiClient::new(client, api_key)),
    }
}

// Maps a non-success HTTP status, reading the body only to drain it
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // Body may echo request content; drop it
    let _ = response.bytes().await;
    tracing::warn!(status = status.as_u16(), "provider returned error status");
    Err(ProviderError::from_status(status.as_u16()))
}
