use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{TEMPERATURE, TextGenerator, check_status};
use crate::error::ProviderError;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const AIPIPE_URL: &str = "https://aipipe.org/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

// Chat completions request format
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

// Chat completions response format
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion endpoints (OpenAI, AI-Pipe).
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    api_key: String,
    url: &'static str,
    name: &'static str,
}

impl ChatCompletionsClient {
    pub fn openai(client: reqwest::Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            url: OPENAI_URL,
            name: "openai",
        }
    }

    pub fn aipipe(client: reqwest::Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            url: AIPIPE_URL,
            name: "aipipe",
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    #[instrument(skip(self, prompt), fields(provider = self.name))]
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: model.unwrap_or(DEFAULT_MODEL),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        debug!(model = request.model, "sending chat completion request");

        let response = self
            .client
            .post(self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: ChatResponse = check_status(response).await?.json().await?;

        extract_content(body)
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

fn extract_content(body: ChatResponse) -> Result<String, ProviderError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ProviderError::MalformedResponse)
}
