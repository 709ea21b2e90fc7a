//! OpenRouter chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sidequest_shared::{AppConfig, Result, SidequestError, validate_api_key};
use tracing::{debug, instrument};

use super::{GenerationRequest, GenerationService};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("Sidequest/", env!("CARGO_PKG_VERSION"));

/// Longest error body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

/// Calls `{base_url}/chat/completions` with bearer auth.
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SidequestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build from config; fails when the API key env var is unset.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = validate_api_key(config)?;
        Self::new(
            api_key,
            &config.openrouter.default_model,
            &config.openrouter.base_url,
            Duration::from_secs(config.generation.stage_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationService for OpenRouterClient {
    #[instrument(skip_all, fields(stage = %request.stage, model = %self.model))]
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let user_content = serde_json::to_string_pretty(&request.payload)
            .map_err(|e| SidequestError::parse(format!("failed to render payload: {e}")))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user".into(),
                    content: user_content,
                },
            ],
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SidequestError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SidequestError::RateLimited(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(SidequestError::Generation(format!("HTTP {status}: {excerpt}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SidequestError::parse(format!("malformed completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .ok_or_else(|| SidequestError::parse("completion response has no message content"))?;

        debug!(chars = content.len(), "generation complete");
        Ok(content)
    }
}
