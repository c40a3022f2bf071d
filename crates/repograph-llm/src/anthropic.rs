//! Anthropic Claude API oracle (non-streaming Messages API)

use crate::provider::{LlmError, LlmOracle, LlmRequest, LlmResult};
use repograph_core::config::LlmConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicOracle {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    /// Build from config; `None` when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let mut oracle = Self::new(api_key);
        if let Some(model) = &config.model {
            oracle.default_model = model.clone();
        }
        oracle.temperature = config.temperature;
        oracle.max_tokens = config.max_tokens;
        Some(oracle)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmOracle for AnthropicOracle {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        let body = MessagesRequest {
            model: request.model.unwrap_or_else(|| self.default_model.clone()),
            messages: vec![ApiMessage {
                role: "user",
                content: request.prompt,
            }],
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
            system: request.system,
        };

        debug!("anthropic request: model={}", body.model);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("anthropic error {}: {}", status, error_text);
            return Err(match status.as_u16() {
                401 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited {
                    retry_after_ms: 60_000,
                },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::InvalidResponse("empty completion".into()));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}
