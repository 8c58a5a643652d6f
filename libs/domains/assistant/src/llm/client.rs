use async_trait::async_trait;
use core_config::llm::LlmConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AssistantError, AssistantResult};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat completion backend. Tests substitute a scripted implementation.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Returns the assistant message content of the first choice.
    async fn complete(&self, request: ChatRequest) -> AssistantResult<String>;
}

/// OpenAI-compatible chat client pointed at the Groq endpoint.
pub struct GroqChatClient {
    http: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct WirePayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

impl GroqChatClient {
    pub fn new(config: LlmConfig) -> AssistantResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AssistantError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ChatCompletion for GroqChatClient {
    async fn complete(&self, request: ChatRequest) -> AssistantResult<String> {
        let payload = WirePayload {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(&self.config.chat_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "LLM request failed");
                AssistantError::Upstream("Could not reach the LLM service.".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "no details".to_string());
            tracing::warn!(status = %status, detail = %detail, "LLM returned an error");
            return Err(AssistantError::Upstream(format!(
                "The LLM service returned an error ({}): {}",
                status.as_u16(),
                detail
            )));
        }

        let parsed: WireResponse = response.json().await.map_err(|_| {
            AssistantError::Upstream("Invalid response from the LLM service.".to_string())
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                AssistantError::Upstream("Invalid response from the LLM service.".to_string())
            })
    }
}
