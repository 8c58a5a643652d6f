use crate::{env_or_default, env_required, ConfigError, FromEnv};
use std::time::Duration;

/// Default chat completion endpoint (Groq, OpenAI-compatible)
pub const DEFAULT_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

const DEFAULT_MODEL: &str = "llama3-70b-8192";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the LLM chat completion endpoint used by the
/// command interpreter and the catalog Q&A service.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub chat_url: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            chat_url: DEFAULT_CHAT_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl FromEnv for LlmConfig {
    /// Reads from environment variables:
    /// - GROQ_API_KEY: required
    /// - GROQ_MODEL: defaults to llama3-70b-8192
    /// - GROQ_CHAT_URL: defaults to the public Groq endpoint
    /// - GROQ_TIMEOUT_SECS: defaults to 30
    fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_required("GROQ_API_KEY")?.trim().to_string();
        let model = env_or_default("GROQ_MODEL", DEFAULT_MODEL).trim().to_string();
        let chat_url = env_or_default("GROQ_CHAT_URL", DEFAULT_CHAT_URL);
        let timeout_secs: u64 = env_or_default(
            "GROQ_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse()
        .map_err(|e| ConfigError::ParseError {
            key: "GROQ_TIMEOUT_SECS".to_string(),
            details: format!("{}", e),
        })?;

        Ok(Self {
            api_key,
            model,
            chat_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
