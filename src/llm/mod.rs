//! Language-model access behind a mockable trait.

pub mod mock;
pub mod ollama;
pub mod openai;

pub use mock::{RecordedCall, ScriptedLlmClient};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use std::time::Duration;

use thiserror::Error;

use crate::config::{AppConfig, LlmProvider};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM client misconfigured: {0}")]
    Configuration(String),

    #[error("LLM endpoint unreachable at {0}")]
    Connection(String),

    #[error("LLM endpoint returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Malformed completion envelope: {0}")]
    MalformedResponse(String),
}

/// One completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Blocking chat-completion backend.
///
/// Implementations return the raw assistant text and never retry.
pub trait LanguageModelClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError>;
}

/// Build the configured client. Fails fast when the selected provider cannot
/// be used (e.g. OpenAI without an API key).
pub fn build_client(
    config: &AppConfig,
) -> Result<Box<dyn LanguageModelClient + Send + Sync>, LlmError> {
    let timeout = config.request_timeout_secs.map(Duration::from_secs);
    match config.provider {
        LlmProvider::OpenAi => {
            let key = config.api_key.as_deref().ok_or_else(|| {
                LlmError::Configuration(
                    "OpenAI provider needs OPENAI_API_KEY or TRIALSCOPE_API_KEY".into(),
                )
            })?;
            Ok(Box::new(OpenAiClient::new(&config.base_url, Some(key), timeout)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::new(&config.base_url, timeout)?)),
    }
}

/// Shared blocking HTTP client; `None` disables the client-side timeout.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::blocking::Client, LlmError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Client(e.to_string()))
}

/// Map a transport failure onto [`LlmError`].
pub(crate) fn send_error(e: reqwest::Error, base_url: &str) -> LlmError {
    if e.is_connect() {
        LlmError::Connection(base_url.to_string())
    } else {
        LlmError::Client(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_without_key_fails_fast() {
        let config = AppConfig::default();
        let result = build_client(&config);
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn openai_with_key_builds() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = AppConfig {
            provider: LlmProvider::Ollama,
            base_url: "http://localhost:11434".into(),
            ..AppConfig::default()
        };
        assert!(build_client(&config).is_ok());
    }
}
