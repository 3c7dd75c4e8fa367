mod engine;
pub mod parse;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use prompt::{render, template, Template, ROLE_FRAMING};

/// Any failure of the completion provider. The pipeline treats every variant
/// the same way; the detail is for logs only.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("build LLM: {0}")]
    Build(String),
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("chat: {0}")]
    Chat(String),
    #[error("LLM returned no usable text")]
    Empty,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub role_framing: &'a str,
    pub model: &'a str,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the cleaned text of the top completion. Never retries.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, ProviderError>;
}

/// `Generator` backed by the `llm` crate.
#[derive(Clone)]
pub struct LlmGenerator {
    provider: String,
    api_key: String,
    timeout: Duration,
}

impl LlmGenerator {
    pub fn new(provider: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider: provider.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &ideo_core::Settings) -> Self {
        Self::new(
            settings.provider.clone(),
            settings.api_key.clone(),
            Duration::from_secs(settings.request_timeout_secs.max(1)),
        )
    }
}

impl std::fmt::Debug for LlmGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGenerator")
            .field("provider", &self.provider)
            .field("has_key", &!self.api_key.is_empty())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, ProviderError> {
        tracing::debug!(
            provider = %self.provider,
            model = request.model,
            "sending completion request"
        );

        let raw = engine::complete(
            &self.provider,
            &self.api_key,
            request.model,
            request.role_framing,
            request.prompt,
            self.timeout,
        )
        .await?;

        tracing::debug!(raw_len = raw.len(), "completion received");
        parse::clean_generated_text(&raw).ok_or(ProviderError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_fails_before_any_network_call() {
        let generator = LlmGenerator::new("watson", "key", Duration::from_secs(1));
        let result = generator
            .generate(&GenerationRequest {
                prompt: "p",
                role_framing: ROLE_FRAMING,
                model: "m",
            })
            .await;
        assert!(matches!(result, Err(ProviderError::UnknownProvider(_))));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let generator = LlmGenerator::new("openai", "sk-secret", Duration::from_secs(1));
        let out = format!("{generator:?}");
        assert!(!out.contains("sk-secret"));
    }
}
