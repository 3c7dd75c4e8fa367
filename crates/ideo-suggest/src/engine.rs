use std::time::Duration;

use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use crate::ProviderError;

pub(crate) fn map_backend(provider: &str) -> Result<LLMBackend, ProviderError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

/// One system + user exchange. Returns the raw text of the top completion.
pub(crate) async fn complete(
    provider: &str,
    api_key: &str,
    model: &str,
    system: &str,
    user_msg: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let backend = map_backend(provider)?;

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(model)
        .system(system);

    if !api_key.is_empty() {
        builder = builder.api_key(api_key);
    }

    let llm = builder
        .build()
        .map_err(|e| ProviderError::Build(e.to_string()))?;

    let messages = vec![ChatMessage::user().content(user_msg).build()];

    let response = tokio::time::timeout(timeout, llm.chat(&messages))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))?
        .map_err(|e| ProviderError::Chat(e.to_string()))?;

    match response.text() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_map() {
        for name in ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"] {
            assert!(map_backend(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(matches!(
            map_backend("watson"),
            Err(ProviderError::UnknownProvider(p)) if p == "watson"
        ));
    }
}
