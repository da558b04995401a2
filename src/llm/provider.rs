use async_trait::async_trait;
use crate::types::{AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider (distinct from the `LLMProvider` enum in types.rs)
#[derive(Debug, Clone)]
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub api_base: Option<String>,
}

impl LLMProviderConfig {
    /// Build from the application config; `None` when no key is configured
    pub fn from_config(config: &crate::config::LLMConfig) -> Option<Self> {
        let api_key = config.active_api_key()?;
        Some(Self {
            name: config.default_provider.clone(),
            api_key,
            api_base: config.api_base.clone(),
        })
    }
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider: LLMProvider,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> AppResult<Self> {
        let provider: LLMProvider = config.name.parse()?;
        let adapter: Box<dyn LLMAdapter> = match (provider, config.api_base.as_deref()) {
            (_, Some(base)) => Box::new(crate::llm::openai::OpenAIAdapter::new_with_api_base(&config.api_key, base)),
            (LLMProvider::OpenAI, None) => Box::new(crate::llm::openai::OpenAIAdapter::new(&config.api_key)),
            (LLMProvider::Groq, None) => Box::new(crate::llm::groq::GroqAdapter::new(&config.api_key)),
            (LLMProvider::OpenRouter, None) => Box::new(crate::llm::openrouter::OpenRouterAdapter::new(&config.api_key)),
        };

        Ok(Self { adapter, provider })
    }

    /// Wrap an existing adapter, e.g. a test double
    pub fn with_adapter(provider: LLMProvider, adapter: Box<dyn LLMAdapter>) -> Self {
        Self { adapter, provider }
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(name: &str) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            api_key: "test-key".to_string(),
            api_base: None,
        }
    }

    #[test]
    fn test_known_providers() {
        assert_eq!(LLM::new(provider_config("openai")).unwrap().provider(), LLMProvider::OpenAI);
        assert_eq!(LLM::new(provider_config("groq")).unwrap().provider(), LLMProvider::Groq);
        assert_eq!(
            LLM::new(provider_config("openrouter")).unwrap().provider(),
            LLMProvider::OpenRouter
        );
    }

    #[test]
    fn test_unsupported_provider_is_an_error() {
        assert!(LLM::new(provider_config("carrier-pigeon")).is_err());
    }
}
