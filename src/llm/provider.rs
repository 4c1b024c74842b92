use async_trait::async_trait;
use crate::types::{AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Which provider to talk to and with what credentials
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub api_key: String,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider: LLMProvider,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> Self {
        let adapter: Box<dyn LLMAdapter> = match config.provider {
            LLMProvider::Google => Box::new(crate::llm::google::GoogleAdapter::new(&config.api_key)),
            LLMProvider::OpenAI => Box::new(crate::llm::openai::OpenAIAdapter::new(&config.api_key)),
            // OpenRouter and Groq speak the OpenAI wire format
            LLMProvider::OpenRouter => Box::new(crate::llm::openai::OpenAIAdapter::new_with_api_base(
                &config.api_key,
                OPENROUTER_API_BASE,
            )),
            LLMProvider::Groq => Box::new(crate::llm::openai::OpenAIAdapter::new_with_api_base(
                &config.api_key,
                GROQ_API_BASE,
            )),
        };

        Self {
            adapter,
            provider: config.provider,
        }
    }

    /// Wrap an existing adapter (custom endpoints, tests)
    pub fn from_adapter(provider: LLMProvider, adapter: Box<dyn LLMAdapter>) -> Self {
        Self { adapter, provider }
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
