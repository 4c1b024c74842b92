// OpenAI-compatible adapter (OpenAI, OpenRouter, Groq)

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::debug;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAIAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, OPENAI_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
        }
    }
}

fn llm_error(e: OpenAIError) -> AppError {
    AppError::LLMApi(e.to_string())
}

fn to_openai_messages(request: &LLMRequest) -> AppResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system_instruction {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.as_str())
                .build()
                .map_err(llm_error)?
                .into(),
        );
    }

    for m in &request.messages {
        let message: ChatCompletionRequestMessage = match m.role.as_str() {
            "assistant" => ChatCompletionRequestAssistantMessageArgs::default()
                .content(m.content.as_str())
                .build()
                .map_err(llm_error)?
                .into(),
            "user" => ChatCompletionRequestUserMessageArgs::default()
                .content(m.content.as_str())
                .build()
                .map_err(llm_error)?
                .into(),
            other => return Err(AppError::LLMApi(format!("Unknown message role: {}", other))),
        };
        messages.push(message);
    }

    Ok(messages)
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    #[allow(deprecated)]
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model.as_str())
            .messages(to_openai_messages(request)?);
        if let Some(max_tokens) = request.max_tokens {
            args.max_tokens(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }
        let body = args.build().map_err(llm_error)?;

        debug!(model = %request.model, messages = request.messages.len(), "Sending chat completion");
        let response = self.client.chat().create(body).await.map_err(llm_error)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AppError::LLMApi("Response contained no choices".to_string()))?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            finish_reason: choice
                .finish_reason
                .as_ref()
                .map(|r| format!("{:?}", r).to_lowercase())
                .unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}
