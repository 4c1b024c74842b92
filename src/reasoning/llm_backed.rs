// Reasoning service backed by a chat-completion LLM

use crate::agents::{ModelTier, StageSpec};
use crate::llm::provider::LLM;
use crate::models::SessionId;
use crate::reasoning::{ReasoningEvent, ReasoningService, ReasoningStream};
use crate::types::{AppResult, LLMMessage, LLMRequest};
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Keeps one message history per session so consecutive stages share context.
pub struct LlmReasoningService {
    llm: LLM,
    fast_model: String,
    deep_model: String,
    max_tokens: u32,
    history_limit: usize,
    histories: Mutex<HashMap<SessionId, Vec<LLMMessage>>>,
}

impl LlmReasoningService {
    pub fn new(llm: LLM, fast_model: impl Into<String>, deep_model: impl Into<String>) -> Self {
        Self {
            llm,
            fast_model: fast_model.into(),
            deep_model: deep_model.into(),
            max_tokens: 8192,
            history_limit: 16,
            histories: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(llm: LLM, config: &crate::config::LLMConfig) -> Self {
        Self::new(llm, config.default_model.clone(), config.writer_model.clone())
            .with_max_tokens(config.max_tokens)
            .with_history_limit(config.history_limit)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Number of messages kept per session; rounded down to whole exchanges,
    /// never below one exchange.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = (limit - limit % 2).max(2);
        self
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Deep => &self.deep_model,
        }
    }

    /// Number of messages currently remembered for `session`
    pub async fn history_len(&self, session: &SessionId) -> usize {
        self.histories
            .lock()
            .await
            .get(session)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ReasoningService for LlmReasoningService {
    async fn run(&self, session: &SessionId, stage: &StageSpec, prompt: &str) -> AppResult<ReasoningStream> {
        let mut messages = self
            .histories
            .lock()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default();
        messages.push(LLMMessage::user(prompt));

        let request = LLMRequest {
            provider: self.llm.provider().to_string(),
            model: self.model_for(stage.tier).to_string(),
            messages,
            max_tokens: Some(self.max_tokens),
            temperature: stage.temperature,
            system_instruction: Some(stage.instruction.to_string()),
        };

        debug!(
            session = %session,
            stage = stage.name,
            model = %request.model,
            history = request.messages.len() - 1,
            "Calling LLM"
        );
        let response = self.llm.create_chat_completion(&request).await?;
        info!(
            session = %session,
            stage = stage.name,
            response_len = response.content.len(),
            total_tokens = response.usage.total_tokens,
            finish_reason = %response.finish_reason,
            "LLM response received"
        );

        {
            let mut histories = self.histories.lock().await;
            let history = histories.entry(session.clone()).or_default();
            history.push(LLMMessage::user(prompt));
            history.push(LLMMessage::assistant(response.content.clone()));
            if history.len() > self.history_limit {
                let excess = history.len() - self.history_limit;
                history.drain(..excess);
            }
        }

        let event = ReasoningEvent::final_response(stage.name, vec![response.content]);
        Ok(stream::iter(vec![Ok(event)]).boxed())
    }

    async fn reset_session(&self, session: &SessionId) {
        if self.histories.lock().await.remove(session).is_some() {
            debug!(session = %session, "Reasoning session reset");
        }
    }
}
