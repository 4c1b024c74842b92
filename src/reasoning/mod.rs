//! Reasoning Service
//!
//! The opaque collaborator behind every pipeline stage: given a session id, the
//! stage's instruction and a text prompt, it produces a stream of events. Only
//! the event marked final carries the stage's answer.

pub mod llm_backed;
#[cfg(test)]
pub mod mock;

pub use llm_backed::LlmReasoningService;

use crate::agents::StageSpec;
use crate::models::SessionId;
use crate::types::AppResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

/// One event emitted while a stage is being reasoned about
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningEvent {
    pub author: String,
    pub parts: Vec<String>,
    pub is_final: bool,
}

impl ReasoningEvent {
    pub fn partial(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            parts: vec![text.into()],
            is_final: false,
        }
    }

    pub fn final_response(author: impl Into<String>, parts: Vec<String>) -> Self {
        Self {
            author: author.into(),
            parts,
            is_final: true,
        }
    }
}

pub type ReasoningStream = BoxStream<'static, AppResult<ReasoningEvent>>;

#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Run one reasoning step for `stage` under `session`.
    async fn run(&self, session: &SessionId, stage: &StageSpec, prompt: &str) -> AppResult<ReasoningStream>;

    /// Forget any context accumulated under `session`.
    async fn reset_session(&self, session: &SessionId);
}

/// Concatenate the parts of the first final event, or `None` if the stream
/// ended without one.
pub async fn collect_final_text(mut stream: ReasoningStream) -> AppResult<Option<String>> {
    while let Some(event) = stream.next().await {
        let event = event?;
        if event.is_final {
            return Ok(Some(event.parts.concat()));
        }
    }
    Ok(None)
}
