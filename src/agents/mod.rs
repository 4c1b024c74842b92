//! Agent System
//!
//! Every call to the reasoning service is a [`StageSpec`]: a named instruction
//! plus the model tier it runs on. The report pipeline is a static table of
//! stages interpreted by [`PipelineOrchestrator`]; the clarify and email steps
//! go through the same [`StageSpec::execute`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! query + answers
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Refine    │  → one improved query
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Plan     │  → {"searches": [...]} (3 items)
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Search    │  → web evidence (in parallel), then a short digest
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Write     │  → cited report
//! └─────────────┘
//! ```

pub mod email;
pub mod pipeline;
pub mod prompts;
pub mod search;

pub use email::{EmailAgent, EmailDraft};
pub use pipeline::{combine_query, PipelineOrchestrator};
pub use search::{gather_evidence, render_evidence_prompt, EvidenceGroup, WebSearchPlan, WebSearchItem};

use crate::models::SessionId;
use crate::reasoning::{collect_final_text, ReasoningService};
use crate::types::{AppError, AppResult};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Clarify,
    Refine,
    Plan,
    Search,
    Write,
    Email,
}

/// Which configured model a stage runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Fast,
    Deep,
}

/// One reasoning step: what to ask and which model answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSpec {
    pub kind: StageKind,
    pub name: &'static str,
    pub instruction: &'static str,
    pub tier: ModelTier,
    pub temperature: Option<f32>,
}

pub static CLARIFY_STAGE: StageSpec = StageSpec {
    kind: StageKind::Clarify,
    name: "clarify",
    instruction: prompts::CLARIFY_INSTRUCTION,
    tier: ModelTier::Fast,
    temperature: Some(0.7),
};

/// Report stages in execution order; each output is the next stage's input.
pub static REPORT_PIPELINE: [StageSpec; 4] = [
    StageSpec {
        kind: StageKind::Refine,
        name: "refine",
        instruction: prompts::REFINE_INSTRUCTION,
        tier: ModelTier::Fast,
        temperature: Some(0.3),
    },
    StageSpec {
        kind: StageKind::Plan,
        name: "plan",
        instruction: prompts::PLAN_INSTRUCTION,
        tier: ModelTier::Fast,
        temperature: Some(0.3),
    },
    StageSpec {
        kind: StageKind::Search,
        name: "search",
        instruction: prompts::SEARCH_INSTRUCTION,
        tier: ModelTier::Fast,
        temperature: Some(0.2),
    },
    StageSpec {
        kind: StageKind::Write,
        name: "write",
        instruction: prompts::WRITE_INSTRUCTION,
        tier: ModelTier::Deep,
        temperature: Some(0.4),
    },
];

pub static EMAIL_STAGE: StageSpec = StageSpec {
    kind: StageKind::Email,
    name: "email",
    instruction: prompts::EMAIL_INSTRUCTION,
    tier: ModelTier::Fast,
    temperature: Some(0.2),
};

/// Everything a stage needs besides its payload.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub reasoning: &'a dyn ReasoningService,
    pub session: &'a SessionId,
    pub cancel: &'a CancellationToken,
    pub timeout: Duration,
}

impl StageSpec {
    /// Send `payload` to the reasoning service and return the final response text.
    ///
    /// Fails with `Cancelled` as soon as the token fires and with `Timeout`
    /// once `ctx.timeout` elapses; the in-flight call is dropped either way.
    pub async fn execute(&self, ctx: &StageContext<'_>, payload: &str) -> AppResult<String> {
        let started = Instant::now();
        let call = async {
            let stream = ctx.reasoning.run(ctx.session, self, payload).await?;
            collect_final_text(stream).await
        };

        let text = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(AppError::Cancelled),
            outcome = tokio::time::timeout(ctx.timeout, call) => match outcome {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AppError::Timeout {
                        stage: self.name,
                        secs: ctx.timeout.as_secs(),
                    })
                }
            },
        };

        let text = text.ok_or(AppError::NoFinalResponse { stage: self.name })?;
        if text.trim().is_empty() {
            return Err(AppError::EmptyStageOutput { stage: self.name });
        }

        debug!(
            session = %ctx.session,
            stage = self.name,
            output_len = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage completed"
        );
        Ok(text)
    }
}
