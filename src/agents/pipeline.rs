// Report pipeline: interprets the stage table in order

use crate::agents::search::{gather_evidence, render_evidence_prompt, WebSearchPlan};
use crate::agents::{StageContext, StageKind, StageSpec, REPORT_PIPELINE};
use crate::models::{PipelineRun, SessionId, UserId};
use crate::reasoning::ReasoningService;
use crate::search::SearchAggregator;
use crate::types::{AppError, AppResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// First stage input: the query followed by one `question->answer` line per answer.
pub fn combine_query(query: &str, answers: &[(String, String)]) -> String {
    let mut combined = format!("User query: {}\n\n", query);
    let lines: Vec<String> = answers
        .iter()
        .map(|(question, answer)| format!("{}->{}", question, answer))
        .collect();
    combined.push_str(&lines.join("\n"));
    combined
}

pub struct PipelineOrchestrator {
    reasoning: Arc<dyn ReasoningService>,
    aggregator: Arc<SearchAggregator>,
    stages: &'static [StageSpec],
    stage_timeout: Duration,
    evidence_content_chars: usize,
}

impl PipelineOrchestrator {
    pub fn new(reasoning: Arc<dyn ReasoningService>, aggregator: Arc<SearchAggregator>) -> Self {
        Self {
            reasoning,
            aggregator,
            stages: &REPORT_PIPELINE,
            stage_timeout: Duration::from_secs(300),
            evidence_content_chars: 4000,
        }
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Characters of extracted page text kept per evidence entry
    pub fn with_evidence_content_chars(mut self, chars: usize) -> Self {
        self.evidence_content_chars = chars;
        self
    }

    /// Run every stage under the user's reasoning session.
    ///
    /// The first failing stage aborts the run; the report is the last stage's
    /// output (`PipelineRun::report`).
    pub async fn run(
        &self,
        user: &UserId,
        query: &str,
        answers: &[(String, String)],
        cancel: &CancellationToken,
    ) -> AppResult<PipelineRun> {
        let session = SessionId::for_user(user);
        let mut run = PipelineRun::new(session.clone());
        let ctx = StageContext {
            reasoning: self.reasoning.as_ref(),
            session: &session,
            cancel,
            timeout: self.stage_timeout,
        };

        info!(run_id = %run.run_id, user_id = %user, stages = self.stages.len(), "Starting report pipeline");

        let mut payload = combine_query(query, answers);
        for stage in self.stages {
            let started = Instant::now();
            info!(run_id = %run.run_id, stage = stage.name, "Running stage");

            let input = match stage.kind {
                StageKind::Search => self.evidence_prompt(&payload, cancel).await?,
                _ => payload,
            };

            let output = stage.execute(&ctx, &input).await.map_err(|e| {
                if !e.is_cancelled() {
                    warn!(run_id = %run.run_id, stage = stage.name, error = %e, "Stage failed");
                }
                e
            })?;

            run.record(stage.name, &output, started.elapsed().as_millis() as u64);
            payload = output;
        }

        info!(run_id = %run.run_id, user_id = %user, report_len = run.report().map(str::len).unwrap_or(0), "Report pipeline complete");
        Ok(run)
    }

    async fn evidence_prompt(&self, plan_text: &str, cancel: &CancellationToken) -> AppResult<String> {
        let plan = WebSearchPlan::parse(plan_text);
        let groups = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            groups = gather_evidence(&self.aggregator, &plan) => groups?,
        };
        Ok(render_evidence_prompt(plan_text, &groups, self.evidence_content_chars))
    }
}
