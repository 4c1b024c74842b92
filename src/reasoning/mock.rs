// Scripted reasoning service for tests

use crate::agents::StageSpec;
use crate::models::SessionId;
use crate::reasoning::{ReasoningEvent, ReasoningService, ReasoningStream};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;

pub const DEFAULT_QUESTIONS: &str =
    "Let me narrow this down:\n1. Which aspect interests you most?\n2. How deep should it go?\n3. Who is the audience?";

pub const DEFAULT_PLAN: &str = r#"{"searches": [
    {"reason": "basics", "query": "quantum computing basics"},
    {"reason": "hardware", "query": "quantum hardware 2025"},
    {"reason": "algorithms", "query": "quantum algorithms overview"}
]}"#;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    NoFinal,
    Pending,
    Fail,
}

pub struct ScriptedReasoning {
    replies: HashMap<&'static str, Reply>,
    calls: Mutex<Vec<(String, String)>>,
    resets: Mutex<Vec<SessionId>>,
}

impl ScriptedReasoning {
    pub fn new() -> Self {
        let replies = HashMap::from([
            ("clarify", Reply::Text(DEFAULT_QUESTIONS.to_string())),
            ("refine", Reply::Text("refined query".to_string())),
            ("plan", Reply::Text(DEFAULT_PLAN.to_string())),
            ("search", Reply::Text("digest of evidence".to_string())),
            ("write", Reply::Text("# Report\n\nFindings [^1].\n\nReferences".to_string())),
            (
                "email",
                Reply::Text(r#"{"subject": "Your report", "html_body": "<h1>Report</h1>"}"#.to_string()),
            ),
        ]);
        Self {
            replies,
            calls: Mutex::new(Vec::new()),
            resets: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(mut self, stage: &'static str, reply: Reply) -> Self {
        self.replies.insert(stage, reply);
        self
    }

    /// (stage name, prompt) for every call so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(stage, _)| stage).collect()
    }

    pub fn resets(&self) -> Vec<SessionId> {
        self.resets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn run(&self, _session: &SessionId, stage: &StageSpec, prompt: &str) -> AppResult<ReasoningStream> {
        self.calls
            .lock()
            .unwrap()
            .push((stage.name.to_string(), prompt.to_string()));

        match self.replies.get(stage.name).cloned().unwrap_or(Reply::NoFinal) {
            Reply::Text(text) => Ok(stream::iter(vec![
                Ok(ReasoningEvent::partial(stage.name, "thinking")),
                Ok(ReasoningEvent::final_response(stage.name, vec![text])),
            ])
            .boxed()),
            Reply::NoFinal => Ok(stream::iter(vec![Ok(ReasoningEvent::partial(stage.name, "thinking"))]).boxed()),
            Reply::Pending => Ok(stream::pending().boxed()),
            Reply::Fail => Err(AppError::LLMApi("reasoning service unavailable".to_string())),
        }
    }

    async fn reset_session(&self, session: &SessionId) {
        self.resets.lock().unwrap().push(session.clone());
    }
}
