// Core models for conversations, evidence, and pipeline runs

use crate::types::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of clarifying questions asked before a report is generated
pub const CLARIFYING_QUESTION_COUNT: usize = 3;

/// Stable identifier for one end user of the messaging channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation a reply is delivered to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reasoning-service session correlating every call made for one user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn for_user(user: &UserId) -> Self {
        Self(format!("tg_{}", user.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exactly three follow-up questions, validated from free-form reasoning output.
///
/// Only `parse` builds one, so there is no `Deserialize` impl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClarifyingQuestions(Vec<String>);

impl ClarifyingQuestions {
    /// Parse a reasoning reply: one question per line, the first line is a preamble.
    pub fn parse(text: &str) -> AppResult<Self> {
        let questions: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .skip(1)
            .map(strip_list_marker)
            .filter(|line| !line.is_empty())
            .take(CLARIFYING_QUESTION_COUNT)
            .collect();

        if questions.len() < CLARIFYING_QUESTION_COUNT {
            return Err(AppError::MalformedQuestions {
                found: questions.len(),
            });
        }
        Ok(Self(questions))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Drop "1.", "2)", "-", "*" style prefixes the model likes to add.
fn strip_list_marker(line: &str) -> String {
    let without_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = if without_digits.len() != line.len() {
        without_digits
            .strip_prefix('.')
            .or_else(|| without_digits.strip_prefix(')'))
            .unwrap_or(line)
    } else {
        line.strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| line.strip_prefix("• "))
            .unwrap_or(line)
    };
    rest.trim().to_string()
}

/// Data held while the user answers clarifying questions
#[derive(Debug, Clone, PartialEq)]
pub struct AskingState {
    pub original_query: String,
    pub questions: ClarifyingQuestions,
    /// (question, answer) in the order the questions were asked
    pub answers: Vec<(String, String)>,
}

/// Outcome of recording one answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerProgress {
    /// Ask this question next
    Next(String),
    /// All questions answered
    Complete,
}

impl AskingState {
    pub fn new(original_query: impl Into<String>, questions: ClarifyingQuestions) -> Self {
        Self {
            original_query: original_query.into(),
            questions,
            answers: Vec::new(),
        }
    }

    /// Cursor into the question list; always equals the number of answers.
    pub fn question_index(&self) -> usize {
        self.answers.len()
    }

    pub fn current_question(&self) -> Option<&str> {
        self.questions.get(self.question_index())
    }

    pub fn is_complete(&self) -> bool {
        self.question_index() >= self.questions.len()
    }

    pub fn record_answer(&mut self, answer: impl Into<String>) -> AnswerProgress {
        if let Some(question) = self.current_question().map(str::to_string) {
            self.answers.push((question, answer.into()));
        }
        match self.current_question() {
            Some(next) => AnswerProgress::Next(next.to_string()),
            None => AnswerProgress::Complete,
        }
    }
}

/// Conversation stage; each variant carries only what that stage needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Stage {
    #[default]
    WaitingQuery,
    Asking(AskingState),
    EmailDecision { report: String },
    EmailAddress { report: String },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::WaitingQuery => "waiting_query",
            Stage::Asking(_) => "asking",
            Stage::EmailDecision { .. } => "email_decision",
            Stage::EmailAddress { .. } => "email_address",
        }
    }

    pub fn report(&self) -> Option<&str> {
        match self {
            Stage::EmailDecision { report } | Stage::EmailAddress { report } => Some(report),
            _ => None,
        }
    }
}

/// Per-user conversation state, owned by the session store
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub user_id: UserId,
    pub reasoning_session: SessionId,
    pub stage: Stage,
    /// Last generated report; kept after the email step is declined
    pub last_report: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(user_id: UserId) -> Self {
        Self {
            reasoning_session: SessionId::for_user(&user_id),
            user_id,
            stage: Stage::WaitingQuery,
            last_report: None,
            created_at: Utc::now(),
        }
    }
}

/// Which provider produced an evidence entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Tavily,
    SerpApi,
}

impl std::fmt::Display for SearchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchSource::Tavily => write!(f, "tavily"),
            SearchSource::SerpApi => write!(f, "serpapi"),
        }
    }
}

/// One evidence unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Full page text, present only when extraction succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub source: SearchSource,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, source: SearchSource) -> Self {
        Self {
            url: url.into(),
            title: None,
            snippet: None,
            content: None,
            source,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Output of one completed pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    pub stage: String,
    pub text: String,
    pub elapsed_ms: u64,
}

/// Diagnostics record for one report generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub stage_outputs: Vec<StageOutput>,
}

impl PipelineRun {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id,
            started_at: Utc::now(),
            stage_outputs: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: &str, text: &str, elapsed_ms: u64) {
        self.stage_outputs.push(StageOutput {
            stage: stage.to_string(),
            text: text.to_string(),
            elapsed_ms,
        });
    }

    /// The final report: output of the last stage
    pub fn report(&self) -> Option<&str> {
        self.stage_outputs.last().map(|o| o.text.as_str())
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stage_outputs.iter().map(|o| o.stage.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime_secs: i64,
    pub active_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> ClarifyingQuestions {
        ClarifyingQuestions::parse(
            "Here are some questions:\nWhich aspect?\nWhat depth?\nWhich audience?",
        )
        .unwrap()
    }

    #[test]
    fn test_parse_discards_preamble() {
        let q = questions();
        assert_eq!(q.len(), 3);
        assert_eq!(q.first(), Some("Which aspect?"));
        assert_eq!(q.get(2), Some("Which audience?"));
    }

    #[test]
    fn test_parse_strips_list_markers_and_blank_lines() {
        let q = ClarifyingQuestions::parse(
            "To narrow this down:\n\n1. Hardware or algorithms?\n2) Beginner or expert?\n- Any time frame?\n* Extra",
        )
        .unwrap();
        let all: Vec<&str> = q.iter().collect();
        assert_eq!(
            all,
            vec!["Hardware or algorithms?", "Beginner or expert?", "Any time frame?"]
        );
    }

    #[test]
    fn test_parse_keeps_numbers_that_are_not_markers() {
        assert_eq!(strip_list_marker("2024 trends?"), "2024 trends?");
        assert_eq!(strip_list_marker("3. Why?"), "Why?");
    }

    #[test]
    fn test_parse_too_few_questions_is_typed_error() {
        let err = ClarifyingQuestions::parse("Preamble\nOnly one?\nAnd two?").unwrap_err();
        assert!(matches!(err, AppError::MalformedQuestions { found: 2 }));

        let err = ClarifyingQuestions::parse("").unwrap_err();
        assert!(matches!(err, AppError::MalformedQuestions { found: 0 }));
    }

    #[test]
    fn test_three_answers_fill_in_question_order() {
        let mut asking = AskingState::new("What is quantum computing?", questions());
        assert_eq!(asking.question_index(), 0);

        assert_eq!(
            asking.record_answer("algorithms"),
            AnswerProgress::Next("What depth?".to_string())
        );
        assert_eq!(
            asking.record_answer("intro"),
            AnswerProgress::Next("Which audience?".to_string())
        );
        assert_eq!(asking.record_answer("students"), AnswerProgress::Complete);

        assert_eq!(asking.question_index(), 3);
        assert!(asking.is_complete());
        let keys: Vec<&str> = asking.answers.iter().map(|(q, _)| q.as_str()).collect();
        assert_eq!(keys, vec!["Which aspect?", "What depth?", "Which audience?"]);
        assert_eq!(asking.answers[2].1, "students");
    }

    #[test]
    fn test_extra_answer_after_completion_is_ignored() {
        let mut asking = AskingState::new("q", questions());
        for answer in ["a", "b", "c", "d"] {
            asking.record_answer(answer);
        }
        assert_eq!(asking.answers.len(), 3);
    }

    #[test]
    fn test_stage_report_only_in_email_stages() {
        assert_eq!(Stage::WaitingQuery.report(), None);
        let stage = Stage::EmailAddress {
            report: "r".to_string(),
        };
        assert_eq!(stage.report(), Some("r"));
        assert_eq!(stage.name(), "email_address");
    }

    #[test]
    fn test_session_id_is_derived_from_user() {
        let session = ConversationSession::new(UserId::new("42"));
        assert_eq!(session.reasoning_session.as_str(), "tg_42");
        assert_eq!(session.stage, Stage::WaitingQuery);
    }

    #[test]
    fn test_pipeline_run_report_is_last_output() {
        let mut run = PipelineRun::new(SessionId::for_user(&UserId::new("1")));
        assert!(run.report().is_none());
        run.record("refine", "better query", 3);
        run.record("write", "final report", 9);
        assert_eq!(run.report(), Some("final report"));
        assert_eq!(run.stage_names(), vec!["refine", "write"]);
    }
}
