//! Conversation State Machine
//!
//! Decides what each incoming message means for the sender's conversation:
//!
//! ```text
//! WaitingQuery ──query──▶ Asking ──3rd answer──▶ EmailDecision ──yes──▶ EmailAddress
//!      ▲                    │ (report pipeline)        │ no                 │ sent
//!      └────────────────────┴──────────────────────────┴────────────────────┘
//! ```
//!
//! `/cancel` and `/start` abort whatever is running for the user and start
//! over from `WaitingQuery`.

use crate::agents::{EmailAgent, PipelineOrchestrator, StageContext, CLARIFY_STAGE};
use crate::channel::{Command, InboundContent, InboundMessage, MessagingChannel};
use crate::conversation::store::{SessionStore, Turn};
use crate::mailer::Mailer;
use crate::models::{AnswerProgress, AskingState, ChatId, ClarifyingQuestions, SessionId, Stage, UserId};
use crate::reasoning::ReasoningService;
use crate::types::{AppError, AppResult};
use crate::utils::{split_message, TELEGRAM_MESSAGE_LIMIT};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const GREETING: &str = "👋 Hi! I'm a research assistant. Send me any research question and I'll investigate.";
pub const FAREWELL: &str = "Bye! See you next time.";
pub const WORKING_ON_REPORT: &str = "I have all the information I need. I'm working on your report now.";
pub const ASK_EMAIL: &str = "Do you want to email the report to yourself? (yes/no)";
pub const ASK_ADDRESS: &str = "Great! Please provide the email address.";
pub const DECLINED_EMAIL: &str = "No problem. Do you have any question?";
pub const INVALID_ADDRESS: &str = "That doesn't look like an e-mail address. Try again.";
pub const EMAIL_SENT: &str = "Sent! ✅";
pub const EMAIL_FAILED: &str = "Sorry, I couldn't send the email. Please send the address again to retry.";
pub const REPORT_FAILED: &str = "Sorry, the report could not be generated. Please send your question again.";
pub const QUESTIONS_MALFORMED: &str =
    "Sorry, I couldn't prepare follow-up questions for that. Could you rephrase your question?";
pub const CLARIFY_FAILED: &str = "Sorry, I can't reach the research service right now. Please try again in a moment.";

const AFFIRMATIVE: [&str; 4] = ["yes", "y", "yeah", "sure"];

/// True for the accepted "yes" answers, ignoring case and surrounding space.
pub fn is_affirmative(text: &str) -> bool {
    let answer = text.trim().to_lowercase();
    AFFIRMATIVE.contains(&answer.as_str())
}

pub struct ConversationStateMachine {
    store: Arc<SessionStore>,
    reasoning: Arc<dyn ReasoningService>,
    pipeline: Arc<PipelineOrchestrator>,
    mailer: Arc<dyn Mailer>,
    channel: Arc<dyn MessagingChannel>,
    chunk_limit: usize,
    stage_timeout: Duration,
}

impl ConversationStateMachine {
    pub fn new(
        store: Arc<SessionStore>,
        reasoning: Arc<dyn ReasoningService>,
        pipeline: Arc<PipelineOrchestrator>,
        mailer: Arc<dyn Mailer>,
        channel: Arc<dyn MessagingChannel>,
    ) -> Self {
        Self {
            store,
            reasoning,
            pipeline,
            mailer,
            channel,
            chunk_limit: TELEGRAM_MESSAGE_LIMIT,
            stage_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = limit;
        self
    }

    /// Timeout for the clarify and email stages
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Process one inbound message to completion.
    ///
    /// Work aborted by `/cancel` or `/start` ends quietly with `Ok(())`.
    pub async fn handle(&self, message: InboundMessage) -> AppResult<()> {
        let InboundMessage {
            user_id,
            chat_id,
            content,
        } = message;

        match content {
            InboundContent::Command(Command::Cancel) => {
                info!(user_id = %user_id, "Conversation cancelled");
                self.store.cancel(&user_id).await;
                self.reasoning.reset_session(&SessionId::for_user(&user_id)).await;
                self.channel.send_text(&chat_id, FAREWELL).await
            }
            InboundContent::Command(Command::Start) => {
                info!(user_id = %user_id, "Conversation started");
                self.store.restart(&user_id).await;
                self.reasoning.reset_session(&SessionId::for_user(&user_id)).await;
                self.channel.send_text(&chat_id, GREETING).await
            }
            InboundContent::Text(text) => match self.handle_text(&user_id, &chat_id, &text).await {
                Err(e) if e.is_cancelled() => {
                    debug!(user_id = %user_id, "Turn aborted by cancellation");
                    Ok(())
                }
                other => other,
            },
        }
    }

    async fn handle_text(&self, user: &UserId, chat: &ChatId, text: &str) -> AppResult<()> {
        let mut turn = self.store.begin_turn(user).await;
        if !SessionStore::is_current(&turn) {
            // the session was discarded while this message waited for its turn
            return Err(AppError::Cancelled);
        }

        let stage = std::mem::take(&mut turn.session.stage);
        debug!(user_id = %user, stage = stage.name(), "Handling message");

        match stage {
            Stage::WaitingQuery => self.start_research(&mut turn, chat, text).await,
            Stage::Asking(asking) => self.record_answer(&mut turn, chat, asking, text).await,
            Stage::EmailDecision { report } => self.decide_email(&mut turn, chat, report, text).await,
            Stage::EmailAddress { report } => self.send_email(&mut turn, chat, report, text).await,
        }
    }

    fn stage_context<'a>(&'a self, session: &'a SessionId, cancel: &'a CancellationToken) -> StageContext<'a> {
        StageContext {
            reasoning: self.reasoning.as_ref(),
            session,
            cancel,
            timeout: self.stage_timeout,
        }
    }

    async fn show_typing(&self, chat: &ChatId) {
        if let Err(e) = self.channel.send_typing(chat).await {
            debug!(chat_id = %chat, error = %e, "Typing indicator failed");
        }
    }

    async fn start_research(&self, turn: &mut Turn, chat: &ChatId, query: &str) -> AppResult<()> {
        let query = query.trim();
        let session_id = turn.session.reasoning_session.clone();
        info!(user_id = %turn.session.user_id, "New research query");

        self.reasoning.reset_session(&session_id).await;
        self.show_typing(chat).await;

        let ctx = self.stage_context(&session_id, &turn.cancel);
        let questions = match CLARIFY_STAGE
            .execute(&ctx, query)
            .await
            .and_then(|reply| ClarifyingQuestions::parse(&reply))
        {
            Ok(questions) => questions,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e @ AppError::MalformedQuestions { .. }) => {
                warn!(user_id = %turn.session.user_id, error = %e, "Unusable clarifying questions");
                return self.channel.send_text(chat, QUESTIONS_MALFORMED).await;
            }
            Err(e) => {
                error!(user_id = %turn.session.user_id, error = %e, "Clarify stage failed");
                return self.channel.send_text(chat, CLARIFY_FAILED).await;
            }
        };

        let Some(first) = questions.first().map(str::to_string) else {
            return self.channel.send_text(chat, QUESTIONS_MALFORMED).await;
        };
        turn.session.stage = Stage::Asking(AskingState::new(query, questions));
        self.channel.send_text(chat, &first).await
    }

    async fn record_answer(&self, turn: &mut Turn, chat: &ChatId, mut asking: AskingState, answer: &str) -> AppResult<()> {
        match asking.record_answer(answer.trim()) {
            AnswerProgress::Next(question) => {
                debug!(user_id = %turn.session.user_id, question_index = asking.question_index(), "Answer recorded");
                turn.session.stage = Stage::Asking(asking);
                self.channel.send_text(chat, &question).await
            }
            AnswerProgress::Complete => self.generate_report(turn, chat, asking).await,
        }
    }

    async fn generate_report(&self, turn: &mut Turn, chat: &ChatId, asking: AskingState) -> AppResult<()> {
        self.channel.send_text(chat, WORKING_ON_REPORT).await?;
        self.show_typing(chat).await;

        let report = self
            .pipeline
            .run(&turn.session.user_id, &asking.original_query, &asking.answers, &turn.cancel)
            .await
            .and_then(|run| {
                run.report()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Internal("pipeline produced no output".to_string()))
            });

        let report = match report {
            Ok(report) => report,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                error!(user_id = %turn.session.user_id, error = %e, "Report generation failed");
                return self.channel.send_text(chat, REPORT_FAILED).await;
            }
        };
        if turn.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        turn.session.last_report = Some(report.clone());
        turn.session.stage = Stage::EmailDecision { report: report.clone() };

        let chunks = split_message(&report, self.chunk_limit);
        info!(user_id = %turn.session.user_id, chunks = chunks.len(), "Delivering report");
        for chunk in &chunks {
            self.channel.send_text(chat, chunk).await?;
        }
        self.channel.send_text(chat, ASK_EMAIL).await
    }

    async fn decide_email(&self, turn: &mut Turn, chat: &ChatId, report: String, reply: &str) -> AppResult<()> {
        if is_affirmative(reply) {
            turn.session.stage = Stage::EmailAddress { report };
            self.channel.send_text(chat, ASK_ADDRESS).await
        } else {
            // last_report stays on the session
            self.channel.send_text(chat, DECLINED_EMAIL).await
        }
    }

    async fn send_email(&self, turn: &mut Turn, chat: &ChatId, report: String, address: &str) -> AppResult<()> {
        let address = address.trim();
        if !address.contains('@') {
            turn.session.stage = Stage::EmailAddress { report };
            return self.channel.send_text(chat, INVALID_ADDRESS).await;
        }

        self.show_typing(chat).await;
        let session_id = turn.session.reasoning_session.clone();
        let ctx = self.stage_context(&session_id, &turn.cancel);

        match EmailAgent::send_report(&ctx, self.mailer.as_ref(), &report, address).await {
            Ok(()) => {
                info!(user_id = %turn.session.user_id, "Report emailed");
                self.channel.send_text(chat, EMAIL_SENT).await
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(user_id = %turn.session.user_id, error = %e, "Email delivery failed");
                turn.session.stage = Stage::EmailAddress { report };
                self.channel.send_text(chat, EMAIL_FAILED).await
            }
        }
    }
}
