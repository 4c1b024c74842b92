//! Messaging Channel
//!
//! Inbound user messages and outbound replies. The conversation layer only
//! sees [`MessagingChannel`]; [`telegram::TelegramChannel`] is the transport.

#[cfg(test)]
pub mod mock;
pub mod telegram;

pub use telegram::{TelegramChannel, UpdateBatch};

use crate::models::{ChatId, UserId};
use crate::types::AppResult;
use async_trait::async_trait;

#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_text(&self, chat: &ChatId, text: &str) -> AppResult<()>;

    /// Show a "typing" indicator in `chat`
    async fn send_typing(&self, chat: &ChatId) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Cancel,
}

impl Command {
    /// Recognise `/start` and `/cancel`, optionally addressed as `/cancel@some_bot`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundContent {
    Text(String),
    Command(Command),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub content: InboundContent,
}

impl InboundMessage {
    /// Classify raw message text as a command or free text.
    pub fn from_text(user_id: UserId, chat_id: ChatId, text: &str) -> Self {
        let content = match Command::parse(text) {
            Some(command) => InboundContent::Command(command),
            None => InboundContent::Text(text.to_string()),
        };
        Self {
            user_id,
            chat_id,
            content,
        }
    }
}
