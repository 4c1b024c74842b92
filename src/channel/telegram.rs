//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates` for inbound messages and answers with
//! `sendMessage`. Replies go out as plain text with link previews disabled.

use crate::channel::{InboundMessage, MessagingChannel};
use crate::models::{ChatId, UserId};
use crate::types::{AppError, AppResult};
use crate::utils::with_retry_if;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

const SEND_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    from: Option<TelegramUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

/// A failed Bot API call, with the HTTP status when a reply came back.
#[derive(Debug)]
struct CallError {
    status: Option<StatusCode>,
    error: AppError,
}

impl CallError {
    fn transport(error: AppError) -> Self {
        Self { status: None, error }
    }

    /// Transport failures, rate limits and server errors; 4xx replies are final.
    fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(status) => status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl From<CallError> for AppError {
    fn from(e: CallError) -> Self {
        e.error
    }
}

/// Messages from one `getUpdates` call and the offset to poll next
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBatch {
    pub messages: Vec<InboundMessage>,
    pub next_offset: i64,
}

pub struct TelegramChannel {
    http: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
    retry_delay: Duration,
}

impl TelegramChannel {
    pub fn new(bot_token: &str, api_base: &str, poll_timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
            poll_timeout_secs,
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn from_config(config: &crate::config::TelegramConfig) -> Self {
        Self::new(&config.bot_token, &config.api_base, config.poll_timeout_secs)
    }

    /// Base delay between send attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T, CallError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::transport(AppError::Channel(format!("{} HTTP error: {}", method, e))))?;

        let status = resp.status();
        let failed = |error: AppError| CallError {
            status: Some(status),
            error,
        };
        let body: TelegramResponse<T> = resp
            .json()
            .await
            .map_err(|e| failed(AppError::Channel(format!("{} JSON parse error: {}", method, e))))?;

        if !body.ok {
            let desc = body.description.unwrap_or_else(|| "unknown error".to_string());
            return Err(failed(AppError::Channel(format!(
                "Telegram API error ({}): {}",
                status, desc
            ))));
        }
        body.result
            .ok_or_else(|| failed(AppError::Channel(format!("{} returned no result", method))))
    }

    /// Long-poll for updates starting at `offset`.
    ///
    /// Updates without text (stickers, joins, edits) are skipped but still
    /// advance the offset.
    pub async fn get_updates(&self, offset: i64) -> AppResult<UpdateBatch> {
        let updates: Vec<TelegramUpdate> = self
            .call(
                "getUpdates",
                &serde_json::json!({
                    "offset": offset,
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        let next_offset = updates
            .iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(offset);

        let messages: Vec<InboundMessage> = updates
            .into_iter()
            .filter_map(|u| {
                let msg = u.message?;
                let text = msg.text?;
                let user_id = msg.from.map(|f| f.id).unwrap_or(msg.chat.id);
                Some(InboundMessage::from_text(
                    UserId::new(user_id.to_string()),
                    ChatId::new(msg.chat.id.to_string()),
                    &text,
                ))
            })
            .collect();

        if !messages.is_empty() {
            debug!(count = messages.len(), next_offset, "Received Telegram updates");
        }
        Ok(UpdateBatch { messages, next_offset })
    }
}

#[async_trait]
impl MessagingChannel for TelegramChannel {
    async fn send_text(&self, chat: &ChatId, text: &str) -> AppResult<()> {
        let body = serde_json::json!({
            "chat_id": chat.0,
            "text": text,
            "disable_web_page_preview": true,
        });

        with_retry_if(
            || self.call::<serde_json::Value>("sendMessage", &body),
            CallError::is_transient,
            SEND_ATTEMPTS,
            self.retry_delay,
        )
        .await
        .map_err(|e| {
            warn!(chat_id = %chat, error = %e, "Failed to deliver message");
            AppError::from(e)
        })?;
        Ok(())
    }

    async fn send_typing(&self, chat: &ChatId) -> AppResult<()> {
        self.call::<bool>(
            "sendChatAction",
            &serde_json::json!({ "chat_id": chat.0, "action": "typing" }),
        )
        .await?;
        Ok(())
    }
}
