// Recording channel for tests

use crate::channel::MessagingChannel;
use crate::models::ChatId;
use crate::types::AppResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(ChatId, String)>>,
    typing: AtomicUsize,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of every message sent so far
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send_text(&self, chat: &ChatId, text: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push((chat.clone(), text.to_string()));
        Ok(())
    }

    async fn send_typing(&self, _chat: &ChatId) -> AppResult<()> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
