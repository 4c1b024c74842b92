// Recording mailer for tests

use crate::mailer::Mailer;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// (subject, html body, address) for every delivered email
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Calls to `send`, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, subject: &str, html_body: &str, address: &str) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Mail("mail server unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), html_body.to_string(), address.to_string()));
        Ok(())
    }
}
