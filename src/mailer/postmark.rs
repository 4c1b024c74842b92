// Postmark transactional email adapter
// API Reference: https://postmarkapp.com/developer/api/email-api

use crate::mailer::Mailer;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const POSTMARK_API_BASE: &str = "https://api.postmarkapp.com";

pub struct PostmarkMailer {
    http: reqwest::Client,
    server_token: String,
    from: String,
    api_base: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    message_stream: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkResponse {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
    #[serde(rename = "MessageID", default)]
    message_id: Option<String>,
}

impl PostmarkMailer {
    pub fn new(server_token: impl Into<String>, from: impl Into<String>) -> Self {
        Self::with_api_base(server_token, from, POSTMARK_API_BASE)
    }

    pub fn with_api_base(server_token: impl Into<String>, from: impl Into<String>, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_token: server_token.into(),
            from: from.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &crate::config::EmailConfig) -> Self {
        Self::new(config.postmark_token.clone(), config.from_address.clone())
    }
}

#[async_trait]
impl Mailer for PostmarkMailer {
    async fn send(&self, subject: &str, html_body: &str, address: &str) -> AppResult<()> {
        if self.server_token.is_empty() {
            return Err(AppError::Mail("POSTMARK_TOKEN not configured".to_string()));
        }

        let email = PostmarkEmail {
            from: &self.from,
            to: address,
            subject,
            html_body,
            message_stream: "outbound",
        };

        let response = self
            .http
            .post(format!("{}/email", self.api_base))
            .header("X-Postmark-Server-Token", &self.server_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&email)
            .send()
            .await
            .map_err(|e| AppError::Mail(format!("Postmark request failed: {}", e)))?;

        let status = response.status();
        let body: PostmarkResponse = response
            .json()
            .await
            .map_err(|e| AppError::Mail(format!("Unreadable Postmark response ({}): {}", status, e)))?;

        if !status.is_success() || body.error_code != 0 {
            warn!(status = %status, error_code = body.error_code, "Postmark rejected email");
            return Err(AppError::Mail(format!(
                "Postmark error {}: {}",
                body.error_code, body.message
            )));
        }

        info!(message_id = ?body.message_id, subject = %subject, "Report emailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_send_posts_email() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/email")
            .match_header("X-Postmark-Server-Token", "pm-token")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "From": "bot@example.com",
                "To": "user@example.com",
                "Subject": "Quantum computing report",
                "HtmlBody": "<h1>Report</h1>"
            })))
            .with_status(200)
            .with_body(r#"{"ErrorCode":0,"Message":"OK","MessageID":"abc-123"}"#)
            .create_async()
            .await;

        let mailer = PostmarkMailer::with_api_base("pm-token", "bot@example.com", &server.url());
        mailer
            .send("Quantum computing report", "<h1>Report</h1>", "user@example.com")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_email_is_mail_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/email")
            .with_status(422)
            .with_body(r#"{"ErrorCode":300,"Message":"Invalid 'To' address"}"#)
            .create_async()
            .await;

        let mailer = PostmarkMailer::with_api_base("pm-token", "bot@example.com", &server.url());
        let err = mailer.send("s", "b", "nobody@").await.unwrap_err();
        assert!(matches!(err, AppError::Mail(ref m) if m.contains("Invalid 'To' address")));
    }

    #[tokio::test]
    async fn test_missing_token_fails() {
        let mailer = PostmarkMailer::new("", "bot@example.com");
        assert!(matches!(mailer.send("s", "b", "a@b.c").await, Err(AppError::Mail(_))));
    }
}
