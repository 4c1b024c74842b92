//! Email Stage
//!
//! Asks the reasoning service to turn the report into an HTML email, then
//! hands it to the [`Mailer`]. A reply that is not usable JSON is not fatal:
//! the Markdown report is rendered locally instead.

use crate::agents::{StageContext, EMAIL_STAGE};
use crate::mailer::Mailer;
use crate::types::{AppError, AppResult};
use crate::utils::extract_json_block;
use pulldown_cmark::{html, Options, Parser};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_SUBJECT: &str = "Your research report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub html_body: String,
}

impl EmailDraft {
    /// Use the model's `{subject, html_body}` reply, or render `report` ourselves.
    pub fn parse_or_render(reply: &str, report: &str) -> Self {
        match serde_json::from_str::<EmailDraft>(extract_json_block(reply)) {
            Ok(draft) if !draft.subject.trim().is_empty() && !draft.html_body.trim().is_empty() => draft,
            _ => {
                warn!("Email draft unusable, rendering report locally");
                Self {
                    subject: DEFAULT_SUBJECT.to_string(),
                    html_body: markdown_to_html(report),
                }
            }
        }
    }
}

fn markdown_to_html(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(content, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub struct EmailAgent;

impl EmailAgent {
    /// Draft an email for `report` and deliver it to `address`.
    pub async fn send_report(
        ctx: &StageContext<'_>,
        mailer: &dyn Mailer,
        report: &str,
        address: &str,
    ) -> AppResult<()> {
        let prompt = format!("Report to send:\n\n{}\n\nE-mail address: {}", report, address);
        let reply = EMAIL_STAGE.execute(ctx, &prompt).await?;
        let draft = EmailDraft::parse_or_render(&reply, report);

        info!(session = %ctx.session, subject = %draft.subject, "Sending report by email");
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(AppError::Cancelled),
            sent = mailer.send(&draft.subject, &draft.html_body, address) => sent,
        }
    }
}
