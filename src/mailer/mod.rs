//! Outbound email for finished reports.

#[cfg(test)]
pub mod mock;
pub mod postmark;

pub use postmark::PostmarkMailer;

use crate::types::AppResult;
use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one HTML email; any failure is reported as [`crate::types::AppError::Mail`].
    async fn send(&self, subject: &str, html_body: &str, address: &str) -> AppResult<()>;
}
