// Deep Search Agent - conversational deep-research bot

pub mod agents;
pub mod bot;
pub mod channel;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod mailer;
pub mod models;
pub mod reasoning; // Reasoning service behind every pipeline stage
pub mod routes;
pub mod search; // Tavily + SerpAPI evidence aggregation
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
// Note: Import specific items from types module instead of glob to avoid name conflicts
// e.g., use deep_search_agent::types::{AppError, AppResult};
