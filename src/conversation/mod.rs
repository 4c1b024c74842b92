//! Conversation layer: per-user sessions and the state machine driving them.

pub mod machine;
pub mod store;

pub use machine::ConversationStateMachine;
pub use store::{SessionStore, Turn};
