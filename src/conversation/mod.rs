pub mod client;
pub mod context;

pub use client::{CompletionClient, OpenAiClient};
pub use context::{ConversationContext, TrimPolicy};
