use crate::conversation::client::CompletionClient;
use crate::error::CompletionError;
use crate::models::ConversationMessage;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// When the history counts as over budget.
#[derive(Debug, Clone, Copy)]
pub struct TrimPolicy {
    /// Trim once the history holds at least this many messages.
    pub max_messages: usize,
    /// Trim once the approximate token count exceeds this.
    pub max_tokens: usize,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            max_messages: 10,
            max_tokens: 2000,
        }
    }
}

/// Bounded message history fed to the completion service.
///
/// Index 0 is always the system persona and is never removed. The history is
/// only mutated through [`ConversationContext::submit`].
pub struct ConversationContext {
    history: Vec<ConversationMessage>,
    model: String,
    temperature: f32,
    policy: TrimPolicy,
}

impl ConversationContext {
    pub fn new(persona: impl Into<String>, model: impl Into<String>, temperature: f32, policy: TrimPolicy) -> Self {
        Self {
            history: vec![ConversationMessage::system(persona)],
            model: model.into(),
            temperature,
            policy,
        }
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the completion service about `question` and record the exchange.
    ///
    /// A failed completion leaves the user message in place and is returned
    /// as-is; nothing is retried.
    pub async fn submit(
        &mut self,
        question: &str,
        client: &dyn CompletionClient,
    ) -> Result<String, CompletionError> {
        self.history.push(ConversationMessage::user(question));
        log_debug!("submitting history of {} messages", self.history.len());

        let reply = client
            .complete(&self.history, &self.model, self.temperature)
            .await?
            .trim()
            .to_string();

        self.history.push(ConversationMessage::assistant(reply.clone()));
        self.trim_if_over_budget();

        Ok(reply)
    }

    /// Whitespace-delimited word count of the serialized history. Only an
    /// approximation of what the model tokenizer would report.
    pub fn approximate_tokens(&self) -> usize {
        flatten_history(&self.history).split_whitespace().count()
    }

    /// Drop the oldest exchange after the system message, at most once.
    fn trim_if_over_budget(&mut self) {
        let tokens = self.approximate_tokens();
        let over_budget =
            self.history.len() >= self.policy.max_messages || tokens > self.policy.max_tokens;
        if !over_budget || self.history.len() < 3 {
            return;
        }

        self.history.drain(1..3);
        log_info!(
            "history trimmed to {} messages (was {} messages, ~{} tokens)",
            self.history.len(),
            self.history.len() + 2,
            tokens
        );
    }
}

/// Flat JSON-like rendering with `", "` and `": "` separators, so each
/// message adds a few whitespace-delimited words beyond its content.
fn flatten_history(history: &[ConversationMessage]) -> String {
    let entries: Vec<String> = history
        .iter()
        .map(|message| {
            let content = serde_json::to_string(&message.content)
                .unwrap_or_else(|_| format!("\"{}\"", message.content));
            format!(
                "{{\"role\": \"{}\", \"content\": {}}}",
                message.role.as_str(),
                content
            )
        })
        .collect();
    format!("[{}]", entries.join(", "))
}
