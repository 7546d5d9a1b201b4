//! Completion service client.
//!
//! Speaks the OpenAI-compatible `chat/completions` protocol. Requests are
//! not retried and carry no timeout; a failure ends the run.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;
use crate::models::ConversationMessage;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete the conversation and return the raw reply text.
    async fn complete(
        &self,
        history: &[ConversationMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

fn map_status(status: StatusCode, body: String) -> CompletionError {
    match status.as_u16() {
        401 | 403 => CompletionError::Auth(body),
        429 => CompletionError::RateLimit(body),
        _ => CompletionError::Request(format!("status {status}: {body}")),
    }
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .build()
            .map_err(|err| CompletionError::Request(format!("failed to create HTTP client: {err}")))?;
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        history: &[ConversationMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model,
            messages: history,
            temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| CompletionError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status(status, body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| CompletionError::MalformedResponse(err.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("no choices in response".into()))
    }
}
