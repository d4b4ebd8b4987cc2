//! OpenAI-compatible chat completion gateway.
//!
//! Calls `{base_url}/v1/chat/completions` with a bearer API key, retrying
//! transport failures and 5xx/429 responses (max 3 attempts, exponential
//! backoff).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};
use tracing::warn;

use super::{ChatCompletion, ChatError, ChatMessage};

const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Default gateway base URL.
pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev";

/// Default model name.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: super::ChatRole,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat completion over HTTP.
#[derive(Clone)]
pub struct GatewayCompletion {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    retry_base: Duration,
}

impl GatewayCompletion {
    pub fn new(client: Client, base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            retry_base: Duration::from_secs(1),
        }
    }

    /// Override the first backoff delay (doubles per attempt).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, messages: &[ChatMessage]) -> Result<String, Attempt> {
        let body = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Attempt::Retry(format!("AI request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            let msg = format!("AI API error: {status} {text}");
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Attempt::Retry(msg)
            } else {
                Attempt::Fatal(msg)
            });
        }

        let data: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| Attempt::Fatal(format!("AI response parse error: {e}")))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Attempt::Fatal("AI response contained no message".to_string()))
    }
}

enum Attempt {
    Retry(String),
    Fatal(String),
}

#[async_trait]
impl ChatCompletion for GatewayCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            match self.attempt(messages).await {
                Ok(content) => return Ok(content),
                Err(Attempt::Fatal(msg)) => return Err(ChatError::Completion(msg)),
                Err(Attempt::Retry(msg)) => {
                    warn!(attempt = attempt + 1, error = %msg, "AI gateway attempt failed");
                    last_error = Some(msg);
                }
            }

            if attempt + 1 < MAX_RETRY_ATTEMPTS {
                sleep(self.retry_base * 2u32.pow(attempt)).await;
            }
        }

        Err(ChatError::Completion(last_error.unwrap_or_else(|| {
            format!("AI request failed after {MAX_RETRY_ATTEMPTS} attempts")
        })))
    }
}
