//! Chat-completion client with bounded, constant-backoff retries.
//!
//! Two layers:
//! - [`ChatTransport`] performs exactly one request to the model.
//! - [`CompletionClient`] wraps a transport with a [`RetryPolicy`] and is the
//!   [`Completer`] the pipeline talks to.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use prospector_shared::{CompletionConfig, ProspectorError, Result, RetryPolicy};

/// Longest slice of an error body kept in a [`ChatError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single chat request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Parse(String),

    #[error("model returned no content")]
    EmptyContent,
}

/// Failure of a whole [`Completer::complete`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("no usable completion after {attempts} attempts (last error: {last_error})")]
    ExhaustedRetries { attempts: u32, last_error: ChatError },
}

impl CompletionError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::ExhaustedRetries { attempts, .. } => *attempts,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One underlying model call, no retries.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(&self, model: &str, prompt: &str) -> std::result::Result<String, ChatError>;
}

/// Prompt in, generated text out. The seam the pipeline depends on.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, CompletionError>;
}

// ---------------------------------------------------------------------------
// CompletionClient
// ---------------------------------------------------------------------------

/// Retrying completion client.
pub struct CompletionClient<T> {
    transport: T,
    model: String,
    policy: RetryPolicy,
}

impl<T: ChatTransport> CompletionClient<T> {
    pub fn new(transport: T, model: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            model: model.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `prompt` until the model returns non-empty content or the attempt
    /// budget runs out. Every failed attempt (error or empty content) is
    /// followed by the same fixed pause, except the last one.
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> std::result::Result<String, CompletionError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = ChatError::EmptyContent;

        for attempt in 1..=max_attempts {
            match self.transport.chat(&self.model, prompt).await {
                Ok(content) if !content.trim().is_empty() => {
                    debug!(attempt, response_chars = content.len(), "completion received");
                    return Ok(content);
                }
                Ok(_) => last_error = ChatError::EmptyContent,
                Err(e) => last_error = e,
            }

            warn!(attempt, max_attempts, error = %last_error, "completion attempt failed");

            if attempt < max_attempts && !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(CompletionError::ExhaustedRetries {
            attempts: max_attempts,
            last_error,
        })
    }
}

#[async_trait]
impl<T: ChatTransport> Completer for CompletionClient<T> {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, CompletionError> {
        CompletionClient::complete(self, prompt).await
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible transport
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`ChatTransport`] for `POST {base_url}/chat/completions`.
///
/// The prompt is sent as a single `system` message.
#[derive(Clone)]
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiChat {
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProspectorError::config("missing model API key"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    /// Build from the `[completion]` config section and a resolved key.
    pub fn from_config(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::new(
            api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl ChatTransport for OpenAiChat {
    async fn chat(&self, model: &str, prompt: &str) -> std::result::Result<String, ChatError> {
        let request = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "system",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ChatError::EmptyContent)
    }
}
