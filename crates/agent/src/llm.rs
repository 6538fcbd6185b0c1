use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use coco_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("completion request failed: {0}")]
    Http(String),
    #[error("completion request rejected with status {status}")]
    Status { status: u16 },
    #[error("completion response could not be decoded: {0}")]
    Decode(String),
    #[error("completion response contained no text")]
    Empty,
    #[error("llm configuration invalid: {0}")]
    Config(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// One completion call. Temperature is optional; the classifier pins it to
/// zero, everything else leaves the provider default.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// The completion provider seam. Output is untrusted text: callers parse it
/// or substring-match it, never assume structure.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}

#[async_trait]
impl<C> CompletionClient for std::sync::Arc<C>
where
    C: CompletionClient + ?Sized,
{
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        (**self).complete(request).await
    }
}

/// House cleanup applied to generated reply text before it leaves a handler.
pub fn clean_reply(raw: &str) -> String {
    raw.trim().replace('\u{60a8}', "\u{4f60}")
}

const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages-API client.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::Config("llm.api_key is not set".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ProviderError::Config(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_DEFAULT_BASE_URL.to_string()),
            api_key,
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: u32,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let body = MessagesBody {
            model: &self.model,
            system: &request.system,
            max_tokens: request.max_tokens,
            messages: &request.messages,
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|error| ProviderError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16() });
        }

        let decoded: MessagesResponse = response
            .json()
            .await
            .map_err(|error| ProviderError::Decode(error.to_string()))?;

        let text: String = decoded
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(text)
    }
}

/// Test double: replays queued replies in order and records every request.
/// An exhausted queue (or `fail_all`) returns a provider error.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    replies: tokio::sync::Mutex<std::collections::VecDeque<String>>,
    pub requests: tokio::sync::Mutex<Vec<CompletionRequest>>,
    pub fail_all: bool,
}

impl ScriptedCompletionClient {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: tokio::sync::Mutex::new(
                replies.into_iter().map(Into::into).collect(),
            ),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self { fail_all: true, ..Self::default() }
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        self.requests.lock().await.push(request);
        if self.fail_all {
            return Err(ProviderError::Http("scripted client configured to fail".to_string()));
        }
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ProviderError::Http("scripted client exhausted".to_string()))
    }
}
