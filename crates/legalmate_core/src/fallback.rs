//! Generative fallback: one stateless chat completion per query.
//!
//! The request always carries exactly two messages, the fixed system persona
//! and the raw user query. Provider failures never reach the caller of
//! [`GenerativeFallbackClient::answer`]; they become apology replies.

use crate::config::FallbackConfig;
use crate::model::FallbackOutcome;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant for Australian consumer rights and VCAT law.";

pub const FALLBACK_DISCLAIMER: &str =
    "Note: This response was generated using GPT and may not reflect official legal guidance.";

pub const RATE_LIMIT_APOLOGY: &str =
    "I'm receiving too many requests at the moment. Please wait a few seconds and try again.";

pub const GENERIC_APOLOGY: &str =
    "Sorry, I couldn't reach the legal assistant service just now. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackError {
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Sends a chat request and returns the model's text.
pub trait ChatTransport {
    fn complete(&self, request: &ChatRequest) -> Result<String, FallbackError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// OpenAI-compatible `/chat/completions` over blocking HTTP.
pub struct OpenAiTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiTransport {
    pub fn new(config: &FallbackConfig) -> Result<Self, FallbackError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FallbackError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

impl ChatTransport for OpenAiTransport {
    fn complete(&self, request: &ChatRequest) -> Result<String, FallbackError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    FallbackError::Timeout
                } else {
                    FallbackError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().unwrap_or_default();
            return Err(FallbackError::RateLimited(error_message(&body)));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FallbackError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: ChatResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                FallbackError::Timeout
            } else {
                FallbackError::Parse(e.to_string())
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| FallbackError::Parse("response has no message content".to_string()))
    }
}

/// Result of a fallback call as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReply {
    pub content: String,
    pub outcome: FallbackOutcome,
}

pub struct GenerativeFallbackClient {
    transport: Box<dyn ChatTransport + Send + Sync>,
    model: String,
}

impl GenerativeFallbackClient {
    pub fn new<T>(transport: T, model: impl Into<String>) -> Self
    where
        T: ChatTransport + Send + Sync + 'static,
    {
        Self {
            transport: Box::new(transport),
            model: model.into(),
        }
    }

    pub fn openai(config: &FallbackConfig) -> Result<Self, FallbackError> {
        Ok(Self::new(OpenAiTransport::new(config)?, config.model.clone()))
    }

    /// The request never includes earlier conversation turns.
    pub fn request_for(&self, query: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: query.to_string(),
                },
            ],
        }
    }

    /// Generated text with the disclaimer appended, or the classified error.
    pub fn try_answer(&self, query: &str) -> Result<String, FallbackError> {
        let text = self.transport.complete(&self.request_for(query))?;
        Ok(format!("{}\n\n{FALLBACK_DISCLAIMER}", text.trim_end()))
    }

    /// Single attempt, no retry. Never fails: rate limiting and every other
    /// provider error degrade to an apology.
    pub fn answer(&self, query: &str) -> FallbackReply {
        match self.try_answer(query) {
            Ok(content) => {
                info!(model = %self.model, "generative fallback answered");
                FallbackReply {
                    content,
                    outcome: FallbackOutcome::Generated,
                }
            }
            Err(FallbackError::RateLimited(msg)) => {
                warn!(model = %self.model, reason = %msg, "generative fallback rate limited");
                FallbackReply {
                    content: RATE_LIMIT_APOLOGY.to_string(),
                    outcome: FallbackOutcome::RateLimited,
                }
            }
            Err(err) => {
                error!(model = %self.model, error = %err, "generative fallback failed");
                FallbackReply {
                    content: GENERIC_APOLOGY.to_string(),
                    outcome: FallbackOutcome::Failed,
                }
            }
        }
    }
}
