//! OpenAI-compatible chat-completions client used for context extraction.
//!
//! Works against Groq by default; any endpoint speaking the same protocol
//! (OpenAI, Ollama, vLLM) can be configured through the base URL.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{parse_interpretation, system_prompt, ContextExtractor, ContextInterpretation};
use crate::error::AppError;

const SERVICE: &str = "llm";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("credentials rejected ({status}): {body}")]
    Unauthorized { status: StatusCode, body: String },
    #[error("API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("{0}")]
    Malformed(String),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        let message = err.to_string();
        match err {
            LlmError::Transport(_) | LlmError::Status { .. } => AppError::UpstreamUnavailable {
                service: SERVICE,
                message,
            },
            LlmError::Unauthorized { .. } => AppError::AuthFailure {
                service: SERVICE,
                message,
            },
            LlmError::Malformed(_) => AppError::ParseFailure {
                service: SERVICE,
                message,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Context extractor backed by a hosted LLM.
#[derive(Clone)]
pub struct LlmExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl LlmExtractor {
    pub fn new(client: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            system_prompt: system_prompt(),
        }
    }

    /// Sends one completion request and returns the assistant text.
    async fn complete(&self, user: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LlmError::Unauthorized { status, body }
                }
                _ => LlmError::Status { status, body },
            });
        }

        let body: ChatResponse = res
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("completion parse failed: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("completion has no content".into()))
    }
}

#[async_trait]
impl ContextExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<ContextInterpretation, AppError> {
        let started = Instant::now();
        let content = self.complete(text).await?;
        tracing::debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "context extraction completed"
        );
        parse_interpretation(&content).map_err(|e| LlmError::Malformed(e).into())
    }
}
