//! HTTP client for the answer-generation API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{SibylError, SibylResult};
use crate::domain::models::{GenerationConfig, GenerationOutput, GenerationRequest};
use crate::domain::ports::Generator;

use super::retry::RetryPolicy;

const SYSTEM_PROMPT: &str = "You are a careful assistant answering questions \
    strictly from the provided sources. Respond with a JSON object containing \
    \"answer\", \"confidence\" (0.0 to 1.0), and \"risk\".";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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
    content: String,
}

/// A single failed attempt, classified for the retry loop.
struct AttemptError {
    transient: bool,
    message: String,
}

/// Chat-completions generation client with retry on transient failures.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f64,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> SibylResult<Self> {
        // Per-request timeout slightly inside the query deadline so a hung
        // request fails here as transient instead of eating the whole budget.
        let request_timeout = Duration::from_secs(config.timeout_secs.max(2) - 1);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SibylError::Configuration(format!("generation client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key.clone(),
            retry: RetryPolicy::new(config),
        })
    }

    async fn request_once(&self, prompt: &str) -> Result<String, AttemptError> {
        let mut builder = self.client.post(&self.endpoint).json(&ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        });

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| AttemptError {
            transient: e.is_timeout() || e.is_connect(),
            message: format!("request failed: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error() || status.as_u16() == 429;
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                transient,
                message: format!("endpoint returned {status}: {body}"),
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| AttemptError {
            transient: false,
            message: format!("invalid response body: {e}"),
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AttemptError {
                transient: false,
                message: "response had no choices".to_string(),
            })
    }

    /// Parse the model's reply into structured output.
    ///
    /// Tries the content as raw JSON first, then inside a ```json fence.
    /// A reply that is neither is a contract violation and fails the query;
    /// fabricating a confidence for freeform text would overstate it.
    ///
    /// # Errors
    /// Returns `SibylError::GenerationFailed` for unparseable replies.
    pub fn parse_output(content: &str) -> SibylResult<GenerationOutput> {
        let trimmed = content.trim();

        if let Ok(output) = serde_json::from_str::<GenerationOutput>(trimmed) {
            return Ok(output);
        }

        if let Some(inner) = Self::extract_fenced_json(trimmed) {
            if let Ok(output) = serde_json::from_str::<GenerationOutput>(inner.trim()) {
                return Ok(output);
            }
        }

        let preview: String = trimmed.chars().take(120).collect();
        Err(SibylError::GenerationFailed(format!(
            "reply was not structured JSON: {preview}"
        )))
    }

    fn extract_fenced_json(content: &str) -> Option<&str> {
        let start = content.find("```json").map(|i| i + "```json".len())
            .or_else(|| content.find("```").map(|i| i + "```".len()))?;
        let rest = &content[start..];
        let end = rest.find("```")?;
        Some(&rest[..end])
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> SibylResult<GenerationOutput> {
        let mut last_message = String::new();

        for attempt in 0..=self.retry.max_retries() {
            match self.request_once(&request.prompt).await {
                Ok(content) => {
                    debug!(attempt, "generation succeeded");
                    return Self::parse_output(&content);
                }
                Err(err) if err.transient && attempt < self.retry.max_retries() => {
                    self.retry.wait(attempt, &err.message).await;
                    last_message = err.message;
                }
                Err(err) => return Err(SibylError::GenerationFailed(err.message)),
            }
        }

        Err(SibylError::GenerationFailed(last_message))
    }
}
