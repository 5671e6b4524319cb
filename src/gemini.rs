//! # Gemini Client Module
//!
//! Calls the Gemini `generateContent` endpoint with a primary model and a
//! single fallback model. Transient failures are retried with jittered
//! exponential backoff; repeated failures trip a circuit breaker.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Telegram's per-message character limit
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Custom error types for LLM calls
#[derive(Debug, Clone, PartialEq)]
pub enum GeminiError {
    /// No API key configured
    Disabled,
    /// Too many recent failures, calls are short-circuited
    CircuitOpen,
    /// Request exceeded the configured timeout
    Timeout,
    /// Transport-level failure
    Http(String),
    /// Non-success response from the API
    Api { status: u16, message: String },
    /// The model returned no text (blocked or empty candidate)
    EmptyResponse,
}

impl std::fmt::Display for GeminiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeminiError::Disabled => write!(f, "AI assistant is not configured"),
            GeminiError::CircuitOpen => write!(f, "AI assistant temporarily unavailable"),
            GeminiError::Timeout => write!(f, "AI request timed out"),
            GeminiError::Http(msg) => write!(f, "HTTP error: {msg}"),
            GeminiError::Api { status, message } => write!(f, "Gemini API error {status}: {message}"),
            GeminiError::EmptyResponse => write!(f, "Gemini returned an empty response"),
        }
    }
}

impl std::error::Error for GeminiError {}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeminiError::Timeout
        } else {
            GeminiError::Http(err.to_string())
        }
    }
}

impl GeminiError {
    /// Whether retrying the same model might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GeminiError::Timeout | GeminiError::Http(_) => true,
            GeminiError::Api { status, .. } => *status == 429 || *status >= 500,
            GeminiError::Disabled | GeminiError::CircuitOpen | GeminiError::EmptyResponse => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Exponential backoff with up to 50% random jitter, capped at `max_retry_delay_ms`
pub fn retry_delay(config: &RecoveryConfig, attempt: u32) -> Duration {
    let exponent = attempt.min(5);
    let base = config.base_retry_delay_ms.saturating_mul(1u64 << exponent);
    let jitter = (base as f64 * rand::random::<f64>() * 0.5) as u64;
    Duration::from_millis(base.saturating_add(jitter).min(config.max_retry_delay_ms))
}

/// Assemble the final prompt from context, recent history and the new message
pub fn build_prompt(context: &str, history: &str, message: &str) -> String {
    let mut prompt = String::with_capacity(context.len() + history.len() + message.len() + 64);
    prompt.push_str(context.trim_end());
    if !history.trim().is_empty() {
        prompt.push_str("\n\nRECENT CONVERSATION:\n");
        prompt.push_str(history.trim());
    }
    prompt.push_str("\n\nUser message: ");
    prompt.push_str(message.trim());
    prompt
}

/// Cut text to at most `limit` characters on a char boundary, marking the cut
pub fn truncate_for_telegram(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    primary_model: String,
    fallback_model: String,
    recovery: RecoveryConfig,
    breaker: CircuitBreaker,
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
        recovery: RecoveryConfig,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(recovery.operation_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
            breaker: CircuitBreaker::new(recovery.clone()),
            recovery,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn breaker_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Generate a reply, trying the fallback model once if the primary fails
    pub async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GeminiError::Disabled);
        };

        if self.breaker.is_open() {
            warn!("Gemini circuit breaker open, skipping request");
            return Err(GeminiError::CircuitOpen);
        }

        let mut last_error = GeminiError::EmptyResponse;
        for model in [self.primary_model.as_str(), self.fallback_model.as_str()] {
            match self.generate_with_retry(api_key, model, prompt).await {
                Ok(text) => {
                    self.breaker.record_success();
                    info!(model = %model, chars = text.chars().count(), "Gemini response received");
                    return Ok(truncate_for_telegram(&text, TELEGRAM_MESSAGE_LIMIT));
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Gemini model failed");
                    last_error = e;
                }
            }
        }

        self.breaker.record_failure();
        Err(last_error)
    }

    async fn generate_with_retry(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, GeminiError> {
        let mut attempt = 0;
        loop {
            match self.call_model(api_key, model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.recovery.max_retries => {
                    let delay = retry_delay(&self.recovery, attempt);
                    debug!(model = %model, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying Gemini call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_model(&self, api_key: &str, model: &str, prompt: &str) -> Result<String, GeminiError> {
        let url = format!("{GEMINI_API_BASE}/models/{model}:generateContent");
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 1024,
            },
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|env| env.error.message)
                .unwrap_or(raw);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        extract_text(parsed).ok_or(GeminiError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let bangla = "অর্ডার".repeat(1000);
        let cut = truncate_for_telegram(&bangla, TELEGRAM_MESSAGE_LIMIT);
        assert_eq!(cut.chars().count(), TELEGRAM_MESSAGE_LIMIT);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate_for_telegram("short", 10), "short");
    }

    #[test]
    fn test_build_prompt_layout() {
        let prompt = build_prompt("CONTEXT\n", "User: hi\nAssistant: hello", "  size?  ");
        assert!(prompt.starts_with("CONTEXT\n\nRECENT CONVERSATION:\nUser: hi"));
        assert!(prompt.ends_with("User message: size?"));
        assert!(!build_prompt("C", " ", "m").contains("RECENT CONVERSATION"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(GeminiError::Timeout.is_retryable());
        assert!(GeminiError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(GeminiError::Api { status: 429, message: String::new() }.is_retryable());
        assert!(!GeminiError::Api { status: 400, message: String::new() }.is_retryable());
        assert!(!GeminiError::EmptyResponse.is_retryable());
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let config = RecoveryConfig::default();
        for attempt in 0..10 {
            assert!(retry_delay(&config, attempt) <= Duration::from_millis(config.max_retry_delay_ms));
        }
        assert!(retry_delay(&config, 0) >= Duration::from_millis(config.base_retry_delay_ms));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).as_deref(), Some("Hello there"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(extract_text(empty), None);
    }

    #[tokio::test]
    async fn test_disabled_without_key() {
        let client = GeminiClient::new(None, "a", "b", RecoveryConfig::default()).unwrap();
        assert_eq!(client.generate("hi").await, Err(GeminiError::Disabled));
    }
}
