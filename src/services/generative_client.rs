//! Outbound calls to the generative model service.
//!
//! The attempt loop is an explicit bounded iteration: every attempt yields an
//! [`AttemptOutcome`] and [`run_with_retry`] decides whether to back off and
//! try again. Backoff is linear in the attempt index.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{env, future::Future, time::Duration};

use crate::error::GenerationError;
use crate::models::itinerary::RawGenerationResult;
use crate::services::prompt_builder::{GenerationParams, PromptPayload};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 1000;
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_env() -> Self {
        let max_attempts = env::var("GENERATION_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let backoff_ms = env::var("GENERATION_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BACKOFF_MS);
        Self::new(max_attempts, Duration::from_millis(backoff_ms))
    }

    /// Wait applied after failed attempt `attempt` (1-based), if another follows.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.base_delay * attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::from_millis(DEFAULT_BACKOFF_MS))
    }
}

/// Tagged result of one attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    Retryable(GenerationError),
    Terminal(GenerationError),
}

impl<T> AttemptOutcome<T> {
    /// Chains a fallible post-processing step; its failure is retryable.
    pub fn and_then<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> AttemptOutcome<U>
    where
        E: Into<GenerationError>,
    {
        match self {
            AttemptOutcome::Success(value) => match f(value) {
                Ok(next) => AttemptOutcome::Success(next),
                Err(err) => AttemptOutcome::Retryable(err.into()),
            },
            AttemptOutcome::Retryable(err) => AttemptOutcome::Retryable(err),
            AttemptOutcome::Terminal(err) => AttemptOutcome::Terminal(err),
        }
    }
}

#[derive(Debug)]
pub struct RetrySuccess<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct RetryFailure {
    pub error: GenerationError,
    pub attempts: u32,
}

/// Runs `attempt_fn` until it succeeds, fails terminally or the policy's
/// attempts are spent. Attempts are strictly sequential.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<RetrySuccess<T>, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    let mut attempt = 1;
    loop {
        match attempt_fn(attempt).await {
            AttemptOutcome::Success(value) => {
                return Ok(RetrySuccess {
                    value,
                    attempts: attempt,
                })
            }
            AttemptOutcome::Terminal(error) => {
                warn!("Generation attempt {} failed terminally: {}", attempt, error);
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                });
            }
            AttemptOutcome::Retryable(error) => match policy.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        "Generation attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, policy.max_attempts, error, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    warn!(
                        "Generation attempt {}/{} failed: {}. No attempts left",
                        attempt, policy.max_attempts, error
                    );
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }
            },
        }
    }
}

/// Status and body of one HTTP exchange with the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    NotConfigured(String),
    Network(String),
}

/// Seam between the retry logic and the wire. Tests substitute scripted
/// replies for the real HTTP client.
pub trait GenerativeTransport {
    async fn send(&self, payload: &PromptPayload) -> Result<TransportReply, TransportError>;
}

impl<T: GenerativeTransport> GenerativeTransport for std::sync::Arc<T> {
    async fn send(&self, payload: &PromptPayload) -> Result<TransportReply, TransportError> {
        (**self).send(payload).await
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let model = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            api_key,
            model,
            base_url,
        }
    }
}

/// Reads the generation parameter overrides from the environment.
pub fn generation_params_from_env() -> GenerationParams {
    let mut params = GenerationParams::default();
    if let Some(temperature) = env::var("GEMINI_TEMPERATURE")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        params.temperature = temperature;
    }
    if let Some(max_tokens) = env::var("GEMINI_MAX_OUTPUT_TOKENS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        params.max_output_tokens = max_tokens;
    }
    params
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<GeminiSafetySetting<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting<'a> {
    category: &'a str,
    threshold: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiTransport {
    http_client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiTransport {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl GenerativeTransport for GeminiTransport {
    async fn send(&self, payload: &PromptPayload) -> Result<TransportReply, TransportError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| TransportError::NotConfigured("GEMINI_API_KEY not set".to_string()))?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: &payload.text,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: payload.params.temperature,
                max_output_tokens: payload.params.max_output_tokens,
            },
            safety_settings: payload
                .params
                .safety_thresholds
                .iter()
                .map(|(category, threshold)| GeminiSafetySetting {
                    category: category.as_str(),
                    threshold: threshold.as_str(),
                })
                .collect(),
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(TransportReply { status, body })
    }
}

/// Classifies one transport result into an attempt outcome.
pub fn classify_reply(
    reply: Result<TransportReply, TransportError>,
) -> AttemptOutcome<RawGenerationResult> {
    let reply = match reply {
        Ok(reply) => reply,
        Err(TransportError::NotConfigured(reason)) => {
            return AttemptOutcome::Terminal(GenerationError::NotConfigured(reason))
        }
        Err(TransportError::Network(reason)) => {
            return AttemptOutcome::Retryable(GenerationError::Transport(reason))
        }
    };

    let status = reply.status;
    if status == 429 || reply.body.contains("RESOURCE_EXHAUSTED") {
        return AttemptOutcome::Terminal(GenerationError::QuotaExhausted { status });
    }
    if matches!(status, 500 | 502 | 503 | 504) {
        return AttemptOutcome::Retryable(GenerationError::TransientService { status });
    }
    if !(200..300).contains(&status) {
        return AttemptOutcome::Retryable(GenerationError::UnexpectedStatus {
            status,
            body: reply.body.chars().take(200).collect(),
        });
    }

    match extract_candidate_text(&reply.body) {
        Some(text) => AttemptOutcome::Success(RawGenerationResult { text }),
        None => AttemptOutcome::Retryable(GenerationError::EmptyCandidates),
    }
}

fn extract_candidate_text(body: &str) -> Option<String> {
    let envelope: GeminiResponse = serde_json::from_str(body).ok()?;
    envelope
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .find_map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
}

pub struct GenerativeClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: GenerativeTransport> GenerativeClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One outbound call, classified. Never retries on its own.
    pub async fn attempt(&self, payload: &PromptPayload) -> AttemptOutcome<RawGenerationResult> {
        debug!("Sending generation request ({} chars)", payload.text.len());
        classify_reply(self.transport.send(payload).await)
    }

    /// Raw text of the first usable candidate, retrying per the policy.
    pub async fn generate(
        &self,
        payload: &PromptPayload,
    ) -> Result<RetrySuccess<RawGenerationResult>, RetryFailure> {
        let result = run_with_retry(&self.policy, |_| self.attempt(payload)).await;
        if let Ok(success) = &result {
            info!("Generation succeeded after {} attempt(s)", success.attempts);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16, body: &str) -> Result<TransportReply, TransportError> {
        Ok(TransportReply {
            status,
            body: body.to_string(),
        })
    }

    #[test]
    fn test_backoff_is_linear_and_skipped_after_last_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_rate_limit_is_terminal() {
        assert!(matches!(
            classify_reply(reply(429, "{}")),
            AttemptOutcome::Terminal(GenerationError::QuotaExhausted { status: 429 })
        ));
        assert!(matches!(
            classify_reply(reply(403, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#)),
            AttemptOutcome::Terminal(GenerationError::QuotaExhausted { .. })
        ));
    }

    #[test]
    fn test_service_unavailable_and_other_statuses_are_retryable() {
        assert!(matches!(
            classify_reply(reply(503, "")),
            AttemptOutcome::Retryable(GenerationError::TransientService { status: 503 })
        ));
        assert!(matches!(
            classify_reply(reply(400, "bad request")),
            AttemptOutcome::Retryable(GenerationError::UnexpectedStatus { status: 400, .. })
        ));
        assert!(matches!(
            classify_reply(Err(TransportError::Network("reset".to_string()))),
            AttemptOutcome::Retryable(GenerationError::Transport(_))
        ));
    }

    #[test]
    fn test_missing_api_key_is_terminal() {
        assert!(matches!(
            classify_reply(Err(TransportError::NotConfigured("no key".to_string()))),
            AttemptOutcome::Terminal(GenerationError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_empty_candidates_are_a_failure() {
        assert!(matches!(
            classify_reply(reply(200, r#"{"candidates": []}"#)),
            AttemptOutcome::Retryable(GenerationError::EmptyCandidates)
        ));
        assert!(matches!(
            classify_reply(reply(200, "not json")),
            AttemptOutcome::Retryable(GenerationError::EmptyCandidates)
        ));
    }

    #[test]
    fn test_first_candidate_text_is_returned() {
        let body = r#"{"candidates": [
            {"content": {"parts": [{"text": "{\"a\": 1}"}]}},
            {"content": {"parts": [{"text": "ignored"}]}}
        ]}"#;
        match classify_reply(reply(200, body)) {
            AttemptOutcome::Success(raw) => assert_eq!(raw.text, "{\"a\": 1}"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retry_loop_stops_on_terminal() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut calls = 0;
        let result: Result<RetrySuccess<()>, _> = run_with_retry(&policy, |_| {
            calls += 1;
            async { AttemptOutcome::Terminal(GenerationError::QuotaExhausted { status: 429 }) }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_loop_recovers_after_transient_failure() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result = run_with_retry(&policy, |attempt| async move {
            if attempt < 2 {
                AttemptOutcome::Retryable(GenerationError::TransientService { status: 503 })
            } else {
                AttemptOutcome::Success(attempt)
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, 2);
        assert_eq!(result.attempts, 2);
    }
}
