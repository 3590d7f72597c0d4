//! HTTP client for OpenAI-compatible chat completions
//!
//! Requests always stream. A 429 before the stream starts is retried with
//! exponential backoff; once fragments are flowing, any failure ends the
//! reply with an error. `timeout_secs` bounds connecting and each read, so a
//! long reply that keeps producing fragments is never cut off.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client as HttpClient, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::streaming::{SseDecoder, StreamEvent};
use super::types::RequestBody;
use super::{CompletionRequest, CompletionSource, FragmentStream};

/// Attempts made for a rate-limited request, including the first
const RATE_LIMIT_ATTEMPTS: u32 = 3;

/// First backoff step, doubled on every retry
const BACKOFF_STEP_MS: u64 = 1000;

/// Wait assumed when a 429 response gives no hint
const DEFAULT_RETRY_AFTER_SECS: u64 = 20;

/// Streaming chat completions over HTTP
#[derive(Clone)]
pub struct LlmClient {
    http: HttpClient,
    config: LlmConfig,
    api_key: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("endpoint", &self.endpoint())
            .field("timeout_secs", &self.config.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Build a client for the endpoint in `config`, authenticating with `api_key`
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::ConfigError("API key is empty".to_string()));
        }

        let limit = Duration::from_secs(config.timeout_secs);
        let http = HttpClient::builder()
            .connect_timeout(limit)
            .read_timeout(limit)
            .build()?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// Full URL of the chat completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Send `request`, retrying while rate limited, and return the open response
    async fn open(&self, request: &CompletionRequest) -> Result<Response> {
        let body = RequestBody::streaming(request, &self.config);
        let endpoint = self.endpoint();

        let mut attempt = 1;
        loop {
            debug!(
                model = %body.model,
                messages = body.messages.len(),
                attempt,
                "Requesting streamed completion"
            );

            let response = self
                .http
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let text = response.text().await.unwrap_or_default();
            match status_error(status, &text) {
                Error::RateLimited(hint) if attempt < RATE_LIMIT_ATTEMPTS => {
                    let wait = backoff_delay(attempt, hint);
                    warn!(attempt, wait_ms = %wait.as_millis(), "Rate limited, backing off");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                err => return Err(err),
            }
        }
    }
}

#[async_trait]
impl CompletionSource for LlmClient {
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream> {
        let response = self.open(&request).await?;

        let deltas = async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(read) = bytes.next().await {
                let chunk = match read {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(Error::NetworkError(e));
                        return;
                    }
                };

                for event in decoder.feed(&chunk) {
                    match event {
                        Ok(StreamEvent::Delta { delta, finish }) => {
                            if let Some(reason) = finish {
                                debug!(finish_reason = %reason, "Model finished");
                            }
                            yield Ok(delta);
                        }
                        Ok(StreamEvent::Done) => return,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            match decoder.flush() {
                Some(Ok(StreamEvent::Delta { delta, .. })) => yield Ok(delta),
                Some(Err(e)) => yield Err(e),
                Some(Ok(StreamEvent::Done)) | None => {}
            }
        };

        Ok(Box::pin(deltas))
    }
}

/// Map a non-success response to an error
fn status_error(status: StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 => Error::LLMError(
            "Unauthorized: the API key was rejected. Check LYSS_API_KEY or OPENAI_API_KEY.".to_string(),
        ),
        429 => Error::RateLimited(retry_after(body).unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
        400 => Error::LLMError(format!("Request rejected: {}", body)),
        403 => Error::LLMError(format!("Access denied: {}", body)),
        404 => Error::LLMError(format!("Unknown model or endpoint: {}", body)),
        500..=599 => Error::LLMError(format!("Provider error ({}): {}", status, body)),
        _ => Error::LLMError(format!("Unexpected status {}: {}", status, body)),
    }
}

/// Seconds to wait suggested by a 429 body, top-level or under `error`
fn retry_after(body: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.pointer("/error/retry_after"))
        .and_then(serde_json::Value::as_u64)
}

/// Delay before retry number `attempt`: the larger of the doubling step and
/// the server hint, plus up to 10% jitter
fn backoff_delay(attempt: u32, hint_secs: u64) -> Duration {
    let step = BACKOFF_STEP_MS << (attempt.saturating_sub(1)).min(16);
    let base = step.max(hint_secs.saturating_mul(1000));
    let spread = (base / 10).max(1);
    let jitter = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()) % spread)
        .unwrap_or(0);
    Duration::from_millis(base + jitter)
}
