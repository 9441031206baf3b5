//! One model call with retry, exponential backoff and a per-attempt timeout.
//!
//! HTTP 429 / 503 responses are frequent under load, so every collaborator
//! goes through [`chat_with_retry`]. The wait before attempt `n` is
//! `retry_backoff_ms * 2^(n-1)`.

use crate::config::PipelineConfig;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Sampling and retry settings shared by every call of one collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallPolicy {
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub api_timeout_secs: u64,
}

impl CallPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Same policy with a smaller token budget, for short answers.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms * 2u64.pow(attempt.saturating_sub(1)))
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// A successful model answer.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
}

/// Every attempt failed.
#[derive(Debug, Error)]
#[error("{label}: model call failed after {attempts} attempt(s): {detail}")]
pub struct LlmCallError {
    pub label: String,
    pub attempts: u32,
    pub detail: String,
}

/// Send `messages` to `provider`, retrying failures and timeouts.
///
/// `label` only shows up in logs and in the final error.
pub async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    policy: &CallPolicy,
    label: &str,
) -> Result<LlmReply, LlmCallError> {
    let options = policy.options();
    let budget = Duration::from_secs(policy.api_timeout_secs);
    let start = Instant::now();
    let mut last_err = String::from("no attempt made");

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        match timeout(budget, provider.chat(messages, Some(&options))).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(LlmReply {
                    content: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    retries: attempt,
                });
            }
            Ok(Err(e)) => {
                last_err = e.to_string();
                warn!("{}: attempt {} failed: {}", label, attempt + 1, last_err);
            }
            Err(_) => {
                last_err = format!("timed out after {}s", policy.api_timeout_secs);
                warn!("{}: attempt {} {}", label, attempt + 1, last_err);
            }
        }
    }

    Err(LlmCallError {
        label: label.to_string(),
        attempts: policy.max_retries + 1,
        detail: last_err,
    })
}
