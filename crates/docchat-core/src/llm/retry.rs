//! Exponential backoff retry for transient upstream failures

use crate::error::{DocChatError, Result, Stage};
use std::future::Future;
use std::time::Duration;

/// Retry policy: exponential backoff, transient errors only.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            factor: 2,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms * (self.factor as u64).pow(attempt))
    }
}

/// Execute an async operation, retrying transient failures with backoff.
///
/// Permanent errors return immediately. When attempts are exhausted the
/// last error is classified as `Upstream` tagged with `stage`.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, stage: Stage, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_transient() || attempt + 1 == policy.max_attempts {
                    return Err(classify(stage, e));
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    stage = %stage,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                last_err = Some(e);
            }
        }
    }
    Err(classify(
        stage,
        last_err.unwrap_or_else(|| DocChatError::upstream(stage, "retries exhausted")),
    ))
}

fn classify(stage: Stage, err: DocChatError) -> DocChatError {
    match err {
        DocChatError::Upstream { message, .. } => DocChatError::Upstream { stage, message },
        DocChatError::Http(e) => DocChatError::upstream(stage, e.to_string()),
        other => other,
    }
}
