//! Exponential backoff for provider calls.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry, doubled on every further retry.
    #[serde(with = "crate::serde_millis")]
    pub base_delay: Duration,
    #[serde(with = "crate::serde_millis")]
    pub max_delay: Duration,
    /// Add up to 50% random delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    pub result: Result<T, ProviderError>,
    /// 1 when the first attempt settled it.
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T> RetryResult<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, ProviderError> {
        self.result
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of retries. The closure receives the 0-based attempt number.
pub async fn execute_with_retry<T, F, Fut>(config: &RetryConfig, mut operation: F) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let start = Instant::now();
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                }
            }
            Err(error) if error.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying provider call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return RetryResult {
                    result: Err(error),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                }
            }
        }
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
    let delay = exponential.min(config.max_delay.as_millis() as u64);
    if config.jitter {
        Duration::from_millis(delay + fastrand::u64(0..=delay / 2))
    } else {
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> RetryConfig {
        RetryConfig::default()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[tokio::test]
    async fn retry_succeeds_eventually() {
        let mut calls = 0;
        let result = execute_with_retry(&quick(), |_| {
            calls += 1;
            let ok = calls >= 3;
            async move {
                if ok {
                    Ok("done")
                } else {
                    Err(ProviderError::Transport("reset".into()))
                }
            }
        })
        .await;
        assert!(result.succeeded());
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let result: RetryResult<()> = execute_with_retry(&quick(), |_| async {
            Err(ProviderError::MissingCredential("KEY".into()))
        })
        .await;
        assert_eq!(result.attempts, 1);
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let config = quick().with_max_retries(2);
        let result: RetryResult<()> = execute_with_retry(&config, |_| async {
            Err(ProviderError::Status {
                status: 503,
                body: String::new(),
            })
        })
        .await;
        assert_eq!(result.attempts, 3);
    }

    #[test]
    fn delay_is_capped() {
        let config = quick().with_max_delay(Duration::from_millis(5));
        assert_eq!(calculate_delay(&config, 10), Duration::from_millis(5));
    }
}
