//! HTTP retry helper with exponential backoff
//!
//! Transient failures (connection errors, timeouts, 429, 5xx) are retried
//! here, inside the transport. Agents and the orchestrator never retry.

use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

use crate::core::{Config, Result, TroupeError};

/// Upper bound for a single backoff delay
const MAX_BACKOFF_MS: u64 = 30_000;

/// Retry settings for one provider
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.provider.max_retries,
            base_delay: Duration::from_millis(config.provider.retry_base_delay_ms),
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based): doubles each time,
    /// capped, plus up to 25% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exp = base
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(16))
            .min(MAX_BACKOFF_MS);
        let jitter = if exp >= 4 {
            rand::rng().random_range(0..=exp / 4)
        } else {
            0
        };
        Duration::from_millis(exp + jitter)
    }

    /// Status codes worth another attempt
    pub fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Send a request, retrying transient failures.
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is consumed
    /// by `send`. Non-success responses come back as `TroupeError::Api`.
    pub async fn send<F>(&self, provider: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            let outcome = build().send().await;

            let error = match outcome {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(TroupeError::api(format!(
                            "{} authentication failed ({}): {}",
                            provider, status, body
                        )));
                    }

                    let error = TroupeError::api(format!(
                        "{} API error ({}): {}",
                        provider, status, body
                    ));
                    if !Self::is_retryable_status(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_connect() || e.is_timeout() => TroupeError::api(format!(
                    "Cannot reach {} API: {}",
                    provider, e
                )),
                Err(e) => return Err(TroupeError::from(e)),
            };

            if attempt >= self.max_retries {
                return Err(error);
            }
            attempt += 1;

            let delay = self.delay_for(attempt);
            tracing::warn!(
                provider,
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient API failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
