//! Retry logic.
//!
//! # Responsibilities
//! - Decide which requests may be replayed (idempotent verbs only)
//! - Re-run a whole proxy call after a transport failure, with backoff
//!
//! # Design Decisions
//! - Only `BadGateway` is retried; 503/405/500 are answers, not glitches
//! - Each attempt is an independent call, so a new instance may be selected
//! - POST/PATCH are never retried

use std::future::Future;
use std::time::Duration;

use axum::http::Method;

use crate::config::{BackoffKind, RetryConfig};
use crate::proxy::error::GatewayError;
use crate::resilience::backoff::delay_for;

/// Verbs that can be replayed safely.
pub fn should_retry_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::PUT | Method::DELETE)
}

/// Only transport failures are worth another attempt.
pub fn is_retryable(err: &GatewayError) -> bool {
    matches!(err, GatewayError::BadGateway { .. })
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffKind,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.backoff,
            delay_ms: config.delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    fn delay(&self, retry: u32) -> Duration {
        delay_for(self.backoff, retry, self.delay_ms, self.max_delay_ms)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// `max_retries` retries have been spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries && is_retryable(&e) => {
                    retry += 1;
                    let delay = self.delay(retry);
                    tracing::info!(attempt = retry, delay = ?delay, error = %e, "Retrying request");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
