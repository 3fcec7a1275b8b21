// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry logic for backend calls with exponential backoff and jitter

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::time::sleep;

use crate::config::NetworkSettings;
use crate::error::{OctoError, Result};
use crate::network::errors::NetworkError;

/// Decides, per error, whether another attempt should be made.
pub type RetryPredicate = Arc<dyn Fn(&OctoError) -> bool + Send + Sync>;

/// Retry configuration
#[derive(Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on every further attempt
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Symmetric jitter applied to each delay, in percent (0 to 100)
    pub jitter_percent: u8,
    retry_predicate: RetryPredicate,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&NetworkSettings::default())
    }
}

impl From<&NetworkSettings> for RetryConfig {
    fn from(settings: &NetworkSettings) -> Self {
        Self::new(
            settings.retry_max_attempts,
            settings.retry_base_delay_ms,
            settings.retry_max_delay_ms,
            settings.retry_jitter_percent,
        )
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("jitter_percent", &self.jitter_percent)
            .finish_non_exhaustive()
    }
}

impl RetryConfig {
    /// Create a config using [`default_retry_predicate`].
    ///
    /// Out-of-range values are normalized: at least one attempt, a maximum
    /// delay no smaller than the base delay, and jitter capped at 100%.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_percent: u8) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_percent: jitter_percent.min(100),
            retry_predicate: Arc::new(default_retry_predicate),
        }
    }

    /// Replace the retry predicate for this call.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&OctoError) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Arc::new(predicate);
        self
    }

    /// Evaluate the retry predicate.
    pub fn should_retry(&self, error: &OctoError) -> bool {
        (self.retry_predicate)(error)
    }

    /// Backoff before jitter for a 1-based attempt number.
    fn capped_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(63);
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(self.max_delay_ms)
    }

    /// Closed interval, in milliseconds, that the delay after `attempt` falls in.
    pub fn delay_bounds(&self, attempt: u32) -> (u64, u64) {
        let capped = self.capped_delay_ms(attempt) as f64;
        let spread = capped * f64::from(self.jitter_percent) / 100.0;
        let lower = (capped - spread).max(0.0).floor() as u64;
        let upper = ((capped + spread).ceil() as u64).min(self.max_delay_ms);
        (lower, upper)
    }

    /// Calculate the delay to wait after a failed 1-based `attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay_ms(attempt);
        let spread = capped as f64 * f64::from(self.jitter_percent) / 100.0;
        if spread <= 0.0 {
            return Duration::from_millis(capped);
        }

        let jitter = rand::rng().random_range(-spread..=spread);
        let jittered = (capped as f64 + jitter)
            .max(0.0)
            .min(self.max_delay_ms as f64);
        Duration::from_millis(jittered.round() as u64)
    }
}

/// Default retry decision: the classifier says the failure is transient and
/// the server did not reject our credentials.
pub fn default_retry_predicate(error: &OctoError) -> bool {
    if matches!(error.status_code(), Some(401) | Some(403)) {
        return false;
    }
    error.is_retryable()
}

/// Responses that are turned into errors so the retry loop sees them.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status.is_server_error()
}

/// Retry an async operation with exponential backoff
///
/// # Arguments
/// * `operation` - The async operation to retry
/// * `config` - Retry configuration
/// * `label` - Name of the operation for logging
///
/// # Returns
/// Result of the first successful attempt, or the error of the last attempt
pub async fn with_retry<F, Fut, T>(mut operation: F, config: &RetryConfig, label: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        target: "octopus.retry",
                        label,
                        attempts = attempt,
                        "succeeded after retrying"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= max_attempts {
                    tracing::debug!(
                        target: "octopus.retry",
                        label,
                        attempts = attempt,
                        error = %error,
                        "giving up, attempts exhausted"
                    );
                    return Err(error);
                }

                if !config.should_retry(&error) {
                    tracing::debug!(
                        target: "octopus.retry",
                        label,
                        attempt,
                        error = %error,
                        "not retrying"
                    );
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    target: "octopus.retry",
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "{} attempt {} failed: {}. Retrying in {}ms...",
                    label,
                    attempt,
                    error,
                    delay.as_millis()
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Send an HTTP request through [`with_retry`].
///
/// `build` is called once per attempt. Responses with a retryable status
/// (408 or 5xx) are treated as failures so transport errors and server error
/// responses share one retry loop; every other response is returned as is.
pub async fn execute_http<F>(build: F, config: &RetryConfig, label: &str) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    with_retry(
        || {
            let request = build();
            async move {
                let response = request.send().await?;
                let status = response.status();
                if is_retryable_status(status) {
                    return Err(OctoError::Network(NetworkError::from_status_code(status)));
                }
                Ok(response)
            }
        },
        config,
        label,
    )
    .await
}
