// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Circuit breaker for backend resilience
//!
//! Counts consecutive calls that failed after their retries were exhausted.
//! Once the threshold is hit the circuit opens and calls fail fast until the
//! cooldown has elapsed; the next call is then let through as a probe.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{OctoError, Result};
use crate::network::errors::NetworkError;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests allowed
    Closed,
    /// Too many failures, requests blocked
    Open,
    /// Cooldown elapsed, a probe request is allowed
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Circuit breaker shared by every call of one backend client
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    /// Milliseconds since the epoch of the most recent failure
    last_failure_ms: AtomicU64,
    max_failures: u32,
    cooldown: Duration,
}

impl Default for CircuitBreaker {
    /// 5 failures, one minute cooldown
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, cooldown: Duration) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            max_failures: max_failures.max(1),
            cooldown,
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        if self.failure_count.load(Ordering::Acquire) < self.max_failures {
            return CircuitState::Closed;
        }

        let last_failure = self.last_failure_ms.load(Ordering::Acquire);
        let elapsed = now_ms().saturating_sub(last_failure);
        if elapsed >= self.cooldown.as_millis() as u64 {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Check if a request should be allowed
    pub fn allow_request(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Fail fast with a service-unavailable error while the circuit is open.
    pub fn guard(&self, label: &str) -> Result<()> {
        if self.allow_request() {
            return Ok(());
        }
        tracing::debug!(target: "octopus.retry", label, "circuit open, rejecting call");
        Err(OctoError::Network(NetworkError::from_status(
            503,
            "Circuit breaker is open",
        )))
    }

    pub fn record_success(&self) {
        if self.failure_count.swap(0, Ordering::AcqRel) >= self.max_failures {
            tracing::info!(target: "octopus.retry", "circuit closed");
        }
        self.last_failure_ms.store(0, Ordering::Release);
    }

    pub fn record_failure(&self) {
        self.last_failure_ms.store(now_ms(), Ordering::Release);
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;

        if failures == self.max_failures {
            tracing::warn!(
                target: "octopus.retry",
                failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    /// Record the final outcome of a call. Only transient failures count
    /// against the circuit; a 4xx says nothing about backend health.
    pub fn record<T>(&self, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.record_success(),
            Err(err) if err.is_retryable() => self.record_failure(),
            Err(_) => {}
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.last_failure_ms.store(0, Ordering::Release);
    }
}
