// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Network resilience: error classification, retries and the circuit breaker

pub mod circuit_breaker;
pub mod errors;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use errors::{classify, NetworkError, NetworkErrorKind, TransportCode};
pub use retry::{default_retry_predicate, execute_http, with_retry, RetryConfig};
