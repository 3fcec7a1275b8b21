// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shared HTTP plumbing for the backend API

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::auth::AuthProvider;
use crate::config::Settings;
use crate::error::{OctoError, Result};
use crate::network::retry::{execute_http, RetryConfig};
use crate::network::{CircuitBreaker, NetworkError};

/// Shown when the backend rejects our credentials.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed. Please run: /login";

/// Connection to the backend shared by the conversation transport and the
/// model catalog.
pub struct BackendClient {
    http: Client,
    base_url: String,
    auth_enabled: bool,
    auth: Arc<dyn AuthProvider>,
    retry: RetryConfig,
    request_timeout: Duration,
    breaker: CircuitBreaker,
}

impl BackendClient {
    /// Build a client from settings.
    pub fn new(settings: &Settings, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(settings.connection_timeout())
            .build()
            .map_err(|e| OctoError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            auth_enabled: settings.api.auth_enabled,
            auth,
            retry: RetryConfig::from(&settings.network),
            request_timeout: settings.request_timeout(),
            breaker: CircuitBreaker::new(
                settings.network.circuit_failure_threshold,
                settings.circuit_cooldown(),
            ),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path below the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth_enabled
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Retry settings every call starts from
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Fail before any I/O when auth is on and there is no session.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        if self.auth_enabled && !self.auth.is_authenticated().await {
            return Err(OctoError::AuthenticationRequired);
        }
        Ok(())
    }

    /// JSON content type plus the bearer token when auth is enabled.
    pub async fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if self.auth_enabled {
            let token = self
                .auth
                .access_token()
                .await
                .ok_or(OctoError::AuthenticationRequired)?;
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| OctoError::Config("access token is not a valid header value".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Send through the retry policy and the circuit breaker.
    ///
    /// Transport failures come back as [`OctoError::Network`]; non-success
    /// responses other than 408/5xx are returned for the caller to map.
    pub async fn send<F>(&self, label: &str, retry: &RetryConfig, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        self.breaker.guard(label)?;
        let outcome = execute_http(build, retry, label).await;
        self.breaker.record(&outcome);
        outcome
    }

    /// GET a JSON document with the default retry policy.
    pub async fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        let mut headers = self.auth_headers().await?;
        headers.remove(CONTENT_TYPE);

        let response = self
            .send(operation, &self.retry, || {
                self.http
                    .get(&url)
                    .headers(headers.clone())
                    .timeout(self.request_timeout)
            })
            .await
            .map_err(|e| wrap_error(operation, e))?;

        read_json(operation, response).await
    }

    /// POST a JSON body and decode the JSON answer with the default retry policy.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = self.endpoint(path);
        let headers = self.auth_headers().await?;

        let response = self
            .send(operation, &self.retry, || {
                self.http
                    .post(&url)
                    .headers(headers.clone())
                    .json(body)
                    .timeout(self.request_timeout)
            })
            .await
            .map_err(|e| wrap_error(operation, e))?;

        read_json(operation, response).await
    }
}

async fn read_json<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(operation, status));
    }
    response.json::<T>().await.map_err(|e| {
        let source = NetworkError::from(e);
        OctoError::request_with_message(
            operation,
            format!("unexpected response: {}", source.message),
            source,
        )
    })
}

/// Attach the operation name to a network failure; other errors pass through.
pub(crate) fn wrap_error(operation: &str, error: OctoError) -> OctoError {
    match error {
        OctoError::Network(source) => OctoError::request(operation, source),
        other => other,
    }
}

/// Error for a non-success status that the retry loop handed back.
pub(crate) fn status_error(operation: &str, status: StatusCode) -> OctoError {
    let source = NetworkError::from_status_code(status);
    match status {
        StatusCode::UNAUTHORIZED => {
            OctoError::request_with_message(operation, AUTH_FAILED_MESSAGE, source)
        }
        _ => OctoError::request(operation, source),
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("auth_enabled", &self.auth_enabled)
            .field("retry", &self.retry)
            .field("circuit", &self.breaker.state())
            .finish_non_exhaustive()
    }
}
