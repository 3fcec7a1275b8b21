// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Octopus
//!
//! Handles loading and saving settings from ~/.octopus/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod migration;
mod validation;

pub use validation::ENV_ACCESS_TOKEN;

/// Main settings structure, stored in ~/.octopus/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Backend API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry, timeout and circuit breaker settings
    #[serde(default)]
    pub network: NetworkSettings,

    /// Default model selection
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the backend, including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// When false no credentials are required or sent
    #[serde(default = "default_true")]
    pub auth_enabled: bool,

    /// Access token (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Network resilience configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSettings {
    /// Total attempts per call, including the first
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Jitter percentage (0 to 100) for randomizing delays
    #[serde(default = "default_retry_jitter_percent")]
    pub retry_jitter_percent: u8,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Whole-request timeout for non-streaming calls, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Circuit breaker: consecutive failed calls before opening
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,

    /// Circuit breaker: seconds before a probe call is allowed
    #[serde(default = "default_circuit_cooldown_secs")]
    pub circuit_cooldown_secs: u64,
}

/// Default model used when a call does not name one
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_enabled: true,
            access_token: None,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_jitter_percent: default_retry_jitter_percent(),
            connection_timeout_ms: default_connection_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_cooldown_secs: default_circuit_cooldown_secs(),
        }
    }
}

impl DefaultsConfig {
    /// Both halves of the default model, when both are configured.
    pub fn model_selection(&self) -> Option<(String, String)> {
        match (&self.provider, &self.model) {
            (Some(provider), Some(model)) if !provider.is_empty() && !model.is_empty() => {
                Some((provider.clone(), model.clone()))
            }
            _ => None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    10000
}

fn default_retry_jitter_percent() -> u8 {
    25
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_request_timeout_ms() -> u64 {
    60000
}

fn default_circuit_failure_threshold() -> u32 {
    5
}

fn default_circuit_cooldown_secs() -> u64 {
    60
}
