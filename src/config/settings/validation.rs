// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{OctoError, Result};

use super::Settings;

/// Environment variable holding the backend access token.
pub const ENV_ACCESS_TOKEN: &str = "OCTOPUS_ACCESS_TOKEN";

fn parse_override<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %trimmed, "ignoring unparseable environment override");
            None
        }
    }
}

impl Settings {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    /// Priority: override > config file. Empty or unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = parse_override::<String>("OCTOPUS_API_URL", lookup("OCTOPUS_API_URL")) {
            self.api.base_url = url;
        }
        if let Some(flag) = parse_override::<String>("AUTH_ENABLED", lookup("AUTH_ENABLED")) {
            self.api.auth_enabled = flag != "false";
        }

        let network = &mut self.network;
        if let Some(v) = parse_override("NETWORK_RETRY_MAX_ATTEMPTS", lookup("NETWORK_RETRY_MAX_ATTEMPTS")) {
            network.retry_max_attempts = v;
        }
        if let Some(v) = parse_override("NETWORK_RETRY_BASE_DELAY", lookup("NETWORK_RETRY_BASE_DELAY")) {
            network.retry_base_delay_ms = v;
        }
        if let Some(v) = parse_override("NETWORK_RETRY_MAX_DELAY", lookup("NETWORK_RETRY_MAX_DELAY")) {
            network.retry_max_delay_ms = v;
        }
        if let Some(v) = parse_override("NETWORK_RETRY_JITTER_PERCENT", lookup("NETWORK_RETRY_JITTER_PERCENT")) {
            network.retry_jitter_percent = v;
        }
        if let Some(v) = parse_override("NETWORK_CONNECTION_TIMEOUT", lookup("NETWORK_CONNECTION_TIMEOUT")) {
            network.connection_timeout_ms = v;
        }
        if let Some(v) = parse_override("NETWORK_REQUEST_TIMEOUT", lookup("NETWORK_REQUEST_TIMEOUT")) {
            network.request_timeout_ms = v;
        }

        if let Some(provider) = parse_override("DEFAULT_PROVIDER", lookup("DEFAULT_PROVIDER")) {
            self.defaults.provider = Some(provider);
        }
        if let Some(model) = parse_override("DEFAULT_MODEL", lookup("DEFAULT_MODEL")) {
            self.defaults.model = Some(model);
        }
    }

    /// Check that the settings describe a usable client.
    pub fn validate(&self) -> Result<()> {
        let network = &self.network;
        if network.retry_max_attempts == 0 {
            return Err(OctoError::Config(
                "network.retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if network.retry_jitter_percent > 100 {
            return Err(OctoError::Config(
                "network.retry_jitter_percent must be between 0 and 100".to_string(),
            ));
        }
        if network.retry_max_delay_ms < network.retry_base_delay_ms {
            return Err(OctoError::Config(format!(
                "network.retry_max_delay_ms ({}) is smaller than retry_base_delay_ms ({})",
                network.retry_max_delay_ms, network.retry_base_delay_ms
            )));
        }
        reqwest::Url::parse(&self.api.base_url).map_err(|e| {
            OctoError::Config(format!("invalid api.base_url '{}': {}", self.api.base_url, e))
        })?;
        Ok(())
    }

    /// Get the access token, checking the environment first.
    pub fn access_token(&self) -> Option<String> {
        self.access_token_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn access_token_from<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Priority: env var > config file.
        lookup(ENV_ACCESS_TOKEN)
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.api.access_token.clone())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.network.connection_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }

    pub fn circuit_cooldown(&self) -> Duration {
        Duration::from_secs(self.network.circuit_cooldown_secs)
    }
}
