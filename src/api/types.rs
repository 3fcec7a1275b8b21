// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Wire types shared by the conversation and catalog endpoints

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token accounting reported by the backend. Missing or null fields read as
/// zero, and whole-valued floats are accepted as counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    #[serde(deserialize_with = "lenient_count")]
    pub input_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub output_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub tool_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub total_tokens: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub api_calls: u64,
    #[serde(deserialize_with = "lenient_cost")]
    pub estimated_cost_usd: f64,
}

impl TokenUsage {
    /// Add another report to these totals.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.tool_tokens = self.tool_tokens.saturating_add(other.tool_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.api_calls = self.api_calls.saturating_add(other.api_calls);
        self.estimated_cost_usd += other.estimated_cost_usd;
    }
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| de::Error::custom(format!("invalid token count: {}", n))),
        Some(other) => Err(de::Error::custom(format!("invalid token count: {}", other))),
    }
}

fn lenient_cost<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

/// Provider and model a turn runs against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
}

impl ModelSelection {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Used when neither the call nor the configuration names a model.
    pub fn fallback() -> Self {
        Self::new("openai", "gpt-3.5-turbo")
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// One model in the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDetails {
    pub name: String,
    pub display_name: String,
    pub context_length: u64,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    pub supports_tools: bool,
    pub supports_streaming: bool,
    pub max_output_tokens: u64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProvider {
    pub provider_name: String,
    pub models: BTreeMap<String, ModelDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_models: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingEntry {
    pub provider: String,
    pub model_name: String,
    pub display_name: String,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    pub context_length: u64,
    pub cost_effectiveness_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPricing {
    pub input_cost_per_1k_tokens: f64,
    pub output_cost_per_1k_tokens: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCapabilities {
    pub tools: bool,
    pub streaming: bool,
    pub max_context_tokens: u64,
    pub max_output_tokens: u64,
}

/// Payload of every catalog endpoint; which fields are set depends on the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsData {
    pub providers: Option<BTreeMap<String, ModelProvider>>,
    pub provider: Option<String>,
    pub provider_name: Option<String>,
    pub models: Option<BTreeMap<String, ModelDetails>>,
    pub model: Option<ModelDetails>,
    pub total_providers: Option<u64>,
    pub total_models: Option<u64>,
    pub default_model: Option<String>,
    pub pricing_comparison: Option<Vec<PricingEntry>>,
    pub valid: Option<bool>,
    pub model_type: Option<String>,
    pub model_version: Option<String>,
    pub model_info: Option<ModelDetails>,
    pub pricing: Option<ModelPricing>,
    pub capabilities: Option<ModelCapabilities>,
    pub currency: Option<String>,
    pub last_updated: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsResponse {
    pub status: String,
    pub data: ModelsData,
    pub message: String,
}

/// Model bound to a conversation on the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
    pub display_name: String,
    pub context_length: u64,
    pub supports_tools: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationFlags {
    pub waiting_for_tools: bool,
    pub websocket_connected: bool,
    pub has_token_data: bool,
}

/// Snapshot returned by `GET /conversations/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationStatus {
    pub session_id: String,
    pub status: ConversationFlags,
    pub token_usage: TokenUsage,
    pub model_info: Option<ModelInfo>,
    pub waiting_tools: Vec<Value>,
    pub timestamp: String,
}
