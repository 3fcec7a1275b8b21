// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model catalog endpoints

use std::sync::Arc;

use serde_json::json;

use crate::api::client::BackendClient;
use crate::api::types::ModelsResponse;
use crate::error::Result;

/// Read-only client for `{base}/models/*`.
#[derive(Debug, Clone)]
pub struct ModelCatalogClient {
    client: Arc<BackendClient>,
}

impl ModelCatalogClient {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }

    /// Every provider with its models
    pub async fn list_models(&self) -> Result<ModelsResponse> {
        self.get("get all models", "models").await
    }

    pub async fn models_by_provider(&self, provider: &str) -> Result<ModelsResponse> {
        self.get(
            &format!("get models for provider {}", provider),
            &format!("models/{}", provider),
        )
        .await
    }

    pub async fn model(&self, provider: &str, model: &str) -> Result<ModelsResponse> {
        self.get(
            &format!("get model {} from provider {}", model, provider),
            &format!("models/{}/{}", provider, model),
        )
        .await
    }

    /// Ask the backend whether a provider/model pair is usable.
    pub async fn validate_model(&self, provider: &str, model: &str) -> Result<ModelsResponse> {
        self.client.ensure_authenticated().await?;
        tracing::debug!(target: "octopus.catalog", provider, model, "validating model");
        let body = json!({
            "model_type": provider,
            "model_version": model,
        });
        self.client
            .post_json("validate model", "models/validate", &body)
            .await
    }

    /// Models ranked by cost
    pub async fn pricing_comparison(&self) -> Result<ModelsResponse> {
        self.get("get pricing comparison", "models/pricing").await
    }

    async fn get(&self, operation: &str, path: &str) -> Result<ModelsResponse> {
        self.client.ensure_authenticated().await?;
        tracing::debug!(target: "octopus.catalog", path, "catalog request");
        self.client.get_json(operation, path).await
    }
}
