// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Default model management and request preparation

use std::path::{Path, PathBuf};

use crate::api::catalog::ModelCatalogClient;
use crate::api::transport::ConversationRequest;
use crate::api::types::{ModelInfo, ModelSelection};
use crate::config::Settings;
use crate::error::{OctoError, Result};
use crate::tools::ToolDescriptor;

/// Project notes prepended to the first message of a session
pub const PROJECT_CONTEXT_FILE: &str = "octopus.md";
/// System prompt override read from the working directory
pub const SYSTEM_PROMPT_FILE: &str = "9octopus.system.md";

/// Where the effective model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Explicit,
    Default,
    None,
}

/// Outcome of checking a model against the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ModelValidation {
    pub valid: bool,
    pub info: Option<ModelInfo>,
    pub error: Option<String>,
}

/// Owns the configured default model and turns user input into
/// [`ConversationRequest`]s.
pub struct ModelManager {
    settings: Settings,
    settings_path: PathBuf,
    catalog: ModelCatalogClient,
}

impl ModelManager {
    pub fn new(settings: Settings, settings_path: PathBuf, catalog: ModelCatalogClient) -> Self {
        Self {
            settings,
            settings_path,
            catalog,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn default_model(&self) -> Option<ModelSelection> {
        self.settings
            .defaults
            .model_selection()
            .map(|(provider, model)| ModelSelection::new(provider, model))
    }

    pub fn has_default_model(&self) -> bool {
        self.default_model().is_some()
    }

    /// Explicit selection, else the configured default.
    pub fn effective_model(&self, explicit: Option<ModelSelection>) -> Option<ModelSelection> {
        explicit.or_else(|| self.default_model())
    }

    pub fn model_source(&self, explicit: Option<&ModelSelection>) -> ModelSource {
        if explicit.is_some() {
            ModelSource::Explicit
        } else if self.has_default_model() {
            ModelSource::Default
        } else {
            ModelSource::None
        }
    }

    /// Check a model with the backend. An unreachable backend counts as
    /// valid so the client keeps working offline.
    pub async fn validate_model(&self, provider: &str, model: &str) -> ModelValidation {
        match self.catalog.validate_model(provider, model).await {
            Ok(response) if response.status == "success" && response.data.valid == Some(true) => {
                let details = response.data.model_info.unwrap_or_default();
                ModelValidation {
                    valid: true,
                    info: Some(ModelInfo {
                        provider: provider.to_string(),
                        model_name: model.to_string(),
                        display_name: non_empty_or(details.display_name, model),
                        context_length: details.context_length,
                        supports_tools: details.supports_tools,
                    }),
                    error: None,
                }
            }
            Ok(_) => ModelValidation {
                valid: false,
                info: None,
                error: Some(format!("Invalid model: {}/{}", provider, model)),
            },
            Err(error) => {
                tracing::warn!(
                    target: "octopus.catalog",
                    provider,
                    model,
                    error = %error,
                    "model validation failed, assuming valid"
                );
                ModelValidation {
                    valid: true,
                    info: Some(offline_info(provider, model)),
                    error: None,
                }
            }
        }
    }

    /// Persist a new default model, optionally checking it first.
    pub async fn set_default_model(
        &mut self,
        provider: &str,
        model: &str,
        validate: bool,
    ) -> Result<ModelInfo> {
        let info = if validate {
            let validation = self.validate_model(provider, model).await;
            if !validation.valid {
                return Err(OctoError::InvalidInput(validation.error.unwrap_or_else(|| {
                    format!("Failed to validate {}/{}", provider, model)
                })));
            }
            validation
                .info
                .unwrap_or_else(|| offline_info(provider, model))
        } else {
            offline_info(provider, model)
        };

        // Start from the file so environment overrides are not written back
        let mut stored = Settings::load_from(&self.settings_path)?;
        stored.defaults.provider = Some(provider.to_string());
        stored.defaults.model = Some(model.to_string());
        stored.save_to(&self.settings_path)?;

        self.settings.defaults.provider = Some(provider.to_string());
        self.settings.defaults.model = Some(model.to_string());
        tracing::info!(provider, model, "default model updated");
        Ok(info)
    }

    pub fn clear_default_model(&mut self) -> Result<()> {
        Settings::clear_default_model_at(&self.settings_path)?;
        self.settings.defaults.provider = None;
        self.settings.defaults.model = None;
        Ok(())
    }

    /// Build the request for a user message. Project context is only
    /// attached when `include_context` is set, normally on the first message.
    pub fn prepare_request(
        &self,
        session_id: &str,
        message: &str,
        explicit: Option<ModelSelection>,
        include_context: bool,
        tools: Vec<ToolDescriptor>,
        working_directory: &Path,
    ) -> ConversationRequest {
        let mut request = ConversationRequest::new(session_id, message);
        if let Some(model) = self.effective_model(explicit) {
            request = request.with_model(model);
        }
        if include_context {
            if let Some(context) = load_project_context(working_directory) {
                request = request.with_context(context);
            }
        }
        if let Some(prompt) = load_system_prompt(working_directory) {
            request = request.with_system_prompt(prompt);
        }
        if !tools.is_empty() {
            request = request.with_tools(tools);
        }
        request
    }
}

/// `provider/display name`, falling back to the model name.
pub fn format_model(info: &ModelInfo) -> String {
    let name = if info.display_name.is_empty() {
        &info.model_name
    } else {
        &info.display_name
    };
    format!("{}/{}", info.provider, name)
}

/// Contents of `octopus.md` in `dir`, framed as project context.
pub fn load_project_context(dir: &Path) -> Option<String> {
    let content = read_optional(&dir.join(PROJECT_CONTEXT_FILE))?;
    Some(format!(
        "# Project Context (from {})\n\n{}\n\n---\n\n",
        PROJECT_CONTEXT_FILE, content
    ))
}

pub fn load_system_prompt(dir: &Path) -> Option<String> {
    read_optional(&dir.join(SYSTEM_PROMPT_FILE))
}

fn read_optional(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "failed to read project file");
            None
        }
    }
}

fn offline_info(provider: &str, model: &str) -> ModelInfo {
    ModelInfo {
        provider: provider.to_string(),
        model_name: model.to_string(),
        display_name: model.to_string(),
        context_length: 0,
        supports_tools: false,
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
