// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::migration;
use super::Settings;

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::octopus_home().join("settings.json")
    }

    /// Load settings from `path`, apply environment overrides and validate
    /// the result.
    pub fn load_effective(path: &Path) -> Result<Self> {
        let mut settings = Self::load_from(path)?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let raw_value: serde_json::Value = serde_json::from_str(&content)?;
        let migrated = migration::migrate_on_load(raw_value);
        let settings: Settings = serde_json::from_value(migrated)?;
        Ok(settings)
    }

    /// Save settings to a specific path, merging with existing file content
    /// to preserve unknown keys from hand edits.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let new_value = serde_json::to_value(self)?;

        let merged = if path.exists() {
            let existing_content = std::fs::read_to_string(path)?;
            match serde_json::from_str::<serde_json::Value>(&existing_content) {
                Ok(existing_value) => {
                    migration::deep_merge(migration::migrate_on_load(existing_value), new_value)
                }
                Err(_) => new_value, // Corrupt file, overwrite entirely.
            }
        } else {
            new_value
        };

        let content = serde_json::to_string_pretty(&merged)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Drop the default model from a settings file, keeping every other key.
    pub fn clear_default_model_at(path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let mut value = migration::migrate_on_load(serde_json::from_str(&content)?);
        if let Some(serde_json::Value::Object(defaults)) = value.get_mut("defaults") {
            defaults.remove("provider");
            defaults.remove("model");
        }

        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }

    /// Get the octopus home directory (~/.octopus or $OCTOPUS_HOME).
    pub fn octopus_home() -> PathBuf {
        if let Ok(home) = std::env::var("OCTOPUS_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".octopus")
    }
}
