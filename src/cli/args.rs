// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::ModelSelection;

/// Octopus - chat with the Octopus backend from your terminal
#[derive(Parser, Debug)]
#[command(name = "octopus")]
#[command(version, about = "Chat with the Octopus backend from your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Working directory (defaults to current)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Browse and manage backend models
    Models(ModelsArgs),

    /// Show the backend's view of a conversation
    Status {
        /// Session id to look up
        session_id: String,
    },
}

/// Model override shared by chat and ask
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ModelArgs {
    /// Model to use (`model` or `provider/model`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Provider for --model
    #[arg(short, long)]
    pub provider: Option<String>,
}

impl ModelArgs {
    /// Explicit model selection, if the flags name one completely.
    pub fn selection(&self) -> Option<ModelSelection> {
        let model = self.model.as_deref()?.trim();
        match (&self.provider, model.split_once('/')) {
            (Some(provider), _) if !provider.is_empty() && !model.is_empty() => {
                Some(ModelSelection::new(provider.as_str(), model))
            }
            (_, Some((provider, name))) if !provider.is_empty() && !name.is_empty() => {
                Some(ModelSelection::new(provider, name))
            }
            _ => None,
        }
    }
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Initial prompt (optional)
    pub prompt: Option<String>,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Resume a previous session
    #[arg(long)]
    pub resume: Option<String>,

    /// Trust mode (auto-approve all tool uses)
    #[arg(long)]
    pub trust: bool,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: Option<String>,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Include file contents in context
    #[arg(short, long, num_args = 1..)]
    pub file: Vec<PathBuf>,

    /// Read prompt from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Trust mode (auto-approve all tool uses)
    #[arg(long)]
    pub trust: bool,
}

/// Arguments for models management
#[derive(clap::Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommands,
}

/// Models subcommands
#[derive(Subcommand, Debug)]
pub enum ModelsCommands {
    /// List available models
    List {
        /// Only this provider
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Show one model
    Show {
        provider: String,
        model: String,
    },

    /// Check a model with the backend
    Validate {
        provider: String,
        model: String,
    },

    /// Compare model pricing
    Pricing,

    /// Show the default model
    Current,

    /// Set the default model
    Set {
        provider: String,
        model: String,

        /// Skip the backend check
        #[arg(long)]
        no_validate: bool,
    },

    /// Clear the default model
    Clear,
}
