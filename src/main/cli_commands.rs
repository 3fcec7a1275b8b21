// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use octopus::api::{format_model, ConversationTransport, ModelsResponse, NoopObserver};
use octopus::cli::{AskArgs, ModelsCommands};
use octopus::config::Settings;
use octopus::error::{OctoError, Result};

use crate::chat_runtime::{build_client, ChatRuntime};

/// Run a single question, answering tool calls like chat does.
pub(super) async fn run_ask(
    args: AskArgs,
    settings: Settings,
    settings_path: PathBuf,
    working_directory: PathBuf,
    verbose: u8,
) -> Result<()> {
    let mut prompt = args.prompt.clone().unwrap_or_default();
    if args.stdin {
        let mut piped = String::new();
        io::stdin().read_to_string(&mut piped)?;
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(piped.trim_end());
    }
    if prompt.trim().is_empty() {
        return Err(OctoError::InvalidInput(
            "No prompt given. Pass one as an argument or use --stdin.".to_string(),
        ));
    }

    let mut context = String::new();
    for file in &args.file {
        let content = std::fs::read_to_string(file)?;
        context.push_str(&format!("--- {} ---\n{}\n\n", file.display(), content));
    }

    let mut runtime = ChatRuntime::new(
        settings,
        settings_path,
        working_directory,
        args.model.selection(),
        args.trust,
        verbose,
    )?;
    if verbose > 0 {
        eprintln!("[verbose] Asking {}", runtime.active_model());
    }

    let extra = (!context.is_empty()).then_some(context);
    runtime.send_message(&prompt, extra).await
}

pub(super) async fn run_models_command(
    command: ModelsCommands,
    runtime: &mut ChatRuntime,
) -> Result<()> {
    match command {
        ModelsCommands::List { provider } => {
            let response = match provider {
                Some(provider) => runtime.catalog.models_by_provider(&provider).await?,
                None => runtime.catalog.list_models().await?,
            };
            print_catalog(&response);
        }
        ModelsCommands::Show { provider, model } => {
            let response = runtime.catalog.model(&provider, &model).await?;
            match response.data.model {
                Some(details) => {
                    println!("{}/{}", provider, model);
                    println!("  Name:        {}", details.display_name);
                    println!("  Context:     {} tokens", details.context_length);
                    println!("  Max output:  {} tokens", details.max_output_tokens);
                    println!(
                        "  Cost / 1k:   ${} in, ${} out",
                        details.input_cost_per_1k, details.output_cost_per_1k
                    );
                    println!("  Tools:       {}", yes_no(details.supports_tools));
                    if !details.description.is_empty() {
                        println!("  {}", details.description);
                    }
                }
                None => println!("{}", non_empty(&response.message, "Model not found")),
            }
        }
        ModelsCommands::Validate { provider, model } => {
            let response = runtime.catalog.validate_model(&provider, &model).await?;
            if response.data.valid == Some(true) {
                println!("✓ {}/{} is available", provider, model);
            } else {
                println!(
                    "✗ {}/{}: {}",
                    provider,
                    model,
                    non_empty(&response.message, "not available")
                );
            }
        }
        ModelsCommands::Pricing => {
            let response = runtime.catalog.pricing_comparison().await?;
            let entries = response.data.pricing_comparison.unwrap_or_default();
            if entries.is_empty() {
                println!("No pricing data available.");
            }
            for entry in entries {
                println!(
                    "{:<12} {:<32} ${:>8.4} in  ${:>8.4} out  {:>8} ctx",
                    entry.provider,
                    entry.model_name,
                    entry.input_cost_per_1k,
                    entry.output_cost_per_1k,
                    entry.context_length
                );
            }
        }
        ModelsCommands::Current => match runtime.models.default_model() {
            Some(model) => println!("Default model: {}", model),
            None => println!(
                "No default model set. Falling back to {}.",
                runtime.active_model()
            ),
        },
        ModelsCommands::Set {
            provider,
            model,
            no_validate,
        } => {
            let info = runtime
                .models
                .set_default_model(&provider, &model, !no_validate)
                .await?;
            println!("Default model set to {}", format_model(&info));
        }
        ModelsCommands::Clear => {
            runtime.models.clear_default_model()?;
            println!("Default model cleared.");
        }
    }
    Ok(())
}

pub(super) async fn run_status(settings: &Settings, session_id: &str) -> Result<()> {
    let transport = ConversationTransport::new(build_client(settings)?, Arc::new(NoopObserver));
    let status = transport.conversation_status(session_id).await?;

    println!("Session: {}", status.session_id);
    println!("Waiting for tools: {}", yes_no(status.status.waiting_for_tools));
    if let Some(model) = &status.model_info {
        println!("Model: {}", format_model(model));
    }
    println!("Total tokens: {}", status.token_usage.total_tokens);
    println!("Cost: ${:.4}", status.token_usage.estimated_cost_usd);
    if !status.timestamp.is_empty() {
        println!("Updated: {}", status.timestamp);
    }
    Ok(())
}

fn print_catalog(response: &ModelsResponse) {
    if let Some(providers) = &response.data.providers {
        for (key, provider) in providers {
            println!("{} ({})", non_empty(&provider.provider_name, key), key);
            for (name, details) in &provider.models {
                let marker = if provider.default_model.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(" {} {:<32} {:>8} ctx", marker, name, details.context_length);
            }
        }
    } else if let Some(models) = &response.data.models {
        let provider = response.data.provider.as_deref().unwrap_or("");
        println!("{}", provider);
        for (name, details) in models {
            println!("   {:<32} {:>8} ctx", name, details.context_length);
        }
    } else {
        println!("{}", non_empty(&response.message, "No models available."));
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn non_empty<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.is_empty() {
        fallback
    } else {
        text
    }
}
