// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Octopus - chat with the Octopus backend from your terminal
//!
//! Entry point for the Octopus CLI application.

use std::path::PathBuf;

use clap::Parser;

use octopus::cli::{ChatArgs, Cli, Commands};
use octopus::config::Settings;
use octopus::error::Result;
use octopus::session::SessionManager;

#[path = "main/chat_runtime.rs"]
mod chat_runtime;
#[path = "main/chat_ui.rs"]
mod chat_ui;
#[path = "main/cli_commands.rs"]
mod cli_commands;

use chat_runtime::ChatRuntime;
use chat_ui::{print_help, print_usage, print_welcome, read_user_input};
use cli_commands::{run_ask, run_models_command, run_status};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on the client's own diagnostics; `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        for directive in [
            "octopus.transport=debug",
            "octopus.retry=debug",
            "octopus.catalog=debug",
            "octopus.sse=debug",
        ] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_effective(&settings_path)?;
    let working_directory = match cli.directory.clone() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let verbose = cli.verbose;
    match cli.command {
        None => {
            run_chat(ChatArgs::default(), settings, settings_path, working_directory, verbose).await?;
        }
        Some(Commands::Chat(args)) => {
            run_chat(args, settings, settings_path, working_directory, verbose).await?;
        }
        Some(Commands::Ask(args)) => {
            run_ask(args, settings, settings_path, working_directory, verbose).await?;
        }
        Some(Commands::Models(args)) => {
            let mut runtime =
                ChatRuntime::new(settings, settings_path, working_directory, None, false, verbose)?;
            run_models_command(args.command, &mut runtime).await?;
        }
        Some(Commands::Status { session_id }) => {
            run_status(&settings, &session_id).await?;
        }
    }

    Ok(())
}

/// Run interactive chat mode
async fn run_chat(
    args: ChatArgs,
    settings: Settings,
    settings_path: PathBuf,
    working_directory: PathBuf,
    verbose: u8,
) -> Result<()> {
    if verbose > 0 {
        eprintln!("[verbose] Octopus starting in chat mode");
        eprintln!("[verbose] Working directory: {}", working_directory.display());
        eprintln!("[verbose] Backend: {}", settings.api.base_url);
    }

    let mut runtime = ChatRuntime::new(
        settings,
        settings_path,
        working_directory,
        args.model.selection(),
        args.trust,
        verbose,
    )?;
    if let Some(session_id) = args.resume {
        runtime.sessions = SessionManager::resume(session_id);
    }

    print_welcome(&runtime.active_model(), args.trust, runtime.sessions.session_id())?;

    let mut pending = args.prompt;
    loop {
        let input = match pending.take() {
            Some(prompt) => prompt,
            None => match read_user_input()? {
                Some(line) => line,
                None => break,
            },
        };
        if input.is_empty() {
            continue;
        }

        match input.as_str() {
            "/exit" | "/quit" => break,
            "/help" => print_help(),
            "/clear" => {
                let session = runtime.sessions.reset();
                println!("Started new session {}", session.session_id);
            }
            "/usage" => print_usage(&runtime.sessions.current().token_usage),
            "/model" => println!("Model: {}", runtime.active_model()),
            message => {
                if let Err(error) = runtime.send_message(message, None).await {
                    eprintln!("Error: {}", error.user_message());
                }
            }
        }
    }

    runtime.transport.shutdown();
    Ok(())
}
