// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use octopus::api::{ModelSelection, TokenUsage};
use octopus::error::Result;
use octopus::tools::{display_name, ToolExecutionRequest, ToolResult};

const PREVIEW_WIDTH: usize = 80;

pub(super) fn print_welcome(model: &ModelSelection, trust_mode: bool, session_id: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("octopus v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Model: {}", model);
    println!("Session: {}", session_id);

    if trust_mode {
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        println!("⚠ Trust mode enabled - all tool actions auto-approved");
        stdout.execute(ResetColor)?;
    }
    println!("Type /help for commands, /exit to quit.");
    Ok(())
}

pub(super) fn print_help() {
    println!("Commands:");
    println!("  /help   Show this help");
    println!("  /clear  Start a new session");
    println!("  /usage  Show token usage for this session");
    println!("  /model  Show the active model");
    println!("  /exit   Quit");
}

pub(super) fn read_user_input() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

pub(super) fn print_response(text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\noctopus: ");
    stdout.execute(ResetColor)?;
    println!("{}", text);
    Ok(())
}

pub(super) fn print_status(message: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    println!("  … {}", message);
    stdout.execute(ResetColor)?;
    Ok(())
}

pub(super) fn print_denied(tool_name: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Red))?;
    println!("  ✗ {} denied", display_name(tool_name));
    stdout.execute(ResetColor)?;
    Ok(())
}

pub(super) fn print_tool_invocation(request: &ToolExecutionRequest) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    print!("  ╭─ ");
    stdout.execute(SetForegroundColor(Color::Magenta))?;
    print!("{}", request.name);
    stdout.execute(ResetColor)?;

    match request.arg_str("path") {
        Some(path) => {
            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            print!(" → ");
            stdout.execute(SetForegroundColor(Color::Blue))?;
            println!("{}", path);
            stdout.execute(ResetColor)?;
        }
        None => println!(),
    }
    Ok(())
}

pub(super) fn print_tool_result(result: &ToolResult) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    print!("  ╰─ ");

    if result.is_error() {
        stdout.execute(SetForegroundColor(Color::Red))?;
        println!("✗ {}", preview(result.error.as_deref().unwrap_or("failed")));
    } else {
        stdout.execute(SetForegroundColor(Color::Green))?;
        println!("✓ {}", summarize_result(result));
    }
    stdout.execute(ResetColor)?;
    Ok(())
}

pub(super) fn print_usage(usage: &TokenUsage) {
    println!("Input tokens:  {}", usage.input_tokens);
    println!("Output tokens: {}", usage.output_tokens);
    println!("Tool tokens:   {}", usage.tool_tokens);
    println!("Total tokens:  {}", usage.total_tokens);
    println!("API calls:     {}", usage.api_calls);
    println!("Cost:          ${:.4}", usage.estimated_cost_usd);
}

fn summarize_result(result: &ToolResult) -> String {
    match result.result.get("total_lines").and_then(|v| v.as_u64()) {
        Some(lines) => format!("{} lines", lines),
        None => preview(&result.result.to_string()),
    }
}

/// First line, cut to the preview width on a char boundary.
fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > PREVIEW_WIDTH {
        let cut: String = line.chars().take(PREVIEW_WIDTH - 3).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
