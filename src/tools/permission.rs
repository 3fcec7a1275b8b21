// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Approval prompt for tool calls
//!
//! Every tool call the backend requests is shown to the user before it runs,
//! unless the session already holds an approval for that tool.

use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::QueueableCommand;
use std::io::{self, BufRead, Write};

use crate::session::ConversationSession;
use crate::tools::{display_name, ToolExecutionRequest};

/// Response to an approval prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResponse {
    /// Run this call only
    Allow,
    /// Do not run this call
    Deny,
    /// Run this call and every later call of the same tool in this session
    AllowAll,
}

impl ApprovalResponse {
    pub fn is_approved(self) -> bool {
        !matches!(self, ApprovalResponse::Deny)
    }

    fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => ApprovalResponse::Allow,
            "a" | "all" | "always" => ApprovalResponse::AllowAll,
            _ => ApprovalResponse::Deny,
        }
    }
}

/// Decides whether a tool call runs, asking the user when needed
#[derive(Debug, Default, Clone, Copy)]
pub struct ApprovalGate {
    /// Approve everything without asking
    trust_mode: bool,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trust_mode() -> Self {
        Self { trust_mode: true }
    }

    /// Whether the user must be asked about this request
    pub fn needs_approval(&self, session: &ConversationSession, request: &ToolExecutionRequest) -> bool {
        !self.trust_mode && session.tool_approval(&request.name) != Some(true)
    }

    /// Ask on the terminal if needed and mark the request approved or not.
    pub fn review(
        &self,
        session: &mut ConversationSession,
        request: &mut ToolExecutionRequest,
    ) -> io::Result<bool> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.review_with(session, request, &mut input, &mut io::stdout())
    }

    /// Same as [`ApprovalGate::review`] over arbitrary streams.
    pub fn review_with<R: BufRead, W: Write>(
        &self,
        session: &mut ConversationSession,
        request: &mut ToolExecutionRequest,
        input: &mut R,
        output: &mut W,
    ) -> io::Result<bool> {
        if !self.needs_approval(session, request) {
            request.approved = true;
            return Ok(true);
        }

        let response = prompt(request, input, output)?;
        if response == ApprovalResponse::AllowAll {
            session.set_tool_approval(request.name.clone(), true);
        }
        request.approved = response.is_approved();
        tracing::debug!(tool = %request.name, ?response, "tool approval");
        Ok(request.approved)
    }
}

fn prompt<R: BufRead, W: Write>(
    request: &ToolExecutionRequest,
    input: &mut R,
    output: &mut W,
) -> io::Result<ApprovalResponse> {
    writeln!(output)?;
    output.queue(SetForegroundColor(Color::Yellow))?;
    write!(output, "⚠ ")?;
    output.queue(ResetColor)?;
    writeln!(output, "The assistant wants to run {}:", display_name(&request.name))?;

    if request.args.is_empty() {
        writeln!(output, "  (no arguments)")?;
    }
    for (key, value) in &request.args {
        let rendered = match value.as_str() {
            Some(text) => text.to_string(),
            None => value.to_string(),
        };
        writeln!(output, "  {}: {}", key, rendered)?;
    }

    writeln!(output)?;
    write!(output, "Allow? [y]es / [n]o / [a]lways for this tool: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    writeln!(output)?;
    Ok(ApprovalResponse::parse(&line))
}
