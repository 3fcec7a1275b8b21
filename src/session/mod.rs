// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation session state
//!
//! Tracks the identity of the current backend session together with the
//! running token totals, per-tool approvals and how many messages were sent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::api::TokenUsage;

/// Tools that never need an approval prompt.
pub const PRE_APPROVED_TOOLS: &[&str] = &["search", "read_file"];

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// State of one conversation with the backend
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub session_id: String,
    pub token_usage: TokenUsage,
    pub tool_approvals: HashMap<String, bool>,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Start a fresh session with a generated id and the safe tools pre-approved.
    pub fn new() -> Self {
        Self::with_id(generate_session_id())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        let tool_approvals = PRE_APPROVED_TOOLS
            .iter()
            .map(|tool| (tool.to_string(), true))
            .collect();

        Self {
            session_id: session_id.into(),
            token_usage: TokenUsage::default(),
            tool_approvals,
            message_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Add a usage report to the running totals.
    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.token_usage.accumulate(usage);
    }

    pub fn set_tool_approval(&mut self, tool: impl Into<String>, approved: bool) {
        self.tool_approvals.insert(tool.into(), approved);
    }

    /// `None` when the user was never asked about this tool.
    pub fn tool_approval(&self, tool: &str) -> Option<bool> {
        self.tool_approvals.get(tool).copied()
    }

    pub fn is_first_message(&self) -> bool {
        self.message_count == 0
    }

    pub fn increment_message_count(&mut self) {
        self.message_count += 1;
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

/// `session-<unix millis>-<9 random base36 chars>`
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("session-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Owns the current session and replaces it on reset
#[derive(Debug, Default)]
pub struct SessionManager {
    current: ConversationSession,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a conversation the backend already knows. Project context
    /// is not sent again.
    pub fn resume(session_id: impl Into<String>) -> Self {
        let mut current = ConversationSession::with_id(session_id);
        current.increment_message_count();
        Self { current }
    }

    pub fn current(&self) -> &ConversationSession {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut ConversationSession {
        &mut self.current
    }

    pub fn session_id(&self) -> &str {
        &self.current.session_id
    }

    /// Discard the current session and start a new one.
    pub fn reset(&mut self) -> &ConversationSession {
        self.current = ConversationSession::new();
        tracing::debug!(session_id = %self.current.session_id, "session reset");
        &self.current
    }

    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.current.record_usage(usage);
    }
}
