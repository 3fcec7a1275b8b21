// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for Octopus
//!
//! The backend decides when a tool runs; this module executes the request
//! locally once the user has approved it and shapes the result that is sent
//! back on the conversation stream.

pub mod builtin;
pub mod definition;
pub mod permission;

pub use definition::*;
pub use permission::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// A tool call decoded from the conversation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Set by the approval step; always false when decoded
    #[serde(default)]
    pub approved: bool,
}

impl ToolExecutionRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            approved: false,
        }
    }

    /// String argument by key
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// Result of tool execution, submitted back to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub ok: bool,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(request: &ToolExecutionRequest, result: Value) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            ok: true,
            result,
            error: None,
        }
    }

    /// Create an error result
    pub fn failure(request: &ToolExecutionRequest, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            ok: false,
            result: serde_json::json!({ "approved": true, "error": error }),
            error: Some(error),
        }
    }

    /// The answer sent when the user declines a tool call
    pub fn denied(request: &ToolExecutionRequest) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            ok: false,
            result: serde_json::json!({ "approved": false }),
            error: Some(format!("User denied {}", display_name(&request.name))),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.ok
    }
}

/// User-facing name of a tool, used in status lines
pub fn display_name(tool_name: &str) -> &str {
    match tool_name {
        "shell" => "shell command",
        "read-file" | "write-file" => "file",
        "search" => "search",
        other => other,
    }
}

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Relative paths resolve against this directory
    pub working_directory: PathBuf,
    pub session_id: String,
}

impl ToolContext {
    pub fn new(working_directory: PathBuf, session_id: impl Into<String>) -> Self {
        Self {
            working_directory,
            session_id: session_id.into(),
        }
    }

    /// Resolve a tool path argument
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.working_directory.join(candidate)
        }
    }
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the descriptor advertised to the backend
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool. An `Err` becomes a failed [`ToolResult`].
    async fn execute(&self, request: &ToolExecutionRequest, context: &ToolContext) -> Result<Value>;

    /// Whether this tool may run without asking
    fn is_safe(&self) -> bool {
        false
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::ReadFileTool));
        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Descriptors for every registered tool, sorted by name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// List all tool names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run an approved request. Never fails: unknown tools and execution
    /// errors are reported inside the returned result.
    pub async fn execute(&self, request: &ToolExecutionRequest, context: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(&request.name) else {
            tracing::warn!(tool = %request.name, "tool call for unknown tool");
            return ToolResult::failure(request, format!("Unknown tool: {}", request.name));
        };

        match tool.execute(request, context).await {
            Ok(value) => ToolResult::success(request, value),
            Err(e) => {
                tracing::debug!(tool = %request.name, error = %e, "tool execution failed");
                ToolResult::failure(request, e.to_string())
            }
        }
    }
}
