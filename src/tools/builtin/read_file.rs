// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File read tool
//!
//! Reads contents of a file from the filesystem.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{OctoError, Result};
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolDescriptor, ToolExecutionRequest};

const DEFAULT_LIMIT: u64 = 2000;
const MAX_LINE_CHARS: usize = 500;

/// Tool for reading file contents
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "read_file".to_string(),
            description: "Read the contents of a text file. Returns the requested lines."
                .to_string(),
            parameters: SchemaBuilder::new()
                .string("path", "Path to the file (absolute or relative to the working directory)", true)
                .integer("offset", "Line number to start reading from (1-indexed, default: 1)", false)
                .integer("limit", "Maximum number of lines to read (default: 2000)", false)
                .build(),
        }
    }

    async fn execute(&self, request: &ToolExecutionRequest, context: &ToolContext) -> Result<Value> {
        let path_str = request
            .arg_str("path")
            .ok_or_else(|| OctoError::InvalidInput("path is required".to_string()))?;
        let offset = request.args.get("offset").and_then(Value::as_u64).unwrap_or(1) as usize;
        let limit = request
            .args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_LIMIT) as usize;

        let path = context.resolve(path_str);
        if !path.is_file() {
            return Err(OctoError::ToolExecution(format!(
                "Not a file: {}",
                path.display()
            )));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();
        let start = offset.saturating_sub(1).min(lines.len());
        let end = start.saturating_add(limit).min(lines.len());

        let selected: Vec<String> = lines[start..end]
            .iter()
            .map(|line| match line.char_indices().nth(MAX_LINE_CHARS) {
                Some((cut, _)) => format!("{}... (truncated)", &line[..cut]),
                None => line.to_string(),
            })
            .collect();

        Ok(json!({
            "approved": true,
            "path": path.display().to_string(),
            "content": selected.join("\n"),
            "start_line": start + 1,
            "end_line": end,
            "total_lines": lines.len(),
        }))
    }

    fn is_safe(&self) -> bool {
        true // Reading is generally safe
    }
}
