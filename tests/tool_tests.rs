// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::Cursor;

use serde_json::{json, Map};
use tempfile::TempDir;

use octopus::session::ConversationSession;
use octopus::tools::permission::ApprovalGate;
use octopus::tools::{ToolContext, ToolExecutionRequest, ToolRegistry, ToolResult};

fn read_request(path: &str) -> ToolExecutionRequest {
    let mut args = Map::new();
    args.insert("path".to_string(), json!(path));
    ToolExecutionRequest::new("call-1", "read_file", args)
}

#[test]
fn test_tool_result_wire_shape() {
    let request = read_request("a.txt");
    let ok = ToolResult::success(&request, json!({"content": "hi"}));
    let wire = serde_json::to_value(&ok).unwrap();
    assert_eq!(wire["id"], "call-1");
    assert_eq!(wire["ok"], true);
    assert!(wire.get("error").is_none());

    let failed = ToolResult::failure(&request, "boom");
    assert!(failed.is_error());
    assert_eq!(serde_json::to_value(&failed).unwrap()["error"], "boom");
}

#[test]
fn test_denied_result() {
    let request = ToolExecutionRequest::new("t9", "shell", Map::new());
    let denied = ToolResult::denied(&request);
    assert!(!denied.ok);
    assert_eq!(denied.result, json!({"approved": false}));
    assert_eq!(denied.error.as_deref(), Some("User denied shell command"));
}

#[test]
fn test_registry_builtins() {
    let registry = ToolRegistry::with_builtins();
    assert_eq!(registry.names(), vec!["read_file"]);
    let descriptors = registry.descriptors();
    assert_eq!(descriptors[0].name, "read_file");
    assert_eq!(descriptors[0].parameters["required"], json!(["path"]));
}

#[tokio::test]
async fn test_read_file_through_registry() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "one\ntwo\nthree\n").unwrap();

    let registry = ToolRegistry::with_builtins();
    let context = ToolContext::new(dir.path().to_path_buf(), "session-1");
    let mut request = read_request("notes.txt");
    request.args.insert("offset".to_string(), json!(2));

    let result = registry.execute(&request, &context).await;
    assert!(result.ok, "unexpected failure: {:?}", result.error);
    assert_eq!(result.result["content"], "two\nthree");
    assert_eq!(result.result["start_line"], 2);
    assert_eq!(result.result["total_lines"], 3);
}

#[tokio::test]
async fn test_missing_file_is_failure_result() {
    let dir = TempDir::new().unwrap();
    let registry = ToolRegistry::with_builtins();
    let context = ToolContext::new(dir.path().to_path_buf(), "session-1");

    let result = registry.execute(&read_request("absent.txt"), &context).await;
    assert!(result.is_error());
    assert!(result.error.unwrap().contains("Not a file"));
}

#[tokio::test]
async fn test_unknown_tool_is_failure_result() {
    let dir = TempDir::new().unwrap();
    let registry = ToolRegistry::with_builtins();
    let context = ToolContext::new(dir.path().to_path_buf(), "session-1");
    let request = ToolExecutionRequest::new("t1", "launch_rockets", Map::new());

    let result = registry.execute(&request, &context).await;
    assert_eq!(result.error.as_deref(), Some("Unknown tool: launch_rockets"));
}

#[test]
fn test_read_file_is_pre_approved() {
    let mut session = ConversationSession::new();
    let mut request = read_request("notes.txt");
    let mut output = Vec::new();

    let approved = ApprovalGate::new()
        .review_with(&mut session, &mut request, &mut Cursor::new(Vec::new()), &mut output)
        .unwrap();
    assert!(approved);
    assert!(request.approved);
    assert!(output.is_empty());
}
