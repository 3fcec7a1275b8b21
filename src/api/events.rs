// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Typed conversation events decoded from the SSE stream

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::api::types::TokenUsage;
use crate::error::{OctoError, Result};
use crate::sse::{SseEvent, SsePayload};

/// One event of a conversation turn
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    /// Assistant text for the turn, possibly with usage
    AssistantMessage {
        content: Option<String>,
        token_usage: Option<TokenUsage>,
    },
    /// The model asks for a local tool to run
    ToolCall {
        id: String,
        name: String,
        args: Map<String, Value>,
        token_usage: Option<TokenUsage>,
    },
    /// End of the turn
    Done,
    /// Server-side failure of the turn
    Error { message: Option<String> },
    /// Event type this client does not handle
    Unknown { event_type: String },
}

#[derive(Deserialize)]
struct AssistantMessagePayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    token_usage: Option<Value>,
}

#[derive(Deserialize)]
struct ToolCallPayload {
    id: String,
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
    #[serde(default)]
    token_usage: Option<Value>,
}

fn decode<T: serde::de::DeserializeOwned>(event: &SseEvent) -> Result<T> {
    let value = event.json().ok_or_else(|| {
        OctoError::Protocol(format!("{} event carried non-JSON data", event.event_type))
    })?;
    T::deserialize(value)
        .map_err(|e| OctoError::Protocol(format!("malformed {} event: {}", event.event_type, e)))
}

/// Usage is decoded on its own so a bad block drops only the usage.
fn usage(event_type: &str, raw: Option<Value>) -> Option<TokenUsage> {
    match TokenUsage::deserialize(raw.filter(|v| !v.is_null())?) {
        Ok(usage) => Some(usage),
        Err(e) => {
            tracing::warn!(target: "octopus.transport", event_type, error = %e, "dropping malformed token usage");
            None
        }
    }
}

fn error_message(payload: &SsePayload) -> Option<String> {
    let message = match payload {
        SsePayload::Json(Value::Object(map)) => match map.get("error") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => None,
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            Some(other) => Some(other.to_string()),
        },
        SsePayload::Json(_) => None,
        SsePayload::Text(text) => Some(text.trim().to_string()),
    };
    message.filter(|m| !m.is_empty())
}

impl ConversationEvent {
    /// Decode an SSE event. A known event type with the wrong shape is a
    /// protocol error; the caller logs and drops it.
    pub fn from_sse(event: &SseEvent) -> Result<Self> {
        match event.event_type.as_str() {
            "assistant.message" => {
                let payload: AssistantMessagePayload = decode(event)?;
                Ok(ConversationEvent::AssistantMessage {
                    content: payload.content,
                    token_usage: usage(&event.event_type, payload.token_usage),
                })
            }
            "tool_call" => {
                let payload: ToolCallPayload = decode(event)?;
                Ok(ConversationEvent::ToolCall {
                    id: payload.id,
                    name: payload.name,
                    args: payload.args,
                    token_usage: usage(&event.event_type, payload.token_usage),
                })
            }
            "done" => Ok(ConversationEvent::Done),
            "error" => Ok(ConversationEvent::Error {
                message: error_message(&event.payload),
            }),
            other => Ok(ConversationEvent::Unknown {
                event_type: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::SseDecoder;
    use serde_json::json;

    fn decode_one(raw: &str) -> Result<ConversationEvent> {
        let events = SseDecoder::new().feed(raw.as_bytes());
        assert_eq!(events.len(), 1, "fixture must hold one block");
        ConversationEvent::from_sse(&events[0])
    }

    #[test]
    fn test_assistant_message() {
        let event = decode_one(
            "event: assistant.message\ndata: {\"content\":\"Hi\",\"token_usage\":{\"total_tokens\":7}}\n\n",
        )
        .unwrap();

        match event {
            ConversationEvent::AssistantMessage {
                content,
                token_usage,
            } => {
                assert_eq!(content.as_deref(), Some("Hi"));
                assert_eq!(token_usage.unwrap().total_tokens, 7);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_assistant_message_without_content() {
        let event = decode_one("event: assistant.message\ndata: {}\n\n").unwrap();
        assert_eq!(
            event,
            ConversationEvent::AssistantMessage {
                content: None,
                token_usage: None
            }
        );
    }

    #[test]
    fn test_tool_call() {
        let event = decode_one(
            "event: tool_call\ndata: {\"id\":\"t1\",\"name\":\"shell\",\"args\":{\"cmd\":\"ls\"}}\n\n",
        )
        .unwrap();

        match event {
            ConversationEvent::ToolCall { id, name, args, .. } => {
                assert_eq!(id, "t1");
                assert_eq!(name, "shell");
                assert_eq!(args.get("cmd"), Some(&json!("ls")));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_tool_call_missing_id_is_protocol_error() {
        let err = decode_one("event: tool_call\ndata: {\"name\":\"shell\"}\n\n").unwrap_err();
        assert!(matches!(err, OctoError::Protocol(_)));
    }

    #[test]
    fn test_assistant_message_with_text_payload_is_protocol_error() {
        let err = decode_one("event: assistant.message\ndata: hello\n\n").unwrap_err();
        assert!(matches!(err, OctoError::Protocol(_)));
    }

    #[test]
    fn test_done_ignores_payload() {
        assert_eq!(
            decode_one("event: done\ndata: whatever\n\n").unwrap(),
            ConversationEvent::Done
        );
    }

    #[test]
    fn test_error_messages() {
        let cases = [
            ("{\"error\":\"model overloaded\"}", Some("model overloaded")),
            ("{\"error\":{\"message\":\"nested\"}}", Some("nested")),
            ("{}", None),
            ("{\"error\":\"\"}", None),
            ("plain failure", Some("plain failure")),
        ];
        for (data, expected) in cases {
            let event = decode_one(&format!("event: error\ndata: {}\n\n", data)).unwrap();
            assert_eq!(
                event,
                ConversationEvent::Error {
                    message: expected.map(str::to_string)
                },
                "data: {}",
                data
            );
        }
    }

    #[test]
    fn test_unknown_event() {
        let event = decode_one("event: heartbeat\ndata: {}\n\n").unwrap();
        assert_eq!(
            event,
            ConversationEvent::Unknown {
                event_type: "heartbeat".to_string()
            }
        );
    }

    #[test]
    fn test_float_and_null_usage_counters() {
        let event = decode_one(
            "event: assistant.message\ndata: {\"content\":\"Hi\",\"token_usage\":{\"input_tokens\":3.0,\"output_tokens\":null,\"total_tokens\":5}}\n\n",
        )
        .unwrap();
        let ConversationEvent::AssistantMessage { content, token_usage } = event else {
            panic!("expected assistant message");
        };
        assert_eq!(content.as_deref(), Some("Hi"));
        let usage = token_usage.unwrap();
        assert_eq!(usage.input_tokens, 3);
        assert_eq!(usage.output_tokens, 0);
        assert_eq!(usage.total_tokens, 5);
    }

    #[test]
    fn test_bad_usage_keeps_tool_call() {
        let event = decode_one(
            "event: tool_call\ndata: {\"id\":\"t1\",\"name\":\"search\",\"token_usage\":\"lots\"}\n\n",
        )
        .unwrap();
        match event {
            ConversationEvent::ToolCall { id, token_usage, .. } => {
                assert_eq!(id, "t1");
                assert!(token_usage.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
