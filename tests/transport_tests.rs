// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use octopus::api::{
    BackendClient, ChannelObserver, ConversationRequest, ConversationTransport, ModelSelection,
    StatusPhase, TokenUsage, TransportEvent, UpdateKind,
};
use octopus::auth::{AuthProvider, NoAuth, StaticTokenAuth};
use octopus::config::Settings;
use octopus::network::NetworkErrorKind;
use octopus::tools::{ToolExecutionRequest, ToolResult};
use octopus::OctoError;

const STREAM_PATH: &str = "/api/conversations/s1/stream";

fn test_settings(base: &str, auth_enabled: bool) -> Settings {
    let mut settings = Settings::default();
    settings.api.base_url = format!("{}/api", base);
    settings.api.auth_enabled = auth_enabled;
    settings.network.retry_max_attempts = 3;
    settings.network.retry_base_delay_ms = 1;
    settings.network.retry_max_delay_ms = 5;
    settings.network.retry_jitter_percent = 0;
    settings
}

fn transport_with(
    settings: &Settings,
    auth: Arc<dyn AuthProvider>,
) -> (Arc<ConversationTransport>, UnboundedReceiver<TransportEvent>) {
    let client = Arc::new(BackendClient::new(settings, auth).unwrap());
    let (observer, rx) = ChannelObserver::new();
    (
        Arc::new(ConversationTransport::new(client, Arc::new(observer))),
        rx,
    )
}

fn transport(base: &str) -> (Arc<ConversationTransport>, UnboundedReceiver<TransportEvent>) {
    transport_with(
        &test_settings(base, true),
        Arc::new(StaticTokenAuth::new("test-token")),
    )
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

fn drain(rx: &mut UnboundedReceiver<TransportEvent>) -> Vec<TransportEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn status(is_working: bool, message: &str, phase: StatusPhase) -> TransportEvent {
    TransportEvent::Status {
        is_working,
        message: message.to_string(),
        phase,
    }
}

fn thinking() -> TransportEvent {
    status(true, "Processing request...", StatusPhase::Thinking)
}

fn idle() -> TransportEvent {
    status(false, "", StatusPhase::Idle)
}

#[tokio::test]
async fn test_assistant_message_then_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("accept", "text/event-stream"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(sse(
            "event: assistant.message\ndata: {\"content\":\"hello\"}\n\nevent: done\ndata: {}\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            thinking(),
            TransportEvent::Update {
                action: "Response".to_string(),
                details: "hello".to_string(),
                kind: UpdateKind::Text,
            },
            idle(),
        ]
    );
    assert!(!transport.is_streaming());
}

#[tokio::test]
async fn test_usage_is_reported_before_idle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(
            "event: assistant.message\ndata: {\"content\":\"\",\"token_usage\":{\"input_tokens\":3,\"total_tokens\":5}}\n\n",
        ))
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], thinking());
    match &events[1] {
        TransportEvent::TokenUsage(usage) => {
            assert_eq!(usage.input_tokens, 3);
            assert_eq!(usage.total_tokens, 5);
        }
        other => panic!("expected usage, got {:?}", other),
    }
    assert_eq!(events[2], idle());
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    let err = transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Failed to start conversation: Authentication failed. Please run: /login"
    );
    assert_eq!(err.status_code(), Some(401));
    assert!(!err.is_retryable());
    assert_eq!(drain(&mut rx), vec![thinking(), idle()]);
}

#[tokio::test]
async fn test_service_unavailable_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse("event: done\ndata: {}\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(drain(&mut rx), vec![thinking(), idle()]);
}

#[tokio::test]
async fn test_retries_exhausted_surface_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    let err = transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(503));
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("Failed to start conversation: "));
    assert_eq!(drain(&mut rx), vec![thinking(), idle()]);
}

#[tokio::test]
async fn test_payment_and_subscription_errors() {
    for (code, expected) in [
        (
            402,
            "Usage limit reached. Please upgrade your plan or wait until the limit resets.",
        ),
        (
            403,
            "No active subscription found. Please subscribe to continue using the service.",
        ),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(code))
            .expect(1)
            .mount(&server)
            .await;

        let (transport, _rx) = transport(&server.uri());
        let err = transport
            .start(ConversationRequest::new("s1", "hi"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to start conversation: {}", expected)
        );
        assert_eq!(err.status_code(), Some(code));
    }
}

#[tokio::test]
async fn test_tool_call_then_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(concat!(
            "event: tool_call\n",
            "data: {\"id\":\"t1\",\"name\":\"shell\",\"args\":{\"command\":\"ls\"}}\n\n",
            "event: done\ndata: {}\n\n",
        )))
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    transport
        .start(ConversationRequest::new("s1", "list files"))
        .await
        .unwrap();

    let mut args = Map::new();
    args.insert("command".to_string(), json!("ls"));
    assert_eq!(
        drain(&mut rx),
        vec![
            thinking(),
            status(true, "Running shell command...", StatusPhase::Tool),
            TransportEvent::ToolRequest(ToolExecutionRequest::new("t1", "shell", args)),
            idle(),
        ]
    );
}

#[tokio::test]
async fn test_error_event_fails_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(
            "event: error\ndata: {\"error\":\"model overloaded\"}\n\nevent: done\ndata: {}\n\n",
        ))
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    let err = transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to start conversation: model overloaded");
    assert_eq!(err.kind(), NetworkErrorKind::Unknown);
    assert!(err.status_code().is_none());
    assert_eq!(drain(&mut rx), vec![thinking(), idle()]);
}

#[tokio::test]
async fn test_error_event_without_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse("event: error\ndata: {}\n\n"))
        .mount(&server)
        .await;

    let (transport, _rx) = transport(&server.uri());
    let err = transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to start conversation: Server error");
}

#[tokio::test]
async fn test_malformed_and_unknown_events_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(concat!(
            "event: heartbeat\ndata: {}\n\n",
            "event: tool_call\ndata: {\"name\":\"shell\"}\n\n",
            "event: assistant.message\ndata: {\"content\":\"still here\"}\n\n",
        )))
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[1], TransportEvent::Update { details, .. } if details == "still here"));
}

#[tokio::test]
async fn test_start_body_carries_model_and_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({
            "type": "message",
            "content": "hi",
            "model_type": "anthropic",
            "model_version": "claude",
            "context": "project notes",
        })))
        .respond_with(sse("event: done\ndata: {}\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, _rx) = transport(&server.uri());
    transport.set_default_model(Some(ModelSelection::new("anthropic", "claude")));
    transport
        .start(ConversationRequest::new("s1", "hi").with_context("project notes"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_continue_submits_tool_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({"type": "message"})))
        .respond_with(sse(
            "event: tool_call\ndata: {\"id\":\"t1\",\"name\":\"shell\",\"args\":{}}\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_partial_json(json!({
            "type": "tool_result",
            "tool_result": {"id": "t1", "name": "shell", "ok": false, "result": {"approved": false}},
            "model_type": "openai",
            "model_version": "gpt-3.5-turbo",
        })))
        .respond_with(sse(
            "event: assistant.message\ndata: {\"content\":\"ok, skipping\"}\n\nevent: done\ndata: {}\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    transport
        .start(ConversationRequest::new("s1", "run it"))
        .await
        .unwrap();

    let request = drain(&mut rx)
        .into_iter()
        .find_map(|event| match event {
            TransportEvent::ToolRequest(request) => Some(request),
            _ => None,
        })
        .expect("tool request");
    assert!(!request.approved);

    transport
        .continue_with_tool_result(ToolResult::denied(&request), None)
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&thinking()));
    assert_eq!(events.last(), Some(&idle()));
}

#[tokio::test]
async fn test_authentication_required_before_io() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (transport, mut rx) = transport_with(&test_settings(&server.uri(), true), Arc::new(NoAuth));
    let err = transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, OctoError::AuthenticationRequired));
    assert_eq!(drain(&mut rx), vec![idle()]);
}

#[tokio::test]
async fn test_authentication_required_on_continue() {
    let server = MockServer::start().await;
    let (transport, mut rx) = transport_with(&test_settings(&server.uri(), true), Arc::new(NoAuth));
    let request = ToolExecutionRequest::new("t1", "shell", Map::new());

    let err = transport
        .continue_with_tool_result(ToolResult::denied(&request), None)
        .await
        .unwrap_err();

    assert!(matches!(err, OctoError::AuthenticationRequired));
    assert_eq!(drain(&mut rx), vec![idle()]);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_usage_keeps_assistant_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse(concat!(
            "event: assistant.message\ndata: {\"content\":\"hello\",\"token_usage\":{\"input_tokens\":3.0,\"total_tokens\":5}}\n\n",
            "event: tool_call\ndata: {\"id\":\"t2\",\"name\":\"search\",\"token_usage\":\"lots\"}\n\n",
            "event: done\ndata: {}\n\n",
        )))
        .mount(&server)
        .await;

    let (transport, mut rx) = transport(&server.uri());
    transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            thinking(),
            TransportEvent::Update {
                action: "Response".to_string(),
                details: "hello".to_string(),
                kind: UpdateKind::Text,
            },
            TransportEvent::TokenUsage(TokenUsage {
                input_tokens: 3,
                total_tokens: 5,
                ..TokenUsage::default()
            }),
            idle(),
            status(true, "Running search...", StatusPhase::Tool),
            TransportEvent::ToolRequest(ToolExecutionRequest::new("t2", "search", Map::new())),
            idle(),
        ]
    );
}

#[tokio::test]
async fn test_auth_disabled_sends_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(sse("event: done\ndata: {}\n\n"))
        .mount(&server)
        .await;

    let (transport, _rx) = transport_with(&test_settings(&server.uri(), false), Arc::new(NoAuth));
    transport
        .start(ConversationRequest::new("s1", "hi"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_conversation_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s1",
            "status": {"waiting_for_tools": true},
            "token_usage": {"total_tokens": 42},
            "waiting_tools": [],
            "timestamp": "2025-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let (transport, _rx) = transport(&server.uri());
    let status = transport.conversation_status("s1").await.unwrap();
    assert_eq!(status.session_id, "s1");
    assert!(status.status.waiting_for_tools);
    assert_eq!(status.token_usage.total_tokens, 42);
}

#[tokio::test]
async fn test_conversation_status_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations/s1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, _rx) = transport(&server.uri());
    let err = transport.conversation_status("s1").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to get conversation status: Authentication failed. Please run: /login"
    );
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let (transport, mut rx) = transport("http://127.0.0.1:9");
    transport.cancel();
    transport.cancel();
    transport.shutdown();
    transport.cancel();
    assert!(!transport.is_streaming());
    assert!(drain(&mut rx).is_empty());
}

/// Serves one SSE response that sends a single event and then stalls.
async fn stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 16 * 1024];
        let _ = socket.read(&mut buf).await;

        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n";
        let event = "event: assistant.message\ndata: {\"content\":\"partial\"}\n\n";
        let chunk = format!("{:x}\r\n{}\r\n", event.len(), event);
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(chunk.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_cancel_mid_stream_ends_turn_quietly() {
    let base = stalling_server().await;
    let (transport, mut rx) = transport(&base);

    let turn = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.start(ConversationRequest::new("s1", "hi")).await })
    };

    // Wait until the first event has been dispatched
    let first_update = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            if let TransportEvent::Update { details, .. } = event {
                return details;
            }
        }
        String::new()
    })
    .await
    .unwrap();
    assert_eq!(first_update, "partial");
    assert!(transport.is_streaming());

    transport.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), turn)
        .await
        .expect("turn should end after cancel")
        .unwrap();
    assert!(outcome.is_ok());
    assert!(!transport.is_streaming());

    transport.cancel();
}
