// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming conversation transport
//!
//! Opens `POST {base}/conversations/{id}/stream`, decodes the SSE body into
//! [`ConversationEvent`]s and reports them to a [`TransportObserver`]. At most
//! one stream is open per transport; every new call cancels the previous one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use futures::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::api::client::{status_error, wrap_error, BackendClient, AUTH_FAILED_MESSAGE};
use crate::api::events::ConversationEvent;
use crate::api::types::{ConversationStatus, ModelSelection, TokenUsage};
use crate::error::{OctoError, Result};
use crate::network::NetworkError;
use crate::sse::{decode_stream, SseEvent};
use crate::tools::{display_name, ToolDescriptor, ToolExecutionRequest, ToolResult};

pub const SUBSCRIPTION_REQUIRED_MESSAGE: &str =
    "No active subscription found. Please subscribe to continue using the service.";
pub const USAGE_LIMIT_MESSAGE: &str =
    "Usage limit reached. Please upgrade your plan or wait until the limit resets.";

const PROCESSING_MESSAGE: &str = "Processing request...";

/// Coarse phase of the current turn, for status lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    Thinking,
    Tool,
    Idle,
}

impl StatusPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusPhase::Thinking => "thinking",
            StatusPhase::Tool => "tool",
            StatusPhase::Idle => "idle",
        }
    }
}

/// Kind of content carried by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Text,
}

/// Receives everything a conversation turn produces.
///
/// Calls arrive in decode order on the task running the turn.
pub trait TransportObserver: Send + Sync {
    fn on_update(&self, _action: &str, _details: &str, _kind: UpdateKind) {}

    fn on_tool_request(&self, _request: ToolExecutionRequest) {}

    fn on_status(&self, _is_working: bool, _message: &str, _phase: StatusPhase) {}

    fn on_token_usage(&self, _usage: &TokenUsage) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl TransportObserver for NoopObserver {}

/// Observer callbacks as values, for draining from another task
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Update {
        action: String,
        details: String,
        kind: UpdateKind,
    },
    ToolRequest(ToolExecutionRequest),
    Status {
        is_working: bool,
        message: String,
        phase: StatusPhase,
    },
    TokenUsage(TokenUsage),
}

/// Forwards observer calls into an unbounded channel, preserving order.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: TransportEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl TransportObserver for ChannelObserver {
    fn on_update(&self, action: &str, details: &str, kind: UpdateKind) {
        self.forward(TransportEvent::Update {
            action: action.to_string(),
            details: details.to_string(),
            kind,
        });
    }

    fn on_tool_request(&self, request: ToolExecutionRequest) {
        self.forward(TransportEvent::ToolRequest(request));
    }

    fn on_status(&self, is_working: bool, message: &str, phase: StatusPhase) {
        self.forward(TransportEvent::Status {
            is_working,
            message: message.to_string(),
            phase,
        });
    }

    fn on_token_usage(&self, usage: &TokenUsage) {
        self.forward(TransportEvent::TokenUsage(usage.clone()));
    }
}

/// A user message that opens a turn
#[derive(Debug, Clone)]
pub struct ConversationRequest {
    pub session_id: String,
    pub message: String,
    pub context: Option<String>,
    pub model: Option<ModelSelection>,
    pub system_prompt: Option<String>,
    pub tools: Option<Vec<ToolDescriptor>>,
}

impl ConversationRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            context: None,
            model: None,
            system_prompt: None,
            tools: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_model(mut self, model: ModelSelection) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = Some(tools);
        self
    }

    fn body(&self, model: &ModelSelection) -> Value {
        let mut body = json!({
            "type": "message",
            "content": self.message,
            "model_type": model.provider,
            "model_version": model.model,
        });
        if let Some(context) = self.context.as_ref().filter(|c| !c.is_empty()) {
            body["context"] = json!(context);
        }
        if let Some(prompt) = &self.system_prompt {
            body["system_prompt"] = json!(prompt);
        }
        if let Some(tools) = &self.tools {
            body["tools"] = json!(tools);
        }
        body
    }
}

/// Stream retry decision: a rejected token is never retried.
pub fn transport_retry_predicate(error: &OctoError) -> bool {
    error.status_code() != Some(401) && error.is_retryable()
}

fn stream_status_error(operation: &str, status: StatusCode) -> OctoError {
    let source = NetworkError::from_status_code(status);
    let message = match status {
        StatusCode::UNAUTHORIZED => AUTH_FAILED_MESSAGE,
        StatusCode::PAYMENT_REQUIRED => USAGE_LIMIT_MESSAGE,
        StatusCode::FORBIDDEN => SUBSCRIPTION_REQUIRED_MESSAGE,
        _ => return status_error(operation, status),
    };
    OctoError::request_with_message(operation, message, source)
}

struct StreamSlot {
    generation: u64,
    handle: AbortHandle,
}

/// Edge-triggered working/idle state of one turn
struct TurnStatus {
    working: bool,
}

enum Flow {
    Continue,
    Done,
    Failed(OctoError),
}

enum StreamEnd {
    Finished,
    Cancelled,
}

/// Conversation transport. All methods take `&self`; share it in an `Arc`
/// to cancel a turn from another task.
pub struct ConversationTransport {
    client: Arc<BackendClient>,
    observer: RwLock<Arc<dyn TransportObserver>>,
    default_model: RwLock<Option<ModelSelection>>,
    session_id: Mutex<Option<String>>,
    stream: Mutex<Option<StreamSlot>>,
    generation: AtomicU64,
}

impl ConversationTransport {
    pub fn new(client: Arc<BackendClient>, observer: Arc<dyn TransportObserver>) -> Self {
        Self {
            client,
            observer: RwLock::new(observer),
            default_model: RwLock::new(None),
            session_id: Mutex::new(None),
            stream: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &Arc<BackendClient> {
        &self.client
    }

    /// Model used when a call does not name one
    pub fn set_default_model(&self, model: Option<ModelSelection>) {
        *self
            .default_model
            .write()
            .unwrap_or_else(|e| e.into_inner()) = model;
    }

    pub fn default_model(&self) -> Option<ModelSelection> {
        self.default_model
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Explicit override, then the default model, then the built-in fallback.
    pub fn effective_model(&self, explicit: Option<ModelSelection>) -> ModelSelection {
        explicit
            .or_else(|| self.default_model())
            .unwrap_or_else(ModelSelection::fallback)
    }

    /// Session the next tool result is submitted to
    pub fn session_id(&self) -> Option<String> {
        self.session_lock().clone()
    }

    /// Open a new turn with a user message.
    pub async fn start(&self, request: ConversationRequest) -> Result<()> {
        if let Err(error) = self.client.ensure_authenticated().await {
            return Err(self.fail_before_turn("Start conversation", error));
        }

        let model = self.effective_model(request.model.clone());
        *self.session_lock() = Some(request.session_id.clone());
        tracing::debug!(
            target: "octopus.transport",
            session_id = %request.session_id,
            model = %model,
            "starting conversation"
        );

        let body = request.body(&model);
        self.run_turn("start conversation", "Start conversation", &request.session_id, &body)
            .await
    }

    /// Submit a tool result and stream the model's continuation.
    pub async fn continue_with_tool_result(
        &self,
        result: ToolResult,
        model: Option<ModelSelection>,
    ) -> Result<()> {
        if let Err(error) = self.client.ensure_authenticated().await {
            return Err(self.fail_before_turn("Submit tool results", error));
        }

        let Some(session_id) = self.session_id() else {
            let error = OctoError::Session("no conversation has been started".to_string());
            return Err(self.fail_before_turn("Submit tool results", error));
        };
        let model = self.effective_model(model);
        tracing::debug!(
            target: "octopus.transport",
            session_id = %session_id,
            tool = %result.name,
            ok = result.ok,
            "submitting tool result"
        );

        let body = json!({
            "type": "tool_result",
            "tool_result": result,
            "model_type": model.provider,
            "model_version": model.model,
        });
        self.run_turn("submit tool results", "Submit tool results", &session_id, &body)
            .await
    }

    /// Abort the open stream, if any. Safe to call at any time, from any task.
    pub fn cancel(&self) {
        if let Some(slot) = self.stream_lock().take() {
            tracing::debug!(
                target: "octopus.transport",
                generation = slot.generation,
                "cancelling stream"
            );
            slot.handle.abort();
        }
    }

    /// Whether a turn currently holds a stream
    pub fn is_streaming(&self) -> bool {
        self.stream_lock().is_some()
    }

    /// Cancel and stop reporting to the observer.
    pub fn shutdown(&self) {
        self.cancel();
        *self.observer.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(NoopObserver);
    }

    /// Fetch the backend's view of a conversation.
    pub async fn conversation_status(&self, session_id: &str) -> Result<ConversationStatus> {
        self.client.ensure_authenticated().await?;
        self.client
            .get_json(
                "get conversation status",
                &format!("conversations/{}", session_id),
            )
            .await
    }

    async fn run_turn(&self, operation: &str, label: &str, session_id: &str, body: &Value) -> Result<()> {
        self.cancel();

        let mut turn = TurnStatus { working: false };
        self.set_working(&mut turn, PROCESSING_MESSAGE, StatusPhase::Thinking);

        let (generation, registration) = self.begin_stream();
        let outcome = self
            .stream_turn(operation, label, session_id, body, generation, registration, &mut turn)
            .await;
        let current = self.release_stream(generation);

        match outcome {
            Ok(StreamEnd::Finished) => Ok(()),
            Ok(StreamEnd::Cancelled) => {
                tracing::debug!(target: "octopus.transport", label, "turn cancelled");
                Ok(())
            }
            Err(error) => {
                if current {
                    self.set_idle(&mut turn);
                }
                if let Some(source) = error.network_error() {
                    tracing::warn!(target: "octopus.transport", "{}", source.log_message(Some(label)));
                } else {
                    tracing::warn!(target: "octopus.transport", label, error = %error, "turn failed");
                }
                Err(error)
            }
        }
    }

    /// A call rejected before its turn opened still leaves the status idle.
    fn fail_before_turn(&self, label: &str, error: OctoError) -> OctoError {
        tracing::warn!(target: "octopus.transport", label, error = %error, "turn rejected");
        self.observer().on_status(false, "", StatusPhase::Idle);
        error
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream_turn(
        &self,
        operation: &str,
        label: &str,
        session_id: &str,
        body: &Value,
        generation: u64,
        registration: AbortRegistration,
        turn: &mut TurnStatus,
    ) -> Result<StreamEnd> {
        let url = self
            .client
            .endpoint(&format!("conversations/{}/stream", session_id));
        let mut headers = self.client.auth_headers().await?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let retry = self
            .client
            .retry_config()
            .clone()
            .with_predicate(transport_retry_predicate);
        let send = self.client.send(label, &retry, || {
            self.client
                .http()
                .post(&url)
                .headers(headers.clone())
                .json(body)
        });

        let response = match Abortable::new(send, registration).await {
            Ok(response) => response.map_err(|e| wrap_error(operation, e))?,
            Err(_aborted) => return Ok(StreamEnd::Cancelled),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(stream_status_error(operation, status));
        }

        let Some(registration) = self.rearm_stream(generation) else {
            return Ok(StreamEnd::Cancelled);
        };
        let events = decode_stream(Abortable::new(response.bytes_stream(), registration));
        futures::pin_mut!(events);

        while let Some(next) = events.next().await {
            let sse = next.map_err(|e| wrap_error(operation, e))?;
            match self.dispatch(&sse, turn) {
                Flow::Continue => {}
                Flow::Done => return Ok(StreamEnd::Finished),
                Flow::Failed(error) => return Err(wrap_error(operation, error)),
            }
        }

        if self.is_current(generation) {
            Ok(StreamEnd::Finished)
        } else {
            Ok(StreamEnd::Cancelled)
        }
    }

    fn dispatch(&self, sse: &SseEvent, turn: &mut TurnStatus) -> Flow {
        let event = match ConversationEvent::from_sse(sse) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(target: "octopus.transport", error = %error, "dropping malformed event");
                return Flow::Continue;
            }
        };

        match event {
            ConversationEvent::AssistantMessage {
                content,
                token_usage,
            } => {
                let observer = self.observer();
                if let Some(content) = content.filter(|c| !c.is_empty()) {
                    observer.on_update("Response", &content, UpdateKind::Text);
                }
                if let Some(usage) = token_usage {
                    observer.on_token_usage(&usage);
                }
                self.set_idle(turn);
                Flow::Continue
            }
            ConversationEvent::ToolCall {
                id,
                name,
                args,
                token_usage,
            } => {
                let message = format!("Running {}...", display_name(&name));
                self.set_working(turn, &message, StatusPhase::Tool);
                let observer = self.observer();
                if let Some(usage) = token_usage {
                    observer.on_token_usage(&usage);
                }
                observer.on_tool_request(ToolExecutionRequest::new(id, name, args));
                Flow::Continue
            }
            ConversationEvent::Done => {
                self.set_idle(turn);
                Flow::Done
            }
            ConversationEvent::Error { message } => Flow::Failed(OctoError::Network(
                NetworkError::from_message(message.unwrap_or_else(|| "Server error".to_string())),
            )),
            ConversationEvent::Unknown { event_type } => {
                tracing::debug!(target: "octopus.transport", event_type = %event_type, "ignoring event");
                Flow::Continue
            }
        }
    }

    fn observer(&self) -> Arc<dyn TransportObserver> {
        self.observer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_working(&self, turn: &mut TurnStatus, message: &str, phase: StatusPhase) {
        turn.working = true;
        self.observer().on_status(true, message, phase);
    }

    fn set_idle(&self, turn: &mut TurnStatus) {
        if turn.working {
            turn.working = false;
            self.observer().on_status(false, "", StatusPhase::Idle);
        }
    }

    fn stream_lock(&self) -> MutexGuard<'_, Option<StreamSlot>> {
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session_lock(&self) -> MutexGuard<'_, Option<String>> {
        self.session_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_stream(&self) -> (u64, AbortRegistration) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (handle, registration) = AbortHandle::new_pair();
        *self.stream_lock() = Some(StreamSlot { generation, handle });
        (generation, registration)
    }

    /// Swap in a fresh abort handle for the body phase, unless the turn was
    /// cancelled in the meantime.
    fn rearm_stream(&self, generation: u64) -> Option<AbortRegistration> {
        let mut slot = self.stream_lock();
        match slot.as_mut() {
            Some(current) if current.generation == generation => {
                let (handle, registration) = AbortHandle::new_pair();
                current.handle = handle;
                Some(registration)
            }
            _ => None,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        matches!(self.stream_lock().as_ref(), Some(slot) if slot.generation == generation)
    }

    /// Clear the slot if it still belongs to this turn.
    fn release_stream(&self, generation: u64) -> bool {
        let mut slot = self.stream_lock();
        if matches!(slot.as_ref(), Some(current) if current.generation == generation) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

impl Drop for ConversationTransport {
    fn drop(&mut self) {
        self.cancel();
    }
}
