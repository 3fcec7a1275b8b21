// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use octopus::api::{
    BackendClient, ChannelObserver, ConversationRequest, ConversationTransport, ModelCatalogClient,
    ModelManager, ModelSelection, TransportEvent,
};
use octopus::auth::{AuthProvider, StaticTokenAuth};
use octopus::config::Settings;
use octopus::error::Result;
use octopus::session::SessionManager;
use octopus::tools::permission::ApprovalGate;
use octopus::tools::{ToolContext, ToolExecutionRequest, ToolRegistry, ToolResult};

use crate::chat_ui::{
    print_denied, print_response, print_status, print_tool_invocation, print_tool_result,
};

/// Backend client with the token from the environment or the settings file.
pub(super) fn build_client(settings: &Settings) -> Result<Arc<BackendClient>> {
    let auth: Arc<dyn AuthProvider> = Arc::new(StaticTokenAuth::from_settings(settings));
    Ok(Arc::new(BackendClient::new(settings, auth)?))
}

enum TurnCall {
    Start(ConversationRequest),
    Continue(ToolResult),
}

/// Everything a chat or ask session needs
pub(super) struct ChatRuntime {
    pub transport: Arc<ConversationTransport>,
    pub catalog: ModelCatalogClient,
    pub models: ModelManager,
    pub sessions: SessionManager,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    registry: ToolRegistry,
    gate: ApprovalGate,
    working_directory: PathBuf,
    explicit_model: Option<ModelSelection>,
    verbose: u8,
}

impl ChatRuntime {
    pub fn new(
        settings: Settings,
        settings_path: PathBuf,
        working_directory: PathBuf,
        explicit_model: Option<ModelSelection>,
        trust: bool,
        verbose: u8,
    ) -> Result<Self> {
        let client = build_client(&settings)?;
        let (observer, events) = ChannelObserver::new();
        let transport = Arc::new(ConversationTransport::new(
            Arc::clone(&client),
            Arc::new(observer),
        ));
        let catalog = ModelCatalogClient::new(client);
        let models = ModelManager::new(settings, settings_path, catalog.clone());
        transport.set_default_model(models.default_model());

        Ok(Self {
            transport,
            catalog,
            models,
            sessions: SessionManager::new(),
            events,
            registry: ToolRegistry::with_builtins(),
            gate: if trust {
                ApprovalGate::with_trust_mode()
            } else {
                ApprovalGate::new()
            },
            working_directory,
            explicit_model,
            verbose,
        })
    }

    /// Model the next message will run against
    pub fn active_model(&self) -> ModelSelection {
        self.transport.effective_model(self.explicit_model.clone())
    }

    /// Send a user message and run tool calls until the model stops asking.
    pub async fn send_message(&mut self, message: &str, extra_context: Option<String>) -> Result<()> {
        let session = self.sessions.current();
        let mut request = self.models.prepare_request(
            &session.session_id,
            message,
            self.explicit_model.clone(),
            session.is_first_message(),
            self.registry.descriptors(),
            &self.working_directory,
        );
        if let Some(extra) = extra_context {
            request.context = Some(match request.context.take() {
                Some(project) => format!("{}{}", project, extra),
                None => extra,
            });
        }
        self.sessions.current_mut().increment_message_count();

        let mut queue: VecDeque<ToolExecutionRequest> = self.drive(TurnCall::Start(request)).await?.into();
        while let Some(request) = queue.pop_front() {
            let result = self.resolve_tool(request).await?;
            queue.extend(self.drive(TurnCall::Continue(result)).await?);
        }
        Ok(())
    }

    /// Run one transport call while draining observer events. Returns the
    /// tool calls the model asked for.
    async fn drive(&mut self, call: TurnCall) -> Result<Vec<ToolExecutionRequest>> {
        let transport = Arc::clone(&self.transport);
        let model = self.explicit_model.clone();
        let call = async move {
            match call {
                TurnCall::Start(request) => transport.start(request).await,
                TurnCall::Continue(result) => transport.continue_with_tool_result(result, model).await,
            }
        };
        tokio::pin!(call);

        let mut tools = Vec::new();
        let mut cancelled = false;
        let outcome = loop {
            tokio::select! {
                outcome = &mut call => break outcome,
                Some(event) = self.events.recv() => self.handle_event(event, &mut tools)?,
                _ = tokio::signal::ctrl_c(), if !cancelled => {
                    cancelled = true;
                    self.transport.cancel();
                }
            }
        };
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event, &mut tools)?;
        }
        outcome?;

        if cancelled {
            tracing::debug!(dropped = tools.len(), "turn interrupted");
            tools.clear();
        }
        Ok(tools)
    }

    fn handle_event(&mut self, event: TransportEvent, tools: &mut Vec<ToolExecutionRequest>) -> Result<()> {
        match event {
            TransportEvent::Update { details, .. } => print_response(&details)?,
            TransportEvent::Status {
                is_working: true,
                message,
                ..
            } => print_status(&message)?,
            TransportEvent::Status { .. } => {}
            TransportEvent::TokenUsage(usage) => {
                if self.verbose > 0 {
                    eprintln!(
                        "[verbose] tokens: {} in / {} out",
                        usage.input_tokens, usage.output_tokens
                    );
                }
                self.sessions.record_usage(&usage);
            }
            TransportEvent::ToolRequest(request) => tools.push(request),
        }
        Ok(())
    }

    async fn resolve_tool(&mut self, mut request: ToolExecutionRequest) -> Result<ToolResult> {
        let approved = self.gate.review(self.sessions.current_mut(), &mut request)?;
        if !approved {
            print_denied(&request.name)?;
            return Ok(ToolResult::denied(&request));
        }

        print_tool_invocation(&request)?;
        let context = ToolContext::new(
            self.working_directory.clone(),
            self.sessions.session_id().to_string(),
        );
        let result = self.registry.execute(&request, &context).await;
        print_tool_result(&result)?;
        Ok(result)
    }
}
