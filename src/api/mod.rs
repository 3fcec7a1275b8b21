// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Backend API: streaming conversations and the model catalog

pub mod catalog;
pub mod client;
pub mod events;
pub mod models;
pub mod transport;
pub mod types;

pub use catalog::ModelCatalogClient;
pub use client::{BackendClient, AUTH_FAILED_MESSAGE};
pub use events::ConversationEvent;
pub use models::{format_model, ModelManager, ModelSource, ModelValidation};
pub use transport::{
    transport_retry_predicate, ChannelObserver, ConversationRequest, ConversationTransport,
    NoopObserver, StatusPhase, TransportEvent, TransportObserver, UpdateKind,
};
pub use types::{
    ConversationStatus, ModelDetails, ModelInfo, ModelProvider, ModelSelection, ModelsResponse,
    PricingEntry, TokenUsage,
};
