// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Octopus - streaming conversation client for the Octopus backend.
//!
//! This crate exposes the runtime used by the `octopus` CLI (`src/main.rs`).
//!
//! Architecture highlights:
//! - `api`: backend client, SSE conversation transport, model catalog and default-model handling
//! - `network`: error classification, retry with backoff, circuit breaker
//! - `sse`: incremental server-sent event decoding
//! - `tools`: local tool registry and the approval prompt for model tool calls
//! - `session`, `auth`, `config`: per-conversation state, credentials, settings file

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod sse;
pub mod tools;

pub use error::{OctoError, Result};
