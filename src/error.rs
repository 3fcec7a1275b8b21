// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Octopus
//!
//! This module defines all error types used throughout the application.
//! Transport failures are carried as [`NetworkError`] values and classified
//! on demand; everything the user sees goes through [`OctoError::user_message`].

use thiserror::Error;

use crate::network::errors::{NetworkError, NetworkErrorKind};

/// Message shown when a call is attempted without a valid login.
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please run: /login";

/// Main error type for Octopus operations
#[derive(Error, Debug)]
pub enum OctoError {
    /// Auth is enabled and the user has no valid session
    #[error("{}", AUTH_REQUIRED_MESSAGE)]
    AuthenticationRequired,

    /// Raw transport or HTTP failure
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// A backend call failed; `message` is the user-facing sentence
    #[error("Failed to {operation}: {message}")]
    Request {
        operation: String,
        message: String,
        #[source]
        source: NetworkError,
    },

    /// Malformed or unexpected SSE payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Octopus operations
pub type Result<T> = std::result::Result<T, OctoError>;

impl From<reqwest::Error> for OctoError {
    fn from(err: reqwest::Error) -> Self {
        OctoError::Network(NetworkError::from(err))
    }
}

impl OctoError {
    /// Wrap a failure of a named backend operation with a user-facing message.
    pub fn request(operation: impl Into<String>, source: NetworkError) -> Self {
        let message = source.user_message();
        OctoError::Request {
            operation: operation.into(),
            message,
            source,
        }
    }

    /// Like [`OctoError::request`] but with an explicit message.
    pub fn request_with_message(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: NetworkError,
    ) -> Self {
        OctoError::Request {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// The underlying network failure, if any.
    pub fn network_error(&self) -> Option<&NetworkError> {
        match self {
            OctoError::Network(err) => Some(err),
            OctoError::Request { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Classified kind of the failure.
    pub fn kind(&self) -> NetworkErrorKind {
        match self {
            OctoError::AuthenticationRequired => NetworkErrorKind::AuthenticationFailed,
            other => other
                .network_error()
                .map(NetworkError::kind)
                .unwrap_or(NetworkErrorKind::Unknown),
        }
    }

    /// HTTP status attached to the failure, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        self.network_error().and_then(NetworkError::status_code)
    }

    /// Whether the classifier considers this failure transient.
    pub fn is_retryable(&self) -> bool {
        self.network_error()
            .map(NetworkError::is_retryable)
            .unwrap_or(false)
    }

    /// Human-readable sentence for display.
    pub fn user_message(&self) -> String {
        match self {
            OctoError::Network(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
