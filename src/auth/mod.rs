// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Credentials for the backend
//!
//! The login flow itself lives outside this crate. The client only asks an
//! [`AuthProvider`] whether a session exists and which bearer token to send.

use async_trait::async_trait;

use crate::config::Settings;

/// Source of the current user's credentials
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Whether a usable session exists
    async fn is_authenticated(&self) -> bool;

    /// Bearer token to attach to requests
    async fn access_token(&self) -> Option<String>;
}

/// A fixed token, typically read from `OCTOPUS_ACCESS_TOKEN` or the settings file.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    token: Option<String>,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
        }
    }

    /// Token from the environment, falling back to the settings file.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            token: settings.access_token(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Never authenticated; for backends running with auth disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn is_authenticated(&self) -> bool {
        false
    }

    async fn access_token(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let auth = StaticTokenAuth::new("abc");
        assert!(auth.is_authenticated().await);
        assert_eq!(auth.access_token().await.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_blank_token_is_unauthenticated() {
        let auth = StaticTokenAuth::new("   ");
        assert!(!auth.is_authenticated().await);
        assert!(auth.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_no_auth() {
        assert!(!NoAuth.is_authenticated().await);
        assert!(NoAuth.access_token().await.is_none());
    }
}
