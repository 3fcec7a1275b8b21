// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Network error taxonomy
//!
//! A [`NetworkError`] is the raw failure as observed on the wire: an optional
//! low-level transport code, an optional HTTP status and the error text. Its
//! [`NetworkErrorKind`] is never stored; it is derived by [`classify`] every
//! time it is asked for, so two equal raw errors always classify the same way.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use reqwest::StatusCode;

/// Closed set of failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    ConnectionRefused,
    Timeout,
    DnsResolution,
    TlsError,
    NetworkUnreachable,
    ServerError,
    ServiceUnavailable,
    RateLimited,
    AuthenticationFailed,
    Unknown,
}

impl NetworkErrorKind {
    /// Whether a failure of this kind may succeed on a later attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            NetworkErrorKind::ConnectionRefused
                | NetworkErrorKind::Timeout
                | NetworkErrorKind::DnsResolution
                | NetworkErrorKind::NetworkUnreachable
                | NetworkErrorKind::ServerError
                | NetworkErrorKind::ServiceUnavailable
        )
    }

    /// Fixed one-sentence message for this kind. `None` for [`NetworkErrorKind::Unknown`],
    /// which echoes the original error text instead.
    pub fn template(self) -> Option<&'static str> {
        let message = match self {
            NetworkErrorKind::ConnectionRefused => {
                "Unable to connect to the server. Please check your internet connection and try again."
            }
            NetworkErrorKind::Timeout => {
                "Request timed out. The server might be busy, please try again."
            }
            NetworkErrorKind::DnsResolution => {
                "Unable to resolve server address. Please check your internet connection."
            }
            NetworkErrorKind::TlsError => {
                "Secure connection failed. Please check your network settings."
            }
            NetworkErrorKind::NetworkUnreachable => {
                "Network is unreachable. Please check your internet connection."
            }
            NetworkErrorKind::ServerError => "Server error occurred. Please try again later.",
            NetworkErrorKind::ServiceUnavailable => {
                "Service is temporarily unavailable. Please try again later."
            }
            NetworkErrorKind::RateLimited => {
                "Too many requests. Please wait a moment before trying again."
            }
            NetworkErrorKind::AuthenticationFailed => "Authentication failed. Please login again.",
            NetworkErrorKind::Unknown => return None,
        };
        Some(message)
    }

    /// User-facing sentence for this kind; `original` is used only for `Unknown`.
    pub fn to_user_message(self, original: &str) -> String {
        match self.template() {
            Some(message) => message.to_string(),
            None if original.trim().is_empty() => {
                "An unexpected network error occurred.".to_string()
            }
            None => original.to_string(),
        }
    }

    /// Stable identifier used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkErrorKind::ConnectionRefused => "CONNECTION_REFUSED",
            NetworkErrorKind::Timeout => "TIMEOUT",
            NetworkErrorKind::DnsResolution => "DNS_RESOLUTION",
            NetworkErrorKind::TlsError => "TLS_ERROR",
            NetworkErrorKind::NetworkUnreachable => "NETWORK_UNREACHABLE",
            NetworkErrorKind::ServerError => "SERVER_ERROR",
            NetworkErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            NetworkErrorKind::RateLimited => "RATE_LIMITED",
            NetworkErrorKind::AuthenticationFailed => "AUTHENTICATION_FAILED",
            NetworkErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low-level connection failure codes recovered from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
    ConnectionRefused,
    TimedOut,
    DnsLookup,
    Tls,
    NetworkUnreachable,
    HostUnreachable,
}

/// A raw transport or HTTP failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkError {
    pub code: Option<TransportCode>,
    pub status: Option<u16>,
    pub message: String,
}

impl NetworkError {
    /// Failure described only by its text.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
        }
    }

    /// Failure carrying a transport code.
    pub fn from_code(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            status: None,
            message: message.into(),
        }
    }

    /// Failure for an HTTP response, rendered as `HTTP <status>: <reason>`.
    pub fn from_status(status: u16, reason: impl AsRef<str>) -> Self {
        Self {
            code: None,
            status: Some(status),
            message: format!("HTTP {}: {}", status, reason.as_ref()),
        }
    }

    /// Failure for an HTTP response using the canonical reason phrase.
    pub fn from_status_code(status: StatusCode) -> Self {
        Self::from_status(status.as_u16(), status.canonical_reason().unwrap_or(""))
    }

    /// Classified kind of this failure.
    pub fn kind(&self) -> NetworkErrorKind {
        classify(self)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status
    }

    /// Human-readable sentence, independent of the raw text except for `Unknown`.
    pub fn user_message(&self) -> String {
        self.kind().to_user_message(&self.message)
    }

    /// Single-line description for logs, e.g.
    /// `[Start conversation] Network Error [SERVER_ERROR]: HTTP 500: Internal Server Error (HTTP 500)`.
    pub fn log_message(&self, context: Option<&str>) -> String {
        let prefix = context.map(|c| format!("[{}] ", c)).unwrap_or_default();
        let status = self
            .status
            .map(|s| format!(" (HTTP {})", s))
            .unwrap_or_default();
        let message = if self.message.is_empty() {
            "Unknown error"
        } else {
            self.message.as_str()
        };
        format!("{}Network Error [{}]: {}{}", prefix, self.kind(), message, status)
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str("Unknown network error")
        } else {
            f.write_str(&self.message)
        }
    }
}

impl StdError for NetworkError {}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        let message = chain_message(&err);
        Self {
            code: transport_code(&err, &message),
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

impl From<io::Error> for NetworkError {
    fn from(err: io::Error) -> Self {
        let message = err.to_string();
        Self {
            code: io_code(&err),
            status: None,
            message,
        }
    }
}

/// Classify a raw failure.
///
/// Precedence: transport code, then HTTP status, then message heuristics.
pub fn classify(error: &NetworkError) -> NetworkErrorKind {
    if let Some(code) = error.code {
        return match code {
            TransportCode::ConnectionRefused => NetworkErrorKind::ConnectionRefused,
            TransportCode::TimedOut => NetworkErrorKind::Timeout,
            TransportCode::DnsLookup => NetworkErrorKind::DnsResolution,
            TransportCode::Tls => NetworkErrorKind::TlsError,
            TransportCode::NetworkUnreachable | TransportCode::HostUnreachable => {
                NetworkErrorKind::NetworkUnreachable
            }
        };
    }

    if let Some(status) = error.status {
        match status {
            401 | 403 => return NetworkErrorKind::AuthenticationFailed,
            429 => return NetworkErrorKind::RateLimited,
            503 => return NetworkErrorKind::ServiceUnavailable,
            s if s >= 500 => return NetworkErrorKind::ServerError,
            _ => {}
        }
    }

    let message = error.message.to_lowercase();
    if message.contains("timeout") {
        NetworkErrorKind::Timeout
    } else if message.contains("connection") && message.contains("refused") {
        NetworkErrorKind::ConnectionRefused
    } else if message.contains("network") || message.contains("unreachable") {
        NetworkErrorKind::NetworkUnreachable
    } else if message.contains("dns") || message.contains("resolve") {
        NetworkErrorKind::DnsResolution
    } else {
        NetworkErrorKind::Unknown
    }
}

fn chain_message(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

fn transport_code(err: &reqwest::Error, message: &str) -> Option<TransportCode> {
    if err.is_timeout() {
        return Some(TransportCode::TimedOut);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if let Some(code) = io_code(io_err) {
                return Some(code);
            }
        }
        source = cause.source();
    }

    let lower = message.to_lowercase();
    if lower.contains("dns error") || lower.contains("failed to lookup address") {
        Some(TransportCode::DnsLookup)
    } else if lower.contains("certificate") || lower.contains("tls") {
        Some(TransportCode::Tls)
    } else {
        None
    }
}

fn io_code(err: &io::Error) -> Option<TransportCode> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Some(TransportCode::ConnectionRefused),
        io::ErrorKind::TimedOut => Some(TransportCode::TimedOut),
        io::ErrorKind::NetworkUnreachable => Some(TransportCode::NetworkUnreachable),
        io::ErrorKind::HostUnreachable => Some(TransportCode::HostUnreachable),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_takes_precedence_over_status() {
        let err = NetworkError {
            code: Some(TransportCode::TimedOut),
            status: Some(401),
            message: "whatever".to_string(),
        };
        assert_eq!(classify(&err), NetworkErrorKind::Timeout);
    }

    #[test]
    fn test_status_takes_precedence_over_message() {
        let err = NetworkError {
            code: None,
            status: Some(429),
            message: "connection refused".to_string(),
        };
        assert_eq!(classify(&err), NetworkErrorKind::RateLimited);
    }

    #[test]
    fn test_status_table() {
        assert_eq!(
            NetworkError::from_status(401, "Unauthorized").kind(),
            NetworkErrorKind::AuthenticationFailed
        );
        assert_eq!(
            NetworkError::from_status(403, "Forbidden").kind(),
            NetworkErrorKind::AuthenticationFailed
        );
        assert_eq!(
            NetworkError::from_status(429, "Too Many Requests").kind(),
            NetworkErrorKind::RateLimited
        );
        assert_eq!(
            NetworkError::from_status(503, "Service Unavailable").kind(),
            NetworkErrorKind::ServiceUnavailable
        );
        assert_eq!(
            NetworkError::from_status(500, "Internal Server Error").kind(),
            NetworkErrorKind::ServerError
        );
        assert_eq!(
            NetworkError::from_status(502, "Bad Gateway").kind(),
            NetworkErrorKind::ServerError
        );
    }

    #[test]
    fn test_request_timeout_status_falls_through_to_message() {
        // 408 has no status rule; its reason phrase mentions timeout
        let err = NetworkError::from_status_code(StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.kind(), NetworkErrorKind::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_errors_are_unknown() {
        let err = NetworkError::from_status(404, "Not Found");
        assert_eq!(err.kind(), NetworkErrorKind::Unknown);
        assert!(!err.is_retryable());
        assert_eq!(err.user_message(), "HTTP 404: Not Found");
    }

    #[test]
    fn test_message_heuristics() {
        let cases = [
            ("Request timeout after 30s", NetworkErrorKind::Timeout),
            ("Connection was refused", NetworkErrorKind::ConnectionRefused),
            ("network down", NetworkErrorKind::NetworkUnreachable),
            ("host unreachable", NetworkErrorKind::NetworkUnreachable),
            ("DNS lookup failed", NetworkErrorKind::DnsResolution),
            ("could not resolve host", NetworkErrorKind::DnsResolution),
            ("something odd", NetworkErrorKind::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(
                NetworkError::from_message(message).kind(),
                expected,
                "message: {}",
                message
            );
        }
    }

    #[test]
    fn test_retryable_set() {
        let retryable = [
            NetworkErrorKind::ConnectionRefused,
            NetworkErrorKind::Timeout,
            NetworkErrorKind::DnsResolution,
            NetworkErrorKind::NetworkUnreachable,
            NetworkErrorKind::ServerError,
            NetworkErrorKind::ServiceUnavailable,
        ];
        let terminal = [
            NetworkErrorKind::TlsError,
            NetworkErrorKind::RateLimited,
            NetworkErrorKind::AuthenticationFailed,
            NetworkErrorKind::Unknown,
        ];
        assert!(retryable.iter().all(|k| k.is_retryable()));
        assert!(terminal.iter().all(|k| !k.is_retryable()));
    }

    #[test]
    fn test_user_messages_ignore_original_text() {
        let err = NetworkError::from_code(TransportCode::Tls, "invalid peer certificate: UnknownIssuer");
        assert_eq!(
            err.user_message(),
            "Secure connection failed. Please check your network settings."
        );
    }

    #[test]
    fn test_unknown_echoes_or_falls_back() {
        assert_eq!(
            NetworkError::from_message("weird failure").user_message(),
            "weird failure"
        );
        assert_eq!(
            NetworkError::from_message("").user_message(),
            "An unexpected network error occurred."
        );
    }

    #[test]
    fn test_classification_is_pure() {
        let err = NetworkError::from_status(503, "Service Unavailable");
        let copy = err.clone();
        assert_eq!(err.kind(), copy.kind());
        assert_eq!(err.kind(), err.kind());
    }

    #[test]
    fn test_io_error_codes() {
        let refused: NetworkError =
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert_eq!(refused.kind(), NetworkErrorKind::ConnectionRefused);

        let timed_out: NetworkError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(timed_out.kind(), NetworkErrorKind::Timeout);
    }

    #[test]
    fn test_log_message() {
        let err = NetworkError::from_status(500, "Internal Server Error");
        assert_eq!(
            err.log_message(Some("Start conversation")),
            "[Start conversation] Network Error [SERVER_ERROR]: HTTP 500: Internal Server Error (HTTP 500)"
        );
        assert_eq!(
            NetworkError::from_message("").log_message(None),
            "Network Error [UNKNOWN]: Unknown error"
        );
    }

    #[tokio::test]
    async fn test_reqwest_connection_refused_is_classified() {
        // Bind then drop a listener so the port is very likely closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();
        let network: NetworkError = err.into();
        assert_eq!(network.kind(), NetworkErrorKind::ConnectionRefused);
        assert!(network.is_retryable());
    }
}
