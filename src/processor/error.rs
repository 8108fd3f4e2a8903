//! Processor error types

use thiserror::Error;

/// Processor error with classification.
///
/// Every kind surfaces to the visitor the same way: one apology turn.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessorError {
    pub kind: ProcessorErrorKind,
    pub message: String,
}

impl ProcessorError {
    pub fn new(kind: ProcessorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::Timeout, message)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::new(
            ProcessorErrorKind::Status(status),
            format!("HTTP {status}: {body}"),
        )
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorKind::InvalidResponse, message)
    }
}

impl From<reqwest::Error> for ProcessorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProcessorError::timeout(format!("Request timeout: {err}"))
        } else if err.is_decode() {
            ProcessorError::invalid_response(format!("Failed to read response: {err}"))
        } else if err.is_connect() {
            ProcessorError::network(format!("Connection failed: {err}"))
        } else {
            ProcessorError::network(format!("Request failed: {err}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorErrorKind {
    /// Connection refused, reset, DNS
    Network,
    /// No reply within the configured timeout
    Timeout,
    /// Non-2xx status
    Status(u16),
    /// Body is not a processor reply
    InvalidResponse,
}
