//! Upstream failure taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::resilience::CallKind;

/// Longest upstream error body kept for logs and client messages.
const MAX_BODY_EXCERPT: usize = 256;

/// A failed call to the ML service. Every variant counts against the breaker
/// when it happens on a prediction path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("ML service {call} call timed out after {}ms", .after.as_millis())]
    Timeout { call: CallKind, after: Duration },

    #[error("ML service unreachable: {0}")]
    Unreachable(String),

    #[error("ML service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from ML service: {0}")]
    InvalidResponse(String),
}

/// The ML client could not be set up from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("invalid ML service URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl UpstreamError {
    /// Build a status error, keeping only a short excerpt of the body.
    pub fn status(status: u16, body: &str) -> Self {
        let mut excerpt: String = body.trim().chars().take(MAX_BODY_EXCERPT).collect();
        if body.trim().chars().count() > MAX_BODY_EXCERPT {
            excerpt.push('…');
        }
        UpstreamError::Status { status, body: excerpt }
    }

    /// True when the service could not be reached in time at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, UpstreamError::Timeout { .. } | UpstreamError::Unreachable(_))
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Unreachable(_) => "unreachable",
            UpstreamError::Status { .. } => "status",
            UpstreamError::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            UpstreamError::InvalidResponse(e.to_string())
        } else {
            UpstreamError::Unreachable(e.to_string())
        }
    }
}
